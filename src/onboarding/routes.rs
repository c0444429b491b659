//! REST endpoints for driving onboarding sessions.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use super::manager::{OnboardingManager, SessionRegistry};
use crate::error::SessionError;
use crate::flow::Answer;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(registry: Arc<SessionRegistry>) -> Router {
    let state = AppState { registry };

    Router::new()
        .route("/health", get(health))
        .route("/api/flow", get(get_flow))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/answer", post(submit_answer))
        .route("/api/sessions/{id}/select", post(select_option))
        .route("/api/sessions/{id}/continue", post(continue_step))
        .route("/api/sessions/{id}/back", post(go_back))
        .route("/api/sessions/{id}/goto", post(go_to_step))
        .route("/api/sessions/{id}/reset", post(reset))
        .route("/api/sessions/{id}/complete", post(complete))
        .route("/api/sessions/{id}/plan", get(get_plan))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "interview-coach"
    }))
}

async fn get_flow(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.flow().steps().to_vec())
}

fn error_response(err: SessionError) -> Response {
    let status = match &err {
        SessionError::NotFound { .. } => StatusCode::NOT_FOUND,
        SessionError::InvalidAnswer { .. } | SessionError::Navigation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SessionError::WrongStep { .. } => StatusCode::CONFLICT,
    };
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

async fn view_response(status: StatusCode, manager: &OnboardingManager) -> Response {
    (status, Json(manager.view().await)).into_response()
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    company: String,
    role: String,
}

async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Response {
    let manager = state.registry.create(&body.company, &body.role).await;
    view_response(StatusCode::CREATED, &manager).await
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id).await {
        Ok(manager) => view_response(StatusCode::OK, &manager).await,
        Err(e) => error_response(e),
    }
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.remove(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct AnswerRequest {
    answer: Answer,
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AnswerRequest>,
) -> Response {
    let manager = match state.registry.get(&id).await {
        Ok(m) => m,
        Err(e) => return error_response(e),
    };
    match manager.submit_answer(body.answer).await {
        Ok(_) => view_response(StatusCode::OK, &manager).await,
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectRequest {
    option_id: String,
}

async fn select_option(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SelectRequest>,
) -> Response {
    let manager = match state.registry.get(&id).await {
        Ok(m) => m,
        Err(e) => return error_response(e),
    };
    match manager.select_option(&body.option_id).await {
        Ok(()) => view_response(StatusCode::ACCEPTED, &manager).await,
        Err(e) => error_response(e),
    }
}

async fn continue_step(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let manager = match state.registry.get(&id).await {
        Ok(m) => m,
        Err(e) => return error_response(e),
    };
    match manager.continue_step().await {
        Ok(_) => view_response(StatusCode::OK, &manager).await,
        Err(e) => error_response(e),
    }
}

async fn go_back(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id).await {
        Ok(manager) => {
            manager.go_back().await;
            view_response(StatusCode::OK, &manager).await
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GotoRequest {
    step_id: String,
}

async fn go_to_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<GotoRequest>,
) -> Response {
    let manager = match state.registry.get(&id).await {
        Ok(m) => m,
        Err(e) => return error_response(e),
    };
    match manager.go_to_step(&body.step_id).await {
        Ok(_) => view_response(StatusCode::OK, &manager).await,
        Err(e) => error_response(e),
    }
}

async fn reset(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id).await {
        Ok(manager) => {
            manager.reset().await;
            view_response(StatusCode::OK, &manager).await
        }
        Err(e) => error_response(e),
    }
}

async fn complete(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id).await {
        Ok(manager) => {
            manager.complete_onboarding().await;
            view_response(StatusCode::OK, &manager).await
        }
        Err(e) => error_response(e),
    }
}

async fn get_plan(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id).await {
        Ok(manager) => Json(manager.plan_view().await).into_response(),
        Err(e) => error_response(e),
    }
}
