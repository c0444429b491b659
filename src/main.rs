use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use interview_coach::cli::run_wizard;
use interview_coach::config::CoachConfig;
use interview_coach::flow::{FlowDefinition, canonical};
use interview_coach::onboarding::{SessionRegistry, onboarding_routes};
use interview_coach::store::{Database, LibSqlBackend};
use tokio::io::BufReader;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = CoachConfig::from_env().context("invalid configuration")?;

    let flow: Arc<FlowDefinition> = match &config.flow_path {
        Some(path) => Arc::new(
            FlowDefinition::from_path(path)
                .with_context(|| format!("failed to load flow from {}", path.display()))?,
        ),
        None => canonical(),
    };

    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    let registry = Arc::new(SessionRegistry::new(flow, db, config.session.clone()));

    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("cli") {
        let company = args.next().unwrap_or_else(|| "google".to_string());
        let role = args.next().unwrap_or_else(|| "software-engineer".to_string());
        let manager = registry.create(&company, &role).await;
        eprintln!("Interview Coach v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("   Session: {}", manager.session_id());
        eprintln!("   Type 'back', 'reset' or 'quit' at any prompt.\n");
        return run_wizard(
            manager,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await;
    }

    eprintln!("Interview Coach v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Steps: {}", registry.flow().len());
    eprintln!("   Persist mode: {:?}", config.session.persist_mode);
    eprintln!("   Session idle timeout: {}s", config.session.idle_timeout.as_secs());
    eprintln!("   API: http://0.0.0.0:{}/api/sessions", config.http_port);
    eprintln!("   Health: http://0.0.0.0:{}/health\n", config.http_port);

    let idle_timeout = config.session.idle_timeout;
    if !idle_timeout.is_zero() {
        let every = (idle_timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(600));
        registry.spawn_idle_sweeper(every);
    }

    let app = onboarding_routes(registry).layer(CorsLayer::permissive());
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
