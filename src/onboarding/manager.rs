//! OnboardingManager: owns one session's engine, its deferred step timers
//! and its persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::{LoadingStage, SessionSettings};
use crate::error::SessionError;
use crate::flow::{Answer, FlowDefinition, QuestionType, Step, StepKind};
use crate::plan::Plan;
use crate::registry::{company_display_name, company_profile, role_profile};
use crate::store::Database;

use super::engine::{FlowEngine, Transition};
use super::state::{PersistedSession, SessionState, settings_keys};
use super::timers::{StepTimers, TimerTicket};

/// Where the loading sequence is at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingProgress {
    /// Index of the running stage; equals the stage count once all are done.
    pub stage: usize,
    pub stage_text: Option<String>,
    pub completed_stages: Vec<String>,
    pub percent: u8,
}

impl LoadingProgress {
    /// Progress after `elapsed`, filling linearly within each stage.
    pub fn at(stages: &[LoadingStage], elapsed: Duration) -> Self {
        let total = stages.len();
        let mut start = Duration::ZERO;
        for (i, stage) in stages.iter().enumerate() {
            let end = start + stage.duration;
            if elapsed < end {
                let within = (elapsed - start).as_secs_f64() / stage.duration.as_secs_f64();
                let percent = (i as f64 + within) * 100.0 / total as f64;
                return Self {
                    stage: i,
                    stage_text: Some(stage.text.clone()),
                    completed_stages: completed(&stages[..i]),
                    percent: percent.floor() as u8,
                };
            }
            start = end;
        }
        Self {
            stage: total,
            stage_text: None,
            completed_stages: completed(stages),
            percent: 100,
        }
    }
}

fn completed(stages: &[LoadingStage]) -> Vec<String> {
    stages.iter().map(|s| s.text.replace("...", "")).collect()
}

/// Snapshot of a session for presentation adapters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub step: Option<Step>,
    pub state: SessionState,
    pub can_go_back: bool,
    /// Multiple-choice option waiting to auto-advance.
    pub pending_selection: Option<String>,
    pub loading: Option<LoadingProgress>,
    pub company_name: Option<String>,
    pub role_name: Option<String>,
    pub tagline: Option<String>,
}

/// The plan together with its display lines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub plan: Plan,
    pub headline: String,
    pub summary: String,
}

struct Inner {
    engine: FlowEngine,
    pending_selection: Option<String>,
    loading_started: Option<Instant>,
    closed: bool,
}

/// Coordinates one onboarding session.
///
/// Used behind `Arc`: deferred transitions hold a weak reference back to
/// the manager and give up if it is gone.
pub struct OnboardingManager {
    session_id: String,
    db: Arc<dyn Database>,
    settings: SessionSettings,
    inner: RwLock<Inner>,
    timers: StepTimers,
    last_active: Mutex<Instant>,
}

impl OnboardingManager {
    /// Open a session, rehydrating from the persisted blob if one exists.
    pub async fn open(
        session_id: &str,
        flow: Arc<FlowDefinition>,
        db: Arc<dyn Database>,
        settings: SessionSettings,
    ) -> Arc<Self> {
        let engine = match db
            .get_setting(session_id, settings_keys::ONBOARDING_STATE)
            .await
        {
            Ok(Some(blob)) => {
                let state = PersistedSession::restore(&blob, &flow, settings.persist_mode);
                tracing::info!(
                    session_id = %session_id,
                    step_id = %state.current_step_id,
                    "Restored onboarding session"
                );
                FlowEngine::with_state(flow, state)
            }
            Ok(None) => FlowEngine::new(flow),
            Err(e) => {
                tracing::warn!(session_id = %session_id, "Failed to load onboarding state: {}", e);
                FlowEngine::new(flow)
            }
        };

        let manager = Arc::new(Self {
            session_id: session_id.to_string(),
            db,
            settings,
            inner: RwLock::new(Inner {
                engine,
                pending_selection: None,
                loading_started: None,
                closed: false,
            }),
            timers: StepTimers::new(),
            last_active: Mutex::new(Instant::now()),
        });

        {
            let mut inner = manager.inner.write().await;
            manager.enter_step(&mut inner);
        }
        manager
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub async fn set_context(&self, company: &str, role: &str) {
        let mut inner = self.inner.write().await;
        inner.engine.set_context(company, role);
        self.persist(&inner).await;
    }

    pub async fn current_step(&self) -> Option<Step> {
        self.inner.read().await.engine.current_step().cloned()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.engine.state().clone()
    }

    /// Validate and record an answer for the current question, then advance.
    pub async fn submit_answer(self: &Arc<Self>, answer: Answer) -> Result<Transition, SessionError> {
        let mut inner = self.inner.write().await;
        let step = current(&inner)?;
        let question = step.question().ok_or_else(|| SessionError::WrongStep {
            step_id: step.id.clone(),
            kind: step.kind.name(),
            action: "answers".to_string(),
        })?;
        question
            .check_answer(&answer)
            .map_err(|reason| SessionError::InvalidAnswer {
                step_id: step.id.clone(),
                reason,
            })?;

        Ok(self.apply_answer(&mut inner, answer).await)
    }

    /// Pick a multiple-choice option; the answer is submitted after the
    /// auto-advance delay unless the session navigates first.
    pub async fn select_option(self: &Arc<Self>, option_id: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.write().await;
        let step = current(&inner)?;
        let question = step
            .question()
            .filter(|q| q.question_type == QuestionType::MultipleChoice)
            .ok_or_else(|| SessionError::WrongStep {
                step_id: step.id.clone(),
                kind: step.kind.name(),
                action: "option selection".to_string(),
            })?;
        let answer = Answer::single(option_id);
        question
            .check_answer(&answer)
            .map_err(|reason| SessionError::InvalidAnswer {
                step_id: step.id.clone(),
                reason,
            })?;

        inner.pending_selection = Some(option_id.to_string());
        let delay = self.settings.auto_advance_delay;
        let step_id = step.id.clone();
        let weak = Arc::downgrade(self);
        self.timers.schedule(move |ticket| async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = weak.upgrade() {
                manager.fire_selection(ticket, &step_id, answer).await;
            }
        });
        tracing::debug!(session_id = %self.session_id, step_id = %step.id, option = %option_id, "Option selected");
        Ok(())
    }

    /// Move past a welcome or content step to its default successor.
    pub async fn continue_step(self: &Arc<Self>) -> Result<Transition, SessionError> {
        let mut inner = self.inner.write().await;
        let step = current(&inner)?;
        if !matches!(step.kind, StepKind::Welcome | StepKind::Content { .. }) {
            return Err(SessionError::WrongStep {
                step_id: step.id.clone(),
                kind: step.kind.name(),
                action: "continue".to_string(),
            });
        }

        let next = inner.engine.flow().next_step_id(&step, None).map(str::to_string);
        let Some(next) = next else {
            tracing::debug!(session_id = %self.session_id, step_id = %step.id, "Nothing to continue to");
            return Ok(Transition::Stayed { step: step.id });
        };
        let transition = inner.engine.go_to_step(&next)?;
        self.settle(&mut inner, &transition).await;
        Ok(transition)
    }

    pub async fn go_back(self: &Arc<Self>) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.engine.go_back() {
            return false;
        }
        self.enter_step(&mut inner);
        self.persist(&inner).await;
        true
    }

    pub async fn go_to_step(self: &Arc<Self>, step_id: &str) -> Result<Transition, SessionError> {
        let mut inner = self.inner.write().await;
        let transition = inner.engine.go_to_step(step_id)?;
        self.settle(&mut inner, &transition).await;
        Ok(transition)
    }

    pub async fn reset(self: &Arc<Self>) {
        let mut inner = self.inner.write().await;
        inner.engine.reset();
        self.enter_step(&mut inner);
        self.persist(&inner).await;
        tracing::info!(session_id = %self.session_id, "Onboarding reset");
    }

    pub async fn complete_onboarding(&self) {
        let mut inner = self.inner.write().await;
        inner.engine.complete_onboarding();
        self.persist(&inner).await;
        tracing::info!(session_id = %self.session_id, "Onboarding complete");
    }

    pub async fn plan(&self) -> Plan {
        self.inner.read().await.engine.plan()
    }

    pub async fn plan_view(&self) -> PlanView {
        let inner = self.inner.read().await;
        let state = inner.engine.state();
        let plan = inner.engine.plan();
        let company_name = state
            .company
            .as_deref()
            .map(company_display_name)
            .unwrap_or_else(|| "your target company".to_string());
        let role_name = state
            .role
            .as_deref()
            .map(|r| role_profile(r).display_name)
            .unwrap_or_else(|| "next".to_string());
        PlanView {
            headline: plan.headline(&company_name, &role_name),
            summary: plan.summary(),
            plan,
        }
    }

    pub async fn view(&self) -> SessionView {
        let inner = self.inner.read().await;
        let state = inner.engine.state();
        let company = state.company.as_deref();
        SessionView {
            session_id: self.session_id.clone(),
            step: inner.engine.current_step().cloned(),
            state: state.clone(),
            can_go_back: inner.engine.can_go_back(),
            pending_selection: inner.pending_selection.clone(),
            loading: inner
                .loading_started
                .map(|started| LoadingProgress::at(&self.settings.loading_stages, started.elapsed())),
            company_name: company.map(company_display_name),
            role_name: state.role.as_deref().map(|r| role_profile(r).display_name),
            tagline: company
                .and_then(company_profile)
                .map(|c| c.tagline.to_string()),
        }
    }

    /// Mark the session as in use.
    pub fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Time since the session was last handed out.
    pub fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    /// Whether a deferred transition is scheduled.
    pub fn has_pending_timer(&self) -> bool {
        self.timers.is_pending()
    }

    /// Stop all deferred work. Nothing is persisted afterwards.
    pub async fn teardown(&self) {
        let mut inner = self.inner.write().await;
        inner.closed = true;
        self.timers.cancel();
        tracing::debug!(session_id = %self.session_id, "Session torn down");
    }

    async fn apply_answer(self: &Arc<Self>, inner: &mut Inner, answer: Answer) -> Transition {
        self.timers.cancel();
        inner.pending_selection = None;
        let transition = inner.engine.submit_answer(answer);
        self.settle(inner, &transition).await;
        transition
    }

    async fn settle(self: &Arc<Self>, inner: &mut Inner, transition: &Transition) {
        if let Transition::Advanced { from, to } = transition {
            tracing::info!(session_id = %self.session_id, from = %from, to = %to, "Step transition");
            self.enter_step(inner);
        }
        self.persist(inner).await;
    }

    /// Reset per-step transient state and start the loading sequence if the
    /// session just landed on a loading step.
    fn enter_step(self: &Arc<Self>, inner: &mut Inner) {
        self.timers.cancel();
        inner.pending_selection = None;
        inner.loading_started = None;

        let Some(step) = inner.engine.current_step() else {
            return;
        };
        if !step.is_loading() {
            return;
        }

        let step_id = step.id.clone();
        let total = self.settings.loading_total();
        inner.loading_started = Some(Instant::now());
        let weak = Arc::downgrade(self);
        self.timers.schedule(move |ticket| async move {
            tokio::time::sleep(total).await;
            if let Some(manager) = weak.upgrade() {
                manager.finish_loading(ticket, &step_id).await;
            }
        });
    }

    async fn fire_selection(self: &Arc<Self>, ticket: TimerTicket, step_id: &str, answer: Answer) {
        let mut inner = self.inner.write().await;
        if !self.timers.claim(ticket) || inner.closed {
            return;
        }
        if inner.engine.state().current_step_id != step_id {
            tracing::debug!(session_id = %self.session_id, step_id = %step_id, "Stale selection timer");
            return;
        }
        self.apply_answer(&mut inner, answer).await;
    }

    async fn finish_loading(self: &Arc<Self>, ticket: TimerTicket, step_id: &str) {
        let mut inner = self.inner.write().await;
        if !self.timers.claim(ticket) || inner.closed {
            return;
        }
        let Some(step) = inner.engine.current_step().filter(|s| s.id == step_id).cloned() else {
            tracing::debug!(session_id = %self.session_id, step_id = %step_id, "Stale loading timer");
            return;
        };
        let Some(next) = inner.engine.flow().next_step_id(&step, None).map(str::to_string) else {
            tracing::warn!(session_id = %self.session_id, step_id = %step_id, "Loading step has no successor");
            inner.loading_started = None;
            return;
        };
        match inner.engine.go_to_step(&next) {
            Ok(transition) => self.settle(&mut inner, &transition).await,
            Err(e) => tracing::warn!(session_id = %self.session_id, "Failed to leave loading step: {}", e),
        }
    }

    /// Write the session blob. Failures are logged, never surfaced.
    async fn persist(&self, inner: &Inner) {
        if inner.closed {
            return;
        }
        let blob = PersistedSession::capture(inner.engine.state(), self.settings.persist_mode);
        let value = match serde_json::to_value(&blob) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, "Failed to serialize onboarding state: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .db
            .set_setting(&self.session_id, settings_keys::ONBOARDING_STATE, &value)
            .await
        {
            tracing::warn!(session_id = %self.session_id, "Failed to persist onboarding state: {}", e);
        }
    }
}

impl std::fmt::Debug for OnboardingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardingManager")
            .field("session_id", &self.session_id)
            .field("timers", &self.timers)
            .finish()
    }
}

fn current(inner: &Inner) -> Result<Step, SessionError> {
    inner
        .engine
        .current_step()
        .cloned()
        .ok_or_else(|| SessionError::Navigation(crate::error::FlowError::UnknownStep {
            id: inner.engine.state().current_step_id.clone(),
        }))
}

/// All live sessions, keyed by session id.
pub struct SessionRegistry {
    flow: Arc<FlowDefinition>,
    db: Arc<dyn Database>,
    settings: SessionSettings,
    sessions: RwLock<HashMap<String, Arc<OnboardingManager>>>,
}

impl SessionRegistry {
    pub fn new(flow: Arc<FlowDefinition>, db: Arc<dyn Database>, settings: SessionSettings) -> Self {
        Self {
            flow,
            db,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn flow(&self) -> &Arc<FlowDefinition> {
        &self.flow
    }

    /// Open a fresh session for the given entry context.
    pub async fn create(&self, company: &str, role: &str) -> Arc<OnboardingManager> {
        let id = uuid::Uuid::new_v4().to_string();
        let manager =
            OnboardingManager::open(&id, Arc::clone(&self.flow), Arc::clone(&self.db), self.settings.clone())
                .await;
        manager.set_context(company, role).await;
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::clone(&manager));
        tracing::info!(session_id = %id, company = %company, role = %role, "Session created");
        manager
    }

    /// Look up a live session, re-opening it from storage if needed.
    pub async fn get(&self, id: &str) -> Result<Arc<OnboardingManager>, SessionError> {
        if let Some(manager) = self.sessions.read().await.get(id) {
            manager.touch();
            return Ok(Arc::clone(manager));
        }

        let mut sessions = self.sessions.write().await;
        if let Some(manager) = sessions.get(id) {
            manager.touch();
            return Ok(Arc::clone(manager));
        }
        if !self.is_persisted(id).await {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        let manager =
            OnboardingManager::open(id, Arc::clone(&self.flow), Arc::clone(&self.db), self.settings.clone())
                .await;
        sessions.insert(id.to_string(), Arc::clone(&manager));
        Ok(manager)
    }

    /// Tear a session down and forget its persisted state.
    pub async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let live = self.sessions.write().await.remove(id);
        if let Some(manager) = &live {
            manager.teardown().await;
        }
        let deleted = match self
            .db
            .delete_setting(id, settings_keys::ONBOARDING_STATE)
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(session_id = %id, "Failed to delete onboarding state: {}", e);
                false
            }
        };
        if live.is_none() && !deleted {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        tracing::info!(session_id = %id, "Session removed");
        Ok(())
    }

    /// Drop sessions nobody has touched for `idle_timeout` from memory.
    ///
    /// Their persisted state stays, so `get` can reopen them. Sessions with a
    /// pending step timer or still held by a caller are kept. Returns the
    /// number evicted.
    pub async fn prune_idle(&self, idle_timeout: Duration) -> usize {
        let evicted: Vec<Arc<OnboardingManager>> = {
            let mut sessions = self.sessions.write().await;
            let stale: Vec<String> = sessions
                .iter()
                .filter(|(_, m)| {
                    Arc::strong_count(m) == 1 && !m.has_pending_timer() && m.idle_for() >= idle_timeout
                })
                .map(|(id, _)| id.clone())
                .collect();
            stale.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for manager in &evicted {
            manager.teardown().await;
        }
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "Evicted idle sessions");
        }
        evicted.len()
    }

    /// Periodically evict sessions idle longer than the configured timeout.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let idle_timeout = self.settings.idle_timeout;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await; // Skip immediate first tick
            loop {
                interval.tick().await;
                registry.prune_idle(idle_timeout).await;
            }
        })
    }

    /// Number of sessions held in memory.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Ids of every persisted session, oldest first.
    pub async fn persisted_ids(&self) -> Vec<String> {
        match self
            .db
            .list_setting_owners(settings_keys::ONBOARDING_STATE)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Failed to list persisted sessions: {}", e);
                Vec::new()
            }
        }
    }

    async fn is_persisted(&self, id: &str) -> bool {
        match self
            .db
            .get_setting(id, settings_keys::ONBOARDING_STATE)
            .await
        {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::warn!(session_id = %id, "Failed to look up onboarding state: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::DatabaseError;
    use crate::flow::canonical;
    use crate::flow::step_ids::*;
    use crate::onboarding::state::PersistMode;
    use crate::store::LibSqlBackend;

    fn fast_settings() -> SessionSettings {
        SessionSettings {
            auto_advance_delay: Duration::from_millis(20),
            ..SessionSettings::default()
        }
        .with_loading_scale(0.01)
        .unwrap()
    }

    async fn memory_db() -> Arc<dyn Database> {
        Arc::new(LibSqlBackend::new_memory().await.unwrap())
    }

    async fn open(db: &Arc<dyn Database>, settings: SessionSettings) -> Arc<OnboardingManager> {
        OnboardingManager::open("s1", canonical(), Arc::clone(db), settings).await
    }

    async fn on_timeline(db: &Arc<dyn Database>) -> Arc<OnboardingManager> {
        let manager = open(db, fast_settings()).await;
        manager.continue_step().await.unwrap();
        assert_eq!(manager.state().await.current_step_id, TIMELINE);
        manager
    }

    /// Database whose writes always fail.
    struct BrokenDb;

    #[async_trait]
    impl Database for BrokenDb {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            Ok(())
        }
        async fn get_setting(&self, _: &str, _: &str) -> Result<Option<serde_json::Value>, DatabaseError> {
            Err(DatabaseError::Query("offline".to_string()))
        }
        async fn set_setting(&self, _: &str, _: &str, _: &serde_json::Value) -> Result<(), DatabaseError> {
            Err(DatabaseError::Query("offline".to_string()))
        }
        async fn delete_setting(&self, _: &str, _: &str) -> Result<bool, DatabaseError> {
            Err(DatabaseError::Query("offline".to_string()))
        }
        async fn list_setting_owners(&self, _: &str) -> Result<Vec<String>, DatabaseError> {
            Err(DatabaseError::Query("offline".to_string()))
        }
    }

    #[test]
    fn loading_progress_fills_per_stage() {
        let stages = SessionSettings::default().loading_stages;

        let start = LoadingProgress::at(&stages, Duration::ZERO);
        assert_eq!(start.stage, 0);
        assert_eq!(start.percent, 0);
        assert_eq!(start.stage_text.as_deref(), Some("Analyzing your experience level..."));
        assert!(start.completed_stages.is_empty());

        let mid_second = LoadingProgress::at(&stages, Duration::from_millis(1700));
        assert_eq!(mid_second.stage, 1);
        assert_eq!(mid_second.percent, 37);
        assert_eq!(mid_second.completed_stages, vec!["Analyzing your experience level"]);

        let done = LoadingProgress::at(&stages, Duration::from_secs(10));
        assert_eq!(done.stage, 4);
        assert_eq!(done.percent, 100);
        assert!(done.stage_text.is_none());
        assert_eq!(done.completed_stages.len(), 4);
    }

    #[tokio::test]
    async fn answers_are_validated() {
        let db = memory_db().await;
        let manager = on_timeline(&db).await;

        let err = manager
            .submit_answer(Answer::single("next-year"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidAnswer { .. }));
        let err = manager
            .submit_answer(Answer::multi(["this-week"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidAnswer { .. }));

        let state = manager.state().await;
        assert_eq!(state.current_step_id, TIMELINE);
        assert!(state.answers.is_empty());

        let t = manager.submit_answer(Answer::single("this-week")).await.unwrap();
        assert_eq!(t.current(), EXPERIENCE);
    }

    #[tokio::test]
    async fn wrong_step_actions_are_rejected() {
        let db = memory_db().await;
        let manager = open(&db, fast_settings()).await;
        let err = manager.submit_answer(Answer::single("x")).await.unwrap_err();
        assert!(matches!(err, SessionError::WrongStep { kind: "welcome", .. }));
        assert_eq!(err.to_string(), "welcome step welcome does not accept answers");
        assert!(matches!(
            manager.select_option("x").await,
            Err(SessionError::WrongStep { .. })
        ));

        manager.continue_step().await.unwrap();
        assert!(matches!(
            manager.continue_step().await,
            Err(SessionError::WrongStep { .. })
        ));
        assert!(matches!(
            manager.go_to_step("nowhere").await,
            Err(SessionError::Navigation(_))
        ));
    }

    #[tokio::test]
    async fn selection_auto_advances() {
        let db = memory_db().await;
        let manager = on_timeline(&db).await;

        manager.select_option("1-month").await.unwrap();
        let view = manager.view().await;
        assert_eq!(view.pending_selection.as_deref(), Some("1-month"));
        assert_eq!(view.state.current_step_id, TIMELINE);
        assert!(manager.has_pending_timer());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let view = manager.view().await;
        assert_eq!(view.state.current_step_id, EXPERIENCE);
        assert!(view.pending_selection.is_none());
        assert_eq!(view.state.answers[TIMELINE], Answer::single("1-month"));
    }

    #[tokio::test]
    async fn navigation_cancels_pending_selection() {
        let db = memory_db().await;
        let manager = on_timeline(&db).await;

        manager.select_option("exploring").await.unwrap();
        assert!(manager.go_back().await);
        assert!(!manager.has_pending_timer());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let state = manager.state().await;
        assert_eq!(state.current_step_id, WELCOME);
        assert!(state.answers.is_empty());
    }

    #[tokio::test]
    async fn reselecting_replaces_pending_choice() {
        let db = memory_db().await;
        let manager = on_timeline(&db).await;

        manager.select_option("this-week").await.unwrap();
        manager.select_option("exploring").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let state = manager.state().await;
        assert_eq!(state.current_step_id, EXPERIENCE);
        assert_eq!(state.answers[TIMELINE], Answer::single("exploring"));
    }

    #[tokio::test]
    async fn loading_advances_to_plan() {
        let db = memory_db().await;
        let manager = open(&db, fast_settings()).await;
        manager.go_to_step(PAST_ATTEMPTS).await.unwrap();
        manager
            .submit_answer(Answer::single("first-time"))
            .await
            .unwrap();

        let view = manager.view().await;
        assert_eq!(view.state.current_step_id, LOADING);
        assert!(view.loading.is_some());
        assert!(!view.can_go_back);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let view = manager.view().await;
        assert_eq!(view.state.current_step_id, PLAN);
        assert!(view.loading.is_none());
        assert_eq!(view.state.history.last().map(String::as_str), Some(LOADING));
    }

    #[tokio::test]
    async fn leaving_loading_cancels_sequence() {
        let db = memory_db().await;
        let manager = open(&db, fast_settings()).await;
        manager.go_to_step(LOADING).await.unwrap();
        assert!(manager.has_pending_timer());
        manager.go_to_step(WEAK_AREAS).await.unwrap();
        assert!(!manager.has_pending_timer());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(manager.state().await.current_step_id, WEAK_AREAS);
    }

    #[tokio::test]
    async fn partial_persistence_restarts_at_welcome() {
        let db = memory_db().await;
        {
            let manager = on_timeline(&db).await;
            manager.set_context("google", "software-engineer").await;
            manager
                .submit_answer(Answer::single("this-week"))
                .await
                .unwrap();
        }

        let reopened = open(&db, fast_settings()).await;
        let state = reopened.state().await;
        assert_eq!(state.current_step_id, WELCOME);
        assert!(state.history.is_empty());
        assert_eq!(state.answers[TIMELINE], Answer::single("this-week"));
        assert_eq!(state.company.as_deref(), Some("google"));
    }

    #[tokio::test]
    async fn full_persistence_restores_position() {
        let db = memory_db().await;
        let settings = SessionSettings {
            persist_mode: PersistMode::Full,
            ..fast_settings()
        };
        let before = {
            let manager = open(&db, settings.clone()).await;
            manager.continue_step().await.unwrap();
            manager
                .submit_answer(Answer::single("1-2-weeks"))
                .await
                .unwrap();
            manager.state().await
        };

        let reopened = open(&db, settings).await;
        assert_eq!(reopened.state().await, before);
        assert!(reopened.view().await.can_go_back);
    }

    #[tokio::test]
    async fn full_persistence_resumes_loading() {
        let db = memory_db().await;
        let settings = SessionSettings {
            persist_mode: PersistMode::Full,
            ..fast_settings()
        };
        db.set_setting(
            "s1",
            settings_keys::ONBOARDING_STATE,
            &serde_json::json!({"answers": {}, "isComplete": false, "currentStepId": "loading", "history": ["welcome"]}),
        )
        .await
        .unwrap();

        let reopened = open(&db, settings).await;
        assert!(reopened.has_pending_timer());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(reopened.state().await.current_step_id, PLAN);
    }

    #[tokio::test]
    async fn persist_failures_are_not_surfaced() {
        let db: Arc<dyn Database> = Arc::new(BrokenDb);
        let manager = open(&db, fast_settings()).await;
        manager.set_context("meta", "designer").await;
        let t = manager.continue_step().await.unwrap();
        assert_eq!(t.current(), TIMELINE);
        manager.complete_onboarding().await;
        assert!(manager.state().await.is_complete);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let db = memory_db().await;
        let manager = on_timeline(&db).await;
        manager.set_context("google", "designer").await;
        manager
            .submit_answer(Answer::single("exploring"))
            .await
            .unwrap();
        manager.reset().await;
        assert_eq!(manager.state().await, SessionState::default());

        let stored = db
            .get_setting("s1", settings_keys::ONBOARDING_STATE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["answers"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn view_and_plan_use_entry_context() {
        let db = memory_db().await;
        let manager = open(&db, fast_settings()).await;
        manager.set_context("Netflix", "data-scientist").await;
        manager.go_to_step(WEAK_AREAS).await.unwrap();
        manager
            .submit_answer(Answer::multi(["system-design"]))
            .await
            .unwrap();

        let view = manager.view().await;
        assert_eq!(view.company_name.as_deref(), Some("Netflix"));
        assert_eq!(view.role_name.as_deref(), Some("Data Scientist"));
        assert_eq!(
            view.tagline.as_deref(),
            Some("Let's help you ace your Netflix interview")
        );

        let plan = manager.plan_view().await;
        assert_eq!(plan.summary, "4 weeks • 1 focus area");
        assert_eq!(
            plan.headline,
            "Great news! I've created a personalized 4 weeks plan for your Data Scientist interview at Netflix."
        );
        assert_eq!(plan.plan.focus_areas[0].name, "System Design");
    }

    #[tokio::test]
    async fn registry_lifecycle() {
        let db = memory_db().await;
        let registry = SessionRegistry::new(canonical(), Arc::clone(&db), fast_settings());
        assert!(registry.is_empty().await);

        let manager = registry.create("google", "software-engineer").await;
        let id = manager.session_id().to_string();
        assert_eq!(registry.len().await, 1);
        assert!(Arc::ptr_eq(&manager, &registry.get(&id).await.unwrap()));
        assert_eq!(registry.persisted_ids().await, vec![id.clone()]);

        registry.remove(&id).await.unwrap();
        assert_eq!(registry.len().await, 0);
        assert!(matches!(
            registry.get(&id).await,
            Err(SessionError::NotFound { .. })
        ));
        assert!(matches!(
            registry.remove(&id).await,
            Err(SessionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn registry_reopens_persisted_sessions() {
        let db = memory_db().await;
        let id = {
            let registry = SessionRegistry::new(canonical(), Arc::clone(&db), fast_settings());
            let manager = registry.create("apple", "designer").await;
            manager.continue_step().await.unwrap();
            manager
                .submit_answer(Answer::single("1-month"))
                .await
                .unwrap();
            manager.session_id().to_string()
        };

        let registry = SessionRegistry::new(canonical(), db, fast_settings());
        assert_eq!(registry.len().await, 0);
        let manager = registry.get(&id).await.unwrap();
        let state = manager.state().await;
        assert_eq!(state.company.as_deref(), Some("apple"));
        assert_eq!(state.answers[TIMELINE], Answer::single("1-month"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn removed_session_stops_timers() {
        let db = memory_db().await;
        let registry = SessionRegistry::new(canonical(), Arc::clone(&db), fast_settings());
        let manager = registry.create("google", "designer").await;
        let id = manager.session_id().to_string();
        manager.continue_step().await.unwrap();
        manager.select_option("this-week").await.unwrap();

        registry.remove(&id).await.unwrap();
        assert!(!manager.has_pending_timer());
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(manager.state().await.current_step_id, TIMELINE);
        assert!(
            db.get_setting(&id, settings_keys::ONBOARDING_STATE)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_and_reopened() {
        let db = memory_db().await;
        let settings = SessionSettings {
            persist_mode: PersistMode::Full,
            ..fast_settings()
        };
        let registry = SessionRegistry::new(canonical(), Arc::clone(&db), settings);

        let idle_id = {
            let manager = registry.create("meta", "designer").await;
            manager.continue_step().await.unwrap();
            manager
                .submit_answer(Answer::single("1-month"))
                .await
                .unwrap();
            manager.session_id().to_string()
        };
        let held = registry.create("google", "designer").await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(registry.prune_idle(Duration::from_millis(20)).await, 1);
        assert_eq!(registry.len().await, 1);
        assert!(Arc::ptr_eq(
            &held,
            &registry.get(held.session_id()).await.unwrap()
        ));

        let reopened = registry.get(&idle_id).await.unwrap();
        let state = reopened.state().await;
        assert_eq!(state.current_step_id, EXPERIENCE);
        assert_eq!(state.answers[TIMELINE], Answer::single("1-month"));
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn touched_or_timed_sessions_are_not_evicted() {
        let db = memory_db().await;
        let registry = SessionRegistry::new(canonical(), Arc::clone(&db), fast_settings());

        let touched = registry.create("google", "designer").await.session_id().to_string();
        tokio::time::sleep(Duration::from_millis(30)).await;
        registry.get(&touched).await.unwrap();
        assert_eq!(registry.prune_idle(Duration::from_millis(20)).await, 0);

        let timed = {
            let manager = registry.create("apple", "designer").await;
            manager.continue_step().await.unwrap();
            manager.select_option("this-week").await.unwrap();
            manager.session_id().to_string()
        };
        assert_eq!(registry.prune_idle(Duration::ZERO).await, 1);
        assert_eq!(registry.len().await, 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let manager = registry.get(&timed).await.unwrap();
        assert_eq!(manager.state().await.current_step_id, EXPERIENCE);
        drop(manager);

        assert_eq!(registry.prune_idle(Duration::ZERO).await, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn idle_sweeper_evicts_in_background() {
        let db = memory_db().await;
        let settings = SessionSettings {
            idle_timeout: Duration::from_millis(20),
            ..fast_settings()
        };
        let registry = Arc::new(SessionRegistry::new(canonical(), db, settings));
        let sweeper = registry.spawn_idle_sweeper(Duration::from_millis(10));

        let id = registry.create("netflix", "designer").await.session_id().to_string();
        assert_eq!(registry.len().await, 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(registry.is_empty().await);
        assert!(registry.get(&id).await.is_ok());

        sweeper.abort();
    }
}
