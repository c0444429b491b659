//! Onboarding sessions: state, the flow engine that moves it, and the
//! adapters that expose it.
//!
//! A session walks the shared `FlowDefinition` one step at a time. The
//! `FlowEngine` owns the transition rules; the `OnboardingManager` wraps it
//! with validation, deferred step timers, and persistence.

pub mod engine;
pub mod manager;
pub mod routes;
pub mod state;
pub mod timers;

pub use engine::{FlowEngine, Transition};
pub use manager::{LoadingProgress, OnboardingManager, PlanView, SessionRegistry, SessionView};
pub use routes::{AppState, onboarding_routes};
pub use state::{PersistMode, PersistedSession, SessionState};
pub use timers::StepTimers;
