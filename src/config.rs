//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;
use crate::onboarding::state::PersistMode;

/// One stage of the loading step's progress sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadingStage {
    pub text: String,
    #[serde(skip)]
    pub duration: Duration,
}

impl LoadingStage {
    pub fn new(text: &str, millis: u64) -> Self {
        Self {
            text: text.to_string(),
            duration: Duration::from_millis(millis),
        }
    }
}

/// Per-session behavior shared by every session a registry opens.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// What survives a reload.
    pub persist_mode: PersistMode,
    /// Delay between picking a multiple-choice option and advancing.
    pub auto_advance_delay: Duration,
    /// Stages shown while the loading step runs, in order.
    pub loading_stages: Vec<LoadingStage>,
    /// Pause after the last stage before moving to the plan.
    pub loading_finish_delay: Duration,
    /// How long an untouched session stays in memory. Zero keeps sessions
    /// until they are removed.
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            persist_mode: PersistMode::Partial,
            auto_advance_delay: Duration::from_millis(300),
            loading_stages: vec![
                LoadingStage::new("Analyzing your experience level...", 1200),
                LoadingStage::new("Identifying key focus areas...", 1000),
                LoadingStage::new("Reviewing company-specific patterns...", 1200),
                LoadingStage::new("Building your personalized plan...", 1100),
            ],
            loading_finish_delay: Duration::from_millis(400),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl SessionSettings {
    /// Scale every loading duration by `factor` (0 makes loading instant).
    ///
    /// Rejects negative or non-finite factors and factors that would push
    /// any duration, or their total, past what `Duration` can hold.
    pub fn with_loading_scale(mut self, factor: f64) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "COACH_LOADING_SCALE".to_string(),
            message,
        };
        if !factor.is_finite() || factor < 0.0 {
            return Err(invalid(format!("must be a non-negative number, got {factor}")));
        }
        let scale = |d: Duration| {
            Duration::try_from_secs_f64(d.as_secs_f64() * factor)
                .map_err(|_| invalid(format!("{factor} makes loading durations overflow")))
        };

        for stage in &mut self.loading_stages {
            stage.duration = scale(stage.duration)?;
        }
        self.loading_finish_delay = scale(self.loading_finish_delay)?;

        self.loading_stages
            .iter()
            .map(|s| s.duration)
            .chain([self.loading_finish_delay])
            .try_fold(Duration::ZERO, Duration::checked_add)
            .ok_or_else(|| invalid(format!("{factor} makes the loading total overflow")))?;
        Ok(self)
    }

    /// Total time the loading step takes before advancing.
    pub fn loading_total(&self) -> Duration {
        self.loading_stages
            .iter()
            .map(|s| s.duration)
            .sum::<Duration>()
            + self.loading_finish_delay
    }
}

/// Process-level configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct CoachConfig {
    pub http_port: u16,
    pub db_path: PathBuf,
    /// Custom flow file; the built-in flow is used when unset.
    pub flow_path: Option<PathBuf>,
    pub session: SessionSettings,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: PathBuf::from("./data/coach.db"),
            flow_path: None,
            session: SessionSettings::default(),
        }
    }
}

impl CoachConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// Unparseable numbers fall back to their defaults; an unknown persist
    /// mode or an out-of-range loading scale is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let http_port: u16 = lookup("COACH_HTTP_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .unwrap_or(defaults.http_port);

        let db_path = lookup("COACH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let flow_path = lookup("COACH_FLOW_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let persist_mode = match lookup("COACH_PERSIST_MODE") {
            Some(raw) => raw
                .parse::<PersistMode>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "COACH_PERSIST_MODE".to_string(),
                    message,
                })?,
            None => PersistMode::default(),
        };

        let auto_advance_ms: u64 = lookup("COACH_AUTO_ADVANCE_MS")
            .unwrap_or_else(|| "300".to_string())
            .parse()
            .unwrap_or(300);

        let loading_scale: f64 = match lookup("COACH_LOADING_SCALE") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::ParseError(format!("COACH_LOADING_SCALE: {e}")))?,
            None => 1.0,
        };

        let idle_secs: u64 = lookup("COACH_SESSION_IDLE_SECS")
            .unwrap_or_else(|| "1800".to_string())
            .parse()
            .unwrap_or(1800);

        let session = SessionSettings {
            persist_mode,
            auto_advance_delay: Duration::from_millis(auto_advance_ms),
            idle_timeout: Duration::from_secs(idle_secs),
            ..SessionSettings::default()
        }
        .with_loading_scale(loading_scale)?;

        Ok(Self {
            http_port,
            db_path,
            flow_path,
            session,
        })
    }
}
