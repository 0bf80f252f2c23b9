use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) backend: BackendSettings,
    pub(super) session: SessionSettings,
    pub(super) resume: ResumeSettings,
    pub(super) gesture: GestureSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct BackendSettings {
    pub(crate) base_url: String,
    pub(crate) auth_token: String,
    pub(crate) request_timeout_seconds: u64,
    pub(crate) connect_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct SessionSettings {
    pub(crate) token: Option<String>,
    pub(crate) tick_interval_seconds: u64,
    pub(crate) finish_retry_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct ResumeSettings {
    pub(crate) dir: String,
}

#[derive(Debug, Clone)]
pub(crate) struct GestureSettings {
    pub(crate) pointer_distance_px: f64,
    pub(crate) touch_delay_ms: u64,
    pub(crate) touch_tolerance_px: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid backend base url: {0}")]
    InvalidBaseUrl(String),
    #[error("missing required setting {0}")]
    MissingRequired(&'static str),
}
