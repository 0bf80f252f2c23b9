use super::parsing::{
    env_optional, env_or_default, normalize_base_url, parse_bool, parse_environment, parse_f64,
    parse_u64,
};
use super::types::{
    BackendSettings, ConfigError, Environment, GestureSettings, ResumeSettings, RuntimeSettings,
    SessionSettings, Settings, TelemetrySettings,
};

impl Settings {
    /// Reads the full configuration from `CBT_*` environment variables,
    /// applying defaults suitable for local development.
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment = parse_environment(&env_or_default("CBT_ENV", "development"))?;
        let strict_default = environment.is_production();
        let strict_config = match env_optional("CBT_STRICT_CONFIG") {
            Some(raw) => parse_bool("CBT_STRICT_CONFIG", &raw)?,
            None => strict_default,
        };
        let runtime = RuntimeSettings { environment, strict_config };

        let backend = Self::load_backend(&runtime)?;
        let session = Self::load_session()?;
        let resume = ResumeSettings { dir: env_or_default("CBT_RESUME_DIR", ".cbt-resume") };
        let gesture = Self::load_gesture()?;
        let telemetry = TelemetrySettings {
            log_level: env_or_default("CBT_LOG_LEVEL", "info"),
            json: match env_optional("CBT_LOG_JSON") {
                Some(raw) => parse_bool("CBT_LOG_JSON", &raw)?,
                None => false,
            },
        };

        Ok(Self { runtime, backend, session, resume, gesture, telemetry })
    }

    fn load_backend(runtime: &RuntimeSettings) -> Result<BackendSettings, ConfigError> {
        let base_url =
            normalize_base_url(&env_or_default("CBT_API_BASE_URL", "http://localhost:8000/api/v1"))?;
        let auth_token = env_optional("CBT_API_TOKEN").unwrap_or_default();
        if runtime.strict_config && auth_token.is_empty() {
            return Err(ConfigError::MissingRequired("CBT_API_TOKEN"));
        }
        let request_timeout_seconds =
            parse_u64("CBT_REQUEST_TIMEOUT_SECONDS", &env_or_default("CBT_REQUEST_TIMEOUT_SECONDS", "30"))?;
        let connect_timeout_seconds =
            parse_u64("CBT_CONNECT_TIMEOUT_SECONDS", &env_or_default("CBT_CONNECT_TIMEOUT_SECONDS", "10"))?;
        Ok(BackendSettings { base_url, auth_token, request_timeout_seconds, connect_timeout_seconds })
    }

    fn load_session() -> Result<SessionSettings, ConfigError> {
        let tick_interval_seconds =
            parse_u64("CBT_TICK_INTERVAL_SECONDS", &env_or_default("CBT_TICK_INTERVAL_SECONDS", "1"))?;
        if tick_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "CBT_TICK_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }
        let finish_retry_seconds =
            parse_u64("CBT_FINISH_RETRY_SECONDS", &env_or_default("CBT_FINISH_RETRY_SECONDS", "5"))?;
        if finish_retry_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "CBT_FINISH_RETRY_SECONDS",
                value: "0".to_string(),
            });
        }
        Ok(SessionSettings {
            token: env_optional("CBT_SESSION_TOKEN"),
            tick_interval_seconds,
            finish_retry_seconds,
        })
    }

    fn load_gesture() -> Result<GestureSettings, ConfigError> {
        Ok(GestureSettings {
            pointer_distance_px: parse_f64(
                "CBT_POINTER_DISTANCE_PX",
                &env_or_default("CBT_POINTER_DISTANCE_PX", "8"),
            )?,
            touch_delay_ms: parse_u64("CBT_TOUCH_DELAY_MS", &env_or_default("CBT_TOUCH_DELAY_MS", "250"))?,
            touch_tolerance_px: parse_f64(
                "CBT_TOUCH_TOLERANCE_PX",
                &env_or_default("CBT_TOUCH_TOLERANCE_PX", "5"),
            )?,
        })
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub(crate) fn backend(&self) -> &BackendSettings {
        &self.backend
    }

    pub(crate) fn session(&self) -> &SessionSettings {
        &self.session
    }

    pub(crate) fn resume(&self) -> &ResumeSettings {
        &self.resume
    }

    pub(crate) fn gesture(&self) -> &GestureSettings {
        &self.gesture
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn environment(&self) -> Environment {
        self.runtime().environment
    }
}
