use super::types::{ConfigError, Environment};

pub(super) fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

pub(super) fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u64(field: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue { field, value: raw.to_string() })
}

pub(super) fn parse_f64(field: &'static str, raw: &str) -> Result<f64, ConfigError> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidValue { field, value: raw.to_string() })?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(ConfigError::InvalidValue { field, value: raw.to_string() });
    }
    Ok(parsed)
}

pub(super) fn parse_bool(field: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { field, value: raw.to_string() }),
    }
}

pub(super) fn parse_environment(raw: &str) -> Result<Environment, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "development" | "dev" | "local" => Ok(Environment::Development),
        "production" | "prod" => Ok(Environment::Production),
        "staging" | "stage" => Ok(Environment::Staging),
        "test" => Ok(Environment::Test),
        _ => Err(ConfigError::InvalidValue { field: "CBT_ENV", value: raw.to_string() }),
    }
}

/// Base urls are stored without a trailing slash so request paths can be
/// joined with a plain `format!`.
pub(super) fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u64_accepts_plain_numbers() {
        assert_eq!(parse_u64("X", "30").unwrap(), 30);
        assert_eq!(parse_u64("X", " 5 ").unwrap(), 5);
    }

    #[test]
    fn parse_u64_rejects_garbage() {
        assert!(parse_u64("X", "ten").is_err());
        assert!(parse_u64("X", "-1").is_err());
    }

    #[test]
    fn parse_f64_rejects_negative_and_nan() {
        assert!(parse_f64("X", "-0.5").is_err());
        assert!(parse_f64("X", "NaN").is_err());
        assert_eq!(parse_f64("X", "8").unwrap(), 8.0);
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "ON").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn parse_environment_accepts_aliases() {
        assert_eq!(parse_environment("dev").unwrap(), Environment::Development);
        assert_eq!(parse_environment("PROD").unwrap(), Environment::Production);
        assert!(parse_environment("cloud").is_err());
    }

    #[test]
    fn normalize_base_url_strips_trailing_slash() {
        assert_eq!(normalize_base_url("http://localhost:8000/api/v1/").unwrap(), "http://localhost:8000/api/v1");
        assert!(normalize_base_url("localhost:8000").is_err());
        assert!(normalize_base_url("   ").is_err());
    }
}
