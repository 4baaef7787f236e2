use booking_flow::JumpPolicy;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid JUMP_POLICY '{0}': expected 'unrestricted' or 'validated_forward'")]
    InvalidJumpPolicy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Service settings, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_addr: String,
    /// When set, bookings and sessions are kept in PostgreSQL.
    pub database_url: Option<String>,
    pub jump_policy: JumpPolicy,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            jump_policy: JumpPolicy::Unrestricted,
            log_format: LogFormat::Json,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jump_policy = match non_empty("JUMP_POLICY").as_deref().map(str::trim) {
            None | Some("unrestricted") => JumpPolicy::Unrestricted,
            Some("validated_forward") => JumpPolicy::ValidatedForward,
            Some(other) => return Err(ConfigError::InvalidJumpPolicy(other.to_string())),
        };

        // Anything other than "pretty" keeps structured output.
        let log_format = match non_empty("LOG_FORMAT").as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: non_empty("DATABASE_URL"),
            jump_policy,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config(&[]).unwrap(), ServiceConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = config(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("DATABASE_URL", "postgres://localhost/bookings"),
            ("JUMP_POLICY", "validated_forward"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/bookings"));
        assert_eq!(config.jump_policy, JumpPolicy::ValidatedForward);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_unknown_jump_policy() {
        assert_eq!(
            config(&[("JUMP_POLICY", "sometimes")]),
            Err(ConfigError::InvalidJumpPolicy("sometimes".into()))
        );
    }
}
