//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{AppConfig, StoreBackend};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_with(path, |var| std::env::var(var).ok())
}

/// Same as [`load_config`] with an injectable variable lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("JWT_SECRET_KEY") {
        config.jwt.secret_key = secret;
    }
    if let Some(value) = lookup("JWT_EXPIRATION_SECS") {
        config.jwt.expiration_secs = parse_var("JWT_EXPIRATION_SECS", value)?;
    }
    if let Some(value) = lookup("STORE_BACKEND") {
        config.store.backend = match value.to_ascii_lowercase().as_str() {
            "redis" => StoreBackend::Redis,
            "memory" => StoreBackend::Memory,
            _ => {
                return Err(ConfigError::Env {
                    var: "STORE_BACKEND",
                    value,
                })
            }
        };
    }
    if let Some(host) = lookup("REDIS_HOST") {
        config.redis.host = host;
    }
    if let Some(value) = lookup("REDIS_PORT") {
        config.redis.port = parse_var("REDIS_PORT", value)?;
    }
    if let Some(password) = lookup("REDIS_PASSWORD") {
        config.redis.password = Some(password).filter(|p| !p.is_empty());
    }
    if let Some(value) = lookup("REDIS_TLS") {
        config.redis.tls = parse_bool("REDIS_TLS", value)?;
    }
    if let Some(value) = lookup("RATE_LIMIT_ENABLED") {
        config.rate_limit.enabled = parse_bool("RATE_LIMIT_ENABLED", value)?;
    }
    if let Some(value) = lookup("REVOCATION_ENABLED") {
        config.revocation.enabled = parse_bool("REVOCATION_ENABLED", value)?;
    }
    if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(email) = lookup("ADMIN_EMAIL") {
        config.admin.email = Some(email);
    }
    if let Some(password) = lookup("ADMIN_PASSWORD") {
        config.admin.password = Some(password);
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_only_config() {
        let config = load_config_with(
            None,
            env(&[
                ("JWT_SECRET_KEY", SECRET),
                ("STORE_BACKEND", "memory"),
                ("RATE_LIMIT_ENABLED", "false"),
                ("JWT_EXPIRATION_SECS", "120"),
            ]),
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.jwt.expiration_secs, 120);
    }

    #[test]
    fn test_missing_secret_fails_validation() {
        let err = load_config_with(None, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_bad_env_value() {
        let err = load_config_with(
            None,
            env(&[("JWT_SECRET_KEY", SECRET), ("REDIS_PORT", "abc")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "REDIS_PORT", .. }));
    }

    #[test]
    fn test_cors_origins_from_env() {
        let config = load_config_with(
            None,
            env(&[
                ("JWT_SECRET_KEY", SECRET),
                (
                    "CORS_ALLOWED_ORIGINS",
                    "http://localhost:4200, https://app.example.com,",
                ),
            ]),
        )
        .unwrap();
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://localhost:4200", "https://app.example.com"]
        );

        let err = load_config_with(
            None,
            env(&[("JWT_SECRET_KEY", SECRET), ("CORS_ALLOWED_ORIGINS", "localhost")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_file_then_env_override() {
        let dir = std::env::temp_dir().join(format!("task-tracker-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(
            &path,
            format!(
                r#"
[jwt]
secret_key = "{SECRET}"

[redis]
host = "cache.internal"
port = 6380

[rate_limit]
capacity = 5
"#
            ),
        )
        .unwrap();

        let config = load_config_with(Some(&path), env(&[("REDIS_HOST", "override")])).unwrap();
        assert_eq!(config.redis.host, "override");
        assert_eq!(config.redis.port, 6380);
        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.rate_limit.refill_tokens, 10);

        fs::remove_dir_all(&dir).ok();
    }
}
