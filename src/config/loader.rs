//! Configuration loading from disk or the environment.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::schema::BridgeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the whole TOML document when no file exists.
pub const CONFIG_ENV_VAR: &str = "COLLECTOR_BRIDGE_CONFIG";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    NotFound(PathBuf),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::NotFound(path) => write!(
                f,
                "no config file at {} and {} is not set",
                path.display(),
                CONFIG_ENV_VAR
            ),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate a TOML document.
pub fn parse_config(content: &str) -> Result<BridgeConfig, ConfigError> {
    let config: BridgeConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Load from `path`, or from [`CONFIG_ENV_VAR`] when the file does not exist.
pub fn load_config_or_env(path: &Path) -> Result<BridgeConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => match std::env::var(CONFIG_ENV_VAR) {
            Ok(content) if !content.trim().is_empty() => {
                tracing::info!(variable = CONFIG_ENV_VAR, "Loading configuration from environment");
                parse_config(&content)
            }
            _ => Err(ConfigError::NotFound(path.to_path_buf())),
        },
        Err(e) => Err(ConfigError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [primary_server]
        server_location = "https://rtcv.example.com"
        api_key_id = "key-id"
        api_key = "key"
    "#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.listener.port_range_start, 4001);
        assert_eq!(config.listener.port_range_end, 6000);
        assert_eq!(config.bridge.short_pickup_ms, 1_000);
        assert_eq!(config.bridge.long_pickup_ms, 30_000);
        assert_eq!(config.cache.long_ttl_hours, 72);
        assert_eq!(config.cache.short_ttl_hours, 12);
        assert_eq!(config.retries.max_retries, 3);
        assert!(!config.mock_mode);

        let credentials = config.credentials();
        assert_eq!(credentials.len(), 1);
        assert!(credentials[0].primary);
    }

    #[test]
    fn test_alternatives_follow_primary() {
        let content = format!(
            "{MINIMAL}
            [[alternative_servers]]
            server_location = \"http://backup.local\"
            api_key_id = \"b\"
            api_key = \"bk\"
            "
        );
        let config = parse_config(&content).unwrap();
        let credentials = config.credentials();
        assert_eq!(credentials.len(), 2);
        assert!(credentials[0].primary);
        assert!(!credentials[1].primary);
        assert_eq!(credentials[1].server_location, "http://backup.local");
    }

    #[test]
    fn test_login_users_accept_camel_case_encrypted_password() {
        let content = format!(
            "public_key = \"cHVi\"
            private_key = \"cHJpdg==\"
            {MINIMAL}
            [[login_users]]
            username = \"alice\"
            encryptedPassword = \"c2VhbGVk\"
            "
        );
        let config = parse_config(&content).unwrap();
        assert_eq!(config.login_users[0].encrypted_password.as_deref(), Some("c2VhbGVk"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("mock_mode = maybe").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = Path::new("definitely/not/here/bridge.toml");
        let err = load_config(path).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
