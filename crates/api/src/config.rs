use std::path::PathBuf;
use std::str::FromStr;

use custody_core::error::CoreError;
use custody_core::lifecycle::{RulesConfig, TransitionRules};

/// Startup configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Failed to read transition rules from {}: {source}", .path.display())]
    RulesIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse transition rules from {}: {source}", .path.display())]
    RulesParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid transition rules: {0}")]
    Rules(#[from] CoreError),
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Postgres connection string. Required by the binary.
    pub database_url: Option<String>,
    /// Pool size (default: `20`).
    pub db_max_connections: u32,
    /// Optional JSON file overriding the built-in lifecycle table.
    pub transition_rules_path: Option<PathBuf>,
    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `DATABASE_URL`          | unset                   |
    /// | `DB_MAX_CONNECTIONS`    | `20`                    |
    /// | `TRANSITION_RULES_PATH` | unset (built-in table)  |
    /// | `LOG_FORMAT`            | `text` (`json` allowed) |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_var(&lookup, "PORT", "3000", "u16")?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_var(&lookup, "REQUEST_TIMEOUT_SECS", "30", "u64")?;
        let db_max_connections = parse_var(&lookup, "DB_MAX_CONNECTIONS", "20", "u32")?;

        let log_json = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => false,
            Some("json") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    expected: "log format (text or json)",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            db_max_connections,
            transition_rules_path: lookup("TRANSITION_RULES_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            log_json,
        })
    }

    /// Build the rule table: the built-in lifecycles, or the JSON file at
    /// `transition_rules_path` when one is configured.
    pub fn load_rules(&self) -> Result<TransitionRules, ConfigError> {
        let Some(path) = &self.transition_rules_path else {
            return Ok(TransitionRules::standard());
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::RulesIo {
            path: path.clone(),
            source,
        })?;
        let config: RulesConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::RulesParse {
                path: path.clone(),
                source,
            })?;

        Ok(TransitionRules::from_config(config)?)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    let value = lookup(var).unwrap_or_else(|| default.to_string());
    value.parse().map_err(|_| ConfigError::Invalid {
        var,
        expected,
        value,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;
    use custody_core::lifecycle::{AssetState, AssetType};

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.db_max_connections, 20);
        assert!(config.database_url.is_none());
        assert!(config.transition_rules_path.is_none());
        assert!(!config.log_json);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("DATABASE_URL", "postgres://localhost/custody"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/custody")
        );
        assert!(config.log_json);
    }

    #[test]
    fn bad_numbers_are_reported() {
        assert_matches!(
            config_from(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        );
        assert_matches!(
            config_from(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { var: "LOG_FORMAT", .. })
        );
    }

    #[test]
    fn rules_default_to_builtin_table() {
        let rules = config_from(&[]).unwrap().load_rules().unwrap();
        assert!(rules.is_legal(AssetType::Laptop, AssetState::Available, AssetState::SignedOut));
    }

    #[test]
    fn rules_load_from_file() {
        let path = std::env::temp_dir().join(format!("custody-rules-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{ "lifecycles": { "MONITOR": { "states": ["AVAILABLE", "ISSUED"] } } }"#,
        )
        .unwrap();

        let config = config_from(&[("TRANSITION_RULES_PATH", path.to_str().unwrap())]).unwrap();
        let rules = config.load_rules().unwrap();
        std::fs::remove_file(&path).ok();

        assert!(rules.is_legal(AssetType::Monitor, AssetState::Available, AssetState::Issued));
        assert!(rules
            .valid_next_states(AssetType::Laptop, AssetState::Available)
            .is_empty());
    }

    #[test]
    fn missing_rules_file_is_an_error() {
        let config =
            config_from(&[("TRANSITION_RULES_PATH", "/nonexistent/custody-rules.json")]).unwrap();
        assert_matches!(config.load_rules(), Err(ConfigError::RulesIo { .. }));
    }
}
