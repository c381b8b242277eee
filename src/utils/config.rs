use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::db::ConnectionInfo;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionInfo,
    pub step_pause_ms: u64,
    /// Root of the built-in plan's script tree.
    pub base_dir: PathBuf,
    /// JSON plan manifest used instead of the built-in plan.
    pub plan: Option<PathBuf>,
}

/// Connection settings supplied on the command line or through `DB_*` variables.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub service_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            connection: ConnectionInfo::default(),
            step_pause_ms: 500,
            base_dir: PathBuf::from("../database"),
            plan: None,
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("space_migrate");
            path.push("config.json");
            path
        })
    }

    /// Load from `explicit` if given, else from the default location.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::new()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.host.trim().is_empty() {
            return Err(ConfigError::Validation("connection host is empty".to_string()));
        }
        if self.connection.username.trim().is_empty() {
            return Err(ConfigError::Validation(
                "connection username is empty".to_string(),
            ));
        }
        if self.connection.port == 0 {
            return Err(ConfigError::Validation("connection port is 0".to_string()));
        }
        Ok(())
    }

    pub fn save(&self, explicit: Option<&Path>) -> Result<(), ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::config_path().ok_or_else(|| {
                ConfigError::Validation("no configuration directory on this platform".to_string())
            })?,
        };

        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                tracing::error!("Config persistence error: {err}");
                return Err(err.into());
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        if let Err(err) = fs::write(&path, content) {
            tracing::error!("Config persistence error: {err}");
            return Err(err.into());
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: ConnectionOverrides) -> Result<(), ConfigError> {
        let connection = &mut self.connection;
        if let Some(name) = overrides.name {
            connection.name = name;
        }
        if let Some(host) = overrides.host {
            connection.host = host;
        }
        if let Some(port) = overrides.port {
            connection.port = port;
        }
        if let Some(service_name) = overrides.service_name {
            connection.service_name = service_name;
        }
        if let Some(username) = overrides.username {
            connection.username = username;
        }
        if let Some(password) = overrides.password {
            connection.password = password;
        }
        self.validate()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AppConfig::new();
        assert_eq!(config.connection.port, 1521);
        assert_eq!(config.connection.service_name, "XEPDB1");
        assert_eq!(config.step_pause_ms, 500);
        assert_eq!(config.base_dir, PathBuf::from("../database"));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"connection": {"host": "db.example", "username": "hc_admin"}, "step_pause_ms": 0}"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.connection.host, "db.example");
        assert_eq!(config.connection.username, "hc_admin");
        assert_eq!(config.connection.port, 1521);
        assert_eq!(config.step_pause_ms, 0);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_round_trip_omits_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::new();
        config.connection.password = "secret".to_string();
        config.plan = Some(PathBuf::from("plan.json"));

        config.save(Some(&path)).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("secret"));

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.plan, Some(PathBuf::from("plan.json")));
        assert!(loaded.connection.password.is_empty());
    }

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let mut config = AppConfig::new();
        config
            .apply_overrides(ConnectionOverrides {
                host: Some("10.0.0.5".to_string()),
                port: Some(1522),
                password: Some("pw".to_string()),
                ..ConnectionOverrides::default()
            })
            .unwrap();

        assert_eq!(config.connection.host, "10.0.0.5");
        assert_eq!(config.connection.port, 1522);
        assert_eq!(config.connection.password, "pw");
        assert_eq!(config.connection.username, "system");
    }

    #[test]
    fn test_overrides_validate() {
        let mut config = AppConfig::new();
        let result = config.apply_overrides(ConnectionOverrides {
            username: Some("  ".to_string()),
            ..ConnectionOverrides::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
