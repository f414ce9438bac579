use crate::core::files::{read_by_extension, write_by_extension, FileError};
use crate::core::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    File(#[from] FileError),

    #[error("failed to create config directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub ping: PingConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String, // "debug", "info", "warning", "error"
    pub console_output: bool,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PingConfig {
    pub six: bool,
    pub interface: Option<String>,
    pub count: i64,
    pub max_pool_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: String,
    pub subject: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            ping: PingConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_path: None,
        }
    }
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            six: false,
            interface: None,
            count: 5,
            max_pool_size: 4,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            sender: "opskit@localhost".to_string(),
            subject: None,
        }
    }
}

impl LoggingConfig {
    pub fn log_level(&self) -> LogLevel {
        self.level.parse().unwrap_or(LogLevel::Info)
    }
}

/// Loads, validates and saves the [`AppConfig`] stored at a YAML or JSON
/// path.
pub struct ConfigManager {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// Loads `config_path`, writing the defaults there first if the file
    /// does not exist yet. Environment overrides are applied afterwards.
    pub fn new(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut manager = Self {
            config_path: config_path.as_ref().to_path_buf(),
            config: AppConfig::default(),
        };
        manager.load()?;
        manager.apply_env_overrides();
        manager.validate()?;
        Ok(manager)
    }

    pub fn get(&self) -> &AppConfig {
        &self.config
    }

    pub fn get_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&mut self) -> Result<(), ConfigError> {
        if !self.config_path.exists() {
            self.config = AppConfig::default();
            self.save()?;
            return Ok(());
        }

        // an empty file means defaults
        self.config = read_by_extension(&self.config_path)?.unwrap_or_default();
        self.validate()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_by_extension(&self.config_path, &self.config)?;
        Ok(())
    }

    pub fn reset_to_default(&mut self) -> Result<(), ConfigError> {
        self.config = AppConfig::default();
        self.save()
    }

    /// Reads `OPSKIT_*` variables, including those from a `.env` file.
    pub fn apply_env_overrides(&mut self) {
        dotenv::dotenv().ok();

        if let Ok(host) = env::var("OPSKIT_SMTP_HOST") {
            self.config.mail.smtp_host = host;
        }
        if let Some(port) = env::var("OPSKIT_SMTP_PORT").ok().and_then(|p| p.parse().ok()) {
            self.config.mail.smtp_port = port;
        }
        if let Ok(sender) = env::var("OPSKIT_MAIL_SENDER") {
            self.config.mail.sender = sender;
        }
        if let Ok(level) = env::var("OPSKIT_LOG_LEVEL") {
            self.config.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.config.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::Validation(format!(
                "invalid logging level: {}",
                self.config.logging.level
            )));
        }

        if self.config.ping.count < 1 {
            return Err(ConfigError::Validation("ping count must be at least 1".into()));
        }

        if self.config.ping.max_pool_size < 1 {
            return Err(ConfigError::Validation("max_pool_size must be at least 1".into()));
        }

        if self.config.mail.smtp_host.trim().is_empty() {
            return Err(ConfigError::Validation("smtp_host is empty".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("opskit.yaml");

        let mut manager = ConfigManager {
            config_path: path.clone(),
            config: AppConfig::default(),
        };
        manager.load().unwrap();

        assert!(path.exists());
        assert_eq!(manager.get(), &AppConfig::default());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opskit.yaml");
        fs::write(&path, "ping:\n  six: true\n  interface: eth0\n").unwrap();

        let mut manager = ConfigManager {
            config_path: path,
            config: AppConfig::default(),
        };
        manager.load().unwrap();

        let config = manager.get();
        assert!(config.ping.six);
        assert_eq!(config.ping.interface.as_deref(), Some("eth0"));
        assert_eq!(config.ping.count, 5);
        assert_eq!(config.mail.smtp_host, "localhost");
    }

    #[test]
    fn test_json_config_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opskit.json");
        fs::write(&path, r#"{ "logging": { "level": "chatty" } }"#).unwrap();

        let mut manager = ConfigManager {
            config_path: path,
            config: AppConfig::default(),
        };
        assert!(matches!(manager.load(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opskit.json");

        let mut manager = ConfigManager {
            config_path: path.clone(),
            config: AppConfig::default(),
        };
        manager.get_mut().mail.smtp_port = 2525;
        manager.save().unwrap();

        let mut reloaded = ConfigManager {
            config_path: path,
            config: AppConfig::default(),
        };
        reloaded.load().unwrap();
        assert_eq!(reloaded.get().mail.smtp_port, 2525);

        reloaded.reset_to_default().unwrap();
        assert_eq!(reloaded.get().mail.smtp_port, 25);
    }
}
