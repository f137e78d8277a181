//! Registry configuration
//!
//! Loaded from a TOML file. Every section and key is optional; anything left
//! out takes its default.
//!
//! ```toml
//! [storage]
//! data_file = "/var/lib/rollcall/accounts.csv"
//!
//! [password]
//! min_length = 10
//!
//! [session]
//! idle_timeout_secs = 300
//!
//! [lockout]
//! threshold = 3
//! cooldown_secs = 30
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use rollcall_core::PasswordPolicy;

use crate::auth::{LockoutPolicy, Session, SessionConfig};

/// Configuration directory name under the platform config/data dirs
const APP_DIR_NAME: &str = "rollcall";

/// Configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Data file name
const DATA_FILE_NAME: &str = "accounts.csv";

/// Full registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub storage: StorageConfig,
    pub password: PasswordPolicy,
    pub session: SessionConfig,
    pub lockout: LockoutPolicy,
}

/// Where accounts are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// CSV data file
    pub data_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

fn default_data_file() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_FILE_NAME)
}

impl RegistryConfig {
    /// Default config file location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from `path`
    ///
    /// A missing file gives the defaults. A file that exists but cannot be
    /// read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file - using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let config = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from the default location, or defaults if there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// A fresh session using the configured timeout and lockout
    pub fn new_session(&self) -> Session {
        Session::new(self.session.clone(), self.lockout.clone())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = RegistryConfig::load(&dir.path().join("nope.toml")).unwrap();

        assert_eq!(config.lockout, LockoutPolicy::default());
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.password.min_length, 8);
        assert!(config.storage.data_file.ends_with("accounts.csv"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[storage]
data_file = "/srv/rollcall/users.csv"

[password]
min_length = 12
pepper = "s3cret"

[lockout]
threshold = 5
"#,
        )
        .unwrap();

        let config = RegistryConfig::load(&path).unwrap();
        assert_eq!(config.storage.data_file, PathBuf::from("/srv/rollcall/users.csv"));
        assert_eq!(config.password.min_length, 12);
        assert_eq!(config.password.pepper.as_deref(), Some("s3cret"));
        assert_eq!(config.password.memory_kib, PasswordPolicy::default().memory_kib);
        assert_eq!(config.lockout.threshold, 5);
        assert_eq!(config.lockout.cooldown_secs, 30);
        assert_eq!(config.session.idle_timeout_secs, 300);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[lockout]\nthreshold = \"many\"\n").unwrap();

        let err = RegistryConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_new_session_uses_config() {
        let config = RegistryConfig {
            session: SessionConfig::strict(),
            lockout: LockoutPolicy::lenient(),
            ..Default::default()
        };
        let session = config.new_session();
        assert_eq!(session.config(), &SessionConfig::strict());
        assert_eq!(session.lockout_policy(), &LockoutPolicy::lenient());
        assert!(!session.state().is_logged_in());
    }

    #[test]
    fn test_pepper_not_in_debug_output() {
        let config = RegistryConfig {
            password: PasswordPolicy {
                pepper: Some("s3cret".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
