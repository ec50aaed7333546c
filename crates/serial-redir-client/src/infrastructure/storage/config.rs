//! TOML-based configuration for the redirection client.
//!
//! The file lists the serial ports to redirect and a few global settings.
//! Every field has a default, so an empty (or missing) file is valid:
//!
//! ```toml
//! [general]
//! log_level = "info"
//! shutdown_policy = "drain"   # or "drop"
//!
//! [[devices]]
//! name = "COM1"
//! path = "/dev/ttyS0"
//! baud_rate = 9600
//! read_timeout_ms = 100
//! ```
//!
//! # Serde default values (for beginners)
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.  A config that
//! only names a device's `name` and `path` therefore still gets a baud rate
//! and read timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::worker::ShutdownPolicy;
use crate::infrastructure::comm::serial::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use crate::infrastructure::comm::SerialPortDriver;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Settings shared by every device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// What happens to queued requests at teardown.
    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,
}

/// One serial port to redirect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// DOS name announced to the server, e.g. `COM1`.
    pub name: String,
    /// Local device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// How long a Read waits for data before completing with zero bytes.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl AppConfig {
    /// Adds `device`, replacing any entry with the same name.
    ///
    /// Returns `true` when an existing entry was replaced.
    pub fn upsert_device(&mut self, device: DeviceConfig) -> bool {
        match self.devices.iter_mut().find(|d| d.name == device.name) {
            Some(existing) => {
                *existing = device;
                true
            }
            None => {
                self.devices.push(device);
                false
            }
        }
    }
}

impl DeviceConfig {
    /// Builds the native driver this entry describes.
    pub fn driver(&self) -> SerialPortDriver {
        SerialPortDriver::new(self.baud_rate, Duration::from_millis(self.read_timeout_ms))
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}
fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT.as_millis() as u64
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            shutdown_policy: ShutdownPolicy::default(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default config file path for this platform.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory cannot
/// be determined from the environment.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("SerialRedir"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("serial-redir"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("SerialRedir")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("serial-redir-test-{}", uuid::Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_default_config_has_no_devices_and_drains() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert!(cfg.devices.is_empty());
        assert_eq!(cfg.general.log_level, "info");
        assert_eq!(cfg.general.shutdown_policy, ShutdownPolicy::Drain);
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_device_fields_default_when_absent() {
        // Arrange
        let text = r#"
            [general]
            shutdown_policy = "drop"

            [[devices]]
            name = "COM1"
            path = "/dev/ttyUSB0"

            [[devices]]
            name = "COM2"
            path = "/dev/ttyS1"
            baud_rate = 115200
            read_timeout_ms = 250
        "#;

        // Act
        let cfg: AppConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.general.shutdown_policy, ShutdownPolicy::Drop);
        assert_eq!(cfg.general.log_level, "info");
        assert_eq!(cfg.devices.len(), 2);
        assert_eq!(cfg.devices[0].baud_rate, 9600);
        assert_eq!(cfg.devices[0].read_timeout_ms, 100);
        assert_eq!(cfg.devices[1].baud_rate, 115200);
        assert_eq!(cfg.devices[1].read_timeout_ms, 250);
    }

    #[test]
    fn test_device_without_path_is_a_parse_error() {
        let err = toml::from_str::<AppConfig>("[[devices]]\nname = \"COM1\"\n").unwrap_err();
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_unknown_shutdown_policy_is_rejected() {
        let result = toml::from_str::<AppConfig>("[general]\nshutdown_policy = \"later\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let cfg = load_config(&temp_path()).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_devices() {
        // Arrange
        let path = temp_path();
        let mut cfg = AppConfig::default();
        cfg.devices.push(DeviceConfig {
            name: "COM3".into(),
            path: "/dev/ttyACM0".into(),
            baud_rate: 57600,
            read_timeout_ms: 50,
        });

        // Act
        save_config(&cfg, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_upsert_device_appends_then_replaces_by_name() {
        // Arrange
        let mut cfg = AppConfig::default();
        let first = DeviceConfig {
            name: "COM1".into(),
            path: "/dev/ttyS0".into(),
            baud_rate: 9600,
            read_timeout_ms: 100,
        };
        let moved = DeviceConfig {
            path: "/dev/ttyUSB0".into(),
            ..first.clone()
        };

        // Act
        let replaced_first = cfg.upsert_device(first);
        let replaced_second = cfg.upsert_device(moved.clone());

        // Assert
        assert!(!replaced_first);
        assert!(replaced_second);
        assert_eq!(cfg.devices, vec![moved]);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[devices]\nname=").unwrap();

        let err = load_config(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
