//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{FramecapError, FramecapResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default capture settings.
    pub capture: CaptureDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Output frame width in pixels.
    pub width: u32,

    /// Output frame height in pixels.
    pub height: u32,

    /// Host frame rate used when the CLI drives its own frame loop.
    pub fps: u32,

    /// Host frames skipped between captured frames.
    pub skip: u32,

    /// Multisample level reported by the host.
    pub anti_aliasing: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "framecap=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            skip: 0,
            anti_aliasing: 1,
        }
    }
}

impl CaptureDefaults {
    /// Reject settings no capture can run with.
    pub fn validate(&self) -> FramecapResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramecapError::config(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(FramecapError::config("fps must be greater than zero"));
        }
        if self.anti_aliasing == 0 {
            return Err(FramecapError::config("anti_aliasing must be at least 1"));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from `path`, falling back to defaults.
    pub fn load_from(path: &std::path::Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let path = config_file_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("framecap").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "capture": { "skip": 2 } }"#).unwrap();
        assert_eq!(config.capture.skip, 2);
        assert_eq!(config.capture.width, 1280);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_unusable_capture_settings() {
        assert!(CaptureDefaults::default().validate().is_ok());

        let zero_fps = CaptureDefaults {
            fps: 0,
            ..CaptureDefaults::default()
        };
        let err = zero_fps.validate().unwrap_err();
        assert!(matches!(err, FramecapError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: fps must be greater than zero");

        let zero_height = CaptureDefaults {
            height: 0,
            ..CaptureDefaults::default()
        };
        assert!(matches!(
            zero_height.validate(),
            Err(FramecapError::Config { .. })
        ));
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = std::env::temp_dir().join("framecap_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.capture.fps = 60;
        config.capture.anti_aliasing = 4;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.capture.fps, 60);
        assert_eq!(loaded.capture.anti_aliasing, 4);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("framecap_test_config_bad");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.capture, CaptureDefaults::default());

        std::fs::remove_dir_all(&dir).ok();
    }
}
