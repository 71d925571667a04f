//! Engine configuration
//!
//! A small JSON file next to the other per-user settings. Every field has a
//! default, so an empty object (or no file at all) is a valid config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ComponentDescriptor;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid config {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("Failed to encode config {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How often the player polls the playback position
    pub poll_interval_ms: u64,
    /// `tracing` env-filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Extra components, merged into the default registry by priority
    pub components: Vec<ComponentDescriptor>,
    /// Descriptor names removed from the registry
    pub disabled_components: Vec<String>,
    /// Substring identifying the splitter's video output pin
    pub video_pin_hint: String,
    pub audio_pin_hint: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            log_filter: "reelgraph=info".to_string(),
            components: Vec::new(),
            disabled_components: Vec::new(),
            video_pin_hint: "video".to_string(),
            audio_pin_hint: "audio".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// An empty pin hint would match every splitter pin
    fn validate(&self) -> Result<(), String> {
        for (field, hint) in [
            ("video_pin_hint", &self.video_pin_hint),
            ("audio_pin_hint", &self.audio_pin_hint),
        ] {
            if hint.trim().is_empty() {
                return Err(format!("{} must not be empty", field));
            }
        }
        Ok(())
    }

    /// Defaults when the file does not exist; parse errors still surface
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(write_err)
    }

    /// `<config dir>/reelgraph/config.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reelgraph")
            .join("config.json")
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ClassId, ComponentRegistry, ComponentRole};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_object_is_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.video_pin_hint, "video");
    }

    #[test]
    fn test_load_components_and_disables() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "poll_interval_ms": 250,
                "components": [
                    {{
                        "name": "Custom Video Decoder",
                        "role": "video_decoder",
                        "class_id": "{{0e3f8f3a-5f4d-4c11-9f3a-6a6b0c1d2e3f}}",
                        "priority": 150
                    }}
                ],
                "disabled_components": ["Enhanced Video Renderer", "Nope"]
            }}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.log_filter, "reelgraph=info");
        assert_eq!(
            config.components[0].class_id,
            ClassId::parse("0e3f8f3a-5f4d-4c11-9f3a-6a6b0c1d2e3f").unwrap()
        );

        let registry = ComponentRegistry::from_config(&config);
        let first = registry.candidates(ComponentRole::VideoDecoder).next().unwrap();
        assert_eq!(first.name, "Custom Video Decoder");
        assert!(registry
            .candidates(ComponentRole::VideoRenderer)
            .all(|d| d.name != "Enhanced Video Renderer"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = EngineConfig::load_or_default(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_empty_pin_hint_is_rejected() {
        for body in [
            r#"{ "video_pin_hint": "" }"#,
            r#"{ "audio_pin_hint": "   " }"#,
        ] {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "{}", body).unwrap();
            let err = EngineConfig::load(file.path()).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{}", err);
            assert!(err.to_string().contains("pin_hint"));
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = EngineConfig {
            audio_pin_hint: "sound".to_string(),
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }
}
