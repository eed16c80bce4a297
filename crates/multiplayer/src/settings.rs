//! TOML configuration.
//!
//! Every section is its own type with a `SECTION` name. Missing sections and
//! fields fall back to their defaults; present values are validated.
//!
//! ```toml
//! [session]
//! max_players = 8
//! shutdown_when_empty = true
//!
//! [replication]
//! window_radius = 64.0
//! max_entities = 256
//!
//! [logging]
//! level = "debug"
//! ```

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::MultiplayerError;

/// A named section of the settings file.
pub trait Settings: DeserializeOwned + Default {
    const SECTION: &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Players a server accepts before `accept_player` reports the server as full.
    pub max_players: u32,
    /// Whether a dedicated server ends its session when the last connection drops.
    pub shutdown_when_empty: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_players: 16,
            shutdown_when_empty: true,
        }
    }
}

impl Settings for SessionSettings {
    const SECTION: &'static str = "session";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationSettings {
    /// Distance around the controlled entity inside which entities replicate.
    pub window_radius: f32,
    /// Upper bound on entities per window.
    pub max_entities: usize,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            window_radius: 50.0,
            max_entities: 128,
        }
    }
}

impl Settings for ReplicationSettings {
    const SECTION: &'static str = "replication";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Settings for LoggingSettings {
    const SECTION: &'static str = "logging";
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiplayerSettings {
    pub session: SessionSettings,
    pub replication: ReplicationSettings,
    pub logging: LoggingSettings,
}

impl MultiplayerSettings {
    pub fn from_toml_str(text: &str) -> Result<Self, MultiplayerError> {
        let table: toml::Table = text.parse()?;
        let settings = Self {
            session: section(&table)?,
            replication: section(&table)?,
            logging: section(&table)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MultiplayerError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| MultiplayerError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), MultiplayerError> {
        if self.session.max_players == 0 {
            return Err(MultiplayerError::InvalidSetting {
                key: "session.max_players",
                reason: "must be at least 1".into(),
            });
        }
        let radius = self.replication.window_radius;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(MultiplayerError::InvalidSetting {
                key: "replication.window_radius",
                reason: format!("must be a positive finite distance, got {radius}"),
            });
        }
        if self.replication.max_entities == 0 {
            return Err(MultiplayerError::InvalidSetting {
                key: "replication.max_entities",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn section<S: Settings>(table: &toml::Table) -> Result<S, MultiplayerError> {
    match table.get(S::SECTION) {
        Some(value) => Ok(value.clone().try_into()?),
        None => Ok(S::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = MultiplayerSettings::from_toml_str("").unwrap();
        assert_eq!(settings, MultiplayerSettings::default());
        assert_eq!(settings.session.max_players, 16);
        assert!(settings.session.shutdown_when_empty);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = MultiplayerSettings::from_toml_str(
            r#"
            [replication]
            window_radius = 12.5
            "#,
        )
        .unwrap();
        assert_eq!(settings.replication.window_radius, 12.5);
        assert_eq!(settings.replication.max_entities, 128);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn rejects_non_positive_radius() {
        let err = MultiplayerSettings::from_toml_str(
            r#"
            [replication]
            window_radius = 0.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MultiplayerError::InvalidSetting {
                key: "replication.window_radius",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = MultiplayerSettings::from_toml_str("[session\nmax_players = 1").unwrap_err();
        assert!(matches!(err, MultiplayerError::Toml(_)));
    }
}
