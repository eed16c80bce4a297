use std::path::PathBuf;

use thiserror::Error;

use crate::agent::MultiplayerAgentType;
use crate::connection::ConnectionRole;
use crate::ids::ConnectionId;

/// Errors returned by coordinator operations and settings loading.
#[derive(Debug, Error)]
pub enum MultiplayerError {
    #[error("operation requires a server session, current role: {0:?}")]
    NotServer(Option<MultiplayerAgentType>),

    #[error("connection {id} has role {actual:?}, expected {expected:?}")]
    WrongConnectionRole {
        id: ConnectionId,
        expected: ConnectionRole,
        actual: ConnectionRole,
    },

    #[error("server full: {max_players} players connected")]
    ServerFull { max_players: u32 },

    #[error("failed to read settings {path:?}: {source}")]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("logging setup failed: {0}")]
    Logging(String),
}
