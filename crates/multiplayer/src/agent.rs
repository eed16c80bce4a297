//! Multiplayer roles and the datum handed to connection observers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::ConnectionId;

/// Role a multiplayer session plays. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiplayerAgentType {
    /// Connects to a remote server, owns no authority.
    Client,
    /// Hosts the game and plays on it (embedded server).
    ClientServer,
    /// Headless server without a local player.
    DedicatedServer,
}

impl MultiplayerAgentType {
    /// Whether this role owns server authority (accepts players, binds windows).
    pub const fn is_server(self) -> bool {
        matches!(self, Self::ClientServer | Self::DedicatedServer)
    }
}

impl fmt::Display for MultiplayerAgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Client => "client",
            Self::ClientServer => "client-server",
            Self::DedicatedServer => "dedicated-server",
        };
        f.write_str(name)
    }
}

/// Describes the remote agent behind an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplayerAgentDatum {
    pub id: ConnectionId,
    pub agent_type: MultiplayerAgentType,
    pub is_invited: bool,
}

impl MultiplayerAgentDatum {
    /// Datum for a freshly accepted, uninvited client connection.
    pub const fn client(id: ConnectionId) -> Self {
        Self {
            id,
            agent_type: MultiplayerAgentType::Client,
            is_invited: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_roles() {
        assert!(!MultiplayerAgentType::Client.is_server());
        assert!(MultiplayerAgentType::ClientServer.is_server());
        assert!(MultiplayerAgentType::DedicatedServer.is_server());
    }
}
