//! Multiplayer session coordination.
//!
//! This crate tracks the connections of a multiplayer session and the state
//! bound to them:
//! - `coordinator`: session lifecycle (init / shutdown / connection acquired)
//!   and the transport entry points
//! - `registry`: live connections and their connection data
//! - `connection_data`, `replication`: per-connection replication windows over
//!   the networked entity world
//! - `network_interface`: transport abstraction plus an in-process loopback
//!
//! Everything runs synchronously on the thread that owns the transport.

pub mod agent;
pub mod connection;
pub mod connection_data;
pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod ids;
pub mod logging;
pub mod network_interface;
pub mod registry;
pub mod replication;
pub mod settings;
pub mod spawner;

pub use agent::{MultiplayerAgentDatum, MultiplayerAgentType};
pub use connection::{Connection, ConnectionRole, DisconnectReason, TerminationEndpoint};
pub use connection_data::{
    ClientToServerConnectionData, ConnectionData, ConnectionDataType,
    ServerToClientConnectionData,
};
pub use coordinator::{MultiplayerCoordinator, SessionState};
pub use diagnostics::{Diagnostics, ValidityError};
pub use error::MultiplayerError;
pub use event::{Event, EventHandler};
pub use ids::{ConnectionId, SessionId};
pub use network_interface::{LoopbackConnection, LoopbackNetworkInterface, NetworkInterface};
pub use registry::ConnectionRegistry;
pub use settings::MultiplayerSettings;
pub use spawner::MultiplayerSpawner;

/// Convenience prelude for downstream crates.
pub mod prelude {
    pub use crate::agent::{MultiplayerAgentDatum, MultiplayerAgentType};
    pub use crate::connection::{
        Connection, ConnectionRole, DisconnectReason, TerminationEndpoint, UNSPECIFIED_ADDRESS,
    };
    pub use crate::coordinator::{MultiplayerCoordinator, SessionState};
    pub use crate::ids::ConnectionId;
    pub use crate::network_interface::{
        LoopbackConnection, LoopbackNetworkInterface, NetworkInterface,
    };
    pub use crate::replication::{
        NetworkEntityHandle, NetworkEntityManager, ReplicationSet, ReplicationWindow,
        ServerToClientReplicationWindow,
    };
    pub use crate::settings::MultiplayerSettings;
    pub use crate::spawner::MultiplayerSpawner;
}
