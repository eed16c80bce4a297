//! Application-level state attached to a transport connection.

use crate::connection::Connection;
use crate::ids::ConnectionId;
use crate::replication::{NetworkEntityHandle, ReplicationManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDataType {
    ServerToClient,
    ClientToServer,
}

/// Per-connection state owned by the registry for the connection's lifetime.
pub trait ConnectionData {
    fn connection_data_type(&self) -> ConnectionDataType;

    fn connection_id(&self) -> ConnectionId;

    /// Entity the remote agent drives. Null when there is none (yet).
    fn controlled_entity(&self) -> NetworkEntityHandle;

    fn replication_manager(&self) -> &ReplicationManager;

    fn replication_manager_mut(&mut self) -> &mut ReplicationManager;
}

/// Server-side state for a connected client. Its replication manager owns the
/// client's replication window.
#[derive(Debug)]
pub struct ServerToClientConnectionData {
    connection_id: ConnectionId,
    controlled_entity: NetworkEntityHandle,
    replication_manager: ReplicationManager,
}

impl ServerToClientConnectionData {
    pub fn new(connection: &dyn Connection, controlled_entity: NetworkEntityHandle) -> Self {
        let connection_id = connection.connection_id();
        Self {
            connection_id,
            controlled_entity,
            replication_manager: ReplicationManager::new(connection_id),
        }
    }
}

impl ConnectionData for ServerToClientConnectionData {
    fn connection_data_type(&self) -> ConnectionDataType {
        ConnectionDataType::ServerToClient
    }

    fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    fn controlled_entity(&self) -> NetworkEntityHandle {
        self.controlled_entity
    }

    fn replication_manager(&self) -> &ReplicationManager {
        &self.replication_manager
    }

    fn replication_manager_mut(&mut self) -> &mut ReplicationManager {
        &mut self.replication_manager
    }
}

/// Client-side state for the link to the server. Clients replicate nothing
/// upstream, so the manager never holds a window.
#[derive(Debug)]
pub struct ClientToServerConnectionData {
    connection_id: ConnectionId,
    replication_manager: ReplicationManager,
}

impl ClientToServerConnectionData {
    pub fn new(connection: &dyn Connection) -> Self {
        let connection_id = connection.connection_id();
        Self {
            connection_id,
            replication_manager: ReplicationManager::new(connection_id),
        }
    }
}

impl ConnectionData for ClientToServerConnectionData {
    fn connection_data_type(&self) -> ConnectionDataType {
        ConnectionDataType::ClientToServer
    }

    fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    fn controlled_entity(&self) -> NetworkEntityHandle {
        NetworkEntityHandle::null()
    }

    fn replication_manager(&self) -> &ReplicationManager {
        &self.replication_manager
    }

    fn replication_manager_mut(&mut self) -> &mut ReplicationManager {
        &mut self.replication_manager
    }
}
