//! Registry of live connections and the application state bound to them.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionRole};
use crate::connection_data::ConnectionData;
use crate::ids::ConnectionId;
use crate::logging::LOG_CONNECTION;

/// One registered connection.
pub struct ConnectionEntry {
    id: ConnectionId,
    address: SocketAddr,
    role: ConnectionRole,
    data: Option<Box<dyn ConnectionData>>,
}

impl ConnectionEntry {
    fn new(connection: &dyn Connection) -> Self {
        Self {
            id: connection.connection_id(),
            address: connection.remote_address(),
            role: connection.connection_role(),
            data: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    pub fn data(&self) -> Option<&dyn ConnectionData> {
        self.data.as_deref()
    }

    pub fn into_data(self) -> Option<Box<dyn ConnectionData>> {
        self.data
    }
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("role", &self.role)
            .field(
                "data",
                &self.data.as_ref().map(|data| data.connection_data_type()),
            )
            .finish()
    }
}

/// Tracks connections by id. Connections are independent of each other.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: BTreeMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connection` without data. Returns false if already registered.
    pub fn register(&mut self, connection: &dyn Connection) -> bool {
        let id = connection.connection_id();
        if self.entries.contains_key(&id) {
            debug!(target: LOG_CONNECTION, "Connection {} already registered", id);
            return false;
        }
        self.entries.insert(id, ConnectionEntry::new(connection));
        true
    }

    /// Binds `data` to `connection`, registering it first if needed.
    ///
    /// Returns the record that was bound before, if any. The caller releases it.
    pub fn attach(
        &mut self,
        connection: &dyn Connection,
        data: Box<dyn ConnectionData>,
    ) -> Option<Box<dyn ConnectionData>> {
        let id = connection.connection_id();
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| ConnectionEntry::new(connection));
        let previous = entry.data.replace(data);
        if previous.is_some() {
            warn!(
                target: LOG_CONNECTION,
                "Connection {} already had connection data attached, replacing it", id
            );
        }
        previous
    }

    /// Unregisters the connection. Unknown ids are a no-op.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<ConnectionEntry> {
        self.entries.remove(&id)
    }

    /// Unregisters every connection, in id order.
    pub fn drain(&mut self) -> Vec<ConnectionEntry> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn connection_role(&self, id: ConnectionId) -> Option<ConnectionRole> {
        self.entries.get(&id).map(ConnectionEntry::role)
    }

    pub fn connection_data(&self, id: ConnectionId) -> Option<&dyn ConnectionData> {
        self.entries.get(&id)?.data()
    }

    pub fn connection_data_mut(
        &mut self,
        id: ConnectionId,
    ) -> Option<&mut (dyn ConnectionData + 'static)> {
        self.entries.get_mut(&id)?.data.as_deref_mut()
    }

    pub fn iter_data_mut(&mut self) -> impl Iterator<Item = &mut (dyn ConnectionData + 'static)> {
        self.entries
            .values_mut()
            .filter_map(|entry| entry.data.as_deref_mut())
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of connections that carry connection data.
    pub fn attached_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.data.is_some())
            .count()
    }
}

/// Releases connection data: the replication window goes first, then the data.
pub fn release_connection_data(mut data: Box<dyn ConnectionData>) {
    let id = data.connection_id();
    data.replication_manager_mut().clear_replication_window();
    drop(data);
    debug!(target: LOG_CONNECTION, "Released connection data of {}", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::UNSPECIFIED_ADDRESS;
    use crate::connection_data::{ClientToServerConnectionData, ServerToClientConnectionData};
    use crate::network_interface::LoopbackConnection;
    use crate::replication::NetworkEntityHandle;

    fn acceptor(id: u64) -> LoopbackConnection {
        LoopbackConnection::new(ConnectionId::new(id), UNSPECIFIED_ADDRESS, ConnectionRole::Acceptor)
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let conn = acceptor(1);
        assert!(registry.register(&conn));
        assert!(!registry.register(&conn));
        assert_eq!(registry.len(), 1);
        assert!(registry.connection_data(conn.connection_id()).is_none());
    }

    #[test]
    fn attach_registers_and_returns_previous() {
        let mut registry = ConnectionRegistry::new();
        let conn = acceptor(2);

        let first = registry.attach(
            &conn,
            Box::new(ServerToClientConnectionData::new(&conn, NetworkEntityHandle::null())),
        );
        assert!(first.is_none());
        assert!(registry.is_registered(conn.connection_id()));

        let previous = registry.attach(&conn, Box::new(ClientToServerConnectionData::new(&conn)));
        assert!(previous.is_some());
        assert_eq!(registry.attached_count(), 1);
    }

    #[test]
    fn connections_are_independent() {
        let mut registry = ConnectionRegistry::new();
        let a = acceptor(10);
        let b = acceptor(15);
        registry.register(&a);
        registry.attach(&b, Box::new(ClientToServerConnectionData::new(&b)));

        let removed = registry.unregister(a.connection_id()).unwrap();
        assert!(removed.into_data().is_none());
        assert!(registry.is_registered(b.connection_id()));
        assert_eq!(registry.attached_count(), 1);

        assert!(registry.unregister(a.connection_id()).is_none());
    }
}
