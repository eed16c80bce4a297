//! Network interface abstraction and the in-process loopback implementation.
//!
//! A [`NetworkInterface`] is the transport's view of one listening/connecting
//! socket: it knows its name and how many connections are currently open on
//! it. The loopback variant keeps client and server in the same process without
//! touching the network stack. It is used for singleplayer runs and tests.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;
use std::rc::Rc;

use tracing::debug;

use crate::connection::{Connection, ConnectionRole};
use crate::ids::ConnectionId;
use crate::logging::LOG_CONNECTION;

/// The transport endpoint a multiplayer session runs on.
pub trait NetworkInterface {
    fn name(&self) -> &str;

    /// Number of connections the transport still considers open.
    fn active_connection_count(&self) -> usize;
}

impl fmt::Debug for dyn NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkInterface")
            .field("name", &self.name())
            .field("active_connections", &self.active_connection_count())
            .finish()
    }
}

/// Connection handed out by [`LoopbackNetworkInterface::open`], or built
/// directly for a peer the interface does not track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackConnection {
    id: ConnectionId,
    address: SocketAddr,
    role: ConnectionRole,
}

impl LoopbackConnection {
    pub fn new(id: ConnectionId, address: SocketAddr, role: ConnectionRole) -> Self {
        Self { id, address, role }
    }
}

impl Connection for LoopbackConnection {
    fn connection_id(&self) -> ConnectionId {
        self.id
    }

    fn remote_address(&self) -> SocketAddr {
        self.address
    }

    fn connection_role(&self) -> ConnectionRole {
        self.role
    }
}

/// In-memory interface. Clones share the same open-connection set, so the
/// transport side and the coordinator can each hold one.
#[derive(Debug, Clone)]
pub struct LoopbackNetworkInterface {
    name: Rc<str>,
    open: Rc<RefCell<BTreeSet<ConnectionId>>>,
}

impl LoopbackNetworkInterface {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            open: Rc::new(RefCell::new(BTreeSet::new())),
        }
    }

    /// Opens a connection on this interface.
    pub fn open(
        &self,
        id: ConnectionId,
        address: SocketAddr,
        role: ConnectionRole,
    ) -> LoopbackConnection {
        if !self.open.borrow_mut().insert(id) {
            debug!(target: LOG_CONNECTION, "Connection {} already open on {}", id, self.name);
        }
        LoopbackConnection::new(id, address, role)
    }

    /// Closes `connection`. Closing twice is a no-op.
    pub fn close(&self, connection: &dyn Connection) -> bool {
        self.open
            .borrow_mut()
            .remove(&connection.connection_id())
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.open.borrow().contains(&id)
    }
}

impl NetworkInterface for LoopbackNetworkInterface {
    fn name(&self) -> &str {
        &self.name
    }

    fn active_connection_count(&self) -> usize {
        self.open.borrow().len()
    }
}
