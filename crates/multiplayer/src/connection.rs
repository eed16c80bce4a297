//! Transport-facing connection identity.
//!
//! Connections are owned by the transport. The coordinator only borrows them
//! for the duration of a connect/disconnect notification and keeps its own
//! per-connection state in the [`ConnectionRegistry`](crate::registry::ConnectionRegistry).

use std::net::{Ipv4Addr, SocketAddr};

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionRole {
    /// Accepted by the local listener (server side of a client link).
    Acceptor,
    /// Opened by the local peer (client side of a server link).
    Connector,
}

/// Reasons why a peer might be disconnected from the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectReason {
    #[default]
    None,
    Graceful,
    Timeout,
    Kicked,
    ServerFull,
    ProtocolMismatch,
    TransportError,
    TerminatedByServer,
}

/// Which end initiated a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationEndpoint {
    Local,
    Remote,
}

/// A live transport connection as seen by the multiplayer layer.
pub trait Connection {
    fn connection_id(&self) -> crate::ids::ConnectionId;

    fn remote_address(&self) -> SocketAddr;

    fn connection_role(&self) -> ConnectionRole;
}

/// Placeholder address for connections without a known remote endpoint.
pub const UNSPECIFIED_ADDRESS: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    0,
);
