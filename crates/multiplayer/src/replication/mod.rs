//! Replication scoping: networked entities, per-connection windows and the
//! manager that drives them.

pub mod entity;
pub mod manager;
pub mod window;

pub use entity::{
    AlwaysRelevant, ControlledBy, NetworkEntityHandle, NetworkEntityManager, NetworkTransform,
    Replicated,
};
pub use manager::ReplicationManager;
pub use window::{
    ReplicationEntry, ReplicationSet, ReplicationWindow, ServerToClientReplicationWindow,
};
