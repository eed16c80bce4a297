//! Gameplay hook that creates and removes player entities.

use crate::agent::MultiplayerAgentDatum;
use crate::connection::DisconnectReason;
use crate::replication::{NetworkEntityHandle, NetworkEntityManager, ReplicationSet};

/// Spawns the entity a joining player controls and cleans up after a leaving one.
///
/// The coordinator queries a registered spawner but never owns it.
pub trait MultiplayerSpawner {
    /// Called when a server accepts a player. A null handle means the player
    /// starts without a controlled entity.
    fn on_player_join(
        &mut self,
        entities: &mut NetworkEntityManager,
        datum: &MultiplayerAgentDatum,
    ) -> NetworkEntityHandle;

    /// Called when a player with a live controlled entity leaves.
    /// `replication_set` is what the player last saw; empty without a window.
    fn on_player_leave(
        &mut self,
        entities: &mut NetworkEntityManager,
        controlled_entity: NetworkEntityHandle,
        datum: &MultiplayerAgentDatum,
        replication_set: &ReplicationSet,
        reason: DisconnectReason,
    );

    /// Players this spawner currently tracks, if it counts them.
    fn player_count(&self) -> Option<usize> {
        None
    }
}
