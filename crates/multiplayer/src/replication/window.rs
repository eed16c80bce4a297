//! Per-connection entity visibility.

use bevy_ecs::entity::Entity;
use tracing::{trace, warn};

use crate::connection::Connection;
use crate::ids::ConnectionId;
use crate::logging::LOG_REPLICATION;
use crate::replication::entity::{NetworkEntityHandle, NetworkEntityManager};
use crate::settings::ReplicationSettings;

/// Priority of the entity the connection controls.
pub const CONTROLLED_PRIORITY: f32 = f32::MAX;
/// Priority of entities tagged [`AlwaysRelevant`](crate::replication::AlwaysRelevant).
pub const ALWAYS_RELEVANT_PRIORITY: f32 = f32::MAX / 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicationEntry {
    pub entity: Entity,
    pub priority: f32,
}

/// Entities visible to one connection, highest priority first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplicationSet {
    entries: Vec<ReplicationEntry>,
}

impl ReplicationSet {
    pub fn contains(&self, entity: Entity) -> bool {
        self.entries.iter().any(|entry| entry.entity == entity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplicationEntry> {
        self.entries.iter()
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.entries.iter().map(|entry| entry.entity).collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn push(&mut self, entity: Entity, priority: f32) {
        self.entries.push(ReplicationEntry { entity, priority });
    }

    fn finish(&mut self, max_entities: usize) {
        self.entries.sort_by(|a, b| {
            b.priority
                .total_cmp(&a.priority)
                .then_with(|| a.entity.cmp(&b.entity))
        });
        self.entries.truncate(max_entities);
    }
}

/// The set of entities a connection is permitted to see.
pub trait ReplicationWindow {
    fn controlled_entity(&self) -> NetworkEntityHandle;

    fn replication_set(&self) -> &ReplicationSet;

    fn is_in_window(&self, entity: Entity) -> bool {
        self.replication_set().contains(entity)
    }

    /// Recomputes the replication set from the current entity state.
    fn update_window(&mut self, entities: &mut NetworkEntityManager);
}

/// Distance-based window of a server-to-client connection.
#[derive(Debug)]
pub struct ServerToClientReplicationWindow {
    connection_id: ConnectionId,
    controlled_entity: NetworkEntityHandle,
    radius: f32,
    max_entities: usize,
    set: ReplicationSet,
}

impl ServerToClientReplicationWindow {
    pub fn new(
        controlled_entity: NetworkEntityHandle,
        connection: &dyn Connection,
        settings: &ReplicationSettings,
    ) -> Self {
        Self {
            connection_id: connection.connection_id(),
            controlled_entity,
            radius: settings.window_radius,
            max_entities: settings.max_entities,
            set: ReplicationSet::default(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl ReplicationWindow for ServerToClientReplicationWindow {
    fn controlled_entity(&self) -> NetworkEntityHandle {
        self.controlled_entity
    }

    fn replication_set(&self) -> &ReplicationSet {
        &self.set
    }

    fn update_window(&mut self, entities: &mut NetworkEntityManager) {
        self.set.clear();

        let origin = if self.controlled_entity.is_null() {
            None
        } else if !entities.is_live(self.controlled_entity) {
            warn!(
                target: LOG_REPLICATION,
                "Connection {} controls stale entity {}, only always-relevant entities replicate",
                self.connection_id,
                self.controlled_entity
            );
            None
        } else {
            entities.translation(self.controlled_entity)
        };

        let radius_sq = self.radius * self.radius;
        let controlled = self.controlled_entity.entity();
        for candidate in entities.replicated_entities() {
            if Some(candidate.entity) == controlled {
                self.set.push(candidate.entity, CONTROLLED_PRIORITY);
            } else if candidate.always_relevant {
                self.set.push(candidate.entity, ALWAYS_RELEVANT_PRIORITY);
            } else if let (Some(origin), Some(translation)) = (origin, candidate.translation) {
                let distance_sq = origin.distance_squared(translation);
                if distance_sq <= radius_sq {
                    self.set.push(candidate.entity, 1.0 / (1.0 + distance_sq));
                }
            }
        }
        self.set.finish(self.max_entities);

        trace!(
            target: LOG_REPLICATION,
            "Connection {} window holds {} entities",
            self.connection_id,
            self.set.len()
        );
    }
}
