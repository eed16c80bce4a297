//! Networked entities, stored in a dedicated ECS world.

use std::fmt;

use bevy_ecs::prelude::*;
use bevy_math::Vec3;

use crate::ids::ConnectionId;

/// Marker for entities that take part in replication.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Replicated;

/// Marker for entities every connection sees regardless of distance.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct AlwaysRelevant;

/// World-space position used for window relevance.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkTransform {
    pub translation: Vec3,
}

/// Links a player entity to the connection that controls it.
///
/// **Server-only**, never replicated.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlledBy {
    pub connection: ConnectionId,
}

/// Nullable handle to a networked entity.
///
/// A handle may be null (no entity yet) or stale (the entity was despawned).
/// Both are ordinary states; only [`NetworkEntityManager::is_live`] tells them
/// apart from a usable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NetworkEntityHandle(Option<Entity>);

impl NetworkEntityHandle {
    pub const fn null() -> Self {
        Self(None)
    }

    pub const fn new(entity: Entity) -> Self {
        Self(Some(entity))
    }

    pub const fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub const fn entity(&self) -> Option<Entity> {
        self.0
    }
}

impl From<Entity> for NetworkEntityHandle {
    fn from(entity: Entity) -> Self {
        Self::new(entity)
    }
}

impl fmt::Display for NetworkEntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(entity) => write!(f, "{entity:?}"),
            None => f.write_str("<null>"),
        }
    }
}

/// Snapshot row used by replication windows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReplicatedEntity {
    pub entity: Entity,
    pub translation: Option<Vec3>,
    pub always_relevant: bool,
}

/// Owns the server-side world of networked entities.
pub struct NetworkEntityManager {
    world: World,
}

impl NetworkEntityManager {
    pub fn new() -> Self {
        Self {
            world: World::new(),
        }
    }

    /// Spawns a replicated entity at `translation`.
    pub fn spawn(&mut self, translation: Vec3) -> NetworkEntityHandle {
        self.world
            .spawn((Replicated, NetworkTransform { translation }))
            .id()
            .into()
    }

    /// Spawns a replicated entity without position that every window includes.
    pub fn spawn_always_relevant(&mut self) -> NetworkEntityHandle {
        self.world.spawn((Replicated, AlwaysRelevant)).id().into()
    }

    pub fn is_live(&self, handle: NetworkEntityHandle) -> bool {
        handle
            .entity()
            .is_some_and(|entity| self.world.get_entity(entity).is_ok())
    }

    pub fn translation(&self, handle: NetworkEntityHandle) -> Option<Vec3> {
        let entity = handle.entity()?;
        self.world
            .get::<NetworkTransform>(entity)
            .map(|transform| transform.translation)
    }

    pub fn set_translation(&mut self, handle: NetworkEntityHandle, translation: Vec3) -> bool {
        let Some(entity) = handle.entity() else {
            return false;
        };
        match self.world.get_mut::<NetworkTransform>(entity) {
            Some(mut transform) => {
                transform.translation = translation;
                true
            }
            None => false,
        }
    }

    /// Tags `handle` as controlled by `connection`. Returns false for null or stale handles.
    pub fn mark_controlled(&mut self, handle: NetworkEntityHandle, connection: ConnectionId) -> bool {
        let Some(entity) = handle.entity() else {
            return false;
        };
        match self.world.get_entity_mut(entity) {
            Ok(mut entity) => {
                entity.insert(ControlledBy { connection });
                true
            }
            Err(_) => false,
        }
    }

    pub fn controller(&self, handle: NetworkEntityHandle) -> Option<ConnectionId> {
        let entity = handle.entity()?;
        self.world
            .get::<ControlledBy>(entity)
            .map(|controlled| controlled.connection)
    }

    /// Despawns the entity. Returns false for null or stale handles.
    pub fn despawn(&mut self, handle: NetworkEntityHandle) -> bool {
        match handle.entity() {
            Some(entity) if self.world.get_entity(entity).is_ok() => self.world.despawn(entity),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.world.entities().len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub(crate) fn replicated_entities(&mut self) -> Vec<ReplicatedEntity> {
        let mut query = self
            .world
            .query_filtered::<(Entity, Option<&NetworkTransform>, Has<AlwaysRelevant>), With<Replicated>>();
        query
            .iter(&self.world)
            .map(|(entity, transform, always_relevant)| ReplicatedEntity {
                entity,
                translation: transform.map(|t| t.translation),
                always_relevant,
            })
            .collect()
    }
}

impl Default for NetworkEntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NetworkEntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkEntityManager")
            .field("entities", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_stale_handles_are_not_live() {
        let mut entities = NetworkEntityManager::new();
        assert!(!entities.is_live(NetworkEntityHandle::null()));

        let handle = entities.spawn(Vec3::ZERO);
        assert!(entities.is_live(handle));
        assert!(entities.despawn(handle));
        assert!(!entities.is_live(handle));
        assert!(!entities.despawn(handle));
    }

    #[test]
    fn controller_tag_follows_entity() {
        let mut entities = NetworkEntityManager::new();
        let handle = entities.spawn(Vec3::new(1.0, 0.0, 0.0));

        assert!(entities.mark_controlled(handle, ConnectionId::new(9)));
        assert_eq!(entities.controller(handle), Some(ConnectionId::new(9)));
        assert!(!entities.mark_controlled(NetworkEntityHandle::null(), ConnectionId::new(9)));
    }

    #[test]
    fn translation_roundtrips_through_world() {
        let mut entities = NetworkEntityManager::new();
        let handle = entities.spawn(Vec3::ZERO);
        assert!(entities.set_translation(handle, Vec3::new(0.0, 2.0, 0.0)));
        assert_eq!(entities.translation(handle), Some(Vec3::new(0.0, 2.0, 0.0)));
    }
}
