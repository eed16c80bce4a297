use std::fmt;

use tracing::{debug, trace};

use crate::ids::ConnectionId;
use crate::logging::LOG_REPLICATION;
use crate::replication::entity::NetworkEntityManager;
use crate::replication::window::{ReplicationSet, ReplicationWindow};

/// Drives the replication window of one connection.
///
/// Owns at most one window; setting a new one releases the previous.
pub struct ReplicationManager {
    connection_id: ConnectionId,
    window: Option<Box<dyn ReplicationWindow>>,
    update_count: u64,
}

impl ReplicationManager {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            window: None,
            update_count: 0,
        }
    }

    pub fn set_replication_window(&mut self, window: Box<dyn ReplicationWindow>) {
        if self.window.replace(window).is_some() {
            debug!(
                target: LOG_REPLICATION,
                "Replaced replication window of connection {}", self.connection_id
            );
        }
    }

    /// Releases the window. Returns whether one was set.
    pub fn clear_replication_window(&mut self) -> bool {
        match self.window.take() {
            Some(window) => {
                drop(window);
                trace!(
                    target: LOG_REPLICATION,
                    "Released replication window of connection {}", self.connection_id
                );
                true
            }
            None => false,
        }
    }

    pub fn replication_window(&self) -> Option<&dyn ReplicationWindow> {
        self.window.as_deref()
    }

    pub fn has_window(&self) -> bool {
        self.window.is_some()
    }

    pub fn replication_set(&self) -> Option<&ReplicationSet> {
        self.window.as_deref().map(|window| window.replication_set())
    }

    /// Recomputes the window. Returns false when no window is bound.
    pub fn update_window(&mut self, entities: &mut NetworkEntityManager) -> bool {
        let Some(window) = self.window.as_mut() else {
            return false;
        };
        window.update_window(entities);
        self.update_count += 1;
        true
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl fmt::Debug for ReplicationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationManager")
            .field("connection_id", &self.connection_id)
            .field("has_window", &self.has_window())
            .field("update_count", &self.update_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::replication::entity::NetworkEntityHandle;

    struct TrackedWindow {
        name: &'static str,
        released: Rc<RefCell<Vec<&'static str>>>,
        set: ReplicationSet,
    }

    impl ReplicationWindow for TrackedWindow {
        fn controlled_entity(&self) -> NetworkEntityHandle {
            NetworkEntityHandle::null()
        }

        fn replication_set(&self) -> &ReplicationSet {
            &self.set
        }

        fn update_window(&mut self, _entities: &mut NetworkEntityManager) {}
    }

    impl Drop for TrackedWindow {
        fn drop(&mut self) {
            self.released.borrow_mut().push(self.name);
        }
    }

    fn tracked(name: &'static str, released: &Rc<RefCell<Vec<&'static str>>>) -> Box<TrackedWindow> {
        Box::new(TrackedWindow {
            name,
            released: Rc::clone(released),
            set: ReplicationSet::default(),
        })
    }

    #[test]
    fn setting_a_window_releases_the_previous_one() {
        let released = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ReplicationManager::new(ConnectionId::new(1));

        manager.set_replication_window(tracked("old", &released));
        manager.set_replication_window(tracked("new", &released));
        assert_eq!(*released.borrow(), vec!["old"]);

        assert!(manager.clear_replication_window());
        assert!(!manager.clear_replication_window());
        assert_eq!(*released.borrow(), vec!["old", "new"]);
    }

    #[test]
    fn update_without_window_is_noop() {
        let mut entities = NetworkEntityManager::new();
        let mut manager = ReplicationManager::new(ConnectionId::new(2));
        assert!(!manager.update_window(&mut entities));
        assert_eq!(manager.update_count(), 0);
        assert!(manager.replication_set().is_none());
    }
}
