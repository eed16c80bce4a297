//! Validity diagnostics raised while tearing down connection state.
//!
//! Nothing on the connection lifecycle path is fatal. When a collaborator hands
//! us state that does not resolve (typically a controlled entity that is null or
//! already despawned) the operation completes anyway and the problem is recorded
//! here. Recording can be suppressed from the log output, which lets tests
//! count expected errors without noise.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::error;

use crate::ids::ConnectionId;
use crate::logging::LOG_MULTIPLAYER;
use crate::replication::NetworkEntityHandle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidityError {
    #[error("connection {connection}: controlled entity {entity} is not live, spawner not notified of player leave")]
    PlayerLeaveEntityInvalid {
        connection: ConnectionId,
        entity: NetworkEntityHandle,
    },

    #[error("connection {connection}: controlled entity {entity} is not live, nothing to despawn")]
    DespawnEntityInvalid {
        connection: ConnectionId,
        entity: NetworkEntityHandle,
    },
}

#[derive(Debug, Default)]
struct DiagnosticsState {
    reported: Vec<ValidityError>,
    suppression_depth: usize,
    suppressed: usize,
}

/// Shared, cloneable diagnostics sink.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    state: Rc<RefCell<DiagnosticsState>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, err: ValidityError) {
        let mut state = self.state.borrow_mut();
        if state.suppression_depth > 0 {
            state.suppressed += 1;
        } else {
            error!(target: LOG_MULTIPLAYER, "{}", err);
        }
        state.reported.push(err);
    }

    /// Starts a suppression scope. Scopes nest.
    pub fn start_suppression(&self) {
        let mut state = self.state.borrow_mut();
        if state.suppression_depth == 0 {
            state.suppressed = 0;
        }
        state.suppression_depth += 1;
    }

    /// Ends a suppression scope and returns how many errors it swallowed.
    pub fn stop_suppression(&self) -> usize {
        let mut state = self.state.borrow_mut();
        state.suppression_depth = state.suppression_depth.saturating_sub(1);
        state.suppressed
    }

    pub fn error_count(&self) -> usize {
        self.state.borrow().reported.len()
    }

    pub fn errors(&self) -> Vec<ValidityError> {
        self.state.borrow().reported.clone()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().reported.clear();
    }
}
