//! The multiplayer coordinator.
//!
//! Owns the connection registry and the networked entity world, raises the
//! session lifecycle events and binds/unbinds replication windows as the
//! transport reports connects and disconnects.
//!
//! Lifecycle:
//! `Uninitialized -> Initialized(role) -> ShuttingDown -> Uninitialized`
//!
//! A session ends when
//! - a dedicated server loses its last connection (if `session.shutdown_when_empty`),
//! - a client loses its link to the server,
//! - or [`MultiplayerCoordinator::terminate`] is called.
//!
//! A client-server host keeps running without remote players until terminated.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::agent::{MultiplayerAgentDatum, MultiplayerAgentType};
use crate::connection::{Connection, ConnectionRole, DisconnectReason, TerminationEndpoint};
use crate::connection_data::{
    ClientToServerConnectionData, ConnectionData, ConnectionDataType,
    ServerToClientConnectionData,
};
use crate::diagnostics::{Diagnostics, ValidityError};
use crate::error::MultiplayerError;
use crate::event::{Event, EventHandler};
use crate::ids::{ConnectionId, IdGenerator, SessionId};
use crate::logging::{LOG_CONNECTION, LOG_MULTIPLAYER};
use crate::network_interface::NetworkInterface;
use crate::registry::{release_connection_data, ConnectionEntry, ConnectionRegistry};
use crate::replication::{
    NetworkEntityHandle, NetworkEntityManager, ReplicationSet, ServerToClientReplicationWindow,
};
use crate::settings::MultiplayerSettings;
use crate::spawner::MultiplayerSpawner;

/// Current lifecycle state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No role set. `initialize_multiplayer` starts a session.
    Uninitialized,
    /// A session is running with a fixed role.
    Initialized(MultiplayerAgentType),
    /// The session is being torn down. Only held inside `terminate` or the
    /// disconnect that ends the session, so callers and event handlers never
    /// observe it.
    ShuttingDown,
}

/// Top-level owner of a multiplayer session: the connection registry, the
/// networked entity world and the lifecycle events.
pub struct MultiplayerCoordinator {
    network_interface: Box<dyn NetworkInterface>,
    settings: MultiplayerSettings,
    diagnostics: Diagnostics,

    state: SessionState,
    session_id: Option<SessionId>,
    session_ids: IdGenerator,

    registry: ConnectionRegistry,
    entities: NetworkEntityManager,
    spawner: Option<Rc<RefCell<dyn MultiplayerSpawner>>>,

    init_event: Event<dyn NetworkInterface>,
    shutdown_event: Event<dyn NetworkInterface>,
    connection_acquired_event: Event<MultiplayerAgentDatum>,
}

impl MultiplayerCoordinator {
    /// Creates an uninitialized coordinator on top of `network_interface`.
    pub fn new(network_interface: Box<dyn NetworkInterface>, settings: MultiplayerSettings) -> Self {
        Self {
            network_interface,
            settings,
            diagnostics: Diagnostics::new(),
            state: SessionState::Uninitialized,
            session_id: None,
            session_ids: IdGenerator::new(1),
            registry: ConnectionRegistry::new(),
            entities: NetworkEntityManager::new(),
            spawner: None,
            init_event: Event::new(),
            shutdown_event: Event::new(),
            connection_acquired_event: Event::new(),
        }
    }

    /// Routes validity errors to `diagnostics` instead of a private sink.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    // --------------------------------------------------------------------
    // Observers
    // --------------------------------------------------------------------

    /// Observes session start. Dropping the returned guard unregisters it.
    pub fn add_session_init_handler<F>(&self, handler: F) -> EventHandler
    where
        F: FnMut(&(dyn NetworkInterface + 'static)) + 'static,
    {
        self.init_event.add_handler(handler)
    }

    /// Observes session end, fired once per session.
    pub fn add_session_shutdown_handler<F>(&self, handler: F) -> EventHandler
    where
        F: FnMut(&(dyn NetworkInterface + 'static)) + 'static,
    {
        self.shutdown_event.add_handler(handler)
    }

    /// Observes accepted connections.
    pub fn add_connection_acquired_handler<F>(&self, handler: F) -> EventHandler
    where
        F: FnMut(&MultiplayerAgentDatum) + 'static,
    {
        self.connection_acquired_event.add_handler(handler)
    }

    // --------------------------------------------------------------------
    // Spawner
    // --------------------------------------------------------------------

    pub fn register_spawner(&mut self, spawner: Rc<RefCell<dyn MultiplayerSpawner>>) {
        if self.spawner.replace(spawner).is_some() {
            warn!(target: LOG_MULTIPLAYER, "Replacing previously registered spawner");
        }
    }

    pub fn unregister_spawner(&mut self) -> Option<Rc<RefCell<dyn MultiplayerSpawner>>> {
        self.spawner.take()
    }

    pub fn has_spawner(&self) -> bool {
        self.spawner.is_some()
    }

    // --------------------------------------------------------------------
    // Session lifecycle
    // --------------------------------------------------------------------

    /// Starts a session with `agent_type`.
    ///
    /// Fires `Init` once per session. Calls while a session is live are
    /// ignored and keep the current role.
    pub fn initialize_multiplayer(&mut self, agent_type: MultiplayerAgentType) {
        match self.state {
            SessionState::Uninitialized => {
                let session_id = SessionId::new(self.session_ids.next());
                self.state = SessionState::Initialized(agent_type);
                self.session_id = Some(session_id);
                info!(
                    target: LOG_MULTIPLAYER,
                    "Session {} initialized as {} on interface {}",
                    session_id,
                    agent_type,
                    self.network_interface.name()
                );
                self.init_event.signal(self.network_interface.as_ref());
            }
            SessionState::Initialized(current) => {
                debug!(
                    target: LOG_MULTIPLAYER,
                    "Already initialized as {}, ignoring request for {}", current, agent_type
                );
            }
            SessionState::ShuttingDown => {
                debug!(
                    target: LOG_MULTIPLAYER,
                    "Session shutting down, ignoring request for {}", agent_type
                );
            }
        }
    }

    /// Ends the running session. Returns false if there was none.
    pub fn terminate(&mut self, reason: DisconnectReason) -> bool {
        match self.state {
            SessionState::Initialized(_) => {
                info!(target: LOG_MULTIPLAYER, "Terminating session ({:?})", reason);
                self.end_session(reason);
                true
            }
            _ => false,
        }
    }

    // --------------------------------------------------------------------
    // Transport notifications
    // --------------------------------------------------------------------

    /// Transport callback for a newly established connection.
    pub fn on_connect(&mut self, connection: &dyn Connection) {
        let id = connection.connection_id();
        self.registry.register(connection);
        info!(
            target: LOG_CONNECTION,
            "Connection {} from {} established ({:?})",
            id,
            connection.remote_address(),
            connection.connection_role()
        );

        match connection.connection_role() {
            ConnectionRole::Acceptor => {
                let datum = MultiplayerAgentDatum::client(id);
                self.connection_acquired_event.signal(&datum);
            }
            ConnectionRole::Connector => {
                if self.agent_type() == Some(MultiplayerAgentType::Client) {
                    let data = ClientToServerConnectionData::new(connection);
                    self.attach_connection_data(connection, Box::new(data));
                }
            }
        }
    }

    /// Transport callback for a closed connection.
    ///
    /// Removes the player behind server-to-client data, then releases the
    /// connection's data (window first). Disconnecting an unknown or already
    /// disconnected connection only re-evaluates the session end.
    pub fn on_disconnect(
        &mut self,
        connection: &dyn Connection,
        reason: DisconnectReason,
        endpoint: TerminationEndpoint,
    ) {
        let id = connection.connection_id();
        let role = connection.connection_role();
        info!(
            target: LOG_CONNECTION,
            "Connection {} disconnected ({:?}, terminated by {:?} endpoint)", id, reason, endpoint
        );

        if let Some(data) = self.registry.unregister(id).and_then(ConnectionEntry::into_data) {
            self.release_player_data(data, reason);
        }

        let ends_session = match self.state {
            SessionState::Initialized(MultiplayerAgentType::DedicatedServer) => {
                self.settings.session.shutdown_when_empty
                    && self.network_interface.active_connection_count() == 0
            }
            SessionState::Initialized(MultiplayerAgentType::Client) => {
                role == ConnectionRole::Connector
            }
            _ => false,
        };
        if ends_session {
            self.end_session(reason);
        }
    }

    // --------------------------------------------------------------------
    // Players & connection data
    // --------------------------------------------------------------------

    /// Admits the player behind an accepted connection.
    ///
    /// Asks the spawner for the player's controlled entity (null without a
    /// spawner), then binds connection data with a replication window around
    /// it. Accepting the same connection twice returns the existing entity.
    pub fn accept_player(
        &mut self,
        connection: &dyn Connection,
    ) -> Result<NetworkEntityHandle, MultiplayerError> {
        let agent_type = self.agent_type();
        if !agent_type.is_some_and(MultiplayerAgentType::is_server) {
            return Err(MultiplayerError::NotServer(agent_type));
        }

        let id = connection.connection_id();
        let role = connection.connection_role();
        if role != ConnectionRole::Acceptor {
            return Err(MultiplayerError::WrongConnectionRole {
                id,
                expected: ConnectionRole::Acceptor,
                actual: role,
            });
        }

        if let Some(existing) = self.registry.connection_data(id) {
            if existing.connection_data_type() == ConnectionDataType::ServerToClient {
                debug!(target: LOG_CONNECTION, "Player {} already accepted", id);
                return Ok(existing.controlled_entity());
            }
        }

        let max_players = self.settings.session.max_players;
        if self.player_count() >= max_players as usize {
            return Err(MultiplayerError::ServerFull { max_players });
        }

        let datum = MultiplayerAgentDatum::client(id);
        let controlled_entity = match self.spawner.as_ref() {
            Some(spawner) => spawner
                .borrow_mut()
                .on_player_join(&mut self.entities, &datum),
            None => NetworkEntityHandle::null(),
        };
        self.entities.mark_controlled(controlled_entity, id);

        let mut data = ServerToClientConnectionData::new(connection, controlled_entity);
        data.replication_manager_mut()
            .set_replication_window(Box::new(ServerToClientReplicationWindow::new(
                controlled_entity,
                connection,
                &self.settings.replication,
            )));
        self.attach_connection_data(connection, Box::new(data));

        info!(
            target: LOG_CONNECTION,
            "Player {} joined, controlling {}", id, controlled_entity
        );
        Ok(controlled_entity)
    }

    /// Binds `data` to `connection`, releasing whatever was bound before.
    pub fn attach_connection_data(
        &mut self,
        connection: &dyn Connection,
        data: Box<dyn ConnectionData>,
    ) {
        if let Some(previous) = self.registry.attach(connection, data) {
            release_connection_data(previous);
        }
    }

    /// Recomputes every bound replication window. Returns how many were updated.
    pub fn update_replication(&mut self) -> usize {
        let mut updated = 0;
        for data in self.registry.iter_data_mut() {
            if data
                .replication_manager_mut()
                .update_window(&mut self.entities)
            {
                updated += 1;
            }
        }
        updated
    }

    // --------------------------------------------------------------------
    // Accessors
    // --------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn agent_type(&self) -> Option<MultiplayerAgentType> {
        match self.state {
            SessionState::Initialized(agent_type) => Some(agent_type),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Connections that carry server-to-client connection data.
    pub fn player_count(&self) -> usize {
        self.registry
            .ids()
            .into_iter()
            .filter_map(|id| self.registry.connection_data(id))
            .filter(|data| data.connection_data_type() == ConnectionDataType::ServerToClient)
            .count()
    }

    /// Players as counted by the registered spawner, if it tracks them.
    pub fn spawner_player_count(&self) -> Option<usize> {
        self.spawner.as_ref()?.borrow().player_count()
    }

    pub fn replication_set(&self, id: ConnectionId) -> Option<&ReplicationSet> {
        self.registry
            .connection_data(id)?
            .replication_manager()
            .replication_set()
    }

    pub fn network_interface(&self) -> &dyn NetworkInterface {
        self.network_interface.as_ref()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn entities(&self) -> &NetworkEntityManager {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut NetworkEntityManager {
        &mut self.entities
    }

    pub fn settings(&self) -> &MultiplayerSettings {
        &self.settings
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    // --------------------------------------------------------------------
    // Internals
    // --------------------------------------------------------------------

    /// Releases detached connection data, removing its player first when the
    /// data is server-to-client.
    fn release_player_data(&mut self, data: Box<dyn ConnectionData>, reason: DisconnectReason) {
        if data.connection_data_type() == ConnectionDataType::ServerToClient {
            self.remove_player(data.as_ref(), reason);
        }
        release_connection_data(data);
    }

    /// Player leave: tell the spawner and despawn the controlled entity.
    ///
    /// A controlled entity that does not resolve is reported, never fatal.
    fn remove_player(&mut self, data: &dyn ConnectionData, reason: DisconnectReason) {
        let id = data.connection_id();
        let controlled_entity = data.controlled_entity();
        if !self.entities.is_live(controlled_entity) {
            if self.spawner.is_some() {
                self.diagnostics.report(ValidityError::PlayerLeaveEntityInvalid {
                    connection: id,
                    entity: controlled_entity,
                });
            }
            self.diagnostics.report(ValidityError::DespawnEntityInvalid {
                connection: id,
                entity: controlled_entity,
            });
            return;
        }

        let datum = MultiplayerAgentDatum::client(id);
        let no_window = ReplicationSet::default();
        let replication_set = data
            .replication_manager()
            .replication_set()
            .unwrap_or(&no_window);
        if let Some(spawner) = self.spawner.as_ref() {
            spawner.borrow_mut().on_player_leave(
                &mut self.entities,
                controlled_entity,
                &datum,
                replication_set,
                reason,
            );
        }
        // The spawner may have despawned it already.
        if self.entities.despawn(controlled_entity) {
            debug!(
                target: LOG_CONNECTION,
                "Despawned {} controlled by {}", controlled_entity, id
            );
        }
    }

    fn end_session(&mut self, reason: DisconnectReason) {
        let session_id = self.session_id.take();
        self.state = SessionState::ShuttingDown;

        for data in self
            .registry
            .drain()
            .into_iter()
            .filter_map(ConnectionEntry::into_data)
        {
            self.release_player_data(data, reason);
        }

        match session_id {
            Some(session_id) => info!(target: LOG_MULTIPLAYER, "Session {} shut down", session_id),
            None => info!(target: LOG_MULTIPLAYER, "Session shut down"),
        }
        self.shutdown_event.signal(self.network_interface.as_ref());
        self.state = SessionState::Uninitialized;
    }
}

impl std::fmt::Debug for MultiplayerCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplayerCoordinator")
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .field("interface", &self.network_interface.name())
            .field("connections", &self.registry.len())
            .field("entities", &self.entities)
            .field("has_spawner", &self.spawner.is_some())
            .finish()
    }
}
