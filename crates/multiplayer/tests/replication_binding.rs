use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use bevy_ecs::entity::Entity;
use bevy_math::Vec3;
use multiplayer::prelude::*;
use multiplayer::replication::{ReplicationManager, ReplicationSet};
use multiplayer::{ConnectionData, ConnectionDataType, MultiplayerError};
use test_log::test;

type DropLog = Rc<RefCell<Vec<&'static str>>>;

/// Window that records when it is released.
struct TrackedWindow {
    log: DropLog,
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
        self.log.borrow_mut().push("window");
    }
}

/// Connection data that records when it is released.
struct TrackedData {
    log: DropLog,
    id: ConnectionId,
    manager: ReplicationManager,
}

impl ConnectionData for TrackedData {
    fn connection_data_type(&self) -> ConnectionDataType {
        ConnectionDataType::ClientToServer
    }

    fn connection_id(&self) -> ConnectionId {
        self.id
    }

    fn controlled_entity(&self) -> NetworkEntityHandle {
        NetworkEntityHandle::null()
    }

    fn replication_manager(&self) -> &ReplicationManager {
        &self.manager
    }

    fn replication_manager_mut(&mut self) -> &mut ReplicationManager {
        &mut self.manager
    }
}

impl Drop for TrackedData {
    fn drop(&mut self) {
        self.log.borrow_mut().push("data");
    }
}

fn tracked_data(log: &DropLog, id: ConnectionId) -> Box<TrackedData> {
    let mut manager = ReplicationManager::new(id);
    manager.set_replication_window(Box::new(TrackedWindow {
        log: Rc::clone(log),
        set: ReplicationSet::default(),
    }));
    Box::new(TrackedData {
        log: Rc::clone(log),
        id,
        manager,
    })
}

fn host(settings: MultiplayerSettings) -> (MultiplayerCoordinator, LoopbackNetworkInterface) {
    let interface = LoopbackNetworkInterface::new("loopback");
    let coordinator = MultiplayerCoordinator::new(Box::new(interface.clone()), settings);
    (coordinator, interface)
}

#[test]
fn window_is_released_before_connection_data() {
    let (mut coordinator, interface) = host(MultiplayerSettings::default());
    coordinator.initialize_multiplayer(MultiplayerAgentType::ClientServer);

    let log = DropLog::default();
    let conn = interface.open(ConnectionId::new(1), UNSPECIFIED_ADDRESS, ConnectionRole::Acceptor);
    coordinator.on_connect(&conn);
    coordinator.attach_connection_data(&conn, tracked_data(&log, conn.connection_id()));

    interface.close(&conn);
    coordinator.on_disconnect(&conn, DisconnectReason::Graceful, TerminationEndpoint::Remote);

    assert_eq!(*log.borrow(), vec!["window", "data"]);
}

#[test]
fn reattaching_releases_previous_data() {
    let (mut coordinator, interface) = host(MultiplayerSettings::default());
    let log = DropLog::default();
    let conn = interface.open(ConnectionId::new(2), UNSPECIFIED_ADDRESS, ConnectionRole::Acceptor);

    coordinator.attach_connection_data(&conn, tracked_data(&log, conn.connection_id()));
    assert!(log.borrow().is_empty());

    coordinator.attach_connection_data(&conn, tracked_data(&log, conn.connection_id()));
    assert_eq!(*log.borrow(), vec!["window", "data"]);
    assert_eq!(coordinator.registry().attached_count(), 1);
}

#[test]
fn terminate_releases_all_windows() {
    let (mut coordinator, interface) = host(MultiplayerSettings::default());
    coordinator.initialize_multiplayer(MultiplayerAgentType::ClientServer);
    let log = DropLog::default();
    for id in 1..=3 {
        let conn =
            interface.open(ConnectionId::new(id), UNSPECIFIED_ADDRESS, ConnectionRole::Acceptor);
        coordinator.on_connect(&conn);
        coordinator.attach_connection_data(&conn, tracked_data(&log, conn.connection_id()));
    }

    assert!(coordinator.terminate(DisconnectReason::TerminatedByServer));
    let log = log.borrow();
    assert_eq!(log.len(), 6);
    assert!(log.chunks(2).all(|pair| pair == ["window", "data"]));
}

struct LineSpawner;

impl MultiplayerSpawner for LineSpawner {
    fn on_player_join(
        &mut self,
        entities: &mut NetworkEntityManager,
        datum: &MultiplayerAgentDatum,
    ) -> NetworkEntityHandle {
        entities.spawn(Vec3::new(datum.id.get() as f32 * 100.0, 0.0, 0.0))
    }

    fn on_player_leave(
        &mut self,
        _entities: &mut NetworkEntityManager,
        _controlled_entity: NetworkEntityHandle,
        _datum: &MultiplayerAgentDatum,
        _replication_set: &ReplicationSet,
        _reason: DisconnectReason,
    ) {
    }
}

fn entity(handle: NetworkEntityHandle) -> Entity {
    handle.entity().unwrap()
}

#[test]
fn accepted_players_see_their_surroundings() {
    let mut settings = MultiplayerSettings::default();
    settings.replication.window_radius = 20.0;
    let (mut coordinator, interface) = host(settings);
    coordinator.register_spawner(Rc::new(RefCell::new(LineSpawner)));
    coordinator.initialize_multiplayer(MultiplayerAgentType::DedicatedServer);

    let conn1 = interface.open(ConnectionId::new(1), UNSPECIFIED_ADDRESS, ConnectionRole::Acceptor);
    let conn2 = interface.open(ConnectionId::new(2), UNSPECIFIED_ADDRESS, ConnectionRole::Acceptor);
    coordinator.on_connect(&conn1);
    coordinator.on_connect(&conn2);
    let player1 = coordinator.accept_player(&conn1).unwrap();
    let player2 = coordinator.accept_player(&conn2).unwrap();

    let near_player1 = coordinator.entities_mut().spawn(Vec3::new(110.0, 0.0, 0.0));
    let banner = coordinator.entities_mut().spawn_always_relevant();

    assert_eq!(coordinator.update_replication(), 2);

    let set1 = coordinator.replication_set(conn1.connection_id()).unwrap();
    assert_eq!(
        set1.entities(),
        vec![entity(player1), entity(banner), entity(near_player1)]
    );
    assert!(!set1.contains(entity(player2)));

    let set2 = coordinator.replication_set(conn2.connection_id()).unwrap();
    assert_eq!(set2.entities(), vec![entity(player2), entity(banner)]);
}

#[test]
fn replication_windows_follow_moving_players() {
    let mut settings = MultiplayerSettings::default();
    settings.replication.window_radius = 20.0;
    let (mut coordinator, interface) = host(settings);
    coordinator.register_spawner(Rc::new(RefCell::new(LineSpawner)));
    coordinator.initialize_multiplayer(MultiplayerAgentType::ClientServer);

    let conn = interface.open(ConnectionId::new(1), UNSPECIFIED_ADDRESS, ConnectionRole::Acceptor);
    let player = coordinator.accept_player(&conn).unwrap();
    let rock = coordinator.entities_mut().spawn(Vec3::new(500.0, 0.0, 0.0));

    coordinator.update_replication();
    assert!(!coordinator
        .replication_set(conn.connection_id())
        .unwrap()
        .contains(entity(rock)));

    assert!(coordinator
        .entities_mut()
        .set_translation(player, Vec3::new(495.0, 0.0, 0.0)));
    coordinator.update_replication();
    assert!(coordinator
        .replication_set(conn.connection_id())
        .unwrap()
        .contains(entity(rock)));
}

#[test]
fn settings_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [session]
        max_players = 2
        shutdown_when_empty = false

        [replication]
        window_radius = 8.0
        "#
    )
    .unwrap();

    let settings = MultiplayerSettings::load(file.path()).unwrap();
    assert_eq!(settings.session.max_players, 2);
    assert!(!settings.session.shutdown_when_empty);
    assert_eq!(settings.replication.window_radius, 8.0);
    assert_eq!(settings.replication.max_entities, 128);
    assert_eq!(settings.logging.level, "info");
}

#[test]
fn missing_settings_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = MultiplayerSettings::load(&path).unwrap_err();
    match err {
        MultiplayerError::SettingsIo { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}
