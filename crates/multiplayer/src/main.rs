//! Scripted multiplayer session over the loopback interface.
//!
//! Hosts a session, lets a handful of clients join, computes their replication
//! windows and tears everything down again. Useful to eyeball the lifecycle
//! logging and to try out settings files.

use std::cell::RefCell;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use bevy_math::Vec3;
use clap::{Parser, ValueEnum};
use multiplayer::logging::{self, LOG_MULTIPLAYER};
use multiplayer::prelude::*;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "mp_sim",
    about = "Runs a scripted multiplayer session over the loopback interface"
)]
struct Cli {
    /// Settings file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Agent::Dedicated)]
    agent: Agent,

    /// Number of clients that join.
    #[arg(short = 'n', long, default_value_t = 4)]
    clients: u16,

    /// Number of static props spawned along the x axis.
    #[arg(long, default_value_t = 8)]
    props: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Agent {
    Dedicated,
    ClientServer,
}

impl From<Agent> for MultiplayerAgentType {
    fn from(agent: Agent) -> Self {
        match agent {
            Agent::Dedicated => MultiplayerAgentType::DedicatedServer,
            Agent::ClientServer => MultiplayerAgentType::ClientServer,
        }
    }
}

/// Places players on the x axis, ten units apart.
#[derive(Default)]
struct SimSpawner {
    joined: u32,
    active: usize,
}

impl MultiplayerSpawner for SimSpawner {
    fn on_player_join(
        &mut self,
        entities: &mut NetworkEntityManager,
        datum: &MultiplayerAgentDatum,
    ) -> NetworkEntityHandle {
        self.joined += 1;
        self.active += 1;
        let handle = entities.spawn(Vec3::new(self.joined as f32 * 10.0, 0.0, 0.0));
        info!(target: LOG_MULTIPLAYER, "Spawned {} for player {}", handle, datum.id);
        handle
    }

    fn on_player_leave(
        &mut self,
        _entities: &mut NetworkEntityManager,
        controlled_entity: NetworkEntityHandle,
        datum: &MultiplayerAgentDatum,
        replication_set: &ReplicationSet,
        reason: DisconnectReason,
    ) {
        self.active = self.active.saturating_sub(1);
        info!(
            target: LOG_MULTIPLAYER,
            "Player {} left ({:?}), releasing {} (saw {} entities)",
            datum.id,
            reason,
            controlled_entity,
            replication_set.len()
        );
    }

    fn player_count(&self) -> Option<usize> {
        Some(self.active)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => MultiplayerSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => MultiplayerSettings::default(),
    };
    logging::init(&settings.logging.level)?;

    let interface = LoopbackNetworkInterface::new("loopback");
    let mut coordinator = MultiplayerCoordinator::new(Box::new(interface.clone()), settings);

    let _init = coordinator.add_session_init_handler(|network| {
        info!(target: LOG_MULTIPLAYER, "Init event on {}", network.name());
    });
    let _shutdown = coordinator.add_session_shutdown_handler(|network| {
        info!(target: LOG_MULTIPLAYER, "Shutdown event on {}", network.name());
    });
    let _acquired = coordinator.add_connection_acquired_handler(|datum| {
        info!(target: LOG_MULTIPLAYER, "Connection acquired: {}", datum.id);
    });

    coordinator.register_spawner(Rc::new(RefCell::new(SimSpawner::default())));
    coordinator.initialize_multiplayer(cli.agent.into());

    for i in 0..cli.props {
        coordinator
            .entities_mut()
            .spawn(Vec3::new(i as f32 * 7.5, 0.0, 0.0));
    }
    coordinator.entities_mut().spawn_always_relevant();

    let connections: Vec<LoopbackConnection> = (1..=cli.clients)
        .map(|id| {
            let address = SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000u16.wrapping_add(id)));
            interface.open(ConnectionId::new(u64::from(id)), address, ConnectionRole::Acceptor)
        })
        .collect();

    for connection in &connections {
        coordinator.on_connect(connection);
        coordinator
            .accept_player(connection)
            .with_context(|| format!("accepting player {}", connection.connection_id()))?;
    }

    info!(
        target: LOG_MULTIPLAYER,
        "{} players joined, spawner tracks {:?}",
        coordinator.player_count(),
        coordinator.spawner_player_count()
    );

    let updated = coordinator.update_replication();
    info!(target: LOG_MULTIPLAYER, "Updated {} replication windows", updated);
    for connection in &connections {
        if let Some(set) = coordinator.replication_set(connection.connection_id()) {
            info!(
                target: LOG_MULTIPLAYER,
                "Player {} sees {} entities", connection.connection_id(), set.len()
            );
        }
    }

    for connection in &connections {
        interface.close(connection);
        coordinator.on_disconnect(
            connection,
            DisconnectReason::Graceful,
            TerminationEndpoint::Remote,
        );
    }

    if coordinator.state() != SessionState::Uninitialized {
        coordinator.terminate(DisconnectReason::TerminatedByServer);
    }
    info!(
        target: LOG_MULTIPLAYER,
        "Done, {} diagnostics reported",
        coordinator.diagnostics().error_count()
    );
    Ok(())
}
