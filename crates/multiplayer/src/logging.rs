//! Log targets and subscriber setup.

use tracing_subscriber::{
    filter::filter_fn, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    Layer,
};

use crate::error::MultiplayerError;

pub const LOG_MULTIPLAYER: &str = "multiplayer";
pub const LOG_CONNECTION: &str = "multiplayer/connection";
pub const LOG_REPLICATION: &str = "multiplayer/replication";

/// Installs the global console subscriber at `level` ("trace" .. "error", "off").
///
/// Fails if the level does not parse or a global subscriber is already set.
pub fn init(level: &str) -> Result<(), MultiplayerError> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| MultiplayerError::InvalidSetting {
            key: "logging.level",
            reason: format!("unknown level `{level}`"),
        })?;

    let console_layer = fmt::Layer::default()
        .with_target(true)
        .with_filter(filter_fn(move |metadata| metadata.level() <= &level));

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .map_err(|e| MultiplayerError::Logging(e.to_string()))
}
