//! Unified error type for COG.

use std::path::PathBuf;

use cog_event::HandlerError;
use cog_player::PlayerError;
use cog_protocol::{NetId, ProtocolError};
use cog_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` variants let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum CogError {
    /// `start` was called while the sender still has an open writer.
    #[error("a writer is already open for {0}; send or close it first")]
    WriterAlreadyOpen(NetId),

    /// `add`, `send` or `close` without an open writer.
    #[error("no writer is open; use `start <call-id>` first")]
    WriterNotOpen,

    /// A command was missing arguments.
    #[error("usage: {0}")]
    Usage(String),

    /// A delay in real time was requested but the clock is event-driven.
    #[error("delays need a tick rate; tick_rate_hz is 0")]
    NoTickRate,

    /// The configuration file is not valid JSON for [`CogConfig`](crate::CogConfig).
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("cannot read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Player(#[from] PlayerError),
}

impl From<CogError> for HandlerError {
    fn from(err: CogError) -> Self {
        HandlerError::other(err)
    }
}
