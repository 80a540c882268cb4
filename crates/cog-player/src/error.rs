//! Error types for the player layer.

use cog_protocol::{NetId, PlayerId};

/// Errors from [`PlayerRegistry`](crate::PlayerRegistry) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// No player occupies this slot.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// The slot is already taken. Players must be removed before a new
    /// one can join in their place.
    #[error("player {0} already joined")]
    DuplicatePlayer(PlayerId),

    /// Another player already owns this network id.
    #[error("network id {0} already in use")]
    DuplicateNetId(NetId),
}
