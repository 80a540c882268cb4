//! Identity and value types that travel inside RPC payloads.
//!
//! Two identifiers exist for every player and they are NOT interchangeable:
//!
//! - [`PlayerId`] is the small per-lobby slot number the host game shows
//!   (0–14). Roles and the manual console talk in player ids.
//! - [`NetId`] is the network object id the host assigns to the player's
//!   networked object. It is stable across processes, so object references
//!   on the wire always carry a `NetId`, never a `PlayerId`.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's lobby slot.
///
/// Newtype wrapper so a slot number can't be confused with a [`NetId`]
/// even though both are small integers on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A process-independent network object id.
///
/// The host hands these out when it spawns a networked object. Every peer
/// sees the same `NetId` for the same object, which is what makes it usable
/// as a remote reference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NetId(pub u32);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net-{}", self.0)
    }
}

/// Identifier of an extension-defined role. Sent as a packed `i32`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoleId(pub i32);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "role-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// An integer 2D vector. Both components are written as packed signed
/// integers, `x` first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct Vector2i {
    pub x: i32,
    pub y: i32,
}

impl Vector2i {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Vector2i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// SendOption: delivery hint passed through to the host transport
// ---------------------------------------------------------------------------

/// How the host transport should deliver a frame.
///
/// The extension never implements delivery itself; it only forwards the
/// hint. Custom RPCs default to `Reliable`, matching how the host sends
/// its own state-changing calls.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum SendOption {
    /// Best effort, may be dropped.
    None,
    /// Delivered in order, no loss.
    #[default]
    Reliable,
}
