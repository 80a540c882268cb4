//! Player records.

use cog_protocol::{NetId, PlayerId, RoleId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// A lobby seat as written in configuration: slot number plus display name.
///
/// Seats carry no network id. The registry assigns one on join, in seat
/// order, so every peer seeded with the same seats agrees on every id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: u8,
    pub name: String,
}

impl Seat {
    pub fn new(id: u8, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One connected player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Lobby slot. Unique among connected players.
    pub id: PlayerId,

    /// Network id of the player's networked object. This is what object
    /// references on the wire carry.
    pub net_id: NetId,

    /// Display name, matched exactly by the manual console.
    pub name: String,

    /// `false` once killed, until revived.
    pub alive: bool,

    /// Extension role, if one has been assigned this game.
    pub role: Option<RoleId>,
}

impl Player {
    pub fn new(id: PlayerId, net_id: NetId, name: impl Into<String>) -> Self {
        Self {
            id,
            net_id,
            name: name.into(),
            alive: true,
            role: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_is_alive_without_role() {
        let p = Player::new(PlayerId(3), NetId(103), "Blue");
        assert!(p.alive);
        assert_eq!(p.role, None);
        assert_eq!(p.name, "Blue");
    }

    #[test]
    fn test_seat_from_json() {
        let seat: Seat = serde_json::from_str(r#"{"id": 2, "name": "Lime"}"#).unwrap();
        assert_eq!(seat, Seat::new(2, "Lime"));
    }
}
