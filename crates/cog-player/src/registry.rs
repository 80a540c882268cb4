//! The player registry: every connected player, indexed both ways.
//!
//! Players are addressed two ways:
//! - by [`PlayerId`], the lobby slot humans and role code talk about, and
//! - by [`NetId`], the network object id that travels on the wire.
//!
//! The registry keeps both indexes in sync and implements the codec's
//! [`NetObjectLookup`] and [`PlayerDirectory`] traits, so a decoded
//! object reference turns straight into a `PlayerId` (or a
//! `StaleObjectReference` error if the player has left).
//!
//! # Network id allocation
//!
//! [`join`](PlayerRegistry::join) hands out network ids from a counter
//! that only ever goes up. Two registries that see the same joins in the
//! same order assign the same ids, which is how peers agree on references
//! without a server. A player who leaves and comes back gets a fresh id;
//! references to the old one stay stale.

use std::collections::{BTreeMap, HashMap};

use cog_protocol::{NetId, NetObjectLookup, PlayerDirectory, PlayerId, RoleId};
use tracing::{debug, info};

use crate::{Player, PlayerError, Seat};

/// First network id handed out by [`PlayerRegistry::join`].
const FIRST_NET_ID: u32 = 1;

/// All connected players.
#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    /// Players keyed by slot. A `BTreeMap` so iteration is in slot order.
    players: BTreeMap<PlayerId, Player>,

    /// Reverse index from network id to slot. Kept in sync with `players`.
    by_net_id: HashMap<NetId, PlayerId>,

    next_net_id: u32,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self {
            players: BTreeMap::new(),
            by_net_id: HashMap::new(),
            next_net_id: FIRST_NET_ID,
        }
    }
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every seat joined, in order.
    ///
    /// # Errors
    /// [`PlayerError::DuplicatePlayer`] if two seats share a slot.
    pub fn from_seats(seats: &[Seat]) -> Result<Self, PlayerError> {
        let mut registry = Self::new();
        for seat in seats {
            registry.join(PlayerId(seat.id), &seat.name)?;
        }
        Ok(registry)
    }

    /// Adds a player, assigning the next network id.
    ///
    /// # Errors
    /// [`PlayerError::DuplicatePlayer`] if the slot is taken.
    pub fn join(&mut self, id: PlayerId, name: &str) -> Result<&Player, PlayerError> {
        if self.players.contains_key(&id) {
            return Err(PlayerError::DuplicatePlayer(id));
        }
        // Skip ids taken by players inserted with explicit network ids.
        while self.by_net_id.contains_key(&NetId(self.next_net_id)) {
            self.next_net_id += 1;
        }
        let net_id = NetId(self.next_net_id);
        self.next_net_id += 1;
        self.insert(Player::new(id, net_id, name))
    }

    /// Adds a player whose network id was assigned elsewhere.
    ///
    /// # Errors
    /// [`PlayerError::DuplicatePlayer`] or [`PlayerError::DuplicateNetId`].
    pub fn insert(&mut self, player: Player) -> Result<&Player, PlayerError> {
        if self.players.contains_key(&player.id) {
            return Err(PlayerError::DuplicatePlayer(player.id));
        }
        if self.by_net_id.contains_key(&player.net_id) {
            return Err(PlayerError::DuplicateNetId(player.net_id));
        }

        let id = player.id;
        info!(player = %id, net_id = %player.net_id, name = %player.name, "player joined");
        self.by_net_id.insert(player.net_id, id);
        Ok(self.players.entry(id).or_insert(player))
    }

    /// Removes a player. Their network id becomes stale.
    ///
    /// # Errors
    /// [`PlayerError::NotFound`] if nobody occupies the slot.
    pub fn remove(&mut self, id: PlayerId) -> Result<Player, PlayerError> {
        let player = self.players.remove(&id).ok_or(PlayerError::NotFound(id))?;
        self.by_net_id.remove(&player.net_id);
        info!(player = %id, net_id = %player.net_id, "player left");
        Ok(player)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// # Errors
    /// [`PlayerError::NotFound`] if nobody occupies the slot.
    pub fn require(&self, id: PlayerId) -> Result<&Player, PlayerError> {
        self.players.get(&id).ok_or(PlayerError::NotFound(id))
    }

    fn require_mut(&mut self, id: PlayerId) -> Result<&mut Player, PlayerError> {
        self.players.get_mut(&id).ok_or(PlayerError::NotFound(id))
    }

    pub fn by_net_id(&self, net_id: NetId) -> Option<&Player> {
        self.by_net_id.get(&net_id).and_then(|id| self.players.get(id))
    }

    /// The player whose name is exactly `name` (case-sensitive).
    pub fn by_name(&self, name: &str) -> Option<&Player> {
        self.players.values().find(|p| p.name == name)
    }

    /// Network id of a player.
    ///
    /// # Errors
    /// [`PlayerError::NotFound`] if nobody occupies the slot.
    pub fn net_id_of(&self, id: PlayerId) -> Result<NetId, PlayerError> {
        self.require(id).map(|p| p.net_id)
    }

    /// Players in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.alive)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Marks a player dead. Returns `false` if they already were.
    ///
    /// # Errors
    /// [`PlayerError::NotFound`] if nobody occupies the slot.
    pub fn kill(&mut self, id: PlayerId) -> Result<bool, PlayerError> {
        let player = self.require_mut(id)?;
        let changed = std::mem::replace(&mut player.alive, false);
        if changed {
            debug!(player = %id, "player died");
        }
        Ok(changed)
    }

    /// Marks a player alive. Returns `false` if they already were.
    ///
    /// # Errors
    /// [`PlayerError::NotFound`] if nobody occupies the slot.
    pub fn revive(&mut self, id: PlayerId) -> Result<bool, PlayerError> {
        let player = self.require_mut(id)?;
        let changed = !std::mem::replace(&mut player.alive, true);
        if changed {
            debug!(player = %id, "player revived");
        }
        Ok(changed)
    }

    /// Assigns an extension role.
    ///
    /// # Errors
    /// [`PlayerError::NotFound`] if nobody occupies the slot.
    pub fn set_role(&mut self, id: PlayerId, role: RoleId) -> Result<(), PlayerError> {
        self.require_mut(id)?.role = Some(role);
        debug!(player = %id, %role, "role assigned");
        Ok(())
    }

    /// Changes a player's display name. The network id is unchanged.
    ///
    /// # Errors
    /// [`PlayerError::NotFound`] if nobody occupies the slot.
    pub fn rename(&mut self, id: PlayerId, name: &str) -> Result<(), PlayerError> {
        let player = self.require_mut(id)?;
        debug!(player = %id, from = %player.name, to = name, "player renamed");
        player.name = name.to_string();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Codec lookups
// ---------------------------------------------------------------------------

impl NetObjectLookup for PlayerRegistry {
    type Object = PlayerId;

    fn resolve_net_object(&self, net_id: NetId) -> Option<PlayerId> {
        self.by_net_id.get(&net_id).copied()
    }
}

impl PlayerDirectory for PlayerRegistry {
    fn net_id_by_player_id(&self, player_id: u8) -> Option<NetId> {
        self.get(PlayerId(player_id)).map(|p| p.net_id)
    }

    fn net_id_by_name(&self, name: &str) -> Option<NetId> {
        self.by_name(name).map(|p| p.net_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cog_protocol::{FieldKind, FieldValue, MessageReader, MessageWriter, ProtocolError};

    fn lobby() -> PlayerRegistry {
        PlayerRegistry::from_seats(&[
            Seat::new(0, "Red"),
            Seat::new(1, "Blue"),
            Seat::new(3, "Green"),
        ])
        .unwrap()
    }

    // =====================================================================
    // join() / insert() / remove()
    // =====================================================================

    #[test]
    fn test_join_assigns_sequential_net_ids() {
        let reg = lobby();
        let ids: Vec<_> = reg.iter().map(|p| p.net_id).collect();
        assert_eq!(ids, vec![NetId(1), NetId(2), NetId(3)]);
    }

    #[test]
    fn test_same_seats_same_net_ids() {
        let a = lobby();
        let b = lobby();
        for p in a.iter() {
            assert_eq!(b.net_id_of(p.id).unwrap(), p.net_id);
        }
    }

    #[test]
    fn test_join_duplicate_slot() {
        let mut reg = lobby();
        assert_eq!(
            reg.join(PlayerId(1), "Other").unwrap_err(),
            PlayerError::DuplicatePlayer(PlayerId(1))
        );
    }

    #[test]
    fn test_insert_duplicate_net_id() {
        let mut reg = lobby();
        let err = reg
            .insert(Player::new(PlayerId(9), NetId(2), "Dup"))
            .unwrap_err();
        assert_eq!(err, PlayerError::DuplicateNetId(NetId(2)));
    }

    #[test]
    fn test_join_skips_explicitly_inserted_net_ids() {
        let mut reg = PlayerRegistry::new();
        reg.insert(Player::new(PlayerId(5), NetId(1), "Host")).unwrap();
        let p = reg.join(PlayerId(6), "Guest").unwrap();
        assert_eq!(p.net_id, NetId(2));
    }

    #[test]
    fn test_rejoin_gets_fresh_net_id() {
        let mut reg = lobby();
        let old = reg.remove(PlayerId(1)).unwrap().net_id;
        let new = reg.join(PlayerId(1), "Blue").unwrap().net_id;
        assert_ne!(old, new);
        assert!(reg.by_net_id(old).is_none());
    }

    #[test]
    fn test_remove_unknown() {
        let mut reg = lobby();
        assert_eq!(
            reg.remove(PlayerId(7)).unwrap_err(),
            PlayerError::NotFound(PlayerId(7))
        );
    }

    // =====================================================================
    // Lookups
    // =====================================================================

    #[test]
    fn test_by_name_is_exact() {
        let reg = lobby();
        assert_eq!(reg.by_name("Green").map(|p| p.id), Some(PlayerId(3)));
        assert!(reg.by_name("green").is_none());
    }

    #[test]
    fn test_directory_resolves_both_forms() {
        let reg = lobby();
        assert_eq!(reg.net_id_by_player_id(3), Some(NetId(3)));
        assert_eq!(reg.net_id_by_name("Blue"), Some(NetId(2)));
        assert_eq!(reg.net_id_by_player_id(2), None);
    }

    #[test]
    fn test_player_field_decodes_through_registry() {
        let mut reg = lobby();
        let value = FieldKind::Player.parse(&["Green"], &reg).unwrap();

        let mut w = MessageWriter::new();
        value.encode(&mut w);
        let bytes = w.into_bytes();

        let mut r = MessageReader::new(&bytes);
        assert_eq!(r.read_net_object(&reg).unwrap(), PlayerId(3));

        reg.remove(PlayerId(3)).unwrap();
        let mut r = MessageReader::new(&bytes);
        assert_eq!(
            FieldKind::Player.decode(&mut r, &reg).unwrap_err(),
            ProtocolError::StaleObjectReference(NetId(3))
        );
        assert!(matches!(value, FieldValue::Player(NetId(3))));
    }

    // =====================================================================
    // State changes
    // =====================================================================

    #[test]
    fn test_kill_and_revive_report_changes() {
        let mut reg = lobby();
        assert!(reg.kill(PlayerId(0)).unwrap());
        assert!(!reg.kill(PlayerId(0)).unwrap());
        assert_eq!(reg.alive().count(), 2);

        assert!(reg.revive(PlayerId(0)).unwrap());
        assert!(!reg.revive(PlayerId(0)).unwrap());
        assert_eq!(reg.alive().count(), 3);
    }

    #[test]
    fn test_dead_player_still_resolves() {
        let mut reg = lobby();
        reg.kill(PlayerId(1)).unwrap();
        assert_eq!(reg.resolve_net_object(NetId(2)), Some(PlayerId(1)));
    }

    #[test]
    fn test_set_role() {
        let mut reg = lobby();
        reg.set_role(PlayerId(3), RoleId(12)).unwrap();
        assert_eq!(reg.get(PlayerId(3)).unwrap().role, Some(RoleId(12)));
        assert!(reg.set_role(PlayerId(8), RoleId(1)).is_err());
    }

    #[test]
    fn test_rename_keeps_net_id() {
        let mut reg = lobby();
        reg.rename(PlayerId(1), "Cyan").unwrap();
        assert_eq!(reg.by_name("Cyan").map(|p| p.net_id), Some(NetId(2)));
        assert!(reg.by_name("Blue").is_none());
    }
}
