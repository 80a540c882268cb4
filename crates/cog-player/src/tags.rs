//! Round-scoped string tags on players.
//!
//! Roles use tags for state other peers must agree on ("this player was
//! hunted", "this player has a shield"). The store itself is local and
//! does no network I/O; the extension replicates changes with the `Mark`
//! and `RemoveMark` calls. Everything is dropped when the next round's
//! intro begins.

use std::collections::{BTreeMap, BTreeSet};

use cog_protocol::PlayerId;
use tracing::{debug, trace};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagStore {
    tags: BTreeMap<PlayerId, BTreeSet<String>>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags `player`. Returns `false` if the tag was already there.
    pub fn mark(&mut self, player: PlayerId, tag: &str) -> bool {
        let added = self.tags.entry(player).or_default().insert(tag.to_string());
        if added {
            trace!(%player, tag, "marked");
        }
        added
    }

    pub fn has_mark(&self, player: PlayerId, tag: &str) -> bool {
        self.tags.get(&player).is_some_and(|set| set.contains(tag))
    }

    /// Removes a tag. Returns `false` if the player didn't carry it.
    pub fn remove_mark(&mut self, player: PlayerId, tag: &str) -> bool {
        let Some(set) = self.tags.get_mut(&player) else {
            return false;
        };
        let removed = set.remove(tag);
        if set.is_empty() {
            self.tags.remove(&player);
        }
        if removed {
            trace!(%player, tag, "unmarked");
        }
        removed
    }

    /// Every player carrying `tag`, in player-id order.
    pub fn tagged_with(&self, tag: &str) -> Vec<PlayerId> {
        self.tags
            .iter()
            .filter(|(_, set)| set.contains(tag))
            .map(|(player, _)| *player)
            .collect()
    }

    /// Tags on one player, sorted.
    pub fn tags_of(&self, player: PlayerId) -> Vec<&str> {
        self.tags
            .get(&player)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Drops every tag. Called once per round.
    pub fn clear_round(&mut self) {
        let players = self.tags.len();
        self.tags.clear();
        debug!(players, "round tags cleared");
    }

    /// Number of (player, tag) pairs.
    pub fn len(&self) -> usize {
        self.tags.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
