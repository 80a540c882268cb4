//! Players for COG.
//!
//! This crate answers "who is this?" for the rest of the stack:
//!
//! 1. **Registry** ([`PlayerRegistry`]): every connected player, their
//!    network id, alive flag and custom role. It implements the codec's
//!    lookup traits, so object references decode through it.
//! 2. **Tags** ([`TagStore`]): per-round string markers on players,
//!    cleared once when a new round's intro begins.
//!
//! ```text
//! Extension (above)  ← owns one registry and one tag store
//!     ↕
//! Player layer (this crate)
//!     ↕
//! Protocol layer (below)  ← PlayerId, NetId, lookup traits
//! ```

mod error;
mod player;
mod registry;
mod tags;

pub use error::PlayerError;
pub use player::{Player, Seat};
pub use registry::PlayerRegistry;
pub use tags::TagStore;
