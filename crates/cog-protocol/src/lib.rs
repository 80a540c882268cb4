//! Wire protocol for COG.
//!
//! This crate defines how extension RPCs look on the wire:
//!
//! - **Call-ids** ([`HostCall`], [`ExtensionCall`], [`CallId`],
//!   [`CallIdResolver`]): the two numeric namespaces and how raw input is
//!   resolved into exactly one of them.
//! - **Codec** ([`MessageWriter`], [`MessageReader`]): symmetric binary
//!   encodings for every payload field type.
//! - **Fields** ([`FieldKind`], [`FieldValue`]): the closed table of field
//!   types the manual console can write.
//! - **Frames** ([`RpcFrame`]): sender + call-id + payload, as handed to
//!   the transport.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Role code → RpcWriter → Codec (bytes) → RpcFrame → Transport
//! ```
//!
//! Nothing here knows about players, events or the transport. Entity
//! lookups go through the [`NetObjectLookup`] and [`PlayerDirectory`]
//! traits, which the player registry implements.

mod call_id;
mod codec;
mod error;
mod field;
mod frame;
mod types;

pub use call_id::{
    CallId, CallIdResolver, CallNamespace, ExtensionCall, HostCall, RawIdPolicy,
};
pub use codec::{MessageReader, MessageWriter, NetObjectLookup, PlayerDirectory};
pub use error::ProtocolError;
pub use field::{FieldKind, FieldValue};
pub use frame::RpcFrame;
pub use types::{NetId, PlayerId, RoleId, SendOption, Vector2i};
