//! Error types for the protocol layer.
//!
//! Everything that can go wrong while resolving a call-id, parsing a
//! manually typed field, or decoding bytes off the wire lands here. None of
//! these are fatal: the caller (the manual console or a receive routine)
//! reports them and carries on.

use crate::{CallNamespace, FieldKind, NetId};

/// Errors that can occur in the protocol layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// A field type tag that isn't in the closed field table.
    #[error("unsupported field type `{0}`")]
    UnsupportedFieldType(String),

    /// The value text could not be parsed as the requested field type.
    #[error("cannot parse `{input}` as {kind}")]
    FieldParseFailure { kind: FieldKind, input: String },

    /// Neither namespace (nor the raw-id fallback, when allowed) accepts
    /// this input.
    #[error("unresolved call-id `{0}`")]
    UnresolvedCallId(String),

    /// A player reference typed by a user matched no connected player.
    #[error("no connected player matches `{0}`")]
    PlayerResolutionFailure(String),

    /// A decoded object reference points at an entity that no longer exists.
    #[error("stale object reference {0}")]
    StaleObjectReference(NetId),

    /// A 2D vector could not be built from its input or its bytes.
    #[error("malformed vector: {0}")]
    MalformedVector(String),

    /// The payload ended before the field being read was complete.
    #[error("truncated payload: needed {needed} byte(s), {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A packed integer ran past its maximum encoded length.
    #[error("packed integer exceeds 32 bits")]
    VarintOverflow,

    /// A bool byte other than 0 or 1.
    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),

    /// Text bytes that are not valid UTF-8.
    #[error("text field is not valid UTF-8")]
    InvalidText,

    /// A frame claims a host call-id the host enumeration doesn't define.
    #[error("unknown host call-id {0}")]
    UnknownHostCall(u8),

    /// A frame namespace byte outside the known namespaces.
    #[error("unknown call namespace byte {0}")]
    UnknownNamespace(u8),

    /// Bytes left over after every declared field was read.
    #[error("{remaining} trailing byte(s) after {namespace} call {call}")]
    TrailingBytes {
        namespace: CallNamespace,
        call: u8,
        remaining: usize,
    },
}
