//! Field layouts of the known calls.
//!
//! The codec itself is schema-less. Each [`RpcCall`] pins one call-id to
//! the fields it carries, so the sender's `encode` and every receiver's
//! `decode` read the same fields in the same order.
//!
//! | call             | fields                               |
//! |------------------|--------------------------------------|
//! | `SetCustomRole`  | `u8` player id, packed `i32` role    |
//! | `Mark`           | player reference, text               |
//! | `RemoveMark`     | player reference, text               |
//! | `Revive`         | player reference                     |
//! | `ClearSabotages` | (none)                               |
//! | `CleanDeadBody`  | player reference                     |
//! | host `SetName`   | text, `bool` don't-censor            |

use cog_player::PlayerRegistry;
use cog_protocol::{
    CallId, ExtensionCall, HostCall, MessageReader, PlayerId, ProtocolError, RoleId,
};

use crate::CogError;
use crate::rpc::RpcWriter;

/// A call-id together with its payload layout.
pub trait RpcCall {
    const CALL: CallId;

    /// Decoded payload.
    type Args;

    /// Appends the payload fields.
    ///
    /// # Errors
    /// [`CogError::Player`] if a referenced player is not registered.
    fn encode(
        args: &Self::Args,
        writer: &mut RpcWriter,
        players: &PlayerRegistry,
    ) -> Result<(), CogError>;

    /// Reads the payload fields back. Object references resolve through
    /// `players`.
    fn decode(
        reader: &mut MessageReader<'_>,
        players: &PlayerRegistry,
    ) -> Result<Self::Args, ProtocolError>;
}

// ---------------------------------------------------------------------------
// Argument records
// ---------------------------------------------------------------------------

/// Payload of `Mark` and `RemoveMark`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagArgs {
    pub player: PlayerId,
    pub tag: String,
}

/// Payload of `SetCustomRole`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAssignment {
    pub player: PlayerId,
    pub role: RoleId,
}

/// Payload of the host's `SetName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameArgs {
    pub name: String,
    pub dont_censor: bool,
}

// ---------------------------------------------------------------------------
// Extension calls
// ---------------------------------------------------------------------------

pub struct SetCustomRole;

impl RpcCall for SetCustomRole {
    const CALL: CallId = CallId::Extension(ExtensionCall::SetCustomRole);
    type Args = RoleAssignment;

    // The player travels as a slot number here, not as a reference.
    fn encode(
        args: &RoleAssignment,
        writer: &mut RpcWriter,
        _players: &PlayerRegistry,
    ) -> Result<(), CogError> {
        writer.write_u8(args.player.0).write_packed_i32(args.role.0);
        Ok(())
    }

    fn decode(
        reader: &mut MessageReader<'_>,
        _players: &PlayerRegistry,
    ) -> Result<RoleAssignment, ProtocolError> {
        Ok(RoleAssignment {
            player: PlayerId(reader.read_u8()?),
            role: RoleId(reader.read_packed_i32()?),
        })
    }
}

pub struct Mark;

impl RpcCall for Mark {
    const CALL: CallId = CallId::Extension(ExtensionCall::Mark);
    type Args = TagArgs;

    fn encode(
        args: &TagArgs,
        writer: &mut RpcWriter,
        players: &PlayerRegistry,
    ) -> Result<(), CogError> {
        writer.write_player(players, args.player)?.write_str(&args.tag);
        Ok(())
    }

    fn decode(
        reader: &mut MessageReader<'_>,
        players: &PlayerRegistry,
    ) -> Result<TagArgs, ProtocolError> {
        decode_tag_args(reader, players)
    }
}

pub struct RemoveMark;

impl RpcCall for RemoveMark {
    const CALL: CallId = CallId::Extension(ExtensionCall::RemoveMark);
    type Args = TagArgs;

    fn encode(
        args: &TagArgs,
        writer: &mut RpcWriter,
        players: &PlayerRegistry,
    ) -> Result<(), CogError> {
        writer.write_player(players, args.player)?.write_str(&args.tag);
        Ok(())
    }

    fn decode(
        reader: &mut MessageReader<'_>,
        players: &PlayerRegistry,
    ) -> Result<TagArgs, ProtocolError> {
        decode_tag_args(reader, players)
    }
}

pub struct Revive;

impl RpcCall for Revive {
    const CALL: CallId = CallId::Extension(ExtensionCall::Revive);
    type Args = PlayerId;

    fn encode(
        player: &PlayerId,
        writer: &mut RpcWriter,
        players: &PlayerRegistry,
    ) -> Result<(), CogError> {
        writer.write_player(players, *player)?;
        Ok(())
    }

    fn decode(
        reader: &mut MessageReader<'_>,
        players: &PlayerRegistry,
    ) -> Result<PlayerId, ProtocolError> {
        reader.read_net_object(players)
    }
}

pub struct ClearSabotages;

impl RpcCall for ClearSabotages {
    const CALL: CallId = CallId::Extension(ExtensionCall::ClearSabotages);
    type Args = ();

    fn encode(_: &(), _: &mut RpcWriter, _: &PlayerRegistry) -> Result<(), CogError> {
        Ok(())
    }

    fn decode(_: &mut MessageReader<'_>, _: &PlayerRegistry) -> Result<(), ProtocolError> {
        Ok(())
    }
}

pub struct CleanDeadBody;

impl RpcCall for CleanDeadBody {
    const CALL: CallId = CallId::Extension(ExtensionCall::CleanDeadBody);
    type Args = PlayerId;

    fn encode(
        player: &PlayerId,
        writer: &mut RpcWriter,
        players: &PlayerRegistry,
    ) -> Result<(), CogError> {
        writer.write_player(players, *player)?;
        Ok(())
    }

    fn decode(
        reader: &mut MessageReader<'_>,
        players: &PlayerRegistry,
    ) -> Result<PlayerId, ProtocolError> {
        reader.read_net_object(players)
    }
}

// ---------------------------------------------------------------------------
// Host calls
// ---------------------------------------------------------------------------

pub struct SetName;

impl RpcCall for SetName {
    const CALL: CallId = CallId::Host(HostCall::SetName);
    type Args = NameArgs;

    fn encode(
        args: &NameArgs,
        writer: &mut RpcWriter,
        _players: &PlayerRegistry,
    ) -> Result<(), CogError> {
        writer.write_str(&args.name).write_bool(args.dont_censor);
        Ok(())
    }

    fn decode(
        reader: &mut MessageReader<'_>,
        _players: &PlayerRegistry,
    ) -> Result<NameArgs, ProtocolError> {
        Ok(NameArgs {
            name: reader.read_string()?,
            dont_censor: reader.read_bool()?,
        })
    }
}

fn decode_tag_args(
    reader: &mut MessageReader<'_>,
    players: &PlayerRegistry,
) -> Result<TagArgs, ProtocolError> {
    Ok(TagArgs {
        player: reader.read_net_object(players)?,
        tag: reader.read_string()?,
    })
}
