//! The lifecycle events the extension intercepts.

use cog_protocol::{CallId, NetId, PlayerId};

use crate::{Event, FailurePolicy};

/// A player is about to kill another.
///
/// Fail-closed: a broken pre-phase handler cancels the kill rather than
/// letting it through.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMurderEvent {
    pub killer: PlayerId,
    pub target: PlayerId,
    /// Whether the kill leaves a body. Pre handlers may clear it.
    pub leaves_body: bool,
}

impl Event for PlayerMurderEvent {
    const NAME: &'static str = "PlayerMurder";
    const PRE_FAILURE: FailurePolicy = FailurePolicy::FailClosed;
}

/// The game asks whether a player may use a vent.
#[derive(Debug, Clone, PartialEq)]
pub struct VentCheckEvent {
    pub player: PlayerId,
    pub vent_id: i32,
    /// Whether the player may enter the vent right now.
    pub can_use: bool,
    /// Whether the player could ever use vents (drives the button state).
    pub could_use: bool,
    pub distance: f32,
}

impl Event for VentCheckEvent {
    const NAME: &'static str = "VentCheck";
}

/// A player reports a body or calls an emergency meeting (`body: None`).
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDeadBodyEvent {
    pub reporter: PlayerId,
    pub body: Option<PlayerId>,
}

impl Event for ReportDeadBodyEvent {
    const NAME: &'static str = "ReportDeadBody";
}

/// A player votes during a meeting. `suspect: None` is a skip.
#[derive(Debug, Clone, PartialEq)]
pub struct CastVoteEvent {
    pub voter: PlayerId,
    pub suspect: Option<PlayerId>,
}

impl Event for CastVoteEvent {
    const NAME: &'static str = "CastVote";
}

/// The intro cutscene of a new round begins.
#[derive(Debug, Clone, PartialEq)]
pub struct IntroBeginEvent {
    /// Round number, starting at 1.
    pub round: u32,
}

impl Event for IntroBeginEvent {
    const NAME: &'static str = "IntroBegin";
}

/// A meeting ended with an exile (`exiled: None` for a tie or skip).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerExileEvent {
    pub exiled: Option<PlayerId>,
}

impl Event for PlayerExileEvent {
    const NAME: &'static str = "PlayerExile";
}

/// An RPC frame was routed. Raised in the post phase only.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcReceivedEvent {
    pub sender: NetId,
    pub call: CallId,
    pub payload_len: usize,
}

impl Event for RpcReceivedEvent {
    const NAME: &'static str = "RpcReceived";
}
