//! Event dispatch for COG.
//!
//! The host game has fixed lifecycle moments (a kill, a vent check, a body
//! report, a vote, the start of a round, an exile). This crate lets
//! extension code hook those moments with ordered handlers:
//!
//! - **Pre-phase** handlers run before the game's default action, receive
//!   the event mutably, and may cancel it by returning `false`.
//! - **Post-phase** handlers run after the default action and only observe.
//!
//! Handlers are registered explicitly on an [`EventBus`], usually through a
//! [`Listener`]. Dispatch is synchronous and re-entrant: a handler receives
//! the whole context mutably and may raise further events.

mod bus;
mod error;
mod event;
mod events;

pub use bus::{
    EventBus, EventHost, HandlerId, Intercepted, Listener, PostChain, PostReport,
    PreChain, PreOutcome, dispatch_post, dispatch_pre, intercept,
};
pub use error::{HandlerError, HandlerResult};
pub use event::{Event, FailurePolicy, Phase};
pub use events::{
    CastVoteEvent, IntroBeginEvent, PlayerExileEvent, PlayerMurderEvent,
    ReportDeadBodyEvent, RpcReceivedEvent, VentCheckEvent,
};
