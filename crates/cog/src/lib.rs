//! # COG
//!
//! Event interception and custom RPCs for extending a networked game
//! client with roles the base game knows nothing about.
//!
//! An [`Extension`] owns the players, the per-round tags, an event bus for
//! the game's lifecycle moments and an RPC outbox/dispatch table that
//! shares the host's transport. Role code hooks events through a
//! [`Listener`](cog_event::Listener) and replicates its effects with the
//! `rpc_*` helpers.
//!
//! ## Quick Start
//!
//! ```rust
//! use cog::prelude::*;
//!
//! let (tx, mut rx) = ChannelTransport::pair();
//! let mut local = Extension::new(CogConfig::default(), PlayerId(0), tx).unwrap();
//!
//! let (peer_tx, _peer_rx) = ChannelTransport::pair();
//! let mut peer = Extension::new(CogConfig::default(), PlayerId(1), peer_tx).unwrap();
//!
//! local.rpc_mark(PlayerId(2), "hunted").unwrap();
//! for frame in rx.drain().unwrap() {
//!     peer.receive(&frame).unwrap();
//! }
//! assert!(peer.tags().has_mark(PlayerId(2), "hunted"));
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod extension;
pub mod rpc;

pub use config::CogConfig;
pub use console::RpcConsole;
pub use error::CogError;
pub use extension::{Extension, GamePhase, VENT_USABLE_DISTANCE, VentAccess};

pub mod prelude {
    pub use crate::rpc::{Delivery, RpcCall, RpcOutbox, RpcWriter};
    pub use crate::{CogConfig, CogError, Extension, GamePhase, VentAccess};
    pub use cog_event::{
        CastVoteEvent, EventBus, HandlerError, HandlerResult, Intercepted, IntroBeginEvent,
        Listener, PlayerExileEvent, PlayerMurderEvent, ReportDeadBodyEvent, RpcReceivedEvent,
        VentCheckEvent,
    };
    pub use cog_player::{PlayerRegistry, Seat, TagStore};
    pub use cog_protocol::{CallId, ExtensionCall, HostCall, NetId, PlayerId, RoleId, RpcFrame};
    pub use cog_tick::{ContinuationId, RunReport, TickConfig, TickScheduler};
    pub use cog_transport::{ChannelTransport, FrameReceiver, Transport};
}
