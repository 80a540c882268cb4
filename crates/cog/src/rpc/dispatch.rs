//! Inbound RPCs: resolve the frame's call-id, find the route, decode, act.
//!
//! | frame call-id              | route?  | outcome                         |
//! |----------------------------|---------|---------------------------------|
//! | known host value           | yes     | [`Delivery::Handled`]           |
//! | known host value           | no      | [`Delivery::Unhandled`] (host)  |
//! | unknown host value         | -       | `UnknownHostCall` error         |
//! | known extension value      | yes     | [`Delivery::Handled`]           |
//! | known extension value      | no      | [`Delivery::Ignored`]           |
//! | unknown extension value    | -       | [`Delivery::Ignored`]           |
//! | raw value                  | yes/no  | `Handled` / `Ignored`           |
//!
//! A route must consume the whole payload; leftover bytes fail with
//! `TrailingBytes`.

use std::collections::HashMap;
use std::rc::Rc;

use cog_player::PlayerRegistry;
use cog_protocol::{CallId, MessageReader, NetId, ProtocolError, RpcFrame};
use tracing::{debug, trace, warn};

use crate::CogError;
use crate::rpc::RpcCall;

type Route<C> = Rc<dyn Fn(&mut C, NetId, &mut MessageReader<'_>) -> Result<(), CogError>>;

/// What happened to a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A route decoded and consumed the frame.
    Handled,
    /// A host call with no extension route; the host game processes it.
    Unhandled,
    /// Nothing here knows the call. Dropped.
    Ignored,
}

/// A context that owns a dispatch table and the players references
/// resolve against.
pub trait RpcHost: Sized {
    fn rpc_routes(&self) -> &RpcDispatchTable<Self>;
    fn player_registry(&self) -> &PlayerRegistry;
}

/// Call-id → receive routine, for a context type `C`.
pub struct RpcDispatchTable<C> {
    routes: HashMap<CallId, Route<C>>,
}

impl<C> Default for RpcDispatchTable<C> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }
}

impl<C> std::fmt::Debug for RpcDispatchTable<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut calls: Vec<_> = self.routes.keys().map(ToString::to_string).collect();
        calls.sort();
        f.debug_struct("RpcDispatchTable").field("routes", &calls).finish()
    }
}

impl<C: 'static> RpcDispatchTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `call` to a routine that reads the payload itself.
    ///
    /// Replaces any earlier route for the same call; returns `true` if one
    /// was replaced.
    pub fn route<F>(&mut self, call: CallId, routine: F) -> bool
    where
        F: Fn(&mut C, NetId, &mut MessageReader<'_>) -> Result<(), CogError> + 'static,
    {
        trace!(%call, "route registered");
        self.routes.insert(call, Rc::new(routine)).is_some()
    }
}

impl<C: RpcHost + 'static> RpcDispatchTable<C> {
    /// Routes `R::CALL` to `handler`, decoding with `R`'s layout first.
    ///
    /// The payload is decoded and checked for leftover bytes before the
    /// handler runs, so a malformed frame never reaches it.
    pub fn on<R, F>(&mut self, handler: F) -> bool
    where
        R: RpcCall + 'static,
        F: Fn(&mut C, NetId, R::Args) -> Result<(), CogError> + 'static,
    {
        self.route(R::CALL, move |ctx: &mut C, sender, reader: &mut MessageReader<'_>| {
            let args = R::decode(reader, ctx.player_registry())?;
            ensure_consumed(R::CALL, reader)?;
            handler(ctx, sender, args)
        })
    }
}

impl<C> RpcDispatchTable<C> {
    pub fn unroute(&mut self, call: CallId) -> bool {
        self.routes.remove(&call).is_some()
    }

    pub fn has_route(&self, call: CallId) -> bool {
        self.routes.contains_key(&call)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn get(&self, call: CallId) -> Option<Route<C>> {
        self.routes.get(&call).cloned()
    }
}

fn ensure_consumed(call: CallId, reader: &MessageReader<'_>) -> Result<(), ProtocolError> {
    if reader.is_exhausted() {
        Ok(())
    } else {
        Err(ProtocolError::TrailingBytes {
            namespace: call.namespace(),
            call: call.value(),
            remaining: reader.remaining(),
        })
    }
}

/// Routes one received frame. Returns the resolved call-id with the
/// outcome; the call-id is `None` only for dropped unknown extension ids.
///
/// # Errors
/// Unknown host call-ids, decode failures, trailing bytes, and whatever
/// the route itself returns.
pub fn on_receive<C: RpcHost>(
    ctx: &mut C,
    frame: &RpcFrame,
) -> Result<(Option<CallId>, Delivery), CogError> {
    let call = match frame.call_id() {
        Ok(Some(call)) => call,
        Ok(None) => {
            debug!(
                sender = %frame.sender,
                value = frame.call,
                "unknown extension call dropped"
            );
            return Ok((None, Delivery::Ignored));
        }
        Err(err) => {
            warn!(sender = %frame.sender, error = %err, "protocol anomaly");
            return Err(err.into());
        }
    };

    let Some(route) = ctx.rpc_routes().get(call) else {
        let delivery = match call {
            CallId::Host(_) => Delivery::Unhandled,
            CallId::Extension(_) | CallId::Raw(_) => Delivery::Ignored,
        };
        trace!(sender = %frame.sender, %call, ?delivery, "no route");
        return Ok((Some(call), delivery));
    };

    let mut reader = frame.reader();
    route(ctx, frame.sender, &mut reader)?;
    ensure_consumed(call, &reader)?;
    debug!(sender = %frame.sender, %call, len = frame.payload.len(), "rpc handled");
    Ok((Some(call), Delivery::Handled))
}
