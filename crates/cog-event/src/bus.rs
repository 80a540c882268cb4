//! The event bus: handler registry plus the dispatch routines.
//!
//! # How dispatch works
//!
//! Handlers are kept in one list per (event type, phase), sorted by
//! `(priority, registration sequence)`. Lower priorities run first; equal
//! priorities run in the order they were registered.
//!
//! The bus normally lives *inside* the context the handlers receive, so a
//! handler gets `&mut C` while the bus is part of `C`. Dispatch therefore
//! never holds a borrow of the bus while handlers run: it first clones the
//! handler list (cheap, the callbacks are `Rc`) into a chain, then runs the
//! chain against the context. A handler may register or unregister other
//! handlers; the change takes effect on the next dispatch.
//!
//! ```text
//! intercept(ctx, event, default)
//!   │
//!   ├─ pre chain ──► any handler returns false? ──► Cancelled (stop here)
//!   │
//!   ├─ default(ctx, &mut event)
//!   │
//!   └─ post chain (every handler runs, failures isolated)
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, error, trace, warn};

use crate::{Event, FailurePolicy, HandlerError, HandlerResult, Phase};

type PreFn<C> = dyn Fn(&mut C, &mut dyn Any) -> HandlerResult<bool>;
type PostFn<C> = dyn Fn(&mut C, &dyn Any) -> HandlerResult<()>;

// ---------------------------------------------------------------------------
// Registration records
// ---------------------------------------------------------------------------

/// Identifies one registered handler, for [`EventBus::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

enum Callback<C> {
    Pre(Rc<PreFn<C>>),
    Post(Rc<PostFn<C>>),
}

impl<C> Clone for Callback<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Pre(f) => Self::Pre(Rc::clone(f)),
            Self::Post(f) => Self::Post(Rc::clone(f)),
        }
    }
}

struct Registration<C> {
    id: HandlerId,
    owner: Rc<str>,
    priority: i32,
    callback: Callback<C>,
}

/// A handler taken out of the bus for one dispatch.
struct Link<C> {
    owner: Rc<str>,
    callback: Callback<C>,
}

/// Something that contributes a group of handlers under one owner name.
///
/// Listeners register explicitly; the bus never discovers handlers on its
/// own. Unloading a listener is [`EventBus::unregister_owner`] with its name.
pub trait Listener<C> {
    /// Owner name attached to every handler this listener registers.
    fn name(&self) -> &'static str;

    /// Registers this listener's handlers on `bus`.
    fn register(self: Rc<Self>, bus: &mut EventBus<C>);
}

/// A context that owns its own event bus.
pub trait EventHost: Sized {
    fn event_bus(&self) -> &EventBus<Self>;
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Registry of pre- and post-phase handlers for a context type `C`.
pub struct EventBus<C> {
    handlers: HashMap<(TypeId, Phase), Vec<Registration<C>>>,
    next_seq: u64,
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<C> std::fmt::Debug for EventBus<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.len())
            .finish()
    }
}

impl<C: 'static> EventBus<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `listener` register its handlers.
    pub fn register<L: Listener<C> + 'static>(&mut self, listener: Rc<L>) {
        let name = listener.name();
        let before = self.len();
        listener.register(self);
        debug!(listener = name, handlers = self.len() - before, "listener registered");
    }

    /// Adds a pre-phase handler for `E`.
    ///
    /// Returning `Ok(false)` cancels the event: later handlers, the default
    /// action and the post phase are all skipped.
    pub fn on_pre<E, F>(
        &mut self,
        owner: &str,
        priority: i32,
        handler: F,
    ) -> HandlerId
    where
        E: Event,
        F: Fn(&mut C, &mut E) -> HandlerResult<bool> + 'static,
    {
        let callback: Rc<PreFn<C>> = Rc::new(move |ctx: &mut C, event: &mut dyn Any| {
            match event.downcast_mut::<E>() {
                Some(event) => handler(ctx, event),
                None => Ok(true),
            }
        });
        self.insert::<E>(Phase::Pre, owner, priority, Callback::Pre(callback))
    }

    /// Adds a post-phase handler for `E`.
    pub fn on_post<E, F>(
        &mut self,
        owner: &str,
        priority: i32,
        handler: F,
    ) -> HandlerId
    where
        E: Event,
        F: Fn(&mut C, &E) -> HandlerResult<()> + 'static,
    {
        let callback: Rc<PostFn<C>> = Rc::new(move |ctx: &mut C, event: &dyn Any| {
            match event.downcast_ref::<E>() {
                Some(event) => handler(ctx, event),
                None => Ok(()),
            }
        });
        self.insert::<E>(Phase::Post, owner, priority, Callback::Post(callback))
    }

    fn insert<E: Event>(
        &mut self,
        phase: Phase,
        owner: &str,
        priority: i32,
        callback: Callback<C>,
    ) -> HandlerId {
        let id = HandlerId(self.next_seq);
        self.next_seq += 1;

        let list = self.handlers.entry((TypeId::of::<E>(), phase)).or_default();
        // Insert after every entry with priority <= ours so ties keep
        // registration order.
        let at = list.partition_point(|r| r.priority <= priority);
        list.insert(
            at,
            Registration {
                id,
                owner: Rc::from(owner),
                priority,
                callback,
            },
        );
        trace!(event = E::NAME, %phase, owner, priority, "handler registered");
        id
    }
}

impl<C> EventBus<C> {
    /// Removes one handler. Returns `false` if it was already gone.
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        for list in self.handlers.values_mut() {
            if let Some(pos) = list.iter().position(|r| r.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Removes every handler registered under `owner`. Returns how many.
    pub fn unregister_owner(&mut self, owner: &str) -> usize {
        let mut removed = 0;
        for list in self.handlers.values_mut() {
            let before = list.len();
            list.retain(|r| &*r.owner != owner);
            removed += before - list.len();
        }
        self.handlers.retain(|_, list| !list.is_empty());
        if removed > 0 {
            debug!(owner, removed, "handlers unregistered");
        }
        removed
    }

    /// Number of handlers registered for `E` in `phase`.
    pub fn handler_count<E: Event>(&self, phase: Phase) -> usize {
        self.handlers
            .get(&(TypeId::of::<E>(), phase))
            .map_or(0, Vec::len)
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the pre-phase handlers for `E`, in run order.
    pub fn pre_chain<E: Event>(&self) -> PreChain<C> {
        PreChain {
            links: self.links::<E>(Phase::Pre),
        }
    }

    /// Snapshot of the post-phase handlers for `E`, in run order.
    pub fn post_chain<E: Event>(&self) -> PostChain<C> {
        PostChain {
            links: self.links::<E>(Phase::Post),
        }
    }

    fn links<E: Event>(&self, phase: Phase) -> Vec<Link<C>> {
        self.handlers
            .get(&(TypeId::of::<E>(), phase))
            .map(|list| {
                list.iter()
                    .map(|r| Link {
                        owner: Rc::clone(&r.owner),
                        callback: r.callback.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Chains
// ---------------------------------------------------------------------------

/// Result of running the pre phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreOutcome {
    /// Every handler agreed; the default action may run.
    Proceed,
    /// A handler vetoed (or failed under a fail-closed policy).
    Cancelled {
        /// Owner name of the handler that stopped the event.
        by: String,
    },
}

impl PreOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result of running the post phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostReport {
    /// Handlers invoked.
    pub ran: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// Result of [`intercept`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intercepted<R> {
    /// The default action ran and returned `R`; the post phase ran after it.
    Completed(R),
    /// The pre phase cancelled. Neither the default action nor the post
    /// phase ran.
    Cancelled,
}

impl<R> Intercepted<R> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn completed(self) -> Option<R> {
        match self {
            Self::Completed(r) => Some(r),
            Self::Cancelled => None,
        }
    }
}

/// Pre-phase handlers detached from the bus.
pub struct PreChain<C> {
    links: Vec<Link<C>>,
}

impl<C> PreChain<C> {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Runs the handlers in order until one returns `false`.
    pub fn run<E: Event>(self, ctx: &mut C, event: &mut E) -> PreOutcome {
        for link in self.links {
            let Callback::Pre(f) = &link.callback else {
                continue;
            };
            let result = guarded(|| f(ctx, event as &mut dyn Any));
            match result {
                Ok(true) => {}
                Ok(false) => {
                    debug!(event = E::NAME, owner = %link.owner, "event cancelled");
                    return PreOutcome::Cancelled {
                        by: link.owner.to_string(),
                    };
                }
                Err(err) => match E::PRE_FAILURE {
                    FailurePolicy::FailOpen => {
                        warn!(
                            event = E::NAME,
                            owner = %link.owner,
                            error = %err,
                            "pre handler failed, continuing"
                        );
                    }
                    FailurePolicy::FailClosed => {
                        error!(
                            event = E::NAME,
                            owner = %link.owner,
                            error = %err,
                            "pre handler failed, cancelling"
                        );
                        return PreOutcome::Cancelled {
                            by: link.owner.to_string(),
                        };
                    }
                },
            }
        }
        PreOutcome::Proceed
    }
}

/// Post-phase handlers detached from the bus.
pub struct PostChain<C> {
    links: Vec<Link<C>>,
}

impl<C> PostChain<C> {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Runs every handler. A failing handler is logged and skipped.
    pub fn run<E: Event>(self, ctx: &mut C, event: &E) -> PostReport {
        let mut report = PostReport::default();
        for link in self.links {
            let Callback::Post(f) = &link.callback else {
                continue;
            };
            report.ran += 1;
            if let Err(err) = guarded(|| f(ctx, event as &dyn Any)) {
                report.failed += 1;
                error!(
                    event = E::NAME,
                    owner = %link.owner,
                    error = %err,
                    "post handler failed"
                );
            }
        }
        report
    }
}

/// Runs a handler, turning a panic into [`HandlerError::Panicked`].
fn guarded<T>(f: impl FnOnce() -> HandlerResult<T>) -> HandlerResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::Panicked(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Dispatch on a hosting context
// ---------------------------------------------------------------------------

/// Runs the pre phase of `event` against the bus `ctx` owns.
pub fn dispatch_pre<C: EventHost, E: Event>(ctx: &mut C, event: &mut E) -> PreOutcome {
    let chain = ctx.event_bus().pre_chain::<E>();
    trace!(event = E::NAME, handlers = chain.len(), "dispatch pre");
    chain.run(ctx, event)
}

/// Runs the post phase of `event` against the bus `ctx` owns.
pub fn dispatch_post<C: EventHost, E: Event>(ctx: &mut C, event: &E) -> PostReport {
    let chain = ctx.event_bus().post_chain::<E>();
    trace!(event = E::NAME, handlers = chain.len(), "dispatch post");
    chain.run(ctx, event)
}

/// Pre phase, then the default action, then the post phase.
///
/// The post phase sees the event as the default action left it.
pub fn intercept<C, E, R>(
    ctx: &mut C,
    mut event: E,
    default_action: impl FnOnce(&mut C, &mut E) -> R,
) -> Intercepted<R>
where
    C: EventHost,
    E: Event,
{
    if dispatch_pre(ctx, &mut event).is_cancelled() {
        return Intercepted::Cancelled;
    }
    let result = default_action(ctx, &mut event);
    dispatch_post(ctx, &event);
    Intercepted::Completed(result)
}
