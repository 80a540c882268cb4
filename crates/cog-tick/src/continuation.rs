//! Cooperative continuations: actions that resume on a later tick.
//!
//! A continuation is scheduled with a delay in ticks and resumes when the
//! owning context advances its queue past the due tick. It may carry a
//! guard, checked at resumption: a false guard aborts the continuation
//! instead of running it. Continuations resume in (due tick, scheduling
//! order) order.
//!
//! The queue lives inside the context it acts on, so each continuation is
//! removed from the queue before it runs. A running continuation may
//! schedule further ones; they are always due on a later tick.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, trace};

type Action<C> = Box<dyn FnOnce(&mut C)>;
type Guard<C> = Box<dyn Fn(&C) -> bool>;

/// Handle for [`ContinuationQueue::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContinuationId(u64);

impl fmt::Display for ContinuationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cont-{}", self.0)
    }
}

struct Pending<C> {
    label: String,
    guard: Option<Guard<C>>,
    action: Action<C>,
}

/// Delayed actions for a context type `C`, keyed by due tick.
pub struct ContinuationQueue<C> {
    current_tick: u64,
    next_seq: u64,
    // (due tick, sequence) -> continuation
    pending: BTreeMap<(u64, u64), Pending<C>>,
}

impl<C> Default for ContinuationQueue<C> {
    fn default() -> Self {
        Self {
            current_tick: 0,
            next_seq: 0,
            pending: BTreeMap::new(),
        }
    }
}

impl<C> fmt::Debug for ContinuationQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationQueue")
            .field("current_tick", &self.current_tick)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<C> ContinuationQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last tick this queue was advanced to.
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedules `action` to run `delay_ticks` from now. A delay of 0 is
    /// treated as 1: nothing runs on the tick it was scheduled in.
    pub fn schedule(
        &mut self,
        delay_ticks: u64,
        label: impl Into<String>,
        action: impl FnOnce(&mut C) + 'static,
    ) -> ContinuationId {
        self.push(delay_ticks, label.into(), None, Box::new(action))
    }

    /// Like [`schedule`](Self::schedule), but `guard` is checked when the
    /// continuation comes due and a `false` aborts it.
    pub fn schedule_guarded(
        &mut self,
        delay_ticks: u64,
        label: impl Into<String>,
        guard: impl Fn(&C) -> bool + 'static,
        action: impl FnOnce(&mut C) + 'static,
    ) -> ContinuationId {
        self.push(
            delay_ticks,
            label.into(),
            Some(Box::new(guard)),
            Box::new(action),
        )
    }

    fn push(
        &mut self,
        delay_ticks: u64,
        label: String,
        guard: Option<Guard<C>>,
        action: Action<C>,
    ) -> ContinuationId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let due = self.current_tick.saturating_add(delay_ticks.max(1));
        trace!(id = seq, due, label = %label, "continuation scheduled");
        self.pending.insert((due, seq), Pending { label, guard, action });
        ContinuationId(seq)
    }

    /// Drops a continuation before it runs. Returns `false` if it already
    /// ran, was aborted, or was cancelled.
    pub fn cancel(&mut self, id: ContinuationId) -> bool {
        let key = self.pending.keys().find(|(_, seq)| *seq == id.0).copied();
        match key.and_then(|k| self.pending.remove(&k)) {
            Some(p) => {
                debug!(%id, label = %p.label, "continuation cancelled");
                true
            }
            None => false,
        }
    }

    /// Tick at which `id` will resume, if it is still pending.
    pub fn due_tick(&self, id: ContinuationId) -> Option<u64> {
        self.pending
            .keys()
            .find(|(_, seq)| *seq == id.0)
            .map(|(due, _)| *due)
    }

    /// Labels of pending continuations, in resume order.
    pub fn labels(&self) -> Vec<&str> {
        self.pending.values().map(|p| p.label.as_str()).collect()
    }

    fn pop_due(&mut self, tick: u64) -> Option<((u64, u64), Pending<C>)> {
        let (&key, _) = self.pending.first_key_value()?;
        if key.0 > tick {
            return None;
        }
        self.pending.remove(&key).map(|p| (key, p))
    }
}

/// A context that owns its own continuation queue.
pub trait ContinuationHost: Sized {
    fn continuations(&mut self) -> &mut ContinuationQueue<Self>;
}

/// What a run of the queue did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub resumed: usize,
    /// Continuations whose guard returned `false`.
    pub aborted: usize,
}

impl std::ops::AddAssign for RunReport {
    fn add_assign(&mut self, rhs: Self) {
        self.resumed += rhs.resumed;
        self.aborted += rhs.aborted;
    }
}

/// Moves the queue to `tick` and resumes every continuation due by then.
///
/// The clock never moves backwards; a `tick` earlier than the current one
/// only runs what is already due.
pub fn run_due<C: ContinuationHost>(ctx: &mut C, tick: u64) -> RunReport {
    let queue = ctx.continuations();
    if tick > queue.current_tick {
        queue.current_tick = tick;
    }
    let tick = queue.current_tick;

    let mut report = RunReport::default();
    while let Some(((due, seq), pending)) = ctx.continuations().pop_due(tick) {
        let Pending { label, guard, action } = pending;
        if let Some(guard) = guard {
            if !guard(ctx) {
                debug!(id = seq, due, label = %label, "continuation aborted by guard");
                report.aborted += 1;
                continue;
            }
        }
        trace!(id = seq, due, label = %label, "continuation resumed");
        action(ctx);
        report.resumed += 1;
    }
    report
}

/// Advances the queue `ticks` ticks, one at a time, so continuations
/// scheduled along the way resume on the tick they are due.
pub fn advance<C: ContinuationHost>(ctx: &mut C, ticks: u64) -> RunReport {
    let start = ctx.continuations().current_tick();
    let mut report = RunReport::default();
    for step in 1..=ticks {
        report += run_due(ctx, start.saturating_add(step));
    }
    report
}
