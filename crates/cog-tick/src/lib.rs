//! Game clock for COG.
//!
//! Two halves:
//!
//! - [`TickScheduler`]: a fixed-timestep clock (1–128 Hz) that wakes the
//!   driver loop once per tick.
//! - [`ContinuationQueue`]: delayed actions that resume on a later tick.
//!   Role abilities such as "revive the victim ten seconds later" are
//!   continuations, not background threads.
//!
//! The driver connects them: every time the scheduler fires, the context
//! advances its queue by [`TickInfo::advance`] ticks.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(line) = lines.next_line() => { /* commands */ }
//!         info = scheduler.wait_for_tick() => {
//!             extension.tick(info.advance());
//!         }
//!     }
//! }
//! ```
//!
//! # Event-driven mode
//!
//! With `tick_rate_hz == 0` the scheduler never fires. Continuations then
//! only move when the caller advances the queue by hand.

mod continuation;

pub use continuation::{
    ContinuationHost, ContinuationId, ContinuationQueue, RunReport, advance, run_due,
};

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the driver wakes up late for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Count the missed ticks, report them in [`TickInfo::ticks_skipped`],
    /// and schedule the next tick from now.
    #[default]
    Skip,
    /// Ignore the lateness. The next tick keeps the original cadence.
    Drop,
}

/// Clock settings, usually taken from the extension's config file.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Ticks per second. `0` turns the clock off (event-driven).
    pub tick_rate_hz: u32,
    pub policy: TickPolicy,
    /// Upper bound, in microseconds, of a random offset applied to the
    /// first tick only.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self::with_rate(0)
    }
}

impl TickConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            policy: TickPolicy::Skip,
            initial_jitter_us: 0,
        }
    }

    /// Caps `tick_rate_hz` at [`Self::MAX_TICK_RATE_HZ`].
    pub fn validated(mut self) -> Self {
        let max = Self::MAX_TICK_RATE_HZ;
        if self.tick_rate_hz > max {
            warn!(requested = self.tick_rate_hz, max, "tick rate too high, using the maximum");
            self.tick_rate_hz = max;
        }
        self
    }

    /// Length of one tick, or `None` when the clock is off.
    pub fn tick_duration(&self) -> Option<Duration> {
        match self.tick_rate_hz {
            0 => None,
            hz => Some(Duration::from_secs_f64(f64::from(hz).recip())),
        }
    }

    /// How many ticks cover `delay`, rounded up. `None` in event-driven
    /// mode.
    ///
    /// ```
    /// use std::time::Duration;
    /// use cog_tick::TickConfig;
    ///
    /// let cfg = TickConfig::with_rate(20);
    /// assert_eq!(cfg.ticks_for(Duration::from_secs(10)), Some(200));
    /// assert_eq!(cfg.ticks_for(Duration::from_millis(51)), Some(2));
    /// assert_eq!(TickConfig::default().ticks_for(Duration::from_secs(1)), None);
    /// ```
    pub fn ticks_for(&self, delay: Duration) -> Option<u64> {
        if self.tick_rate_hz == 0 {
            return None;
        }
        // Integer math on nanoseconds keeps exact multiples exact.
        let nanos = delay.as_nanos() * u128::from(self.tick_rate_hz);
        let ticks = nanos.div_ceil(1_000_000_000);
        Some(u64::try_from(ticks).unwrap_or(u64::MAX))
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// Fixed delta time (`1 / tick_rate`).
    pub dt: Duration,
    /// Whole ticks missed because the driver woke up late. Always 0 under
    /// [`TickPolicy::Drop`].
    pub ticks_skipped: u64,
}

impl TickInfo {
    /// Game ticks this wake-up stands for: the tick itself plus any skipped
    /// ones, so delays measured in ticks keep their wall-clock meaning.
    pub fn advance(&self) -> u64 {
        1 + self.ticks_skipped
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-timestep tick clock.
pub struct TickScheduler {
    config: TickConfig,
    /// `None` when event-driven.
    period: Option<Duration>,
    fired: u64,
    deadline: Option<Instant>,
    paused: bool,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.tick_duration();
        let deadline = period.map(|p| Instant::now() + p + start_offset(config.initial_jitter_us));

        if let Some(p) = period {
            debug!(
                rate_hz = config.tick_rate_hz,
                period_ms = p.as_secs_f64() * 1000.0,
                policy = ?config.policy,
                "tick clock started"
            );
        } else {
            debug!("tick clock is event-driven");
        }

        Self {
            config,
            period,
            fired: 0,
            deadline,
            paused: false,
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// Pends forever in event-driven mode or while paused, which lets a
    /// `tokio::select!` loop keep serving its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some((deadline, period)) = self.deadline.zip(self.period).filter(|_| !self.paused)
        else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;
        let woke = Instant::now();
        self.fired += 1;

        let ticks_skipped = match self.config.policy {
            TickPolicy::Skip => {
                let late = woke.saturating_duration_since(deadline);
                let missed = u64::try_from(late.as_nanos() / period.as_nanos()).unwrap_or(u64::MAX);
                if missed > 0 {
                    warn!(
                        tick = self.fired,
                        missed,
                        late_ms = late.as_secs_f64() * 1000.0,
                        "driver woke late, skipping ticks"
                    );
                }
                self.deadline = Some(woke + period);
                missed
            }
            TickPolicy::Drop => {
                self.deadline = Some(deadline + period);
                0
            }
        };
        trace!(tick = self.fired, ticks_skipped, "tick");

        TickInfo {
            tick: self.fired,
            dt: period,
            ticks_skipped,
        }
    }

    /// Stops ticks until [`resume`](Self::resume). Calling it twice is
    /// harmless.
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        debug!(tick = self.fired, "tick clock paused");
    }

    /// Restarts ticks one full tick from now, so time spent paused does
    /// not arrive as a burst.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.deadline = self.period.map(|p| Instant::now() + p);
        debug!(tick = self.fired, "tick clock resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_event_driven(&self) -> bool {
        self.period.is_none()
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.fired
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Option<Duration> {
        self.period
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }
}

/// Random delay in `0..max_us` microseconds; zero when `max_us` is zero.
fn start_offset(max_us: u64) -> Duration {
    if max_us == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(rand::rng().random_range(0..max_us))
}
