//! Extension configuration, loaded from JSON.

use std::path::Path;

use cog_player::Seat;
use cog_protocol::RawIdPolicy;
use cog_tick::TickConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::CogError;

// ---------------------------------------------------------------------------
// CogConfig
// ---------------------------------------------------------------------------

/// Runtime settings for an [`Extension`](crate::Extension).
///
/// Every field has a default, so `{}` is a valid configuration file.
///
/// ```
/// let cfg = cog::CogConfig::from_json(r#"{ "tick_rate_hz": 30 }"#).unwrap();
/// assert_eq!(cfg.tick_rate_hz, 30);
/// assert!(cfg.allow_raw_call_ids);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CogConfig {
    /// Tick rate in Hz. 0 = event-driven (continuations move only when
    /// ticked by hand).
    pub tick_rate_hz: u32,

    /// Random delay (µs) before the first tick.
    pub initial_jitter_us: u64,

    /// Whether the manual RPC console may start undeclared numeric
    /// call-ids.
    pub allow_raw_call_ids: bool,

    /// Seats joined at startup, in order.
    pub lobby: Vec<Seat>,
}

impl Default for CogConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20,
            initial_jitter_us: 0,
            allow_raw_call_ids: true,
            lobby: vec![
                Seat::new(0, "Red"),
                Seat::new(1, "Blue"),
                Seat::new(2, "Green"),
                Seat::new(3, "Yellow"),
            ],
        }
    }
}

impl CogConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CogError> {
        Ok(serde_json::from_str::<Self>(json)?.validated())
    }

    /// Reads and parses a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CogError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Clamps out-of-range values.
    ///
    /// - `tick_rate_hz` is capped at [`TickConfig::MAX_TICK_RATE_HZ`].
    /// - Seats repeating an earlier slot are dropped.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > TickConfig::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = TickConfig::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum, clamping"
            );
            self.tick_rate_hz = TickConfig::MAX_TICK_RATE_HZ;
        }

        let mut seen = std::collections::HashSet::new();
        self.lobby.retain(|seat| {
            let fresh = seen.insert(seat.id);
            if !fresh {
                warn!(seat = seat.id, name = %seat.name, "duplicate lobby seat dropped");
            }
            fresh
        });
        self
    }

    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            tick_rate_hz: self.tick_rate_hz,
            initial_jitter_us: self.initial_jitter_us,
            ..TickConfig::default()
        }
    }

    pub fn raw_id_policy(&self) -> RawIdPolicy {
        if self.allow_raw_call_ids {
            RawIdPolicy::Allow
        } else {
            RawIdPolicy::Reject
        }
    }
}
