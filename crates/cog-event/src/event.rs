//! The [`Event`] trait and the two dispatch phases.

use std::fmt;

/// When a handler runs relative to the default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the default action. Receives `&mut E` and may cancel.
    Pre,
    /// After the default action. Receives `&E` and only observes.
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => f.write_str("pre"),
            Self::Post => f.write_str("post"),
        }
    }
}

/// What a failing pre-phase handler means for the default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and keep going as if the handler returned `true`.
    FailOpen,
    /// Treat the failure as a cancellation.
    FailClosed,
}

/// A game lifecycle moment that handlers can intercept.
///
/// Implementors are plain data records. The name is used in logs; the
/// failure policy decides what a broken pre-phase handler does.
///
/// ```
/// use cog_event::{Event, FailurePolicy};
///
/// struct DoorOpened { door: u8 }
///
/// impl Event for DoorOpened {
///     const NAME: &'static str = "DoorOpened";
/// }
///
/// assert_eq!(DoorOpened::PRE_FAILURE, FailurePolicy::FailOpen);
/// ```
pub trait Event: 'static {
    const NAME: &'static str;
    const PRE_FAILURE: FailurePolicy = FailurePolicy::FailOpen;
}
