//! Transport abstraction layer for COG.
//!
//! The RPC layer only ever hands a finished [`RpcFrame`] to a [`Transport`].
//! How the bytes travel (the host game's networking, a test harness, an
//! in-process channel) is the implementation's business.
//!
//! [`ChannelTransport`] is the in-process implementation used by the
//! console binary and the integration tests: frames are encoded to bytes on
//! send and decoded again on receive, so both halves of the wire format are
//! exercised.

mod channel;
mod error;

pub use channel::{ChannelTransport, FrameReceiver};
pub use error::TransportError;

use cog_protocol::RpcFrame;

/// Delivers finished RPC frames to the remote peers.
///
/// Sending is synchronous: the host game queues outbound messages and
/// flushes them on its own schedule.
pub trait Transport {
    /// Queues `frame` for delivery.
    fn send(&self, frame: RpcFrame) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, frame: RpcFrame) -> Result<(), TransportError> {
        (**self).send(frame)
    }
}

impl<T: Transport + ?Sized> Transport for std::rc::Rc<T> {
    fn send(&self, frame: RpcFrame) -> Result<(), TransportError> {
        (**self).send(frame)
    }
}
