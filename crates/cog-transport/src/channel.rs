use cog_protocol::RpcFrame;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{Transport, TransportError};

/// Sending half of an in-process link. Frames are encoded to their wire
/// bytes before they enter the channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

/// Receiving half of an in-process link.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Creates a connected sender/receiver pair.
    pub fn pair() -> (Self, FrameReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, FrameReceiver { rx })
    }

    /// Returns `true` once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: RpcFrame) -> Result<(), TransportError> {
        let bytes = frame.to_bytes();
        trace!(sender = %frame.sender, call = frame.call, len = bytes.len(), "frame queued");
        self.tx.send(bytes).map_err(|_| TransportError::Closed)
    }
}

impl FrameReceiver {
    /// Waits for the next frame.
    ///
    /// Returns `Ok(None)` when every sender has been dropped and the
    /// channel is empty.
    pub async fn recv(&mut self) -> Result<Option<RpcFrame>, TransportError> {
        match self.rx.recv().await {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Takes the next frame if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<RpcFrame>, TransportError> {
        match self.rx.try_recv() {
            Ok(bytes) => decode(&bytes).map(Some),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                debug!("frame channel disconnected");
                Ok(None)
            }
        }
    }

    /// Takes every frame queued right now, in send order.
    pub fn drain(&mut self) -> Result<Vec<RpcFrame>, TransportError> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_recv()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

fn decode(bytes: &[u8]) -> Result<RpcFrame, TransportError> {
    Ok(RpcFrame::from_bytes(bytes)?)
}
