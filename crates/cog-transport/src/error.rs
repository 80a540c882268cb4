use cog_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The other end of the link was dropped.
    #[error("transport closed")]
    Closed,

    /// Received bytes did not form a valid frame.
    #[error("malformed frame: {0}")]
    Malformed(#[from] ProtocolError),
}
