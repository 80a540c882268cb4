//! [`RpcFrame`]: one transmitted call (sender, call-id, payload).
//!
//! Layout on the wire:
//!
//! ```text
//! packed u32 sender net id | u8 namespace | u8 call value | packed u32 len | payload
//! ```
//!
//! The frame keeps the namespace and call value raw. Turning them into a
//! [`CallId`] is the receiver's job (see [`CallId::from_wire`]), because an
//! unknown value has different consequences per namespace.

use crate::{
    CallId, CallNamespace, MessageReader, MessageWriter, NetId, ProtocolError,
    SendOption,
};

/// A finished RPC as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcFrame {
    /// Network id of the object that sent the call.
    pub sender: NetId,
    pub namespace: CallNamespace,
    pub call: u8,
    pub payload: Vec<u8>,
    /// Delivery hint for the host transport. Not part of the encoded bytes.
    pub send_option: SendOption,
}

impl RpcFrame {
    pub fn new(sender: NetId, call: CallId, payload: Vec<u8>) -> Self {
        Self {
            sender,
            namespace: call.namespace(),
            call: call.value(),
            payload,
            send_option: SendOption::default(),
        }
    }

    pub fn with_send_option(mut self, send_option: SendOption) -> Self {
        self.send_option = send_option;
        self
    }

    /// Resolves the raw (namespace, value) pair. See [`CallId::from_wire`].
    pub fn call_id(&self) -> Result<Option<CallId>, ProtocolError> {
        CallId::from_wire(self.namespace, self.call)
    }

    /// A reader positioned at the start of the payload.
    pub fn reader(&self) -> MessageReader<'_> {
        MessageReader::new(&self.payload)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = MessageWriter::new();
        w.write_net_id(self.sender);
        w.write_u8(self.namespace.to_byte());
        w.write_u8(self.call);
        w.write_packed_u32(self.payload.len() as u32);
        let mut bytes = w.into_bytes();
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parses one complete frame. The send option is not on the wire, so
    /// parsed frames carry the default.
    ///
    /// # Errors
    /// Truncation, an unknown namespace byte, or bytes after the payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = MessageReader::new(bytes);
        let sender = r.read_net_id()?;
        let namespace = CallNamespace::from_byte(r.read_u8()?)?;
        let call = r.read_u8()?;
        let len = r.read_packed_u32()? as usize;
        let remaining = r.remaining();
        if len > remaining {
            return Err(ProtocolError::Truncated { needed: len, remaining });
        }
        if len < remaining {
            return Err(ProtocolError::TrailingBytes {
                namespace,
                call,
                remaining: remaining - len,
            });
        }
        let payload = bytes[r.position()..].to_vec();
        Ok(Self {
            sender,
            namespace,
            call,
            payload,
            send_option: SendOption::default(),
        })
    }
}
