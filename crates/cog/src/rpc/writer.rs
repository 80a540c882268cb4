//! Outbound RPCs: [`RpcWriter`] builds one payload, [`RpcOutbox`] owns the
//! transport and the one-writer-per-sender rule.
//!
//! ```text
//! outbox.start(sender, call) ──► RpcWriter ──► write_* ... ──► outbox.finish(writer)
//!          │                                                       │
//!          └─ WriterAlreadyOpen if sender busy                      └─ frame → Transport
//! ```
//!
//! `finish` and `close` take the writer by value, so a writer cannot be
//! used after it was sent or discarded. A writer that is simply dropped
//! keeps its sender's slot open until [`RpcOutbox::release`] is called.

use std::collections::HashSet;

use cog_player::PlayerRegistry;
use cog_protocol::{
    CallId, FieldValue, MessageWriter, NetId, PlayerId, RpcFrame, SendOption, Vector2i,
};
use cog_transport::Transport;
use tracing::{debug, trace};

use crate::CogError;
use crate::rpc::RpcCall;

// ---------------------------------------------------------------------------
// RpcWriter
// ---------------------------------------------------------------------------

/// A single-use builder for one outbound call.
#[derive(Debug)]
#[must_use = "an RpcWriter holds its sender's slot until finished or closed"]
pub struct RpcWriter {
    sender: NetId,
    call: CallId,
    payload: MessageWriter,
    send_option: SendOption,
}

impl RpcWriter {
    fn new(sender: NetId, call: CallId) -> Self {
        Self {
            sender,
            call,
            payload: MessageWriter::new(),
            send_option: SendOption::default(),
        }
    }

    pub fn sender(&self) -> NetId {
        self.sender
    }

    pub fn call(&self) -> CallId {
        self.call
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn set_send_option(&mut self, send_option: SendOption) -> &mut Self {
        self.send_option = send_option;
        self
    }

    /// The underlying field writer, for the encodings without a shortcut
    /// here.
    pub fn message(&mut self) -> &mut MessageWriter {
        &mut self.payload
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.payload.write_u8(value);
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.payload.write_bool(value);
        self
    }

    pub fn write_packed_i32(&mut self, value: i32) -> &mut Self {
        self.payload.write_packed_i32(value);
        self
    }

    pub fn write_packed_u32(&mut self, value: u32) -> &mut Self {
        self.payload.write_packed_u32(value);
        self
    }

    pub fn write_str(&mut self, value: &str) -> &mut Self {
        self.payload.write_str(value);
        self
    }

    pub fn write_vector(&mut self, value: Vector2i) -> &mut Self {
        self.payload.write_vector(value);
        self
    }

    /// Writes an object reference to `player`.
    ///
    /// # Errors
    /// [`CogError::Player`] if the player is not in `players`.
    pub fn write_player(
        &mut self,
        players: &PlayerRegistry,
        player: PlayerId,
    ) -> Result<&mut Self, CogError> {
        let net_id = players.net_id_of(player)?;
        self.payload.write_net_id(net_id);
        Ok(self)
    }

    pub fn write_field(&mut self, value: &FieldValue) -> &mut Self {
        trace!(kind = %value.kind(), "field written");
        value.encode(&mut self.payload);
        self
    }

    fn into_frame(self) -> RpcFrame {
        RpcFrame::new(self.sender, self.call, self.payload.into_bytes())
            .with_send_option(self.send_option)
    }
}

// ---------------------------------------------------------------------------
// RpcOutbox
// ---------------------------------------------------------------------------

/// Hands out writers and transmits finished ones.
#[derive(Debug)]
pub struct RpcOutbox<T> {
    transport: T,
    open: HashSet<NetId>,
    frames_sent: u64,
}

impl<T: Transport> RpcOutbox<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            open: HashSet::new(),
            frames_sent: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Opens a writer for `call` on behalf of `sender`.
    ///
    /// # Errors
    /// [`CogError::WriterAlreadyOpen`] if `sender` has a writer that was
    /// neither finished nor closed.
    pub fn start(&mut self, sender: NetId, call: CallId) -> Result<RpcWriter, CogError> {
        if !self.open.insert(sender) {
            return Err(CogError::WriterAlreadyOpen(sender));
        }
        debug!(%sender, %call, "writer opened");
        Ok(RpcWriter::new(sender, call))
    }

    pub fn is_open(&self, sender: NetId) -> bool {
        self.open.contains(&sender)
    }

    /// Transmits the writer's frame and frees the sender's slot.
    ///
    /// The slot is freed even if the transport fails.
    ///
    /// # Errors
    /// [`CogError::WriterNotOpen`] if this outbox did not open the writer;
    /// [`CogError::Transport`] if delivery failed.
    pub fn finish(&mut self, writer: RpcWriter) -> Result<(), CogError> {
        if !self.open.remove(&writer.sender) {
            return Err(CogError::WriterNotOpen);
        }
        let frame = writer.into_frame();
        debug!(
            sender = %frame.sender,
            call = frame.call,
            namespace = %frame.namespace,
            len = frame.payload.len(),
            "rpc sent"
        );
        self.transport.send(frame)?;
        self.frames_sent += 1;
        Ok(())
    }

    /// Discards the writer without sending and frees the sender's slot.
    ///
    /// # Errors
    /// [`CogError::WriterNotOpen`] if this outbox did not open the writer.
    pub fn close(&mut self, writer: RpcWriter) -> Result<(), CogError> {
        if !self.open.remove(&writer.sender) {
            return Err(CogError::WriterNotOpen);
        }
        debug!(sender = %writer.sender, call = %writer.call, "writer closed");
        Ok(())
    }

    /// Frees a sender slot whose writer was dropped. Returns `false` if the
    /// slot was not held.
    pub fn release(&mut self, sender: NetId) -> bool {
        let released = self.open.remove(&sender);
        if released {
            debug!(%sender, "writer slot released");
        }
        released
    }

    /// Encodes and sends a typed call in one step.
    pub fn send<R: RpcCall>(
        &mut self,
        sender: NetId,
        args: &R::Args,
        players: &PlayerRegistry,
    ) -> Result<(), CogError> {
        let mut writer = self.start(sender, R::CALL)?;
        if let Err(err) = R::encode(args, &mut writer, players) {
            self.close(writer)?;
            return Err(err);
        }
        self.finish(writer)
    }

    /// Frames successfully handed to the transport.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}
