//! The manual RPC console: builds and sends an arbitrary call from typed
//! text commands.
//!
//! ```text
//! rpc start Mark          → opens a writer for the extension `Mark` call
//! rpc add player 3        → appends a reference to player 3
//! rpc add string hunted   → appends a text field
//! rpc send                → transmits and frees the writer
//! ```
//!
//! The console holds at most one writer. Every failure comes back as a
//! [`CogError`]; nothing here panics on user input.

use cog_player::PlayerRegistry;
use cog_protocol::{CallIdResolver, FieldKind, NetId, RawIdPolicy};
use cog_transport::Transport;
use tracing::debug;

use crate::CogError;
use crate::rpc::{RpcOutbox, RpcWriter};

/// State of the manual RPC surface.
#[derive(Debug, Default)]
pub struct RpcConsole {
    writer: Option<RpcWriter>,
    resolver: CallIdResolver,
}

impl RpcConsole {
    pub fn new(raw_ids: RawIdPolicy) -> Self {
        Self {
            writer: None,
            resolver: CallIdResolver::new(raw_ids),
        }
    }

    /// Whether `start` has been called without a matching `send`/`close`.
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// The writer being built, if any.
    pub fn writer(&self) -> Option<&RpcWriter> {
        self.writer.as_ref()
    }

    /// Runs one console command. `args[0]` is the sub-command.
    ///
    /// Returns the reply to show the user.
    ///
    /// # Errors
    /// Usage errors, writer state errors, and the protocol errors of the
    /// call-id resolver and field parsers.
    pub fn execute<T: Transport>(
        &mut self,
        args: &[&str],
        outbox: &mut RpcOutbox<T>,
        players: &PlayerRegistry,
        sender: NetId,
    ) -> Result<String, CogError> {
        match args.first().copied() {
            Some("start") => self.start(&args[1..], outbox, sender),
            Some("add") => self.add(&args[1..], players),
            Some("send") => self.send(outbox),
            Some("close") => self.close(outbox),
            _ => Ok(Self::help()),
        }
    }

    fn start<T: Transport>(
        &mut self,
        args: &[&str],
        outbox: &mut RpcOutbox<T>,
        sender: NetId,
    ) -> Result<String, CogError> {
        let Some(input) = args.first() else {
            return Err(CogError::Usage("start <call-id>".into()));
        };
        if self.writer.is_some() {
            return Err(CogError::WriterAlreadyOpen(sender));
        }
        let call = self.resolver.resolve(input)?;
        let writer = outbox.start(sender, call)?;
        debug!(%sender, %call, "console writer started");
        self.writer = Some(writer);
        Ok(format!("writer started for {call}; `help` lists field types"))
    }

    fn add(&mut self, args: &[&str], players: &PlayerRegistry) -> Result<String, CogError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(CogError::WriterNotOpen);
        };
        let Some(tag) = args.first() else {
            return Err(CogError::Usage("add <type> <value...>".into()));
        };
        let kind = FieldKind::from_tag(tag)?;
        let values = &args[1..];
        if values.is_empty() && kind != FieldKind::String {
            return Err(CogError::Usage(format!("add {kind} <value...>")));
        }
        let value = kind.parse(values, players)?;
        writer.write_field(&value);
        Ok(format!("{kind} written ({} bytes)", writer.len()))
    }

    fn send<T: Transport>(&mut self, outbox: &mut RpcOutbox<T>) -> Result<String, CogError> {
        let writer = self.writer.take().ok_or(CogError::WriterNotOpen)?;
        let call = writer.call();
        let len = writer.len();
        outbox.finish(writer)?;
        Ok(format!("{call} sent ({len} bytes)"))
    }

    fn close<T: Transport>(&mut self, outbox: &mut RpcOutbox<T>) -> Result<String, CogError> {
        let writer = self.writer.take().ok_or(CogError::WriterNotOpen)?;
        let call = writer.call();
        outbox.close(writer)?;
        Ok(format!("{call} discarded"))
    }

    pub fn help() -> String {
        format!(
            "rpc start <call-id or name>\n\
             rpc add <type> <value...>\n\
             rpc send\n\
             rpc close\n\
             types: {}\n\
             e.g. `rpc add bool true`, `rpc add player 3`, `rpc add player Red`, \
             `rpc add vector 1 -3`",
            FieldKind::tag_list()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cog_player::Seat;
    use cog_protocol::{CallId, ExtensionCall, HostCall, ProtocolError};
    use cog_transport::{ChannelTransport, FrameReceiver};

    fn setup() -> (RpcConsole, RpcOutbox<ChannelTransport>, FrameReceiver, PlayerRegistry) {
        let (tx, rx) = ChannelTransport::pair();
        let players =
            PlayerRegistry::from_seats(&[Seat::new(0, "Red"), Seat::new(3, "Green")]).unwrap();
        (RpcConsole::new(RawIdPolicy::Allow), RpcOutbox::new(tx), rx, players)
    }

    #[test]
    fn test_start_resolves_names_and_numbers() {
        let (mut console, mut out, _rx, players) = setup();
        console.execute(&["start", "Revive"], &mut out, &players, NetId(1)).unwrap();
        assert_eq!(
            console.writer().map(RpcWriter::call),
            Some(CallId::Extension(ExtensionCall::Revive))
        );
        console.execute(&["close"], &mut out, &players, NetId(1)).unwrap();

        console.execute(&["start", "0"], &mut out, &players, NetId(1)).unwrap();
        assert_eq!(
            console.writer().map(RpcWriter::call),
            Some(CallId::Host(HostCall::PlayAnimation))
        );
    }

    #[test]
    fn test_start_twice_fails() {
        let (mut console, mut out, _rx, players) = setup();
        console.execute(&["start", "Mark"], &mut out, &players, NetId(1)).unwrap();
        let err = console
            .execute(&["start", "Mark"], &mut out, &players, NetId(1))
            .unwrap_err();
        assert!(matches!(err, CogError::WriterAlreadyOpen(NetId(1))));
    }

    #[test]
    fn test_start_without_argument_is_usage() {
        let (mut console, mut out, _rx, players) = setup();
        let err = console.execute(&["start"], &mut out, &players, NetId(1)).unwrap_err();
        assert!(matches!(err, CogError::Usage(_)));
        assert!(!out.is_open(NetId(1)));
    }

    #[test]
    fn test_raw_ids_follow_policy() {
        let (tx, _rx) = ChannelTransport::pair();
        let mut out = RpcOutbox::new(tx);
        let players = PlayerRegistry::new();
        let mut strict = RpcConsole::new(RawIdPolicy::Reject);
        let err = strict.execute(&["start", "200"], &mut out, &players, NetId(1)).unwrap_err();
        assert!(matches!(err, CogError::Protocol(ProtocolError::UnresolvedCallId(_))));

        let mut loose = RpcConsole::new(RawIdPolicy::Allow);
        loose.execute(&["start", "200"], &mut out, &players, NetId(1)).unwrap();
        assert_eq!(loose.writer().map(RpcWriter::call), Some(CallId::Raw(200)));
    }

    #[test]
    fn test_add_without_writer_checked_first() {
        let (mut console, mut out, _rx, players) = setup();
        // An unsupported type would also fail, but the missing writer wins.
        let err = console
            .execute(&["add", "decimal", "1"], &mut out, &players, NetId(1))
            .unwrap_err();
        assert!(matches!(err, CogError::WriterNotOpen));
    }

    #[test]
    fn test_add_errors() {
        let (mut console, mut out, _rx, players) = setup();
        console.execute(&["start", "Mark"], &mut out, &players, NetId(1)).unwrap();

        let unsupported = console
            .execute(&["add", "decimal", "1"], &mut out, &players, NetId(1))
            .unwrap_err();
        assert!(matches!(
            unsupported,
            CogError::Protocol(ProtocolError::UnsupportedFieldType(_))
        ));

        let missing = console.execute(&["add", "int"], &mut out, &players, NetId(1)).unwrap_err();
        assert!(matches!(missing, CogError::Usage(_)));

        let nobody = console
            .execute(&["add", "player", "Purple"], &mut out, &players, NetId(1))
            .unwrap_err();
        assert!(matches!(
            nobody,
            CogError::Protocol(ProtocolError::PlayerResolutionFailure(_))
        ));

        // Failed adds leave the writer untouched.
        assert_eq!(console.writer().map(RpcWriter::len), Some(0));
    }

    #[test]
    fn test_send_transmits_and_clears() {
        let (mut console, mut out, mut rx, players) = setup();
        console.execute(&["start", "Mark"], &mut out, &players, NetId(1)).unwrap();
        console.execute(&["add", "player", "3"], &mut out, &players, NetId(1)).unwrap();
        console
            .execute(&["add", "string", "hello", "world"], &mut out, &players, NetId(1))
            .unwrap();
        let reply = console.execute(&["send"], &mut out, &players, NetId(1)).unwrap();
        assert!(reply.contains("sent"));
        assert!(!console.is_open());
        assert!(!out.is_open(NetId(1)));

        let frame = rx.try_recv().unwrap().expect("frame");
        assert_eq!(frame.call_id().unwrap(), Some(CallId::Extension(ExtensionCall::Mark)));
        let mut reader = frame.reader();
        assert_eq!(
            reader.read_net_object(&players).unwrap(),
            cog_protocol::PlayerId(3)
        );
        assert_eq!(reader.read_string().unwrap(), "hello world");
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_send_and_close_need_writer() {
        let (mut console, mut out, _rx, players) = setup();
        for cmd in ["send", "close"] {
            let err = console.execute(&[cmd], &mut out, &players, NetId(1)).unwrap_err();
            assert!(matches!(err, CogError::WriterNotOpen));
        }
    }

    #[test]
    fn test_close_then_restart() {
        let (mut console, mut out, mut rx, players) = setup();
        console.execute(&["start", "Revive"], &mut out, &players, NetId(1)).unwrap();
        console.execute(&["close"], &mut out, &players, NetId(1)).unwrap();
        assert!(rx.try_recv().unwrap().is_none());
        assert!(console.execute(&["start", "Revive"], &mut out, &players, NetId(1)).is_ok());
    }

    #[test]
    fn test_unknown_subcommand_prints_help() {
        let (mut console, mut out, _rx, players) = setup();
        let reply = console.execute(&["frobnicate"], &mut out, &players, NetId(1)).unwrap();
        assert_eq!(reply, RpcConsole::help());
        assert!(reply.contains("upacked"));
        assert_eq!(console.execute(&[], &mut out, &players, NetId(1)).unwrap(), reply);
    }
}
