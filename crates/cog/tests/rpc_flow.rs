//! End-to-end RPC tests: a local extension sends, a peer extension with the
//! same lobby receives.

use std::cell::RefCell;
use std::rc::Rc;

use cog::prelude::*;
use cog_protocol::{CallNamespace, MessageReader, ProtocolError};

// =========================================================================
// Two-peer table
// =========================================================================

struct Table {
    local: Extension<ChannelTransport>,
    peer: Extension<ChannelTransport>,
    wire: FrameReceiver,
    _peer_wire: FrameReceiver,
}

impl Table {
    fn new() -> Self {
        let (tx, wire) = ChannelTransport::pair();
        let (peer_tx, peer_wire) = ChannelTransport::pair();
        Self {
            local: Extension::new(CogConfig::default(), PlayerId(0), tx).unwrap(),
            peer: Extension::new(CogConfig::default(), PlayerId(1), peer_tx).unwrap(),
            wire,
            _peer_wire: peer_wire,
        }
    }

    /// Hands every frame the local side sent to the peer.
    fn deliver(&mut self) -> Vec<Delivery> {
        self.wire
            .drain()
            .unwrap()
            .iter()
            .map(|frame| self.peer.receive(frame).unwrap())
            .collect()
    }
}

/// Records every `RpcReceivedEvent` the extension raises.
fn record_received(ext: &mut Extension<ChannelTransport>) -> Rc<RefCell<Vec<CallId>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    ext.events_mut()
        .on_post::<RpcReceivedEvent, _>("recorder", 0, move |_, event| {
            sink.borrow_mut().push(event.call);
            Ok(())
        });
    seen
}

// =========================================================================
// Typed calls
// =========================================================================

#[test]
fn test_revive_reaches_peer() {
    let mut table = Table::new();
    // Both sides saw the host's kill.
    table.local.murder(PlayerId(0), PlayerId(2)).unwrap();
    table.peer.murder(PlayerId(0), PlayerId(2)).unwrap();
    assert!(table.peer.has_body(PlayerId(2)));

    assert!(table.local.rpc_revive(PlayerId(2)).unwrap());
    assert_eq!(table.deliver(), vec![Delivery::Handled]);

    assert!(table.peer.players().get(PlayerId(2)).unwrap().alive);
    assert!(!table.peer.has_body(PlayerId(2)));
}

#[test]
fn test_mark_and_remove_mark_replicate() {
    let mut table = Table::new();
    table.local.rpc_mark(PlayerId(3), "hunted").unwrap();
    table.deliver();
    assert!(table.peer.tags().has_mark(PlayerId(3), "hunted"));

    table.local.rpc_remove_mark(PlayerId(3), "hunted").unwrap();
    table.deliver();
    assert!(!table.peer.tags().has_mark(PlayerId(3), "hunted"));
}

#[test]
fn test_set_custom_role_replicates() {
    let mut table = Table::new();
    table.local.rpc_set_role(PlayerId(3), RoleId(-4)).unwrap();
    table.deliver();
    assert_eq!(table.peer.players().get(PlayerId(3)).unwrap().role, Some(RoleId(-4)));
}

#[test]
fn test_clean_body_and_sabotages_replicate() {
    let mut table = Table::new();
    table.peer.murder(PlayerId(0), PlayerId(2)).unwrap();
    table.peer.sabotage("lights");

    table.local.rpc_clean_dead_body(PlayerId(2)).unwrap();
    table.local.rpc_clear_sabotages().unwrap();
    assert_eq!(table.deliver(), vec![Delivery::Handled, Delivery::Handled]);

    assert!(!table.peer.has_body(PlayerId(2)));
    assert!(!table.peer.is_sabotaged("lights"));
}

#[test]
fn test_host_set_name_is_left_to_host() {
    let mut table = Table::new();
    let seen = record_received(&mut table.peer);

    table.local.rpc_set_name("Crimson", false).unwrap();
    assert_eq!(table.local.players().get(PlayerId(0)).unwrap().name, "Crimson");

    assert_eq!(table.deliver(), vec![Delivery::Unhandled]);
    assert_eq!(*seen.borrow(), vec![CallId::Host(HostCall::SetName)]);
}

#[test]
fn test_received_event_carries_sender() {
    let mut table = Table::new();
    let senders = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&senders);
    table
        .peer
        .events_mut()
        .on_post::<RpcReceivedEvent, _>("recorder", 0, move |_, event| {
            sink.borrow_mut().push((event.sender, event.payload_len));
            Ok(())
        });

    table.local.rpc_revive(PlayerId(2)).unwrap();
    table.deliver();
    let local_net = table.local.local_net_id().unwrap();
    // Revive carries one reference: a single varint byte.
    assert_eq!(*senders.borrow(), vec![(local_net, 1)]);
}

// =========================================================================
// Manual console
// =========================================================================

#[test]
fn test_manual_mark_decodes_on_peer() {
    let mut table = Table::new();
    let seen = record_received(&mut table.peer);

    assert!(table.local.run_command("start Mark").contains("writer started"));
    assert!(!table.local.run_command("add player 3").starts_with("error"));
    assert!(!table.local.run_command("add string hello world").starts_with("error"));
    assert!(table.local.run_command("send").contains("sent"));

    assert_eq!(table.deliver(), vec![Delivery::Handled]);
    assert!(table.peer.tags().has_mark(PlayerId(3), "hello world"));
    assert_eq!(*seen.borrow(), vec![CallId::Extension(ExtensionCall::Mark)]);
}

#[test]
fn test_manual_mark_bytes() {
    let mut table = Table::new();
    table.local.run_command("start Mark");
    table.local.run_command("add player Yellow");
    table.local.run_command("add string hi");
    table.local.run_command("send");

    let frame = table.wire.try_recv().unwrap().expect("frame");
    assert_eq!(frame.namespace, CallNamespace::Extension);
    assert_eq!(frame.call, ExtensionCall::Mark.value());
    // Yellow joined fourth: net id 4. Then "hi" with its length prefix.
    assert_eq!(frame.payload, vec![4, 2, b'h', b'i']);
}

#[test]
fn test_manual_writer_already_open() {
    let mut table = Table::new();
    table.local.run_command("start Revive");
    let reply = table.local.run_command("start Revive");
    assert!(reply.starts_with("error: a writer is already open"), "{reply}");
}

#[test]
fn test_manual_without_writer() {
    let mut table = Table::new();
    for cmd in ["add int 1", "send", "close"] {
        let reply = table.local.run_command(cmd);
        assert!(reply.starts_with("error: no writer is open"), "{cmd}: {reply}");
    }
}

#[test]
fn test_manual_close_then_restart() {
    let mut table = Table::new();
    table.local.run_command("start Revive");
    table.local.run_command("add player 2");
    assert!(table.local.run_command("close").contains("discarded"));
    assert!(table.deliver().is_empty());

    assert!(table.local.run_command("start Revive").contains("writer started"));
    table.local.run_command("add player 2");
    table.local.run_command("send");
    assert_eq!(table.deliver(), vec![Delivery::Handled]);
}

#[test]
fn test_numeric_zero_resolves_to_host() {
    let mut table = Table::new();
    table.local.run_command("start 0");
    assert_eq!(
        table.local.console().writer().map(RpcWriter::call),
        Some(CallId::Host(HostCall::PlayAnimation))
    );
    table.local.run_command("close");

    // The colliding extension call is still reachable by name.
    table.local.run_command("start SetCustomRole");
    assert_eq!(
        table.local.console().writer().map(RpcWriter::call),
        Some(CallId::Extension(ExtensionCall::SetCustomRole))
    );
}

#[test]
fn test_manual_unresolved_call_id() {
    let mut table = Table::new();
    let reply = table.local.run_command("start NotACall");
    assert!(reply.contains("unresolved call-id"), "{reply}");
    assert!(table.local.console().writer().is_none());
}

#[test]
fn test_manual_raw_call_needs_peer_route() {
    let mut table = Table::new();
    table.local.run_command("start 200");
    table.local.run_command("add byte 7");
    table.local.run_command("send");
    assert_eq!(table.deliver(), vec![Delivery::Ignored]);

    let got = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&got);
    table.peer.routes_mut().route(
        CallId::Raw(200),
        move |_, _, reader: &mut MessageReader<'_>| {
            *sink.borrow_mut() = Some(reader.read_u8()?);
            Ok(())
        },
    );

    table.local.run_command("start 200");
    table.local.run_command("add byte 7");
    table.local.run_command("send");
    assert_eq!(table.deliver(), vec![Delivery::Handled]);
    assert_eq!(*got.borrow(), Some(7));
}

// =========================================================================
// Unknown and malformed frames
// =========================================================================

fn raw_frame(sender: NetId, namespace: CallNamespace, call: u8, payload: Vec<u8>) -> RpcFrame {
    let mut frame = RpcFrame::new(sender, CallId::Raw(call), payload);
    frame.namespace = namespace;
    frame
}

#[test]
fn test_unknown_extension_id_is_ignored() {
    let mut table = Table::new();
    let seen = record_received(&mut table.peer);
    let frame = raw_frame(NetId(1), CallNamespace::Extension, 99, vec![1, 2]);
    assert_eq!(table.peer.receive(&frame).unwrap(), Delivery::Ignored);
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_unknown_host_id_is_an_anomaly() {
    let mut table = Table::new();
    let frame = raw_frame(NetId(1), CallNamespace::Host, 30, vec![]);
    assert!(matches!(
        table.peer.receive(&frame).unwrap_err(),
        CogError::Protocol(ProtocolError::UnknownHostCall(30))
    ));
}

#[test]
fn test_stale_reference_changes_nothing() {
    let mut table = Table::new();
    // Net id 40 was never handed out.
    let frame = raw_frame(
        NetId(1),
        CallNamespace::Extension,
        ExtensionCall::Mark.value(),
        vec![40, 1, b'x'],
    );
    assert!(matches!(
        table.peer.receive(&frame).unwrap_err(),
        CogError::Protocol(ProtocolError::StaleObjectReference(NetId(40)))
    ));
    assert!(table.peer.tags().is_empty());
}

#[test]
fn test_truncated_payload_changes_nothing() {
    let mut table = Table::new();
    let frame = raw_frame(
        NetId(1),
        CallNamespace::Extension,
        ExtensionCall::SetCustomRole.value(),
        vec![3],
    );
    assert!(matches!(
        table.peer.receive(&frame).unwrap_err(),
        CogError::Protocol(ProtocolError::Truncated { .. })
    ));
    assert_eq!(table.peer.players().get(PlayerId(3)).unwrap().role, None);
}

// =========================================================================
// Async receive
// =========================================================================

#[tokio::test]
async fn test_peer_awaits_frames() {
    let mut table = Table::new();
    table.local.rpc_mark(PlayerId(2), "seen").unwrap();

    let frame = table.wire.recv().await.unwrap().expect("frame");
    assert_eq!(table.peer.receive(&frame).unwrap(), Delivery::Handled);
    assert!(table.peer.tags().has_mark(PlayerId(2), "seen"));
}
