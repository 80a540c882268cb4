use std::rc::Rc;

use cog::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

type Ext = Extension<ChannelTransport>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Command {
    /// Everything after `/rpc`, for the manual RPC console.
    Rpc(String),
    Murder(PlayerId, PlayerId),
    Report(PlayerId, Option<PlayerId>),
    Vote(PlayerId, Option<PlayerId>),
    Intro,
    /// Advance both sides by hand (the only way in event-driven mode).
    Tick(u64),
    Pause,
    Resume,
    Status,
    Help,
    Quit,
}

const HELP: &str = "\
/rpc <start|add|send|close|help> ...   build and send an RPC from the local player
/murder <killer> <target>              host kill
/report <reporter> [body]              body report or emergency meeting
/vote <voter> [suspect]                cast (or skip) a vote
/intro                                 start the next round
/tick <n>                              advance the clock n ticks
/pause, /resume                        stop or restart the tick clock
/status                                show both sides
/quit";

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let args: Vec<&str> = rest.split_whitespace().collect();
        match (head, args.as_slice()) {
            ("/rpc", _) => Ok(Self::Rpc(rest.trim().to_string())),
            ("/murder", [killer, target]) => Ok(Self::Murder(player(killer)?, player(target)?)),
            ("/report", [reporter]) => Ok(Self::Report(player(reporter)?, None)),
            ("/report", [reporter, body]) => {
                Ok(Self::Report(player(reporter)?, Some(player(body)?)))
            }
            ("/vote", [voter]) => Ok(Self::Vote(player(voter)?, None)),
            ("/vote", [voter, suspect]) => Ok(Self::Vote(player(voter)?, Some(player(suspect)?))),
            ("/intro", []) => Ok(Self::Intro),
            ("/tick", [n]) => n
                .parse()
                .map(Self::Tick)
                .map_err(|_| format!("not a tick count: {n}")),
            ("/pause", []) => Ok(Self::Pause),
            ("/resume", []) => Ok(Self::Resume),
            ("/status", []) => Ok(Self::Status),
            ("/help", _) => Ok(Self::Help),
            ("/quit", _) => Ok(Self::Quit),
            _ => Err(format!("unknown command `{line}`; /help lists commands")),
        }
    }
}

fn player(arg: &str) -> Result<PlayerId, String> {
    arg.parse()
        .map(PlayerId)
        .map_err(|_| format!("not a player id: {arg}"))
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Logs every lifecycle event after it happened.
struct EventLog {
    side: &'static str,
}

impl Listener<Ext> for EventLog {
    fn name(&self) -> &'static str {
        "event-log"
    }

    fn register(self: Rc<Self>, bus: &mut EventBus<Ext>) {
        let side = self.side;
        bus.on_post::<PlayerMurderEvent, _>(self.name(), i32::MAX, move |_, e| {
            info!(side, killer = %e.killer, target = %e.target, body = e.leaves_body, "murder");
            Ok(())
        });
        bus.on_post::<ReportDeadBodyEvent, _>(self.name(), i32::MAX, move |_, e| {
            info!(side, reporter = %e.reporter, body = ?e.body, "meeting called");
            Ok(())
        });
        bus.on_post::<CastVoteEvent, _>(self.name(), i32::MAX, move |_, e| {
            info!(side, voter = %e.voter, suspect = ?e.suspect, "vote cast");
            Ok(())
        });
        bus.on_post::<IntroBeginEvent, _>(self.name(), i32::MAX, move |_, e| {
            info!(side, round = e.round, "intro");
            Ok(())
        });
        bus.on_post::<RpcReceivedEvent, _>(self.name(), i32::MAX, move |ext: &mut Ext, e| {
            let from = ext.players().by_net_id(e.sender).map(|p| p.name.clone());
            info!(side, sender = %e.sender, from = ?from, call = %e.call, len = e.payload_len, "rpc received");
            Ok(())
        });
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct Console {
    local: Ext,
    peer: Ext,
    wire: FrameReceiver,
    peer_wire: FrameReceiver,
    clock: TickScheduler,
}

impl Console {
    fn new(config: CogConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let (local_seat, peer_seat) = match config.lobby.as_slice() {
            [a, b, ..] => (PlayerId(a.id), PlayerId(b.id)),
            _ => return Err("the lobby needs at least two seats".into()),
        };
        let clock = TickScheduler::new(config.tick_config());

        let (tx, wire) = ChannelTransport::pair();
        let (peer_tx, peer_wire) = ChannelTransport::pair();
        let mut local = Extension::new(config.clone(), local_seat, tx)?;
        let mut peer = Extension::new(config, peer_seat, peer_tx)?;
        local.register(Rc::new(EventLog { side: "local" }));
        peer.register(Rc::new(EventLog { side: "peer" }));

        Ok(Self {
            local,
            peer,
            wire,
            peer_wire,
            clock,
        })
    }

    /// Runs one command. Returns `false` on `/quit`.
    fn execute(&mut self, command: Command) -> bool {
        let result: Result<String, CogError> = match command {
            Command::Rpc(line) => Ok(self.local.run_command(&line)),
            Command::Murder(killer, target) => self.on_both(|ext| {
                ext.murder(killer, target).map(|o| format!("{o:?}"))
            }),
            Command::Report(reporter, body) => self.on_both(|ext| {
                ext.report_body(reporter, body).map(|o| format!("{o:?}"))
            }),
            Command::Vote(voter, suspect) => self.on_both(|ext| {
                ext.cast_vote(voter, suspect).map(|o| format!("{o:?}"))
            }),
            Command::Intro => self.on_both(|ext| Ok(format!("{:?}", ext.begin_intro()))),
            Command::Tick(n) => {
                self.advance(n);
                Ok(format!("advanced {n} tick(s)"))
            }
            Command::Pause => {
                self.clock.pause();
                Ok("clock paused".into())
            }
            Command::Resume => {
                self.clock.resume();
                Ok("clock resumed".into())
            }
            Command::Status => Ok(self.status()),
            Command::Help => Ok(HELP.into()),
            Command::Quit => return false,
        };
        match result {
            Ok(reply) => println!("{reply}"),
            Err(err) => println!("error: {err}"),
        }
        self.forward();
        true
    }

    /// Host moments happen on every client: apply to both sides.
    fn on_both(
        &mut self,
        f: impl Fn(&mut Ext) -> Result<String, CogError>,
    ) -> Result<String, CogError> {
        let reply = f(&mut self.local)?;
        f(&mut self.peer)?;
        Ok(reply)
    }

    fn advance(&mut self, ticks: u64) {
        let local = self.local.tick(ticks);
        let peer = self.peer.tick(ticks);
        if local != RunReport::default() || peer != RunReport::default() {
            debug!(?local, ?peer, "continuations ran");
        }
        self.forward();
    }

    /// Feeds everything the local side sent to the peer. The peer's own
    /// frames have nowhere to go and are only logged.
    fn forward(&mut self) {
        match self.wire.drain() {
            Ok(frames) => {
                for frame in frames {
                    if let Err(err) = self.peer.receive(&frame) {
                        warn!(call = frame.call, error = %err, "peer rejected frame");
                    }
                }
            }
            Err(err) => warn!(error = %err, "local wire unreadable"),
        }
        if let Ok(frames) = self.peer_wire.drain() {
            for frame in frames {
                debug!(sender = %frame.sender, call = frame.call, "peer frame dropped");
            }
        }
    }

    fn status(&self) -> String {
        let mut out = format!(
            "tick {} ({} Hz{})\n",
            self.clock.tick_count(),
            self.clock.tick_rate_hz(),
            if self.clock.is_paused() { ", paused" } else { "" }
        );
        for (side, ext) in [("local", &self.local), ("peer", &self.peer)] {
            out.push_str(&format!(
                "{side}: round {} {:?}, pending {:?}\n",
                ext.round(),
                ext.phase(),
                ext.pending_continuations().labels()
            ));
            for p in ext.players().iter() {
                let tags = ext.tags().tags_of(p.id);
                out.push_str(&format!(
                    "  {} {} net={} {} role={:?} tags={:?}{}\n",
                    p.id,
                    p.name,
                    p.net_id,
                    if p.alive { "alive" } else { "dead" },
                    p.role,
                    tags,
                    if ext.has_body(p.id) { " (body)" } else { "" }
                ));
            }
        }
        out
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => CogConfig::load(path)?,
        None => CogConfig::default(),
    };
    info!(
        rate_hz = config.tick_rate_hz,
        seats = config.lobby.len(),
        "starting cog console"
    );

    let mut console = Console::new(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Ok(command) => {
                        if !console.execute(command) {
                            break;
                        }
                    }
                    Err(msg) => println!("{msg}"),
                }
            }
            info = console.clock.wait_for_tick() => {
                console.advance(info.advance());
            }
        }
    }

    info!("console closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("/rpc start  Mark").unwrap(),
            Command::Rpc("start  Mark".into())
        );
        assert_eq!(
            Command::parse("/murder 1 2").unwrap(),
            Command::Murder(PlayerId(1), PlayerId(2))
        );
        assert_eq!(
            Command::parse("/report 3").unwrap(),
            Command::Report(PlayerId(3), None)
        );
        assert_eq!(
            Command::parse("/vote 0 2").unwrap(),
            Command::Vote(PlayerId(0), Some(PlayerId(2)))
        );
        assert_eq!(Command::parse("/tick 40").unwrap(), Command::Tick(40));
        assert_eq!(Command::parse("  /quit ").unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("/murder 1").is_err());
        assert!(Command::parse("/murder one two").is_err());
        assert!(Command::parse("/tick soon").is_err());
        assert!(Command::parse("hello").is_err());
    }

    #[test]
    fn test_manual_rpc_reaches_peer() {
        let mut console = Console::new(CogConfig::default()).unwrap();
        for line in [
            "/rpc start Mark",
            "/rpc add player 3",
            "/rpc add string hello world",
            "/rpc send",
        ] {
            assert!(console.execute(Command::parse(line).unwrap()));
        }
        assert!(console.peer.tags().has_mark(PlayerId(3), "hello world"));
    }

    #[test]
    fn test_murder_applies_to_both_sides() {
        let mut console = Console::new(CogConfig::default()).unwrap();
        console.execute(Command::Murder(PlayerId(0), PlayerId(2)));
        for ext in [&console.local, &console.peer] {
            assert!(!ext.players().get(PlayerId(2)).unwrap().alive);
        }
        assert!(console.status().contains("(body)"));
    }

    #[test]
    fn test_lobby_of_one_is_rejected() {
        let config = CogConfig {
            lobby: vec![Seat::new(0, "Solo")],
            ..CogConfig::default()
        };
        assert!(Console::new(config).is_err());
    }

    #[test]
    fn test_quit_stops() {
        let mut console = Console::new(CogConfig::default()).unwrap();
        assert!(!console.execute(Command::Quit));
    }
}
