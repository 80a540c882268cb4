//! The extension context: one value that owns every piece of state role
//! code touches.
//!
//! # Ownership
//!
//! [`Extension`] owns the player registry, the tag store, the RPC outbox,
//! the event bus, the dispatch table and the continuation queue. Handlers,
//! routes and continuations all receive `&mut Extension<T>`, so a handler
//! can raise another event, send an RPC or schedule a delayed action
//! without any shared-ownership wrapper around the state.
//!
//! ```text
//!                 ┌──────────────── Extension<T> ────────────────┐
//! host moment ──► │ murder()/report_body()/...                    │
//!                 │   └─ intercept: pre ─► default ─► post        │
//!                 │                  handlers may call rpc_*()    │
//!                 │ rpc_*() ─► RpcOutbox<T> ─────────────────────────► T (wire)
//! wire frame ───► │ receive() ─► RpcDispatchTable ─► route        │
//!                 │ tick(n)  ─► ContinuationQueue                 │
//!                 └───────────────────────────────────────────────┘
//! ```
//!
//! Every interception point validates the players it names first and
//! fails with [`CogError::Player`] before any handler runs.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use cog_event::{
    CastVoteEvent, Event, EventBus, EventHost, Intercepted, IntroBeginEvent, Listener,
    PlayerExileEvent, PlayerMurderEvent, ReportDeadBodyEvent, RpcReceivedEvent, VentCheckEvent,
    dispatch_post,
};
use cog_player::{PlayerRegistry, TagStore};
use cog_protocol::{NetId, PlayerId, RoleId, RpcFrame};
use cog_tick::{ContinuationHost, ContinuationId, ContinuationQueue, RunReport, advance};
use cog_transport::Transport;
use tracing::{debug, info, warn};

use crate::console::RpcConsole;
use crate::rpc::{
    ClearSabotages, CleanDeadBody, Delivery, Mark, NameArgs, RemoveMark, Revive, RoleAssignment,
    RpcCall, RpcDispatchTable, RpcHost, RpcOutbox, SetCustomRole, SetName, TagArgs, on_receive,
};
use crate::{CogConfig, CogError};

/// Furthest a player may stand from a vent and still enter it.
pub const VENT_USABLE_DISTANCE: f32 = 0.75;

/// Where the match is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    #[default]
    Lobby,
    InGame,
    Meeting,
}

/// Result of a vent check.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VentAccess {
    /// The player may enter the vent now.
    pub can_use: bool,
    /// The player's vent button is shown at all.
    pub could_use: bool,
}

// ---------------------------------------------------------------------------
// Extension
// ---------------------------------------------------------------------------

/// The state of one extension instance, plus the interception points and
/// RPC helpers that operate on it.
pub struct Extension<T> {
    config: CogConfig,
    local: PlayerId,
    players: PlayerRegistry,
    tags: TagStore,
    outbox: RpcOutbox<T>,
    events: EventBus<Self>,
    routes: RpcDispatchTable<Self>,
    continuations: ContinuationQueue<Self>,
    console: RpcConsole,

    phase: GamePhase,
    round: u32,
    /// Players whose bodies lie on the map.
    bodies: BTreeSet<PlayerId>,
    /// Systems currently sabotaged.
    sabotages: BTreeSet<String>,
    /// Votes of the current meeting; `None` is a skip.
    votes: BTreeMap<PlayerId, Option<PlayerId>>,
}

impl<T> std::fmt::Debug for Extension<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("local", &self.local)
            .field("players", &self.players.len())
            .field("phase", &self.phase)
            .field("round", &self.round)
            .field("handlers", &self.events.len())
            .field("routes", &self.routes.len())
            .field("continuations", &self.continuations.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> Extension<T> {
    /// An extension whose players are the configured lobby, acting as
    /// `local`.
    ///
    /// # Errors
    /// [`CogError::Player`] if `local` is not one of the lobby seats.
    pub fn new(config: CogConfig, local: PlayerId, transport: T) -> Result<Self, CogError> {
        let players = PlayerRegistry::from_seats(&config.lobby)?;
        Self::from_registry(config, local, players, transport)
    }

    /// Like [`new`](Self::new), with a registry built by the caller.
    pub fn from_registry(
        config: CogConfig,
        local: PlayerId,
        players: PlayerRegistry,
        transport: T,
    ) -> Result<Self, CogError> {
        players.require(local)?;
        let console = RpcConsole::new(config.raw_id_policy());
        let ext = Self {
            config,
            local,
            players,
            tags: TagStore::new(),
            outbox: RpcOutbox::new(transport),
            events: EventBus::new(),
            routes: Self::builtin_routes(),
            continuations: ContinuationQueue::new(),
            console,
            phase: GamePhase::Lobby,
            round: 0,
            bodies: BTreeSet::new(),
            sabotages: BTreeSet::new(),
            votes: BTreeMap::new(),
        };
        info!(
            local = %ext.local,
            players = ext.players.len(),
            routes = ext.routes.len(),
            "extension ready"
        );
        Ok(ext)
    }

    /// Receive routines for every extension call.
    fn builtin_routes() -> RpcDispatchTable<Self> {
        let mut routes = RpcDispatchTable::new();
        routes.on::<SetCustomRole, _>(|ext: &mut Self, _, args: RoleAssignment| {
            ext.players.set_role(args.player, args.role)?;
            Ok(())
        });
        routes.on::<Mark, _>(|ext: &mut Self, _, args: TagArgs| {
            ext.tags.mark(args.player, &args.tag);
            Ok(())
        });
        routes.on::<RemoveMark, _>(|ext: &mut Self, _, args: TagArgs| {
            ext.tags.remove_mark(args.player, &args.tag);
            Ok(())
        });
        routes.on::<Revive, _>(|ext: &mut Self, _, player| {
            ext.apply_revive(player)?;
            Ok(())
        });
        routes.on::<ClearSabotages, _>(|ext: &mut Self, _, ()| {
            ext.sabotages.clear();
            Ok(())
        });
        routes.on::<CleanDeadBody, _>(|ext: &mut Self, _, player| {
            ext.bodies.remove(&player);
            Ok(())
        });
        routes
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Lets a listener register its handlers.
    pub fn register<L: Listener<Self> + 'static>(&mut self, listener: Rc<L>) {
        self.events.register(listener);
    }

    /// Removes every handler registered under `owner`.
    pub fn unload(&mut self, owner: &str) -> usize {
        let removed = self.events.unregister_owner(owner);
        info!(owner, removed, "listener unloaded");
        removed
    }

    pub fn events_mut(&mut self) -> &mut EventBus<Self> {
        &mut self.events
    }

    /// Runs `event` through the pre phase, `default_action` and the post
    /// phase.
    pub fn intercept<E, R>(
        &mut self,
        event: E,
        default_action: impl FnOnce(&mut Self, &mut E) -> R,
    ) -> Intercepted<R>
    where
        E: Event,
    {
        cog_event::intercept(self, event, default_action)
    }

    // -----------------------------------------------------------------------
    // Interception points
    // -----------------------------------------------------------------------

    /// `killer` kills `target`. The default action marks the target dead
    /// and, if the event still says so, leaves a body.
    ///
    /// Completes with `true` if the target was alive.
    pub fn murder(
        &mut self,
        killer: PlayerId,
        target: PlayerId,
    ) -> Result<Intercepted<bool>, CogError> {
        self.players.require(killer)?;
        self.players.require(target)?;
        let event = PlayerMurderEvent {
            killer,
            target,
            leaves_body: true,
        };
        settle(self.intercept(event, |ext, event| -> Result<bool, CogError> {
            let killed = ext.players.kill(event.target)?;
            if event.leaves_body {
                ext.bodies.insert(event.target);
            }
            Ok(killed)
        }))
    }

    /// Whether `player` may use vent `vent_id` from `distance` away.
    ///
    /// Nobody can vent by default: a pre-phase handler sets `could_use`
    /// for roles that may. The default action then derives `can_use` from
    /// `could_use`, the player being alive, and the distance. A cancelled
    /// check denies both.
    pub fn check_vent(
        &mut self,
        player: PlayerId,
        vent_id: i32,
        distance: f32,
    ) -> Result<VentAccess, CogError> {
        self.players.require(player)?;
        let event = VentCheckEvent {
            player,
            vent_id,
            can_use: false,
            could_use: false,
            distance,
        };
        let outcome = self.intercept(event, |ext, event| {
            let alive = ext.players.get(event.player).is_some_and(|p| p.alive);
            event.can_use =
                event.could_use && alive && event.distance <= VENT_USABLE_DISTANCE;
            VentAccess {
                can_use: event.can_use,
                could_use: event.could_use,
            }
        });
        Ok(outcome.completed().unwrap_or_default())
    }

    /// `reporter` reports `body` (or calls an emergency meeting with
    /// `None`). The default action starts a meeting and clears the map of
    /// bodies.
    pub fn report_body(
        &mut self,
        reporter: PlayerId,
        body: Option<PlayerId>,
    ) -> Result<Intercepted<()>, CogError> {
        self.players.require(reporter)?;
        if let Some(body) = body {
            self.players.require(body)?;
        }
        let event = ReportDeadBodyEvent { reporter, body };
        Ok(self.intercept(event, |ext, event| {
            debug!(reporter = %event.reporter, body = ?event.body, "meeting started");
            ext.phase = GamePhase::Meeting;
            ext.bodies.clear();
            ext.votes.clear();
        }))
    }

    /// `voter` votes for `suspect` (`None` skips). The default action
    /// records the vote, replacing an earlier one.
    pub fn cast_vote(
        &mut self,
        voter: PlayerId,
        suspect: Option<PlayerId>,
    ) -> Result<Intercepted<()>, CogError> {
        self.players.require(voter)?;
        if let Some(suspect) = suspect {
            self.players.require(suspect)?;
        }
        let event = CastVoteEvent { voter, suspect };
        Ok(self.intercept(event, |ext, event| {
            ext.votes.insert(event.voter, event.suspect);
        }))
    }

    /// A meeting ends with `exiled` thrown out (`None` for a tie or skip).
    /// The default action kills the exiled player without a body and
    /// resumes the round.
    pub fn exile(&mut self, exiled: Option<PlayerId>) -> Result<Intercepted<()>, CogError> {
        if let Some(exiled) = exiled {
            self.players.require(exiled)?;
        }
        let event = PlayerExileEvent { exiled };
        settle(self.intercept(event, |ext, event| -> Result<(), CogError> {
            if let Some(exiled) = event.exiled {
                ext.players.kill(exiled)?;
            }
            ext.phase = GamePhase::InGame;
            ext.votes.clear();
            Ok(())
        }))
    }

    /// The next round's intro begins. The default action advances the
    /// round counter and clears the round's tags, bodies and votes.
    ///
    /// Post-phase handlers see an empty tag store; roles re-tag there.
    pub fn begin_intro(&mut self) -> Intercepted<u32> {
        let event = IntroBeginEvent {
            round: self.round + 1,
        };
        self.intercept(event, |ext, event| {
            ext.round = event.round;
            ext.tags.clear_round();
            ext.bodies.clear();
            ext.votes.clear();
            ext.phase = GamePhase::InGame;
            info!(round = ext.round, "round started");
            ext.round
        })
    }

    /// Puts a system into the sabotaged state until sabotages are cleared.
    pub fn sabotage(&mut self, system: &str) -> bool {
        self.sabotages.insert(system.to_string())
    }

    // -----------------------------------------------------------------------
    // Replicated actions
    // -----------------------------------------------------------------------

    /// Network id of the local player, the sender of every outgoing call.
    pub fn local_net_id(&self) -> Result<NetId, CogError> {
        Ok(self.players.net_id_of(self.local)?)
    }

    fn send<R: RpcCall>(&mut self, args: &R::Args) -> Result<(), CogError> {
        let sender = self.local_net_id()?;
        self.outbox.send::<R>(sender, args, &self.players)
    }

    /// Tags `player` locally and on every peer.
    pub fn rpc_mark(&mut self, player: PlayerId, tag: &str) -> Result<bool, CogError> {
        self.players.require(player)?;
        let added = self.tags.mark(player, tag);
        self.send::<Mark>(&TagArgs {
            player,
            tag: tag.to_string(),
        })?;
        Ok(added)
    }

    pub fn rpc_remove_mark(&mut self, player: PlayerId, tag: &str) -> Result<bool, CogError> {
        self.players.require(player)?;
        let removed = self.tags.remove_mark(player, tag);
        self.send::<RemoveMark>(&TagArgs {
            player,
            tag: tag.to_string(),
        })?;
        Ok(removed)
    }

    /// Brings `player` back to life here and on every peer, removing their
    /// body.
    pub fn rpc_revive(&mut self, player: PlayerId) -> Result<bool, CogError> {
        let revived = self.apply_revive(player)?;
        self.send::<Revive>(&player)?;
        Ok(revived)
    }

    fn apply_revive(&mut self, player: PlayerId) -> Result<bool, CogError> {
        let revived = self.players.revive(player)?;
        self.bodies.remove(&player);
        Ok(revived)
    }

    pub fn rpc_set_role(&mut self, player: PlayerId, role: RoleId) -> Result<(), CogError> {
        self.players.set_role(player, role)?;
        self.send::<SetCustomRole>(&RoleAssignment { player, role })
    }

    pub fn rpc_clear_sabotages(&mut self) -> Result<(), CogError> {
        self.sabotages.clear();
        self.send::<ClearSabotages>(&())
    }

    pub fn rpc_clean_dead_body(&mut self, player: PlayerId) -> Result<bool, CogError> {
        self.players.require(player)?;
        let cleaned = self.bodies.remove(&player);
        self.send::<CleanDeadBody>(&player)?;
        Ok(cleaned)
    }

    /// Renames the local player through the host's own `SetName` call.
    /// Peers leave it to the host game.
    pub fn rpc_set_name(&mut self, name: &str, dont_censor: bool) -> Result<(), CogError> {
        self.players.rename(self.local, name)?;
        self.send::<SetName>(&NameArgs {
            name: name.to_string(),
            dont_censor,
        })
    }

    /// Runs one manual console command (`start Mark`, `add player 3`, ...)
    /// and returns the reply. Failures become replies too.
    pub fn run_command(&mut self, line: &str) -> String {
        let args: Vec<&str> = line.split_whitespace().collect();
        let result = match self.local_net_id() {
            Ok(sender) => self
                .console
                .execute(&args, &mut self.outbox, &self.players, sender),
            Err(err) => Err(err),
        };
        match result {
            Ok(reply) => reply,
            Err(err) => {
                warn!(command = line, error = %err, "rpc command failed");
                format!("error: {err}")
            }
        }
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    /// Routes one received frame, then tells post-phase listeners about
    /// it unless it was dropped.
    ///
    /// # Errors
    /// Unknown host call-ids, malformed payloads and route failures.
    pub fn receive(&mut self, frame: &RpcFrame) -> Result<Delivery, CogError> {
        let (call, delivery) = on_receive(self, frame)?;
        if let (Some(call), Delivery::Handled | Delivery::Unhandled) = (call, delivery) {
            let event = RpcReceivedEvent {
                sender: frame.sender,
                call,
                payload_len: frame.payload.len(),
            };
            dispatch_post(self, &event);
        }
        Ok(delivery)
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advances the game clock `ticks` ticks, resuming due continuations.
    pub fn tick(&mut self, ticks: u64) -> RunReport {
        advance(self, ticks)
    }

    /// Schedules `action` `delay_ticks` ticks from now.
    pub fn schedule(
        &mut self,
        delay_ticks: u64,
        label: &str,
        action: impl FnOnce(&mut Self) + 'static,
    ) -> ContinuationId {
        self.continuations.schedule(delay_ticks, label, action)
    }

    /// Schedules `action` after `delay` of game time.
    ///
    /// # Errors
    /// [`CogError::NoTickRate`] when the clock is event-driven.
    pub fn schedule_after(
        &mut self,
        delay: Duration,
        label: &str,
        action: impl FnOnce(&mut Self) + 'static,
    ) -> Result<ContinuationId, CogError> {
        let ticks = self.delay_ticks(delay)?;
        Ok(self.continuations.schedule(ticks, label, action))
    }

    /// Like [`schedule_after`](Self::schedule_after); `guard` is checked
    /// when the delay is up and a `false` drops the action.
    pub fn schedule_after_guarded(
        &mut self,
        delay: Duration,
        label: &str,
        guard: impl Fn(&Self) -> bool + 'static,
        action: impl FnOnce(&mut Self) + 'static,
    ) -> Result<ContinuationId, CogError> {
        let ticks = self.delay_ticks(delay)?;
        Ok(self
            .continuations
            .schedule_guarded(ticks, label, guard, action))
    }

    pub fn cancel(&mut self, id: ContinuationId) -> bool {
        self.continuations.cancel(id)
    }

    fn delay_ticks(&self, delay: Duration) -> Result<u64, CogError> {
        self.config
            .tick_config()
            .ticks_for(delay)
            .ok_or(CogError::NoTickRate)
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl<T> Extension<T> {
    pub fn config(&self) -> &CogConfig {
        &self.config
    }

    pub fn local(&self) -> PlayerId {
        self.local
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn outbox(&self) -> &RpcOutbox<T> {
        &self.outbox
    }

    pub fn routes_mut(&mut self) -> &mut RpcDispatchTable<Self> {
        &mut self.routes
    }

    pub fn pending_continuations(&self) -> &ContinuationQueue<Self> {
        &self.continuations
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn in_meeting(&self) -> bool {
        self.phase == GamePhase::Meeting
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn has_body(&self, player: PlayerId) -> bool {
        self.bodies.contains(&player)
    }

    pub fn is_sabotaged(&self, system: &str) -> bool {
        self.sabotages.contains(system)
    }

    /// Recorded vote of `voter` in the current meeting. `Some(None)` is a
    /// skip.
    pub fn vote_of(&self, voter: PlayerId) -> Option<Option<PlayerId>> {
        self.votes.get(&voter).copied()
    }

    pub fn console(&self) -> &RpcConsole {
        &self.console
    }
}

impl<T> EventHost for Extension<T> {
    fn event_bus(&self) -> &EventBus<Self> {
        &self.events
    }
}

impl<T> ContinuationHost for Extension<T> {
    fn continuations(&mut self) -> &mut ContinuationQueue<Self> {
        &mut self.continuations
    }
}

impl<T> RpcHost for Extension<T> {
    fn rpc_routes(&self) -> &RpcDispatchTable<Self> {
        &self.routes
    }

    fn player_registry(&self) -> &PlayerRegistry {
        &self.players
    }
}

/// Lifts an error out of a completed default action.
fn settle<R>(outcome: Intercepted<Result<R, CogError>>) -> Result<Intercepted<R>, CogError> {
    match outcome {
        Intercepted::Completed(result) => result.map(Intercepted::Completed),
        Intercepted::Cancelled => Ok(Intercepted::Cancelled),
    }
}
