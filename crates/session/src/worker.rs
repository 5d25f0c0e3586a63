use super::ActError;
use super::Outgoing;
use super::SessionCommand;
use super::TurnClock;
use super::ai;
use skr_core::ID;
use skr_core::TURN_DEADLINE;
use skr_core::Unique;
use skr_core::UserId;
use skr_rules::ActionInput;
use skr_rules::CombatPhase;
use skr_rules::Control;
use skr_rules::Event;
use skr_rules::NpcTurnMode;
use skr_rules::Presence;
use skr_rules::RuleViolation;
use skr_rules::Session;
use skr_rules::engine;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::Instant;

/// Handle to a running session worker. Cloneable; everything reaches the
/// worker through its queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: ID<Session>,
    tx: UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn id(&self) -> ID<Session> {
        self.id
    }
    /// Post a command; false when the worker is gone.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Who drives the unit currently holding the turn.
enum Driver {
    Human,
    Ai,
}

/// Single-writer actor owning one session's authoritative state.
///
/// The loop reads one message, runs the rules engine to completion,
/// emits events, then loops. Deadlines are a select arm, not callbacks:
/// expiry injects an auto-end-turn or one AI action through the same
/// engine as every client action.
pub struct SessionWorker {
    session: Session,
    rx: UnboundedReceiver<SessionCommand>,
    outgoing: UnboundedSender<Outgoing>,
    clock: TurnClock,
}

impl SessionWorker {
    /// Spawn the worker task and return its handle. Works for fresh and
    /// loaded sessions alike; a loaded in-progress session re-arms its
    /// turn deadline immediately.
    pub fn spawn(session: Session, outgoing: UnboundedSender<Outgoing>) -> SessionHandle {
        let (tx, rx) = unbounded_channel();
        let id = session.id();
        let worker = Self {
            session,
            rx,
            outgoing,
            clock: TurnClock::new(),
        };
        tokio::spawn(worker.run());
        SessionHandle { id, tx }
    }

    async fn run(mut self) {
        let id = self.session.id();
        log::debug!("[worker {}] started", id);
        self.reschedule();
        loop {
            let deadline = self.clock.deadline();
            tokio::select! {
                biased;
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => self.on_deadline(),
            }
        }
        log::debug!("[worker {}] shut down", id);
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Act { user, action, reply } => {
                let result = self.act(&user, action);
                let _ = reply.send(result);
            }
            SessionCommand::Join { user } => {
                self.transition(&Control::Join { user });
                self.maybe_start();
            }
            SessionCommand::Disconnect { user } => {
                self.transition(&Control::Disconnect { user });
            }
            SessionCommand::Reconnect { user } => {
                self.transition(&Control::Reconnect { user });
            }
            SessionCommand::Leave { user, reason } => {
                self.transition(&Control::Leave { user, reason });
            }
            SessionCommand::Chat { user, text } => {
                if self.seated(&user) || self.spectating(&user) {
                    let _ = self.outgoing.send(Outgoing::Chat {
                        session: self.session.id(),
                        user,
                        text,
                    });
                }
            }
            SessionCommand::PauseToggle { user } => {
                // Spectators may watch, not stop the clock.
                if self.seated(&user) {
                    let paused = self.clock.toggle();
                    log::info!("[worker {}] paused = {}", self.session.id(), paused);
                    let _ = self.outgoing.send(Outgoing::PauseToggled {
                        session: self.session.id(),
                        paused,
                    });
                }
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.session.clone());
            }
        }
    }

    /// Validate that `user` controls what the action claims, then run the
    /// engine. A panic inside the engine discards the action and aborts
    /// the session so stale state is never served.
    fn act(&mut self, user: &UserId, action: ActionInput) -> Result<(), ActError> {
        let action = self.authorize(user, action)?;
        log::debug!("[worker {}] {} submits {}", self.session.id(), user, action);
        match catch_unwind(AssertUnwindSafe(|| engine::apply(&self.session, &action))) {
            Ok(Ok((next, events))) => {
                self.session = next;
                self.emit(events);
                self.reschedule();
                Ok(())
            }
            Ok(Err(violation)) => {
                log::debug!("[worker {}] rejected: {}", self.session.id(), violation);
                Err(ActError::Rule(violation))
            }
            Err(_) => {
                log::error!(
                    "[worker {}] engine panicked on {}; aborting session",
                    self.session.id(),
                    action
                );
                self.transition(&Control::Abort);
                Err(ActError::Internal)
            }
        }
    }

    fn authorize(&self, user: &UserId, action: ActionInput) -> Result<ActionInput, ActError> {
        match action {
            // The shop purchase is keyed by the submitting user, never by
            // whatever user id the client wrote.
            ActionInput::BuyWeapon { weapon_id, .. } => Ok(ActionInput::BuyWeapon {
                user_id: user.clone(),
                weapon_id,
            }),
            other => {
                let unit_id = other.unit_id().expect("non-shop actions name a unit").clone();
                match self.session.unit(&unit_id).and_then(|u| u.owner.clone()) {
                    Some(owner) if &owner == user => Ok(other),
                    _ => Err(ActError::Rule(RuleViolation::NotYourTurn(format!(
                        "{} does not control {}",
                        user, unit_id
                    )))),
                }
            }
        }
    }

    fn transition(&mut self, control: &Control) {
        let (next, events) = engine::transition(&self.session, control);
        self.session = next;
        self.emit(events);
        self.reschedule();
    }

    /// Combat auto-starts once the lobby fills.
    fn maybe_start(&mut self) {
        if self.session.combat().phase != CombatPhase::NotStarted {
            return;
        }
        let seated = self
            .session
            .members()
            .values()
            .filter(|p| !matches!(p, Presence::Spectating))
            .count();
        if seated >= self.session.config().players {
            self.transition(&Control::StartCombat);
        }
    }

    fn emit(&self, events: Vec<Event>) {
        if !events.is_empty() {
            let _ = self.outgoing.send(Outgoing::Events {
                session: self.session.id(),
                events,
            });
        }
    }

    /// Re-arm the clock for the current turn. Player turns keep their
    /// 15-second budget across mid-turn actions; AI turns re-arm pacing
    /// after every applied action.
    fn reschedule(&mut self) {
        if !self.session.combat().in_progress() {
            self.clock.clear();
            return;
        }
        let turn = match self.session.combat().turn.as_ref() {
            Some(t) => t.clone(),
            None => {
                self.clock.clear();
                return;
            }
        };
        let round = self.session.combat().round;
        match self.driver(&turn.unit_id) {
            Driver::Human => {
                self.clock
                    .arm_if_new((round, turn.unit_id, 0), TURN_DEADLINE);
            }
            Driver::Ai => {
                let marker = self.session.turn_history().len() as u64;
                let pacing = self.pacing();
                self.clock.arm_if_new((round, turn.unit_id, marker), pacing);
            }
        }
    }

    fn on_deadline(&mut self) {
        self.clock.clear();
        let turn = match self.session.combat().turn.as_ref() {
            Some(t) => t.clone(),
            None => return,
        };
        let action = match self.driver(&turn.unit_id) {
            Driver::Human => {
                log::info!(
                    "[worker {}] timeout: ending turn for {}",
                    self.session.id(),
                    turn.unit_id
                );
                ActionInput::EndTurn {
                    unit_id: turn.unit_id.clone(),
                }
            }
            Driver::Ai => ai::decide(&self.session, &turn.unit_id),
        };
        match catch_unwind(AssertUnwindSafe(|| engine::apply(&self.session, &action))) {
            Ok(Ok((next, events))) => {
                self.session = next;
                self.emit(events);
            }
            Ok(Err(violation)) => {
                log::warn!(
                    "[worker {}] scheduled {} rejected: {}",
                    self.session.id(),
                    action,
                    violation
                );
                // Fall back to ending the stuck turn outright.
                if let Ok((next, events)) = engine::apply(
                    &self.session,
                    &ActionInput::EndTurn {
                        unit_id: turn.unit_id,
                    },
                ) {
                    self.session = next;
                    self.emit(events);
                }
            }
            Err(_) => {
                log::error!(
                    "[worker {}] engine panicked on scheduled {}; aborting session",
                    self.session.id(),
                    action
                );
                self.transition(&Control::Abort);
            }
        }
        self.reschedule();
    }

    /// A unit is human-driven while its owner remains a session member,
    /// connected or within grace. Monsters, npcs, and units whose owner
    /// left are scheduler-driven.
    fn driver(&self, unit_id: &skr_core::UnitId) -> Driver {
        match self.session.unit(unit_id).and_then(|u| u.owner.as_ref()) {
            Some(owner) if self.session.members().contains_key(owner) => Driver::Human,
            _ => Driver::Ai,
        }
    }

    fn seated(&self, user: &UserId) -> bool {
        matches!(
            self.session.members().get(user),
            Some(Presence::Connected) | Some(Presence::Disconnected { .. })
        )
    }

    fn spectating(&self, user: &UserId) -> bool {
        matches!(self.session.members().get(user), Some(Presence::Spectating))
    }

    fn pacing(&self) -> Duration {
        let base = match self.session.config().npc_turn_mode {
            NpcTurnMode::Sequential => skr_core::AI_PACING_SEQUENTIAL,
            NpcTurnMode::Parallel => skr_core::AI_PACING_PARALLEL,
        };
        base.div_f64(self.session.config().game_speed.max(0.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skr_rules::LeaveReason;
    use skr_rules::MonsterSpawn;
    use skr_rules::SessionConfig;
    use skr_rules::Stats;
    use skr_world::Position;
    use tokio::sync::mpsc;
    use tokio::sync::oneshot;

    fn config(monster_at: Position, monster_hp: u32) -> SessionConfig {
        SessionConfig {
            players: 1,
            wall_density: 0.0,
            shop_offset: Position::new(1000, 1000),
            monsters: vec![MonsterSpawn {
                name: "Skeleton".to_string(),
                stats: Stats {
                    hp: monster_hp,
                    max_hp: monster_hp,
                    attack: 4,
                    defense: 0,
                    initiative: 8,
                    move_range: 3,
                    attack_range: 1,
                },
                position: Some(monster_at),
            }],
            ..SessionConfig::default()
        }
    }

    fn spawn(config: SessionConfig) -> (SessionHandle, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(ID::default(), 42, config);
        (SessionWorker::spawn(session, tx), rx)
    }

    async fn next_events(rx: &mut mpsc::UnboundedReceiver<Outgoing>) -> Vec<Event> {
        loop {
            match tokio::time::timeout(Duration::from_secs(60), rx.recv())
                .await
                .expect("worker should emit")
                .expect("worker alive")
            {
                Outgoing::Events { events, .. } => return events,
                _ => continue,
            }
        }
    }

    async fn act(handle: &SessionHandle, user: &str, action: ActionInput) -> Result<(), ActError> {
        let (reply, result) = oneshot::channel();
        assert!(handle.send(SessionCommand::Act {
            user: user.to_string(),
            action,
            reply,
        }));
        result.await.expect("worker replies")
    }

    #[tokio::test(start_paused = true)]
    async fn join_fills_lobby_and_starts_combat() {
        let (handle, mut rx) = spawn(config(Position::new(10, 10), 50));
        handle.send(SessionCommand::Join {
            user: "alice".to_string(),
        });
        let joined = next_events(&mut rx).await;
        assert!(matches!(joined[0], Event::PlayerJoined { .. }));
        assert!(joined.iter().any(|e| matches!(e, Event::UnitSpawned { .. })));
        let started = next_events(&mut rx).await;
        assert!(matches!(started[0], Event::CombatStarted { .. }));
        assert!(matches!(started[1], Event::TurnStarted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn player_turn_times_out_into_auto_end_turn() {
        let (handle, mut rx) = spawn(config(Position::new(10, 10), 50));
        handle.send(SessionCommand::Join {
            user: "alice".to_string(),
        });
        let _ = next_events(&mut rx).await; // join
        let _ = next_events(&mut rx).await; // combat start
        // No client action: the 15s deadline fires an involuntary end.
        let events = next_events(&mut rx).await;
        assert!(matches!(events[0], Event::TurnEnded { .. }));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::TurnStarted { unit_id, .. } if unit_id == "M1"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn late_end_turn_is_rejected_after_timeout() {
        let (handle, mut rx) = spawn(config(Position::new(10, 10), 50));
        handle.send(SessionCommand::Join {
            user: "alice".to_string(),
        });
        let _ = next_events(&mut rx).await;
        let _ = next_events(&mut rx).await;
        let _ = next_events(&mut rx).await; // timeout already ended P1's turn
        let result = act(
            &handle,
            "alice",
            ActionInput::EndTurn {
                unit_id: "P1".to_string(),
            },
        )
        .await;
        match result {
            Err(ActError::Rule(violation)) => assert_eq!(violation.kind(), "not_your_turn"),
            other => panic!("expected rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn monster_attacks_on_its_turn() {
        let (handle, mut rx) = spawn(config(Position::new(1, 0), 50));
        handle.send(SessionCommand::Join {
            user: "alice".to_string(),
        });
        let _ = next_events(&mut rx).await;
        let _ = next_events(&mut rx).await;
        act(
            &handle,
            "alice",
            ActionInput::EndTurn {
                unit_id: "P1".to_string(),
            },
        )
        .await
        .expect("hand over");
        let handover = next_events(&mut rx).await;
        assert!(matches!(handover[0], Event::TurnEnded { .. }));
        // After AI pacing the monster swings at the adjacent player.
        let events = next_events(&mut rx).await;
        assert!(matches!(
            &events[0],
            Event::UnitAttacked { attacker_id, target_id }
                if attacker_id == "M1" && target_id == "P1"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_the_turn_deadline() {
        let (handle, mut rx) = spawn(config(Position::new(10, 10), 50));
        handle.send(SessionCommand::Join {
            user: "alice".to_string(),
        });
        let _ = next_events(&mut rx).await;
        let _ = next_events(&mut rx).await;
        handle.send(SessionCommand::PauseToggle {
            user: "alice".to_string(),
        });
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(Outgoing::PauseToggled { paused, .. })) => assert!(paused),
            other => panic!("expected pause ack, got {:?}", other),
        }
        // Well past the 15s budget: nothing fires while paused.
        let quiet = tokio::time::timeout(Duration::from_secs(60), rx.recv()).await;
        assert!(quiet.is_err(), "deadline fired while paused");
        // Resume: the preserved remainder runs out and the turn ends.
        handle.send(SessionCommand::PauseToggle {
            user: "alice".to_string(),
        });
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(Outgoing::PauseToggled { paused, .. })) => assert!(!paused),
            other => panic!("expected resume ack, got {:?}", other),
        }
        let events = next_events(&mut rx).await;
        assert!(matches!(events[0], Event::TurnEnded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn spectators_cannot_pause() {
        let (handle, mut rx) = spawn(config(Position::new(10, 10), 50));
        handle.send(SessionCommand::Join {
            user: "alice".to_string(),
        });
        let _ = next_events(&mut rx).await;
        let _ = next_events(&mut rx).await;
        handle.send(SessionCommand::Join {
            user: "bob".to_string(),
        });
        let joined = next_events(&mut rx).await;
        assert!(matches!(joined[0], Event::PlayerJoined { spectator: true, .. }));
        handle.send(SessionCommand::PauseToggle {
            user: "bob".to_string(),
        });
        // No pause ack arrives; the next outgoing traffic is the turn
        // timeout, proving the clock kept running.
        let events = next_events(&mut rx).await;
        assert!(matches!(events[0], Event::TurnEnded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_returns_full_state() {
        let (handle, mut rx) = spawn(config(Position::new(10, 10), 50));
        handle.send(SessionCommand::Join {
            user: "alice".to_string(),
        });
        let _ = next_events(&mut rx).await;
        let _ = next_events(&mut rx).await;
        let (reply, result) = oneshot::channel();
        handle.send(SessionCommand::Snapshot { reply });
        let snapshot = result.await.expect("snapshot");
        assert!(snapshot.members().contains_key("alice"));
        assert!(snapshot.combat().in_progress());
        assert!(!snapshot.turn_history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn acting_through_a_unit_you_do_not_own_is_rejected() {
        let (handle, mut rx) = spawn(config(Position::new(10, 10), 50));
        handle.send(SessionCommand::Join {
            user: "alice".to_string(),
        });
        let _ = next_events(&mut rx).await;
        let _ = next_events(&mut rx).await;
        let result = act(
            &handle,
            "mallory",
            ActionInput::EndTurn {
                unit_id: "P1".to_string(),
            },
        )
        .await;
        match result {
            Err(ActError::Rule(violation)) => assert_eq!(violation.kind(), "not_your_turn"),
            other => panic!("expected rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn departed_players_units_are_scheduler_driven() {
        let (handle, mut rx) = spawn(config(Position::new(10, 10), 50));
        handle.send(SessionCommand::Join {
            user: "alice".to_string(),
        });
        let _ = next_events(&mut rx).await;
        let _ = next_events(&mut rx).await;
        handle.send(SessionCommand::Leave {
            user: "alice".to_string(),
            reason: LeaveReason::DisconnectTimeout,
        });
        let left = next_events(&mut rx).await;
        assert!(matches!(left[0], Event::PlayerLeft { .. }));
        // P1 still holds the turn but now runs on AI pacing, far faster
        // than the 15s player budget.
        let events = tokio::time::timeout(Duration::from_secs(5), next_events(&mut rx))
            .await
            .expect("orphaned unit acts quickly");
        assert!(!events.is_empty());
    }
}
