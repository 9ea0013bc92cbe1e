//! Room host: runs one simulation on a tokio interval and fans out its output

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::protocol::ServerMsg;
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::tick_interval;

use super::events::{Event, TickOutput};
use super::r#match::{Simulation, SimulationConfig};
use super::results;
use super::{Command, RoomInput, SessionId, Signal};

/// Room errors
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found: {0}")]
    NotFound(Uuid),

    #[error("Room closed: {0}")]
    Closed(Uuid),
}

impl RoomError {
    /// Machine-readable code for error replies
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::NotFound(_) => "room_not_found",
            RoomError::Closed(_) => "room_closed",
        }
    }
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub seed: u64,
    pub input_tx: mpsc::Sender<RoomInput>,
    pub output_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Queue an input for the room's next tick
    pub async fn send(&self, input: RoomInput) -> Result<(), RoomError> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| RoomError::Closed(self.id))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.output_tx.subscribe()
    }
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Look up a room or fail with [`RoomError::NotFound`]
    pub fn require(&self, id: &Uuid) -> Result<RoomHandle, RoomError> {
        self.get(id).ok_or(RoomError::NotFound(*id))
    }

    pub fn insert(&self, handle: RoomHandle) {
        self.rooms.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.remove(id).map(|(_, h)| h)
    }

    pub fn room_ids(&self) -> Vec<Uuid> {
        self.rooms.iter().map(|r| *r.key()).collect()
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One hosted room
pub struct GameRoom {
    id: Uuid,
    sim: Simulation,
    input_rx: mpsc::Receiver<RoomInput>,
    output_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
    limiter: SessionRateLimiter,
    had_players: bool,
}

impl GameRoom {
    /// Create a new room
    pub fn new(
        id: Uuid,
        seed: u64,
        config: SimulationConfig,
        command_rate_limit: u32,
    ) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (output_tx, _) = broadcast::channel(256);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            id,
            seed,
            input_tx,
            output_tx: output_tx.clone(),
            player_count: player_count.clone(),
        };

        let room = Self {
            id,
            sim: Simulation::new(config, seed),
            input_rx,
            output_tx,
            player_count,
            limiter: SessionRateLimiter::new(command_rate_limit),
            had_players: false,
        };

        (room, handle)
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Run the tick loop until the room empties or every handle is dropped
    pub async fn run(mut self) {
        info!(room_id = %self.id, "Room opened");

        let mut ticker = interval(tick_interval(self.sim.config().tick_rate));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let (commands, signals, closed) = self.drain_inputs();

            let output = self.sim.tick(&commands);
            self.publish(output);

            // Gameplay signals raised during this tick
            for signal in signals {
                self.sim.apply_signal(signal);
            }
            let output = self.sim.take_output();
            self.publish(output);

            if closed {
                info!(room_id = %self.id, "Input channel closed, shutting room down");
                break;
            }
            if self.had_players && self.sim.roster().is_empty() {
                info!(room_id = %self.id, "All players left, closing room");
                break;
            }
        }

        let _ = self.output_tx.send(ServerMsg::RoomClosed { room_id: self.id });
    }

    /// Drain pending inputs. Joins and leaves apply immediately in arrival order;
    /// commands and signals are batched for the tick.
    fn drain_inputs(&mut self) -> (Vec<(SessionId, Command)>, Vec<Signal>, bool) {
        let mut commands = Vec::new();
        let mut signals = Vec::new();

        loop {
            match self.input_rx.try_recv() {
                Ok(RoomInput::Join { session, profile }) => self.handle_join(session, profile),
                Ok(RoomInput::Leave { session }) => self.handle_leave(session),
                Ok(RoomInput::Command { session, command }) => {
                    if self.limiter.check(session) {
                        commands.push((session, command));
                    } else {
                        warn!(room_id = %self.id, session = %session, "Rate limited command");
                    }
                }
                Ok(RoomInput::Signal(signal)) => signals.push(signal),
                Err(TryRecvError::Empty) => return (commands, signals, false),
                Err(TryRecvError::Disconnected) => return (commands, signals, true),
            }
        }
    }

    fn handle_join(&mut self, session: SessionId, profile: super::PlayerProfile) {
        let roster = self.sim.roster();
        if !roster.contains(session) && roster.len() >= self.sim.config().max_players {
            let _ = self.output_tx.send(ServerMsg::error("room_full", "Room is full"));
            debug!(room_id = %self.id, session = %session, "Join rejected, room full");
            return;
        }

        self.sim.player_added(session, profile);
        self.had_players = true;
        self.player_count
            .store(self.sim.roster().len(), Ordering::Relaxed);
    }

    fn handle_leave(&mut self, session: SessionId) {
        self.sim.player_removed(session);
        self.limiter.forget(session);
        self.player_count
            .store(self.sim.roster().len(), Ordering::Relaxed);
    }

    /// Broadcast a batch of output; tabulate results when a round just ended
    fn publish(&mut self, output: TickOutput) {
        let tick = self.sim.tick_number();
        let round_ended = output
            .events
            .iter()
            .any(|e| matches!(e, Event::GameEnded { .. }));

        for event in output.events {
            let _ = self.output_tx.send(ServerMsg::Event {
                room_id: self.id,
                tick,
                event,
            });
        }
        for effect in output.effects {
            let _ = self.output_tx.send(ServerMsg::Effect {
                room_id: self.id,
                tick,
                effect,
            });
        }

        if round_ended {
            let results = results::tabulate(&self.sim);
            info!(
                room_id = %self.id,
                round = results.round,
                winning_team = ?results.winning_team,
                "Round results ready"
            );
            let _ = self.output_tx.send(ServerMsg::RoundResults {
                room_id: self.id,
                results,
            });
        }
    }
}
