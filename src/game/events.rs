//! Outbound notifications and side-effect requests
//!
//! Both are fire-and-forget. The presentation layer consumes [`Event`]s; the
//! runtime hosting the simulation acts on [`Effect`]s.

use serde::{Deserialize, Serialize};

use super::r#match::MatchPhase;
use super::rules::Rules;
use super::{ActorId, SessionId};

/// Notification emitted by the simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    GameStateChanged { phase: MatchPhase },
    /// Emitted once per remaining second of the pre-game countdown
    CountdownTick { seconds_remaining: u32 },
    RecordingStarted,
    GameStarted,
    TimerExpired,
    StartGameEndFade,
    GameEnded { winning_team: u8, has_winner: bool },
    HostChanged { host: SessionId },
    PlayerAdded { session: SessionId },
    PlayerRemoved { session: SessionId },
    PlayerDataChanged { session: SessionId },
    StartingCountdownChanged { started: bool },
    RulesChanged { rules: Rules },
    /// The session layer should disconnect this session
    PlayerKicked { session: SessionId },
}

/// Actor spawn request consumed by external spawn logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub actor: ActorId,
    pub owner: SessionId,
    pub character: u8,
    pub team: u8,
    pub spawnpoint: u8,
    /// Number of actors spawned this round; spawn positions depend on it
    pub total_spawns: u8,
}

/// Side effect the hosting runtime must carry out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    SpawnActor(SpawnRequest),
    DestroyAllNonRosterEntities,
    EnableRoundSubsystems,
    DisableRoundSubsystems,
}

/// Everything a tick (or a join/leave hook) produced, in emission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutput {
    pub events: Vec<Event>,
    pub effects: Vec<Effect>,
}

impl TickOutput {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.effects.is_empty()
    }
}

/// Accumulates output until the host drains it
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    output: TickOutput,
}

impl Outbox {
    pub fn event(&mut self, event: Event) {
        self.output.events.push(event);
    }

    pub fn effect(&mut self, effect: Effect) {
        self.output.effects.push(effect);
    }

    pub fn take(&mut self) -> TickOutput {
        std::mem::take(&mut self.output)
    }
}
