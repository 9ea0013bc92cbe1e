//! Match lifecycle modules

pub mod actors;
pub mod events;
pub mod r#match;
pub mod results;
pub mod room;
pub mod roster;
pub mod round;
pub mod rules;
pub mod snapshot;

pub use events::{Effect, Event, SpawnRequest, TickOutput};
pub use r#match::{MatchPhase, MatchState, Simulation, SimulationConfig};
pub use room::{GameRoom, RoomError, RoomHandle, RoomRegistry};
pub use roster::{PlayerRecord, Roster};
pub use rules::{RuleChange, Rules};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Session slot identifier assigned by the external session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable handle of a spawned actor; never reused within a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

/// Per-session data supplied on join
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub nickname: String,
    /// Hex colour string, empty = default
    #[serde(default)]
    pub nickname_color: String,
    #[serde(default)]
    pub character: u8,
    #[serde(default)]
    pub palette: u8,
}

/// Lobby and host commands, queued per tick and addressed by the issuing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Host: start or cancel the pre-game countdown
    ToggleCountdown,
    /// Self: ready up or down
    ToggleReady,
    /// Host: edit a rule
    ChangeRules { change: RuleChange },
    /// Host: end the running round as a draw
    HostEndGame,
    /// Host: ask the session layer to remove a player
    KickPlayer { target: SessionId },
    /// Host: hand the host role to another player
    ChangeHost { new_host: SessionId },
    /// Self: opt in or out of spectating
    ToggleSpectate,
    /// Self: request a team
    ChangeTeam { team: u8 },
    /// Self: change character selection
    ChangePlayerData { character: u8, palette: u8 },
    /// Self: finished loading the stage
    MarkLoaded,
}

impl Command {
    /// Commands only the room host may issue
    pub fn is_host_only(&self) -> bool {
        matches!(
            self,
            Command::ToggleCountdown
                | Command::ChangeRules { .. }
                | Command::HostEndGame
                | Command::KickPlayer { .. }
                | Command::ChangeHost { .. }
        )
    }
}

/// Signals raised by gameplay subsystems outside this core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    PlayerDied { actor: ActorId },
    PlayerCollectedStar { actor: ActorId },
    /// An actor entity was destroyed mid-round
    ActorRemoved { actor: ActorId },
}

/// Input delivered to a room task
#[derive(Debug, Clone)]
pub enum RoomInput {
    Join {
        session: SessionId,
        profile: PlayerProfile,
    },
    Leave {
        session: SessionId,
    },
    Command {
        session: SessionId,
        command: Command,
    },
    Signal(Signal),
}
