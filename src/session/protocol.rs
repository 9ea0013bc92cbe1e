//! JSON-lines protocol between the session layer and room tasks
//! One message per line in each direction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::results::RoundResults;
use crate::game::{Command, Effect, Event, PlayerProfile, SessionId, Signal};

/// Messages read from the session layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Open a new room
    CreateRoom {
        /// Seed for the deterministic random stream, random if absent
        #[serde(default)]
        seed: Option<u64>,
    },

    /// A session joined a room
    Join {
        room_id: Uuid,
        session: SessionId,
        profile: PlayerProfile,
    },

    /// A session left a room
    Leave { room_id: Uuid, session: SessionId },

    /// Lobby/host command from a session
    Command {
        room_id: Uuid,
        session: SessionId,
        command: Command,
    },

    /// Gameplay signal for a room
    Signal { room_id: Uuid, signal: Signal },
}

/// Messages written back to the session layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Room is up
    RoomCreated {
        room_id: Uuid,
        seed: u64,
        /// Unix millis; wall clock, never fed to the simulation
        created_at: u64,
    },

    /// Notification from the simulation
    Event {
        room_id: Uuid,
        /// Simulation tick that produced it
        tick: u64,
        event: Event,
    },

    /// Side-effect request from the simulation
    Effect {
        room_id: Uuid,
        tick: u64,
        effect: Effect,
    },

    /// Results of a round that just ended
    RoundResults {
        room_id: Uuid,
        results: RoundResults,
    },

    /// Room task finished
    RoomClosed { room_id: Uuid },

    /// Error message
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Protocol errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Empty line")]
    Empty,
}

/// Parse one input line
pub fn parse_client_msg(line: &str) -> Result<ClientMsg, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

/// Serialize one output line (without the newline)
pub fn encode_server_msg(msg: &ServerMsg) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::RuleChange;

    #[test]
    fn parses_command_line() {
        let room_id = Uuid::nil();
        let line = format!(
            r#"{{"type":"command","room_id":"{room_id}","session":3,"command":{{"command":"change_rules","change":{{"rule":"stars_to_win","value":5}}}}}}"#
        );
        match parse_client_msg(&line).unwrap() {
            ClientMsg::Command {
                session, command, ..
            } => {
                assert_eq!(session, SessionId(3));
                assert_eq!(
                    command,
                    Command::ChangeRules {
                        change: RuleChange::StarsToWin(5)
                    }
                );
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn join_profile_defaults() {
        let line = r#"{"type":"join","room_id":"00000000-0000-0000-0000-000000000000","session":1,"profile":{"nickname":"mario"}}"#;
        match parse_client_msg(line).unwrap() {
            ClientMsg::Join { profile, .. } => {
                assert_eq!(profile.nickname, "mario");
                assert_eq!(profile.character, 0);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn rejects_blank_and_garbage() {
        assert!(matches!(parse_client_msg("   "), Err(ProtocolError::Empty)));
        assert!(matches!(
            parse_client_msg("{not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn event_lines_are_tagged() {
        let msg = ServerMsg::Event {
            room_id: Uuid::nil(),
            tick: 4,
            event: Event::CountdownTick {
                seconds_remaining: 2,
            },
        };
        let line = encode_server_msg(&msg).unwrap();
        assert!(line.contains(r#""type":"event""#));
        assert!(line.contains(r#""event":"countdown_tick""#));
    }
}
