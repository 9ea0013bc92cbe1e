//! Roster snapshot - per-round capture of who played and on which team
//!
//! Captured when loading completes and immutable for the rest of the round
//! apart from the disconnected/disqualified flags. Results are reported from
//! here so players who drop mid-round still appear.

use serde::{Deserialize, Serialize};
use tracing::error;

use super::SessionId;

/// Hard cap on players per room
pub const MAX_PLAYERS: usize = 10;

/// One captured player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub session_id: SessionId,
    pub nickname: String,
    pub nickname_color: String,
    pub character: u8,
    pub team: u8,
    pub disconnected: bool,
    pub disqualified: bool,
}

/// Fixed-capacity snapshot of the round's players
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    entries: Vec<RosterEntry>,
    capacity: usize,
}

impl RosterSnapshot {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_PLAYERS);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Capture a player. Admission control keeps the roster within capacity;
    /// an overflow here is dropped and logged.
    pub fn push(&mut self, entry: RosterEntry) -> bool {
        if self.entries.len() >= self.capacity {
            error!(
                session = %entry.session_id,
                capacity = self.capacity,
                "Roster snapshot full, player not captured"
            );
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn get(&self, session: SessionId) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.session_id == session)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter()
    }

    /// Flag a departed player. Returns true if the player was captured.
    pub fn mark_disconnected(&mut self, session: SessionId, disqualify: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.session_id == session) {
            Some(entry) => {
                entry.disconnected = true;
                entry.disqualified |= disqualify;
                true
            }
            None => false,
        }
    }

    pub fn mark_disqualified(&mut self, session: SessionId) -> bool {
        match self.entries.iter_mut().find(|e| e.session_id == session) {
            Some(entry) => {
                entry.disqualified = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32) -> RosterEntry {
        RosterEntry {
            session_id: SessionId(id),
            nickname: format!("p{id}"),
            nickname_color: String::new(),
            character: 0,
            team: 0,
            disconnected: false,
            disqualified: false,
        }
    }

    #[test]
    fn push_stops_at_capacity() {
        let mut snapshot = RosterSnapshot::new(2);
        assert!(snapshot.push(entry(1)));
        assert!(snapshot.push(entry(2)));
        assert!(!snapshot.push(entry(3)));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn capacity_is_capped() {
        assert_eq!(RosterSnapshot::new(64).capacity(), MAX_PLAYERS);
    }

    #[test]
    fn disconnect_keeps_the_entry() {
        let mut snapshot = RosterSnapshot::new(4);
        snapshot.push(entry(1));
        assert!(snapshot.mark_disconnected(SessionId(1), false));
        let e = snapshot.get(SessionId(1)).unwrap();
        assert!(e.disconnected && !e.disqualified);
        assert!(!snapshot.mark_disconnected(SessionId(9), true));
    }
}
