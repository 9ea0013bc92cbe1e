//! Player roster - join/leave bookkeeping, host migration, team assignment

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{PlayerProfile, SessionId};

/// Per-session record (authoritative). Lives from join until leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub session_id: SessionId,
    /// Strictly increasing; seniority for host migration and stable ordering
    pub join_sequence: u64,
    pub profile: PlayerProfile,

    // Lobby state
    pub is_spectator: bool,
    pub manual_spectator: bool,
    pub is_loaded: bool,
    pub is_ready: bool,
    pub is_room_host: bool,

    // Teams
    pub requested_team: u8,
    /// None until loading completes for this round
    pub resolved_team: Option<u8>,

    /// Rounds won this session; survives round resets
    pub wins: u32,
}

impl PlayerRecord {
    fn new(session_id: SessionId, join_sequence: u64, profile: PlayerProfile) -> Self {
        Self {
            session_id,
            join_sequence,
            profile,
            is_spectator: false,
            manual_spectator: false,
            is_loaded: false,
            is_ready: false,
            is_room_host: false,
            requested_team: 0,
            resolved_team: None,
            wins: 0,
        }
    }

    /// Clear the per-round flags; identity, wins and the spectate opt-in are kept
    pub fn reset_round_flags(&mut self) {
        self.is_loaded = false;
        self.is_ready = false;
        self.is_spectator = self.manual_spectator;
        self.resolved_team = None;
    }
}

/// Result of a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    pub team: u8,
    pub became_host: bool,
}

/// Result of a leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Left {
    pub record: PlayerRecord,
    /// Set when the departing player held host; `Some` names the promoted player
    pub host_change: Option<Option<SessionId>>,
}

impl Left {
    pub fn host_changed(&self) -> bool {
        self.host_change.is_some()
    }
}

/// Roster of connected sessions, keyed by session id
#[derive(Debug, Clone)]
pub struct Roster {
    records: BTreeMap<SessionId, PlayerRecord>,
    next_join_sequence: u64,
    team_count: usize,
}

impl Roster {
    /// `team_count` must be non-zero; validated by configuration
    pub fn new(team_count: usize) -> Self {
        debug_assert!(team_count > 0, "team count validated upstream");
        Self {
            records: BTreeMap::new(),
            next_join_sequence: 0,
            team_count,
        }
    }

    pub fn team_count(&self) -> usize {
        self.team_count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.records.contains_key(&session)
    }

    pub fn get(&self, session: SessionId) -> Option<&PlayerRecord> {
        self.records.get(&session)
    }

    pub fn get_mut(&mut self, session: SessionId) -> Option<&mut PlayerRecord> {
        self.records.get_mut(&session)
    }

    /// Records in session id order
    pub fn iter(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlayerRecord> {
        self.records.values_mut()
    }

    /// Session ids ordered by seniority
    pub fn join_order(&self) -> Vec<SessionId> {
        let mut ids: Vec<(u64, SessionId)> = self
            .records
            .values()
            .map(|r| (r.join_sequence, r.session_id))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    pub fn host(&self) -> Option<SessionId> {
        self.records
            .values()
            .find(|r| r.is_room_host)
            .map(|r| r.session_id)
    }

    pub fn is_host(&self, session: SessionId) -> bool {
        self.records.get(&session).is_some_and(|r| r.is_room_host)
    }

    /// Non-spectating records
    pub fn valid_players(&self) -> usize {
        self.records.values().filter(|r| !r.is_spectator).count()
    }

    /// Minimum start condition: someone has to actually play
    pub fn is_game_startable(&self) -> bool {
        self.valid_players() > 0
    }

    /// Occupancy of each requested team
    pub fn team_counts(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.team_count];
        for record in self.records.values() {
            if let Some(count) = counts.get_mut(record.requested_team as usize) {
                *count += 1;
            }
        }
        counts
    }

    /// Add a record. Returns None if the session is already present.
    pub fn join(
        &mut self,
        session: SessionId,
        profile: PlayerProfile,
        as_spectator: bool,
    ) -> Option<Joined> {
        if self.records.contains_key(&session) {
            return None;
        }

        // Least-populated team, lowest index on ties
        let counts = self.team_counts();
        let mut team = 0usize;
        for (i, &count) in counts.iter().enumerate().skip(1) {
            if count < counts[team] {
                team = i;
            }
        }

        let became_host = self.records.is_empty();
        let mut record = PlayerRecord::new(session, self.next_join_sequence, profile);
        self.next_join_sequence += 1;
        record.is_spectator = as_spectator;
        record.requested_team = team as u8;
        record.is_room_host = became_host;
        self.records.insert(session, record);

        Some(Joined {
            team: team as u8,
            became_host,
        })
    }

    /// Remove a record, migrating host to the longest-tenured remaining player
    pub fn leave(&mut self, session: SessionId) -> Option<Left> {
        let record = self.records.remove(&session)?;

        let host_change = if record.is_room_host {
            let promoted = self
                .records
                .values_mut()
                .min_by_key(|r| r.join_sequence)
                .map(|r| {
                    r.is_room_host = true;
                    r.session_id
                });
            Some(promoted)
        } else {
            None
        };

        Some(Left {
            record,
            host_change,
        })
    }

    /// Move the host flag. Returns false if the target is unknown or already host.
    pub fn change_host(&mut self, new_host: SessionId) -> bool {
        if !self.records.contains_key(&new_host) || self.is_host(new_host) {
            return false;
        }
        for record in self.records.values_mut() {
            record.is_room_host = record.session_id == new_host;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> PlayerProfile {
        PlayerProfile {
            nickname: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn first_player_becomes_host() {
        let mut roster = Roster::new(2);
        let joined = roster.join(SessionId(5), profile("a"), false).unwrap();
        assert!(joined.became_host);
        let joined = roster.join(SessionId(1), profile("b"), false).unwrap();
        assert!(!joined.became_host);
        assert_eq!(roster.host(), Some(SessionId(5)));
    }

    #[test]
    fn duplicate_join_is_ignored() {
        let mut roster = Roster::new(2);
        assert!(roster.join(SessionId(1), profile("a"), false).is_some());
        assert!(roster.join(SessionId(1), profile("a"), false).is_none());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn two_players_land_on_different_teams() {
        let mut roster = Roster::new(2);
        let a = roster.join(SessionId(1), profile("a"), false).unwrap();
        let b = roster.join(SessionId(2), profile("b"), false).unwrap();
        assert_eq!(a.team, 0);
        assert_eq!(b.team, 1);
        let c = roster.join(SessionId(3), profile("c"), false).unwrap();
        assert_eq!(c.team, 0);
    }

    #[test]
    fn host_migrates_to_longest_tenured() {
        let mut roster = Roster::new(3);
        // Session ids deliberately out of join order
        roster.join(SessionId(9), profile("first"), false);
        roster.join(SessionId(7), profile("second"), false);
        roster.join(SessionId(3), profile("third"), false);

        let left = roster.leave(SessionId(9)).unwrap();
        assert_eq!(left.host_change, Some(Some(SessionId(7))));
        assert_eq!(roster.host(), Some(SessionId(7)));

        let left = roster.leave(SessionId(3)).unwrap();
        assert!(!left.host_changed());
    }

    #[test]
    fn last_leave_leaves_no_host() {
        let mut roster = Roster::new(1);
        roster.join(SessionId(1), profile("a"), false);
        let left = roster.leave(SessionId(1)).unwrap();
        assert_eq!(left.host_change, Some(None));
        assert!(roster.host().is_none());
        assert!(roster.leave(SessionId(1)).is_none());
    }

    #[test]
    fn change_host_moves_the_flag() {
        let mut roster = Roster::new(2);
        roster.join(SessionId(1), profile("a"), false);
        roster.join(SessionId(2), profile("b"), false);
        assert!(roster.change_host(SessionId(2)));
        assert!(!roster.is_host(SessionId(1)));
        assert!(!roster.change_host(SessionId(2)));
        assert!(!roster.change_host(SessionId(42)));
    }

    #[test]
    fn reset_keeps_wins_and_identity() {
        let mut roster = Roster::new(2);
        roster.join(SessionId(1), profile("a"), true);
        let record = roster.get_mut(SessionId(1)).unwrap();
        record.wins = 3;
        record.is_loaded = true;
        record.is_ready = true;
        record.resolved_team = Some(1);
        record.reset_round_flags();
        assert_eq!(record.wins, 3);
        assert_eq!(record.join_sequence, 0);
        assert!(!record.is_loaded && !record.is_ready && !record.is_spectator);
        assert_eq!(record.resolved_team, None);
    }

    #[test]
    fn opted_in_spectator_stays_out_after_reset() {
        let mut roster = Roster::new(2);
        roster.join(SessionId(1), profile("a"), false);
        let record = roster.get_mut(SessionId(1)).unwrap();
        record.manual_spectator = true;
        record.is_spectator = true;
        record.reset_round_flags();
        assert!(record.is_spectator);
        assert!(!roster.is_game_startable());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Join(u32),
            Leave(u32),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![(0u32..12).prop_map(Op::Join), (0u32..12).prop_map(Op::Leave)]
        }

        proptest! {
            #[test]
            fn host_invariant_holds(ops in proptest::collection::vec(op(), 0..64)) {
                let mut roster = Roster::new(4);
                for op in ops {
                    match op {
                        Op::Join(id) => {
                            roster.join(SessionId(id), PlayerProfile::default(), false);
                        }
                        Op::Leave(id) => {
                            let senior = roster
                                .iter()
                                .filter(|r| r.session_id != SessionId(id))
                                .min_by_key(|r| r.join_sequence)
                                .map(|r| r.session_id);
                            let was_host = roster.is_host(SessionId(id));
                            if let Some(left) = roster.leave(SessionId(id)) {
                                if was_host {
                                    prop_assert_eq!(left.host_change, Some(senior));
                                }
                            }
                        }
                    }
                    let hosts = roster.iter().filter(|r| r.is_room_host).count();
                    if roster.is_empty() {
                        prop_assert_eq!(hosts, 0);
                    } else {
                        prop_assert_eq!(hosts, 1);
                    }
                }
            }

            #[test]
            fn new_player_joins_least_populated_team(joins in 1usize..20, teams in 1usize..6) {
                let mut roster = Roster::new(teams);
                for id in 0..joins {
                    let before = roster.team_counts();
                    let min = *before.iter().min().unwrap();
                    let expected = before.iter().position(|&c| c == min).unwrap();
                    let joined = roster.join(SessionId(id as u32), PlayerProfile::default(), false).unwrap();
                    prop_assert_eq!(joined.team as usize, expected);
                }
            }
        }
    }
}
