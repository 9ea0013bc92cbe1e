//! Round setup and teardown: spawning at load completion, reset on return to the room

use rand::Rng;
use tracing::{debug, info};

use crate::util::fixed::Fixed;

use super::events::{Effect, Event, SpawnRequest};
use super::r#match::Simulation;
use super::snapshot::RosterEntry;

/// Spawn point indices `0..count` in draw order, sampled without replacement
pub fn spawn_permutation<R: Rng>(rng: &mut R, count: usize) -> Vec<u8> {
    let mut remaining: Vec<u8> = (0..count).map(|i| i as u8).collect();
    let mut drawn = Vec::with_capacity(count);
    while !remaining.is_empty() {
        let index = rng.gen_range(0..remaining.len());
        drawn.push(remaining.remove(index));
    }
    drawn
}

impl Simulation {
    /// Spawn an actor for every loaded, playing record and capture the roster snapshot
    pub(super) fn loading_complete(&mut self) {
        let rules = self.state.rules;
        let max_character = self.config.character_count.saturating_sub(1);
        let mut solo_team: u8 = 0;

        for session in self.roster.join_order() {
            let Some(record) = self.roster.get_mut(session) else {
                continue;
            };

            if !record.is_loaded {
                // Didn't load in time
                if !record.is_spectator {
                    record.is_spectator = true;
                    self.outbox.event(Event::PlayerDataChanged { session });
                    debug!(session = %session, "Player missed the load deadline");
                }
                continue;
            }
            if record.is_spectator {
                continue;
            }

            let character = record.profile.character.min(max_character);
            let team = if rules.teams_enabled {
                record.requested_team
            } else {
                let team = solo_team;
                solo_team += 1;
                team
            };
            record.resolved_team = Some(team);

            // Kept for results in case this player disconnects
            let entry = RosterEntry {
                session_id: session,
                nickname: record.profile.nickname.clone(),
                nickname_color: record.profile.nickname_color.clone(),
                character,
                team,
                disconnected: false,
                disqualified: false,
            };
            if self.state.roster_snapshot.push(entry) {
                self.actors.spawn(session, character, team, rules.lives);
            }
        }

        self.assign_spawnpoints();
    }

    fn assign_spawnpoints(&mut self) {
        let ids = self.actors.ids();
        let total_spawns = ids.len() as u8;
        let spawnpoints = spawn_permutation(&mut self.rng, ids.len());

        for (id, spawnpoint) in ids.into_iter().zip(spawnpoints) {
            let Some(actor) = self.actors.get_mut(id) else {
                continue;
            };
            actor.spawnpoint = Some(spawnpoint);
            self.outbox.effect(Effect::SpawnActor(SpawnRequest {
                actor: id,
                owner: actor.owner,
                character: actor.character,
                team: actor.team,
                spawnpoint,
                total_spawns,
            }));
        }

        info!(actors = total_spawns, "Actors spawned");
    }

    /// Tear the round down, keeping only the roster
    pub(super) fn return_to_room(&mut self) {
        self.actors.clear();
        self.outbox.effect(Effect::DestroyAllNonRosterEntities);

        self.state.match_timer = Fixed::ZERO;
        self.state.roster_snapshot.clear();
        self.state.winning_team = 0;
        self.state.has_winner = false;
        self.state.real_players = 0;
        self.state.start_tick = None;

        for record in self.roster.iter_mut() {
            record.reset_round_flags();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn permutation_is_seed_stable() {
        let a = spawn_permutation(&mut ChaCha8Rng::seed_from_u64(42), 8);
        let b = spawn_permutation(&mut ChaCha8Rng::seed_from_u64(42), 8);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_permutation() {
        assert!(spawn_permutation(&mut ChaCha8Rng::seed_from_u64(0), 0).is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_spawnpoint_used_once(seed in any::<u64>(), count in 0usize..=10) {
                let mut drawn = spawn_permutation(&mut ChaCha8Rng::seed_from_u64(seed), count);
                drawn.sort_unstable();
                let expected: Vec<u8> = (0..count as u8).collect();
                prop_assert_eq!(drawn, expected);
            }
        }
    }
}
