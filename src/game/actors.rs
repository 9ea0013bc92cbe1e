//! Actor store - playable characters spawned for a round
//!
//! Actors reference their owner by session id only. The owning record may
//! leave while the actor stays around (flagged disconnected) until the round
//! is torn down.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ActorId, SessionId};

/// A spawned playable character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub owner: SessionId,
    pub character: u8,
    pub team: u8,
    pub stars: u8,
    pub lives: u8,
    pub disconnected: bool,
    pub spawnpoint: Option<u8>,
}

impl Actor {
    /// Still competing for the round
    pub fn is_alive(&self, lives_enabled: bool) -> bool {
        !self.disconnected && !(lives_enabled && self.lives == 0)
    }
}

/// Arena of actors keyed by stable id. Iteration follows spawn order.
#[derive(Debug, Clone, Default)]
pub struct ActorStore {
    actors: BTreeMap<ActorId, Actor>,
    next_id: u32,
}

impl ActorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, owner: SessionId, character: u8, team: u8, lives: u8) -> ActorId {
        let id = ActorId(self.next_id);
        self.next_id += 1;
        self.actors.insert(
            id,
            Actor {
                id,
                owner,
                character,
                team,
                stars: 0,
                lives,
                disconnected: false,
                spawnpoint: None,
            },
        );
        id
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    pub fn by_owner(&self, owner: SessionId) -> Option<&Actor> {
        self.actors.values().find(|a| a.owner == owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Actor> {
        self.actors.values_mut()
    }

    pub fn ids(&self) -> Vec<ActorId> {
        self.actors.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn despawn(&mut self, id: ActorId) -> Option<Actor> {
        self.actors.remove(&id)
    }

    /// Destroy every actor. Ids are not reused.
    pub fn clear(&mut self) {
        self.actors.clear();
    }

    /// Flag the actor owned by `owner` as disconnected. Returns its id.
    pub fn mark_disconnected(&mut self, owner: SessionId) -> Option<ActorId> {
        let actor = self.actors.values_mut().find(|a| a.owner == owner)?;
        actor.disconnected = true;
        Some(actor.id)
    }

    /// Star totals per team, connected actors only
    pub fn team_stars(&self, team_count: usize) -> Vec<u32> {
        let mut stars = vec![0u32; team_count];
        for actor in self.actors.values().filter(|a| !a.disconnected) {
            if let Some(total) = stars.get_mut(actor.team as usize) {
                *total += actor.stars as u32;
            }
        }
        stars
    }

    /// Team with strictly the most stars, and that star count. Ties yield no team.
    pub fn winning_team(&self, team_count: usize) -> (Option<u8>, u32) {
        let stars = self.team_stars(team_count);
        let mut best: Option<u8> = None;
        let mut best_stars = 0u32;
        let mut tied = false;
        for (team, &count) in stars.iter().enumerate() {
            match best {
                Some(_) if count == best_stars => tied = true,
                Some(_) if count < best_stars => {}
                _ => {
                    best = Some(team as u8);
                    best_stars = count;
                    tied = false;
                }
            }
        }
        if tied {
            (None, best_stars)
        } else {
            (best, best_stars)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_never_reused() {
        let mut store = ActorStore::new();
        let a = store.spawn(SessionId(1), 0, 0, 0);
        store.clear();
        let b = store.spawn(SessionId(1), 0, 0, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn winning_team_requires_strict_lead() {
        let mut store = ActorStore::new();
        let a = store.spawn(SessionId(1), 0, 0, 0);
        let b = store.spawn(SessionId(2), 0, 1, 0);
        assert_eq!(store.winning_team(2).0, None);

        store.get_mut(a).unwrap().stars = 3;
        store.get_mut(b).unwrap().stars = 3;
        assert_eq!(store.winning_team(2), (None, 3));

        store.get_mut(b).unwrap().stars = 4;
        assert_eq!(store.winning_team(2), (Some(1), 4));
    }

    #[test]
    fn disconnected_actors_do_not_score() {
        let mut store = ActorStore::new();
        let a = store.spawn(SessionId(1), 0, 0, 0);
        store.spawn(SessionId(2), 0, 1, 0);
        store.get_mut(a).unwrap().stars = 5;
        store.mark_disconnected(SessionId(1));
        assert_eq!(store.team_stars(2), vec![0, 0]);
    }

    #[test]
    fn out_of_lives_only_counts_in_lives_games() {
        let mut store = ActorStore::new();
        let a = store.spawn(SessionId(1), 0, 0, 0);
        let actor = store.get(a).unwrap();
        assert!(actor.is_alive(false));
        assert!(!actor.is_alive(true));
    }
}
