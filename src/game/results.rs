//! Round results and live standings

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::r#match::Simulation;
use super::{ActorId, SessionId};

/// One line of the results screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub session_id: SessionId,
    pub nickname: String,
    pub nickname_color: String,
    pub character: u8,
    pub team: u8,
    pub stars: u8,
    pub disconnected: bool,
    pub disqualified: bool,
    /// Competition rank of the player's team; None when the round was a draw
    pub team_rank: Option<u32>,
}

/// Tabulated results of a finished round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResults {
    /// 1-based round number
    pub round: u32,
    pub winning_team: Option<u8>,
    pub entries: Vec<ResultEntry>,
}

/// Competition ranking ("1224") of teams by star count, indexed by team
pub fn team_rankings(team_stars: &[u32]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..team_stars.len()).collect();
    order.sort_by(|a, b| team_stars[*b].cmp(&team_stars[*a]));

    let mut ranks = vec![0u32; team_stars.len()];
    for (pos, &team) in order.iter().enumerate() {
        ranks[team] = match pos.checked_sub(1).map(|prev| order[prev]) {
            Some(prev) if team_stars[prev] == team_stars[team] => ranks[prev],
            _ => pos as u32 + 1,
        };
    }
    ranks
}

/// Build the results from the round's roster snapshot, most stars first
pub fn tabulate(sim: &Simulation) -> RoundResults {
    let state = sim.state();
    let team_stars = sim.actors().team_stars(sim.config().team_slots());
    let ranks = state.has_winner.then(|| team_rankings(&team_stars));

    let mut entries: Vec<ResultEntry> = state
        .roster_snapshot
        .iter()
        .map(|e| ResultEntry {
            session_id: e.session_id,
            nickname: e.nickname.clone(),
            nickname_color: e.nickname_color.clone(),
            character: e.character,
            team: e.team,
            stars: sim.actors().by_owner(e.session_id).map_or(0, |a| a.stars),
            disconnected: e.disconnected,
            disqualified: e.disqualified,
            team_rank: ranks
                .as_ref()
                .and_then(|r| r.get(e.team as usize).copied()),
        })
        .collect();
    entries.sort_by(|a, b| b.stars.cmp(&a.stars));

    RoundResults {
        round: state.total_rounds_played + 1,
        winning_team: state.winner(),
        entries,
    }
}

/// Live scoreboard order of actors
pub fn standings(sim: &Simulation) -> Vec<ActorId> {
    let lives_game = sim.state().rules.is_lives_enabled();
    let seniority = |owner: SessionId| {
        sim.roster()
            .get(owner)
            .map_or(u64::MAX, |r| r.join_sequence)
    };

    let mut actors: Vec<_> = sim.actors().iter().collect();
    actors.sort_by(|a, b| {
        if lives_game && ((a.lives == 0) != (b.lives == 0)) {
            return b.lives.cmp(&a.lives);
        }
        match b.stars.cmp(&a.stars) {
            Ordering::Equal => seniority(a.owner).cmp(&seniority(b.owner)),
            other => other,
        }
    });
    actors.into_iter().map(|a| a.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_share_a_rank() {
        assert_eq!(team_rankings(&[3, 5, 5, 1]), vec![3, 1, 1, 4]);
        assert_eq!(team_rankings(&[0, 0]), vec![1, 1]);
        assert!(team_rankings(&[]).is_empty());
    }
}
