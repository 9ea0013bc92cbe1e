//! Match lifecycle state machine (deterministic, tick-driven)
//!
//! One [`Simulation`] per room. It is advanced only by [`Simulation::tick`],
//! the join/leave hooks and gameplay signals, and reads no clocks. Every loop
//! that can influence an outcome walks the roster in session id or join
//! order so replays reproduce the same result.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::util::fixed::Fixed;
use crate::util::time::{decrement, tick_delta, ticks_for_secs, DEFAULT_TICK_RATE};

use super::actors::ActorStore;
use super::events::{Effect, Event, Outbox, TickOutput};
use super::roster::Roster;
use super::rules::{Rules, StageId};
use super::snapshot::{RosterSnapshot, MAX_PLAYERS};
use super::{Command, PlayerProfile, SessionId, Signal};

/// Pre-game countdown length
pub const COUNTDOWN_SECS: u32 = 3;
/// How long stragglers get to finish loading
pub const LOAD_DEADLINE_SECS: u32 = 20;
/// Delay between loading complete and play
pub const START_DELAY_SECS: u32 = 6;
/// Results screen duration before returning to the room
pub const END_DELAY_SECS: u32 = 21;

// Cue offsets, in ticks at the reference rate of 60
const ROUND_ACTIVE_TICKS_AT_60: u32 = 78;
const END_FADE_TICKS_AT_60: u32 = 30;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Lobby; rules editable, countdown may run
    PreRoom,
    /// Stage selected, waiting for clients to load
    WaitingForPlayers,
    /// Actors spawned, start delay running
    Starting,
    /// Round in progress
    Playing,
    /// Results shown, counting down to the lobby
    Ended,
}

/// Static configuration of a simulation
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub tick_rate: u32,
    pub max_players: usize,
    pub team_count: usize,
    pub character_count: u8,
    /// false = editor/practice boot: skip the lobby and start as soon as anyone is present
    pub real_game: bool,
    pub default_rules: Rules,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_players: MAX_PLAYERS,
            team_count: 5,
            character_count: 2,
            real_game: true,
            default_rules: Rules::default(),
        }
    }
}

impl SimulationConfig {
    pub fn countdown_ticks(&self) -> u32 {
        ticks_for_secs(COUNTDOWN_SECS, self.tick_rate)
    }

    pub fn load_deadline_ticks(&self) -> u32 {
        ticks_for_secs(LOAD_DEADLINE_SECS, self.tick_rate)
    }

    pub fn start_delay_ticks(&self) -> u32 {
        ticks_for_secs(START_DELAY_SECS, self.tick_rate)
    }

    pub fn end_delay_ticks(&self) -> u32 {
        ticks_for_secs(END_DELAY_SECS, self.tick_rate)
    }

    /// Remaining start-delay ticks at which round subsystems come on
    pub fn round_active_tick(&self) -> u32 {
        (ROUND_ACTIVE_TICKS_AT_60 * self.tick_rate / 60).max(1)
    }

    /// Remaining start-delay ticks at which recording starts (one tick before round-active)
    pub fn recording_tick(&self) -> u32 {
        self.round_active_tick() + 1
    }

    /// Remaining end-delay ticks at which the fade out starts
    pub fn end_fade_tick(&self) -> u32 {
        (END_FADE_TICKS_AT_60 * self.tick_rate / 60).max(1)
    }

    /// Width of per-team tallies; solo rounds number teams by player
    pub fn team_slots(&self) -> usize {
        self.team_count.max(MAX_PLAYERS)
    }
}

/// Match state (owned by the simulation)
#[derive(Debug, Clone)]
pub struct MatchState {
    pub phase: MatchPhase,
    /// Tick countdown; meaning depends on phase
    pub phase_timer: u32,
    /// Seconds left in the round when the timer rule is on
    pub match_timer: Fixed,
    pub rules: Rules,
    pub roster_snapshot: RosterSnapshot,
    pub winning_team: u8,
    pub has_winner: bool,
    pub total_rounds_played: u32,
    /// Players that loaded in time this round
    pub real_players: usize,
    pub start_tick: Option<u64>,
    pub active_stage: Option<StageId>,
    pub round_systems_enabled: bool,
}

impl MatchState {
    fn new(config: &SimulationConfig) -> Self {
        Self {
            phase: MatchPhase::PreRoom,
            phase_timer: 0,
            match_timer: Fixed::ZERO,
            rules: config.default_rules,
            roster_snapshot: RosterSnapshot::new(config.max_players),
            winning_team: 0,
            has_winner: false,
            total_rounds_played: 0,
            real_players: 0,
            start_tick: None,
            active_stage: None,
            round_systems_enabled: false,
        }
    }

    /// Pre-game countdown in progress
    pub fn is_countdown_running(&self) -> bool {
        self.phase == MatchPhase::PreRoom && self.phase_timer > 0
    }

    pub fn winner(&self) -> Option<u8> {
        self.has_winner.then_some(self.winning_team)
    }
}

/// The deterministic match simulation
pub struct Simulation {
    pub(super) config: SimulationConfig,
    pub(super) state: MatchState,
    pub(super) roster: Roster,
    pub(super) actors: ActorStore,
    pub(super) rng: ChaCha8Rng,
    pub(super) tick: u64,
    pub(super) outbox: Outbox,
}

impl Simulation {
    /// Create a simulation. Equal seeds and inputs replay identically.
    pub fn new(config: SimulationConfig, seed: u64) -> Self {
        let mut sim = Self {
            state: MatchState::new(&config),
            roster: Roster::new(config.team_count),
            actors: ActorStore::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            outbox: Outbox::default(),
            config,
        };

        if sim.config.real_game {
            sim.outbox.event(Event::GameStateChanged {
                phase: MatchPhase::PreRoom,
            });
        } else {
            // Editor boot: go straight to loading
            sim.state.phase = MatchPhase::WaitingForPlayers;
            sim.state.phase_timer = sim.config.load_deadline_ticks();
        }

        sim
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn actors(&self) -> &ActorStore {
        &self.actors
    }

    /// Gameplay systems update stars and lives through this, then raise a [`Signal`]
    pub fn actors_mut(&mut self) -> &mut ActorStore {
        &mut self.actors
    }

    pub fn tick_number(&self) -> u64 {
        self.tick
    }

    /// Drain everything emitted since the last drain
    pub fn take_output(&mut self) -> TickOutput {
        self.outbox.take()
    }

    /// Advance one tick: commands first (canonical session order), then the phase
    pub fn tick(&mut self, commands: &[(SessionId, Command)]) -> TickOutput {
        self.tick += 1;

        let mut ordered: Vec<&(SessionId, Command)> = commands.iter().collect();
        ordered.sort_by_key(|(session, _)| *session);
        for (session, command) in ordered {
            self.execute_command(*session, *command);
        }

        self.advance_phase();
        self.outbox.take()
    }

    /// Session joined the room
    pub fn player_added(&mut self, session: SessionId, profile: PlayerProfile) {
        // Late joiners watch the running round
        let as_spectator = self.state.phase != MatchPhase::PreRoom;
        let Some(joined) = self.roster.join(session, profile, as_spectator) else {
            debug!(session = %session, "Duplicate join ignored");
            return;
        };

        if joined.became_host {
            self.outbox.event(Event::HostChanged { host: session });
        }
        self.outbox.event(Event::PlayerAdded { session });
        self.outbox.event(Event::PlayerDataChanged { session });

        info!(
            session = %session,
            team = joined.team,
            spectator = as_spectator,
            players = self.roster.len(),
            "Player joined room"
        );
    }

    /// Session left the room
    pub fn player_removed(&mut self, session: SessionId) {
        let in_round = matches!(self.state.phase, MatchPhase::Starting | MatchPhase::Playing);
        self.state
            .roster_snapshot
            .mark_disconnected(session, in_round);

        let Some(left) = self.roster.leave(session) else {
            debug!(session = %session, "Leave for unknown session ignored");
            return;
        };

        if let Some(Some(host)) = left.host_change {
            info!(session = %session, new_host = %host, "Host migrated");
            self.outbox.event(Event::HostChanged { host });
        }
        self.outbox.event(Event::PlayerRemoved { session });

        info!(session = %session, players = self.roster.len(), "Player left room");

        match self.state.phase {
            MatchPhase::PreRoom => {
                if self.state.phase_timer > 0
                    && (left.host_changed() || !self.roster.is_game_startable())
                {
                    self.stop_countdown();
                }
            }
            MatchPhase::Starting | MatchPhase::Playing => {
                self.actors.mark_disconnected(session);
                if self.state.phase == MatchPhase::Playing {
                    self.check_for_game_end();
                }
            }
            _ => {}
        }
    }

    /// Handle a gameplay signal
    pub fn apply_signal(&mut self, signal: Signal) {
        match signal {
            Signal::PlayerDied { actor } | Signal::PlayerCollectedStar { actor } => {
                if self.actors.get(actor).is_none() {
                    debug!(actor = actor.0, "Signal for unknown actor");
                }
                self.check_for_game_end();
            }
            Signal::ActorRemoved { actor } => {
                if let Some(removed) = self.actors.despawn(actor) {
                    self.state.roster_snapshot.mark_disqualified(removed.owner);
                }
            }
        }
    }

    fn execute_command(&mut self, session: SessionId, command: Command) {
        let Some(record) = self.roster.get(session) else {
            debug!(session = %session, ?command, "Command from unknown session ignored");
            return;
        };
        if command.is_host_only() && !record.is_room_host {
            debug!(session = %session, ?command, "Host command from non-host ignored");
            return;
        }

        let phase = self.state.phase;
        match command {
            Command::ToggleCountdown => {
                if phase != MatchPhase::PreRoom {
                    return;
                }
                if self.state.phase_timer > 0 {
                    self.stop_countdown();
                } else if self.roster.is_game_startable() {
                    self.state.phase_timer = self.config.countdown_ticks();
                    self.outbox
                        .event(Event::StartingCountdownChanged { started: true });
                    info!(session = %session, "Countdown started");
                }
            }
            Command::ToggleReady => {
                if phase != MatchPhase::PreRoom {
                    return;
                }
                if let Some(record) = self.roster.get_mut(session) {
                    record.is_ready = !record.is_ready;
                    self.outbox.event(Event::PlayerDataChanged { session });
                }
            }
            Command::ChangeRules { change } => {
                if phase != MatchPhase::PreRoom || self.state.phase_timer > 0 {
                    return;
                }
                if self.state.rules.apply(change) {
                    debug!(?change, "Rules changed");
                    self.outbox.event(Event::RulesChanged {
                        rules: self.state.rules,
                    });
                }
            }
            Command::HostEndGame => {
                if phase == MatchPhase::Playing {
                    info!(session = %session, "Host ended the round");
                    self.end_game(None);
                }
            }
            Command::KickPlayer { target } => {
                if target != session && self.roster.contains(target) {
                    info!(session = %session, target = %target, "Player kicked");
                    self.outbox.event(Event::PlayerKicked { session: target });
                }
            }
            Command::ChangeHost { new_host } => {
                if self.roster.change_host(new_host) {
                    info!(old_host = %session, new_host = %new_host, "Host changed");
                    self.outbox.event(Event::HostChanged { host: new_host });
                    if self.state.is_countdown_running() {
                        self.stop_countdown();
                    }
                }
            }
            Command::ToggleSpectate => {
                if phase != MatchPhase::PreRoom {
                    return;
                }
                if let Some(record) = self.roster.get_mut(session) {
                    record.manual_spectator = !record.manual_spectator;
                    record.is_spectator = record.manual_spectator;
                    self.outbox.event(Event::PlayerDataChanged { session });
                }
                if self.state.phase_timer > 0 && !self.roster.is_game_startable() {
                    self.stop_countdown();
                }
            }
            Command::ChangeTeam { team } => {
                if phase != MatchPhase::PreRoom || team as usize >= self.roster.team_count() {
                    return;
                }
                if let Some(record) = self.roster.get_mut(session) {
                    record.requested_team = team;
                    self.outbox.event(Event::PlayerDataChanged { session });
                }
            }
            Command::ChangePlayerData { character, palette } => {
                if phase != MatchPhase::PreRoom {
                    return;
                }
                if let Some(record) = self.roster.get_mut(session) {
                    record.profile.character = character;
                    record.profile.palette = palette;
                    self.outbox.event(Event::PlayerDataChanged { session });
                }
            }
            Command::MarkLoaded => {
                if phase != MatchPhase::WaitingForPlayers {
                    return;
                }
                if let Some(record) = self.roster.get_mut(session) {
                    if !record.is_loaded {
                        record.is_loaded = true;
                        self.outbox.event(Event::PlayerDataChanged { session });
                    }
                }
            }
        }
    }

    fn advance_phase(&mut self) {
        match self.state.phase {
            MatchPhase::PreRoom => {
                if self.state.phase_timer == 0 {
                    return;
                }
                if decrement(&mut self.state.phase_timer) {
                    // Start the game!
                    self.state.active_stage = Some(self.state.rules.stage);
                    for record in self.roster.iter_mut() {
                        record.is_spectator = record.manual_spectator;
                    }
                    self.state.phase_timer = self.config.load_deadline_ticks();
                    self.set_phase(MatchPhase::WaitingForPlayers);
                } else if self.state.phase_timer % self.config.tick_rate == 0 {
                    self.outbox.event(Event::CountdownTick {
                        seconds_remaining: self.state.phase_timer / self.config.tick_rate,
                    });
                }
            }
            MatchPhase::WaitingForPlayers => {
                let real_game = self.config.real_game;
                let mut valid_players = 0usize;
                let mut loaded_players = 0usize;
                for record in self.roster.iter_mut() {
                    if !real_game {
                        record.is_loaded = true;
                        record.is_spectator = false;
                    }
                    if !record.is_spectator {
                        valid_players += 1;
                        if record.is_loaded {
                            loaded_players += 1;
                        }
                    }
                }
                self.state.real_players = valid_players;

                if valid_players == 0 {
                    return;
                }

                let expired = decrement(&mut self.state.phase_timer);
                if expired || !real_game || valid_players == loaded_players {
                    self.state.real_players = loaded_players;
                    self.state.phase_timer = self.config.start_delay_ticks();
                    self.state.match_timer =
                        Fixed::from_int(self.state.rules.timer_seconds as i64);

                    info!(
                        loaded = loaded_players,
                        valid = valid_players,
                        deadline_expired = expired,
                        timer = %self.state.match_timer,
                        "Loading complete"
                    );
                    self.loading_complete();
                    self.set_phase(MatchPhase::Starting);
                }
            }
            MatchPhase::Starting => {
                if decrement(&mut self.state.phase_timer) {
                    self.state.start_tick = Some(self.tick);
                    self.set_phase(MatchPhase::Playing);
                } else if self.state.phase_timer == self.config.recording_tick() {
                    self.outbox.event(Event::RecordingStarted);
                }
                if self.state.phase_timer == self.config.round_active_tick() {
                    self.set_round_systems(true);
                    self.outbox.event(Event::GameStarted);
                }
            }
            MatchPhase::Playing => {
                if self.state.rules.is_timer_enabled() && self.state.match_timer.is_positive() {
                    self.state.match_timer -= tick_delta(self.config.tick_rate);
                    if !self.state.match_timer.is_positive() {
                        self.state.match_timer = Fixed::ZERO;
                        self.check_for_game_end();
                        self.outbox.event(Event::TimerExpired);
                    }
                }
            }
            MatchPhase::Ended => {
                decrement(&mut self.state.phase_timer);
                if self.state.phase_timer == self.config.end_fade_tick() {
                    self.outbox.event(Event::StartGameEndFade);
                }
                if self.state.phase_timer == 0 {
                    // Back to the lobby
                    self.state.total_rounds_played += 1;
                    self.state.active_stage = None;
                    self.set_round_systems(true);
                    self.return_to_room();
                    self.set_phase(MatchPhase::PreRoom);
                    self.set_round_systems(false);
                }
            }
        }
    }

    /// Evaluate the end conditions. Only meaningful while playing.
    pub fn check_for_game_end(&mut self) {
        if self.state.phase != MatchPhase::Playing {
            return;
        }

        let rules = self.state.rules;
        let lives_game = rules.is_lives_enabled();

        // End condition: one or no team left standing
        let alive_teams: BTreeSet<u8> = self
            .actors
            .iter()
            .filter(|a| a.is_alive(lives_game))
            .map(|a| a.team)
            .collect();
        let mut alive = alive_teams.iter();
        match (alive.next(), alive.next()) {
            (None, _) => {
                self.end_game(None);
                return;
            }
            // No insta-win when playing alone
            (Some(&team), None) if self.state.real_players > 1 => {
                self.end_game(Some(team));
                return;
            }
            _ => {}
        }

        // End condition: star threshold
        let (leader, stars) = self.actors.winning_team(self.config.team_slots());
        if let Some(team) = leader {
            if stars >= rules.stars_to_win as u32 {
                self.end_game(Some(team));
                return;
            }
        }

        // End condition: time up
        if rules.is_timer_enabled() && !self.state.match_timer.is_positive() {
            if rules.draw_on_time_up {
                self.end_game(None);
            } else if let Some(team) = leader {
                self.end_game(Some(team));
            }
        }
    }

    /// Finish the round. No-op unless playing.
    pub fn end_game(&mut self, winning_team: Option<u8>) {
        if self.state.phase != MatchPhase::Playing {
            return;
        }

        self.state.winning_team = winning_team.unwrap_or(0);
        self.state.has_winner = winning_team.is_some();
        self.outbox.event(Event::GameEnded {
            winning_team: self.state.winning_team,
            has_winner: self.state.has_winner,
        });

        for record in self.roster.iter_mut() {
            if winning_team.is_some() && record.resolved_team == winning_team && !record.is_spectator
            {
                record.wins += 1;
                self.outbox.event(Event::PlayerDataChanged {
                    session: record.session_id,
                });
            }
            record.is_spectator = record.manual_spectator;
        }

        info!(
            winning_team = ?winning_team,
            round = self.state.total_rounds_played + 1,
            "Round ended"
        );

        self.state.phase_timer = self.config.end_delay_ticks();
        self.set_phase(MatchPhase::Ended);
        self.set_round_systems(false);
    }

    fn stop_countdown(&mut self) {
        self.state.phase_timer = 0;
        self.outbox
            .event(Event::StartingCountdownChanged { started: false });
        info!("Countdown cancelled");
    }

    fn set_phase(&mut self, phase: MatchPhase) {
        debug!(from = ?self.state.phase, to = ?phase, tick = self.tick, "Phase change");
        self.state.phase = phase;
        self.outbox.event(Event::GameStateChanged { phase });
    }

    fn set_round_systems(&mut self, enabled: bool) {
        self.state.round_systems_enabled = enabled;
        self.outbox.effect(if enabled {
            Effect::EnableRoundSubsystems
        } else {
            Effect::DisableRoundSubsystems
        });
    }
}
