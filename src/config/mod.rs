//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

use crate::game::snapshot::MAX_PLAYERS;
use crate::game::{RuleChange, Rules, SimulationConfig};
use crate::util::rate_limit::COMMAND_RATE_LIMIT;
use crate::util::time::DEFAULT_TICK_RATE;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON objects instead of text
    pub log_json: bool,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Roster snapshot capacity per room
    pub max_players: usize,
    pub team_count: usize,
    pub character_count: u8,
    /// false = editor/practice boot
    pub real_game: bool,

    /// Commands per second accepted from one session
    pub command_rate_limit: u32,

    /// Rules every new room starts with
    pub default_rules: Rules,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tick_rate: u32 = parse_or(&lookup, "TICK_RATE", DEFAULT_TICK_RATE)?;
        if tick_rate == 0 {
            return Err(ConfigError::InvalidTickRate);
        }

        let max_players: usize = parse_or(&lookup, "MAX_PLAYERS", MAX_PLAYERS)?;
        if max_players == 0 || max_players > MAX_PLAYERS {
            return Err(ConfigError::InvalidPlayerCount(max_players));
        }

        let team_count: usize = parse_or(&lookup, "TEAM_COUNT", 5)?;
        if team_count == 0 || team_count > MAX_PLAYERS {
            return Err(ConfigError::InvalidTeamCount(team_count));
        }

        let defaults = Rules::default();
        let mut rules = defaults;
        rules.apply(RuleChange::Stage(parse_or(&lookup, "STAGE", defaults.stage)?));
        rules.apply(RuleChange::StarsToWin(parse_or(
            &lookup,
            "STARS_TO_WIN",
            defaults.stars_to_win,
        )?));
        rules.apply(RuleChange::CoinsForPowerup(parse_or(
            &lookup,
            "COINS_FOR_POWERUP",
            defaults.coins_for_powerup,
        )?));
        rules.apply(RuleChange::Lives(parse_or(&lookup, "LIVES", defaults.lives)?));
        rules.apply(RuleChange::TimerSeconds(parse_or(
            &lookup,
            "TIMER_SECONDS",
            defaults.timer_seconds,
        )?));
        rules.apply(RuleChange::CustomPowerupsEnabled(bool_or(
            &lookup,
            "CUSTOM_POWERUPS",
            defaults.custom_powerups_enabled,
        )?));
        rules.apply(RuleChange::TeamsEnabled(bool_or(
            &lookup,
            "TEAMS_ENABLED",
            defaults.teams_enabled,
        )?));
        rules.apply(RuleChange::DrawOnTimeUp(bool_or(
            &lookup,
            "DRAW_ON_TIME_UP",
            defaults.draw_on_time_up,
        )?));

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            tick_rate,
            max_players,
            team_count,
            character_count: parse_or(&lookup, "CHARACTER_COUNT", 2)?,
            real_game: bool_or(&lookup, "REAL_GAME", true)?,
            command_rate_limit: parse_or(&lookup, "COMMAND_RATE_LIMIT", COMMAND_RATE_LIMIT)?,
            default_rules: rules,
        })
    }

    /// Per-room simulation settings
    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            tick_rate: self.tick_rate,
            max_players: self.max_players,
            team_count: self.team_count,
            character_count: self.character_count,
            real_game: self.real_game,
            default_rules: self.default_rules,
        }
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

fn bool_or<F>(lookup: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

/// Accepts true/false, 1/0, yes/no, on/off
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("TEAM_COUNT must be between 1 and 10, got {0}")]
    InvalidTeamCount(usize),

    #[error("MAX_PLAYERS must be between 1 and 10, got {0}")]
    InvalidPlayerCount(usize),

    #[error("TICK_RATE must be greater than zero")]
    InvalidTickRate,
}
