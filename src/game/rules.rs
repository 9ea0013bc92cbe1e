//! Room rules - the per-round configuration snapshot

use serde::{Deserialize, Serialize};

/// Stage identifier (resolved to a map asset by the presentation layer)
pub type StageId = u16;

/// Rules for a round. Editable by the host only while in the pre-game room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    pub stage: StageId,
    pub stars_to_win: u8,
    pub coins_for_powerup: u8,
    /// 0 = lives disabled
    pub lives: u8,
    /// 0 = timer disabled
    pub timer_seconds: u32,
    pub custom_powerups_enabled: bool,
    pub teams_enabled: bool,
    pub draw_on_time_up: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            stage: 0,
            stars_to_win: 10,
            coins_for_powerup: 8,
            lives: 0,
            timer_seconds: 0,
            custom_powerups_enabled: true,
            teams_enabled: false,
            draw_on_time_up: false,
        }
    }
}

impl Rules {
    pub const MAX_STARS_TO_WIN: u8 = 25;
    pub const MAX_COINS_FOR_POWERUP: u8 = 25;
    pub const MAX_LIVES: u8 = 25;
    pub const MAX_TIMER_SECONDS: u32 = 99 * 60;

    pub fn is_lives_enabled(&self) -> bool {
        self.lives > 0
    }

    pub fn is_timer_enabled(&self) -> bool {
        self.timer_seconds > 0
    }

    /// Apply a host rule change. Returns true if any value changed.
    pub fn apply(&mut self, change: RuleChange) -> bool {
        let before = *self;
        match change {
            RuleChange::Stage(stage) => self.stage = stage,
            RuleChange::StarsToWin(v) => self.stars_to_win = v.clamp(1, Self::MAX_STARS_TO_WIN),
            RuleChange::CoinsForPowerup(v) => {
                self.coins_for_powerup = v.clamp(1, Self::MAX_COINS_FOR_POWERUP)
            }
            RuleChange::Lives(v) => self.lives = v.min(Self::MAX_LIVES),
            RuleChange::TimerSeconds(v) => self.timer_seconds = v.min(Self::MAX_TIMER_SECONDS),
            RuleChange::CustomPowerupsEnabled(v) => self.custom_powerups_enabled = v,
            RuleChange::TeamsEnabled(v) => self.teams_enabled = v,
            RuleChange::DrawOnTimeUp(v) => self.draw_on_time_up = v,
        }
        before != *self
    }
}

/// A single host rule edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum RuleChange {
    Stage(StageId),
    StarsToWin(u8),
    CoinsForPowerup(u8),
    Lives(u8),
    TimerSeconds(u32),
    CustomPowerupsEnabled(bool),
    TeamsEnabled(bool),
    DrawOnTimeUp(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_rules_are_clamped() {
        let mut rules = Rules::default();
        assert!(rules.apply(RuleChange::StarsToWin(0)));
        assert_eq!(rules.stars_to_win, 1);
        assert!(rules.apply(RuleChange::Lives(200)));
        assert_eq!(rules.lives, Rules::MAX_LIVES);
        assert!(rules.is_lives_enabled());
    }

    #[test]
    fn unchanged_value_reports_no_change() {
        let mut rules = Rules::default();
        assert!(!rules.apply(RuleChange::TeamsEnabled(false)));
        assert!(rules.apply(RuleChange::TeamsEnabled(true)));
        assert!(!rules.is_timer_enabled());
    }

    #[test]
    fn rule_change_wire_format() {
        let json = serde_json::to_string(&RuleChange::TimerSeconds(180)).unwrap();
        assert_eq!(json, r#"{"rule":"timer_seconds","value":180}"#);
    }
}
