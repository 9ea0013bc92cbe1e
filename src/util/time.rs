//! Time utilities for the tick-driven simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::fixed::Fixed;

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default tick rate
pub const DEFAULT_TICK_RATE: u32 = 60; // 60 ticks per second

/// Number of ticks spanning `secs` seconds at `tick_rate`
pub fn ticks_for_secs(secs: u32, tick_rate: u32) -> u32 {
    secs.saturating_mul(tick_rate)
}

/// Simulated time advanced by one tick
pub fn tick_delta(tick_rate: u32) -> Fixed {
    Fixed::from_ratio(1, tick_rate.max(1) as i64)
}

/// Wall-clock interval between ticks, used only by the room loop
pub fn tick_interval(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate.max(1) as u64)
}

/// Counts a tick timer down by one.
/// Returns true once the timer is at zero.
pub fn decrement(timer: &mut u32) -> bool {
    *timer = timer.saturating_sub(1);
    *timer == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_saturates_at_zero() {
        let mut t = 2;
        assert!(!decrement(&mut t));
        assert!(decrement(&mut t));
        assert!(decrement(&mut t));
        assert_eq!(t, 0);
    }

    #[test]
    fn tick_interval_matches_rate() {
        assert_eq!(tick_interval(50), Duration::from_millis(20));
        assert_eq!(ticks_for_secs(20, 60), 1200);
    }
}
