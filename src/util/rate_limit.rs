//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::game::SessionId;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Lobby command rate limit per session
pub const COMMAND_RATE_LIMIT: u32 = 30; // Max 30 commands per second

/// Per-session command limiters for one room
pub struct SessionRateLimiter {
    per_second: u32,
    limiters: HashMap<SessionId, Arc<Limiter>>,
}

impl SessionRateLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second,
            limiters: HashMap::new(),
        }
    }

    /// Check if a command from this session is allowed (returns true if allowed)
    pub fn check(&mut self, session: SessionId) -> bool {
        let per_second = self.per_second;
        self.limiters
            .entry(session)
            .or_insert_with(|| create_limiter(per_second))
            .check()
            .is_ok()
    }

    /// Drop the limiter of a session that left
    pub fn forget(&mut self, session: SessionId) {
        self.limiters.remove(&session);
    }
}

impl Default for SessionRateLimiter {
    fn default() -> Self {
        Self::new(COMMAND_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_rejected() {
        let mut limiter = SessionRateLimiter::new(3);
        let s = SessionId(1);
        assert!(limiter.check(s));
        assert!(limiter.check(s));
        assert!(limiter.check(s));
        assert!(!limiter.check(s));
        // Other sessions have their own budget
        assert!(limiter.check(SessionId(2)));
    }
}
