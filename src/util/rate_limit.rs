//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Provider requests per second (~60 ms spacing)
pub const UPSTREAM_RATE_LIMIT: u32 = 16;

/// Playback commands per second per viewer (scrubbing sends bursts)
pub const COMMAND_RATE_LIMIT: u32 = 60;

/// Per-connection command limiter
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    command_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self {
            command_limiter: create_limiter(COMMAND_RATE_LIMIT),
        }
    }

    /// Check if a command is allowed (returns true if allowed)
    pub fn check_command(&self) -> bool {
        self.command_limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_rejected() {
        let limiter = create_limiter(2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn zero_quota_still_allows_one() {
        let limiter = create_limiter(0);
        assert!(limiter.check().is_ok());
    }
}
