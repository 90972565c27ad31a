//! Per-address cooldown.
//!
//! A keyed GCRA limiter with a quota of one cell per cooldown period and a
//! burst of one behaves exactly like a fixed per-address cooldown: the first
//! request is admitted, every request before `last + cooldown` is refused
//! without moving the window, and the state update is a compare-and-swap on
//! the address's cell, so concurrent requests for one address cannot both pass.

use crate::error::{FaucetError, FaucetResult};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::time::Duration;
use tracing::debug;

type KeyedLimiter<C> =
    RateLimiter<String, DashMapStateStore<String>, C, NoOpMiddleware<<C as Clock>::Instant>>;

pub struct AddressRateLimiter<C: Clock = DefaultClock> {
    limiter: KeyedLimiter<C>,
    clock: C,
    cooldown: Duration,
}

impl AddressRateLimiter<DefaultClock> {
    pub fn new(cooldown: Duration) -> FaucetResult<Self> {
        Self::with_clock(cooldown, DefaultClock::default())
    }
}

impl<C: Clock + Clone> AddressRateLimiter<C> {
    pub fn with_clock(cooldown: Duration, clock: C) -> FaucetResult<Self> {
        let quota = Quota::with_period(cooldown)
            .ok_or_else(|| FaucetError::Config("cooldown must be positive".to_string()))?;

        Ok(Self {
            limiter: RateLimiter::dashmap_with_clock(quota, &clock),
            clock,
            cooldown,
        })
    }

    /// Admit `address` and start its cooldown, or report how long it still has to wait.
    pub fn check_and_record(&self, address: &str) -> FaucetResult<()> {
        match self.limiter.check_key(&address.to_string()) {
            Ok(()) => {
                debug!("{} admitted by rate limiter", address);
                Ok(())
            }
            Err(not_until) => Err(FaucetError::RateLimited {
                address: address.to_string(),
                wait: not_until.wait_time_from(self.clock.now()),
                cooldown: self.cooldown,
            }),
        }
    }

    /// Drop addresses whose cooldown has elapsed. Returns the number evicted.
    ///
    /// Eviction is lazy: governor only discards a cell once its state is
    /// indistinguishable from a fresh one, which can take up to two further
    /// cooldown periods. An address still inside its window is never evicted.
    pub fn sweep(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        let evicted = before.saturating_sub(self.limiter.len());
        if evicted > 0 {
            debug!("Rate limiter evicted {} expired addresses", evicted);
        }
        evicted
    }

    /// Number of addresses currently tracked
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
