// src/transfer/bandwidth.rs

//! Aggregate bandwidth budget
//!
//! The configured ceiling applies to the whole run, not to each source.
//! Every active worker gets an equal slice of it, whatever its transport:
//! external tools receive the slice as their own rate option and in-process
//! transports pace themselves with a [`WorkerThrottle`] at the same rate.

use std::num::NonZeroU64;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MICROS_PER_SECOND: u128 = 1_000_000;

/// Debt below this is not worth sleeping for
const MINIMUM_SLEEP: Duration = Duration::from_millis(10);

/// Token-bucket pacing in the style of rsync's `--bwlimit`
///
/// Every registered write adds to a byte debt; elapsed time pays it down at
/// the configured rate. The returned duration is how long the caller must
/// sleep for the debt to clear.
#[derive(Debug, Clone)]
pub struct BandwidthLimiter {
    limit_bytes: NonZeroU64,
    debt: u128,
    last: Option<Instant>,
}

impl BandwidthLimiter {
    pub fn new(limit_bytes: NonZeroU64) -> Self {
        Self {
            limit_bytes,
            debt: 0,
            last: None,
        }
    }

    pub fn limit_bytes(&self) -> NonZeroU64 {
        self.limit_bytes
    }

    /// Record `bytes` written at `now` and return the pacing delay
    pub fn register_at(&mut self, bytes: usize, now: Instant) -> Duration {
        let rate = u128::from(self.limit_bytes.get());

        if let Some(previous) = self.last {
            let elapsed_us = now.saturating_duration_since(previous).as_micros();
            let paid = elapsed_us.saturating_mul(rate) / MICROS_PER_SECOND;
            self.debt = self.debt.saturating_sub(paid);
        }
        self.last = Some(now);
        self.debt = self.debt.saturating_add(bytes as u128);

        let sleep_us = self.debt.saturating_mul(MICROS_PER_SECOND) / rate;
        let sleep = Duration::from_micros(sleep_us.min(u128::from(u64::MAX)) as u64);
        if sleep < MINIMUM_SLEEP {
            Duration::ZERO
        } else {
            sleep
        }
    }

    /// Largest read that keeps pacing smooth (roughly 1/8 second of budget)
    pub fn recommended_chunk(&self, buffer_len: usize) -> usize {
        let eighth = (self.limit_bytes.get() / 8).max(1024);
        buffer_len.min(usize::try_from(eighth).unwrap_or(usize::MAX))
    }
}

/// Run-wide bandwidth ceiling split across workers
#[derive(Debug, Clone, Copy)]
pub struct BandwidthBudget {
    limit_kbs: u32,
    workers: usize,
}

impl BandwidthBudget {
    /// Budget of `limit_kbs` kilobytes per second split across `workers`
    pub fn new(limit_kbs: u32, workers: usize) -> Self {
        Self {
            limit_kbs: limit_kbs.max(1),
            workers: workers.max(1),
        }
    }

    pub fn limit_kbs(&self) -> u32 {
        self.limit_kbs
    }

    /// Rate for one worker so the workers' sum stays under the cap
    pub fn per_worker_kbs(&self) -> u32 {
        let share = self.limit_kbs as usize / self.workers;
        u32::try_from(share.max(1)).unwrap_or(u32::MAX)
    }

    /// Pacing for one worker's in-process transfers
    pub fn worker_throttle(&self) -> WorkerThrottle {
        let bytes = u64::from(self.per_worker_kbs()) * 1024;
        let limit = NonZeroU64::new(bytes).unwrap_or(NonZeroU64::MIN);
        WorkerThrottle {
            limiter: Mutex::new(BandwidthLimiter::new(limit)),
        }
    }
}

/// One worker's slice of the budget
#[derive(Debug)]
pub struct WorkerThrottle {
    limiter: Mutex<BandwidthLimiter>,
}

impl WorkerThrottle {
    pub fn limit_bytes(&self) -> NonZeroU64 {
        match self.limiter.lock() {
            Ok(limiter) => limiter.limit_bytes(),
            Err(poisoned) => poisoned.into_inner().limit_bytes(),
        }
    }

    /// Chunk size for reads paced by this throttle
    pub fn recommended_chunk(&self, buffer_len: usize) -> usize {
        match self.limiter.lock() {
            Ok(limiter) => limiter.recommended_chunk(buffer_len),
            Err(_) => buffer_len,
        }
    }

    /// Delay owed after `bytes` were transferred at `now`
    pub fn register_at(&self, bytes: usize, now: Instant) -> Duration {
        match self.limiter.lock() {
            Ok(mut limiter) => limiter.register_at(bytes, now),
            Err(poisoned) => poisoned.into_inner().register_at(bytes, now),
        }
    }

    /// Account for `bytes` transferred and block until they fit the slice
    pub fn throttle(&self, bytes: usize) {
        let delay = self.register_at(bytes, Instant::now());
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(value: u64) -> NonZeroU64 {
        NonZeroU64::new(value).unwrap()
    }

    #[test]
    fn test_first_write_sleeps_for_its_size() {
        let mut limiter = BandwidthLimiter::new(nz(1000));
        let delay = limiter.register_at(500, Instant::now());
        assert_eq!(delay, Duration::from_millis(500));
    }

    #[test]
    fn test_elapsed_time_pays_down_debt() {
        let mut limiter = BandwidthLimiter::new(nz(1000));
        let start = Instant::now();
        limiter.register_at(1000, start);
        let delay = limiter.register_at(0, start + Duration::from_secs(1));
        assert_eq!(delay, Duration::ZERO);
    }

    #[test]
    fn test_small_debt_does_not_sleep() {
        let mut limiter = BandwidthLimiter::new(nz(1_000_000));
        assert_eq!(limiter.register_at(100, Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_debt_accumulates_across_writes() {
        let mut limiter = BandwidthLimiter::new(nz(1000));
        let now = Instant::now();
        limiter.register_at(500, now);
        assert_eq!(limiter.register_at(500, now), Duration::from_secs(1));
    }

    #[test]
    fn test_per_worker_share() {
        assert_eq!(BandwidthBudget::new(10_000, 4).per_worker_kbs(), 2500);
        assert_eq!(BandwidthBudget::new(3, 8).per_worker_kbs(), 1);
        assert_eq!(BandwidthBudget::new(100, 0).per_worker_kbs(), 100);
    }

    #[test]
    fn test_worker_throttle_uses_per_worker_share() {
        let budget = BandwidthBudget::new(1000, 2);
        let throttle = budget.worker_throttle();
        assert_eq!(throttle.limit_bytes().get(), 500 * 1024);

        // A second of traffic at the full cap costs this worker two seconds
        let delay = throttle.register_at(1000 * 1024, Instant::now());
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[test]
    fn test_mixed_transports_stay_under_cap() {
        let budget = BandwidthBudget::new(1000, 2);
        let rsync_kbs = u64::from(budget.per_worker_kbs());
        let http_kbs = budget.worker_throttle().limit_bytes().get() / 1024;
        assert!(rsync_kbs + http_kbs <= u64::from(budget.limit_kbs()));
    }

    #[test]
    fn test_recommended_chunk_bounded() {
        let limiter = BandwidthLimiter::new(nz(8 * 4096));
        assert_eq!(limiter.recommended_chunk(65536), 4096);
        assert_eq!(limiter.recommended_chunk(100), 100);
    }
}
