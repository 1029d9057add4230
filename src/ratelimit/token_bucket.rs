//! Token bucket limiter with lazy refill and a bounded FIFO wait queue.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Notify;

use crate::error::RateLimitError;

use super::TokenBucketConfig;

struct Partition {
    available: f64,
    last_refill: Instant,
    next_ticket: u64,
    now_serving: u64,
    abandoned: BTreeSet<u64>,
}

impl Partition {
    fn new(max_tokens: u32) -> Self {
        Self {
            available: f64::from(max_tokens),
            last_refill: Instant::now(),
            next_ticket: 0,
            now_serving: 0,
            abandoned: BTreeSet::new(),
        }
    }

    fn refill(&mut self, cfg: &TokenBucketConfig) {
        if cfg.replenish_period.is_zero() {
            return;
        }
        let elapsed = self.last_refill.elapsed();
        let periods = (elapsed.as_secs_f64() / cfg.replenish_period.as_secs_f64()).floor();
        if periods >= 1.0 {
            self.available = (self.available + periods * f64::from(cfg.replenish_amount))
                .min(f64::from(cfg.max_tokens));
            self.last_refill += Duration::from_secs_f64(periods * cfg.replenish_period.as_secs_f64());
        }
    }

    /// Advance `now_serving` past any tickets already marked abandoned.
    fn skip_abandoned(&mut self) {
        while self.abandoned.remove(&self.now_serving) {
            self.now_serving += 1;
        }
    }
}

/// A token bucket: `max_tokens` capacity, replenished by `replenish_amount`
/// every `replenish_period`, partitioned by an arbitrary string key. `key`
/// also selects a per-key config override, falling back to `cfg` when the
/// key has none, so a single limiter can hold a default alongside exact
/// per-target overrides.
pub struct TokenBucketLimiter {
    name: &'static str,
    cfg: TokenBucketConfig,
    overrides: std::collections::HashMap<String, TokenBucketConfig>,
    partitions: DashMap<String, Mutex<Partition>>,
    notify: Notify,
}

impl TokenBucketLimiter {
    pub fn new(name: &'static str, cfg: TokenBucketConfig) -> Self {
        Self::with_overrides(name, cfg, std::collections::HashMap::new())
    }

    pub fn with_overrides(
        name: &'static str,
        cfg: TokenBucketConfig,
        overrides: std::collections::HashMap<String, TokenBucketConfig>,
    ) -> Self {
        Self {
            name,
            cfg,
            overrides,
            partitions: DashMap::new(),
            notify: Notify::new(),
        }
    }

    fn cfg_for(&self, key: &str) -> &TokenBucketConfig {
        self.overrides.get(key).unwrap_or(&self.cfg)
    }

    fn partition(&self, key: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<Partition>> {
        if !self.partitions.contains_key(key) {
            let max_tokens = self.cfg_for(key).max_tokens;
            self.partitions
                .entry(key.to_owned())
                .or_insert_with(|| Mutex::new(Partition::new(max_tokens)));
        }
        self.partitions.get(key).expect("just inserted")
    }

    /// Acquire `permits` tokens from `key`'s bucket, queueing (FIFO) if the
    /// bucket can't grant them immediately, and failing outright if the
    /// queue is already at `queue_max`.
    pub async fn acquire(&self, key: &str, permits: u32) -> Result<(), RateLimitError> {
        let ticket = {
            let cfg = *self.cfg_for(key);
            let entry = self.partition(key);
            let mut state = entry.lock().expect("token bucket mutex poisoned");
            state.refill(&cfg);
            state.skip_abandoned();

            if state.now_serving == state.next_ticket && state.available >= f64::from(permits) {
                state.available -= f64::from(permits);
                state.next_ticket += 1;
                state.now_serving += 1;
                return Ok(());
            }

            let waiting = (state.next_ticket - state.now_serving) as usize;
            if waiting >= cfg.queue_max {
                return Err(RateLimitError::QueueFull {
                    limiter: self.name,
                    partition: key.to_owned(),
                });
            }
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            ticket
        };

        let result = self.wait_for_turn(key, ticket, permits).await;
        if result.is_err() {
            let entry = self.partition(key);
            let mut state = entry.lock().expect("token bucket mutex poisoned");
            state.abandoned.insert(ticket);
            state.skip_abandoned();
            self.notify.notify_waiters();
        }
        result
    }

    async fn wait_for_turn(
        &self,
        key: &str,
        ticket: u64,
        permits: u32,
    ) -> Result<(), RateLimitError> {
        let cfg = *self.cfg_for(key);
        let poll = cfg.replenish_period.min(Duration::from_millis(50)).max(Duration::from_millis(1));
        loop {
            {
                let entry = self.partition(key);
                let mut state = entry.lock().expect("token bucket mutex poisoned");
                state.refill(&cfg);
                state.skip_abandoned();
                if state.now_serving == ticket && state.available >= f64::from(permits) {
                    state.available -= f64::from(permits);
                    state.now_serving += 1;
                    drop(state);
                    drop(entry);
                    self.notify.notify_waiters();
                    return Ok(());
                }
            }
            tokio::select! {
                () = self.notify.notified() => {}
                () = tokio::time::sleep(poll) => {}
            }
        }
    }

    /// Refund `permits` back into `key`'s bucket, clamped to `max_tokens`.
    /// Used to unwind an earlier chain component when a later one fails or
    /// the send is cancelled.
    pub fn refund(&self, key: &str, permits: u32) {
        let max_tokens = self.cfg_for(key).max_tokens;
        let entry = self.partition(key);
        let mut state = entry.lock().expect("token bucket mutex poisoned");
        state.available = (state.available + f64::from(permits)).min(f64::from(max_tokens));
        drop(state);
        drop(entry);
        self.notify.notify_waiters();
    }

    #[cfg(test)]
    pub fn try_peek_available(&self, key: &str) -> f64 {
        let cfg = *self.cfg_for(key);
        let entry = self.partition(key);
        let mut state = entry.lock().expect("token bucket mutex poisoned");
        state.refill(&cfg);
        state.available
    }
}
