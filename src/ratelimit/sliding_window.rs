//! Sliding window limiter: `duration` split into `segments` sub-windows,
//! with the current (partial) sub-window's contribution weighted by the
//! fraction of it that has elapsed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Notify;

use crate::error::RateLimitError;

use super::SlidingWindowConfig;

struct Partition {
    epoch: Instant,
    /// Raw (unweighted) permit counts keyed by segment index.
    buckets: HashMap<u64, f64>,
    next_ticket: u64,
    now_serving: u64,
    abandoned: BTreeSet<u64>,
}

impl Partition {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            buckets: HashMap::new(),
            next_ticket: 0,
            now_serving: 0,
            abandoned: BTreeSet::new(),
        }
    }

    fn segment_duration(cfg: &SlidingWindowConfig) -> Duration {
        cfg.duration / cfg.segments.max(1)
    }

    fn current_index(&self, cfg: &SlidingWindowConfig) -> (u64, f64) {
        let seg = Self::segment_duration(cfg);
        if seg.is_zero() {
            return (0, 1.0);
        }
        let elapsed = self.epoch.elapsed().as_secs_f64();
        let seg_secs = seg.as_secs_f64();
        let idx = (elapsed / seg_secs).floor() as u64;
        let frac = (elapsed / seg_secs) - idx as f64;
        (idx, frac)
    }

    fn purge(&mut self, cfg: &SlidingWindowConfig, current_idx: u64) {
        let segments = u64::from(cfg.segments.max(1));
        let cutoff = current_idx.saturating_sub(segments - 1);
        self.buckets.retain(|&idx, _| idx >= cutoff || idx > current_idx);
    }

    /// Current weighted usage: full weight for every fully-elapsed segment
    /// in the window, `frac` weight for the current (still filling)
    /// segment.
    fn weighted_usage(&mut self, cfg: &SlidingWindowConfig) -> (u64, f64) {
        let (idx, frac) = self.current_index(cfg);
        self.purge(cfg, idx);
        let mut total = 0.0;
        for (&seg_idx, &count) in &self.buckets {
            if seg_idx == idx {
                total += count * frac;
            } else {
                total += count;
            }
        }
        (idx, total)
    }

    fn skip_abandoned(&mut self) {
        while self.abandoned.remove(&self.now_serving) {
            self.now_serving += 1;
        }
    }
}

/// A sliding window limiter over `duration`, divided into `segments`
/// equal sub-windows, partitioned by an arbitrary string key.
pub struct SlidingWindowLimiter {
    name: &'static str,
    cfg: SlidingWindowConfig,
    partitions: DashMap<String, Mutex<Partition>>,
    notify: Notify,
}

impl SlidingWindowLimiter {
    pub fn new(name: &'static str, cfg: SlidingWindowConfig) -> Self {
        Self {
            name,
            cfg,
            partitions: DashMap::new(),
            notify: Notify::new(),
        }
    }

    fn partition(&self, key: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<Partition>> {
        if !self.partitions.contains_key(key) {
            self.partitions
                .entry(key.to_owned())
                .or_insert_with(|| Mutex::new(Partition::new()));
        }
        self.partitions.get(key).expect("just inserted")
    }

    /// Acquire `permits` from `key`'s window, returning the segment index
    /// the permits were recorded under. Callers that may need to undo this
    /// acquisition (e.g. [`crate::ratelimit::AcquireGuard`]) must pass that
    /// same index to [`Self::refund`] rather than recomputing "now" at
    /// refund time, since a segment boundary may have elapsed in between.
    pub async fn acquire(&self, key: &str, permits: u32) -> Result<u64, RateLimitError> {
        let ticket = {
            let entry = self.partition(key);
            let mut state = entry.lock().expect("sliding window mutex poisoned");
            state.skip_abandoned();
            let (idx, usage) = state.weighted_usage(&self.cfg);

            if state.now_serving == state.next_ticket
                && usage + f64::from(permits) <= f64::from(self.cfg.limit)
            {
                *state.buckets.entry(idx).or_insert(0.0) += f64::from(permits);
                state.next_ticket += 1;
                state.now_serving += 1;
                return Ok(idx);
            }

            let waiting = (state.next_ticket - state.now_serving) as usize;
            if waiting >= self.cfg.queue_max {
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
            let mut state = entry.lock().expect("sliding window mutex poisoned");
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
    ) -> Result<u64, RateLimitError> {
        let seg = Partition::segment_duration(&self.cfg);
        let poll = seg.min(Duration::from_millis(50)).max(Duration::from_millis(1));
        loop {
            {
                let entry = self.partition(key);
                let mut state = entry.lock().expect("sliding window mutex poisoned");
                state.skip_abandoned();
                let (idx, usage) = state.weighted_usage(&self.cfg);
                if state.now_serving == ticket && usage + f64::from(permits) <= f64::from(self.cfg.limit) {
                    *state.buckets.entry(idx).or_insert(0.0) += f64::from(permits);
                    state.now_serving += 1;
                    drop(state);
                    drop(entry);
                    self.notify.notify_waiters();
                    return Ok(idx);
                }
            }
            tokio::select! {
                () = self.notify.notified() => {}
                () = tokio::time::sleep(poll) => {}
            }
        }
    }

    /// Refund `permits` out of the segment recorded at acquire time (the
    /// `idx` [`Self::acquire`] returned), used to unwind an earlier chain
    /// component when a later one fails. Using the segment index in effect
    /// "now" instead would land the refund in the wrong bucket once a
    /// segment boundary elapses between acquire and refund.
    pub fn refund(&self, key: &str, permits: u32, segment: u64) {
        let entry = self.partition(key);
        let mut state = entry.lock().expect("sliding window mutex poisoned");
        if let Some(count) = state.buckets.get_mut(&segment) {
            *count = (*count - f64::from(permits)).max(0.0);
        }
        drop(state);
        drop(entry);
        self.notify.notify_waiters();
    }
}
