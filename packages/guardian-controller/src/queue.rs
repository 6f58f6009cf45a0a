//! Rate-limited timed queue: the eviction pipeline's admission primitive.
//!
//! A FIFO-among-distinct-keys set, gated by a token bucket, used for both the
//! per-zone delete queue and termination queue: a plain map behind
//! `parking_lot`, no trait-object indirection, with the admission gate
//! generalized from a binary semaphore permit into a refillable bucket.
//!
//! `pop_due`/`reinsert`/`finish` replace a single synchronous `Try(worker)`
//! call so the worker itself can be an `async fn` -- popping and re-queueing
//! are the only operations that need the lock, and they never hold it across
//! an awaited cluster-API call.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use parking_lot::Mutex;

/// Token bucket with burst = 1, as required by the queue's fairness rule:
/// exhaustion yields immediately rather than blocking the caller.
#[derive(Debug)]
struct TokenBucket {
    qps: f64,
    tokens: f64,
    last_refill_ms: u64,
}

impl TokenBucket {
    fn new(qps: f64, now_ms: u64) -> Self {
        Self {
            qps,
            tokens: 1.0,
            last_refill_ms: now_ms,
        }
    }

    fn try_take(&mut self, now_ms: u64) -> bool {
        let elapsed_ms = now_ms.saturating_sub(self.last_refill_ms);
        if elapsed_ms > 0 {
            let refill = (elapsed_ms as f64 / 1000.0) * self.qps;
            self.tokens = (self.tokens + refill).min(1.0);
            self.last_refill_ms = now_ms;
        }
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<K> {
    key: K,
    added_at_ms: u64,
    /// Earliest time this entry may be attempted again, set by a deferred retry.
    not_before_ms: u64,
}

/// One entry popped for an attempt. Carries the original `addedAt` so a
/// worker can bound total termination grace against it.
pub struct PendingEntry<K> {
    pub key: K,
    pub added_at_ms: u64,
}

struct Inner<K> {
    order: VecDeque<Entry<K>>,
    members: HashSet<K>,
    bucket: TokenBucket,
}

/// Set semantic keyed by `K`, preserving FIFO among distinct keys, gated by a
/// token bucket. `K` is always `NodeName` in this crate but kept generic
/// rather than hard-coded.
pub struct RateLimitedQueue<K> {
    inner: Mutex<Inner<K>>,
}

impl<K: Eq + Hash + Clone> RateLimitedQueue<K> {
    #[must_use]
    pub fn new(qps: f64, now_ms: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: VecDeque::new(),
                members: HashSet::new(),
                bucket: TokenBucket::new(qps, now_ms),
            }),
        }
    }

    /// Inserts `key` with `added_at = now_ms`. Returns `true` if newly
    /// inserted; does not refresh the timestamp of an existing entry.
    pub fn add(&self, key: K, now_ms: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.members.contains(&key) {
            return false;
        }
        inner.members.insert(key.clone());
        inner.order.push_back(Entry {
            key,
            added_at_ms: now_ms,
            not_before_ms: now_ms,
        });
        true
    }

    /// Removes `key` if present, whether it is sitting in the FIFO order or
    /// currently popped out for an in-flight attempt. Returns `true` if it
    /// was present.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        if !inner.members.remove(key) {
            return false;
        }
        inner.order.retain(|e| &e.key != key);
        true
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().members.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops the FIFO head if it is due and a token is available, spending
    /// that token. The entry stays a member (so `add` stays idempotent and
    /// `remove` can still cancel it) until `finish` or `reinsert` is called.
    pub fn pop_due(&self, now_ms: u64) -> Option<PendingEntry<K>> {
        let mut inner = self.inner.lock();
        let head_due = inner.order.front().is_some_and(|e| now_ms >= e.not_before_ms);
        if !head_due || !inner.bucket.try_take(now_ms) {
            return None;
        }
        let entry = inner.order.pop_front().expect("checked above");
        Some(PendingEntry {
            key: entry.key,
            added_at_ms: entry.added_at_ms,
        })
    }

    /// Re-queues an entry that was not processed, deferred until `now_ms +
    /// retry_after_ms`. A no-op if the key was cancelled (removed) while the
    /// attempt was in flight.
    pub fn reinsert(&self, entry: PendingEntry<K>, now_ms: u64, retry_after_ms: u64) {
        let mut inner = self.inner.lock();
        if !inner.members.contains(&entry.key) {
            return;
        }
        inner.order.push_back(Entry {
            key: entry.key,
            added_at_ms: entry.added_at_ms,
            not_before_ms: now_ms + retry_after_ms,
        });
    }

    /// Marks an entry as successfully processed, dropping it permanently.
    pub fn finish(&self, key: &K) {
        self.inner.lock().members.remove(key);
    }
}
