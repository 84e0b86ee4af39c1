//! Keyed, explicitly cancellable deadlines.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// A set of named deadlines owned by one room.
///
/// `K` names the timer (setup countdown, turn clock, a player's grace
/// window, ...). At most one deadline exists per key.
#[derive(Debug, Clone)]
pub struct Timers<K> {
    deadlines: HashMap<K, Instant>,
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self { deadlines: HashMap::new() }
    }
}

impl<K: Eq + Hash + Clone> Timers<K> {
    /// Creates an empty timer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `key` to fire at `at`, superseding any earlier deadline
    /// for the same key.
    pub fn schedule(&mut self, key: K, at: Instant) {
        self.deadlines.insert(key, at);
    }

    /// Schedules `key` to fire `after` from `now`.
    pub fn schedule_in(&mut self, key: K, now: Instant, after: Duration) -> Instant {
        let at = now + after;
        self.schedule(key, at);
        at
    }

    /// Cancels `key`. Returns `true` if it was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.deadlines.remove(key).is_some()
    }

    /// Cancels every key matching `pred`.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&K) -> bool) {
        self.deadlines.retain(|k, _| !pred(k));
    }

    /// Cancels everything.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// The deadline for `key`, if scheduled.
    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.deadlines.get(key).copied()
    }

    /// Returns `true` if `key` is scheduled.
    pub fn is_pending(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    /// Time left on `key` (zero once due), or `None` if not scheduled.
    pub fn remaining(&self, key: &K, now: Instant) -> Option<Duration> {
        self.deadline(key).map(|at| at.saturating_duration_since(now))
    }

    /// Returns `true` if `key` is scheduled and `now` is strictly past it.
    pub fn is_expired(&self, key: &K, now: Instant) -> bool {
        self.deadline(key).is_some_and(|at| now > at)
    }

    /// Earliest deadline among keys matching `pred`.
    pub fn next_deadline_where(&self, mut pred: impl FnMut(&K) -> bool) -> Option<Instant> {
        self.deadlines
            .iter()
            .filter(|(k, _)| pred(k))
            .map(|(_, at)| *at)
            .min()
    }

    /// Earliest deadline overall.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline_where(|_| true)
    }

    /// Removes and returns every key matching `pred` whose deadline is at
    /// or before `now`, earliest first.
    pub fn pop_due_where(&mut self, now: Instant, mut pred: impl FnMut(&K) -> bool) -> Vec<K> {
        let mut due: Vec<(Instant, K)> = self
            .deadlines
            .iter()
            .filter(|(k, at)| **at <= now && pred(k))
            .map(|(k, at)| (*at, k.clone()))
            .collect();
        due.sort_by_key(|(at, _)| *at);
        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, k)| k).collect()
    }

    /// Number of pending deadlines.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

/// Sleeps until `at`, or forever when `at` is `None`.
///
/// Meant for a `tokio::select!` branch whose deadline may not exist.
pub async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
