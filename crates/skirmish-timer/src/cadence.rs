//! Fixed-interval sweep clock.
//!
//! Rooms run periodic checks (the turn-timeout sweep and the setup
//! countdown broadcast) at a fixed cadence. A late wake-up never triggers
//! a burst of catch-up ticks: the next tick is always scheduled from
//! "now", which is what a once-per-second sweep wants.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Configuration for a [`Cadence`].
#[derive(Debug, Clone)]
pub struct CadenceConfig {
    /// Time between ticks. `Duration::ZERO` disables the clock entirely.
    pub interval: Duration,
    /// Random jitter (0–max) added to the first tick so rooms created at
    /// the same instant don't sweep in lockstep.
    pub initial_jitter: Duration,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            initial_jitter: Duration::from_millis(50),
        }
    }
}

impl CadenceConfig {
    /// A config with the given interval and no jitter.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            initial_jitter: Duration::ZERO,
        }
    }
}

/// Information about a fired tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired more than one interval late.
    pub overrun: bool,
}

/// A pausable fixed-interval clock for one room.
pub struct Cadence {
    interval: Option<Duration>,
    tick_count: u64,
    next_tick: Option<Instant>,
    paused: bool,
}

impl Cadence {
    /// Creates a cadence; the first tick is one interval plus jitter away.
    pub fn new(config: CadenceConfig) -> Self {
        let interval = (!config.interval.is_zero()).then_some(config.interval);

        let next_tick = interval.map(|d| {
            let max_us = config.initial_jitter.as_micros() as u64;
            let jitter = if max_us == 0 {
                Duration::ZERO
            } else {
                Duration::from_micros(rand::rng().random_range(0..max_us))
            };
            Instant::now() + d + jitter
        });

        debug!(interval_ms = ?interval.map(|d| d.as_millis()), "cadence created");

        Self {
            interval,
            tick_count: 0,
            next_tick,
            paused: false,
        }
    }

    /// Waits for the next tick.
    ///
    /// When disabled or paused this future pends forever, which lets
    /// `tokio::select!` keep servicing its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, interval) = match (self.next_tick, self.interval) {
            (Some(next), Some(interval)) if !self.paused => (next, interval),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval;
        if overrun {
            warn!(
                tick = self.tick_count,
                late_ms = late_by.as_millis() as u64,
                "cadence overrun, skipping ahead"
            );
        }
        self.next_tick = Some(now + interval);

        trace!(tick = self.tick_count, "cadence tick");
        TickInfo {
            tick: self.tick_count,
            overrun,
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "cadence paused");
        }
    }

    /// Resumes ticking; the next tick is one full interval from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(interval) = self.interval {
                self.next_tick = Some(Instant::now() + interval);
            }
            debug!(tick = self.tick_count, "cadence resumed");
        }
    }

    /// Pauses or resumes to match `active`.
    pub fn set_active(&mut self, active: bool) {
        if active {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Whether the cadence is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the cadence was created with a zero interval.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured interval, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}
