//! Timers for Skirmish rooms.
//!
//! Every suspension in a room is time-based, so this crate provides the
//! two clocks a room actor needs:
//!
//! - [`Timers`]: a keyed set of deadlines. Scheduling a key again
//!   supersedes the old deadline; cancelling removes it. The owner asks
//!   for the next deadline, sleeps until it, then pops whatever is due.
//!   Nothing fires on its own, so a dropped room leaves nothing behind.
//! - [`Cadence`]: a fixed-interval clock (the 1 s sweep) with initial
//!   jitter and pause/resume.
//!
//! Both sit inside the room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle command */ }
//!         _ = cadence.wait_for_tick() => room.sweep(Instant::now(), &mut rng),
//!         _ = sleep_until_opt(room.next_wakeup()) => room.fire_due(Instant::now(), &mut rng),
//!     }
//! }
//! ```

mod cadence;
mod timers;

pub use cadence::{Cadence, CadenceConfig, TickInfo};
pub use timers::{Timers, sleep_until_opt};
