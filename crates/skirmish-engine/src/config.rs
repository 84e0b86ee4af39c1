//! Match timing configuration.

use std::time::Duration;

/// Every duration the engine uses.
///
/// Defaults match a normal match; tests shrink them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    /// How long players have to arrange their units.
    pub setup_duration: Duration,

    /// How long the player to move has before a random legal move is
    /// made for them.
    pub turn_duration: Duration,

    /// Choosing window of one sudden-death round.
    pub tie_break_window: Duration,

    /// How long a drawn sudden-death round stays revealed before the
    /// next round opens.
    pub reveal_delay: Duration,

    /// How long a seat is held for a player whose connection dropped.
    pub reconnect_grace: Duration,

    /// Interval of the sweep that drives the setup countdown and the
    /// turn clock.
    pub sweep_interval: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            setup_duration: Duration::from_secs(40),
            turn_duration: Duration::from_secs(30),
            tie_break_window: Duration::from_secs(7),
            reveal_delay: Duration::from_secs(2),
            reconnect_grace: Duration::from_secs(8),
            sweep_interval: Duration::from_secs(1),
        }
    }
}
