//! Server configuration, read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use skirmish_engine::MatchConfig;

/// A malformed environment setting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// JSON-lines file for finished matches; `None` logs them instead.
    pub results_path: Option<PathBuf>,
    /// A connection that sends nothing for this long is dropped.
    pub idle_timeout: Duration,
    /// How long a fresh connection has to send its `hello`.
    pub handshake_timeout: Duration,
    pub match_config: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            results_path: None,
            idle_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(5),
            match_config: MatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `SKIRMISH_BIND`, `SKIRMISH_RESULTS`,
    /// `SKIRMISH_IDLE_TIMEOUT_SECS` and `SKIRMISH_GRACE_SECS`; anything
    /// unset keeps its default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("SKIRMISH_BIND") {
            let addr = addr.trim();
            if addr.is_empty() {
                return Err(ConfigError::Invalid {
                    var: "SKIRMISH_BIND",
                    value: addr.to_string(),
                });
            }
            config.bind_addr = addr.to_string();
        }
        if let Some(path) = lookup("SKIRMISH_RESULTS") {
            if !path.trim().is_empty() {
                config.results_path = Some(PathBuf::from(path.trim()));
            }
        }
        if let Some(secs) = seconds(&lookup, "SKIRMISH_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = secs;
        }
        if let Some(secs) = seconds(&lookup, "SKIRMISH_GRACE_SECS")? {
            config.match_config.reconnect_grace = secs;
        }
        Ok(config)
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::Invalid { var, value: raw }),
    }
}
