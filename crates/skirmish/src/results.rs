//! The result sink chosen at startup.

use skirmish_engine::MatchOutcome;
use skirmish_room::{JsonLinesSink, ResultSink, SinkError, TracingSink};

use crate::ServerConfig;

/// Either a results file or the log, picked from [`ServerConfig`].
#[derive(Debug)]
pub enum ResultsSink {
    Tracing(TracingSink),
    JsonLines(JsonLinesSink),
}

impl ResultsSink {
    pub fn from_config(config: &ServerConfig) -> Self {
        match &config.results_path {
            Some(path) => Self::JsonLines(JsonLinesSink::new(path.clone())),
            None => Self::Tracing(TracingSink),
        }
    }
}

impl ResultSink for ResultsSink {
    async fn record(&self, outcome: &MatchOutcome) -> Result<(), SinkError> {
        match self {
            Self::Tracing(sink) => sink.record(outcome).await,
            Self::JsonLines(sink) => sink.record(outcome).await,
        }
    }
}
