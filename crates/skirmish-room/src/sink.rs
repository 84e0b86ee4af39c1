//! Where finished matches are recorded.
//!
//! The room actor hands each [`MatchOutcome`] to a [`ResultSink`] on a
//! spawned task and only logs a failure; a slow or broken sink never
//! holds up the room.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use skirmish_engine::MatchOutcome;
use tokio::io::AsyncWriteExt;

/// Errors a sink can report.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("result file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("result encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Receives one record per finished match.
pub trait ResultSink: Send + Sync + 'static {
    fn record(
        &self,
        outcome: &MatchOutcome,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Logs each outcome at `info`. The default when no results file is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    async fn record(&self, outcome: &MatchOutcome) -> Result<(), SinkError> {
        tracing::info!(
            room_id = %outcome.room_id,
            winner = %outcome.winner,
            loser = %outcome.loser,
            reason = ?outcome.reason,
            flag_capture = outcome.flag_capture,
            disconnect_win = outcome.disconnect_win,
            finished_at_ms = outcome.finished_at_ms,
            "match result"
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    // Serializes appends from concurrently finishing rooms.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonLinesSink {
    async fn record(&self, outcome: &MatchOutcome) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(outcome)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        tracing::debug!(
            room_id = %outcome.room_id,
            path = %self.path.display(),
            "match result appended"
        );
        Ok(())
    }
}

/// Keeps outcomes in memory. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    outcomes: Arc<Mutex<Vec<MatchOutcome>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, oldest first.
    pub fn outcomes(&self) -> Vec<MatchOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResultSink for MemorySink {
    async fn record(&self, outcome: &MatchOutcome) -> Result<(), SinkError> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_protocol::{GameOverReason, PlayerId, RoomId};

    fn outcome(room: &str, winner: u64, loser: u64) -> MatchOutcome {
        MatchOutcome {
            room_id: RoomId::new(room),
            winner: PlayerId(winner),
            loser: PlayerId(loser),
            reason: GameOverReason::FlagCaptured,
            flag_capture: true,
            disconnect_win: false,
            finished_at_ms: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_memory_sink_clones_share_records() {
        let sink = MemorySink::new();
        let observer = sink.clone();
        sink.record(&outcome("a", 1, 2)).await.unwrap();
        sink.record(&outcome("b", 3, 4)).await.unwrap();

        let seen = observer.outcomes();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].room_id.as_str(), "a");
        assert_eq!(seen[1].winner, PlayerId(3));
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        assert!(TracingSink.record(&outcome("a", 1, 2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_json_lines_sink_appends_one_object_per_line() {
        let path = std::env::temp_dir().join(format!(
            "skirmish-results-{}-{:?}.jsonl",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = tokio::fs::remove_file(&path).await;

        let sink = JsonLinesSink::new(&path);
        sink.record(&outcome("first", 1, 2)).await.unwrap();
        sink.record(&outcome("second", 2, 1)).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let records: Vec<MatchOutcome> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records, vec![outcome("first", 1, 2), outcome("second", 2, 1)]);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_json_lines_sink_reports_io_errors() {
        let sink = JsonLinesSink::new(std::env::temp_dir().join("no-such-dir-skirmish/x.jsonl"));
        let err = sink.record(&outcome("a", 1, 2)).await.unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
