//! The single point where detector outcomes become report rows.

use crate::archive::Archive;
use crate::detector::DetectError;
use crate::models::{FileTask, LabelFormat, Outcome, ReportEntry};
use crate::report::ReportStore;
use chrono::Local;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub recorded: usize,
    pub flagged: usize,
    pub failed: usize,
    pub archive_errors: usize,
    /// Rows still unwritten after the final flush.
    pub unflushed: usize,
}

struct State {
    store: ReportStore,
    stats: AggregateStats,
}

/// Serializes outcome handling across workers. Archive copy, append and
/// checkpoint all run inside one critical section.
pub struct ResultAggregator {
    state: Mutex<State>,
    archive: Archive,
    format: LabelFormat,
}

impl ResultAggregator {
    pub fn new(store: ReportStore, archive: Archive, format: LabelFormat) -> Self {
        Self {
            state: Mutex::new(State {
                store,
                stats: AggregateStats::default(),
            }),
            archive,
            format,
        }
    }

    pub async fn record(&self, task: &FileTask, result: Result<Outcome, DetectError>) {
        let mut state = self.state.lock().await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Error classifying {}: {}", task.path.display(), e);
                state.stats.failed += 1;
                return;
            }
        };

        let entry = ReportEntry::new(task, &outcome, self.format, Local::now().naive_local());
        if outcome.flagged {
            state.stats.flagged += 1;
            match self.archive.store(&task.path).await {
                Ok(dest) => info!("Flagged {}, copied to {}", task.path.display(), dest.display()),
                Err(e) => {
                    error!("Failed to archive {}: {}", task.path.display(), e);
                    state.stats.archive_errors += 1;
                }
            }
        }

        state.store.append(entry);
        state.stats.recorded += 1;
        if let Err(e) = state.store.maybe_checkpoint().await {
            error!("Checkpoint failed, rows kept for the next flush: {}", e);
        }
    }

    /// Final flush at run end, regardless of the checkpoint threshold.
    pub async fn finish(&self) -> AggregateStats {
        let mut state = self.state.lock().await;
        if let Err(e) = state.store.flush().await {
            error!(
                "Final report flush to {} failed: {}",
                state.store.path().display(),
                e
            );
        }
        state.stats.unflushed = state.store.pending();
        state.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn setup(checkpoint: usize) -> (tempfile::TempDir, PathBuf, ResultAggregator) {
        let temp = tempfile::tempdir().unwrap();
        let report = temp.path().join("exposed").join("report.csv");
        let aggregator = ResultAggregator::new(
            ReportStore::new(&report, checkpoint),
            Archive::new(temp.path().join("exposed")),
            LabelFormat::ClassList,
        );
        (temp, report, aggregator)
    }

    fn flagged() -> Outcome {
        Outcome {
            flagged: true,
            labels: vec![Label {
                class: "MALE_GENITALIA_EXPOSED".into(),
                score: 0.9,
            }],
        }
    }

    #[tokio::test]
    async fn flagged_outcome_is_archived_and_recorded() {
        let (temp, report, aggregator) = setup(500);
        let src = temp.path().join("a.jpg");
        fs::write(&src, b"img").unwrap();

        aggregator.record(&FileTask::new(src.clone()), Ok(flagged())).await;
        let stats = aggregator.finish().await;

        assert_eq!(stats.recorded, 1);
        assert_eq!(stats.flagged, 1);
        assert!(temp.path().join("exposed").join("a.jpg").exists());
        let rows = storage::read_rows(&report).unwrap();
        assert_eq!(rows[0].detected_classes, "MALE_GENITALIA_EXPOSED");
        assert!(rows[0].flagged);
    }

    #[tokio::test]
    async fn failures_are_not_recorded() {
        let (temp, report, aggregator) = setup(500);
        let task = FileTask::new(temp.path().join("b.jpg"));
        let err = DetectError::Unsupported(task.path.clone());

        aggregator.record(&task, Err(err)).await;
        let stats = aggregator.finish().await;

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.recorded, 0);
        assert!(!report.exists());
    }

    #[tokio::test]
    async fn archive_failure_still_records_row() {
        let (temp, report, aggregator) = setup(500);
        let task = FileTask::new(temp.path().join("vanished.jpg"));

        aggregator.record(&task, Ok(flagged())).await;
        let stats = aggregator.finish().await;

        assert_eq!(stats.archive_errors, 1);
        assert_eq!(storage::read_rows(&report).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_records_checkpoint_every_row() {
        let (temp, report, aggregator) = setup(10);
        let aggregator = Arc::new(aggregator);
        let mut handles = Vec::new();
        for i in 0..25 {
            let aggregator = aggregator.clone();
            let task = FileTask::new(temp.path().join(format!("{}.jpg", i)));
            handles.push(tokio::spawn(async move {
                aggregator.record(&task, Ok(Outcome::default())).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // two checkpoints of 10, five rows still pending
        assert_eq!(storage::read_rows(&report).unwrap().len(), 20);
        let stats = aggregator.finish().await;
        assert_eq!(stats.recorded, 25);
        assert_eq!(stats.unflushed, 0);
        assert_eq!(storage::read_rows(&report).unwrap().len(), 25);
    }
}
