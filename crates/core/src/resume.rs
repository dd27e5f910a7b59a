use crate::models::FileTask;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Files already present in the persisted report. Built once per run and
/// never updated while the run is in progress.
#[derive(Debug, Default, Clone)]
pub struct ResumeIndex {
    files: HashSet<String>,
}

impl ResumeIndex {
    /// Loads the `File` column of the report. A missing or unreadable report
    /// means no prior history.
    pub fn load(report: &Path) -> Self {
        if !report.exists() {
            info!("No previous report at {}, starting fresh", report.display());
            return Self::default();
        }
        match storage::read_file_column(report) {
            Ok(files) => {
                info!(
                    "Loaded {} previously classified files from {}",
                    files.len(),
                    report.display()
                );
                Self { files }
            }
            Err(e) => {
                warn!("Could not read previous report, ignoring it: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn should_skip(&self, task: &FileTask) -> bool {
        self.files.contains(&task.key())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use storage::ReportRow;

    #[test]
    fn loads_keys_from_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.csv");
        storage::append_rows(
            &report,
            &[ReportRow {
                file: "/media/a.jpg".into(),
                flagged: false,
                detected_classes: String::new(),
                date_classified: "2024-01-01 00:00:00".into(),
            }],
        )
        .unwrap();

        let index = ResumeIndex::load(&report);
        assert_eq!(index.len(), 1);
        assert!(index.should_skip(&FileTask::new(PathBuf::from("/media/a.jpg"))));
        assert!(!index.should_skip(&FileTask::new(PathBuf::from("/media/b.jpg"))));
    }

    #[test]
    fn missing_report_means_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ResumeIndex::load(&dir.path().join("none.csv")).is_empty());
    }

    #[test]
    fn unreadable_report_means_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.csv");
        fs::write(&report, [0xff, 0xfe, b'\n', 0xff, b',', 0x00, b'\n']).unwrap();
        assert!(ResumeIndex::load(&report).is_empty());
    }
}
