use chrono::NaiveDateTime;
use providers::Detection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storage::ReportRow;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff"];
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "vob", "wmv", "flv", "3gp", "webm",
];

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Image,
    Video,
    Unsupported,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Video
        } else {
            FileKind::Unsupported
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub path: PathBuf,
    pub kind: FileKind,
}

impl FileTask {
    pub fn new(path: PathBuf) -> Self {
        let kind = FileKind::from_path(&path);
        Self { path, kind }
    }

    /// The report key for this file.
    pub fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub class: String,
    pub score: f32,
}

impl From<Detection> for Label {
    fn from(d: Detection) -> Self {
        Self {
            class: d.class,
            score: d.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outcome {
    pub flagged: bool,
    pub labels: Vec<Label>,
}

/// How the `Detected Classes` column is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFormat {
    /// `A, B` — class names only.
    ClassList,
    /// JSON array of `{class, score}` records.
    Json,
}

impl LabelFormat {
    pub fn render(self, labels: &[Label]) -> String {
        match self {
            LabelFormat::ClassList => labels
                .iter()
                .map(|l| l.class.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            LabelFormat::Json => serde_json::to_string(labels).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub file: String,
    pub flagged: bool,
    pub labels: String,
    pub classified_at: NaiveDateTime,
}

impl ReportEntry {
    pub fn new(
        task: &FileTask,
        outcome: &Outcome,
        format: LabelFormat,
        classified_at: NaiveDateTime,
    ) -> Self {
        Self {
            file: task.key(),
            flagged: outcome.flagged,
            labels: format.render(&outcome.labels),
            classified_at,
        }
    }

    pub fn to_row(&self) -> ReportRow {
        ReportRow {
            file: self.file.clone(),
            flagged: self.flagged,
            detected_classes: self.labels.clone(),
            date_classified: self.classified_at.format(DATE_FORMAT).to_string(),
        }
    }
}
