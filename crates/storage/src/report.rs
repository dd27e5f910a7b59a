use crate::StorageError;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::debug;

pub const HEADERS: [&str; 4] = ["File", "Nudity Detected", "Detected Classes", "Date Classified"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub file: String,
    pub flagged: bool,
    pub detected_classes: String,
    pub date_classified: String,
}

impl ReportRow {
    fn to_record(&self) -> [&str; 4] {
        [
            self.file.as_str(),
            if self.flagged { "True" } else { "False" },
            self.detected_classes.as_str(),
            self.date_classified.as_str(),
        ]
    }

    fn from_record(record: &csv::StringRecord) -> Option<Self> {
        let file = record.get(0)?.to_string();
        let flagged = record
            .get(1)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Some(Self {
            file,
            flagged,
            detected_classes: record.get(2).unwrap_or_default().to_string(),
            date_classified: record.get(3).unwrap_or_default().to_string(),
        })
    }
}

/// Appends rows to the report at `path`, writing the header first when the
/// file is new or empty. Existing rows are never rewritten.
///
/// Returns the number of rows written; an empty slice touches nothing.
pub fn append_rows(path: &Path, rows: &[ReportRow]) -> Result<usize, StorageError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let io_err = |source| StorageError::Io {
        path: path.display().to_string(),
        source,
    };
    let csv_err = |source| StorageError::Csv {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if needs_header {
        writer.write_record(HEADERS).map_err(csv_err)?;
    }
    for row in rows {
        writer.write_record(row.to_record()).map_err(csv_err)?;
    }
    writer.flush().map_err(io_err)?;
    debug!("appended {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

/// Reads every data row of the report.
pub fn read_rows(path: &Path) -> Result<Vec<ReportRow>, StorageError> {
    let csv_err = |source| StorageError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if let Some(row) = ReportRow::from_record(&record) {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Reads the `File` column of the report.
pub fn read_file_column(path: &Path) -> Result<HashSet<String>, StorageError> {
    Ok(read_rows(path)?.into_iter().map(|r| r.file).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(file: &str, flagged: bool) -> ReportRow {
        ReportRow {
            file: file.to_string(),
            flagged,
            detected_classes: "unsafe".to_string(),
            date_classified: "2024-05-01 10:00:00".to_string(),
        }
    }

    #[test]
    fn creates_report_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exposed").join("report.csv");
        append_rows(&path, &[row("/a.jpg", true)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("File,Nudity Detected,Detected Classes,Date Classified")
        );
        assert_eq!(lines.next(), Some("/a.jpg,True,unsafe,2024-05-01 10:00:00"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn appends_without_rewriting_header_or_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        append_rows(&path, &[row("/a.jpg", true)]).unwrap();
        append_rows(&path, &[row("/b.jpg", false), row("/c.mp4", false)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("File,Nudity Detected").count(), 1);
        let rows = read_rows(&path).unwrap();
        let files: Vec<_> = rows.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["/a.jpg", "/b.jpg", "/c.mp4"]);
        assert!(rows[0].flagged);
        assert!(!rows[1].flagged);
    }

    #[test]
    fn empty_append_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        assert_eq!(append_rows(&path, &[]).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn quoted_fields_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let mut r = row("/media/a, b.jpg", true);
        r.detected_classes = r#"[{"class":"ANUS_EXPOSED","score":0.8}]"#.to_string();
        append_rows(&path, &[r.clone()]).unwrap();
        assert_eq!(read_rows(&path).unwrap(), vec![r]);
    }

    #[test]
    fn file_column_collects_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        append_rows(&path, &[row("/a.jpg", true), row("/b.jpg", false)]).unwrap();
        let keys = read_file_column(&path).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("/a.jpg"));
    }

    #[test]
    fn missing_report_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_file_column(&dir.path().join("missing.csv")).is_err());
    }
}
