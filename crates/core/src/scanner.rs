//! Walks the root directory and turns regular files into classification tasks.

use crate::models::{FileKind, FileTask};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum RootError {
    #[error("root directory {0} does not exist")]
    Missing(PathBuf),
    #[error("root {0} is not a directory")]
    NotADirectory(PathBuf),
}

/// Checks the root before any worker starts. This is the only fatal input error.
pub fn validate_root(root: &Path) -> Result<PathBuf, RootError> {
    if !root.exists() {
        return Err(RootError::Missing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(RootError::NotADirectory(root.to_path_buf()));
    }
    Ok(root.to_path_buf())
}

/// Paths the walk never enters, such as the archive directory and the report
/// file when they live under the root. Compared after canonicalization.
#[derive(Debug, Clone, Default)]
pub struct Pruned(Vec<PathBuf>);

impl Pruned {
    /// Paths that do not exist yet are ignored.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self(
            paths
                .into_iter()
                .filter_map(|p| fs::canonicalize(p).ok())
                .collect(),
        )
    }

    fn contains(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        // only canonicalize entries whose name can match
        self.0.iter().any(|p| {
            p.file_name() == Some(name)
                && fs::canonicalize(path).map(|c| &c == p).unwrap_or(false)
        })
    }
}

/// Lazily yields every regular file under `root`, tagged by kind.
///
/// Entries that cannot be read are logged and skipped.
pub fn enumerate<'a>(
    root: &Path,
    excludes: &'a GlobSet,
    pruned: &'a Pruned,
) -> impl Iterator<Item = FileTask> + 'a {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(move |e| {
            !is_excluded(e.path(), excludes) && !pruned.contains(e.path())
        })
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| FileTask::new(e.into_path()))
}

pub fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn is_excluded(path: &Path, excludes: &GlobSet) -> bool {
    excludes.is_match(path)
}

pub fn is_supported(task: &FileTask) -> bool {
    task.kind != FileKind::Unsupported
}
