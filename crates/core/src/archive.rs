use std::io;
use std::path::{Path, PathBuf};

/// Directory holding copies of flagged files, keyed by basename.
///
/// Files from different subtrees that share a basename overwrite each other.
#[derive(Debug, Clone)]
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies `source` into the archive, creating the directory if needed.
    ///
    /// A source that already is the archived copy is refused, since copying
    /// a file onto itself truncates it.
    pub async fn store(&self, source: &Path) -> io::Result<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", source.display()),
            )
        })?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let dest = self.dir.join(name);
        if let (Ok(src), Ok(dst)) = (
            tokio::fs::canonicalize(source).await,
            tokio::fs::canonicalize(&dest).await,
        ) {
            if src == dst {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is already in the archive", source.display()),
                ));
            }
        }
        tokio::fs::copy(source, &dest).await?;
        Ok(dest)
    }
}
