use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// I/O failure while scanning or windowing a log file
///
/// raised only for open/seek/read failures on the underlying file; a line
/// that merely fails to parse is absorbed into the index as a placeholder
/// row and never surfaces here.
#[derive(Debug, Error)]
#[error("log index: {op} failed for {}: {source}", path.display())]
pub struct IndexError {
    path: PathBuf,
    op: &'static str,
    #[source]
    source: io::Error,
}

impl IndexError {
    pub(crate) fn new(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            op,
            source,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn op(&self) -> &str {
        self.op
    }
}
