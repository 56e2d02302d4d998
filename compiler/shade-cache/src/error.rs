//! Errors that can occur while reading or writing the shader cache file.
use std::{io, path::PathBuf};

use shade_reporting::report::{Report, ReportKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file couldn't be read or written.
    #[error("couldn't access the shader cache at `{}`, {error}", path.display())]
    Io { path: PathBuf, error: io::Error },

    /// The cache file doesn't hold what the format says it should.
    #[error("the shader cache is corrupted, {0}")]
    Corrupted(String),

    /// The cache file was written with another version of the format.
    #[error("the shader cache has format version {found}, expected {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    /// The cache file was written by a build with different compilers.
    #[error("the shader cache was written by another toolchain")]
    ToolchainMismatch,
}

impl CacheError {
    pub(crate) fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Whether the file was readable but its contents are unusable.
    pub fn is_discarded_contents(&self) -> bool {
        !matches!(self, CacheError::Io { .. })
    }
}

impl From<CacheError> for Report {
    fn from(value: CacheError) -> Self {
        let mut report = Report::new();
        report.kind(ReportKind::Warning).title(value.to_string());

        if let CacheError::Io { error, .. } = &value {
            if let Some(code) = error.raw_os_error() {
                report.add_note("os error code", code);
            }
        }

        report.build()
    }
}
