//! Shade compiler filesystem utility functions.
use std::{
    fs,
    path::{Path, PathBuf},
};

use shade_reporting::report::{Report, ReportKind};
use thiserror::Error;

use crate::error::PipelineError;

/// Import error is an abstraction to represent errors that are in relevance to
/// IO operations on included files rather than parsing operations.
#[derive(Debug, Clone, Error)]
#[error("couldn't include `{}`, {message}", filename.display())]
pub struct ImportError {
    pub filename: PathBuf,
    pub message: String,
}

impl ImportError {
    /// Create a [Report] from the [ImportError], `unit` names the file that
    /// contained the include.
    pub fn create_report(&self, unit: &str) -> Report {
        Report::new()
            .kind(ReportKind::Error)
            .title(self.to_string())
            .add_note("included from", unit)
            .build()
    }
}

/// Read the contents of a shader source file.
pub fn read_source(path: impl AsRef<Path>) -> Result<String, PipelineError> {
    let path = path.as_ref();
    fs::read_to_string(path)
        .map_err(|error| PipelineError::ReadSource { path: path.to_path_buf(), error })
}

/// Resolve an `#include`d path. The directory of the including file is
/// searched first, then each of the `include_paths` in order.
pub fn resolve_include(
    name: &str,
    including_dir: Option<&Path>,
    include_paths: &[PathBuf],
) -> Result<PathBuf, ImportError> {
    let requested = Path::new(name);

    if requested.is_absolute() {
        return if requested.is_file() {
            Ok(requested.to_path_buf())
        } else {
            Err(ImportError { filename: requested.to_path_buf(), message: "file not found".into() })
        };
    }

    including_dir
        .into_iter()
        .chain(include_paths.iter().map(PathBuf::as_path))
        .map(|dir| dir.join(requested))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ImportError {
            filename: requested.to_path_buf(),
            message: if include_paths.is_empty() {
                "file not found relative to the including file".into()
            } else {
                format!("file not found in any of the {} include paths", include_paths.len())
            },
        })
}

/// Create the directory at `path` if it doesn't exist yet.
pub fn ensure_directory(path: &Path) -> Result<(), PipelineError> {
    if path.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(path)
        .map_err(|error| PipelineError::ResourceCreation { path: path.to_path_buf(), error })
}
