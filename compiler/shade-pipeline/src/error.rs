//! Errors that can occur while configuring the pipeline, before any shader is
//! compiled, or while touching the filesystem on behalf of a request.

use std::{io, path::PathBuf};

use shade_reporting::report::{Report, ReportKind};
use thiserror::Error;

use crate::fs::ImportError;

/// Errors that might occur when preparing the pipeline or reading the sources
/// that it is asked to compile.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline tried to create a resource on the operating system, but
    /// the resource couldn't be created.
    #[error("couldn't create `{}`, {error}", path.display())]
    ResourceCreation {
        /// The item that was being created.
        path: PathBuf,

        /// The specific [io::Error] that occurred.
        error: io::Error,
    },

    /// A shader source file couldn't be read.
    #[error("couldn't read `{}`, {error}", path.display())]
    ReadSource { path: PathBuf, error: io::Error },

    /// Errors that can occur when resolving `#include`d files.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// When a configuration key value is not a valid option for the
    /// specified key.
    #[error("invalid value `{1}` for configuration key `{0}`")]
    InvalidValue(String, String),
}

impl From<PipelineError> for Report {
    fn from(value: PipelineError) -> Self {
        let mut report = Report::new();
        report.kind(ReportKind::Error).title(value.to_string());

        let code = match &value {
            PipelineError::ResourceCreation { error, .. }
            | PipelineError::ReadSource { error, .. } => error.raw_os_error(),
            _ => None,
        };

        if let Some(code) = code {
            report.add_note("os error code", code);
        }

        report.build()
    }
}

/// Failures of the environment the compiler runs in. These are the only
/// errors that are fatal, and they can only occur when a compiler session is
/// being initialised.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The compiler was built without any shading language front-ends.
    #[error("no shader front-end is available, enable the `wgsl` or `glsl` feature")]
    NoFrontEnds,
}

impl From<EnvironmentError> for Report {
    fn from(value: EnvironmentError) -> Self {
        Report::new().kind(ReportKind::Error).title(value.to_string()).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_values_name_the_key() {
        let report: Report = PipelineError::InvalidValue("stage".into(), "tess".into()).into();

        assert!(report.is_error());
        assert_eq!(report.title, "invalid value `tess` for configuration key `stage`");
    }
}
