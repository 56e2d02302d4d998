//! Shade compiler pipeline settings. This file contains the structures and
//! utilities representing the configuration of a compiler session.
use std::{
    env::{self, temp_dir},
    fmt::Display,
    path::PathBuf,
    str::FromStr,
};

use naga::proc::{BoundsCheckPolicies, BoundsCheckPolicy};

use crate::{error::PipelineError, fs::ensure_directory};

/// The environment variable that overrides the default cache directory.
pub const CACHE_DIR_ENV: &str = "SHADE_CACHE_DIR";

/// Various settings that are present on the compiler pipeline when initially
/// launching.
#[derive(Debug, Clone)]
pub struct CompilerSettings {
    /// An optionally specified directory for the persistent shader cache.
    ///
    /// N.B. This path is the one that is specified via command-line arguments,
    /// it is not resolved and it is not guaranteed to exist. The resolved
    /// path can be accessed via [`CompilerSettings::cache_directory`] API.
    pub cache_directory: Option<PathBuf>,

    /// Whether debugging log statements are enabled.
    pub debug: bool,

    /// Print metrics about each stage when a compile job has completed.
    pub output_metrics: bool,

    /// Whether the pipeline should output errors and warnings to standard
    /// error, rather than leaving them to the caller.
    pub emit_errors: bool,

    /// Whether the shader cache is loaded from and saved to disk.
    pub persistent_cache: bool,

    /// The optimisation level of the default compile options of a session.
    pub optimisation_level: OptimisationLevel,

    /// The debug information level of the default compile options of a
    /// session.
    pub debug_info: DebugInfoLevel,
}

impl CompilerSettings {
    /// Create a new [CompilerSettings] that stores the cache in `directory`.
    pub fn with_cache_directory(directory: impl Into<PathBuf>) -> Self {
        Self { cache_directory: Some(directory.into()), ..Default::default() }
    }

    /// Specify the cache directory.
    pub fn set_cache_directory(&mut self, directory: impl Into<PathBuf>) {
        self.cache_directory = Some(directory.into());
    }

    /// Specify whether the compiler should emit errors to standard error, or
    /// if they should be handled by the caller.
    pub fn set_emit_errors(&mut self, value: bool) {
        self.emit_errors = value;
    }

    /// Get the cache directory from the [CompilerSettings]. The directory is
    /// decided in the following way:
    ///
    /// 1. If the user has specified a cache directory, use that.
    ///
    /// 2. If the `SHADE_CACHE_DIR` environment variable is set, use that.
    ///
    /// 3. Otherwise, use the operating system temporary directory with an
    ///    appended `shade-cache` directory.
    ///
    /// The directory is created if it does not exist yet.
    pub fn cache_directory(&self) -> Result<PathBuf, PipelineError> {
        let directory = self
            .cache_directory
            .clone()
            .or_else(|| env::var_os(CACHE_DIR_ENV).filter(|dir| !dir.is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| temp_dir().join("shade-cache"));

        ensure_directory(&directory)?;
        Ok(directory)
    }
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            cache_directory: None,
            debug: false,
            output_metrics: false,
            emit_errors: true,
            persistent_cache: true,
            optimisation_level: OptimisationLevel::default(),
            debug_info: DebugInfoLevel::default(),
        }
    }
}

/// What optimisation level the compiler should run at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum OptimisationLevel {
    /// Keep bounds checks in the generated code and favour compile speed.
    #[default]
    Debug,

    /// Remove bounds checks from the generated code.
    Release,
}

impl OptimisationLevel {
    /// Check if the optimisation level is [`OptimisationLevel::Release`].
    pub fn is_release(&self) -> bool {
        matches!(self, Self::Release)
    }

    /// The inverse of [`OptimisationLevel::is_release`], used when reading the
    /// level back from its one byte representation.
    pub fn from_release(release: bool) -> Self {
        if release { Self::Release } else { Self::Debug }
    }

    /// Bounds checked accesses for debug builds, unchecked ones for release.
    pub fn bounds_check_policies(&self) -> BoundsCheckPolicies {
        let policy = match self {
            Self::Debug => BoundsCheckPolicy::Restrict,
            Self::Release => BoundsCheckPolicy::Unchecked,
        };

        BoundsCheckPolicies { index: policy, buffer: policy, image_load: policy, binding_array: policy }
    }

    /// Get the optimisation level as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

impl FromStr for OptimisationLevel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            _ => Err(PipelineError::InvalidValue("optimisation-level".to_string(), s.to_string())),
        }
    }
}

/// How much debug information should be embedded in generated shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DebugInfoLevel {
    /// Only names of resources and variables are kept.
    #[default]
    None,

    /// Source level debug information is embedded.
    Full,
}

impl DebugInfoLevel {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Full)
    }

    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Full } else { Self::None }
    }
}

/// The stages that a compile job goes through, in the order that they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompilerStageKind {
    /// Preprocess, parse and validate the source and emit SPIR-V.
    FrontEnd,

    /// Extract the reflection table from the SPIR-V.
    Reflect,

    /// Re-target the SPIR-V into the requested dialect.
    CrossCompile,
}

impl CompilerStageKind {
    /// The label that is attached to diagnostics from this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerStageKind::FrontEnd => "front-end",
            CompilerStageKind::Reflect => "reflection",
            CompilerStageKind::CrossCompile => "cross-compile",
        }
    }
}

impl Display for CompilerStageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
