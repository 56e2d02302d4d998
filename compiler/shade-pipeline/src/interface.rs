//! Shade compiler pipeline traits. This file contains the interfaces that are
//! used by the driver to run the stages that transform a request into a
//! compiled artifact.

use shade_reporting::report::Report;
pub use shade_utils::timing::StageMetrics;

use crate::{request::CompileRequest, settings::CompilerStageKind};

pub type CompilerResult<T> = Result<T, Vec<Report>>;

/// [CompilerStage] represents an abstract stage within the compiler pipeline.
/// Each stage has an associated [CompilerStageKind] which is used to order
/// the stages and to attribute the diagnostics that they produce.
pub trait CompilerStage<Ctx> {
    /// Run the stage on the job context. A stage may return reports even when
    /// it succeeded, in which case none of them are errors.
    fn run(&mut self, ctx: &mut Ctx) -> CompilerResult<()>;

    /// A function that is invoked after the stage completes successfully.
    fn cleanup(&mut self, _ctx: &mut Ctx) {}

    /// Ask the stage for any collected metrics that it has collected during
    /// its execution.
    ///
    /// By default, there are no collected metrics.
    fn metrics(&self) -> StageMetrics {
        StageMetrics::default()
    }

    /// Reset any collected metrics before the stage runs for another job.
    fn reset_metrics(&mut self) {}

    /// The `stage` kind of this [CompilerStage].
    fn kind(&self) -> CompilerStageKind;
}

/// The [CompilerInterface] is what the driver needs to know about a job in
/// order to sequence stages over it.
pub trait CompilerInterface {
    /// The request that is being compiled.
    fn request(&self) -> &CompileRequest;

    /// Get the current [Report]s that have been collected for the job.
    fn diagnostics(&self) -> &[Report];

    /// Get a mutable reference to the current [Report]s that have been
    /// collected.
    fn diagnostics_mut(&mut self) -> &mut Vec<Report>;

    /// Check if the job has accumulated any errors.
    fn has_errors(&self) -> bool {
        self.diagnostics().iter().any(|report| report.is_error())
    }
}
