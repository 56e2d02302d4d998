//! The shade compiler driver. The [CrossCompilerFacade] turns a
//! [CompileRequest] into a [CompiledArtifact] by running a [CompileJob]
//! through the front-end, reflection and cross compilation stages.
//!
//! Every failure that a request can run into is returned inside the
//! artifact. The only error that escapes the facade is the
//! [EnvironmentError] that occurs when it can't be created at all.
pub mod artifact;
pub mod driver;
pub mod job;
pub mod metrics;
pub mod stages;

use shade_frontend::FrontEnd;
use shade_pipeline::{error::EnvironmentError, request::CompileRequest};
use shade_utils::log;

pub use crate::{
    artifact::CompiledArtifact,
    job::{CompileJob, CompileState},
};
use crate::{driver::Driver, metrics::Metrics, stages::make_stages};

/// Anything that can compile a [CompileRequest] into an artifact. This is
/// the seam that the shader cache compiles through.
pub trait ShaderCompiler {
    fn compile_shader(&mut self, request: &CompileRequest) -> CompiledArtifact;
}

/// The default [ShaderCompiler], it sequences the pipeline stages over each
/// request and keeps the stages, along with their lazily created `naga`
/// sessions, alive between requests.
pub struct CrossCompilerFacade {
    driver: Driver<CompileJob>,
}

impl CrossCompilerFacade {
    /// Create a new facade, this fails when no shader front-end is available.
    pub fn new() -> Result<Self, EnvironmentError> {
        FrontEnd::probe()?;
        Ok(Self { driver: Driver::new(make_stages()) })
    }

    /// Run a request through the pipeline, the returned job is always in a
    /// terminal state.
    pub fn run_job(&mut self, request: CompileRequest) -> CompileJob {
        log::debug!(
            "compiling `{}` ({} stage, entry point `{}`) to {}",
            request.unit_name(),
            request.stage(),
            request.entry_point(),
            request.target()
        );

        let mut job = CompileJob::new(request);

        match self.driver.run(&mut job) {
            Ok(()) => job.advance(CompileState::Done),
            Err(()) => job.advance(CompileState::Failed),
        }

        log::debug!("`{}` finished in the {} state", job.request.unit_name(), job.state());
        job
    }

    /// The timings of every stage across the requests compiled so far.
    pub fn metrics(&self) -> &Metrics {
        self.driver.metrics()
    }

    pub fn reset_metrics(&mut self) {
        self.driver.reset_metrics();
    }
}

impl ShaderCompiler for CrossCompilerFacade {
    fn compile_shader(&mut self, request: &CompileRequest) -> CompiledArtifact {
        self.run_job(request.clone()).into_artifact()
    }
}
