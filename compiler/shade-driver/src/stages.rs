//! The stages of the shader pipeline. Each stage wraps one of the compiler
//! components and moves a [CompileJob] one state forward.
use shade_cross::{CrossCompileOptions, CrossCompiler};
use shade_frontend::FrontEnd;
use shade_pipeline::{
    interface::{CompilerResult, CompilerStage, StageMetrics},
    settings::CompilerStageKind,
};
use shade_reporting::{report::Report, reporter::Reporter};
use shade_spirv::extract_reflection;

use crate::job::{CompileJob, CompileState};

/// Function to make all of the stages of the shader pipeline.
pub fn make_stages() -> Vec<Box<dyn CompilerStage<CompileJob>>> {
    vec![
        Box::<FrontEndStage>::default(),
        Box::<ReflectStage>::default(),
        Box::<CrossCompileStage>::default(),
    ]
}

/// Split a list of reports into the result of a stage that succeeded.
fn succeeded(reports: Vec<Report>) -> CompilerResult<()> {
    if reports.is_empty() { Ok(()) } else { Err(reports) }
}

/// Compiles the request source into SPIR-V.
#[derive(Default)]
pub struct FrontEndStage {
    front_end: FrontEnd,
}

impl CompilerStage<CompileJob> for FrontEndStage {
    fn run(&mut self, job: &mut CompileJob) -> CompilerResult<()> {
        let output = self.front_end.compile(&job.request);

        if !output.is_success() {
            return Err(output.diagnostics);
        }

        job.bytecode = output.bytecode;
        job.advance(CompileState::FrontEndCompiled);
        succeeded(output.diagnostics)
    }

    fn metrics(&self) -> StageMetrics {
        self.front_end.metrics().clone()
    }

    fn reset_metrics(&mut self) {
        self.front_end.reset_metrics();
    }

    fn kind(&self) -> CompilerStageKind {
        CompilerStageKind::FrontEnd
    }
}

/// Extracts the reflection table from the SPIR-V and checks that no two
/// resources share a binding.
#[derive(Default)]
pub struct ReflectStage {
    metrics: StageMetrics,
}

impl CompilerStage<CompileJob> for ReflectStage {
    fn run(&mut self, job: &mut CompileJob) -> CompilerResult<()> {
        let unit = job.request.unit_name();
        let mut reporter = Reporter::new();

        let reflection = match self.metrics.time_item("extract", || extract_reflection(&job.bytecode)) {
            Ok(reflection) => reflection,
            Err(error) => {
                reporter
                    .error()
                    .title(format!("couldn't reflect the bytecode of `{unit}`"))
                    .add_note("reason", error);
                return Err(reporter.into_reports());
            }
        };

        if let Err(conflict) = self.metrics.time_item("bindings", || reflection.check_unique_bindings()) {
            reporter
                .error()
                .title(format!("`{unit}` has conflicting resource bindings"))
                .add_note("conflict", conflict);
            return Err(reporter.into_reports());
        }

        job.reflection = reflection;
        job.advance(CompileState::ReflectionExtracted);
        Ok(())
    }

    fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }

    fn reset_metrics(&mut self) {
        self.metrics = StageMetrics::default();
    }

    fn kind(&self) -> CompilerStageKind {
        CompilerStageKind::Reflect
    }
}

/// Re-targets the SPIR-V into the dialect the request asked for.
#[derive(Default)]
pub struct CrossCompileStage {
    cross_compiler: CrossCompiler,
}

impl CompilerStage<CompileJob> for CrossCompileStage {
    fn run(&mut self, job: &mut CompileJob) -> CompilerResult<()> {
        let options = CrossCompileOptions::from_request(&job.request);
        let output = self.cross_compiler.cross_compile(
            &job.bytecode,
            job.request.target(),
            &job.reflection,
            &options,
        );

        if !output.is_success() {
            return Err(output.diagnostics);
        }

        job.native_source = output.native_source;
        job.advance(CompileState::CrossCompiled);
        succeeded(output.diagnostics)
    }

    fn metrics(&self) -> StageMetrics {
        self.cross_compiler.metrics().clone()
    }

    fn reset_metrics(&mut self) {
        self.cross_compiler.reset_metrics();
    }

    fn kind(&self) -> CompilerStageKind {
        CompilerStageKind::CrossCompile
    }
}
