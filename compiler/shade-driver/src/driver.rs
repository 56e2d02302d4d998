use shade_pipeline::{
    interface::{CompilerInterface, CompilerResult, CompilerStage},
    request::ShaderStage,
    settings::CompilerStageKind,
};
use shade_reporting::report::Report;
use shade_utils::{log, timing::timed};

use crate::metrics::Metrics;

/// The [Driver] sequences a collection of stages over a job. Each job is a
/// [CompilerInterface] that the stages read from and write their results
/// into, the driver itself keeps nothing about a job after it has run.
pub struct Driver<I: CompilerInterface> {
    /// The attached stages of the compiler pipeline.
    stages: Vec<Box<dyn CompilerStage<I>>>,

    /// A record of all of the stage metrics
    metrics: Metrics,
}

impl<I: CompilerInterface> Driver<I> {
    /// Create a new [Driver]. The provided [CompilerStage]s must be provided
    /// in an ascending order of their [CompilerStageKind].
    pub fn new(stages: Vec<Box<dyn CompilerStage<I>>>) -> Self {
        assert!(stages.windows(2).all(|w| w[0].kind() <= w[1].kind()));

        Self { stages, metrics: Metrics::new() }
    }

    /// The metrics of every job that has been run so far.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = Metrics::new();
    }

    fn run_stage(&mut self, job: &mut I, index: usize) -> CompilerResult<()> {
        let stage = &mut self.stages[index];
        let stage_kind = stage.kind();
        stage.reset_metrics();

        let mut elapsed = None;
        let result = timed(|| stage.run(job), log::Level::Info, |time| elapsed = Some(time));

        self.metrics.record(stage_kind, elapsed.unwrap_or_default(), &stage.metrics());

        if !has_errors(&result) {
            stage.cleanup(job);
        }

        result
    }

    /// Attach the reports of a stage to the job and decide whether the job
    /// needs to terminate. Warnings never terminate a job.
    fn maybe_terminate(
        &mut self,
        job: &mut I,
        index: usize,
        result: CompilerResult<()>,
    ) -> Result<(), ()> {
        if let Err(reports) = result {
            let kind = self.stages[index].kind();
            let unit = job.request().unit_name().to_string();
            let stage = job.request().stage();

            job.diagnostics_mut().extend(reports.into_iter().map(|mut report| {
                attribute(&mut report, kind, &unit, stage);
                report
            }));

            if job.has_errors() {
                log::debug!("`{unit}` stopped at the {kind} stage");
                return Err(());
            }
        }

        Ok(())
    }

    /// Run a job through every stage of the pipeline, stopping at the first
    /// stage that reports an error.
    pub fn run(&mut self, job: &mut I) -> Result<(), ()> {
        for stage in 0..self.stages.len() {
            let result = self.run_stage(job, stage);
            self.maybe_terminate(job, stage, result)?;
        }

        Ok(())
    }
}

fn has_errors(result: &CompilerResult<()>) -> bool {
    result.as_ref().err().is_some_and(|reports| reports.iter().any(Report::is_error))
}

/// Mark a report with the stage that produced it, the unit and the shader
/// stage it was produced for.
fn attribute(report: &mut Report, kind: CompilerStageKind, unit: &str, stage: ShaderStage) {
    report.title = format!("[{kind}] {}", report.title);

    if !report.notes.iter().any(|note| note.label == "unit") {
        report.add_note("unit", unit);
    }

    if !report.notes.iter().any(|note| note.label == "shader stage") {
        report.add_note("shader stage", stage);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use shade_pipeline::request::{CompileRequest, TargetDialect};
    use shade_reporting::report::ReportKind;

    use super::*;

    struct Job {
        request: CompileRequest,
        visited: Vec<CompilerStageKind>,
        cleaned: Vec<CompilerStageKind>,
        diagnostics: Vec<Report>,
    }

    impl CompilerInterface for Job {
        fn request(&self) -> &CompileRequest {
            &self.request
        }

        fn diagnostics(&self) -> &[Report] {
            &self.diagnostics
        }

        fn diagnostics_mut(&mut self) -> &mut Vec<Report> {
            &mut self.diagnostics
        }
    }

    struct Stage {
        kind: CompilerStageKind,
        outcome: Option<ReportKind>,
    }

    impl CompilerStage<Job> for Stage {
        fn run(&mut self, job: &mut Job) -> CompilerResult<()> {
            job.visited.push(self.kind);

            match self.outcome {
                Some(kind) => Err(vec![Report::new().kind(kind).title("stage said so").build()]),
                None => Ok(()),
            }
        }

        fn cleanup(&mut self, job: &mut Job) {
            job.cleaned.push(self.kind);
        }

        fn kind(&self) -> CompilerStageKind {
            self.kind
        }
    }

    fn job() -> Job {
        Job {
            request: CompileRequest::new(
                "",
                "sky.wgsl",
                "main",
                ShaderStage::Vertex,
                TargetDialect::SpirV,
            ),
            visited: vec![],
            cleaned: vec![],
            diagnostics: vec![],
        }
    }

    fn driver(reflect: Option<ReportKind>) -> Driver<Job> {
        Driver::new(vec![
            Box::new(Stage { kind: CompilerStageKind::FrontEnd, outcome: None }),
            Box::new(Stage { kind: CompilerStageKind::Reflect, outcome: reflect }),
            Box::new(Stage { kind: CompilerStageKind::CrossCompile, outcome: None }),
        ])
    }

    #[test]
    fn errors_short_circuit_the_pipeline() {
        let mut job = job();
        assert!(driver(Some(ReportKind::Error)).run(&mut job).is_err());

        assert_eq!(job.visited, [CompilerStageKind::FrontEnd, CompilerStageKind::Reflect]);
        assert_eq!(job.cleaned, [CompilerStageKind::FrontEnd]);
        assert_eq!(
            job.diagnostics[0].to_string(),
            "error: [reflection] stage said so\n  = unit: sky.wgsl\n  = shader stage: vertex"
        );
    }

    #[test]
    fn warnings_do_not_terminate() {
        let mut job = job();
        let mut driver = driver(Some(ReportKind::Warning));
        assert!(driver.run(&mut job).is_ok());

        assert_eq!(job.visited.len(), 3);
        assert_eq!(job.cleaned.len(), 3);
        assert!(job.diagnostics[0].is_warning());
        assert_eq!(driver.metrics().get(CompilerStageKind::CrossCompile).map(|m| m.runs), Some(1));
    }

    #[test]
    #[should_panic]
    fn stages_must_be_ordered() {
        let _ = Driver::<Job>::new(vec![
            Box::new(Stage { kind: CompilerStageKind::CrossCompile, outcome: None }),
            Box::new(Stage { kind: CompilerStageKind::FrontEnd, outcome: None }),
        ]);
    }
}
