//! The shade front-end, compiles WGSL or GLSL units into SPIR-V words.
//!
//! The `naga` front-ends and the validator are created on first use and then
//! reused for every following request, they are dropped along with the
//! [FrontEnd].
mod emit;
pub mod preprocess;

use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use shade_pipeline::{
    error::EnvironmentError,
    request::{CompileRequest, ShaderStage, SourceLanguage},
};
use shade_reporting::{report::Report, reporter::Reporter};
use shade_utils::{log, printing::SequenceDisplay, timing::StageMetrics};

pub use crate::preprocess::{PreprocessedSource, collect_dependencies, preprocess};

/// The product of compiling a single request.
#[derive(Debug, Default)]
pub struct FrontEndOutput {
    /// The SPIR-V words, empty when compilation failed.
    pub bytecode: Vec<u32>,

    /// Every report produced while compiling, warnings can be present even
    /// when compilation succeeded.
    pub diagnostics: Vec<Report>,
}

impl FrontEndOutput {
    pub fn is_success(&self) -> bool {
        !self.bytecode.is_empty() && !self.diagnostics.iter().any(Report::is_error)
    }
}

/// Map a pipeline stage onto the stages that `naga` can compile.
pub fn naga_stage(stage: ShaderStage) -> Option<naga::ShaderStage> {
    match stage {
        ShaderStage::Vertex => Some(naga::ShaderStage::Vertex),
        ShaderStage::Fragment => Some(naga::ShaderStage::Fragment),
        ShaderStage::Compute => Some(naga::ShaderStage::Compute),
        ShaderStage::Geometry | ShaderStage::Hull | ShaderStage::Domain => None,
    }
}

fn stage_name(stage: naga::ShaderStage) -> &'static str {
    match stage {
        naga::ShaderStage::Vertex => "vertex",
        naga::ShaderStage::Fragment => "fragment",
        naga::ShaderStage::Compute => "compute",
    }
}

/// Create an error report about `request`.
fn error(request: &CompileRequest, title: impl ToString) -> Report {
    Report::new().title(title).add_note("shader stage", request.stage()).build()
}

/// The lazily created `naga` state.
#[derive(Default)]
struct NagaSession {
    #[cfg(feature = "wgsl")]
    wgsl: Option<naga::front::wgsl::Frontend>,

    #[cfg(feature = "glsl")]
    glsl: Option<naga::front::glsl::Frontend>,

    validator: Option<Validator>,
}

impl NagaSession {
    #[allow(unused_variables)]
    fn parse(
        &mut self,
        request: &CompileRequest,
        stage: naga::ShaderStage,
        source: &str,
    ) -> Result<naga::Module, Report> {
        let failed = |message: String| {
            Report::new()
                .title(format!("failed to parse `{}`", request.unit_name()))
                .add_note("parser", message)
                .build()
        };

        match request.language() {
            #[cfg(feature = "wgsl")]
            SourceLanguage::Wgsl => self
                .wgsl
                .get_or_insert_with(naga::front::wgsl::Frontend::new)
                .parse(source)
                .map_err(|err| failed(err.emit_to_string_with_path(source, request.unit_name()))),

            #[cfg(feature = "glsl")]
            SourceLanguage::Glsl => {
                let options = naga::front::glsl::Options {
                    stage,
                    defines: request.macro_defines().iter().cloned().collect(),
                };

                self.glsl
                    .get_or_insert_with(Default::default)
                    .parse(&options, source)
                    .map_err(|err| failed(err.emit_to_string(source)))
            }

            #[allow(unreachable_patterns)]
            language => Err(error(
                request,
                format!("the {language} front-end is not available in this build"),
            )),
        }
    }

    fn validate(
        &mut self,
        request: &CompileRequest,
        module: &naga::Module,
        source: &str,
    ) -> Result<ModuleInfo, Report> {
        self.validator
            .get_or_insert_with(|| Validator::new(ValidationFlags::all(), Capabilities::all()))
            .validate(module)
            .map_err(|err| {
                Report::new()
                    .title(format!("`{}` failed validation", request.unit_name()))
                    .add_note("validator", err.emit_to_string_with_path(source, request.unit_name()))
                    .build()
            })
    }
}

/// Verify that the module has an entry point of the requested name and stage.
fn check_entry_point(
    module: &naga::Module,
    request: &CompileRequest,
    stage: naga::ShaderStage,
) -> Result<(), Report> {
    let name = request.entry_point();

    match module.entry_points.iter().find(|entry| entry.name == name) {
        Some(entry) if entry.stage == stage => Ok(()),
        Some(entry) => Err(error(
            request,
            format!(
                "entry point `{name}` of `{}` is a {} entry point, not a {} one",
                request.unit_name(),
                stage_name(entry.stage),
                stage_name(stage)
            ),
        )),
        None => {
            let mut report =
                error(request, format!("`{}` has no entry point named `{name}`", request.unit_name()));

            let available: Vec<_> = module.entry_points.iter().map(|entry| &entry.name).collect();
            if !available.is_empty() {
                report.add_note("available entry points", SequenceDisplay::all(&available));
            }

            Err(report)
        }
    }
}

/// The front-end compiler.
#[derive(Default)]
pub struct FrontEnd {
    session: NagaSession,
    metrics: StageMetrics,
}

impl FrontEnd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that at least one shading language front-end was compiled in.
    pub fn probe() -> Result<(), EnvironmentError> {
        if cfg!(any(feature = "wgsl", feature = "glsl")) {
            Ok(())
        } else {
            Err(EnvironmentError::NoFrontEnds)
        }
    }

    /// Whether units written in `language` can be compiled.
    pub fn is_language_available(language: SourceLanguage) -> bool {
        match language {
            SourceLanguage::Wgsl => cfg!(feature = "wgsl"),
            SourceLanguage::Glsl => cfg!(feature = "glsl"),
        }
    }

    /// Timings of the sections of every compilation since the last reset.
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = StageMetrics::default();
    }

    /// Compile a request into SPIR-V. Failures are reported in the output,
    /// which then has no bytecode.
    pub fn compile(&mut self, request: &CompileRequest) -> FrontEndOutput {
        let mut reporter = Reporter::new();

        let bytecode = match self.compile_module(request, &mut reporter) {
            Ok(words) => words,
            Err(report) => {
                log::debug!("front-end rejected `{}`: {}", request.unit_name(), report.title);
                reporter.add_report(report);
                Vec::new()
            }
        };

        FrontEndOutput { bytecode, diagnostics: reporter.into_reports() }
    }

    fn compile_module(
        &mut self,
        request: &CompileRequest,
        reporter: &mut Reporter,
    ) -> Result<Vec<u32>, Report> {
        let language = request.language();
        if !Self::is_language_available(language) {
            return Err(error(
                request,
                format!("the {language} front-end is not available in this build"),
            ));
        }

        if request.source_text().trim().is_empty() {
            return Err(error(request, format!("`{}` contains no source", request.unit_name())));
        }

        let stage = naga_stage(request.stage()).ok_or_else(|| {
            error(request, format!("the front-end can't compile {} shaders", request.stage()))
        })?;

        let preprocessed = self
            .metrics
            .time_item("preprocess", || preprocess(request))
            .map_err(|err| err.create_report())?;

        for warning in preprocessed.warnings {
            reporter.add_report(warning);
        }

        let source = preprocessed.text;
        let module = self.metrics.time_item("parse", || self.session.parse(request, stage, &source))?;

        check_entry_point(&module, request, stage)?;

        let info =
            self.metrics.time_item("validate", || self.session.validate(request, &module, &source))?;

        self.metrics.time_item("emit", || emit::write_spirv(&module, &info, request, stage, &source))
    }
}
