//! Cross compilation of SPIR-V bytecode into the native shading languages.
//!
//! The bytecode is read back into a `naga` module and handed to the back-end
//! registered for the target dialect in [BACKENDS]. Resource bindings are
//! always mapped explicitly, a binding that a dialect can't carry over
//! unchanged fails the translation instead of being renumbered.
mod backend;
pub mod error;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use shade_pipeline::{
    request::{CompileRequest, ShaderStage, TargetDialect},
    settings::{DebugInfoLevel, OptimisationLevel},
};
use shade_reporting::report::Report;
use shade_spirv::{
    ReflectionTable,
    binary::{strip_debug_source, words_to_bytes},
};
use shade_utils::{log, timing::StageMetrics};

use crate::backend::EmitContext;
pub use crate::error::CrossCompileError;

/// Options that apply to every target dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossCompileOptions {
    pub unit_name: String,
    pub stage: ShaderStage,
    pub entry_point: String,

    /// Textual dialects get a leading comment that names the unit, the stage
    /// and the entry point. The `naga` back-ends have no debug symbols of
    /// their own, so names are kept at every level and there is no line
    /// mapping back to the source.
    pub debug_info: DebugInfoLevel,

    /// Debug builds keep bounds checks, as far as the dialect can express
    /// them.
    pub optimisation: OptimisationLevel,
}

impl CrossCompileOptions {
    pub fn from_request(request: &CompileRequest) -> Self {
        Self {
            unit_name: request.unit_name().to_string(),
            stage: request.stage(),
            entry_point: request.entry_point().to_string(),
            debug_info: request.debug_info(),
            optimisation: request.optimisation(),
        }
    }

    /// The comment that leads debug builds of textual dialects.
    fn banner(&self) -> String {
        format!(
            "// {}: {} stage, entry point `{}`\n",
            self.unit_name, self.stage, self.entry_point
        )
    }
}

/// The product of a cross compilation.
#[derive(Debug, Default)]
pub struct CrossCompileOutput {
    /// The native source, empty for the SPIR-V target and on failure.
    pub native_source: Vec<u8>,
    pub diagnostics: Vec<Report>,
}

impl CrossCompileOutput {
    pub fn is_success(&self) -> bool {
        !self.diagnostics.iter().any(Report::is_error)
    }
}

type Emitter = fn(&EmitContext<'_>) -> Result<String, CrossCompileError>;

struct Backend {
    dialect: TargetDialect,
    emit: Emitter,
}

/// The dispatch table of the native dialects.
const BACKENDS: &[Backend] = &[
    Backend { dialect: TargetDialect::Msl, emit: backend::msl::emit },
    Backend { dialect: TargetDialect::Hlsl, emit: backend::hlsl::emit },
    Backend { dialect: TargetDialect::Glsl, emit: backend::glsl::emit_desktop },
    Backend { dialect: TargetDialect::Essl, emit: backend::glsl::emit_es },
    Backend { dialect: TargetDialect::Wgsl, emit: backend::wgsl::emit },
];

/// Every dialect that [CrossCompiler::cross_compile] can produce.
pub fn supported_dialects() -> impl Iterator<Item = TargetDialect> {
    std::iter::once(TargetDialect::SpirV).chain(BACKENDS.iter().map(|backend| backend.dialect))
}

/// Read bytecode back into a `naga` module.
fn read_module(bytecode: &[u32]) -> Result<naga::Module, CrossCompileError> {
    let stripped = strip_debug_source(bytecode)?;
    let bytes = words_to_bytes(&stripped);
    Ok(naga::front::spv::parse_u8_slice(&bytes, &naga::front::spv::Options::default())?)
}

#[derive(Default)]
pub struct CrossCompiler {
    validator: Option<Validator>,
    metrics: StageMetrics,
}

impl CrossCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = StageMetrics::default();
    }

    /// Translate `bytecode` into `target`. The SPIR-V target is the identity
    /// and produces no native source.
    pub fn cross_compile(
        &mut self,
        bytecode: &[u32],
        target: TargetDialect,
        reflection: &ReflectionTable,
        options: &CrossCompileOptions,
    ) -> CrossCompileOutput {
        if target.is_intermediate() {
            return CrossCompileOutput::default();
        }

        match self.translate(bytecode, target, reflection, options) {
            Ok(source) => CrossCompileOutput { native_source: source.into_bytes(), diagnostics: vec![] },
            Err(error) => {
                log::error!("couldn't cross-compile `{}` to {target}: {error}", options.unit_name);

                CrossCompileOutput {
                    native_source: Vec::new(),
                    diagnostics: vec![error.create_report(&options.unit_name, target)],
                }
            }
        }
    }

    fn translate(
        &mut self,
        bytecode: &[u32],
        target: TargetDialect,
        reflection: &ReflectionTable,
        options: &CrossCompileOptions,
    ) -> Result<String, CrossCompileError> {
        let backend = BACKENDS
            .iter()
            .find(|backend| backend.dialect == target)
            .ok_or(CrossCompileError::UnsupportedTarget(target))?;

        let module = self.metrics.time_item("read", || read_module(bytecode))?;

        let info = self
            .metrics
            .time_item("validate", || {
                self.validator
                    .get_or_insert_with(|| Validator::new(ValidationFlags::all(), Capabilities::all()))
                    .validate(&module)
            })
            .map_err(|err| CrossCompileError::Validation(err.into_inner().to_string()))?;

        let entry = module.entry_points.first().ok_or(CrossCompileError::NoEntryPoint)?;
        let ctx = EmitContext { module: &module, info: &info, entry, reflection, options };

        let source = self.metrics.time_item(target.as_str(), || (backend.emit)(&ctx))?;

        if options.debug_info.is_enabled() {
            Ok(options.banner() + &source)
        } else {
            Ok(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use shade_frontend::FrontEnd;
    use shade_spirv::extract_reflection;

    use super::*;

    const FRAGMENT: &str = r#"
struct ParamsData {
    tint: vec4<f32>,
    scale: vec4<f32>,
}

@group(0) @binding(0) var<uniform> Params: ParamsData;
@group(0) @binding(1) var Tex: texture_2d<f32>;

@fragment
fn main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(Tex, vec2<i32>(position.xy), 0) * Params.tint * Params.scale;
}
"#;

    const SPACES: &str = r#"
struct Camera {
    view: mat4x4<f32>,
}

struct Model {
    world: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(1) @binding(0) var<uniform> model: Model;

@vertex
fn main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.view * model.world * vec4<f32>(position, 1.0);
}
"#;

    fn compile(source: &str, stage: ShaderStage, debug_info: DebugInfoLevel) -> (Vec<u32>, CrossCompileOptions) {
        let request = CompileRequest::new(source, "fixture.wgsl", "main", stage, TargetDialect::SpirV)
            .with_debug_info(debug_info);
        let output = FrontEnd::new().compile(&request);
        assert!(output.is_success(), "{:?}", output.diagnostics);

        (output.bytecode, CrossCompileOptions::from_request(&request))
    }

    fn translate(source: &str, stage: ShaderStage, target: TargetDialect) -> CrossCompileOutput {
        let (bytecode, options) = compile(source, stage, DebugInfoLevel::None);
        let reflection = extract_reflection(&bytecode).unwrap();
        CrossCompiler::new().cross_compile(&bytecode, target, &reflection, &options)
    }

    fn native(output: &CrossCompileOutput) -> &str {
        assert!(output.is_success(), "{:?}", output.diagnostics);
        std::str::from_utf8(&output.native_source).unwrap()
    }

    #[test]
    fn spirv_target_is_the_identity() {
        let output = translate(FRAGMENT, ShaderStage::Fragment, TargetDialect::SpirV);

        assert!(output.is_success());
        assert!(output.native_source.is_empty());
    }

    #[test]
    fn every_dialect_is_registered() {
        let dialects: Vec<_> = supported_dialects().collect();
        assert_eq!(dialects, TargetDialect::ALL);
    }

    #[test]
    fn hlsl_keeps_registers_and_spaces() {
        let fragment = translate(FRAGMENT, ShaderStage::Fragment, TargetDialect::Hlsl);
        let source = native(&fragment);
        assert!(source.contains("register(b0)"));
        assert!(source.contains("register(t1)"));

        let vertex = translate(SPACES, ShaderStage::Vertex, TargetDialect::Hlsl);
        let source = native(&vertex);
        assert!(source.contains("register(b0)"));
        assert!(source.contains("register(b0, space1)"));
    }

    #[test]
    fn msl_keeps_slots() {
        let output = translate(FRAGMENT, ShaderStage::Fragment, TargetDialect::Msl);
        let source = native(&output);

        assert!(source.contains("buffer(0)"));
        assert!(source.contains("texture(1)"));
    }

    #[test]
    fn msl_rejects_shared_slots() {
        let output = translate(SPACES, ShaderStage::Vertex, TargetDialect::Msl);

        assert!(!output.is_success());
        assert!(output.native_source.is_empty());
        assert_eq!(output.diagnostics[0].title, "couldn't cross-compile `fixture.wgsl` to msl");
    }

    #[test]
    fn glsl_keeps_binding_points() {
        let desktop = translate(FRAGMENT, ShaderStage::Fragment, TargetDialect::Glsl);
        let source = native(&desktop);
        assert!(source.starts_with("#version 450"));
        assert!(source.contains("binding = 0"));
        assert!(source.contains("binding = 1"));

        let es = translate(FRAGMENT, ShaderStage::Fragment, TargetDialect::Essl);
        assert!(native(&es).starts_with("#version 310 es"));

        let shared = translate(SPACES, ShaderStage::Vertex, TargetDialect::Glsl);
        assert!(!shared.is_success());
    }

    #[test]
    fn wgsl_round_trips_groups() {
        let output = translate(FRAGMENT, ShaderStage::Fragment, TargetDialect::Wgsl);
        let source = native(&output);

        assert!(source.contains("@group(0) @binding(0)"));
        assert!(source.contains("@group(0) @binding(1)"));
    }

    #[test]
    fn debug_builds_carry_a_banner() {
        let (bytecode, options) = compile(FRAGMENT, ShaderStage::Fragment, DebugInfoLevel::Full);
        let reflection = extract_reflection(&bytecode).unwrap();
        let output =
            CrossCompiler::new().cross_compile(&bytecode, TargetDialect::Hlsl, &reflection, &options);

        assert!(native(&output).starts_with("// fixture.wgsl: fragment stage, entry point `main`\n"));

        let plain = translate(FRAGMENT, ShaderStage::Fragment, TargetDialect::Hlsl);
        assert!(!native(&plain).starts_with("//"));
    }

    #[test]
    fn es_debug_builds_fetch_texels() {
        let output = translate(FRAGMENT, ShaderStage::Fragment, TargetDialect::Essl);
        let source = native(&output);

        assert!(source.starts_with("#version 310 es"));
        assert!(source.contains("texelFetch("));
        assert!(!source.contains("textureQueryLevels"));
    }

    #[test]
    fn malformed_bytecode_is_reported() {
        let options = CrossCompileOptions {
            unit_name: "broken.wgsl".into(),
            stage: ShaderStage::Fragment,
            entry_point: "main".into(),
            debug_info: DebugInfoLevel::None,
            optimisation: OptimisationLevel::Debug,
        };

        let output = CrossCompiler::new().cross_compile(
            &[0xdead_beef, 0, 0, 0, 0],
            TargetDialect::Msl,
            &ReflectionTable::default(),
            &options,
        );

        assert!(!output.is_success());
        assert!(output.diagnostics[0].to_string().contains("malformed bytecode"));
    }
}
