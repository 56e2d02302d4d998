//! SPIR-V emission for validated modules.
use std::path::Path;

use naga::{back::spv, valid::ModuleInfo};
use shade_pipeline::request::{CompileRequest, SourceLanguage};
use shade_reporting::report::Report;

/// Writer options for a request. Names are always emitted so that reflection
/// sees the declared names, source level debug information only when the
/// request asks for it.
fn writer_options<'a>(request: &'a CompileRequest, source: &'a str) -> spv::Options<'a> {
    let flags = spv::WriterFlags::DEBUG
        | spv::WriterFlags::ADJUST_COORDINATE_SPACE
        | spv::WriterFlags::LABEL_VARYINGS
        | spv::WriterFlags::CLAMP_FRAG_DEPTH;

    let debug_info = request.debug_info().is_enabled().then(|| spv::DebugInfo {
        source_code: source,
        file_name: Path::new(request.unit_name()),
        language: match request.language() {
            SourceLanguage::Wgsl => spv::SourceLanguage::WGSL,
            SourceLanguage::Glsl => spv::SourceLanguage::GLSL,
        },
    });

    spv::Options {
        flags,
        debug_info,
        bounds_check_policies: request.optimisation().bounds_check_policies(),
        ..spv::Options::default()
    }
}

/// Write the requested entry point of `module` as SPIR-V words.
pub(crate) fn write_spirv(
    module: &naga::Module,
    info: &ModuleInfo,
    request: &CompileRequest,
    stage: naga::ShaderStage,
    source: &str,
) -> Result<Vec<u32>, Report> {
    let options = writer_options(request, source);
    let pipeline = spv::PipelineOptions {
        shader_stage: stage,
        entry_point: request.entry_point().to_string(),
    };

    spv::write_vec(module, info, &options, Some(&pipeline)).map_err(|error| {
        Report::new()
            .title(format!("failed to emit SPIR-V for `{}`", request.unit_name()))
            .add_note("writer", error)
            .build()
    })
}
