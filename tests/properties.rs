//! Properties of the session and the cache that only show up when real
//! shaders are compiled: idempotent lookups, invalidation, persistence and
//! the isolation of failing requests.
#![cfg(test)]

use std::{fs, path::Path};

use pretty_assertions::assert_eq;
use shade_cache::{CacheError, ShaderCache, format::CACHE_FILE_NAME};
use shade_driver::{CompiledArtifact, CrossCompilerFacade};
use shade_pipeline::{
    request::{CompileOptions, ShaderStage, TargetDialect},
    settings::CompilerSettings,
};
use shade_session::ShaderSession;
use shade_spirv::{ResourceKind, SpirvModule, extract_reflection};

const TEXTURED: &str = r#"
struct ParamsData {
    tint: vec4<f32>,
    scale: vec4<f32>,
}

@group(0) @binding(0) var<uniform> Params: ParamsData;
@group(0) @binding(1) var Tex: texture_2d<f32>;

struct FragmentOutput {
    @location(0) color: vec4<f32>,
}

@fragment
fn main(@builtin(position) position: vec4<f32>) -> FragmentOutput {
    let texel = textureLoad(Tex, vec2<i32>(position.xy), 0);
    return FragmentOutput(texel * Params.tint * Params.scale);
}
"#;

const SCALED: &str = r#"
@fragment
fn main() -> @location(0) vec4<f32> {
    return vec4<f32>(SCALE, SCALE, SCALE, 1.0);
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

const TINTED: &str = r#"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 o_colour;

void main() {
    vec4 colour = vec4(v_uv, 0.0, 1.0);
#ifdef TINT
    colour *= vec4(TINT);
#endif
    o_colour = colour;
}
"#;

fn fragment(target: TargetDialect) -> CompileOptions {
    CompileOptions { target, ..Default::default() }
}

fn memory_session() -> ShaderSession {
    let mut settings = CompilerSettings { persistent_cache: false, ..Default::default() };
    settings.set_emit_errors(false);
    ShaderSession::initialise(settings).unwrap()
}

fn persistent_session(directory: &Path) -> ShaderSession {
    let mut settings = CompilerSettings::with_cache_directory(directory);
    settings.set_emit_errors(false);
    ShaderSession::initialise(settings).unwrap()
}

fn native(artifact: &CompiledArtifact) -> &str {
    assert!(artifact.is_valid, "{}", artifact.diagnostics);
    artifact.native_source_str().unwrap()
}

#[test]
fn lookups_are_idempotent() {
    let mut session = memory_session();

    for target in TargetDialect::ALL {
        let first = session.get_or_compile_shader(TEXTURED, "textured.wgsl", &fragment(target));
        let second = session.get_or_compile_shader(TEXTURED, "textured.wgsl", &fragment(target));

        assert!(first.is_valid, "{target}: {}", first.diagnostics);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.bytecode, second.bytecode);
        assert_eq!(first.native_source, second.native_source);
    }

    let stats = session.cache_stats();
    assert_eq!(stats.hits, TargetDialect::ALL.len());
    assert_eq!(stats.misses, TargetDialect::ALL.len());
}

#[test]
fn recompilation_is_deterministic() {
    let mut session = memory_session();
    let options = fragment(TargetDialect::Hlsl);

    let first = session.get_or_compile_shader(TEXTURED, "textured.wgsl", &options);
    session.invalidate_all();
    let second = session.get_or_compile_shader(TEXTURED, "textured.wgsl", &options);

    assert_eq!(session.cache_stats().misses, 2);
    assert_eq!(first, second);
}

#[test]
fn invalidated_units_are_recompiled() {
    let mut session = memory_session();
    let options = fragment(TargetDialect::Msl);

    session.get_or_compile_shader(TEXTURED, "textured.wgsl", &options);
    session.get_or_compile_shader(TEXTURED, "other.wgsl", &options);
    assert_eq!(session.invalidate_unit("textured.wgsl"), 1);
    assert_eq!(session.invalidate_unit("textured.wgsl"), 0);

    session.get_or_compile_shader(TEXTURED, "textured.wgsl", &options);
    session.get_or_compile_shader(TEXTURED, "other.wgsl", &options);

    let stats = session.cache_stats();
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 2);
}

#[test]
fn defines_are_part_of_the_key() {
    let mut session = memory_session();
    let half = CompileOptions {
        macro_defines: vec![("SCALE".into(), "0.5".into())],
        ..fragment(TargetDialect::SpirV)
    };
    let double = CompileOptions {
        macro_defines: vec![("SCALE".into(), "2.0".into())],
        ..fragment(TargetDialect::SpirV)
    };

    let first = session.get_or_compile_shader(SCALED, "scaled.wgsl", &half);
    let second = session.get_or_compile_shader(SCALED, "scaled.wgsl", &double);

    assert!(first.is_valid && second.is_valid);
    assert!(!first.has_diagnostics());
    assert_ne!(first.content_hash, second.content_hash);
    assert_ne!(first.bytecode, second.bytecode);
    assert_eq!(session.cache_stats().entries, 2);
}

#[test]
fn reflection_lists_every_resource_once() {
    let mut session = memory_session();
    let artifact =
        session.get_or_compile_shader(TEXTURED, "textured.wgsl", &fragment(TargetDialect::SpirV));
    assert!(artifact.is_valid, "{}", artifact.diagnostics);

    let table = &artifact.reflection;
    assert_eq!(table.len(), 3);
    assert_eq!(table.stage, Some(ShaderStage::Fragment));

    let params = table.find("Params").unwrap();
    assert_eq!((params.kind, params.set, params.binding), (ResourceKind::UniformBuffer, 0, 0));

    let tex = table.find("Tex").unwrap();
    assert_eq!((tex.kind, tex.set, tex.binding), (ResourceKind::SampledImage, 0, 1));

    assert_eq!(table.stage_outputs.len(), 1);
    assert_eq!(table.stage_outputs[0].binding, 0);
    assert!(table.check_unique_bindings().is_ok());

    // The table is a function of the bytecode alone.
    assert_eq!(&extract_reflection(&artifact.bytecode).unwrap(), table);
}

#[test]
fn bindings_are_preserved_in_native_sources() {
    let mut session = memory_session();

    let hlsl = session.get_or_compile_shader(TEXTURED, "textured.wgsl", &fragment(TargetDialect::Hlsl));
    let source = native(&hlsl);
    assert!(source.contains("register(b0)"));
    assert!(source.contains("register(t1)"));

    let msl = session.get_or_compile_shader(TEXTURED, "textured.wgsl", &fragment(TargetDialect::Msl));
    let source = native(&msl);
    assert!(source.contains("buffer(0)"));
    assert!(source.contains("texture(1)"));

    let glsl = session.get_or_compile_shader(TEXTURED, "textured.wgsl", &fragment(TargetDialect::Glsl));
    let source = native(&glsl);
    assert!(source.contains("binding = 0"));
    assert!(source.contains("binding = 1"));
}

#[test]
fn shared_metal_slots_fail_to_cross_compile() {
    let mut session = memory_session();
    let options = CompileOptions {
        stage: ShaderStage::Vertex,
        target: TargetDialect::Msl,
        ..Default::default()
    };

    let artifact = session.get_or_compile_shader(SPACES, "spaces.wgsl", &options);
    assert!(!artifact.is_valid);
    assert!(artifact.bytecode.is_empty());
    assert!(artifact.diagnostics.contains("[cross-compile] couldn't cross-compile `spaces.wgsl` to msl"));
    assert_eq!(session.cache_stats().entries, 0);

    // Other dialects keep descriptor sets apart.
    let hlsl = CompileOptions { target: TargetDialect::Hlsl, ..options };
    assert!(session.get_or_compile_shader(SPACES, "spaces.wgsl", &hlsl).is_valid);
}

#[test]
fn caches_survive_a_restart() {
    let directory = tempfile::tempdir().unwrap();
    let targets = [TargetDialect::SpirV, TargetDialect::Hlsl, TargetDialect::Wgsl];

    let mut session = persistent_session(directory.path());
    let compiled: Vec<_> = targets
        .iter()
        .map(|target| session.get_or_compile_shader(TEXTURED, "textured.wgsl", &fragment(*target)))
        .collect();
    session.shutdown();

    assert!(directory.path().join(CACHE_FILE_NAME).is_file());

    let mut session = persistent_session(directory.path());
    assert_eq!(session.cache_stats().entries, targets.len());

    for (target, artifact) in targets.iter().zip(&compiled) {
        let cached = session.get_or_compile_shader(TEXTURED, "textured.wgsl", &fragment(*target));
        assert_eq!(&cached, artifact);
    }

    let stats = session.cache_stats();
    assert_eq!(stats.hits, targets.len());
    assert_eq!(stats.misses, 0);
}

#[test]
fn unusable_cache_files_leave_a_working_cache() {
    let directory = tempfile::tempdir().unwrap();
    let file = directory.path().join(CACHE_FILE_NAME);
    let options = fragment(TargetDialect::Hlsl);

    let mut session = persistent_session(directory.path());
    session.get_or_compile_shader(TEXTURED, "textured.wgsl", &options);
    session.shutdown();

    let valid = fs::read(&file).unwrap();
    let truncated = valid[..valid.len() / 2].to_vec();
    let garbage = b"definitely not a shader cache".to_vec();

    for contents in [truncated, garbage, Vec::new()] {
        fs::write(&file, contents).unwrap();

        let mut session = persistent_session(directory.path());
        assert_eq!(session.cache_stats().entries, 0);
        assert!(session.get_or_compile_shader(TEXTURED, "textured.wgsl", &options).is_valid);
        assert_eq!(session.cache_stats().misses, 1);
        session.shutdown();

        // The next save replaces the unusable file.
        let session = persistent_session(directory.path());
        assert_eq!(session.cache_stats().entries, 1);
    }
}

#[test]
fn other_format_versions_are_discarded() {
    let directory = tempfile::tempdir().unwrap();
    let file = directory.path().join(CACHE_FILE_NAME);

    let mut cache = ShaderCache::with_directory(CrossCompilerFacade::new().unwrap(), directory.path());
    let request = fragment(TargetDialect::SpirV).to_request(TEXTURED, "textured.wgsl");
    assert!(cache.get_or_compile(&request).is_valid);
    cache.save_to_disk().unwrap();

    let mut bytes = fs::read(&file).unwrap();
    bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
    fs::write(&file, bytes).unwrap();

    let mut cache = ShaderCache::with_directory(CrossCompilerFacade::new().unwrap(), directory.path());
    match cache.load_from_disk() {
        Err(CacheError::VersionMismatch { expected, found }) => assert_eq!((expected, found), (1, 2)),
        other => panic!("expected a version mismatch, got {other:?}"),
    }
    assert!(cache.is_empty());
}

#[test]
fn failures_are_isolated_within_a_batch() {
    let mut session = memory_session();
    let targets = [
        TargetDialect::SpirV,
        TargetDialect::Hlsl,
        TargetDialect::Msl,
        TargetDialect::Glsl,
        TargetDialect::Wgsl,
    ];

    let artifacts: Vec<_> = targets
        .iter()
        .enumerate()
        .map(|(index, target)| {
            let entry_point = if index == 2 { "fs_main" } else { "main" };
            let options = CompileOptions { entry_point: entry_point.into(), ..fragment(*target) };
            session.get_or_compile_shader(TEXTURED, &format!("batch_{index}.wgsl"), &options)
        })
        .collect();

    for (index, artifact) in artifacts.iter().enumerate() {
        if index == 2 {
            assert!(!artifact.is_valid);
            assert!(artifact.diagnostics.contains("has no entry point named `fs_main`"));
        } else {
            assert!(artifact.is_valid, "{index}: {}", artifact.diagnostics);
            assert!(!artifact.has_diagnostics());
        }
    }

    assert_eq!(session.cache_stats().entries, 4);
}

#[test]
fn changed_includes_evict_entries() {
    let directory = tempfile::tempdir().unwrap();
    let unit = directory.path().join("lit.wgsl");
    let common = directory.path().join("common.wgsl");

    fs::write(&common, "fn brightness() -> f32 {\n    return 0.5;\n}\n").unwrap();
    fs::write(
        &unit,
        "#include \"common.wgsl\"\n\n@fragment\nfn main() -> @location(0) vec4<f32> {\n    return vec4<f32>(brightness());\n}\n",
    )
    .unwrap();

    let mut session = memory_session();
    let options = fragment(TargetDialect::SpirV);

    let first = session.get_or_compile_shader_file(&unit, &options);
    assert!(first.is_valid, "{}", first.diagnostics);
    assert_eq!(session.get_or_compile_shader_file(&unit, &options), first);
    assert_eq!(session.cache_stats().hits, 1);

    fs::write(&common, "fn brightness() -> f32 {\n    return 0.75;\n}\n").unwrap();

    let second = session.get_or_compile_shader_file(&unit, &options);
    assert!(second.is_valid);
    assert_eq!(first.content_hash, second.content_hash);
    assert_ne!(first.bytecode, second.bytecode);

    let stats = session.cache_stats();
    assert_eq!(stats.stale, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.entries, 1);
}

#[test]
fn glsl_units_use_request_defines() {
    let mut session = memory_session();
    let tinted = CompileOptions {
        macro_defines: vec![("TINT".into(), "0.5".into())],
        ..fragment(TargetDialect::Hlsl)
    };

    let plain = session.get_or_compile_shader(TINTED, "tinted.frag", &fragment(TargetDialect::Hlsl));
    let defined = session.get_or_compile_shader(TINTED, "tinted.frag", &tinted);

    assert!(!plain.has_diagnostics(), "{}", plain.diagnostics);
    assert!(!defined.has_diagnostics(), "{}", defined.diagnostics);
    assert_ne!(native(&plain), native(&defined));
    assert_eq!(defined.reflection.stage_inputs.len(), 1);
    assert_eq!(defined.reflection.stage_outputs.len(), 1);
}

#[test]
fn malformed_bytecode_is_rejected() {
    assert!(SpirvModule::parse(&[]).is_err());
    assert!(SpirvModule::parse(&[0xdead_beef, 0x0001_0000, 0, 1, 0]).is_err());
    assert!(extract_reflection(&[0x0723_0203, 0x0001_0000]).is_err());
}
