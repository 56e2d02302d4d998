//! Desktop GLSL and GLSL ES. GLSL has no descriptor sets, so a binding can
//! only be used by one set and must fit the binding map of the writer.
use naga::back::glsl;
use shade_pipeline::request::TargetDialect;
use shade_spirv::ReflectedResource;
use shade_utils::fxhash::FxHashMap;

use super::{EmitContext, global_error, resource_error};
use crate::error::CrossCompileError;

pub(crate) fn emit_desktop(ctx: &EmitContext<'_>) -> Result<String, CrossCompileError> {
    emit(ctx, TargetDialect::Glsl, glsl::Version::Desktop(450))
}

pub(crate) fn emit_es(ctx: &EmitContext<'_>) -> Result<String, CrossCompileError> {
    emit(ctx, TargetDialect::Essl, glsl::Version::new_gles(310))
}

fn check_bindings(ctx: &EmitContext<'_>, dialect: TargetDialect) -> Result<(), CrossCompileError> {
    let mut claimed: FxHashMap<u32, &ReflectedResource> = FxHashMap::default();

    for resource in ctx.reflection.descriptors() {
        if resource.binding > u8::MAX as u32 {
            return Err(resource_error(dialect, resource, "binding points stop at 255"));
        }

        match claimed.get(&resource.binding) {
            Some(other) if other.set != resource.set => {
                return Err(resource_error(
                    dialect,
                    resource,
                    format!("binding {} is also used by `{}` in set {}", resource.binding, other.name, other.set),
                ));
            }
            _ => {
                claimed.insert(resource.binding, resource);
            }
        }
    }

    Ok(())
}

fn emit(
    ctx: &EmitContext<'_>,
    dialect: TargetDialect,
    version: glsl::Version,
) -> Result<String, CrossCompileError> {
    check_bindings(ctx, dialect)?;

    let mut binding_map = glsl::BindingMap::default();
    for (global, binding) in ctx.bound_globals() {
        let point = u8::try_from(binding.binding)
            .map_err(|_| global_error(dialect, global, binding, "binding points stop at 255"))?;
        binding_map.insert(binding.clone(), point);
    }

    let options = glsl::Options {
        version,
        writer_flags: glsl::WriterFlags::ADJUST_COORDINATE_SPACE,
        binding_map,
        zero_initialize_workgroup_memory: true,
    };

    let pipeline = glsl::PipelineOptions {
        shader_stage: ctx.entry.stage,
        entry_point: ctx.entry.name.clone(),
        multiview: None,
    };

    let failed = CrossCompileError::backend(dialect);
    let mut source = String::new();

    let mut writer = glsl::Writer::new(
        &mut source,
        ctx.module,
        ctx.info,
        &options,
        &pipeline,
        ctx.bounds_check_policies(dialect),
    )
    .map_err(|err| failed(err.to_string()))?;
    writer.write().map_err(|err| failed(err.to_string()))?;
    drop(writer);

    Ok(source)
}
