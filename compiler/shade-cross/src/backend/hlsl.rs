//! HLSL for shader model 5.1, descriptor sets become register spaces and
//! bindings become registers.
use naga::{AddressSpace, ArraySize, TypeInner, back::hlsl};
use shade_pipeline::request::TargetDialect;

use super::{EmitContext, first_free_slot, global_error, resource_error};
use crate::error::CrossCompileError;

const DIALECT: TargetDialect = TargetDialect::Hlsl;

pub(crate) fn emit(ctx: &EmitContext<'_>) -> Result<String, CrossCompileError> {
    if let Some(resource) = ctx.reflection.descriptors().find(|resource| resource.set > u8::MAX as u32)
    {
        return Err(resource_error(DIALECT, resource, "register spaces stop at 255"));
    }

    let mut binding_map = hlsl::BindingMap::default();
    let mut constant_registers = Vec::new();

    for (global, binding) in ctx.bound_globals() {
        let space = u8::try_from(binding.group)
            .map_err(|_| global_error(DIALECT, global, binding, "register spaces stop at 255"))?;

        if global.space == AddressSpace::Uniform && space == 0 {
            constant_registers.push(binding.binding);
        }

        let binding_array_size = match ctx.module.types[global.ty].inner {
            TypeInner::BindingArray { size: ArraySize::Constant(size), .. } => Some(size.get()),
            _ => None,
        };

        binding_map.insert(
            binding.clone(),
            hlsl::BindTarget { space, register: binding.binding, binding_array_size },
        );
    }

    let push_constants_target = ctx.has_push_constants().then(|| hlsl::BindTarget {
        space: 0,
        register: first_free_slot(&constant_registers),
        binding_array_size: None,
    });

    let options = hlsl::Options {
        shader_model: hlsl::ShaderModel::V5_1,
        binding_map,
        fake_missing_bindings: false,
        push_constants_target,
        ..Default::default()
    };

    let mut source = String::new();
    let info = hlsl::Writer::new(&mut source, &options)
        .write(ctx.module, ctx.info, None)
        .map_err(|err| CrossCompileError::backend(DIALECT)(err.to_string()))?;

    for name in info.entry_point_names {
        name.map_err(|err| CrossCompileError::backend(DIALECT)(err.to_string()))?;
    }

    Ok(source)
}
