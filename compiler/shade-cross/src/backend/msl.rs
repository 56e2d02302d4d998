//! Metal Shading Language. Every resource is given the Metal slot equal to its
//! binding, so bindings must be unique per slot class across sets.
use naga::{AddressSpace, ImageClass, StorageAccess, TypeInner, back::msl};
use shade_pipeline::request::TargetDialect;
use shade_spirv::{ReflectedResource, ResourceKind};
use shade_utils::fxhash::FxHashMap;

use super::{EmitContext, first_free_slot, global_error, resource_error};
use crate::error::CrossCompileError;

const DIALECT: TargetDialect = TargetDialect::Msl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SlotClass {
    Buffer,
    Texture,
    Sampler,
}

impl SlotClass {
    fn of(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::UniformBuffer | ResourceKind::StorageBuffer => Some(SlotClass::Buffer),
            ResourceKind::SampledImage | ResourceKind::StorageImage => Some(SlotClass::Texture),
            ResourceKind::Sampler => Some(SlotClass::Sampler),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            SlotClass::Buffer => "buffer",
            SlotClass::Texture => "texture",
            SlotClass::Sampler => "sampler",
        }
    }
}

fn check_slots(ctx: &EmitContext<'_>) -> Result<(), CrossCompileError> {
    let mut claimed: FxHashMap<(SlotClass, u32), &ReflectedResource> = FxHashMap::default();

    for resource in ctx.reflection.descriptors() {
        let Some(class) = SlotClass::of(resource.kind) else {
            continue;
        };

        if resource.binding > u8::MAX as u32 {
            return Err(resource_error(DIALECT, resource, "Metal slots stop at 255"));
        }

        if let Some(other) = claimed.insert((class, resource.binding), resource) {
            return Err(resource_error(
                DIALECT,
                resource,
                format!(
                    "{} slot {} is already taken by `{}` in set {}",
                    class.as_str(),
                    resource.binding,
                    other.name,
                    other.set
                ),
            ));
        }
    }

    Ok(())
}

pub(crate) fn emit(ctx: &EmitContext<'_>) -> Result<String, CrossCompileError> {
    check_slots(ctx)?;

    let mut resources = msl::BindingMap::default();
    let mut buffers = Vec::new();

    for (global, binding) in ctx.bound_globals() {
        let slot = u8::try_from(binding.binding)
            .map_err(|_| global_error(DIALECT, global, binding, "Metal slots stop at 255"))?;

        let target = match global.space {
            AddressSpace::Uniform => msl::BindTarget { buffer: Some(slot), ..Default::default() },
            AddressSpace::Storage { access } => msl::BindTarget {
                buffer: Some(slot),
                mutable: access.contains(StorageAccess::STORE),
                ..Default::default()
            },
            AddressSpace::Handle => match ctx.handle_type(global) {
                TypeInner::Image { class, .. } => msl::BindTarget {
                    texture: Some(slot),
                    mutable: matches!(class, ImageClass::Storage { .. }),
                    ..Default::default()
                },
                TypeInner::Sampler { .. } => msl::BindTarget {
                    sampler: Some(msl::BindSamplerTarget::Resource(slot)),
                    ..Default::default()
                },
                _ => continue,
            },
            _ => continue,
        };

        if target.buffer.is_some() {
            buffers.push(binding.binding);
        }

        resources.insert(binding.clone(), target);
    }

    // Push constants and the runtime array sizes take the first buffer slots
    // that no resource uses.
    let mut allocate_buffer = || {
        let slot = first_free_slot(&buffers);
        buffers.push(slot);
        u8::try_from(slot).map_err(|_| CrossCompileError::Backend {
            dialect: DIALECT,
            message: "every Metal buffer slot is in use".to_string(),
        })
    };

    let push_constant_buffer =
        if ctx.has_push_constants() { Some(allocate_buffer()?) } else { None };
    let sizes_buffer = Some(allocate_buffer()?);

    let options = msl::Options {
        lang_version: (2, 1),
        per_entry_point_map: [(
            ctx.entry.name.clone(),
            msl::EntryPointResources { resources, push_constant_buffer, sizes_buffer },
        )]
        .into_iter()
        .collect(),
        fake_missing_bindings: false,
        bounds_check_policies: ctx.bounds_check_policies(DIALECT),
        ..Default::default()
    };

    let (source, info) =
        msl::write_string(ctx.module, ctx.info, &options, &msl::PipelineOptions::default())
            .map_err(|err| CrossCompileError::backend(DIALECT)(err.to_string()))?;

    for name in info.entry_point_names {
        name.map_err(|err| CrossCompileError::backend(DIALECT)(err.to_string()))?;
    }

    Ok(source)
}
