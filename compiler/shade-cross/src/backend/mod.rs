//! The `naga` back-ends, one module per family of dialects. Every back-end is
//! a plain function from an [EmitContext] to the native source.
pub(crate) mod glsl;
pub(crate) mod hlsl;
pub(crate) mod msl;
pub(crate) mod wgsl;

use naga::{
    AddressSpace, GlobalVariable, ResourceBinding, TypeInner,
    proc::{BoundsCheckPolicies, BoundsCheckPolicy},
};
use shade_pipeline::{request::TargetDialect, settings::OptimisationLevel};
use shade_spirv::{ReflectedResource, ReflectionTable};

use crate::{CrossCompileOptions, error::CrossCompileError};

/// Everything a back-end needs to translate one module.
pub(crate) struct EmitContext<'a> {
    pub module: &'a naga::Module,
    pub info: &'a naga::valid::ModuleInfo,
    pub entry: &'a naga::EntryPoint,
    pub reflection: &'a ReflectionTable,
    pub options: &'a CrossCompileOptions,
}

impl EmitContext<'_> {
    /// Global variables that are bound through descriptors.
    pub fn bound_globals(&self) -> impl Iterator<Item = (&GlobalVariable, &ResourceBinding)> {
        self.module
            .global_variables
            .iter()
            .filter_map(|(_, global)| global.binding.as_ref().map(|binding| (global, binding)))
    }

    /// The type of a handle global, looking through binding arrays.
    pub fn handle_type(&self, global: &GlobalVariable) -> &TypeInner {
        match &self.module.types[global.ty].inner {
            TypeInner::BindingArray { base, .. } => &self.module.types[*base].inner,
            inner => inner,
        }
    }

    pub fn has_push_constants(&self) -> bool {
        self.module
            .global_variables
            .iter()
            .any(|(_, global)| global.space == AddressSpace::PushConstant)
    }

    pub fn bounds_check_policies(&self, dialect: TargetDialect) -> BoundsCheckPolicies {
        dialect_policies(self.options.optimisation, dialect)
    }
}

/// The bounds checks of `optimisation` that `dialect` can express. Restricted
/// image loads clamp the level with `textureQueryLevels`, which GLSL ES lacks.
pub(crate) fn dialect_policies(
    optimisation: OptimisationLevel,
    dialect: TargetDialect,
) -> BoundsCheckPolicies {
    let mut policies = optimisation.bounds_check_policies();

    if dialect == TargetDialect::Essl {
        policies.image_load = BoundsCheckPolicy::Unchecked;
    }

    policies
}

/// An error about a reflected resource.
pub(crate) fn resource_error(
    dialect: TargetDialect,
    resource: &ReflectedResource,
    reason: impl Into<String>,
) -> CrossCompileError {
    CrossCompileError::Binding {
        dialect,
        resource: resource.name.clone(),
        set: resource.set,
        binding: resource.binding,
        reason: reason.into(),
    }
}

/// An error about a global of the re-read module.
pub(crate) fn global_error(
    dialect: TargetDialect,
    global: &GlobalVariable,
    binding: &ResourceBinding,
    reason: impl Into<String>,
) -> CrossCompileError {
    CrossCompileError::Binding {
        dialect,
        resource: global.name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
        set: binding.group,
        binding: binding.binding,
        reason: reason.into(),
    }
}

/// The lowest slot that isn't in `used`.
pub(crate) fn first_free_slot(used: &[u32]) -> u32 {
    (0..u32::MAX).find(|slot| !used.contains(slot)).unwrap_or(u32::MAX)
}
