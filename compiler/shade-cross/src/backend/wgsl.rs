//! WGSL, groups and bindings are carried by the module itself.
use naga::back::wgsl;
use shade_pipeline::request::TargetDialect;

use super::EmitContext;
use crate::error::CrossCompileError;

pub(crate) fn emit(ctx: &EmitContext<'_>) -> Result<String, CrossCompileError> {
    wgsl::write_string(ctx.module, ctx.info, wgsl::WriterFlags::empty())
        .map_err(|err| CrossCompileError::backend(TargetDialect::Wgsl)(err.to_string()))
}
