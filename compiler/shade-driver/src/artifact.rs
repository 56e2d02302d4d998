//! The product of compiling a single request.
use shade_pipeline::request::CompileRequest;
use shade_spirv::ReflectionTable;

/// A compiled shader. Artifacts are plain values, the cache hands out
/// clones of the artifacts it stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// The SPIR-V of the shader, kept for every target so that reflection can
    /// always be recomputed.
    pub bytecode: Vec<u32>,

    /// The shader in the target dialect, empty for the SPIR-V target.
    pub native_source: Vec<u8>,

    pub reflection: ReflectionTable,

    /// Every report that the compiler produced, rendered as plain text.
    pub diagnostics: String,

    pub is_valid: bool,

    /// The [`CompileRequest::content_hash`] of the request that produced
    /// this artifact.
    pub content_hash: u64,
}

impl CompiledArtifact {
    /// Create an artifact for a request that failed to compile.
    pub fn invalid(request: &CompileRequest, diagnostics: impl Into<String>) -> Self {
        Self {
            diagnostics: diagnostics.into(),
            is_valid: false,
            content_hash: request.content_hash(),
            ..Default::default()
        }
    }

    /// The native source as text, when there is any.
    pub fn native_source_str(&self) -> Option<&str> {
        if self.native_source.is_empty() {
            return None;
        }

        std::str::from_utf8(&self.native_source).ok()
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
