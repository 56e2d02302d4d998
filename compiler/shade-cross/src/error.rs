//! Errors of the cross compiler. Each of them means that the target dialect
//! can't express the module, none of them are fatal to the compiler.
use shade_pipeline::request::TargetDialect;
use shade_reporting::report::{Report, ReportKind};
use shade_spirv::SpirvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrossCompileError {
    /// No back-end in the dispatch table produces the dialect.
    #[error("no back-end produces {0}")]
    UnsupportedTarget(TargetDialect),

    #[error("malformed bytecode, {0}")]
    Bytecode(#[from] SpirvError),

    /// The bytecode couldn't be read back into a module.
    #[error("couldn't read the bytecode, {0}")]
    Read(#[from] naga::front::spv::Error),

    #[error("the bytecode doesn't describe a valid module, {0}")]
    Validation(String),

    #[error("the bytecode has no entry point")]
    NoEntryPoint,

    /// A resource binding can't be carried over into the dialect unchanged.
    #[error("`{resource}` at set {set}, binding {binding} can't be expressed in {dialect}, {reason}")]
    Binding {
        dialect: TargetDialect,
        resource: String,
        set: u32,
        binding: u32,
        reason: String,
    },

    /// The `naga` back-end rejected the module.
    #[error("the {dialect} writer failed, {message}")]
    Backend { dialect: TargetDialect, message: String },
}

impl CrossCompileError {
    pub(crate) fn backend(dialect: TargetDialect) -> impl Fn(String) -> Self {
        move |message| CrossCompileError::Backend { dialect, message }
    }

    /// Create a [Report] for a failed translation of `unit` into `dialect`.
    pub fn create_report(&self, unit: &str, dialect: TargetDialect) -> Report {
        Report::new()
            .kind(ReportKind::Error)
            .title(format!("couldn't cross-compile `{unit}` to {dialect}"))
            .add_note("reason", self)
            .build()
    }
}
