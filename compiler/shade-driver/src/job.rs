//! The state of a single request as it moves through the pipeline.
use std::fmt;

use shade_pipeline::{interface::CompilerInterface, request::CompileRequest};
use shade_reporting::report::{Report, render_reports};
use shade_spirv::ReflectionTable;
use shade_utils::log;

use crate::artifact::CompiledArtifact;

/// Where a [CompileJob] is within the pipeline. Every job starts in
/// [`CompileState::Start`] and ends in either [`CompileState::Done`] or
/// [`CompileState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileState {
    Start,
    FrontEndCompiled,
    ReflectionExtracted,
    CrossCompiled,
    Done,
    Failed,
}

impl CompileState {
    /// Whether the job can move from this state into `next`.
    pub fn can_advance_to(self, next: CompileState) -> bool {
        use CompileState::*;

        matches!(
            (self, next),
            (Start, FrontEndCompiled)
                | (FrontEndCompiled, ReflectionExtracted)
                | (ReflectionExtracted, CrossCompiled)
                | (CrossCompiled, Done)
                | (Start | FrontEndCompiled | ReflectionExtracted | CrossCompiled, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CompileState::Done | CompileState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompileState::Start => "start",
            CompileState::FrontEndCompiled => "front-end compiled",
            CompileState::ReflectionExtracted => "reflection extracted",
            CompileState::CrossCompiled => "cross-compiled",
            CompileState::Done => "done",
            CompileState::Failed => "failed",
        }
    }
}

impl fmt::Display for CompileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request that is being compiled, along with everything that the stages
/// have produced for it so far.
#[derive(Debug)]
pub struct CompileJob {
    pub(crate) request: CompileRequest,
    pub(crate) state: CompileState,
    pub(crate) bytecode: Vec<u32>,
    pub(crate) reflection: ReflectionTable,
    pub(crate) native_source: Vec<u8>,
    pub(crate) diagnostics: Vec<Report>,
}

impl CompileJob {
    pub fn new(request: CompileRequest) -> Self {
        Self {
            request,
            state: CompileState::Start,
            bytecode: Vec::new(),
            reflection: ReflectionTable::default(),
            native_source: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn state(&self) -> CompileState {
        self.state
    }

    /// Move the job into the `next` state.
    pub(crate) fn advance(&mut self, next: CompileState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "`{}` can't move from {} to {next}",
            self.request.unit_name(),
            self.state
        );

        log::debug!("`{}`: {} -> {next}", self.request.unit_name(), self.state);
        self.state = next;
    }

    /// Convert the job into the artifact that it produced. Only jobs that
    /// reached [`CompileState::Done`] keep their outputs.
    pub fn into_artifact(self) -> CompiledArtifact {
        let diagnostics = render_reports(&self.diagnostics);

        if self.state != CompileState::Done {
            return CompiledArtifact::invalid(&self.request, diagnostics);
        }

        CompiledArtifact {
            content_hash: self.request.content_hash(),
            bytecode: self.bytecode,
            native_source: self.native_source,
            reflection: self.reflection,
            diagnostics,
            is_valid: true,
        }
    }
}

impl CompilerInterface for CompileJob {
    fn request(&self) -> &CompileRequest {
        &self.request
    }

    fn diagnostics(&self) -> &[Report] {
        &self.diagnostics
    }

    fn diagnostics_mut(&mut self) -> &mut Vec<Report> {
        &mut self.diagnostics
    }
}
