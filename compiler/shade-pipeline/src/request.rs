//! The description of a single shader compilation. A [CompileRequest] fully
//! determines the artifact that the compiler produces, which is what makes
//! its [`CompileRequest::content_hash`] usable as a cache key.
use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use shade_utils::hashing::{StableHash, StableHasher, stable_hash};

use crate::{
    error::PipelineError,
    settings::{DebugInfoLevel, OptimisationLevel},
};

/// The pipeline stage a shader runs in. The discriminants are part of the
/// cache file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex = 0,
    Fragment = 1,
    Geometry = 2,
    Hull = 3,
    Domain = 4,
    Compute = 5,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::Fragment,
        ShaderStage::Geometry,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Compute,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Hull => "hull",
            ShaderStage::Domain => "domain",
            ShaderStage::Compute => "compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShaderStage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vertex" | "vert" | "vs" => Ok(Self::Vertex),
            "fragment" | "frag" | "fs" | "pixel" | "ps" => Ok(Self::Fragment),
            "geometry" | "geom" | "gs" => Ok(Self::Geometry),
            "hull" | "tesc" | "hs" => Ok(Self::Hull),
            "domain" | "tese" | "ds" => Ok(Self::Domain),
            "compute" | "comp" | "cs" => Ok(Self::Compute),
            _ => Err(PipelineError::InvalidValue("stage".to_string(), s.to_string())),
        }
    }
}

/// The dialects that a shader can be compiled into. [`TargetDialect::SpirV`]
/// is the intermediate bytecode itself. The discriminants are part of the
/// cache file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetDialect {
    SpirV = 0,
    Msl = 1,
    Hlsl = 2,
    Glsl = 3,
    Essl = 4,
    Wgsl = 5,
}

impl TargetDialect {
    pub const ALL: [TargetDialect; 6] = [
        TargetDialect::SpirV,
        TargetDialect::Msl,
        TargetDialect::Hlsl,
        TargetDialect::Glsl,
        TargetDialect::Essl,
        TargetDialect::Wgsl,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetDialect::SpirV => "spirv",
            TargetDialect::Msl => "msl",
            TargetDialect::Hlsl => "hlsl",
            TargetDialect::Glsl => "glsl",
            TargetDialect::Essl => "essl",
            TargetDialect::Wgsl => "wgsl",
        }
    }

    /// Whether this dialect is the intermediate bytecode, i.e. cross
    /// compilation into it is the identity.
    pub fn is_intermediate(&self) -> bool {
        matches!(self, TargetDialect::SpirV)
    }

    /// The conventional file extension of the dialect.
    pub fn file_extension(&self) -> &'static str {
        match self {
            TargetDialect::SpirV => "spv",
            TargetDialect::Msl => "metal",
            TargetDialect::Hlsl => "hlsl",
            TargetDialect::Glsl => "glsl",
            TargetDialect::Essl => "essl",
            TargetDialect::Wgsl => "wgsl",
        }
    }
}

impl fmt::Display for TargetDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TargetDialect {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spirv" | "spv" => Ok(Self::SpirV),
            "msl" | "metal" => Ok(Self::Msl),
            "hlsl" => Ok(Self::Hlsl),
            "glsl" => Ok(Self::Glsl),
            "essl" | "gles" => Ok(Self::Essl),
            "wgsl" => Ok(Self::Wgsl),
            _ => Err(PipelineError::InvalidValue("target".to_string(), s.to_string())),
        }
    }
}

/// The shading language a source unit is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    Wgsl = 0,
    Glsl = 1,
}

impl SourceLanguage {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Wgsl),
            1 => Some(Self::Glsl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceLanguage::Wgsl => "wgsl",
            SourceLanguage::Glsl => "glsl",
        }
    }

    /// Detect the language from the extension of a unit name, anything that
    /// is not recognised is treated as WGSL.
    pub fn from_unit_name(unit_name: &str) -> Self {
        let extension = unit_name.rsplit_once('.').map(|(_, extension)| extension);

        match extension {
            Some("glsl" | "vert" | "frag" | "comp") => Self::Glsl,
            _ => Self::Wgsl,
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything that is needed to compile one shader entry point. Requests are
/// immutable once they have been handed to the compiler, the builder methods
/// consume the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    source_text: String,
    unit_name: String,
    entry_point: String,
    stage: ShaderStage,
    target: TargetDialect,
    language: SourceLanguage,
    macro_defines: Vec<(String, String)>,
    include_paths: Vec<PathBuf>,
    debug_info: DebugInfoLevel,
    optimisation: OptimisationLevel,
}

impl CompileRequest {
    /// Create a request with no defines or include paths, the language is
    /// detected from the `unit_name`.
    pub fn new(
        source_text: impl Into<String>,
        unit_name: impl Into<String>,
        entry_point: impl Into<String>,
        stage: ShaderStage,
        target: TargetDialect,
    ) -> Self {
        let unit_name = unit_name.into();

        Self {
            source_text: source_text.into(),
            language: SourceLanguage::from_unit_name(&unit_name),
            unit_name,
            entry_point: entry_point.into(),
            stage,
            target,
            macro_defines: Vec::new(),
            include_paths: Vec::new(),
            debug_info: DebugInfoLevel::default(),
            optimisation: OptimisationLevel::default(),
        }
    }

    pub fn with_language(mut self, language: SourceLanguage) -> Self {
        self.language = language;
        self
    }

    /// Append a macro definition, definitions keep the order they are added
    /// in.
    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.macro_defines.push((name.into(), value.into()));
        self
    }

    pub fn with_defines(mut self, defines: impl IntoIterator<Item = (String, String)>) -> Self {
        self.macro_defines.extend(defines);
        self
    }

    pub fn with_include_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include_paths.extend(paths);
        self
    }

    pub fn with_debug_info(mut self, debug_info: DebugInfoLevel) -> Self {
        self.debug_info = debug_info;
        self
    }

    pub fn with_optimisation(mut self, optimisation: OptimisationLevel) -> Self {
        self.optimisation = optimisation;
        self
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn target(&self) -> TargetDialect {
        self.target
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    pub fn macro_defines(&self) -> &[(String, String)] {
        &self.macro_defines
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    pub fn debug_info(&self) -> DebugInfoLevel {
        self.debug_info
    }

    pub fn optimisation(&self) -> OptimisationLevel {
        self.optimisation
    }

    /// The identity of the request: a stable hash over every field and the
    /// literal source text. Requests that differ in any field, including a
    /// define that the source never uses, hash differently.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = StableHasher::new();
        hasher.write_tag(b'S');
        hasher.write_str(&self.source_text);
        hasher.write_tag(b'U');
        hasher.write_str(&self.unit_name);
        hasher.write_tag(b'E');
        hasher.write_str(&self.entry_point);
        hasher.write_tag(b'P');
        hasher.write_u32(self.stage.as_u32());
        hasher.write_tag(b'T');
        hasher.write_u32(self.target.as_u32());
        hasher.write_tag(b'L');
        hasher.write_u32(self.language.as_u32());
        hasher.write_tag(b'D');
        self.macro_defines.stable_hash(&mut hasher);
        hasher.write_tag(b'I');
        self.include_paths.stable_hash(&mut hasher);
        hasher.write_tag(b'G');
        hasher.write_bool(self.debug_info.is_enabled());
        hasher.write_tag(b'O');
        hasher.write_bool(self.optimisation.is_release());
        hasher.finish()
    }

    /// A stable hash of the source text alone.
    pub fn source_hash(&self) -> u64 {
        stable_hash(self.source_text.as_str())
    }
}

/// The options of a request made through the session API, everything except
/// the source itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub entry_point: String,
    pub stage: ShaderStage,
    pub target: TargetDialect,

    /// The language of the source, when it's `None` the language is detected
    /// from the file name.
    pub language: Option<SourceLanguage>,
    pub macro_defines: Vec<(String, String)>,
    pub include_paths: Vec<PathBuf>,
    pub debug_info: DebugInfoLevel,
    pub optimisation: OptimisationLevel,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            entry_point: "main".to_string(),
            stage: ShaderStage::Fragment,
            target: TargetDialect::SpirV,
            language: None,
            macro_defines: Vec::new(),
            include_paths: Vec::new(),
            debug_info: DebugInfoLevel::default(),
            optimisation: OptimisationLevel::default(),
        }
    }
}

impl CompileOptions {
    /// Combine the options with a source unit into a [CompileRequest].
    pub fn to_request(&self, source_text: impl Into<String>, unit_name: &str) -> CompileRequest {
        let request = CompileRequest::new(
            source_text,
            unit_name,
            self.entry_point.clone(),
            self.stage,
            self.target,
        )
        .with_defines(self.macro_defines.iter().cloned())
        .with_include_paths(self.include_paths.iter().cloned())
        .with_debug_info(self.debug_info)
        .with_optimisation(self.optimisation);

        match self.language {
            Some(language) => request.with_language(language),
            None => request,
        }
    }
}
