//! Shade compiler arguments management.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shade_pipeline::{
    request::{CompileOptions, ShaderStage, TargetDialect},
    settings::{CompilerSettings, DebugInfoLevel, OptimisationLevel},
};

/// CompilerOptions is a structural representation of what arguments the
/// compiler can take when running.
#[derive(Parser)]
#[command(
    name = "shadec",
    version,
    author = "The Shade authors",
    about = "Compile shaders into SPIR-V and the native shading languages"
)]
#[command(disable_colored_help = true)]
pub(crate) struct CompilerOptions {
    /// Run the compiler in debug mode
    #[arg(long, global = true)]
    pub(crate) debug: bool,

    /// Whether to print the stage metrics for each stage of the compiler.
    #[arg(long, global = true)]
    pub(crate) output_metrics: bool,

    /// Compiler mode
    #[command(subcommand)]
    pub(crate) mode: SubCmd,
}

#[derive(Subcommand)]
pub(crate) enum SubCmd {
    /// Compile a shader unit
    Compile(CompileMode),

    /// Inspect or clear the shader cache
    #[command(subcommand)]
    Cache(CacheMode),
}

#[derive(Args)]
pub(crate) struct CompileMode {
    /// The shader unit to compile
    pub(crate) filename: PathBuf,

    /// The pipeline stage of the entry point
    #[arg(long, default_value = "fragment")]
    pub(crate) stage: ShaderStage,

    /// The name of the entry point
    #[arg(long, default_value = "main")]
    pub(crate) entry: String,

    /// The dialect to compile into
    #[arg(long, default_value = "spirv")]
    pub(crate) target: TargetDialect,

    /// Define a macro, as `NAME` or `NAME=VALUE`
    #[arg(short = 'D', value_name = "NAME[=VALUE]", value_parser = parse_define)]
    pub(crate) defines: Vec<(String, String)>,

    /// Add a directory to search for included files
    #[arg(short = 'I', value_name = "DIR")]
    pub(crate) include_paths: Vec<PathBuf>,

    /// Embed source level debug information
    #[arg(long)]
    pub(crate) debug_info: bool,

    /// Remove bounds checks from the generated code
    #[arg(long)]
    pub(crate) release: bool,

    /// Where to write the compiled shader
    #[arg(short, long)]
    pub(crate) output: Option<PathBuf>,

    /// Print the reflection table as JSON
    #[arg(long)]
    pub(crate) reflect: bool,

    #[command(flatten)]
    pub(crate) cache: CacheLocation,
}

#[derive(Args, Clone)]
pub(crate) struct CacheLocation {
    /// The directory of the shader cache
    #[arg(long, value_name = "DIR")]
    pub(crate) cache_dir: Option<PathBuf>,

    /// Don't load or save the shader cache
    #[arg(long)]
    pub(crate) no_cache: bool,
}

#[derive(Subcommand)]
pub(crate) enum CacheMode {
    /// Print the number of cached artifacts
    Stats(CacheLocation),

    /// Remove every cached artifact
    Clear(CacheLocation),
}

/// Parse a `NAME[=VALUE]` macro definition, a definition without a value is
/// defined as `1`.
fn parse_define(arg: &str) -> Result<(String, String), String> {
    let (name, value) = arg.split_once('=').unwrap_or((arg, "1"));

    if name.is_empty() {
        return Err(format!("`{arg}` doesn't name a macro"));
    }

    Ok((name.to_string(), value.to_string()))
}

impl CompilerOptions {
    pub(crate) fn settings(&self, location: &CacheLocation) -> CompilerSettings {
        let mut settings = CompilerSettings {
            debug: self.debug,
            output_metrics: self.output_metrics,
            persistent_cache: !location.no_cache,
            ..Default::default()
        };

        if let Some(directory) = &location.cache_dir {
            settings.set_cache_directory(directory);
        }

        settings
    }
}

impl CompileMode {
    /// The settings of a compile session, the levels follow the flags of
    /// the compile.
    pub(crate) fn settings(&self, options: &CompilerOptions) -> CompilerSettings {
        CompilerSettings {
            optimisation_level: OptimisationLevel::from_release(self.release),
            debug_info: DebugInfoLevel::from_enabled(self.debug_info),
            ..options.settings(&self.cache)
        }
    }

    /// The options of the unit on top of the session `defaults`.
    pub(crate) fn options(&self, defaults: CompileOptions) -> CompileOptions {
        CompileOptions {
            entry_point: self.entry.clone(),
            stage: self.stage,
            target: self.target,
            macro_defines: self.defines.clone(),
            include_paths: self.include_paths.clone(),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_default_to_one() {
        assert_eq!(parse_define("FOG"), Ok(("FOG".into(), "1".into())));
        assert_eq!(parse_define("SAMPLES=4"), Ok(("SAMPLES".into(), "4".into())));
        assert!(parse_define("=4").is_err());
    }

    #[test]
    fn compile_arguments_become_options() {
        let options = CompilerOptions::parse_from([
            "shadec", "compile", "lit.frag", "--target", "msl", "-D", "FOG", "--release",
        ]);

        let SubCmd::Compile(mode) = &options.mode else {
            panic!("expected the compile mode");
        };

        let settings = mode.settings(&options);
        assert_eq!(settings.optimisation_level, OptimisationLevel::Release);
        assert!(!settings.debug_info.is_enabled());
        assert!(settings.persistent_cache);

        let defaults = CompileOptions {
            optimisation: settings.optimisation_level,
            debug_info: settings.debug_info,
            ..Default::default()
        };
        let compile = mode.options(defaults);
        assert_eq!(compile.target, TargetDialect::Msl);
        assert_eq!(compile.stage, ShaderStage::Fragment);
        assert_eq!(compile.macro_defines, [("FOG".to_string(), "1".to_string())]);
        assert!(compile.optimisation.is_release());
    }
}
