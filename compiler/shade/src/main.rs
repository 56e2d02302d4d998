//! Shade compiler executable.
mod args;

use std::{
    fs,
    panic,
    path::{Path, PathBuf},
    process::ExitCode,
};

use args::{CacheLocation, CacheMode, CompileMode, CompilerOptions, SubCmd};
use clap::Parser;
use shade_driver::{CompiledArtifact, metrics::AggregateMetricReporter};
use shade_pipeline::settings::CompilerSettings;
use shade_reporting::report::Report;
use shade_session::ShaderSession;
use shade_spirv::binary::words_to_bytes;
use shade_utils::{
    crash::crash_handler, log, logging::CompilerLogger, stream::CompilerOutputStream,
    stream_writeln,
};

pub static COMPILER_LOGGER: CompilerLogger = CompilerLogger::new();

fn main() -> ExitCode {
    // Initial grunt work, panic handler and logger setup...
    panic::set_hook(Box::new(crash_handler));
    let opts = CompilerOptions::parse();

    if let Err(error) = CompilerLogger::install(
        &COMPILER_LOGGER,
        CompilerOutputStream::stdout(),
        CompilerOutputStream::stderr(),
        opts.debug,
    ) {
        eprintln!("couldn't install the compiler logger: {error}");
    }

    let result = match &opts.mode {
        SubCmd::Compile(mode) => compile(mode, mode.settings(&opts)),
        SubCmd::Cache(CacheMode::Stats(location)) => cache_stats(opts.settings(location), location),
        SubCmd::Cache(CacheMode::Clear(location)) => cache_clear(opts.settings(location)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

/// Create a session, a failure here is fatal and is printed as a report.
fn initialise(settings: CompilerSettings) -> Result<ShaderSession, ()> {
    ShaderSession::initialise(settings).map_err(|error| {
        let mut stderr = CompilerOutputStream::stderr();
        stream_writeln!(stderr, "{}", Report::from(error).coloured());
    })
}

fn compile(mode: &CompileMode, settings: CompilerSettings) -> Result<(), ()> {
    let output_metrics = settings.output_metrics;
    let mut session = initialise(settings)?;

    let options = mode.options(session.default_options());
    let artifact = session.get_or_compile_shader_file(&mode.filename, &options);

    if output_metrics {
        log::info!("compiler pipeline metrics:\n{}", AggregateMetricReporter::new(session.metrics()));
    }

    let result = if artifact.is_valid { write_artifact(mode, &artifact) } else { Err(()) };
    session.shutdown();
    result
}

/// The path that SPIR-V is written to when no output is given.
fn default_spirv_path(filename: &Path) -> PathBuf {
    let mut path = filename.as_os_str().to_owned();
    path.push(".spv");
    PathBuf::from(path)
}

fn write_artifact(mode: &CompileMode, artifact: &CompiledArtifact) -> Result<(), ()> {
    let mut stdout = CompilerOutputStream::stdout();

    let contents = if mode.target.is_intermediate() {
        words_to_bytes(&artifact.bytecode)
    } else {
        artifact.native_source.clone()
    };

    let output = match &mode.output {
        Some(path) => Some(path.clone()),
        None if mode.target.is_intermediate() => Some(default_spirv_path(&mode.filename)),
        None => None,
    };

    match output {
        Some(path) => {
            fs::write(&path, contents).map_err(|error| {
                log::error!("couldn't write `{}`, {error}", path.display());
            })?;
            log::info!("wrote `{}`", path.display());
        }
        None => stream_writeln!(stdout, "{}", artifact.native_source_str().unwrap_or_default()),
    }

    if mode.reflect {
        let reflection = serde_json::to_string_pretty(&artifact.reflection).map_err(|error| {
            log::error!("couldn't serialise the reflection table, {error}");
        })?;
        stream_writeln!(stdout, "{reflection}");
    }

    Ok(())
}

fn cache_stats(settings: CompilerSettings, location: &CacheLocation) -> Result<(), ()> {
    let session = initialise(settings)?;
    let mut stdout = CompilerOutputStream::stdout();

    match session.cache_file() {
        Some(path) => stream_writeln!(stdout, "cache: {}", path.display()),
        None if location.no_cache => stream_writeln!(stdout, "cache: disabled"),
        None => stream_writeln!(stdout, "cache: in memory"),
    }

    stream_writeln!(stdout, "{}", session.cache_stats());
    Ok(())
}

fn cache_clear(settings: CompilerSettings) -> Result<(), ()> {
    let mut session = initialise(settings)?;
    let cleared = session.cache_stats().entries;

    session.invalidate_all();
    session.flush().map_err(|error| log::error!("couldn't clear the shader cache, {error}"))?;

    log::info!("cleared {cleared} cache entries");
    Ok(())
}
