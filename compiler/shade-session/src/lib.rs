//! Defines the shade compiler session. A [ShaderSession] owns the compiler
//! facade and the shader cache, and it is the object that callers compile
//! shaders through.
//!
//! A session is created with [`ShaderSession::initialise`] and should be
//! ended with [`ShaderSession::shutdown`], which writes the cache back to
//! disk. Every method takes `&mut self`, a session that is shared between
//! threads has to be wrapped in a lock by the caller.
use std::path::{Path, PathBuf};

use shade_cache::{CacheError, CacheStats, ShaderCache};
use shade_driver::{CompiledArtifact, CrossCompilerFacade, metrics::Metrics};
use shade_pipeline::{
    error::EnvironmentError,
    fs::read_source,
    request::CompileOptions,
    settings::CompilerSettings,
};
use shade_reporting::report::Report;
use shade_utils::{log, stream::CompilerOutputStream, stream_writeln};

pub struct ShaderSession {
    /// Compiler settings that are stored.
    settings: CompilerSettings,

    cache: ShaderCache<CrossCompilerFacade>,

    /// The stream to use for writing diagnostics to.
    error_stream: Box<dyn Fn() -> CompilerOutputStream>,
}

impl ShaderSession {
    /// Create a new session. When the cache is persistent, the cache file is
    /// loaded from the cache directory, a file that can't be used leaves the
    /// session with an empty cache.
    pub fn initialise(settings: CompilerSettings) -> Result<Self, EnvironmentError> {
        let facade = CrossCompilerFacade::new()?;

        let cache = if settings.persistent_cache {
            match settings.cache_directory() {
                Ok(directory) => {
                    let mut cache = ShaderCache::with_directory(facade, directory);
                    // Failures are already logged by the cache.
                    let _ = cache.load_from_disk();
                    cache
                }
                Err(error) => {
                    log::warn!("the shader cache won't be persisted: {error}");
                    ShaderCache::new(facade)
                }
            }
        } else {
            ShaderCache::new(facade)
        };

        Ok(Self { settings, cache, error_stream: Box::new(CompilerOutputStream::stderr) })
    }

    /// Write diagnostics into the given stream rather than `stderr`.
    pub fn with_error_stream(
        mut self,
        error_stream: impl Fn() -> CompilerOutputStream + 'static,
    ) -> Self {
        self.error_stream = Box::new(error_stream);
        self
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// The [CompileOptions] that follow the levels in the session settings,
    /// callers fill in the unit specific fields on top of these.
    pub fn default_options(&self) -> CompileOptions {
        CompileOptions {
            debug_info: self.settings.debug_info,
            optimisation: self.settings.optimisation_level,
            ..Default::default()
        }
    }

    /// Compile `source`, which is the contents of the unit `filename`, or get
    /// the artifact from the cache.
    pub fn get_or_compile_shader(
        &mut self,
        source: &str,
        filename: &str,
        options: &CompileOptions,
    ) -> CompiledArtifact {
        let request = options.to_request(source, filename);
        let artifact = self.cache.get_or_compile(&request);

        if !artifact.is_valid {
            log::error!("couldn't compile `{filename}` for the {} stage", options.stage);
        }

        self.emit_diagnostics(&artifact);
        artifact
    }

    /// Read the unit at `path` and compile it. A file that can't be read
    /// results in an invalid artifact.
    pub fn get_or_compile_shader_file(
        &mut self,
        path: impl AsRef<Path>,
        options: &CompileOptions,
    ) -> CompiledArtifact {
        let path = path.as_ref();
        let filename = path.to_string_lossy();

        match read_source(path) {
            Ok(source) => self.get_or_compile_shader(&source, &filename, options),
            Err(error) => {
                log::error!("{error}");

                let report = Report::from(error);
                let artifact =
                    CompiledArtifact::invalid(&options.to_request("", &filename), report.to_string());

                self.emit_diagnostics(&artifact);
                artifact
            }
        }
    }

    /// Remove every cached artifact of the unit at `path`.
    pub fn invalidate_unit(&mut self, path: &str) -> usize {
        self.cache.invalidate_by_unit_path(path)
    }

    /// Remove every cached artifact.
    pub fn invalidate_all(&mut self) {
        self.cache.invalidate_all();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The timings of the compiler stages.
    pub fn metrics(&self) -> &Metrics {
        self.cache.compiler().metrics()
    }

    /// The path of the cache file, if the cache is persistent.
    pub fn cache_file(&self) -> Option<PathBuf> {
        self.cache.cache_file()
    }

    /// Write the cache back to disk, if it is persistent.
    pub fn flush(&self) -> Result<(), CacheError> {
        self.cache.save_to_disk()
    }

    /// End the session, writing the cache back to disk.
    pub fn shutdown(self) {
        if let Err(error) = self.flush() {
            log::warn!("couldn't save the shader cache: {error}");
        }
    }

    fn emit_diagnostics(&self, artifact: &CompiledArtifact) {
        if self.settings.emit_errors && artifact.has_diagnostics() {
            let mut stream = (self.error_stream)();
            stream_writeln!(stream, "{}", artifact.diagnostics);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use shade_pipeline::{
        request::{ShaderStage, TargetDialect},
        settings::{DebugInfoLevel, OptimisationLevel},
    };

    use super::*;

    const VERTEX: &str = r#"
@vertex
fn main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}
"#;

    fn options() -> CompileOptions {
        CompileOptions { stage: ShaderStage::Vertex, target: TargetDialect::Hlsl, ..Default::default() }
    }

    fn settings(directory: &Path) -> CompilerSettings {
        let mut settings = CompilerSettings::with_cache_directory(directory);
        settings.set_emit_errors(false);
        settings
    }

    #[test]
    fn sessions_persist_their_cache() {
        let directory = tempfile::tempdir().unwrap();

        let mut session = ShaderSession::initialise(settings(directory.path())).unwrap();
        let artifact = session.get_or_compile_shader(VERTEX, "quad.wgsl", &options());
        assert!(artifact.is_valid);
        session.shutdown();

        let mut session = ShaderSession::initialise(settings(directory.path())).unwrap();
        assert_eq!(session.cache_stats().entries, 1);
        assert_eq!(session.get_or_compile_shader(VERTEX, "quad.wgsl", &options()), artifact);
        assert_eq!(session.cache_stats().hits, 1);

        assert_eq!(session.invalidate_unit("quad.wgsl"), 1);
        session.get_or_compile_shader(VERTEX, "quad.wgsl", &options());
        assert_eq!(session.cache_stats().misses, 1);
    }

    #[test]
    fn files_are_read_before_compiling() {
        let directory = tempfile::tempdir().unwrap();
        let unit = directory.path().join("quad.wgsl");
        fs::write(&unit, VERTEX).unwrap();

        let mut session = ShaderSession::initialise(settings(directory.path())).unwrap();
        assert!(session.get_or_compile_shader_file(&unit, &options()).is_valid);

        let missing = session.get_or_compile_shader_file(directory.path().join("absent.wgsl"), &options());
        assert!(!missing.is_valid);
        assert!(missing.diagnostics.contains("absent.wgsl"));
    }

    #[test]
    fn default_options_follow_the_settings() {
        let directory = tempfile::tempdir().unwrap();
        let settings = CompilerSettings {
            optimisation_level: OptimisationLevel::Release,
            debug_info: DebugInfoLevel::Full,
            persistent_cache: false,
            ..settings(directory.path())
        };

        let mut session = ShaderSession::initialise(settings).unwrap();
        let defaults = session.default_options();
        assert!(defaults.optimisation.is_release());
        assert!(defaults.debug_info.is_enabled());

        let unit_options = CompileOptions {
            stage: ShaderStage::Vertex,
            target: TargetDialect::Hlsl,
            ..session.default_options()
        };
        let artifact = session.get_or_compile_shader(VERTEX, "quad.wgsl", &unit_options);

        assert!(artifact.is_valid);
        assert!(artifact.native_source_str().unwrap().starts_with("// quad.wgsl: vertex stage"));
        assert_eq!(artifact.content_hash, unit_options.to_request(VERTEX, "quad.wgsl").content_hash());
        assert_ne!(artifact.content_hash, options().to_request(VERTEX, "quad.wgsl").content_hash());
    }

    #[test]
    fn diagnostics_are_emitted_when_asked() {
        let directory = tempfile::tempdir().unwrap();
        let stream = CompilerOutputStream::owned();

        let mut settings = settings(directory.path());
        settings.set_emit_errors(true);
        settings.persistent_cache = false;

        let captured = stream.clone();
        let mut session =
            ShaderSession::initialise(settings).unwrap().with_error_stream(move || captured.clone());

        let options = CompileOptions { entry_point: "vs_main".into(), ..options() };
        assert!(!session.get_or_compile_shader(VERTEX, "quad.wgsl", &options).is_valid);

        let output = stream.contents().unwrap();
        assert!(output.contains("[front-end] `quad.wgsl` has no entry point named `vs_main`"));
        assert!(!directory.path().join("shader_cache.bin").exists());
    }
}
