//! The shade compilation cache. Artifacts are keyed by the content hash of
//! the request that produced them, and every entry remembers a fingerprint
//! of the source and the files it includes. An entry whose fingerprint no
//! longer matches the files on disk is evicted when it is next looked up.
//!
//! The cache can be persisted to `shader_cache.bin` in the cache directory,
//! see [format] for the layout of the file.
mod codec;
pub mod error;
pub mod format;

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use shade_driver::{CompiledArtifact, ShaderCompiler};
use shade_frontend::collect_dependencies;
use shade_pipeline::request::CompileRequest;
use shade_utils::{fxhash::FxHashMap, hashing::StableHasher, log};

pub use crate::error::CacheError;
use crate::format::CACHE_FILE_NAME;

/// A cached artifact along with what is needed to decide whether it is
/// still fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub artifact: CompiledArtifact,

    /// When the entry was created, in milliseconds since the UNIX epoch.
    pub created_at_millis: i64,

    /// The unit name of the request that produced the entry.
    pub source_unit_path: String,

    /// The fingerprint of the source and of every file that it includes.
    pub source_content_hash: u64,

    /// The request that produced the entry. The source text of requests that
    /// were loaded from disk is empty.
    pub request: CompileRequest,
}

/// Counters of the lookups that the cache has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,

    /// Entries that were evicted because their sources changed.
    pub stale: usize,
    pub entries: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} hits, {} misses, {} stale",
            self.entries, self.hits, self.misses, self.stale
        )
    }
}

/// The fingerprint of the source of a request and of every file that it
/// includes, transitively.
pub fn source_fingerprint(request: &CompileRequest) -> u64 {
    let mut hasher = StableHasher::new();
    hasher.write_str(request.source_text());

    for (path, contents) in collect_dependencies(request) {
        hasher.write_path(&path);
        hasher.write_str(&contents);
    }

    hasher.finish()
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CacheError + use<> {
    let path = path.to_path_buf();
    move |error| CacheError::Io { path, error }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

pub struct ShaderCache<C: ShaderCompiler> {
    compiler: C,
    entries: FxHashMap<u64, CacheEntry>,

    /// Where the cache file lives, the cache is only held in memory when
    /// this is `None`.
    directory: Option<PathBuf>,
    stats: CacheStats,
}

impl<C: ShaderCompiler> ShaderCache<C> {
    /// Create a cache that is only held in memory.
    pub fn new(compiler: C) -> Self {
        Self { compiler, entries: FxHashMap::default(), directory: None, stats: CacheStats::default() }
    }

    /// Create a cache that is persisted within `directory`.
    pub fn with_directory(compiler: C, directory: impl Into<PathBuf>) -> Self {
        Self { directory: Some(directory.into()), ..Self::new(compiler) }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut C {
        &mut self.compiler
    }

    /// The path of the cache file, if the cache is persisted.
    pub fn cache_file(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|directory| directory.join(CACHE_FILE_NAME))
    }

    /// Get the artifact of `request`, compiling it when there is no fresh
    /// entry for it. Only valid artifacts are stored.
    pub fn get_or_compile(&mut self, request: &CompileRequest) -> CompiledArtifact {
        let hash = request.content_hash();
        let fingerprint = source_fingerprint(request);

        if let Some(entry) = self.entries.get(&hash) {
            if entry.source_content_hash == fingerprint {
                self.stats.hits += 1;
                log::debug!("cache hit for `{}` ({hash:016x})", request.unit_name());
                return entry.artifact.clone();
            }

            log::debug!("evicting stale entry for `{}` ({hash:016x})", request.unit_name());
            self.entries.remove(&hash);
            self.stats.stale += 1;
        }

        self.stats.misses += 1;
        let artifact = self.compiler.compile_shader(request);

        if artifact.is_valid {
            self.entries.insert(
                hash,
                CacheEntry {
                    artifact: artifact.clone(),
                    created_at_millis: now_millis(),
                    source_unit_path: request.unit_name().to_string(),
                    source_content_hash: fingerprint,
                    request: request.clone(),
                },
            );
        }

        artifact
    }

    /// Look at the entry stored under `hash` without checking its freshness.
    pub fn get(&self, hash: u64) -> Option<&CacheEntry> {
        self.entries.get(&hash)
    }

    /// Iterate over every entry and its key.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &CacheEntry)> {
        self.entries.iter().map(|(key, entry)| (*key, entry))
    }

    /// Remove every entry from memory. The cache file is left alone until the
    /// cache is next saved.
    pub fn invalidate_all(&mut self) {
        log::debug!("invalidating {} cache entries", self.entries.len());
        self.entries.clear();
    }

    /// Remove every entry that was compiled from the unit at `path`, returning
    /// how many were removed.
    pub fn invalidate_by_unit_path(&mut self, path: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.source_unit_path != path);

        let removed = before - self.entries.len();
        log::debug!("invalidated {removed} cache entries of `{path}`");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { entries: self.entries.len(), ..self.stats }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every entry to the cache file. The file is written next to the
    /// target first and then renamed over it.
    pub fn save_to_disk(&self) -> Result<(), CacheError> {
        let Some(path) = self.cache_file() else {
            return Ok(());
        };

        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by_key(|(key, _)| *key);
        let bytes = format::encode(entries.into_iter());

        if let Some(directory) = path.parent() {
            fs::create_dir_all(directory).map_err(io_error(directory))?;
        }

        let temporary = path.with_extension("bin.tmp");
        fs::write(&temporary, bytes).map_err(io_error(&temporary))?;
        fs::rename(&temporary, &path).map_err(io_error(&path))?;

        log::debug!("saved {} cache entries to `{}`", self.entries.len(), path.display());
        Ok(())
    }

    /// Replace the entries with those of the cache file, returning how many
    /// were loaded. A missing file loads nothing. When the file can't be used
    /// the error is logged and the cache is left empty.
    pub fn load_from_disk(&mut self) -> Result<usize, CacheError> {
        let Some(path) = self.cache_file() else {
            return Ok(0);
        };

        self.entries.clear();

        if !path.exists() {
            log::debug!("no shader cache at `{}`", path.display());
            return Ok(0);
        }

        let entries = fs::read(&path)
            .map_err(io_error(&path))
            .and_then(|bytes| format::decode(&bytes));

        match entries {
            Ok(entries) => {
                self.entries.extend(entries);
                log::debug!("loaded {} cache entries from `{}`", self.entries.len(), path.display());
                Ok(self.entries.len())
            }
            Err(error) => {
                log::warn!("discarding the shader cache: {error}");
                Err(error)
            }
        }
    }
}
