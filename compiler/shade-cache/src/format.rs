//! The layout of `shader_cache.bin`.
//!
//! The file starts with a header of the magic number, the format version and
//! a tag that identifies the toolchain which wrote it. A header that doesn't
//! match this build discards the whole file. The header is followed by the
//! number of entries, and then each entry as its key, the byte length of its
//! body and the body itself.
use std::path::PathBuf;

use shade_driver::CompiledArtifact;
use shade_pipeline::{
    request::{CompileRequest, ShaderStage, SourceLanguage, TargetDialect},
    settings::{DebugInfoLevel, OptimisationLevel},
};
use shade_spirv::extract_reflection;
use shade_utils::hashing::StableHasher;

use crate::{
    CacheEntry,
    codec::{ByteReader, ByteWriter},
    error::CacheError,
};

/// The name of the cache file within the cache directory.
pub const CACHE_FILE_NAME: &str = "shader_cache.bin";

/// "SHDC" when read as little endian bytes.
pub const MAGIC: u32 = 0x4344_4853;

pub const FORMAT_VERSION: u32 = 1;

/// The major version of `naga`, which produces every byte that is cached.
const NAGA_MAJOR_VERSION: u32 = 24;

/// The tag of the toolchain that this build writes into the header.
pub fn toolchain_tag() -> u64 {
    let mut hasher = StableHasher::new();
    hasher.write_str("naga");
    hasher.write_u32(NAGA_MAJOR_VERSION);
    hasher.write_str(env!("CARGO_PKG_NAME"));
    hasher.write_str(env!("CARGO_PKG_VERSION"));
    hasher.finish()
}

/// Encode every entry into the contents of a cache file.
pub fn encode<'e>(entries: impl ExactSizeIterator<Item = (u64, &'e CacheEntry)>) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    writer.write_u32(MAGIC);
    writer.write_u32(FORMAT_VERSION);
    writer.write_u64(toolchain_tag());
    writer.write_len(entries.len());

    for (key, entry) in entries {
        let body = encode_entry(entry);
        writer.write_u64(key);
        writer.write_len(body.len());
        writer.append(body);
    }

    writer.into_bytes()
}

fn encode_entry(entry: &CacheEntry) -> ByteWriter {
    let CacheEntry { artifact, created_at_millis, source_unit_path, source_content_hash, request } =
        entry;
    let mut writer = ByteWriter::new();

    writer.write_i64(*created_at_millis);
    writer.write_u64(*source_content_hash);
    writer.write_str(source_unit_path);
    writer.write_u32(request.stage().as_u32());
    writer.write_u32(request.target().as_u32());
    writer.write_str(request.entry_point());
    writer.write_bool(request.debug_info().is_enabled());
    writer.write_bool(request.optimisation().is_release());
    writer.write_words(&artifact.bytecode);
    writer.write_bytes(&artifact.native_source);
    writer.write_u64(artifact.content_hash);
    writer.write_bool(artifact.is_valid);

    writer.write_u32(request.language().as_u32());
    writer.write_len(request.macro_defines().len());
    for (name, value) in request.macro_defines() {
        writer.write_str(name);
        writer.write_str(value);
    }
    writer.write_len(request.include_paths().len());
    for path in request.include_paths() {
        writer.write_str(&path.to_string_lossy());
    }
    writer.write_str(&artifact.diagnostics);

    writer
}

/// Decode the contents of a cache file into its entries.
pub fn decode(bytes: &[u8]) -> Result<Vec<(u64, CacheEntry)>, CacheError> {
    let mut reader = ByteReader::new(bytes);

    let magic = reader.read_u32()?;
    if magic != MAGIC {
        return Err(CacheError::corrupted(format!("invalid magic number {magic:#010x}")));
    }

    let version = reader.read_u32()?;
    if version != FORMAT_VERSION {
        return Err(CacheError::VersionMismatch { expected: FORMAT_VERSION, found: version });
    }

    if reader.read_u64()? != toolchain_tag() {
        return Err(CacheError::ToolchainMismatch);
    }

    // A key and a length are the least that every entry takes.
    let count = reader.read_len(16)?;
    let mut entries = Vec::with_capacity(count);

    for index in 0..count {
        let key = reader.read_u64()?;
        let length = reader.read_len(1)?;
        let mut body = ByteReader::new(reader.take(length)?);

        let entry = decode_entry(&mut body)?;
        if !body.is_at_end() {
            return Err(CacheError::corrupted(format!(
                "entry {index} has {} bytes beyond its fields",
                body.remaining()
            )));
        }

        entries.push((key, entry));
    }

    if !reader.is_at_end() {
        return Err(CacheError::corrupted(format!(
            "{} bytes follow the last entry",
            reader.remaining()
        )));
    }

    Ok(entries)
}

fn decode_entry(reader: &mut ByteReader<'_>) -> Result<CacheEntry, CacheError> {
    let created_at_millis = reader.read_i64()?;
    let source_content_hash = reader.read_u64()?;
    let source_unit_path = reader.read_str()?.to_string();

    let stage = reader.read_u32()?;
    let stage = ShaderStage::from_u32(stage)
        .ok_or_else(|| CacheError::corrupted(format!("unknown shader stage {stage}")))?;
    let target = reader.read_u32()?;
    let target = TargetDialect::from_u32(target)
        .ok_or_else(|| CacheError::corrupted(format!("unknown target dialect {target}")))?;

    let entry_point = reader.read_str()?.to_string();
    let debug_info = DebugInfoLevel::from_enabled(reader.read_bool()?);
    let optimisation = OptimisationLevel::from_release(reader.read_bool()?);
    let bytecode = reader.read_words()?;
    let native_source = reader.read_bytes()?.to_vec();
    let content_hash = reader.read_u64()?;
    let is_valid = reader.read_bool()?;

    let language = reader.read_u32()?;
    let language = SourceLanguage::from_u32(language)
        .ok_or_else(|| CacheError::corrupted(format!("unknown source language {language}")))?;

    let define_count = reader.read_len(16)?;
    let mut defines = Vec::with_capacity(define_count);
    for _ in 0..define_count {
        let name = reader.read_str()?.to_string();
        let value = reader.read_str()?.to_string();
        defines.push((name, value));
    }

    let include_count = reader.read_len(8)?;
    let mut include_paths = Vec::with_capacity(include_count);
    for _ in 0..include_count {
        include_paths.push(PathBuf::from(reader.read_str()?));
    }

    let diagnostics = reader.read_str()?.to_string();

    let reflection = if bytecode.is_empty() {
        Default::default()
    } else {
        extract_reflection(&bytecode).map_err(|error| {
            CacheError::corrupted(format!("the bytecode of `{source_unit_path}` is invalid, {error}"))
        })?
    };

    let request = CompileRequest::new("", source_unit_path.as_str(), entry_point, stage, target)
        .with_language(language)
        .with_defines(defines)
        .with_include_paths(include_paths)
        .with_debug_info(debug_info)
        .with_optimisation(optimisation);

    Ok(CacheEntry {
        artifact: CompiledArtifact {
            bytecode,
            native_source,
            reflection,
            diagnostics,
            is_valid,
            content_hash,
        },
        created_at_millis,
        source_unit_path,
        source_content_hash,
        request,
    })
}
