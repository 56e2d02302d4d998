//! A line based preprocessor that runs before a unit is handed to `naga`.
//!
//! `#include` is expanded for every language. WGSL has no preprocessor of its
//! own, so for WGSL units this also implements `#define`, `#undef`, `#ifdef`,
//! `#ifndef`, `#else` and `#endif`, with defined names substituted as whole
//! identifiers outside of comments. Substituted values are rescanned, a macro
//! that names itself is left as is. GLSL units keep every other directive
//! since the `naga` GLSL front-end preprocesses them itself.
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use shade_pipeline::{
    error::PipelineError,
    fs::{ImportError, read_source, resolve_include},
    request::{CompileRequest, SourceLanguage},
};
use shade_reporting::report::{Report, ReportKind};
use shade_utils::fxhash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// Includes nested deeper than this are rejected.
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Macro values are rescanned for other macros at most this deep.
const MAX_EXPANSION_DEPTH: usize = 16;

/// The length of the identifier, or number, at the start of `text`.
fn identifier_len(text: &str) -> usize {
    text.bytes().take_while(|b| b.is_ascii_alphanumeric() || *b == b'_').count()
}

/// A line within a unit or one of its includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Error)]
pub enum PreprocessErrorKind {
    #[error("unknown preprocessor directive `#{0}`")]
    UnknownDirective(String),

    #[error("`#{0}` expects a macro name")]
    MissingName(&'static str),

    #[error("`#{0}` has no matching `#ifdef` or `#ifndef`")]
    UnbalancedConditional(&'static str),

    #[error("conditional block is never closed with `#endif`")]
    UnterminatedConditional,

    #[error("malformed `#include`, expected a quoted path")]
    MalformedInclude,

    #[error("includes are nested deeper than {MAX_INCLUDE_DEPTH} levels")]
    IncludeDepth,

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Read(#[from] PipelineError),
}

/// An error that stops a unit from being preprocessed.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct PreprocessError {
    pub kind: PreprocessErrorKind,
    pub location: Location,
}

impl PreprocessError {
    pub fn create_report(&self) -> Report {
        Report::new()
            .kind(ReportKind::Error)
            .title(self.to_string())
            .add_note("at", &self.location)
            .build()
    }
}

/// The result of preprocessing a unit.
#[derive(Debug, Default)]
pub struct PreprocessedSource {
    /// The expanded source text.
    pub text: String,

    /// Every file that was spliced into the unit, in inclusion order.
    pub dependencies: Vec<PathBuf>,

    /// Reports that don't prevent compilation, such as unused macro defines.
    pub warnings: Vec<Report>,
}

/// The state of one `#ifdef`/`#ifndef` block.
struct Conditional {
    condition: bool,
    parent_active: bool,
    seen_else: bool,
    opened_at: Location,
}

impl Conditional {
    fn is_active(&self) -> bool {
        self.parent_active && (self.condition != self.seen_else)
    }
}

/// Split `#name rest` into the directive name and the rest of the line.
fn parse_directive(line: &str) -> Option<(&str, &str)> {
    let body = line.trim_start().strip_prefix('#')?.trim_start();
    let end = body.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(body.len());
    Some((&body[..end], body[end..].trim()))
}

/// The path of an `#include "path"` or `#include <path>` directive.
fn include_target(rest: &str) -> Option<&str> {
    let (open, close) = match rest.chars().next()? {
        '"' => ('"', '"'),
        '<' => ('<', '>'),
        _ => return None,
    };

    let inner = rest.strip_prefix(open)?;
    let end = inner.find(close)?;
    Some(&inner[..end]).filter(|path| !path.is_empty())
}

fn leading_identifier(rest: &str) -> Option<&str> {
    let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(rest.len());
    let name = &rest[..end];
    name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_').then_some(name)
}

fn identifiers(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| word.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_'))
}

/// The directory that the includes of the main unit are resolved against.
fn unit_directory(request: &CompileRequest) -> Option<&Path> {
    Path::new(request.unit_name()).parent().filter(|dir| !dir.as_os_str().is_empty())
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

struct Preprocessor<'r> {
    request: &'r CompileRequest,

    /// Whether the `#define` family of directives is handled here.
    expand_macros: bool,
    defines: FxHashMap<String, String>,

    /// Names of request defines that the unit refers to.
    referenced: FxHashSet<String>,
    included: FxHashSet<PathBuf>,
    output: PreprocessedSource,
}

impl<'r> Preprocessor<'r> {
    fn new(request: &'r CompileRequest) -> Self {
        let mut included = FxHashSet::default();
        let unit = Path::new(request.unit_name());
        if unit.is_file() {
            included.insert(canonical(unit));
        }

        Self {
            request,
            expand_macros: request.language() == SourceLanguage::Wgsl,
            defines: request.macro_defines().iter().cloned().collect(),
            referenced: FxHashSet::default(),
            included,
            output: PreprocessedSource::default(),
        }
    }

    fn process_file(
        &mut self,
        text: &str,
        file: &str,
        directory: Option<&Path>,
        depth: usize,
    ) -> Result<(), PreprocessError> {
        let mut conditionals: Vec<Conditional> = Vec::new();
        let mut comment_depth = 0;

        for (index, line) in text.lines().enumerate() {
            let location = Location { file: file.to_string(), line: index + 1 };
            let active = conditionals.last().is_none_or(Conditional::is_active);

            if comment_depth == 0 {
                if let Some((name, rest)) = parse_directive(line) {
                    let error = |kind| PreprocessError { kind, location: location.clone() };

                    match name {
                        "include" => {
                            if active {
                                let target = include_target(rest)
                                    .ok_or_else(|| error(PreprocessErrorKind::MalformedInclude))?;
                                self.include(target, directory, depth, &location)?;
                            }
                        }
                        _ if !self.expand_macros => {
                            self.note_references(rest);
                            self.output.text.push_str(line);
                        }
                        "define" if active => {
                            let name = leading_identifier(rest)
                                .ok_or_else(|| error(PreprocessErrorKind::MissingName("define")))?;
                            let value = rest[name.len()..].trim().to_string();
                            self.defines.insert(name.to_string(), value);
                        }
                        "undef" if active => {
                            let name = leading_identifier(rest)
                                .ok_or_else(|| error(PreprocessErrorKind::MissingName("undef")))?;
                            self.defines.remove(name);
                        }
                        "ifdef" | "ifndef" => {
                            let directive = if name == "ifdef" { "ifdef" } else { "ifndef" };
                            let macro_name = leading_identifier(rest)
                                .ok_or_else(|| error(PreprocessErrorKind::MissingName(directive)))?;

                            if active {
                                self.mark_referenced(macro_name);
                            }

                            let defined = self.defines.contains_key(macro_name);
                            conditionals.push(Conditional {
                                condition: defined == (directive == "ifdef"),
                                parent_active: active,
                                seen_else: false,
                                opened_at: location.clone(),
                            });
                        }
                        "else" => match conditionals.last_mut() {
                            Some(conditional) if !conditional.seen_else => {
                                conditional.seen_else = true
                            }
                            _ => return Err(error(PreprocessErrorKind::UnbalancedConditional("else"))),
                        },
                        "endif" => {
                            if conditionals.pop().is_none() {
                                return Err(error(PreprocessErrorKind::UnbalancedConditional(
                                    "endif",
                                )));
                            }
                        }
                        _ if active => {
                            return Err(error(PreprocessErrorKind::UnknownDirective(
                                name.to_string(),
                            )));
                        }
                        _ => {}
                    }

                    self.output.text.push('\n');
                    continue;
                }
            }

            if active {
                if self.expand_macros {
                    let expanded = self.expand_line(line, &mut comment_depth);
                    self.output.text.push_str(&expanded);
                } else {
                    self.note_references(line);
                    self.output.text.push_str(line);
                }
            }

            self.output.text.push('\n');
        }

        match conditionals.pop() {
            Some(open) => Err(PreprocessError {
                kind: PreprocessErrorKind::UnterminatedConditional,
                location: open.opened_at,
            }),
            None => Ok(()),
        }
    }

    fn include(
        &mut self,
        target: &str,
        directory: Option<&Path>,
        depth: usize,
        location: &Location,
    ) -> Result<(), PreprocessError> {
        let error = |kind| PreprocessError { kind, location: location.clone() };

        if depth >= MAX_INCLUDE_DEPTH {
            return Err(error(PreprocessErrorKind::IncludeDepth));
        }

        let path = resolve_include(target, directory, self.request.include_paths())
            .map_err(|err| error(err.into()))?;

        // Every file is spliced in at most once per unit.
        if !self.included.insert(canonical(&path)) {
            return Ok(());
        }

        let text = read_source(&path).map_err(|err| error(err.into()))?;
        self.output.dependencies.push(path.clone());
        self.process_file(&text, &path.display().to_string(), path.parent(), depth + 1)
    }

    fn mark_referenced(&mut self, name: &str) {
        if self.request.macro_defines().iter().any(|(define, _)| define == name) {
            self.referenced.insert(name.to_string());
        }
    }

    fn note_references(&mut self, line: &str) {
        for word in identifiers(line) {
            self.mark_referenced(word);
        }
    }

    /// Substitute defined names in a line, skipping comments. `comment_depth`
    /// carries nested block comments across lines.
    fn expand_line(&mut self, line: &str, comment_depth: &mut usize) -> String {
        let mut out = String::with_capacity(line.len());
        let mut index = 0;

        while index < line.len() {
            let rest = &line[index..];

            if *comment_depth > 0 || rest.starts_with("/*") {
                if rest.starts_with("/*") {
                    *comment_depth += 1;
                    out.push_str("/*");
                    index += 2;
                } else if rest.starts_with("*/") {
                    *comment_depth -= 1;
                    out.push_str("*/");
                    index += 2;
                } else if let Some(c) = rest.chars().next() {
                    out.push(c);
                    index += c.len_utf8();
                }
                continue;
            }

            if rest.starts_with("//") {
                out.push_str(rest);
                break;
            }

            let word_len = identifier_len(rest);

            if word_len > 0 {
                self.expand_word(&rest[..word_len], &mut Vec::new(), &mut out);
                index += word_len;
                continue;
            }

            match rest.chars().next() {
                Some(c) => {
                    out.push(c);
                    index += c.len_utf8();
                }
                None => break,
            }
        }

        out
    }

    /// Write `word` into `out`, substituting it when it is defined. The value
    /// is rescanned for further macros, a macro is never expanded within its
    /// own expansion.
    fn expand_word(&mut self, word: &str, active: &mut Vec<String>, out: &mut String) {
        let value = match self.defines.get(word) {
            Some(value)
                if !word.starts_with(|c: char| c.is_ascii_digit())
                    && active.len() < MAX_EXPANSION_DEPTH
                    && !active.iter().any(|name| name == word) =>
            {
                value.clone()
            }
            _ => {
                out.push_str(word);
                return;
            }
        };

        self.mark_referenced(word);
        active.push(word.to_string());

        let mut rest = value.as_str();
        while let Some(c) = rest.chars().next() {
            let word_len = identifier_len(rest);

            if word_len > 0 {
                self.expand_word(&rest[..word_len], active, out);
                rest = &rest[word_len..];
            } else {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }

        active.pop();
    }

    fn finish(mut self) -> PreprocessedSource {
        let mut warned = FxHashSet::default();

        for (name, _) in self.request.macro_defines() {
            if !self.referenced.contains(name) && warned.insert(name.as_str()) {
                self.output.warnings.push(
                    Report::new()
                        .kind(ReportKind::Warning)
                        .title(format!(
                            "macro `{name}` is defined but never used by `{}`",
                            self.request.unit_name()
                        ))
                        .build(),
                );
            }
        }

        self.output
    }
}

/// Preprocess the source of a request.
pub fn preprocess(request: &CompileRequest) -> Result<PreprocessedSource, PreprocessError> {
    let source = request.source_text();

    if request.macro_defines().is_empty() && !source.contains('#') {
        return Ok(PreprocessedSource { text: source.to_string(), ..Default::default() });
    }

    let mut preprocessor = Preprocessor::new(request);
    preprocessor.process_file(source, request.unit_name(), unit_directory(request), 0)?;
    Ok(preprocessor.finish())
}

/// Collect every file that a request transitively includes, with its contents.
/// Files that can't be resolved or read are skipped, and includes are
/// followed regardless of any conditional they appear in.
pub fn collect_dependencies(request: &CompileRequest) -> Vec<(PathBuf, String)> {
    fn walk(
        text: &str,
        directory: Option<&Path>,
        depth: usize,
        include_paths: &[PathBuf],
        seen: &mut FxHashSet<PathBuf>,
        dependencies: &mut Vec<(PathBuf, String)>,
    ) {
        if depth >= MAX_INCLUDE_DEPTH {
            return;
        }

        for line in text.lines() {
            let Some(("include", rest)) = parse_directive(line) else {
                continue;
            };

            let Some(path) = include_target(rest)
                .and_then(|target| resolve_include(target, directory, include_paths).ok())
            else {
                continue;
            };

            if !seen.insert(canonical(&path)) {
                continue;
            }

            if let Ok(contents) = read_source(&path) {
                let nested = contents.clone();
                dependencies.push((path.clone(), contents));
                walk(&nested, path.parent(), depth + 1, include_paths, seen, dependencies);
            }
        }
    }

    let mut seen = FxHashSet::default();
    let mut dependencies = Vec::new();

    if request.source_text().contains('#') {
        walk(
            request.source_text(),
            unit_directory(request),
            0,
            request.include_paths(),
            &mut seen,
            &mut dependencies,
        );
    }

    dependencies
}
