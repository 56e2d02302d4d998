//! Shade compiler diagnostic report data structures.
use std::{fmt, io};

use shade_utils::highlight::{Colour, Modifier, highlight};

/// The kind of [Report] that is being emitted.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum ReportKind {
    /// The report is an error, the job that produced it failed.
    Error,

    /// The report is purely informational.
    Info,

    /// The report is a warning, it never stops compilation.
    Warning,
}

impl ReportKind {
    /// The label that prefixes the report title.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Error => "error",
            ReportKind::Info => "info",
            ReportKind::Warning => "warning",
        }
    }

    fn colour(&self) -> Colour {
        match self {
            ReportKind::Error => Colour::Red,
            ReportKind::Info => Colour::Blue,
            ReportKind::Warning => Colour::Yellow,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An additional labelled message attached to a [Report].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportNote {
    pub label: String,
    pub message: String,
}

impl ReportNote {
    pub fn new(label: impl ToString, message: impl ToString) -> Self {
        Self { label: label.to_string(), message: message.to_string() }
    }
}

/// A diagnostic that the compiler produced. Reports are created by stages and
/// collected by the driver, which decides whether the job should continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// What kind of report this is.
    pub kind: ReportKind,

    /// The one line summary of the report.
    pub title: String,

    /// Any additional information.
    pub notes: Vec<ReportNote>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    /// Create an empty error report.
    pub fn new() -> Self {
        Self { kind: ReportKind::Error, title: String::new(), notes: Vec::new() }
    }

    /// Set the [ReportKind] of the report.
    pub fn kind(&mut self, kind: ReportKind) -> &mut Self {
        self.kind = kind;
        self
    }

    /// Set the title of the report.
    pub fn title(&mut self, title: impl ToString) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Attach a [ReportNote] to the report.
    pub fn add_note(&mut self, label: impl ToString, message: impl ToString) -> &mut Self {
        self.notes.push(ReportNote::new(label, message));
        self
    }

    /// Take the report out of a builder chain.
    pub fn build(&mut self) -> Report {
        std::mem::take(self)
    }

    pub fn is_error(&self) -> bool {
        self.kind == ReportKind::Error
    }

    pub fn is_warning(&self) -> bool {
        self.kind == ReportKind::Warning
    }

    /// Wrap the report so that it renders with terminal colours.
    pub fn coloured(&self) -> ColouredReport<'_> {
        ColouredReport(self)
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, label: &dyn fmt::Display) -> fmt::Result {
        write!(f, "{label}: {}", self.title)?;

        for note in &self.notes {
            let mut lines = note.message.trim_end().lines();

            if let Some(first) = lines.next() {
                write!(f, "\n  = {}: {first}", note.label)?;
            }

            for line in lines {
                write!(f, "\n    {line}")?;
            }
        }

        Ok(())
    }
}

/// Reports render as plain text, this is what ends up inside compiled
/// artifacts and the shader cache.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &self.kind)
    }
}

/// A [Report] rendered with terminal colours.
pub struct ColouredReport<'r>(&'r Report);

impl fmt::Display for ColouredReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.0.kind;
        self.0.render(f, &highlight(kind.colour() | Modifier::Bold, kind.as_str()))
    }
}

/// Render a sequence of reports as plain text, one report after another.
pub fn render_reports<'r>(reports: impl IntoIterator<Item = &'r Report>) -> String {
    reports.into_iter().map(|report| report.to_string()).collect::<Vec<_>>().join("\n")
}

impl From<io::Error> for Report {
    fn from(error: io::Error) -> Self {
        Report::new().kind(ReportKind::Error).title(error.to_string()).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_render_notes_below_the_title() {
        let report = Report::new()
            .kind(ReportKind::Warning)
            .title("macro `FOG` is never used")
            .add_note("unit", "water.wgsl")
            .add_note("detail", "first line\nsecond line\n")
            .build();

        assert_eq!(
            report.to_string(),
            "warning: macro `FOG` is never used\n  = unit: water.wgsl\n  = detail: first line\n    second line"
        );
        assert!(report.is_warning());
        assert!(!report.is_error());
    }

    #[test]
    fn coloured_reports_keep_the_same_text() {
        let report = Report::new().title("boom").build();
        let coloured = report.coloured().to_string();

        assert!(coloured.contains("error"));
        assert!(coloured.ends_with(": boom"));
        assert_ne!(coloured, report.to_string());
    }
}
