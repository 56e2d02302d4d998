//! Shade compiler logging. This defines the logger that backs every `log!`
//! statement in the compiler, and the style the messages are printed in.

use once_cell::sync::OnceCell;

use crate::{
    highlight::{Colour, Modifier, highlight},
    log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError},
    stream::CompilerOutputStream,
    stream_writeln,
};

/// The compiler logger that is used by the compiler for `log!` statements.
///
/// Errors are written into the `error_stream`, everything else goes to the
/// `output_stream`. When either stream has not been set, the logger falls
/// back onto the process `stdout` and `stderr`.
#[derive(Default)]
pub struct CompilerLogger {
    /// The output stream that the logger will write to.
    pub output_stream: OnceCell<CompilerOutputStream>,

    /// The error stream that the logger will write to.
    pub error_stream: OnceCell<CompilerOutputStream>,
}

impl CompilerLogger {
    /// Create a new compiler logger.
    pub const fn new() -> Self {
        Self { output_stream: OnceCell::new(), error_stream: OnceCell::new() }
    }

    /// Register `logger` as the global logger, writing into the given streams
    /// and enabling `debug` messages when requested.
    pub fn install(
        logger: &'static CompilerLogger,
        output: CompilerOutputStream,
        error: CompilerOutputStream,
        debug: bool,
    ) -> Result<(), SetLoggerError> {
        // The streams can only be set once, a second install keeps the
        // original streams.
        let _ = logger.output_stream.set(output);
        let _ = logger.error_stream.set(error);

        log::set_logger(logger)?;
        log::set_max_level(if debug { LevelFilter::Debug } else { LevelFilter::Info });
        Ok(())
    }

    fn stream_for(&self, level: Level) -> CompilerOutputStream {
        if level == Level::Error {
            self.error_stream.get().cloned().unwrap_or_else(CompilerOutputStream::stderr)
        } else {
            self.output_stream.get().cloned().unwrap_or_else(CompilerOutputStream::stdout)
        }
    }
}

impl Log for CompilerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let prefix = match record.level() {
            Level::Error => highlight(Colour::Red | Modifier::Bold, "error").to_string(),
            Level::Warn => highlight(Colour::Yellow | Modifier::Bold, "warn").to_string(),
            Level::Info => highlight(Colour::Blue | Modifier::Bold, "info").to_string(),
            Level::Debug => highlight(Colour::Cyan | Modifier::Bold, "debug").to_string(),
            Level::Trace => highlight(Colour::Magenta | Modifier::Bold, "trace").to_string(),
        };

        let mut out = self.stream_for(record.level());
        stream_writeln!(out, "{prefix}: {}", record.args());
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use log::Level;

    use super::*;

    #[test]
    fn errors_are_routed_into_the_error_stream() {
        let logger = CompilerLogger::new();
        let output = CompilerOutputStream::owned();
        let error = CompilerOutputStream::owned();
        let _ = logger.output_stream.set(output.clone());
        let _ = logger.error_stream.set(error.clone());

        assert!(matches!(logger.stream_for(Level::Error), CompilerOutputStream::Owned(_)));

        let mut stream = logger.stream_for(Level::Error);
        stream_writeln!(stream, "bad");
        let mut stream = logger.stream_for(Level::Info);
        stream_writeln!(stream, "fine");

        assert_eq!(error.contents().as_deref(), Some("bad\n"));
        assert_eq!(output.contents().as_deref(), Some("fine\n"));
    }
}
