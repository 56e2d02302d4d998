//! Output streams the compiler writes messages into. The owned variant is
//! what tests and embedders use to capture everything the compiler prints
//! instead of letting it reach the terminal.

use std::{
    io,
    sync::{Arc, Mutex},
};

/// Where the output of the compiler should end up.
#[derive(Debug)]
pub enum CompilerOutputStream {
    /// Write to the process `stdout`.
    Stdout(io::Stdout),

    /// Write to the process `stderr`.
    Stderr(io::Stderr),

    /// An in-memory buffer shared between all clones of the stream.
    Owned(Arc<Mutex<Vec<u8>>>),
}

impl CompilerOutputStream {
    /// A stream that writes to `stdout`.
    pub fn stdout() -> Self {
        CompilerOutputStream::Stdout(io::stdout())
    }

    /// A stream that writes to `stderr`.
    pub fn stderr() -> Self {
        CompilerOutputStream::Stderr(io::stderr())
    }

    /// A stream that collects everything into memory.
    pub fn owned() -> Self {
        CompilerOutputStream::Owned(Arc::new(Mutex::new(Vec::new())))
    }

    /// Everything written so far, if this is an [`CompilerOutputStream::Owned`]
    /// stream.
    pub fn contents(&self) -> Option<String> {
        match self {
            CompilerOutputStream::Owned(buffer) => {
                let buffer = buffer.lock().ok()?;
                Some(String::from_utf8_lossy(&buffer).into_owned())
            }
            _ => None,
        }
    }
}

impl Clone for CompilerOutputStream {
    fn clone(&self) -> Self {
        match self {
            CompilerOutputStream::Stdout(_) => CompilerOutputStream::stdout(),
            CompilerOutputStream::Stderr(_) => CompilerOutputStream::stderr(),
            CompilerOutputStream::Owned(buffer) => CompilerOutputStream::Owned(buffer.clone()),
        }
    }
}

impl io::Write for CompilerOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompilerOutputStream::Stdout(stream) => stream.write(buf),
            CompilerOutputStream::Stderr(stream) => stream.write(buf),
            CompilerOutputStream::Owned(buffer) => {
                let mut buffer =
                    buffer.lock().map_err(|_| io::Error::other("output buffer was poisoned"))?;
                buffer.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompilerOutputStream::Stdout(stream) => stream.flush(),
            CompilerOutputStream::Stderr(stream) => stream.flush(),
            CompilerOutputStream::Owned(_) => Ok(()),
        }
    }
}

/// Write a line into a [CompilerOutputStream], ignoring write failures.
/// There is nowhere else to report a failure to print a message.
#[macro_export]
macro_rules! stream_writeln {
    ($stream:expr, $($arg:tt)*) => {{
        use ::std::io::Write as _;
        let _ = writeln!($stream, $($arg)*);
    }};
}
