//! Shade compiler crash handler.
use std::{io::Write, panic::PanicHookInfo, process::exit, sync::atomic, thread};

use backtrace::Backtrace;

const BUG_REPORT_MSG: &str = "This is a shader compiler bug, please attach the following to a report";

/// The crash handler that `shadec` registers as its panic hook. Only the first
/// panicking thread prints; it writes the panic message, its location and a
/// backtrace, then exits the process.
///
/// # Registering the handler
/// ```ignore
/// use std::panic;
/// use shade_utils::crash::crash_handler;
///
/// panic::set_hook(Box::new(crash_handler));
/// ```
pub fn crash_handler(info: &PanicHookInfo) {
    static PANIC_ONCE: atomic::AtomicBool = atomic::AtomicBool::new(false);

    if !PANIC_ONCE.swap(true, atomic::Ordering::SeqCst) {
        let stderr = std::io::stderr();
        let mut out = stderr.lock();

        let _ = write!(&mut out, "Internal Shader Compiler Error");

        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str));

        match payload {
            Some(message) => {
                let _ = writeln!(&mut out, ": {message}\n");
            }
            None => {
                let _ = writeln!(&mut out, "\n");
            }
        }

        if let Some(location) = info.location() {
            let _ = writeln!(
                &mut out,
                "Occurred at '{}:{}:{}'",
                location.file(),
                location.line(),
                location.column()
            );
        }

        let backtrace = Backtrace::new();

        match thread::current().name() {
            Some(name) => {
                let _ = writeln!(&mut out, "Backtrace for thread \"{name}\":\n{backtrace:?}");
            }
            None => {
                let _ = writeln!(&mut out, "Backtrace:\n{backtrace:?}");
            }
        }

        let _ = writeln!(&mut out, "{BUG_REPORT_MSG}");
    }

    exit(1);
}
