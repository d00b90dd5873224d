//! Kernel log output.
//!
//! Descriptor 2 is bound to `/dev/kmsg` during setup, so every line carries
//! a `<N>` syslog priority prefix that the kernel log consumer understands.
//! Before the binding happens (or if it fails) lines go wherever descriptor 2
//! points, or nowhere.

use std::fmt::{self, Write as _};
use std::io::{self, Write};

/// Program tag printed after the priority marker.
pub const TAG: &str = "init";

/// Maximum message body length in bytes.
pub const LINE_MAX: usize = 256;

/// Syslog priority of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Critical = 2,
    Error = 3,
    Warning = 4,
    Info = 6,
}

impl Level {
    /// ASCII digit placed between the angle brackets.
    pub fn code(self) -> u8 {
        b'0' + (self as u8 & 7)
    }
}

/// Message body buffer that refuses to grow past [`LINE_MAX`].
///
/// Once full it fails every further write, which makes `write_fmt` stop
/// evaluating the remaining arguments.
struct LineBuf {
    buf: Vec<u8>,
    full: bool,
}

impl LineBuf {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(LINE_MAX),
            full: false,
        }
    }
}

impl fmt::Write for LineBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.full {
            return Err(fmt::Error);
        }
        let room = LINE_MAX - self.buf.len();
        if s.len() <= room {
            self.buf.extend_from_slice(s.as_bytes());
            return Ok(());
        }

        let cut = (0..=room).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
        self.buf.extend_from_slice(s.as_bytes().get(..cut).unwrap_or_default());
        self.full = true;
        Err(fmt::Error)
    }
}

/// Format a complete line, header and newline included.
///
/// Returns `None` when formatting fails or produces an empty message.
pub fn format_line(level: Level, args: fmt::Arguments<'_>) -> Option<Vec<u8>> {
    let mut msg = LineBuf::new();
    // An error after the buffer filled up is the truncation, not a failure.
    if (msg.write_fmt(args).is_err() && !msg.full) || msg.buf.is_empty() {
        return None;
    }

    let mut line = Vec::with_capacity(msg.buf.len() + TAG.len() + 6);
    line.push(b'<');
    line.push(level.code());
    line.push(b'>');
    line.extend_from_slice(TAG.as_bytes());
    line.extend_from_slice(b": ");
    line.extend_from_slice(&msg.buf);
    line.push(b'\n');
    Some(line)
}

/// Write one formatted line to `w` with a single `write` call.
pub fn write_line<W: Write>(w: &mut W, level: Level, args: fmt::Arguments<'_>) {
    if let Some(line) = format_line(level, args) {
        let _ = w.write(&line);
    }
}

/// Write one line to descriptor 2. Never fails.
pub fn emit(level: Level, args: fmt::Arguments<'_>) {
    write_line(&mut io::stderr(), level, args);
}

/// Log a critical message to the kernel log.
#[macro_export]
macro_rules! log_crit {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Critical, format_args!($($arg)*))
    };
}

/// Log an error message to the kernel log.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Error, format_args!($($arg)*))
    };
}

/// Log a warning message to the kernel log.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Warning, format_args!($($arg)*))
    };
}

/// Log an info message to the kernel log.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::log::emit($crate::log::Level::Info, format_args!($($arg)*))
    };
}
