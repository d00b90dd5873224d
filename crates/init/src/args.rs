//! The process's own argument vector.
//!
//! The kernel passes unrecognised boot parameters to PID 1 as arguments,
//! where they would stay visible in `/proc/1/cmdline` for the life of the
//! machine. PID 1 keeps the raw strings and wipes them in place.

use std::ffi::{CStr, c_char, c_int};

/// Mutable views over the NUL-terminated strings of `argv`, terminators
/// excluded.
#[derive(Debug)]
pub struct ArgVector<'a> {
    args: Vec<&'a mut [u8]>,
}

impl<'a> ArgVector<'a> {
    pub fn new(args: Vec<&'a mut [u8]>) -> Self {
        Self { args }
    }

    /// Wrap the vector handed to a C `main`.
    ///
    /// # Safety
    ///
    /// `argv` must point to `argc` valid, writable, NUL-terminated strings
    /// that live for the rest of the process and that nothing else writes.
    pub unsafe fn from_raw(argc: c_int, argv: *mut *mut c_char) -> ArgVector<'static> {
        let count = usize::try_from(argc).unwrap_or(0);
        let mut args = Vec::with_capacity(count);
        if argv.is_null() {
            return ArgVector { args };
        }

        for i in 0..count {
            // SAFETY: `i < argc`, guaranteed in bounds by the caller.
            let ptr = unsafe { *argv.add(i) };
            if ptr.is_null() {
                break;
            }
            // SAFETY: the caller guarantees a valid NUL-terminated string.
            let len = unsafe { CStr::from_ptr(ptr) }.to_bytes().len();
            // SAFETY: `len` bytes before the terminator are writable and
            // exclusively ours for the rest of the process.
            args.push(unsafe { std::slice::from_raw_parts_mut(ptr.cast::<u8>(), len) });
        }
        ArgVector { args }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Zero every argument after the program name.
    pub fn scrub(&mut self) {
        for arg in self.args.iter_mut().skip(1) {
            arg.fill(0);
        }
    }
}
