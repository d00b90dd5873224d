//! PID 1 entry point.
//!
//! `main` is the C entry point so that the raw argument strings can be
//! scrubbed in place.

#![no_main]

use std::ffi::{c_char, c_int};

use init::args::ArgVector;
use init::config::Config;
use init::control::{self, ControlLoop};
use init::kernel::Linux;
use init::log_crit;

#[unsafe(no_mangle)]
extern "C" fn main(argc: c_int, argv: *mut *mut c_char) -> c_int {
    // SAFETY: argc/argv come straight from the C runtime; the strings live
    // until exit and nothing else in this process writes to them.
    let mut args = unsafe { ArgVector::from_raw(argc, argv) };

    match control::setup(&Linux, &mut args) {
        Ok(child_mask) => ControlLoop::new(Linux, Config::from_env(), child_mask).run(),
        Err(e) => {
            log_crit!("{e}");
            1
        }
    }
}
