//! Minimal PID 1.
//!
//! Prepares the runtime environment (pseudo filesystems, standard
//! descriptors, environment) and then runs two fixed workloads, `/etc/boot`
//! and `/etc/reboot`, one after the other for the lifetime of the machine.
//! Between passes it stages a new kernel with kexec when one appears at
//! `/kernel`, and restarts when a reboot marker file appears.
//!
//! Startup sequence:
//! 1. Refuse to run unless PID 1
//! 2. Mount the pseudo filesystems, create scratch dirs and symlinks
//! 3. Bind null, console and kmsg to descriptors 0, 1 and 2
//! 4. Default `TERM`, scrub the argument vector, unlink our own image
//! 5. Block every signal, keeping the original mask for children
//!
//! Steady loop: boot, reboot, update check, reboot marker check, sleep.

pub mod args;
pub mod config;
pub mod control;
pub mod env;
pub mod fd;
pub mod fs;
pub mod kernel;
pub mod log;
pub mod power;
pub mod signals;
pub mod supervisor;
pub mod update;
