//! Signal mask handling for PID 1.

use nix::errno::Errno;
use nix::sys::signal::{SigSet, SigmaskHow, sigprocmask};

/// Block every signal and return the mask that was in effect before.
///
/// The returned mask is what supervised children get back before exec.
pub fn block_all() -> Result<SigSet, Errno> {
    let mut original = SigSet::empty();
    sigprocmask(SigmaskHow::SIG_BLOCK, Some(&SigSet::all()), Some(&mut original))?;
    Ok(original)
}
