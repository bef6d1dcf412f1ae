//! Ctrl-C handling.
//!
//! Once the handler is installed, an interrupt no longer kills the process
//! outright. A git child receiving the same signal fails its call, which
//! unwinds through the staging guards, and the assembler refuses to start on
//! the next file.

use crate::EnvironmentError;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install the process-wide Ctrl-C handler
pub fn install() -> Result<(), EnvironmentError> {
    ctrlc::set_handler(|| {
        INTERRUPTED.store(true, Ordering::SeqCst);
        log::warn!("Interrupted; stopping after the current file");
    })
    .map_err(|e| EnvironmentError::SignalHandler {
        message: e.to_string(),
    })
}

/// The flag set by the handler
pub fn flag() -> &'static AtomicBool {
    &INTERRUPTED
}
