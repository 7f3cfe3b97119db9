//! Keeping the host awake while a run is active.
//!
//! An upscaling run can take hours with no user input, so idle sleep would
//! otherwise suspend the engine halfway through a job.

use std::any::Any;

use super::error::SleepError;

/// Holds a sleep inhibition; dropping it lets the host sleep again
pub struct SleepGuard {
    _hold: Box<dyn Any>,
}

impl SleepGuard {
    pub fn new(hold: impl Any) -> Self {
        Self {
            _hold: Box::new(hold),
        }
    }
}

/// Asks the OS not to suspend while a run is active
pub trait SleepInhibitor: Send + Sync {
    fn inhibit(&self, reason: &str) -> Result<SleepGuard, SleepError>;
}

/// The platform's own power management, through `keepawake`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSleepInhibitor;

impl SleepInhibitor for SystemSleepInhibitor {
    fn inhibit(&self, reason: &str) -> Result<SleepGuard, SleepError> {
        let awake = keepawake::Builder::default()
            .idle(true)
            .sleep(true)
            .reason(reason)
            .app_name("upscaler")
            .app_reverse_domain("io.github.upscaler")
            .create()
            .map_err(|e| SleepError(e.to_string()))?;
        Ok(SleepGuard::new(awake))
    }
}
