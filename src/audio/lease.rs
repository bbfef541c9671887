use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::backend::{AudioCapture, AudioSessionConfig};

/// Capture backend shared between the session driver and the active lease
pub type SharedCapture = Arc<Mutex<Box<dyn AudioCapture>>>;

pub fn shared(capture: Box<dyn AudioCapture>) -> SharedCapture {
    Arc::new(Mutex::new(capture))
}

pub(crate) fn lock(capture: &SharedCapture) -> MutexGuard<'_, Box<dyn AudioCapture>> {
    capture.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An activated audio session
///
/// Acquired when a recognition session starts. Releasing stops the engine,
/// removes the input tap and deactivates the session. Dropping an
/// unreleased lease releases it, so early returns cannot leak the device.
pub struct AudioSessionLease {
    capture: SharedCapture,
    released: bool,
}

impl AudioSessionLease {
    /// Configure and activate the audio session
    pub fn acquire(capture: SharedCapture, config: &AudioSessionConfig) -> Result<Self> {
        {
            let mut backend = lock(&capture);
            debug!(
                backend = backend.name(),
                category = ?config.category,
                mode = ?config.mode,
                "Activating audio session"
            );
            backend
                .activate(config)
                .context("Couldn't configure the audio session")?;
        }

        Ok(Self {
            capture,
            released: false,
        })
    }

    pub fn capture(&self) -> MutexGuard<'_, Box<dyn AudioCapture>> {
        lock(&self.capture)
    }

    /// Stop capture and deactivate the audio session
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut backend = lock(&self.capture);
        backend.stop_engine();
        backend.remove_tap();
        if let Err(e) = backend.deactivate() {
            warn!("Failed to deactivate audio session: {:#}", e);
        }
        debug!(backend = backend.name(), "Audio session released");
    }
}

impl Drop for AudioSessionLease {
    fn drop(&mut self) {
        self.release_inner();
    }
}
