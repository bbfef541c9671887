use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Single-shot silence countdown
///
/// Rearming cancels the outstanding expiry before scheduling a new one, so at
/// most one expiry task exists. Each arming gets an id; an expiry that was
/// already in flight when the timer was rearmed or disarmed carries a stale
/// id and must be ignored by the receiver (see [`InactivityTimer::is_current`]).
#[derive(Debug)]
pub struct InactivityTimer {
    duration: Duration,
    pending: Option<JoinHandle<()>>,
    deadline: Option<Instant>,
    arm_id: u64,
}

impl InactivityTimer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            pending: None,
            deadline: None,
            arm_id: 0,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// (Re)schedule `on_expiry` one timeout from now. Must run inside a tokio runtime.
    pub fn arm<F>(&mut self, on_expiry: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.disarm();

        self.arm_id += 1;
        let arm_id = self.arm_id;
        let deadline = Instant::now() + self.duration;

        self.deadline = Some(deadline);
        self.pending = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            on_expiry(arm_id);
        }));

        arm_id
    }

    /// Cancel the outstanding expiry, if any
    pub fn disarm(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether an expiry tagged `arm_id` still belongs to the live arming
    pub fn is_current(&self, arm_id: u64) -> bool {
        self.is_armed() && arm_id == self.arm_id
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
