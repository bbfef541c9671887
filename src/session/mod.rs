//! Speech-recognition session management
//!
//! This module provides the `SessionController` that manages:
//! - Audio session activation and the input tap
//! - The recognition request and task lifecycle
//! - The silence (inactivity) timeout
//! - Observable state (`SessionSnapshot`) and lifecycle events

mod config;
mod controller;
mod event;
mod stats;
mod timer;

pub use config::SessionConfig;
pub use controller::SessionController;
pub use event::{EndReason, SessionEvent, SessionSnapshot, SessionState, StartFailure};
pub use stats::SessionStats;
pub use timer::InactivityTimer;
