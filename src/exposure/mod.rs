//! Exposure lifecycle state machine.
//!
//! One controller coordinates each capture cycle: it quantizes the
//! requested duration, hands the blocking device capture to a
//! background task, and advances Idle → Exposing → Downloading → Idle
//! under a periodic external poll.

mod controller;

pub use controller::{ControllerError, CycleError, ExposureController, Phase, PollStatus};
