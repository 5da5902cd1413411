//! The exposure cycle controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use thiserror::Error;

use crate::acquire::PipelineError;
use crate::device::{CameraSession, CaptureHandle, DeviceError, SessionError};

/// Lifecycle phase of the exposure state machine.
///
/// Transitions are monotonic within a cycle: Idle → Exposing →
/// Downloading → Idle. Downloading is entered exactly once per cycle,
/// even when the capture itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Exposing,
    Downloading,
}

/// Failures that prevent an exposure from starting.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("an exposure is already in progress")]
    Busy,
    #[error("could not prepare the exposure: {0}")]
    Prepare(#[from] SessionError),
}

/// Failures that end a running cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("capture failed: {0}")]
    Capture(DeviceError),
    #[error("download failed: {0}")]
    Download(PipelineError),
}

/// What one poll observed.
#[derive(Debug)]
pub enum PollStatus {
    /// No capture pending.
    Idle,
    /// Still exposing; `remaining_secs` never goes below zero.
    Exposing { remaining_secs: f64 },
    /// The cycle finished (successfully or not) and the machine is
    /// back in [`Phase::Idle`].
    CycleEnded(Result<(), CycleError>),
}

/// Drives one exposure cycle at a time.
///
/// The blocking device capture runs on a background thread that
/// reports through an mpsc channel; the poller is the only writer of
/// the machine's phase. A shared cancellation token makes aborts
/// cooperative: backends that cannot interrupt an in-flight capture
/// finish it, and the stale result is discarded on a later poll.
pub struct ExposureController {
    phase: Phase,
    requested_secs: f64,
    started_at: Option<Instant>,
    cancel: Arc<AtomicBool>,
    result_rx: Option<Receiver<Result<CaptureHandle, DeviceError>>>,
    pending_result: Option<Result<CaptureHandle, DeviceError>>,
    worker: Option<JoinHandle<()>>,
    last_capture: Option<CaptureHandle>,
}

impl ExposureController {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            requested_secs: 0.0,
            started_at: None,
            cancel: Arc::new(AtomicBool::new(false)),
            result_rx: None,
            pending_result: None,
            worker: None,
            last_capture: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Duration requested for the current or most recent cycle.
    pub fn requested_secs(&self) -> f64 {
        self.requested_secs
    }

    /// Handle of the most recently completed capture.
    pub fn last_capture(&self) -> Option<&CaptureHandle> {
        self.last_capture.as_ref()
    }

    /// Starts a new exposure cycle.
    ///
    /// Resolves `duration_secs` through the session's shutter catalog,
    /// applies the token, and spawns the background capture task. The
    /// call returns immediately; completion is observed through
    /// [`poll`](Self::poll).
    pub fn start_exposure(
        &mut self,
        session: &mut CameraSession,
        duration_secs: f64,
    ) -> Result<(), ControllerError> {
        if self.phase != Phase::Idle {
            return Err(ControllerError::Busy);
        }
        // A previously aborted task may still hold the device.
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                if worker.join().is_err() {
                    tracing::warn!("previous capture task panicked");
                }
            } else {
                self.worker = Some(worker);
                return Err(ControllerError::Busy);
            }
        }

        let token = session.apply_shutter_speed(duration_secs)?;
        tracing::info!(duration_secs, token = %token, "starting exposure");

        let transport = session.transport();
        let cancel = Arc::new(AtomicBool::new(false));
        let task_cancel = Arc::clone(&cancel);
        let (tx, rx) = mpsc::channel();

        let worker = std::thread::spawn(move || {
            let result = match transport.lock() {
                Ok(mut transport) => transport.trigger_capture(&task_cancel),
                Err(_) => Err(DeviceError::Capture(
                    "device transport lock poisoned".to_string(),
                )),
            };
            match &result {
                Ok(handle) => tracing::info!(name = %handle.name, "capture finished"),
                Err(e) => tracing::error!(error = %e, "capture task failed"),
            }
            // The receiver disappears if the cycle was aborted.
            let _ = tx.send(result);
        });

        self.cancel = cancel;
        self.result_rx = Some(rx);
        self.pending_result = None;
        self.worker = Some(worker);
        self.requested_secs = duration_secs;
        self.started_at = Some(Instant::now());
        self.phase = Phase::Exposing;
        Ok(())
    }

    /// Advances the state machine; called by the external poller at a
    /// fixed cadence and safe to call in any phase.
    ///
    /// While exposing, reports the clamped remaining time. Once the
    /// countdown has elapsed *and* the capture task has reported, the
    /// machine enters Downloading, runs `download` synchronously, and
    /// returns to Idle regardless of the outcome.
    pub fn poll<F>(&mut self, download: F) -> PollStatus
    where
        F: FnOnce(&CaptureHandle) -> Result<(), PipelineError>,
    {
        if self.phase != Phase::Exposing {
            self.drain_stale_result();
            return PollStatus::Idle;
        }

        self.pump_result_channel();

        let elapsed = self
            .started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(self.requested_secs);
        let remaining_secs = (self.requested_secs - elapsed).max(0.0);

        if remaining_secs > 0.0 {
            return PollStatus::Exposing { remaining_secs };
        }
        let Some(result) = self.pending_result.take() else {
            // Countdown elapsed but the device has not reported yet
            // (shutter/transfer delay).
            return PollStatus::Exposing { remaining_secs: 0.0 };
        };

        if let Some(worker) = self.worker.take() {
            // The task has already sent its result; this join is
            // momentary.
            if worker.join().is_err() {
                tracing::warn!("capture task panicked");
            }
        }

        self.phase = Phase::Downloading;
        let outcome = match result {
            Ok(handle) => {
                tracing::info!("exposure done, downloading image");
                self.last_capture = Some(handle.clone());
                download(&handle).map_err(CycleError::Download)
            }
            Err(e) => Err(CycleError::Capture(e)),
        };
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "exposure cycle failed");
        }

        self.phase = Phase::Idle;
        self.started_at = None;
        self.result_rx = None;
        PollStatus::CycleEnded(outcome)
    }

    /// Requests an abort and returns the machine to Idle immediately.
    ///
    /// The cancellation is cooperative: the capture task observes the
    /// token where the backend allows it; otherwise the capture runs
    /// to completion and its result is discarded.
    pub fn abort_exposure(&mut self) {
        if self.phase == Phase::Idle && self.worker.is_none() {
            return;
        }
        tracing::warn!("aborting exposure");
        self.cancel.store(true, Ordering::SeqCst);
        self.phase = Phase::Idle;
        self.started_at = None;
        self.pending_result = None;
        // result_rx stays open so the late result can be drained.
    }

    fn pump_result_channel(&mut self) {
        let Some(rx) = &self.result_rx else {
            return;
        };
        match rx.try_recv() {
            Ok(result) => self.pending_result = Some(result),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending_result = Some(Err(DeviceError::Capture(
                    "capture task exited without reporting".to_string(),
                )));
                self.result_rx = None;
            }
        }
    }

    /// Discards a result that arrived after an abort.
    fn drain_stale_result(&mut self) {
        if let Some(rx) = &self.result_rx {
            match rx.try_recv() {
                Ok(result) => {
                    tracing::debug!(
                        aborted_ok = result.is_ok(),
                        "discarding capture result from aborted cycle"
                    );
                    self.result_rx = None;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.result_rx = None,
            }
        }
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                if worker.join().is_err() {
                    tracing::warn!("capture task panicked");
                }
            } else {
                self.worker = Some(worker);
            }
        }
    }
}

impl Default for ExposureController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ExposureController {
    fn drop(&mut self) {
        // Let a still-running capture task wind down early.
        self.cancel.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CameraSession, MockControl, MockTransport};
    use std::time::Duration;

    fn session_with(transport: MockTransport) -> CameraSession {
        CameraSession::connect(Box::new(MockControl::new()), Box::new(transport)).unwrap()
    }

    fn quick_session() -> CameraSession {
        session_with(MockTransport::new(4, 2).with_capture_delay(Duration::from_millis(10)))
    }

    fn ok_download(_: &CaptureHandle) -> Result<(), PipelineError> {
        Ok(())
    }

    #[test]
    fn test_poll_is_noop_while_idle() {
        let mut controller = ExposureController::new();
        assert!(matches!(controller.poll(ok_download), PollStatus::Idle));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[test]
    fn test_full_cycle_reaches_download_once() {
        let mut session = quick_session();
        let mut controller = ExposureController::new();
        controller.start_exposure(&mut session, 0.05).unwrap();
        assert_eq!(controller.phase(), Phase::Exposing);

        let mut downloads = 0;
        let mut previous_remaining = f64::INFINITY;
        let outcome = loop {
            match controller.poll(|_| {
                downloads += 1;
                Ok(())
            }) {
                PollStatus::Exposing { remaining_secs } => {
                    assert!(remaining_secs <= previous_remaining);
                    assert!(remaining_secs >= 0.0);
                    previous_remaining = remaining_secs;
                    std::thread::sleep(Duration::from_millis(10));
                }
                PollStatus::CycleEnded(outcome) => break outcome,
                PollStatus::Idle => panic!("machine fell idle mid-cycle"),
            }
        };

        assert!(outcome.is_ok());
        assert_eq!(downloads, 1);
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.last_capture().is_some());

        // The machine is reusable for the next cycle.
        controller.start_exposure(&mut session, 0.05).unwrap();
    }

    #[test]
    fn test_start_while_exposing_is_busy() {
        let mut session = quick_session();
        let mut controller = ExposureController::new();
        controller.start_exposure(&mut session, 0.5).unwrap();
        assert!(matches!(
            controller.start_exposure(&mut session, 0.5),
            Err(ControllerError::Busy)
        ));
    }

    #[test]
    fn test_out_of_range_duration_rejected() {
        let mut session = quick_session();
        let mut controller = ExposureController::new();
        // Mock shutter catalog tops out at 60 seconds.
        assert!(matches!(
            controller.start_exposure(&mut session, 400.0),
            Err(ControllerError::Prepare(_))
        ));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[test]
    fn test_capture_failure_ends_cycle_in_idle() {
        let mut session = session_with(
            MockTransport::new(4, 2)
                .with_capture_delay(Duration::ZERO)
                .with_failing_capture(),
        );
        let mut controller = ExposureController::new();
        controller.start_exposure(&mut session, 0.01).unwrap();

        let outcome = loop {
            match controller.poll(ok_download) {
                PollStatus::CycleEnded(outcome) => break outcome,
                _ => std::thread::sleep(Duration::from_millis(5)),
            }
        };
        assert!(matches!(outcome, Err(CycleError::Capture(_))));
        assert_eq!(controller.phase(), Phase::Idle);

        // The failure does not poison the next cycle.
        controller.start_exposure(&mut session, 0.01).unwrap();
    }

    #[test]
    fn test_download_failure_still_returns_to_idle() {
        let mut session = quick_session();
        let mut controller = ExposureController::new();
        controller.start_exposure(&mut session, 0.01).unwrap();

        let outcome = loop {
            match controller.poll(|_| {
                Err(PipelineError::SizeMismatch {
                    expected: 1,
                    actual: 2,
                })
            }) {
                PollStatus::CycleEnded(outcome) => break outcome,
                _ => std::thread::sleep(Duration::from_millis(5)),
            }
        };
        assert!(matches!(outcome, Err(CycleError::Download(_))));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[test]
    fn test_abort_returns_to_idle_and_discards_late_result() {
        let mut session =
            session_with(MockTransport::new(4, 2).with_capture_delay(Duration::from_secs(5)));
        let mut controller = ExposureController::new();
        controller.start_exposure(&mut session, 5.0).unwrap();

        controller.abort_exposure();
        assert_eq!(controller.phase(), Phase::Idle);

        // The cancelled task reports shortly; polling drains it
        // without restarting a cycle.
        std::thread::sleep(Duration::from_millis(50));
        assert!(matches!(controller.poll(ok_download), PollStatus::Idle));
        assert_eq!(controller.phase(), Phase::Idle);

        // Once the task has wound down, a new cycle can start.
        controller.start_exposure(&mut session, 0.01).unwrap();
    }

    #[test]
    fn test_abort_while_idle_is_noop() {
        let mut controller = ExposureController::new();
        controller.abort_exposure();
        assert_eq!(controller.phase(), Phase::Idle);
    }
}
