//! Host-facing driver glue.
//!
//! The host framework drives the crate through the [`ImagingCamera`]
//! capability trait: it starts and aborts exposures, adjusts frame
//! geometry, and calls [`tick`](ImagingCamera::tick) at a fixed cadence
//! (nominally once per second). [`TetherDriver`] implements the trait
//! over a connected session, keeping the state machine and pipeline
//! framework-agnostic.

use thiserror::Error;

use crate::acquire::{AcquisitionPipeline, PipelineError};
use crate::device::{
    CameraControl, CameraInfo, CameraSession, CaptureTransport, DeviceError, RawDecoder,
    SessionError,
};
use crate::exposure::{ControllerError, CycleError, ExposureController, Phase, PollStatus};
use crate::frame::{FrameBuffer, FrameType, GeometryError};

/// Errors surfaced to the host framework.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("connection failed: {0}")]
    Connect(#[from] DeviceError),
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),
}

/// Outcome of one timer tick.
#[derive(Debug)]
pub enum TickEvent {
    /// Nothing in flight.
    Idle,
    /// Exposure in progress; clamped remaining seconds.
    Exposing { remaining_secs: f64 },
    /// A cycle completed and the framebuffer holds a new image.
    FrameReady,
    /// A cycle ended in failure; the driver is ready for the next one.
    CycleFailed(CycleError),
}

/// Capability interface the host framework invokes through dynamic
/// dispatch.
pub trait ImagingCamera {
    /// Begins an exposure of approximately `duration_secs`, quantized
    /// to the camera's shutter choices.
    fn start_exposure(&mut self, duration_secs: f64) -> Result<(), DriverError>;

    /// Best-effort abort of the in-flight exposure.
    fn abort_exposure(&mut self);

    /// Selects a sensor sub-frame (unbinned coordinates).
    fn update_frame(&mut self, x: u32, y: u32, width: u32, height: u32)
        -> Result<(), DriverError>;

    /// Changes the binning factors.
    fn update_binning(&mut self, bin_x: u32, bin_y: u32) -> Result<(), DriverError>;

    /// Selects the exposure frame kind.
    fn set_frame_type(&mut self, frame_type: FrameType) -> Result<(), DriverError>;

    /// Applies a sensitivity value, returning what the camera settled
    /// on.
    fn set_sensitivity(&mut self, value: f64) -> Result<f64, DriverError>;

    /// Accepted sensitivity range, when the catalog parsed.
    fn sensitivity_range(&self) -> Option<(f64, f64)>;

    /// Camera identity read at connect time.
    fn camera_info(&self) -> &CameraInfo;

    /// Current exposure phase.
    fn phase(&self) -> Phase;

    /// The destination framebuffer.
    fn frame(&self) -> &FrameBuffer;

    /// Timer callback; advances the exposure state machine.
    fn tick(&mut self) -> TickEvent;

    /// Tears the connection down.
    fn disconnect(self: Box<Self>);
}

/// [`ImagingCamera`] implementation for tethered cameras producing
/// vendor RAW files.
pub struct TetherDriver<D> {
    session: CameraSession,
    controller: ExposureController,
    pipeline: AcquisitionPipeline<D>,
    frame: FrameBuffer,
    frame_type: FrameType,
    on_frame_ready: Option<Box<dyn FnMut(&FrameBuffer) + Send>>,
}

impl<D: RawDecoder> TetherDriver<D> {
    /// Connects the session and sizes the framebuffer for the full
    /// sensor.
    pub fn connect(
        control: Box<dyn CameraControl + Send>,
        transport: Box<dyn CaptureTransport>,
        decoder: D,
    ) -> Result<Self, DriverError> {
        let session = CameraSession::connect(control, transport)?;
        let frame = FrameBuffer::new(
            session.geometry().binned_width(),
            session.geometry().binned_height(),
            session.channels(),
            session.bits_per_channel(),
        );
        Ok(Self {
            session,
            controller: ExposureController::new(),
            pipeline: AcquisitionPipeline::new(decoder),
            frame,
            frame_type: FrameType::Light,
            on_frame_ready: None,
        })
    }

    /// Whether captured assets stay on the camera after transfer.
    pub fn set_save_on_camera(&mut self, save: bool) {
        self.pipeline.set_save_on_camera(save);
    }

    /// Registers the frame-ready completion signal.
    pub fn on_frame_ready(&mut self, callback: Box<dyn FnMut(&FrameBuffer) + Send>) {
        self.on_frame_ready = Some(callback);
    }

    /// The underlying session, e.g. for catalog inspection.
    pub fn session(&self) -> &CameraSession {
        &self.session
    }

    fn resize_frame(&mut self) {
        let width = self.session.geometry().binned_width();
        let height = self.session.geometry().binned_height();
        self.frame.resize(width, height);
    }
}

impl<D: RawDecoder> ImagingCamera for TetherDriver<D> {
    fn start_exposure(&mut self, duration_secs: f64) -> Result<(), DriverError> {
        self.controller
            .start_exposure(&mut self.session, duration_secs)?;
        Ok(())
    }

    fn abort_exposure(&mut self) {
        self.controller.abort_exposure();
    }

    fn update_frame(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), DriverError> {
        self.session
            .geometry_mut()
            .update_frame(x, y, width, height)?;
        self.resize_frame();
        Ok(())
    }

    fn update_binning(&mut self, bin_x: u32, bin_y: u32) -> Result<(), DriverError> {
        self.session.geometry_mut().update_binning(bin_x, bin_y)?;
        self.resize_frame();
        Ok(())
    }

    fn set_frame_type(&mut self, frame_type: FrameType) -> Result<(), DriverError> {
        if frame_type == self.frame_type {
            return Ok(());
        }
        match frame_type {
            FrameType::Light => {
                self.frame_type = frame_type;
                Ok(())
            }
            // The tethered shutter cannot be held closed for
            // calibration frames.
            FrameType::Bias | FrameType::Dark | FrameType::Flat => Err(DriverError::NotSupported(
                "only light frames are supported",
            )),
        }
    }

    fn set_sensitivity(&mut self, value: f64) -> Result<f64, DriverError> {
        Ok(self.session.set_sensitivity(value)?)
    }

    fn sensitivity_range(&self) -> Option<(f64, f64)> {
        let catalog = self.session.sensitivity_catalog();
        catalog.min().zip(catalog.max())
    }

    fn camera_info(&self) -> &CameraInfo {
        self.session.info()
    }

    fn phase(&self) -> Phase {
        self.controller.phase()
    }

    fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    fn tick(&mut self) -> TickEvent {
        let Self {
            session,
            controller,
            pipeline,
            frame,
            ..
        } = self;
        let transport = session.transport();

        let status = controller.poll(|handle| {
            let mut guard = transport.lock().map_err(|_| {
                PipelineError::Transfer(DeviceError::Capture(
                    "device transport lock poisoned".to_string(),
                ))
            })?;
            pipeline.run(guard.as_mut(), handle, frame)
        });

        match status {
            PollStatus::Idle => TickEvent::Idle,
            PollStatus::Exposing { remaining_secs } => TickEvent::Exposing { remaining_secs },
            PollStatus::CycleEnded(Ok(())) => {
                if let Some(callback) = &mut self.on_frame_ready {
                    callback(&self.frame);
                }
                TickEvent::FrameReady
            }
            PollStatus::CycleEnded(Err(e)) => TickEvent::CycleFailed(e),
        }
    }

    fn disconnect(self: Box<Self>) {
        self.session.disconnect();
    }
}
