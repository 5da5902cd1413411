//! Tethered Camera Acquisition Library
//!
//! Controls a consumer camera as an acquisition sensor for scientific
//! imaging: continuous exposure and sensitivity requests are quantized
//! onto the camera's discrete setting choices, a cancellable capture
//! cycle runs under a periodic external poller, and the camera's
//! vendor RAW output is transcoded into the planar framebuffer layout
//! the imaging host expects.
//!
//! # Architecture
//!
//! The system follows an explicit exposure cycle:
//!
//! ```text
//! request → settings (quantize) → exposure (capture cycle) → acquire (transcode)
//!                 ↓                        ↓                        ↓
//!           device session          background task           framebuffer
//! ```
//!
//! # Design Principles
//!
//! - **Quantize, never interpolate**: requested values resolve to the
//!   nearest choice the hardware actually accepts; exact ties favor
//!   the lower value.
//! - **One cycle at a time**: the state machine advances only under
//!   the external poll and always passes through the download phase.
//! - **Per-cycle failure isolation**: a failed capture or download
//!   ends its own cycle and never poisons the next one.
//!
//! # Example
//!
//! ```no_run
//! use tethercam::device::{MockControl, MockDecoder, MockTransport};
//! use tethercam::driver::{ImagingCamera, TetherDriver, TickEvent};
//!
//! let mut driver = TetherDriver::connect(
//!     Box::new(MockControl::new()),
//!     Box::new(MockTransport::new(8, 6)),
//!     MockDecoder::new(8, 6),
//! )
//! .unwrap();
//! driver.update_frame(0, 0, 8, 6).unwrap();
//!
//! driver.start_exposure(2.0).unwrap();
//! loop {
//!     match driver.tick() {
//!         TickEvent::Exposing { .. } | TickEvent::Idle => {
//!             std::thread::sleep(std::time::Duration::from_secs(1));
//!         }
//!         TickEvent::FrameReady => break,
//!         TickEvent::CycleFailed(e) => panic!("cycle failed: {e}"),
//!     }
//! }
//! let _planar_pixels = driver.frame().payload();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod acquire;
pub mod config;
pub mod device;
pub mod driver;
pub mod exposure;
pub mod frame;
pub mod settings;

// Re-export commonly used types at crate root
pub use acquire::{AcquisitionPipeline, LuminancePipeline, PipelineError};
pub use config::{AcquisitionConfig, ConfigError, DeviceConfig, FileConfig};
pub use device::{CameraInfo, CameraSession, CaptureHandle, DeviceError};
pub use driver::{DriverError, ImagingCamera, TetherDriver, TickEvent};
pub use exposure::{ExposureController, Phase, PollStatus};
pub use frame::{FrameBuffer, FrameType, SensorGeometry};
pub use settings::{CatalogError, SettingCatalog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
