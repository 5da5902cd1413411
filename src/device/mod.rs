//! Device collaborator interfaces, the connection session, and mocks.
//!
//! The acquisition core talks to the camera through three narrow
//! traits: [`CameraControl`] for the enumerated setting vocabulary,
//! [`CaptureTransport`] for triggering captures and moving asset bytes,
//! and [`RawDecoder`] for turning vendor RAW containers into pixel
//! data. [`CameraSession`] owns a connected device and its parsed
//! setting catalogs. Mock implementations back the tests and the demo
//! binary.

mod interface;
mod mock;
mod session;

pub use interface::{
    CameraControl, CaptureAsset, CaptureHandle, CaptureTransport, DecodeError, DecodeParams,
    DecodedImage, DeviceError, RawDecoder,
};
pub use mock::{MockControl, MockDecoder, MockTransport};
pub use session::{CameraInfo, CameraSession, SessionError, SENSITIVITY_CONTROL, SHUTTER_CONTROL};
