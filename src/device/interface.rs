//! Traits and data types at the device boundary.

use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by device collaborators.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("no camera found: {0}")]
    Connect(String),
    #[error("expected camera control not present: {0}")]
    MissingControl(String),
    #[error("control {control:?} rejected value {token:?}: {reason}")]
    Rejected {
        control: String,
        token: String,
        reason: String,
    },
    #[error("failed to commit camera configuration: {0}")]
    Commit(String),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("capture aborted before completion")]
    Aborted,
    #[error("failed to retrieve {name:?} from the camera: {reason}")]
    Transfer { name: String, reason: String },
    #[error("failed to delete {name:?} from the camera: {reason}")]
    Delete { name: String, reason: String },
}

/// Locator of the most recently captured asset on the device.
///
/// Overwritten by each capture cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHandle {
    /// On-device folder, e.g. `/store_00010001/DCIM/100_PANA`.
    pub folder: String,
    /// File name including extension, e.g. `P1000001.RW2`.
    pub name: String,
}

impl CaptureHandle {
    /// The file extension after the last dot, if any.
    pub fn extension(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// A captured asset fetched from the device.
#[derive(Debug, Clone)]
pub struct CaptureAsset {
    pub handle: CaptureHandle,
    pub bytes: Vec<u8>,
    /// When the transfer completed.
    pub fetched_at: DateTime<Utc>,
}

/// Decode request parameters.
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    /// Output bit depth per channel.
    pub output_bits: u32,
    /// Reconstruct full color from the sensor mosaic.
    pub demosaic: bool,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            output_bits: 16,
            demosaic: true,
        }
    }
}

/// Fully decoded pixel data in interleaved channel order.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub bits_per_channel: u32,
    /// Interleaved samples, e.g. `RGBRGB…`.
    pub data: Vec<u8>,
}

/// Decode-stage failures. Each stage of the RAW decode sequence is a
/// distinct failure point and reports separately.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("could not load the RAW container: {0}")]
    Open(String),
    #[error("unable to unpack the RAW data: {0}")]
    Unpack(String),
    #[error("unable to process the RAW data: {0}")]
    Process(String),
    #[error("unable to allocate memory for the processed image: {0}")]
    MemoryImage(String),
}

/// Access to the device's enumerated setting vocabulary.
///
/// Values are set by token and become effective on [`commit`].
///
/// [`commit`]: CameraControl::commit
pub trait CameraControl {
    /// Enumerates the choice tokens of a named control.
    fn choices(&self, control: &str) -> Result<Vec<String>, DeviceError>;

    /// Reads the current token of a named control.
    fn current(&self, control: &str) -> Result<String, DeviceError>;

    /// Stages a new token for a named control.
    fn set(&mut self, control: &str, token: &str) -> Result<(), DeviceError>;

    /// Applies staged values to the device.
    fn commit(&mut self) -> Result<(), DeviceError>;
}

/// Capture triggering and asset transfer.
pub trait CaptureTransport: Send {
    /// Performs a blocking capture for the configured exposure and
    /// returns the handle of the new asset.
    ///
    /// Implementations that can stop early observe `cancel` and return
    /// [`DeviceError::Aborted`]; others complete the capture and let
    /// the caller discard the result.
    fn trigger_capture(&mut self, cancel: &AtomicBool) -> Result<CaptureHandle, DeviceError>;

    /// Retrieves the bytes of a captured asset.
    fn fetch(&mut self, handle: &CaptureHandle) -> Result<CaptureAsset, DeviceError>;

    /// Deletes an asset from the device.
    fn delete(&mut self, handle: &CaptureHandle) -> Result<(), DeviceError>;
}

/// Vendor RAW decoding service.
///
/// The open, unpack, process, and memory-image stages run as one call;
/// each stage failure maps to its own [`DecodeError`] variant.
pub trait RawDecoder {
    fn decode(&self, bytes: &[u8], params: &DecodeParams) -> Result<DecodedImage, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_extension() {
        let handle = CaptureHandle {
            folder: "/store_00010001/DCIM/100_PANA".to_string(),
            name: "P1000001.RW2".to_string(),
        };
        assert_eq!(handle.extension(), Some("RW2"));
    }

    #[test]
    fn test_handle_without_extension() {
        let handle = CaptureHandle {
            folder: "/".to_string(),
            name: "P1000001".to_string(),
        };
        assert_eq!(handle.extension(), None);
    }
}
