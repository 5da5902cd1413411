//! Mock device collaborators for tests and the demo binary.
//!
//! The mocks are deterministic: the transport produces a synthetic
//! interleaved image derived from pixel position, so pipeline output
//! can be checked element by element.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;

use super::interface::{
    CameraControl, CaptureAsset, CaptureHandle, CaptureTransport, DecodeError, DecodeParams,
    DecodedImage, DeviceError, RawDecoder,
};

const MOCK_FOLDER: &str = "/store_00010001/DCIM/100_PANA";

#[derive(Debug, Clone)]
struct ControlState {
    current: String,
    choices: Vec<String>,
    staged: Option<String>,
}

/// In-memory implementation of [`CameraControl`].
#[derive(Debug, Clone)]
pub struct MockControl {
    controls: HashMap<String, ControlState>,
    commits: u32,
}

impl MockControl {
    /// Creates a control set resembling a tethered consumer camera.
    pub fn new() -> Self {
        let mut mock = Self {
            controls: HashMap::new(),
            commits: 0,
        };
        mock.insert_control(
            "shutterspeed",
            &[
                "bulb", "60", "30", "15", "8", "4", "2", "1", "1/2", "1/4", "1/8", "1/15", "1/30",
                "1/60", "1/125", "1/250", "1/500", "1/1000", "1/2000", "1/4000",
            ],
            "1/60",
        );
        mock.insert_control(
            "iso",
            &["100", "200", "400", "800", "1600", "3200", "6400"],
            "400",
        );
        mock.insert_control("manufacturer", &["Panasonic"], "Panasonic");
        mock.insert_control("cameramodel", &["DC-S5"], "DC-S5");
        mock.insert_control("serialnumber", &["0000123"], "0000123");
        mock.insert_control("deviceversion", &["1.0"], "1.0");
        mock
    }

    /// Replaces one control's choices and current value.
    pub fn insert_control(&mut self, name: &str, choices: &[&str], current: &str) {
        self.controls.insert(
            name.to_string(),
            ControlState {
                current: current.to_string(),
                choices: choices.iter().map(|c| (*c).to_string()).collect(),
                staged: None,
            },
        );
    }

    /// Removes a control, for missing-control tests.
    pub fn remove_control(&mut self, name: &str) {
        self.controls.remove(name);
    }

    /// Number of configuration commits performed.
    pub fn commits(&self) -> u32 {
        self.commits
    }

    fn state(&self, control: &str) -> Result<&ControlState, DeviceError> {
        self.controls
            .get(control)
            .ok_or_else(|| DeviceError::MissingControl(control.to_string()))
    }
}

impl Default for MockControl {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraControl for MockControl {
    fn choices(&self, control: &str) -> Result<Vec<String>, DeviceError> {
        Ok(self.state(control)?.choices.clone())
    }

    fn current(&self, control: &str) -> Result<String, DeviceError> {
        Ok(self.state(control)?.current.clone())
    }

    fn set(&mut self, control: &str, token: &str) -> Result<(), DeviceError> {
        let state = self
            .controls
            .get_mut(control)
            .ok_or_else(|| DeviceError::MissingControl(control.to_string()))?;
        if !state.choices.iter().any(|c| c == token) {
            return Err(DeviceError::Rejected {
                control: control.to_string(),
                token: token.to_string(),
                reason: "not in choice list".to_string(),
            });
        }
        state.staged = Some(token.to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DeviceError> {
        for state in self.controls.values_mut() {
            if let Some(staged) = state.staged.take() {
                state.current = staged;
            }
        }
        self.commits += 1;
        Ok(())
    }
}

/// In-memory implementation of [`CaptureTransport`].
///
/// Captures block for a configurable delay in small slices so the
/// cancellation token is observed promptly.
#[derive(Debug)]
pub struct MockTransport {
    width: u32,
    height: u32,
    capture_delay: Duration,
    extension: String,
    sequence: u64,
    fail_capture: bool,
    fail_fetch: bool,
    fail_delete: bool,
    deleted: Vec<String>,
}

impl MockTransport {
    /// Creates a transport producing `width`×`height` RGB16 assets.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            capture_delay: Duration::from_millis(50),
            extension: "RW2".to_string(),
            sequence: 0,
            fail_capture: false,
            fail_fetch: false,
            fail_delete: false,
            deleted: Vec::new(),
        }
    }

    /// Overrides how long a capture blocks.
    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = delay;
        self
    }

    /// Overrides the produced file extension.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    /// Makes `trigger_capture` fail, for capture-error tests.
    pub fn with_failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    /// Makes `fetch` fail, for transfer-error tests.
    pub fn with_failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Makes `delete` fail, for non-fatal-deletion tests.
    pub fn with_failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Names of assets deleted so far.
    pub fn deleted(&self) -> &[String] {
        &self.deleted
    }

    /// Deterministic interleaved RGB16 payload for the given geometry.
    pub fn synthetic_payload(width: u32, height: u32) -> Vec<u8> {
        let pixels = width as usize * height as usize;
        let mut bytes = Vec::with_capacity(pixels * 3 * 2);
        for i in 0..pixels {
            for c in 0..3usize {
                let sample = ((i * 3 + c) % 65_536) as u16;
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
        }
        bytes
    }
}

impl CaptureTransport for MockTransport {
    fn trigger_capture(&mut self, cancel: &AtomicBool) -> Result<CaptureHandle, DeviceError> {
        let slice = Duration::from_millis(10);
        let mut waited = Duration::ZERO;
        while waited < self.capture_delay {
            if cancel.load(Ordering::SeqCst) {
                return Err(DeviceError::Aborted);
            }
            let step = slice.min(self.capture_delay - waited);
            std::thread::sleep(step);
            waited += step;
        }
        if cancel.load(Ordering::SeqCst) {
            return Err(DeviceError::Aborted);
        }
        if self.fail_capture {
            return Err(DeviceError::Capture("simulated capture failure".to_string()));
        }

        self.sequence += 1;
        Ok(CaptureHandle {
            folder: MOCK_FOLDER.to_string(),
            name: format!("P{:07}.{}", 1_000_000 + self.sequence, self.extension),
        })
    }

    fn fetch(&mut self, handle: &CaptureHandle) -> Result<CaptureAsset, DeviceError> {
        if self.fail_fetch {
            return Err(DeviceError::Transfer {
                name: handle.name.clone(),
                reason: "simulated transfer failure".to_string(),
            });
        }
        Ok(CaptureAsset {
            handle: handle.clone(),
            bytes: Self::synthetic_payload(self.width, self.height),
            fetched_at: Utc::now(),
        })
    }

    fn delete(&mut self, handle: &CaptureHandle) -> Result<(), DeviceError> {
        if self.fail_delete {
            return Err(DeviceError::Delete {
                name: handle.name.clone(),
                reason: "simulated delete failure".to_string(),
            });
        }
        self.deleted.push(handle.name.clone());
        Ok(())
    }
}

/// Pass-through implementation of [`RawDecoder`].
///
/// Treats the asset bytes as already-interleaved RGB samples of the
/// configured geometry; optionally fails at a chosen decode stage.
#[derive(Debug, Clone)]
pub struct MockDecoder {
    width: u32,
    height: u32,
    fail_with: Option<DecodeError>,
}

impl MockDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fail_with: None,
        }
    }

    /// Makes every decode fail with the given stage error.
    pub fn failing_with(mut self, error: DecodeError) -> Self {
        self.fail_with = Some(error);
        self
    }
}

impl RawDecoder for MockDecoder {
    fn decode(&self, bytes: &[u8], params: &DecodeParams) -> Result<DecodedImage, DecodeError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        Ok(DecodedImage {
            width: self.width,
            height: self.height,
            channels: 3,
            bits_per_channel: params.output_bits,
            data: bytes.to_vec(),
        })
    }
}
