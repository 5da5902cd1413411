//! Connected-camera session: setting catalogs, identity, sensor data.
//!
//! A session is built once at connect time, owns the device
//! collaborators for its whole life, and is dropped deterministically
//! on disconnect.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::interface::{CameraControl, CaptureTransport, DeviceError};
use crate::frame::SensorGeometry;
use crate::settings::{CatalogError, SettingCatalog};

/// Device control holding the shutter speed choice list.
pub const SHUTTER_CONTROL: &str = "shutterspeed";
/// Device control holding the sensitivity (ISO) choice list.
pub const SENSITIVITY_CONTROL: &str = "iso";

/// Marker token for the device-only long-exposure mode, excluded from
/// quantization.
const BULB_TOKEN: &str = "bulb";
/// Token applied to leave bulb mode before enumerating choices.
const BULB_EXIT_TOKEN: &str = "1";

// Sensor description for the supported camera family.
// TODO: query these from the device once the tether backend exposes
// sensor properties over PTP.
const SENSOR_WIDTH: u32 = 6008;
const SENSOR_HEIGHT: u32 = 4008;
const PIXEL_SIZE_UM: f32 = 5.95;
const SENSOR_CHANNELS: u32 = 3;
const SENSOR_BITS_PER_CHANNEL: u32 = 16;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("quantization failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("could not parse current {control} value {token:?}")]
    UnparsableValue { control: String, token: String },
}

/// Camera identity read at connect time.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub version: String,
}

impl Default for CameraInfo {
    fn default() -> Self {
        Self {
            manufacturer: "Unknown".to_string(),
            model: "Unknown".to_string(),
            serial: "Unknown".to_string(),
            version: "Unknown".to_string(),
        }
    }
}

/// An open connection to a tethered camera.
pub struct CameraSession {
    control: Box<dyn CameraControl + Send>,
    transport: Arc<Mutex<Box<dyn CaptureTransport>>>,
    shutter: SettingCatalog,
    sensitivity: SettingCatalog,
    info: CameraInfo,
    geometry: SensorGeometry,
}

impl CameraSession {
    /// Connects to a camera: leaves bulb mode, parses the setting
    /// catalogs, and loads the camera identity.
    ///
    /// A missing required control is fatal to the session.
    pub fn connect(
        mut control: Box<dyn CameraControl + Send>,
        transport: Box<dyn CaptureTransport>,
    ) -> Result<Self, DeviceError> {
        // All shutter choices would be wrong while the camera sits in
        // bulb mode, so leave it before enumerating.
        let current_shutter = control.current(SHUTTER_CONTROL)?;
        if current_shutter == BULB_TOKEN {
            tracing::info!("camera is in bulb mode, switching to {BULB_EXIT_TOKEN}s");
            control.set(SHUTTER_CONTROL, BULB_EXIT_TOKEN)?;
            control.commit()?;
        }

        let shutter_tokens = control.choices(SHUTTER_CONTROL)?;
        let shutter =
            SettingCatalog::build(shutter_tokens.iter().filter(|t| t.as_str() != BULB_TOKEN));
        tracing::info!(
            choices = shutter.len(),
            "parsed shutter speed catalog"
        );

        let sensitivity_tokens = control.choices(SENSITIVITY_CONTROL)?;
        let sensitivity = SettingCatalog::build(&sensitivity_tokens);
        tracing::info!(choices = sensitivity.len(), "parsed sensitivity catalog");

        let info = load_info(control.as_ref());
        tracing::info!(
            manufacturer = %info.manufacturer,
            model = %info.model,
            "connected to camera"
        );

        Ok(Self {
            control,
            transport: Arc::new(Mutex::new(transport)),
            shutter,
            sensitivity,
            info,
            geometry: SensorGeometry::new(
                SENSOR_WIDTH,
                SENSOR_HEIGHT,
                PIXEL_SIZE_UM,
                PIXEL_SIZE_UM,
            ),
        })
    }

    /// Quantizes `duration_secs` to the nearest shutter token and
    /// applies it to the device. Returns the applied token.
    pub fn apply_shutter_speed(&mut self, duration_secs: f64) -> Result<String, SessionError> {
        let token = self.shutter.nearest(duration_secs)?.to_string();
        tracing::info!(requested = duration_secs, token = %token, "setting shutter speed");
        self.control.set(SHUTTER_CONTROL, &token)?;
        self.control.commit()?;
        Ok(token)
    }

    /// Quantizes `value` to the nearest sensitivity token, applies it,
    /// and reads back the value the camera settled on.
    pub fn set_sensitivity(&mut self, value: f64) -> Result<f64, SessionError> {
        let token = self.sensitivity.nearest(value)?.to_string();
        tracing::info!(requested = value, token = %token, "setting sensitivity");
        self.control.set(SENSITIVITY_CONTROL, &token)?;
        self.control.commit()?;
        self.current_sensitivity()
    }

    /// Reads the sensitivity value currently active on the device.
    pub fn current_sensitivity(&self) -> Result<f64, SessionError> {
        let token = self.control.current(SENSITIVITY_CONTROL)?;
        token
            .trim()
            .parse()
            .map_err(|_| SessionError::UnparsableValue {
                control: SENSITIVITY_CONTROL.to_string(),
                token,
            })
    }

    /// Shared handle to the capture transport.
    ///
    /// The mutex keeps the capture task and the acquisition pipeline
    /// from addressing the device at the same time.
    pub fn transport(&self) -> Arc<Mutex<Box<dyn CaptureTransport>>> {
        Arc::clone(&self.transport)
    }

    pub fn shutter_catalog(&self) -> &SettingCatalog {
        &self.shutter
    }

    pub fn sensitivity_catalog(&self) -> &SettingCatalog {
        &self.sensitivity
    }

    pub fn info(&self) -> &CameraInfo {
        &self.info
    }

    pub fn geometry(&self) -> &SensorGeometry {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut SensorGeometry {
        &mut self.geometry
    }

    /// Channel count of the decoded output.
    pub fn channels(&self) -> u32 {
        SENSOR_CHANNELS
    }

    /// Bit depth of the decoded output.
    pub fn bits_per_channel(&self) -> u32 {
        SENSOR_BITS_PER_CHANNEL
    }

    /// Tears the session down.
    pub fn disconnect(self) {
        tracing::info!("disconnected from camera");
    }
}

/// Reads the camera identity fields, keeping `Unknown` for any the
/// device does not report.
fn load_info(control: &dyn CameraControl) -> CameraInfo {
    let mut info = CameraInfo::default();
    let fields: [(&str, &mut String); 4] = [
        ("manufacturer", &mut info.manufacturer),
        ("cameramodel", &mut info.model),
        ("serialnumber", &mut info.serial),
        ("deviceversion", &mut info.version),
    ];
    for (control_name, slot) in fields {
        match control.current(control_name) {
            Ok(value) => *slot = value,
            Err(e) => tracing::warn!(control = control_name, error = %e, "camera info field not available"),
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{MockControl, MockTransport};

    fn connect_mock(control: MockControl) -> Result<CameraSession, DeviceError> {
        CameraSession::connect(Box::new(control), Box::new(MockTransport::new(4, 2)))
    }

    #[test]
    fn test_connect_builds_catalogs_without_bulb() {
        let session = connect_mock(MockControl::new()).unwrap();
        // 20 shutter choices on the mock, minus the bulb marker
        assert_eq!(session.shutter_catalog().len(), 19);
        assert_eq!(session.sensitivity_catalog().len(), 7);
        assert!(session.shutter_catalog().nearest(60.0).is_ok());
    }

    #[test]
    fn test_connect_exits_bulb_mode() {
        let mut control = MockControl::new();
        control.insert_control(
            "shutterspeed",
            &["bulb", "1", "1/2", "1/4"],
            "bulb",
        );
        let session = connect_mock(control).unwrap();
        assert_eq!(session.shutter_catalog().len(), 3);
    }

    #[test]
    fn test_missing_control_is_fatal() {
        let mut control = MockControl::new();
        control.remove_control("iso");
        assert!(matches!(
            connect_mock(control),
            Err(DeviceError::MissingControl(_))
        ));
    }

    #[test]
    fn test_apply_shutter_speed_quantizes() {
        let mut session = connect_mock(MockControl::new()).unwrap();
        let token = session.apply_shutter_speed(0.3).unwrap();
        assert_eq!(token, "1/4");
    }

    #[test]
    fn test_set_sensitivity_reads_back_actual() {
        let mut session = connect_mock(MockControl::new()).unwrap();
        let actual = session.set_sensitivity(900.0).unwrap();
        assert_eq!(actual, 800.0);
    }

    #[test]
    fn test_camera_info_loaded() {
        let session = connect_mock(MockControl::new()).unwrap();
        assert_eq!(session.info().manufacturer, "Panasonic");
        assert_eq!(session.info().model, "DC-S5");
    }

    #[test]
    fn test_missing_info_field_keeps_unknown() {
        let mut control = MockControl::new();
        control.remove_control("serialnumber");
        let session = connect_mock(control).unwrap();
        assert_eq!(session.info().serial, "Unknown");
    }
}
