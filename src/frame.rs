//! Framebuffer layout and sensor geometry bookkeeping.
//!
//! The framebuffer is the destination the host framework reads; the
//! acquisition pipeline fills it in planar channel order. Geometry
//! updates are pure bookkeeping: they validate a requested sub-frame
//! against the sensor and resize the buffer, never touching the device.

use thiserror::Error;

/// Extra bytes allocated beyond the exact pixel payload.
pub const BUFFER_SLACK_BYTES: usize = 512;

/// Geometry validation errors.
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    #[error("X offset + width is greater than the sensor width")]
    WidthOutOfBounds,
    #[error("Y offset + height is greater than the sensor height")]
    HeightOutOfBounds,
    #[error("binning factors must be at least 1")]
    InvalidBinning,
}

/// Exposure frame kinds the host may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameType {
    #[default]
    Light,
    Bias,
    Dark,
    Flat,
}

/// An unbinned sub-frame of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Horizontal and vertical binning factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binning {
    pub x: u32,
    pub y: u32,
}

impl Default for Binning {
    fn default() -> Self {
        Self { x: 1, y: 1 }
    }
}

/// Full sensor description plus the currently selected sub-frame and
/// binning.
#[derive(Debug, Clone)]
pub struct SensorGeometry {
    full_width: u32,
    full_height: u32,
    /// Pixel pitch in microns.
    pixel_size_x: f32,
    pixel_size_y: f32,
    region: FrameRegion,
    binning: Binning,
}

impl SensorGeometry {
    /// Creates a geometry covering the full sensor at 1x1 binning.
    pub fn new(full_width: u32, full_height: u32, pixel_size_x: f32, pixel_size_y: f32) -> Self {
        Self {
            full_width,
            full_height,
            pixel_size_x,
            pixel_size_y,
            region: FrameRegion {
                x: 0,
                y: 0,
                width: full_width,
                height: full_height,
            },
            binning: Binning::default(),
        }
    }

    /// Selects a sub-frame, validating it against the binned sensor
    /// bounds. On failure the previous region is kept.
    pub fn update_frame(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), GeometryError> {
        let binned_right = x + width / self.binning.x;
        let binned_bottom = y + height / self.binning.y;

        if binned_right > self.full_width / self.binning.x {
            return Err(GeometryError::WidthOutOfBounds);
        }
        if binned_bottom > self.full_height / self.binning.y {
            return Err(GeometryError::HeightOutOfBounds);
        }

        self.region = FrameRegion { x, y, width, height };
        Ok(())
    }

    /// Changes the binning factors, re-validating the current region.
    pub fn update_binning(&mut self, bin_x: u32, bin_y: u32) -> Result<(), GeometryError> {
        if bin_x == 0 || bin_y == 0 {
            return Err(GeometryError::InvalidBinning);
        }

        let previous = self.binning;
        self.binning = Binning { x: bin_x, y: bin_y };

        let region = self.region;
        if let Err(e) = self.update_frame(region.x, region.y, region.width, region.height) {
            self.binning = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Width of the readout after binning.
    pub fn binned_width(&self) -> u32 {
        self.region.width / self.binning.x
    }

    /// Height of the readout after binning.
    pub fn binned_height(&self) -> u32 {
        self.region.height / self.binning.y
    }

    pub fn full_width(&self) -> u32 {
        self.full_width
    }

    pub fn full_height(&self) -> u32 {
        self.full_height
    }

    pub fn pixel_size(&self) -> (f32, f32) {
        (self.pixel_size_x, self.pixel_size_y)
    }

    pub fn region(&self) -> FrameRegion {
        self.region
    }

    pub fn binning(&self) -> Binning {
        self.binning
    }
}

/// Destination pixel buffer in planar channel order.
///
/// Allocation is the exact pixel payload plus a fixed slack margin.
pub struct FrameBuffer {
    width: u32,
    height: u32,
    channels: u32,
    bits_per_channel: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocates a buffer for the given geometry.
    pub fn new(width: u32, height: u32, channels: u32, bits_per_channel: u32) -> Self {
        let mut buffer = Self {
            width,
            height,
            channels,
            bits_per_channel,
            data: Vec::new(),
        };
        buffer.reallocate();
        buffer
    }

    /// Exact byte count of the pixel payload (without slack).
    pub fn payload_bytes(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.channels as usize
            * (self.bits_per_channel as usize / 8)
    }

    /// Resizes the buffer for new output dimensions.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.reallocate();
    }

    fn reallocate(&mut self) {
        let total = self.payload_bytes() + BUFFER_SLACK_BYTES;
        self.data.clear();
        self.data.resize(total, 0);
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    #[inline]
    pub fn bits_per_channel(&self) -> u32 {
        self.bits_per_channel
    }

    /// The pixel payload (slack excluded).
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.payload_bytes()]
    }

    /// Mutable pixel payload (slack excluded).
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let payload = self.payload_bytes();
        &mut self.data[..payload]
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("bits_per_channel", &self.bits_per_channel)
            .field("bytes", &self.data.len())
            .finish()
    }
}
