//! Vendor-RAW acquisition pipeline.

use thiserror::Error;

use super::planar::interleaved_to_planar;
use crate::device::{CaptureHandle, CaptureTransport, DecodeError, DecodeParams, DeviceError, RawDecoder};
use crate::frame::FrameBuffer;

/// The single container format this pipeline supports.
pub const SUPPORTED_EXTENSION: &str = "RW2";

/// Per-cycle acquisition failures. None of these poison future cycles.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to retrieve the captured image: {0}")]
    Transfer(#[source] DeviceError),
    #[error(
        "unsupported image container {extension:?}: select RAW (RW2) picture quality on the camera"
    )]
    UnsupportedFormat { extension: String },
    #[error("RAW decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("decoded image is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Fetches, validates, decodes, and remaps one captured asset per
/// completed exposure cycle.
pub struct AcquisitionPipeline<D> {
    decoder: D,
    save_on_camera: bool,
}

impl<D: RawDecoder> AcquisitionPipeline<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            save_on_camera: false,
        }
    }

    /// Whether captured assets are kept on the device after transfer.
    pub fn save_on_camera(&self) -> bool {
        self.save_on_camera
    }

    pub fn set_save_on_camera(&mut self, save: bool) {
        self.save_on_camera = save;
    }

    /// Runs the full fetch → validate → decode → remap sequence,
    /// filling `frame` in planar channel order.
    ///
    /// On any failure the framebuffer payload is left unmodified.
    pub fn run(
        &self,
        transport: &mut dyn CaptureTransport,
        handle: &CaptureHandle,
        frame: &mut FrameBuffer,
    ) -> Result<(), PipelineError> {
        tracing::info!(name = %handle.name, "downloading image");
        let asset = transport.fetch(handle).map_err(PipelineError::Transfer)?;

        let extension = handle.extension().unwrap_or_default();
        if extension != SUPPORTED_EXTENSION {
            return Err(PipelineError::UnsupportedFormat {
                extension: extension.to_string(),
            });
        }

        let decoded = self.decoder.decode(&asset.bytes, &DecodeParams::default())?;

        let expected = frame.payload_bytes();
        if decoded.data.len() != expected {
            return Err(PipelineError::SizeMismatch {
                expected,
                actual: decoded.data.len(),
            });
        }

        let pixels = frame.width() as usize * frame.height() as usize;
        let channels = frame.channels() as usize;
        let bytes_per_channel = frame.bits_per_channel() as usize / 8;
        interleaved_to_planar(
            &decoded.data,
            frame.payload_mut(),
            pixels,
            channels,
            bytes_per_channel,
        );

        if !self.save_on_camera {
            if let Err(e) = transport.delete(handle) {
                tracing::warn!(error = %e, "could not delete image from camera");
            }
        }

        tracing::info!("download complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MockDecoder, MockTransport};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    const W: u32 = 4;
    const H: u32 = 3;

    fn capture(transport: &mut MockTransport) -> CaptureHandle {
        let cancel = AtomicBool::new(false);
        transport.trigger_capture(&cancel).unwrap()
    }

    fn rgb16_frame() -> FrameBuffer {
        FrameBuffer::new(W, H, 3, 16)
    }

    #[test]
    fn test_run_fills_planar_frame() {
        let mut transport = MockTransport::new(W, H).with_capture_delay(Duration::ZERO);
        let handle = capture(&mut transport);
        let pipeline = AcquisitionPipeline::new(MockDecoder::new(W, H));
        let mut frame = rgb16_frame();

        pipeline.run(&mut transport, &handle, &mut frame).unwrap();

        // Source pixel i, channel c is the sample (i*3 + c); check the
        // transposed position in every plane.
        let pixels = (W * H) as usize;
        let payload = frame.payload();
        for i in 0..pixels {
            for c in 0..3usize {
                let expected = ((i * 3 + c) % 65_536) as u16;
                let at = (pixels * c + i) * 2;
                let got = u16::from_le_bytes([payload[at], payload[at + 1]]);
                assert_eq!(got, expected, "pixel {i} plane {c}");
            }
        }
    }

    #[test]
    fn test_transfer_failure() {
        let mut transport = MockTransport::new(W, H)
            .with_capture_delay(Duration::ZERO)
            .with_failing_fetch();
        let handle = capture(&mut transport);
        let pipeline = AcquisitionPipeline::new(MockDecoder::new(W, H));

        let result = pipeline.run(&mut transport, &handle, &mut rgb16_frame());
        assert!(matches!(result, Err(PipelineError::Transfer(_))));
    }

    #[test]
    fn test_non_raw_container_rejected() {
        let mut transport = MockTransport::new(W, H)
            .with_capture_delay(Duration::ZERO)
            .with_extension("JPG");
        let handle = capture(&mut transport);
        let pipeline = AcquisitionPipeline::new(MockDecoder::new(W, H));

        let result = pipeline.run(&mut transport, &handle, &mut rgb16_frame());
        assert!(matches!(
            result,
            Err(PipelineError::UnsupportedFormat { extension }) if extension == "JPG"
        ));
    }

    #[test]
    fn test_decode_stage_failures_are_distinct() {
        let mut transport = MockTransport::new(W, H).with_capture_delay(Duration::ZERO);
        let handle = capture(&mut transport);

        for stage in [
            DecodeError::Open("bad".into()),
            DecodeError::Unpack("bad".into()),
            DecodeError::Process("bad".into()),
            DecodeError::MemoryImage("bad".into()),
        ] {
            let pipeline =
                AcquisitionPipeline::new(MockDecoder::new(W, H).failing_with(stage.clone()));
            let result = pipeline.run(&mut transport, &handle, &mut rgb16_frame());
            match result {
                Err(PipelineError::Decode(e)) => {
                    assert_eq!(std::mem::discriminant(&e), std::mem::discriminant(&stage));
                }
                other => panic!("expected decode failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_size_mismatch_leaves_frame_untouched() {
        let mut transport = MockTransport::new(W, H).with_capture_delay(Duration::ZERO);
        let handle = capture(&mut transport);
        // Decoder claims a larger geometry than the transport delivers.
        let pipeline = AcquisitionPipeline::new(MockDecoder::new(W, H));
        let mut frame = FrameBuffer::new(W + 1, H, 3, 16);

        let result = pipeline.run(&mut transport, &handle, &mut frame);
        assert!(matches!(result, Err(PipelineError::SizeMismatch { .. })));
        assert!(frame.payload().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_asset_deleted_unless_saving() {
        let mut transport = MockTransport::new(W, H).with_capture_delay(Duration::ZERO);
        let handle = capture(&mut transport);
        let pipeline = AcquisitionPipeline::new(MockDecoder::new(W, H));

        pipeline
            .run(&mut transport, &handle, &mut rgb16_frame())
            .unwrap();
        assert_eq!(transport.deleted(), [handle.name.clone()]);
    }

    #[test]
    fn test_save_on_camera_keeps_asset() {
        let mut transport = MockTransport::new(W, H).with_capture_delay(Duration::ZERO);
        let handle = capture(&mut transport);
        let mut pipeline = AcquisitionPipeline::new(MockDecoder::new(W, H));
        pipeline.set_save_on_camera(true);

        pipeline
            .run(&mut transport, &handle, &mut rgb16_frame())
            .unwrap();
        assert!(transport.deleted().is_empty());
    }

    #[test]
    fn test_delete_failure_is_not_fatal() {
        let mut transport = MockTransport::new(W, H)
            .with_capture_delay(Duration::ZERO)
            .with_failing_delete();
        let handle = capture(&mut transport);
        let pipeline = AcquisitionPipeline::new(MockDecoder::new(W, H));

        assert!(pipeline
            .run(&mut transport, &handle, &mut rgb16_frame())
            .is_ok());
    }
}
