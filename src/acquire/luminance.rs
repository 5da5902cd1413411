//! Luminance pipeline for network-attached RGB sources.

use super::pipeline::PipelineError;
use crate::frame::FrameBuffer;

/// Collapses processed interleaved RGB pixels into a single-channel
/// luminance framebuffer.
///
/// Used for network-attached devices that deliver already-processed
/// RGB data: no RAW decode and no plane reshuffle, since source and
/// destination dimensions are equal. Each output pixel is the integer
/// average of its three channel values (truncating division).
#[derive(Debug, Default)]
pub struct LuminancePipeline;

impl LuminancePipeline {
    pub fn new() -> Self {
        Self
    }

    /// Fills `frame` (single-channel, 8 bits) from 8-bit RGB `src`.
    pub fn run(&self, src: &[u8], frame: &mut FrameBuffer) -> Result<(), PipelineError> {
        let pixels = frame.width() as usize * frame.height() as usize;

        let expected = pixels * 3;
        if src.len() != expected {
            return Err(PipelineError::SizeMismatch {
                expected,
                actual: src.len(),
            });
        }
        if frame.payload_bytes() != pixels {
            return Err(PipelineError::SizeMismatch {
                expected: pixels,
                actual: frame.payload_bytes(),
            });
        }

        let payload = frame.payload_mut();
        for (i, rgb) in src.chunks_exact(3).enumerate() {
            let sum = rgb[0] as u16 + rgb[1] as u16 + rgb[2] as u16;
            payload[i] = (sum / 3) as u8;
        }

        tracing::debug!(pixels, "computed luminance frame");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_truncates() {
        let src = [
            10, 20, 30, // avg 20
            1, 1, 2, //   sum 4 -> 1 (truncated)
            255, 255, 255, // 255
            0, 0, 0, //   0
        ];
        let mut frame = FrameBuffer::new(4, 1, 1, 8);

        LuminancePipeline::new().run(&src, &mut frame).unwrap();
        assert_eq!(frame.payload(), [20, 1, 255, 0]);
    }

    #[test]
    fn test_wrong_source_length_rejected() {
        let mut frame = FrameBuffer::new(4, 1, 1, 8);
        let result = LuminancePipeline::new().run(&[0u8; 11], &mut frame);
        assert!(matches!(result, Err(PipelineError::SizeMismatch { .. })));
    }

    #[test]
    fn test_multichannel_destination_rejected() {
        let mut frame = FrameBuffer::new(2, 1, 3, 8);
        let result = LuminancePipeline::new().run(&[0u8; 6], &mut frame);
        assert!(matches!(result, Err(PipelineError::SizeMismatch { .. })));
    }
}
