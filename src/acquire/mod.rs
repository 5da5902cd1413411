//! Image acquisition and transcode pipelines.
//!
//! Once an exposure cycle completes, the pipeline fetches the captured
//! asset, validates its container, decodes it, and reshapes the pixels
//! into the destination framebuffer. The RAW pipeline handles tethered
//! cameras producing vendor RAW files; the luminance pipeline handles
//! network-attached sources that already deliver processed RGB.

mod luminance;
mod pipeline;
mod planar;

pub use luminance::LuminancePipeline;
pub use pipeline::{AcquisitionPipeline, PipelineError, SUPPORTED_EXTENSION};
pub use planar::interleaved_to_planar;
