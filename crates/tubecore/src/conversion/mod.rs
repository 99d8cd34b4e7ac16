//! Local file conversion through ffmpeg
//!
//! - `formats`: target formats, presets and the encoder arguments they imply
//! - `output`: collision-free output paths next to the input
//! - `converter`: single and batch conversion with progress and cancellation

pub mod converter;
pub mod formats;
pub mod output;

pub use converter::{BatchFailure, BatchProgress, BatchResult, ConversionResult, ConvertPipeline, ItemComplete};
pub use formats::{supported_formats, Preset, TargetFormat};
pub use output::generate_output_path;
