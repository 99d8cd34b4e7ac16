//! Local media inspection through `ffmpeg -i`

pub mod probe;

pub use probe::{MediaInfo, MediaKind, MediaProbe};
