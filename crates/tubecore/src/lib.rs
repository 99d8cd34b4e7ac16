//! TubeCore - supervision engine behind the TubeDeck desktop companion
//!
//! Drives two external tools, yt-dlp (fetching) and ffmpeg (probing and
//! transcoding), parses their textual output into structured progress
//! events, and keeps both binaries installed and up to date.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, paths, the process runner and
//!   the per-pipeline operation slot
//! - `parsing`: every pattern applied to yt-dlp / ffmpeg output
//! - `binaries`: download, extraction, install and update of the tools
//! - `media`: `ffmpeg -i` inspection
//! - `download`: metadata and download through yt-dlp, cookie file store
//! - `conversion`: format/preset matrix, single and batch conversion
//! - `watcher`: change notifications for binaries and cookies
//! - `service`: the facade used by front ends

pub mod binaries;
pub mod conversion;
pub mod core;
pub mod download;
pub mod media;
pub mod parsing;
pub mod service;
pub mod watcher;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppPaths, AppResult};
pub use service::TubeDeck;
