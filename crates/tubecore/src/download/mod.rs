//! Fetching through yt-dlp: metadata, downloads, cookie file

pub mod cookies;
pub mod fetcher;
pub mod formats;

pub use cookies::{CookieRecord, CookieSource, CookieStatus, CookieStore, SUPPORTED_BROWSERS};
pub use fetcher::{DownloadOptions, DownloadOutcome, FetchPipeline, FetchProgress, FetchStatus};
pub use formats::{FormatCandidate, FormatList, VideoMetadata};
