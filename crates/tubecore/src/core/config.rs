use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Application data root (binaries, cookies)
/// Read from TUBEDECK_HOME environment variable
/// Default: ~/.tubedeck
/// Supports tilde (~) expansion for home directory
pub static TUBEDECK_HOME: Lazy<String> = Lazy::new(|| {
    let raw = env::var("TUBEDECK_HOME").unwrap_or_else(|_| "~/.tubedeck".to_string());
    shellexpand::tilde(&raw).to_string()
});

/// Override for the binaries directory
/// Read from TUBEDECK_BIN_DIR environment variable
/// Default: <TUBEDECK_HOME>/bin
pub static TUBEDECK_BIN_DIR: Lazy<Option<String>> =
    Lazy::new(|| env::var("TUBEDECK_BIN_DIR").ok().map(|p| shellexpand::tilde(&p).to_string()));

/// Override for the cookies directory
/// Read from TUBEDECK_COOKIES_DIR environment variable
/// Default: <TUBEDECK_HOME>/cookies
pub static TUBEDECK_COOKIES_DIR: Lazy<Option<String>> =
    Lazy::new(|| env::var("TUBEDECK_COOKIES_DIR").ok().map(|p| shellexpand::tilde(&p).to_string()));

/// Download folder path
/// Read from DOWNLOAD_FOLDER environment variable
/// Defaults to ~/Downloads
pub static DOWNLOAD_FOLDER: Lazy<String> = Lazy::new(|| {
    let raw = env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "~/Downloads".to_string());
    shellexpand::tilde(&raw).to_string()
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: tubedeck.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "tubedeck.log".to_string()));

/// Browser to extract cookies from when no synced cookie file exists
/// Read from YTDL_COOKIES_BROWSER environment variable
/// Supported: chrome, firefox, edge, brave, opera, chromium
/// Empty or "none" disables browser extraction
pub static YTDL_COOKIES_BROWSER: Lazy<String> =
    Lazy::new(|| env::var("YTDL_COOKIES_BROWSER").unwrap_or_else(|_| String::new()));

/// Network configuration for binary downloads and update checks
pub mod network {
    use super::Duration;

    /// Connect timeout for every request (in seconds)
    pub const CONNECT_TIMEOUT_SECS: u64 = 30;

    /// Timeout for the release metadata request (in seconds)
    pub const RELEASE_CHECK_TIMEOUT_SECS: u64 = 20;

    /// Redirect hops followed before giving up
    pub const MAX_REDIRECTS: usize = 10;

    /// User agent sent to GitHub and the mirrors
    pub const USER_AGENT: &str = concat!("tubedeck/", env!("CARGO_PKG_VERSION"));

    /// Latest yt-dlp release metadata
    pub const YTDLP_RELEASE_URL: &str = "https://api.github.com/repos/yt-dlp/yt-dlp/releases/latest";

    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_TIMEOUT_SECS)
    }

    pub fn release_check_timeout() -> Duration {
        Duration::from_secs(RELEASE_CHECK_TIMEOUT_SECS)
    }
}

/// Child process configuration
pub mod process {
    use super::Duration;

    /// Number of stderr lines kept for error reporting
    pub const STDERR_TAIL_LINES: usize = 200;

    /// How long to keep draining output after the child exited (milliseconds)
    /// A grandchild that inherited the pipe can keep it open indefinitely.
    pub const DRAIN_GRACE_MS: u64 = 250;

    /// Timeout for `--version` style queries (in seconds)
    pub const VERSION_QUERY_TIMEOUT_SECS: u64 = 15;

    /// Timeout for `ffmpeg -i` inspection (in seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 30;

    pub fn drain_grace() -> Duration {
        Duration::from_millis(DRAIN_GRACE_MS)
    }

    pub fn version_query_timeout() -> Duration {
        Duration::from_secs(VERSION_QUERY_TIMEOUT_SECS)
    }

    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }
}

/// Fetch pipeline configuration
pub mod fetch {
    /// Number of audio-only formats offered after sorting by bitrate
    pub const MAX_AUDIO_FORMATS: usize = 5;

    /// Post-processor arguments passed to ffmpeg through yt-dlp
    pub const POSTPROCESSOR_ARGS: &str = "ffmpeg:-c:v copy -c:a aac -b:a 192k";

    /// Output template relative to the destination directory
    pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";
}

/// Status watcher configuration
pub mod watcher {
    use super::Duration;

    /// Poll interval for file fingerprints (in milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 1000;

    /// Full refresh interval (in seconds)
    pub const REFRESH_INTERVAL_SECS: u64 = 300; // 5 minutes

    pub fn poll_interval() -> Duration {
        Duration::from_millis(POLL_INTERVAL_MS)
    }

    pub fn refresh_interval() -> Duration {
        Duration::from_secs(REFRESH_INTERVAL_SECS)
    }
}
