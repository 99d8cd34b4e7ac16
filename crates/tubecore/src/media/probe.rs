use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::process::{ProcessEvent, ProcessRunner};
use crate::core::utils::{format_duration, format_file_size};
use crate::parsing::ffmpeg::{self, AudioStream, VideoStream};

/// Coarse classification of a probed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub file_name: String,
    /// Bytes, from the filesystem
    pub size: u64,
    pub size_formatted: String,
    /// Whole seconds, 0 when ffmpeg reported no duration
    pub duration: f64,
    pub duration_formatted: String,
    pub media_type: MediaKind,
    pub video: Option<VideoStream>,
    pub audio: Option<AudioStream>,
    pub bitrate_kbps: Option<u64>,
    /// `WIDTHxHEIGHT` of the first video stream
    pub resolution: Option<String>,
}

impl MediaInfo {
    fn from_probe(path: &Path, size: u64, stderr: &str) -> Self {
        let fields = ffmpeg::parse_probe_output(stderr);
        let duration = fields.duration.unwrap_or(0.0);

        let media_type = if fields.video.is_some() {
            MediaKind::Video
        } else if fields.audio.is_some() {
            MediaKind::Audio
        } else {
            MediaKind::Unknown
        };

        Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size,
            size_formatted: format_file_size(size),
            duration,
            duration_formatted: format_duration(duration as u64),
            media_type,
            resolution: fields.video.as_ref().map(|v| format!("{}x{}", v.width, v.height)),
            video: fields.video,
            audio: fields.audio,
            bitrate_kbps: fields.bitrate_kbps,
        }
    }
}

/// Runs ffmpeg in inspection mode
#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffmpeg: PathBuf,
    runner: ProcessRunner,
    timeout: Duration,
}

impl MediaProbe {
    pub fn new(ffmpeg: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            runner,
            timeout: config::process::probe_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Inspects `path`.
    ///
    /// `ffmpeg -i` without an output always exits non-zero, so the exit code
    /// is ignored; only a spawn failure or a stalled run is an error.
    pub async fn inspect(&self, path: &Path) -> AppResult<MediaInfo> {
        let metadata = match fs_err::tokio::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::InputNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let args = [OsStr::new("-hide_banner"), OsStr::new("-i"), path.as_os_str()];
        let mut process = self.runner.spawn(&self.ffmpeg, args)?;

        let collect = async {
            let mut stderr = String::new();
            while let Some(event) = process.next_event().await {
                if let ProcessEvent::Stderr(line) = event {
                    stderr.push_str(&line);
                    stderr.push('\n');
                }
            }
            let outcome = process.wait().await?;
            log::debug!("ffmpeg -i {} exited with {:?}", path.display(), outcome.exit);
            Ok::<_, AppError>(stderr)
        };

        let stderr = match tokio::time::timeout(self.timeout, collect).await {
            Ok(result) => result?,
            Err(_) => {
                // The dropped child is killed by `kill_on_drop`.
                log::warn!("ffmpeg -i {} stalled, giving up", path.display());
                return Err(AppError::NonZeroExit {
                    tool: "ffmpeg".to_string(),
                    code: None,
                    kind: None,
                    message: format!("probe timed out after {}s", self.timeout.as_secs()),
                });
            }
        };

        let info = MediaInfo::from_probe(path, metadata.len(), &stderr);
        log::info!(
            "🔍 Probed {}: {} {} ({})",
            info.file_name,
            info.media_type,
            info.duration_formatted,
            info.size_formatted
        );
        Ok(info)
    }
}
