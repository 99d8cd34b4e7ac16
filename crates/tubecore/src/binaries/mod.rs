//! Acquisition of the external tools: platform URL table, streamed HTTP
//! download with manual redirects, archive extraction, install and update.

pub mod archive;
pub mod http;
pub mod manager;

pub use manager::{BinaryManager, BinaryStatus, DownloadPhase, DownloadProgressEvent, ReadinessReport, UpdateCheck};

use serde::Serialize;

/// The two tools the engine drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString)]
pub enum BinaryKind {
    #[strum(serialize = "yt-dlp")]
    #[serde(rename = "yt-dlp")]
    YtDlp,
    #[strum(serialize = "ffmpeg")]
    #[serde(rename = "ffmpeg")]
    Ffmpeg,
}

impl BinaryKind {
    /// Every managed binary; `Platform::specs` lists them in this order
    pub const ALL: [BinaryKind; 2] = [BinaryKind::YtDlp, BinaryKind::Ffmpeg];

    /// Executable file name on the current platform
    pub fn file_name(self) -> &'static str {
        Platform::current().file_name(self)
    }

    /// Argument that makes the tool print its version
    pub fn version_flag(self) -> &'static str {
        match self {
            BinaryKind::YtDlp => "--version",
            BinaryKind::Ffmpeg => "-version",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn file_name(self, kind: BinaryKind) -> &'static str {
        match (self, kind) {
            (Platform::Windows, BinaryKind::YtDlp) => "yt-dlp.exe",
            (Platform::Windows, BinaryKind::Ffmpeg) => "ffmpeg.exe",
            (_, BinaryKind::YtDlp) => "yt-dlp",
            (_, BinaryKind::Ffmpeg) => "ffmpeg",
        }
    }

    /// Static download table
    pub fn specs(self) -> Vec<BinarySpec> {
        let (ytdlp_url, ffmpeg_url, ffmpeg_archive) = match self {
            Platform::Windows => (
                "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe",
                "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-win64-gpl.zip",
                ArchiveKind::Zip,
            ),
            Platform::MacOs => (
                "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos",
                "https://evermeet.cx/ffmpeg/getrelease/zip",
                ArchiveKind::Zip,
            ),
            Platform::Linux => (
                "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp",
                "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-linux64-gpl.tar.xz",
                ArchiveKind::TarXz,
            ),
        };

        vec![
            BinarySpec {
                kind: BinaryKind::YtDlp,
                url: ytdlp_url.to_string(),
                file_name: self.file_name(BinaryKind::YtDlp).to_string(),
                archive: None,
            },
            BinarySpec {
                kind: BinaryKind::Ffmpeg,
                url: ffmpeg_url.to_string(),
                file_name: self.file_name(BinaryKind::Ffmpeg).to_string(),
                archive: Some(ffmpeg_archive),
            },
        ]
    }
}

/// How a binary is packaged at its download URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarXz,
}

impl ArchiveKind {
    /// File name used for the downloaded archive before extraction
    pub fn download_name(self) -> &'static str {
        match self {
            ArchiveKind::Zip => "ffmpeg.zip",
            ArchiveKind::TarXz => "ffmpeg.tar.xz",
        }
    }
}

/// Where one binary comes from and what it is installed as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySpec {
    pub kind: BinaryKind,
    pub url: String,
    pub file_name: String,
    /// `None` when the URL serves the executable itself
    pub archive: Option<ArchiveKind>,
}
