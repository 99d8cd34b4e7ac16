use std::str::FromStr;

use serde::Serialize;

use crate::core::error::{AppError, AppResult};
use crate::media::MediaKind;

/// Fixed video bitrate for VP9, which gets no CRF
const WEBM_VIDEO_BITRATE: &str = "2M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TargetFormat {
    Mp4,
    Mkv,
    Webm,
    Avi,
    Mov,
    Mp3,
    Aac,
    Wav,
    Flac,
    Ogg,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 10] = [
        TargetFormat::Mp4,
        TargetFormat::Mkv,
        TargetFormat::Webm,
        TargetFormat::Avi,
        TargetFormat::Mov,
        TargetFormat::Mp3,
        TargetFormat::Aac,
        TargetFormat::Wav,
        TargetFormat::Flac,
        TargetFormat::Ogg,
    ];

    /// Parses a user-supplied token such as `mp4` or `.FLAC`.
    pub fn parse(token: &str) -> AppResult<Self> {
        let token = token.trim().trim_start_matches('.');
        Self::from_str(token).map_err(|_| AppError::UnsupportedFormat(token.to_string()))
    }

    pub fn media_kind(self) -> MediaKind {
        match self {
            TargetFormat::Mp4 | TargetFormat::Mkv | TargetFormat::Webm | TargetFormat::Avi | TargetFormat::Mov => {
                MediaKind::Video
            }
            TargetFormat::Mp3 | TargetFormat::Aac | TargetFormat::Wav | TargetFormat::Flac | TargetFormat::Ogg => {
                MediaKind::Audio
            }
        }
    }

    pub fn codec(self) -> &'static str {
        match self {
            TargetFormat::Mp4 | TargetFormat::Mkv | TargetFormat::Avi | TargetFormat::Mov => "libx264",
            TargetFormat::Webm => "libvpx-vp9",
            TargetFormat::Mp3 => "libmp3lame",
            TargetFormat::Aac => "aac",
            TargetFormat::Wav => "pcm_s16le",
            TargetFormat::Flac => "flac",
            TargetFormat::Ogg => "libvorbis",
        }
    }

    /// Output file extension; identical to the token
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Mp4 => "mp4",
            TargetFormat::Mkv => "mkv",
            TargetFormat::Webm => "webm",
            TargetFormat::Avi => "avi",
            TargetFormat::Mov => "mov",
            TargetFormat::Mp3 => "mp3",
            TargetFormat::Aac => "aac",
            TargetFormat::Wav => "wav",
            TargetFormat::Flac => "flac",
            TargetFormat::Ogg => "ogg",
        }
    }

    /// Lossless / PCM encoders reject `-b:a`
    fn takes_audio_bitrate(self) -> bool {
        !matches!(self, TargetFormat::Wav | TargetFormat::Flac)
    }
}

/// Speed against quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Preset {
    Fast,
    #[default]
    Balanced,
    Quality,
}

impl Preset {
    pub fn crf(self) -> u8 {
        match self {
            Preset::Fast => 28,
            Preset::Balanced => 23,
            Preset::Quality => 18,
        }
    }

    /// x264 `-preset`
    pub fn speed(self) -> &'static str {
        match self {
            Preset::Fast => "ultrafast",
            Preset::Balanced => "medium",
            Preset::Quality => "slow",
        }
    }

    pub fn audio_bitrate(self) -> &'static str {
        match self {
            Preset::Fast => "128k",
            Preset::Balanced => "192k",
            Preset::Quality => "320k",
        }
    }
}

/// Target formats offered for a probed input. Video inputs can also be
/// converted to audio; audio inputs only to audio.
pub fn supported_formats(kind: MediaKind) -> Vec<TargetFormat> {
    TargetFormat::ALL
        .into_iter()
        .filter(|f| match kind {
            MediaKind::Audio => f.media_kind() == MediaKind::Audio,
            MediaKind::Video | MediaKind::Unknown => true,
        })
        .collect()
}

/// Encoder arguments placed between the input options and the output path.
pub fn encode_args(format: TargetFormat, preset: Preset) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

    match format.media_kind() {
        MediaKind::Video => {
            push(&["-c:v", format.codec()]);
            if format != TargetFormat::Webm {
                push(&["-crf", &preset.crf().to_string()]);
            }
            push(&["-preset", preset.speed(), "-c:a", "aac", "-b:a", preset.audio_bitrate()]);
            if format == TargetFormat::Webm {
                push(&["-b:v", WEBM_VIDEO_BITRATE]);
            }
        }
        MediaKind::Audio | MediaKind::Unknown => {
            push(&["-vn", "-c:a", format.codec()]);
            if format.takes_audio_bitrate() {
                push(&["-b:a", preset.audio_bitrate()]);
            }
        }
    }
    args
}
