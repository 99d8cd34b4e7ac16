//! Format choices offered for a URL

use serde::{Deserialize, Serialize};

use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// One selectable download option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatCandidate {
    /// Passed to `-f`; ladder entries are selector expressions resolved by yt-dlp
    pub format_id: String,
    pub ext: String,
    /// Human label: `1080p`, `160kbps`
    pub quality: String,
    pub has_audio: bool,
    pub has_video: bool,
    pub filesize: Option<u64>,
    pub description: Option<String>,
    pub acodec: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormatList {
    pub video: Vec<FormatCandidate>,
    pub audio: Vec<FormatCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub view_count: Option<u64>,
    pub upload_date: Option<String>,
    pub description: Option<String>,
    pub formats: FormatList,
    /// The URL as requested
    pub url: String,
}

/// Subset of a `--dump-json` format entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    pub abr: Option<f64>,
    pub format_note: Option<String>,
    /// yt-dlp prints estimated sizes as floats for some extractors
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

impl RawFormat {
    fn is_audio_only(&self) -> bool {
        let has_audio = self.acodec.as_deref().is_some_and(|c| c != "none");
        let no_video = self.vcodec.as_deref().map_or(true, |c| c == "none");
        has_audio && no_video
    }
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    thumbnail: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    view_count: Option<f64>,
    upload_date: Option<String>,
    description: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// (selector height, label, description); `None` height is the unrestricted best
const LADDER: [(Option<u32>, &str, &str); 7] = [
    (None, "Best quality", "Automatic best"),
    (Some(2160), "4K (2160p)", "4K Ultra HD"),
    (Some(1440), "2K (1440p)", "2K QHD"),
    (Some(1080), "1080p", "Full HD"),
    (Some(720), "720p", "HD"),
    (Some(480), "480p", "SD"),
    (Some(360), "360p", "Low"),
];

/// The fixed video ladder, offered whatever the source provides.
pub fn video_ladder() -> Vec<FormatCandidate> {
    LADDER
        .iter()
        .map(|(height, label, description)| FormatCandidate {
            format_id: match height {
                Some(h) => format!("bv*[height<={h}]+ba/b[height<={h}]"),
                None => "best".to_string(),
            },
            ext: "mp4".to_string(),
            quality: label.to_string(),
            has_audio: true,
            has_video: true,
            filesize: None,
            description: Some(description.to_string()),
            acodec: None,
        })
        .collect()
}

/// Audio-only streams sorted by descending bitrate, top five.
pub fn audio_formats(formats: &[RawFormat]) -> Vec<FormatCandidate> {
    let mut audio: Vec<&RawFormat> = formats.iter().filter(|f| f.is_audio_only()).collect();
    audio.sort_by(|a, b| b.abr.unwrap_or(0.0).total_cmp(&a.abr.unwrap_or(0.0)));

    audio
        .into_iter()
        .take(config::fetch::MAX_AUDIO_FORMATS)
        .map(|f| FormatCandidate {
            format_id: f.format_id.clone(),
            ext: f.ext.clone(),
            quality: match f.abr {
                Some(abr) => format!("{}kbps", abr.round() as u64),
                None => f.format_note.clone().unwrap_or_default(),
            },
            has_audio: true,
            has_video: false,
            filesize: whole_number(f.filesize).or(whole_number(f.filesize_approx)),
            description: None,
            acodec: f.acodec.clone(),
        })
        .collect()
}

fn whole_number(value: Option<f64>) -> Option<u64> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64)
}

/// Parses the single JSON document printed by `--dump-json`.
pub fn parse_metadata(stdout: &str, url: &str) -> AppResult<VideoMetadata> {
    let json = stdout
        .lines()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or_else(|| AppError::Parse("yt-dlp printed no JSON".to_string()))?;
    let raw: RawMetadata = serde_json::from_str(json)?;

    Ok(VideoMetadata {
        formats: FormatList {
            video: video_ladder(),
            audio: audio_formats(&raw.formats),
        },
        id: raw.id,
        title: raw.title,
        thumbnail: raw.thumbnail,
        duration: raw.duration,
        uploader: raw.uploader,
        view_count: whole_number(raw.view_count),
        upload_date: raw.upload_date,
        description: raw.description,
        url: url.to_string(),
    })
}
