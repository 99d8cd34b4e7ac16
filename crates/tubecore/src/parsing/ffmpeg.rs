//! ffmpeg output: `-i` inspection text, `-progress` key/values, version banner

use lazy_regex::{lazy_regex, Lazy, Regex};
use serde::Serialize;

static DURATION_RE: Lazy<Regex> = lazy_regex!(r"Duration:\s*(\d{2}):(\d{2}):(\d{2})\.(\d{2})");
static VIDEO_RE: Lazy<Regex> = lazy_regex!(r"Stream #\d+:\d+.*?Video:\s+(\w+).*?,\s*(\d+)x(\d+)");
static AUDIO_RE: Lazy<Regex> = lazy_regex!(r"Stream #\d+:\d+.*?Audio:\s+(\w+).*?,\s*(\d+)\s*Hz");
static BITRATE_RE: Lazy<Regex> = lazy_regex!(r"bitrate:\s*(\d+)\s*kb/s");
static OUT_TIME_RE: Lazy<Regex> = lazy_regex!(r"^out_time_(?:ms|us)=(\d+)$");
static VERSION_RE: Lazy<Regex> = lazy_regex!(r"ffmpeg version (\S+)");

/// Highest percentage reported while ffmpeg is still running
pub const MAX_RUNNING_PERCENT: f64 = 99.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoStream {
    pub codec: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioStream {
    pub codec: String,
    pub sample_rate: u32,
}

/// Fields extracted from `ffmpeg -i` stderr
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeFields {
    /// Whole seconds; centiseconds are dropped
    pub duration: Option<f64>,
    pub video: Option<VideoStream>,
    pub audio: Option<AudioStream>,
    pub bitrate_kbps: Option<u64>,
}

/// Extracts duration, first video/audio stream and overall bitrate.
/// Missing fields stay `None`.
pub fn parse_probe_output(text: &str) -> ProbeFields {
    let duration = DURATION_RE.captures(text).and_then(|caps| {
        let hours: u64 = caps[1].parse().ok()?;
        let minutes: u64 = caps[2].parse().ok()?;
        let seconds: u64 = caps[3].parse().ok()?;
        Some((hours * 3600 + minutes * 60 + seconds) as f64)
    });

    let video = VIDEO_RE.captures(text).and_then(|caps| {
        Some(VideoStream {
            codec: caps[1].to_string(),
            width: caps[2].parse().ok()?,
            height: caps[3].parse().ok()?,
        })
    });

    let audio = AUDIO_RE.captures(text).and_then(|caps| {
        Some(AudioStream {
            codec: caps[1].to_string(),
            sample_rate: caps[2].parse().ok()?,
        })
    });

    let bitrate_kbps = BITRATE_RE.captures(text).and_then(|caps| caps[1].parse().ok());

    ProbeFields {
        duration,
        video,
        audio,
        bitrate_kbps,
    }
}

/// Encoded position from a `-progress pipe:1` line, in microseconds.
///
/// ffmpeg names the field `out_time_ms` but fills it with microseconds.
pub fn parse_out_time_us(line: &str) -> Option<u64> {
    OUT_TIME_RE.captures(line.trim()).and_then(|caps| caps[1].parse().ok())
}

/// Percentage of `duration_secs` reached, capped at 99 until the process exits.
pub fn progress_percent(out_time_us: u64, duration_secs: f64) -> Option<f64> {
    if duration_secs <= 0.0 {
        return None;
    }
    let percent = (out_time_us as f64 / 1_000_000.0) / duration_secs * 100.0;
    Some(percent.clamp(0.0, MAX_RUNNING_PERCENT))
}

/// Version token from `ffmpeg -version`
pub fn parse_version(stdout: &str) -> Option<String> {
    VERSION_RE.captures(stdout).map(|caps| caps[1].to_string())
}
