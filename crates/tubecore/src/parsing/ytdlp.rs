//! yt-dlp output: progress lines, destinations, failure classification

use lazy_regex::{lazy_regex, Lazy, Regex};

static PERCENT_RE: Lazy<Regex> = lazy_regex!(r"\[download\]\s+(\d+(?:\.\d+)?)%");
static DESTINATION_RE: Lazy<Regex> = lazy_regex!(r"^\[download\] Destination: (.+)$");
static ALREADY_DOWNLOADED_RE: Lazy<Regex> = lazy_regex!(r"^\[download\] (.+) has already been downloaded");
static MERGING_RE: Lazy<Regex> = lazy_regex!(r#"^\[Merger\] Merging formats into "(.+)"$"#);
static EXTRACT_AUDIO_RE: Lazy<Regex> = lazy_regex!(r"^\[ExtractAudio\] Destination: (.+)$");
static SPEED_RE: Lazy<Regex> = lazy_regex!(r"\bat\s+(\S+/s)");
static ETA_RE: Lazy<Regex> = lazy_regex!(r"\bETA\s+(\d{1,2}(?::\d{2}){1,2})");
static TOTAL_RE: Lazy<Regex> = lazy_regex!(r"\bof\s+~?\s*(\d+(?:\.\d+)?[KMGT]?i?B)");

/// One classified stdout line of a download run
#[derive(Debug, Clone, PartialEq)]
pub enum YtDlpLine {
    Progress(DownloadLineProgress),
    /// `[download] Destination: <file>`
    Destination(String),
    /// `[download] <file> has already been downloaded`
    AlreadyDownloaded(String),
    /// `[Merger] Merging formats into "<file>"`
    MergingInto(String),
    /// `[ExtractAudio] Destination: <file>`
    ExtractAudioDestination(String),
    /// Any other `[Merger]` / `[ffmpeg]` post-processing line
    PostProcessing,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadLineProgress {
    pub percent: f64,
    pub total_size: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

/// Classifies a single line printed with `--newline`.
pub fn parse_line(line: &str) -> YtDlpLine {
    let line = line.trim_end();

    if let Some(caps) = DESTINATION_RE.captures(line) {
        return YtDlpLine::Destination(caps[1].trim().to_string());
    }
    if let Some(caps) = ALREADY_DOWNLOADED_RE.captures(line) {
        return YtDlpLine::AlreadyDownloaded(caps[1].trim().to_string());
    }
    if let Some(caps) = PERCENT_RE.captures(line) {
        let Ok(percent) = caps[1].parse::<f64>() else {
            return YtDlpLine::Other;
        };
        let capture = |re: &Regex| re.captures(line).map(|c| c[1].to_string());
        return YtDlpLine::Progress(DownloadLineProgress {
            percent: percent.clamp(0.0, 100.0),
            total_size: capture(&TOTAL_RE),
            speed: capture(&SPEED_RE),
            eta: capture(&ETA_RE),
        });
    }
    if let Some(caps) = MERGING_RE.captures(line) {
        return YtDlpLine::MergingInto(caps[1].to_string());
    }
    if let Some(caps) = EXTRACT_AUDIO_RE.captures(line) {
        return YtDlpLine::ExtractAudioDestination(caps[1].trim().to_string());
    }
    if line.contains("[Merger]") || line.contains("[ffmpeg]") {
        return YtDlpLine::PostProcessing;
    }
    YtDlpLine::Other
}

/// Known yt-dlp failure causes
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum YtDlpErrorType {
    /// YouTube asks the viewer to confirm their age
    AgeRestricted,
    /// Private, removed or region-blocked
    Unavailable,
    /// The browser keeps its cookie database locked
    CookieAccessDenied,
    /// Any other cookie problem
    CookiesUnreadable,
    Unknown,
}

/// Classifies yt-dlp stderr. Checks run in order; the first match wins.
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("sign in to confirm your age") {
        return YtDlpErrorType::AgeRestricted;
    }

    if stderr_lower.contains("video unavailable") || stderr_lower.contains("private video") {
        return YtDlpErrorType::Unavailable;
    }

    if stderr_lower.contains("could not copy") && stderr_lower.contains("cookie database") {
        return YtDlpErrorType::CookieAccessDenied;
    }

    if stderr_lower.contains("cookies") {
        return YtDlpErrorType::CookiesUnreadable;
    }

    YtDlpErrorType::Unknown
}

/// User-facing message for a classified failure.
///
/// `browser` is the browser cookies were read from, if any.
pub fn get_error_message(error_type: YtDlpErrorType, browser: Option<&str>) -> String {
    match error_type {
        YtDlpErrorType::AgeRestricted => {
            "This video requires age verification. Make sure you are signed in to YouTube in your browser."
                .to_string()
        }
        YtDlpErrorType::Unavailable => "The video is unavailable or private.".to_string(),
        YtDlpErrorType::CookieAccessDenied => format!(
            "Cannot access the browser's cookies. Close {} and try again, or pick a different browser in settings.",
            browser.map(str::to_uppercase).unwrap_or_else(|| "the browser".to_string())
        ),
        YtDlpErrorType::CookiesUnreadable => {
            "Cookies could not be read. Make sure the selected browser is installed.".to_string()
        }
        YtDlpErrorType::Unknown => "Download failed.".to_string(),
    }
}

/// First non-empty stderr line, used when no known cause matched
pub fn first_error_line(stderr: &str) -> Option<&str> {
    stderr.lines().map(str::trim).find(|l| !l.is_empty())
}

/// `yt-dlp --version` prints the bare version on the first line
pub fn parse_version(stdout: &str) -> Option<String> {
    first_error_line(stdout).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_progress_line() {
        let line = "[download]  45.3% of   10.00MiB at    1.23MiB/s ETA 00:05";
        assert_eq!(
            parse_line(line),
            YtDlpLine::Progress(DownloadLineProgress {
                percent: 45.3,
                total_size: Some("10.00MiB".into()),
                speed: Some("1.23MiB/s".into()),
                eta: Some("00:05".into()),
            })
        );
    }

    #[test]
    fn test_progress_line_integer_and_estimated_total() {
        let line = "[download] 100% of ~ 3.50MiB in 00:00:02 at 1.50MiB/s";
        match parse_line(line) {
            YtDlpLine::Progress(p) => {
                assert_eq!(p.percent, 100.0);
                assert_eq!(p.total_size.as_deref(), Some("3.50MiB"));
                assert_eq!(p.eta, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_destination() {
        assert_eq!(
            parse_line("[download] Destination: /tmp/out/My Video.f137.mp4"),
            YtDlpLine::Destination("/tmp/out/My Video.f137.mp4".into())
        );
    }

    #[test]
    fn test_already_downloaded() {
        assert_eq!(
            parse_line("[download] /tmp/out/My Video.mp4 has already been downloaded"),
            YtDlpLine::AlreadyDownloaded("/tmp/out/My Video.mp4".into())
        );
    }

    #[test]
    fn test_merger_and_ffmpeg_markers() {
        assert_eq!(
            parse_line(r#"[Merger] Merging formats into "/tmp/out/My Video.mp4""#),
            YtDlpLine::MergingInto("/tmp/out/My Video.mp4".into())
        );
        assert_eq!(
            parse_line("[ffmpeg] Fixing malformed AAC bitstream"),
            YtDlpLine::PostProcessing
        );
        assert_eq!(
            parse_line("[ExtractAudio] Destination: /tmp/out/Song.mp3"),
            YtDlpLine::ExtractAudioDestination("/tmp/out/Song.mp3".into())
        );
    }

    #[test]
    fn test_unrelated_lines() {
        assert_eq!(parse_line("[youtube] abc: Downloading webpage"), YtDlpLine::Other);
        assert_eq!(parse_line(""), YtDlpLine::Other);
        assert_eq!(parse_line("[download] Downloading item 1 of 3"), YtDlpLine::Other);
    }

    #[test]
    fn test_classification_order() {
        assert_eq!(
            analyze_ytdlp_error("ERROR: [youtube] x: Sign in to confirm your age. This video may be inappropriate"),
            YtDlpErrorType::AgeRestricted
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: [youtube] x: Video unavailable"),
            YtDlpErrorType::Unavailable
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: [youtube] x: Private video. Sign in if you've been granted access"),
            YtDlpErrorType::Unavailable
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: Could not copy Chrome cookie database. See https://github.com/yt-dlp/yt-dlp/issues/7271"),
            YtDlpErrorType::CookieAccessDenied
        );
        assert_eq!(
            analyze_ytdlp_error("ERROR: failed to load cookies"),
            YtDlpErrorType::CookiesUnreadable
        );
        assert_eq!(analyze_ytdlp_error("ERROR: Unsupported URL"), YtDlpErrorType::Unknown);
    }

    #[test]
    fn test_age_gate_wins_over_cookie_hint() {
        let stderr = "ERROR: Sign in to confirm your age. Use --cookies-from-browser or --cookies";
        assert_eq!(analyze_ytdlp_error(stderr), YtDlpErrorType::AgeRestricted);
    }

    #[test]
    fn test_error_messages() {
        let msg = get_error_message(YtDlpErrorType::CookieAccessDenied, Some("chrome"));
        assert!(msg.contains("CHROME"), "got {msg}");
        assert!(get_error_message(YtDlpErrorType::AgeRestricted, None).contains("age verification"));
    }

    #[test]
    fn test_first_error_line() {
        assert_eq!(first_error_line("\n  \nERROR: boom\nmore"), Some("ERROR: boom"));
        assert_eq!(first_error_line(""), None);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("2024.12.03\n"), Some("2024.12.03".into()));
        assert_eq!(parse_version("   \n"), None);
    }
}
