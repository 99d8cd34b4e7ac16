use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::operation::{OperationGuard, OperationSlot, OperationState};
use crate::core::process::{ProcessEvent, ProcessOutcome, ProcessRunner};
use crate::download::cookies::{CookieSource, CookieStore};
use crate::download::formats::{self, VideoMetadata};
use crate::parsing::ytdlp::{self, YtDlpErrorType, YtDlpLine};

/// Selector used when no explicit format is requested
const BEST_SELECTOR: &str = "bv*+ba/b";

/// Leftovers yt-dlp writes next to a destination while downloading
const PARTIAL_SUFFIXES: [&str; 2] = [".part", ".ytdl"];

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub url: String,
    /// Selector from `FormatList`; `None` or `best` picks the best combined stream
    pub format_id: Option<String>,
    /// Extract audio to mp3 instead of downloading video
    pub audio_only: bool,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FetchStatus {
    Downloading,
    /// Merging / post-processing; yt-dlp reports no percentage here
    Processing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchProgress {
    pub percent: f64,
    pub status: FetchStatus,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

impl FetchProgress {
    fn processing() -> Self {
        Self {
            percent: 100.0,
            status: FetchStatus::Processing,
            speed: None,
            eta: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    /// Final file as last announced by yt-dlp
    pub filename: Option<String>,
    /// yt-dlp found the file already present and skipped the transfer
    pub already_downloaded: bool,
}

/// Output-derived state of one download run
#[derive(Debug, Default)]
struct RunState {
    filename: Option<String>,
    already_downloaded: bool,
    destinations: Vec<String>,
}

impl RunState {
    /// Applies one stdout line and returns the progress event it implies.
    fn apply(&mut self, line: &str) -> Option<FetchProgress> {
        match ytdlp::parse_line(line) {
            YtDlpLine::Progress(p) => Some(FetchProgress {
                percent: p.percent,
                status: FetchStatus::Downloading,
                speed: p.speed,
                eta: p.eta,
            }),
            YtDlpLine::Destination(file) => {
                self.destinations.push(file.clone());
                self.filename = Some(file);
                None
            }
            YtDlpLine::AlreadyDownloaded(file) => {
                self.already_downloaded = true;
                self.filename = Some(file);
                None
            }
            YtDlpLine::MergingInto(file) => {
                self.destinations.push(file.clone());
                self.filename = Some(file);
                Some(FetchProgress::processing())
            }
            YtDlpLine::ExtractAudioDestination(file) => {
                self.destinations.push(file.clone());
                self.filename = Some(file);
                Some(FetchProgress::processing())
            }
            YtDlpLine::PostProcessing => Some(FetchProgress::processing()),
            YtDlpLine::Other => None,
        }
    }
}

/// Metadata and downloads through yt-dlp. One download at a time.
#[derive(Debug, Clone)]
pub struct FetchPipeline {
    ytdlp: PathBuf,
    ffmpeg: PathBuf,
    runner: ProcessRunner,
    cookies: CookieStore,
    browser: Option<String>,
    slot: OperationSlot,
}

impl FetchPipeline {
    pub fn new(ytdlp: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>, runner: ProcessRunner, cookies: CookieStore) -> Self {
        Self {
            ytdlp: ytdlp.into(),
            ffmpeg: ffmpeg.into(),
            runner,
            cookies,
            browser: None,
            slot: OperationSlot::new("download"),
        }
    }

    /// Browser to read cookies from when no cookie file was synced
    pub fn with_browser(mut self, browser: Option<String>) -> Self {
        self.browser = browser;
        self
    }

    pub fn state(&self) -> OperationState {
        self.slot.state()
    }

    pub fn cookie_source(&self) -> CookieSource {
        CookieSource::resolve(&self.cookies, self.browser.as_deref())
    }

    /// `--dump-json` for `url`. Does not occupy the download slot.
    pub async fn get_metadata(&self, url: &str) -> AppResult<VideoMetadata> {
        let source = self.cookie_source();
        let mut args = source.args();
        args.extend(["--dump-json", "--no-download", url].map(OsString::from));

        log::info!("🔎 Fetching metadata for {}", url);
        let mut process = self.runner.spawn(&self.ytdlp, &args)?;

        let mut stdout = String::new();
        while let Some(event) = process.next_event().await {
            match event {
                ProcessEvent::Stdout(line) => {
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
                ProcessEvent::Stderr(line) => log::debug!("yt-dlp stderr: {}", line),
            }
        }
        let outcome = process.wait().await?;

        if !outcome.success() {
            let stderr = outcome.stderr_text();
            let fallback = if stderr.trim().is_empty() {
                "Could not fetch video info".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(fetch_failure(&outcome, &source, fallback));
        }

        formats::parse_metadata(&stdout, url)
    }

    /// Argument vector for a download
    pub fn download_args(&self, options: &DownloadOptions, source: &CookieSource) -> Vec<OsString> {
        let mut args = source.args();

        let ffmpeg_dir = self.ffmpeg.parent().unwrap_or_else(|| Path::new("."));
        args.extend([
            "--ffmpeg-location".into(),
            ffmpeg_dir.as_os_str().to_os_string(),
            "--newline".into(),
            "--progress".into(),
            "-o".into(),
            options.output_dir.join(config::fetch::OUTPUT_TEMPLATE).into_os_string(),
            "--postprocessor-args".into(),
            config::fetch::POSTPROCESSOR_ARGS.into(),
        ]);

        if options.audio_only {
            args.extend(["-x", "--audio-format", "mp3", "--audio-quality", "0"].map(OsString::from));
        } else {
            let selector = match options.format_id.as_deref() {
                Some(id) if !id.is_empty() && id != "best" => id,
                _ => BEST_SELECTOR,
            };
            args.extend(["-f", selector, "--merge-output-format", "mp4"].map(OsString::from));
        }

        args.push(options.url.as_str().into());
        args
    }

    /// Downloads with streamed progress. Fails with `Busy` while another download runs.
    pub async fn download<F>(&self, options: &DownloadOptions, on_progress: F) -> AppResult<DownloadOutcome>
    where
        F: FnMut(FetchProgress),
    {
        let guard = self.slot.begin()?;
        let result = self.run_download(&guard, options, on_progress).await;
        match &result {
            Ok(outcome) => log::info!("✅ Download finished: {:?}", outcome.filename),
            Err(e) if e.is_cancelled() => log::info!("🛑 Download cancelled: {}", options.url),
            Err(e) => log::error!("❌ Download failed ({}): {}", e.subcategory(), e),
        }
        guard.finish(&result);
        result
    }

    async fn run_download<F>(
        &self,
        guard: &OperationGuard,
        options: &DownloadOptions,
        mut on_progress: F,
    ) -> AppResult<DownloadOutcome>
    where
        F: FnMut(FetchProgress),
    {
        fs_err::tokio::create_dir_all(&options.output_dir).await?;

        let source = self.cookie_source();
        let args = self.download_args(options, &source);
        log::info!("📥 Downloading {} into {}", options.url, options.output_dir.display());

        let mut process = self.runner.spawn(&self.ytdlp, &args)?;
        guard.attach(process.handle());

        let mut state = RunState::default();
        while let Some(event) = process.next_event().await {
            match event {
                ProcessEvent::Stdout(line) => {
                    if let Some(progress) = state.apply(&line) {
                        on_progress(progress);
                    }
                }
                ProcessEvent::Stderr(line) => log::debug!("yt-dlp stderr: {}", line),
            }
        }
        let outcome = process.wait().await?;
        guard.detach();

        if outcome.success() {
            return Ok(DownloadOutcome {
                filename: state.filename,
                already_downloaded: state.already_downloaded,
            });
        }

        if outcome.was_cancelled() || guard.is_cancel_requested() {
            remove_partials(&state).await;
            return Err(AppError::Cancelled);
        }

        let fallback = ytdlp::first_error_line(&outcome.stderr_text())
            .map(str::to_string)
            .unwrap_or_else(|| "Download failed".to_string());
        Err(fetch_failure(&outcome, &source, fallback))
    }

    /// Terminates the running download. Idempotent.
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }
}

/// Maps a failed yt-dlp run to `NonZeroExit`, with a friendly message for known causes.
fn fetch_failure(outcome: &ProcessOutcome, source: &CookieSource, fallback: String) -> AppError {
    let kind = ytdlp::analyze_ytdlp_error(&outcome.stderr_text());
    let message = match kind {
        YtDlpErrorType::Unknown => fallback,
        known => ytdlp::get_error_message(known, source.browser()),
    };
    AppError::NonZeroExit {
        tool: "yt-dlp".to_string(),
        code: outcome.code(),
        kind: (kind != YtDlpErrorType::Unknown).then_some(kind),
        message,
    }
}

/// Removes files announced during a cancelled run, with their `.part`/`.ytdl` companions.
async fn remove_partials(state: &RunState) {
    if state.already_downloaded {
        return;
    }
    for dest in &state.destinations {
        let mut candidates = vec![PathBuf::from(dest)];
        candidates.extend(PARTIAL_SUFFIXES.iter().map(|suffix| PathBuf::from(format!("{dest}{suffix}"))));
        for path in candidates {
            match fs_err::tokio::remove_file(&path).await {
                Ok(()) => log::debug!("Removed partial download {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}
