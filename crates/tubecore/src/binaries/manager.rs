//! Readiness checks, install and update of yt-dlp and ffmpeg

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::binaries::http::Downloader;
use crate::binaries::{archive, BinaryKind, BinarySpec, Platform};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::paths::AppPaths;
use crate::core::process::ProcessRunner;
use crate::parsing::{ffmpeg, ytdlp};

/// Share of an archived binary's step spent downloading; extraction starts here.
const ARCHIVE_DOWNLOAD_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryStatus {
    pub exists: bool,
    pub version: Option<String>,
}

impl BinaryStatus {
    fn missing() -> Self {
        Self {
            exists: false,
            version: None,
        }
    }

    fn is_ready(&self) -> bool {
        self.exists && self.version.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub ytdlp: BinaryStatus,
    pub ffmpeg: BinaryStatus,
    /// Both binaries exist and answered the version query
    pub ready: bool,
}

impl ReadinessReport {
    pub fn new(ytdlp: BinaryStatus, ffmpeg: BinaryStatus) -> Self {
        let ready = ytdlp.is_ready() && ffmpeg.is_ready();
        Self { ytdlp, ffmpeg, ready }
    }

    pub fn status(&self, kind: BinaryKind) -> &BinaryStatus {
        match kind {
            BinaryKind::YtDlp => &self.ytdlp,
            BinaryKind::Ffmpeg => &self.ffmpeg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DownloadPhase {
    Downloading,
    Extracting,
    Complete,
}

/// Progress of one install step, percent is monotonic within the step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadProgressEvent {
    pub step: BinaryKind,
    pub percent: u8,
    pub phase: DownloadPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCheck {
    pub needs_update: bool,
    pub current_version: Option<String>,
    pub latest_version: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    tag_name: String,
}

/// Digits of a version string with every separator removed.
pub fn normalize_version(version: &str) -> String {
    version.chars().filter(char::is_ascii_digit).collect()
}

/// Compares digit strings lexicographically.
///
/// Only correct while both versions use equal-width, zero-padded groups
/// (yt-dlp's `YYYY.MM.DD`). `2024.1.5` vs `2024.01.05` compares wrongly.
pub fn is_newer(latest: &str, current: &str) -> bool {
    normalize_version(latest) > normalize_version(current)
}

/// Owns the binaries directory
#[derive(Debug, Clone)]
pub struct BinaryManager {
    paths: AppPaths,
    specs: Vec<BinarySpec>,
    release_url: String,
    runner: ProcessRunner,
    http: Downloader,
}

impl BinaryManager {
    pub fn new(paths: AppPaths) -> AppResult<Self> {
        Self::with_specs(paths, Platform::current().specs(), config::network::YTDLP_RELEASE_URL)
    }

    /// Custom download table and release endpoint
    pub fn with_specs(paths: AppPaths, specs: Vec<BinarySpec>, release_url: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            runner: ProcessRunner::with_search_dir(paths.bin_dir()),
            paths,
            specs,
            release_url: release_url.into(),
            http: Downloader::new()?,
        })
    }

    pub fn binary_path(&self, kind: BinaryKind) -> PathBuf {
        self.spec(kind)
            .map(|spec| self.paths.bin_dir().join(&spec.file_name))
            .unwrap_or_else(|| self.paths.binary_path(kind))
    }

    fn spec(&self, kind: BinaryKind) -> Option<&BinarySpec> {
        self.specs.iter().find(|spec| spec.kind == kind)
    }

    /// Existence plus version query for both binaries. Nothing is repaired.
    pub async fn check_status(&self) -> ReadinessReport {
        let ytdlp = self.status_of(BinaryKind::YtDlp).await;
        let ffmpeg = self.status_of(BinaryKind::Ffmpeg).await;
        let report = ReadinessReport::new(ytdlp, ffmpeg);
        log::debug!("Binary readiness: {:?}", report);
        report
    }

    async fn status_of(&self, kind: BinaryKind) -> BinaryStatus {
        let path = self.binary_path(kind);
        if !path.exists() {
            return BinaryStatus::missing();
        }

        let version = match self
            .runner
            .run_to_completion(&path, [kind.version_flag()], config::process::version_query_timeout())
            .await
        {
            Ok((outcome, stdout)) if outcome.success() => match kind {
                BinaryKind::YtDlp => ytdlp::parse_version(&stdout),
                BinaryKind::Ffmpeg => Some(ffmpeg::parse_version(&stdout).unwrap_or_else(|| "unknown".to_string())),
            },
            Ok((outcome, _)) => {
                log::warn!("⚠️  {} {} exited with {:?}", kind, kind.version_flag(), outcome.exit);
                None
            }
            Err(e) => {
                log::warn!("⚠️  {} exists but could not be run: {}", kind, e);
                None
            }
        };

        BinaryStatus { exists: true, version }
    }

    /// Downloads and installs every binary, one after another.
    pub async fn download_all<F>(&self, mut on_progress: F) -> AppResult<()>
    where
        F: FnMut(DownloadProgressEvent),
    {
        fs_err::tokio::create_dir_all(self.paths.bin_dir()).await?;
        for spec in &self.specs {
            self.install(spec, &mut on_progress).await?;
        }
        log::info!("✅ All binaries installed in {}", self.paths.bin_dir().display());
        Ok(())
    }

    /// First-run helper: returns at once when ready, otherwise installs everything.
    pub async fn check_and_prepare<F>(&self, on_progress: F) -> AppResult<ReadinessReport>
    where
        F: FnMut(DownloadProgressEvent),
    {
        let report = self.check_status().await;
        if report.ready {
            return Ok(report);
        }
        log::info!("📥 Binaries missing, starting download");
        self.download_all(on_progress).await?;
        Ok(self.check_status().await)
    }

    async fn install<F>(&self, spec: &BinarySpec, on_progress: &mut F) -> AppResult<()>
    where
        F: FnMut(DownloadProgressEvent),
    {
        let step = spec.kind;
        let dest = self.binary_path(step);
        let event = |percent: u8, phase: DownloadPhase| DownloadProgressEvent { step, percent, phase };

        log::info!("📥 Downloading {} from {}", step, spec.url);
        on_progress(event(0, DownloadPhase::Downloading));

        match spec.archive {
            None => {
                self.http
                    .download_file(&spec.url, &dest, |p| on_progress(event(p, DownloadPhase::Downloading)))
                    .await?;
            }
            Some(kind) => {
                let archive_path = self.paths.bin_dir().join(kind.download_name());
                self.http
                    .download_file(&spec.url, &archive_path, |p| {
                        let scaled = (f64::from(p) * ARCHIVE_DOWNLOAD_PERCENT / 100.0).round() as u8;
                        on_progress(event(scaled, DownloadPhase::Downloading));
                    })
                    .await?;

                on_progress(event(ARCHIVE_DOWNLOAD_PERCENT as u8, DownloadPhase::Extracting));
                let extracted = archive::extract_binary(&archive_path, kind, &step.to_string(), &dest).await;
                if let Err(e) = fs_err::tokio::remove_file(&archive_path).await {
                    log::warn!("Failed to remove archive {}: {}", archive_path.display(), e);
                }
                extracted?;
            }
        }

        make_executable(&dest).await?;
        on_progress(event(100, DownloadPhase::Complete));
        Ok(())
    }

    /// Compares the installed yt-dlp with the latest release tag.
    /// An installed binary without a readable version always needs an update.
    pub async fn check_update(&self) -> AppResult<UpdateCheck> {
        let current_version = self.status_of(BinaryKind::YtDlp).await.version;
        let release: ReleaseInfo = self.http.fetch_json(&self.release_url).await?;
        let latest_version = release.tag_name.trim().to_string();

        let needs_update = match current_version {
            Some(ref current) => is_newer(&latest_version, current),
            None => true,
        };
        log::info!(
            "🔎 yt-dlp update check: current={:?} latest={} needs_update={}",
            current_version,
            latest_version,
            needs_update
        );

        Ok(UpdateCheck {
            needs_update,
            current_version,
            latest_version,
        })
    }

    /// Replaces yt-dlp with the latest build and returns the new version.
    pub async fn update_ytdlp<F>(&self, mut on_progress: F) -> AppResult<String>
    where
        F: FnMut(DownloadProgressEvent),
    {
        let spec = self
            .spec(BinaryKind::YtDlp)
            .ok_or_else(|| AppError::Validation("no download source for yt-dlp".to_string()))?;
        let path = self.binary_path(BinaryKind::YtDlp);

        match fs_err::tokio::remove_file(&path).await {
            Ok(()) => log::info!("🗑️  Removed old yt-dlp at {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        fs_err::tokio::create_dir_all(self.paths.bin_dir()).await?;
        self.install(spec, &mut on_progress).await?;

        let version = self
            .status_of(BinaryKind::YtDlp)
            .await
            .version
            .ok_or_else(|| AppError::Validation("updated yt-dlp did not report a version".to_string()))?;
        log::info!("✅ yt-dlp updated to {}", version);
        Ok(version)
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs_err::tokio::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> AppResult<()> {
    Ok(())
}
