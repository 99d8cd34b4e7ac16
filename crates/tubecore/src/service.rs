//! TubeDeck facade
//!
//! Bundles the binary manager, probe and both pipelines behind the
//! request/response surface a front end needs. Cheap to clone; clones share
//! the operation slots, so `cancel_*` on one clone stops work started on another.

use std::path::{Path, PathBuf};

use crate::binaries::{BinaryKind, BinaryManager, DownloadProgressEvent, ReadinessReport, UpdateCheck};
use crate::conversion::{BatchProgress, BatchResult, ConversionResult, ConvertPipeline, ItemComplete, Preset, TargetFormat};
use crate::core::config;
use crate::core::error::AppResult;
use crate::core::operation::OperationState;
use crate::core::paths::AppPaths;
use crate::core::process::ProcessRunner;
use crate::download::{
    CookieRecord, CookieStatus, CookieStore, DownloadOptions, DownloadOutcome, FetchPipeline, FetchProgress,
    VideoMetadata,
};
use crate::media::{MediaInfo, MediaProbe};
use crate::watcher::{StatusChange, StatusWatcher, WatcherHandle};

#[derive(Debug, Clone)]
pub struct TubeDeck {
    paths: AppPaths,
    binaries: BinaryManager,
    probe: MediaProbe,
    fetch: FetchPipeline,
    convert: ConvertPipeline,
    cookies: CookieStore,
}

impl TubeDeck {
    /// Locations and cookie browser from the environment
    pub fn from_env() -> AppResult<Self> {
        let browser = Some(config::YTDL_COOKIES_BROWSER.clone()).filter(|b| !b.trim().is_empty());
        Ok(Self::new(AppPaths::from_env())?.with_cookie_browser(browser))
    }

    pub fn new(paths: AppPaths) -> AppResult<Self> {
        let binaries = BinaryManager::new(paths.clone())?;
        Ok(Self::with_manager(paths, binaries))
    }

    /// Uses a preconfigured manager (custom download table, test servers)
    pub fn with_manager(paths: AppPaths, binaries: BinaryManager) -> Self {
        let runner = ProcessRunner::with_search_dir(paths.bin_dir());
        let ytdlp = binaries.binary_path(BinaryKind::YtDlp);
        let ffmpeg = binaries.binary_path(BinaryKind::Ffmpeg);
        let cookies = CookieStore::from_paths(&paths);

        Self {
            probe: MediaProbe::new(ffmpeg.clone(), runner.clone()),
            fetch: FetchPipeline::new(ytdlp, ffmpeg.clone(), runner.clone(), cookies.clone()),
            convert: ConvertPipeline::new(ffmpeg, runner),
            cookies,
            binaries,
            paths,
        }
    }

    pub fn with_cookie_browser(mut self, browser: Option<String>) -> Self {
        self.fetch = self.fetch.with_browser(browser);
        self
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn binary_path(&self, kind: BinaryKind) -> PathBuf {
        self.binaries.binary_path(kind)
    }

    // Binaries

    pub async fn readiness(&self) -> ReadinessReport {
        self.binaries.check_status().await
    }

    /// Downloads both binaries and reports the resulting readiness.
    pub async fn install_binaries<F>(&self, on_progress: F) -> AppResult<ReadinessReport>
    where
        F: FnMut(DownloadProgressEvent),
    {
        self.binaries.download_all(on_progress).await?;
        Ok(self.binaries.check_status().await)
    }

    /// Installs only when something is missing
    pub async fn prepare<F>(&self, on_progress: F) -> AppResult<ReadinessReport>
    where
        F: FnMut(DownloadProgressEvent),
    {
        self.binaries.check_and_prepare(on_progress).await
    }

    pub async fn check_update(&self) -> AppResult<UpdateCheck> {
        self.binaries.check_update().await
    }

    pub async fn update_ytdlp<F>(&self, on_progress: F) -> AppResult<String>
    where
        F: FnMut(DownloadProgressEvent),
    {
        self.binaries.update_ytdlp(on_progress).await
    }

    // Media

    pub async fn probe(&self, path: &Path) -> AppResult<MediaInfo> {
        self.probe.inspect(path).await
    }

    pub async fn metadata(&self, url: &str) -> AppResult<VideoMetadata> {
        self.fetch.get_metadata(url).await
    }

    pub async fn download<F>(&self, options: &DownloadOptions, on_progress: F) -> AppResult<DownloadOutcome>
    where
        F: FnMut(FetchProgress),
    {
        self.fetch.download(options, on_progress).await
    }

    pub fn cancel_download(&self) -> bool {
        self.fetch.cancel()
    }

    pub fn download_state(&self) -> OperationState {
        self.fetch.state()
    }

    pub async fn convert<F>(
        &self,
        input: &Path,
        format: TargetFormat,
        preset: Preset,
        on_progress: F,
    ) -> AppResult<ConversionResult>
    where
        F: FnMut(f64),
    {
        self.convert.convert_one(input, format, preset, on_progress).await
    }

    /// Batch conversion; `on_complete` receives the full result once the batch ends.
    pub async fn convert_batch<P, I, C>(
        &self,
        inputs: &[PathBuf],
        format: TargetFormat,
        preset: Preset,
        on_progress: P,
        on_item_complete: I,
        on_complete: C,
    ) -> AppResult<BatchResult>
    where
        P: FnMut(BatchProgress),
        I: FnMut(ItemComplete),
        C: FnOnce(&BatchResult),
    {
        let result = self
            .convert
            .convert_batch(inputs, format, preset, on_progress, on_item_complete)
            .await?;
        on_complete(&result);
        Ok(result)
    }

    pub fn cancel_conversion(&self) -> bool {
        self.convert.cancel()
    }

    pub fn conversion_state(&self) -> OperationState {
        self.convert.state()
    }

    // Cookies

    pub fn cookie_store(&self) -> &CookieStore {
        &self.cookies
    }

    pub async fn cookie_status(&self) -> CookieStatus {
        self.cookies.status().await
    }

    /// Replaces the cookie file with records synced from a browser
    pub async fn sync_cookies(&self, records: &[CookieRecord]) -> AppResult<usize> {
        self.cookies.save(records).await
    }

    pub async fn import_cookies(&self, content: &str) -> AppResult<usize> {
        self.cookies.import(content).await
    }

    pub async fn delete_cookies(&self) -> AppResult<bool> {
        self.cookies.delete().await
    }

    /// Starts the background status watcher with the configured intervals.
    pub fn watch_status(&self) -> (WatcherHandle, tokio::sync::mpsc::UnboundedReceiver<StatusChange>) {
        StatusWatcher::new(&self.paths).start()
    }
}
