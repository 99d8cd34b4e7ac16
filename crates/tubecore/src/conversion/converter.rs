use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::watch;

use crate::conversion::formats::{encode_args, Preset, TargetFormat};
use crate::conversion::output::generate_output_path;
use crate::core::error::{AppError, AppResult};
use crate::core::operation::{OperationGuard, OperationSlot, OperationState};
use crate::core::process::{ProcessEvent, ProcessRunner};
use crate::media::MediaProbe;
use crate::parsing::ffmpeg;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: TargetFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub input: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub successes: Vec<ConversionResult>,
    pub failures: Vec<BatchFailure>,
    /// The batch stopped early on request
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    /// 1-based
    pub file_index: usize,
    pub total_files: usize,
    pub file_name: String,
    pub file_percent: f64,
    pub overall_percent: f64,
}

/// Per-item notification of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemComplete {
    /// 1-based
    pub file_index: usize,
    pub total_files: usize,
    pub input: PathBuf,
    pub result: Result<ConversionResult, String>,
}

/// ffmpeg transcoding. One conversion (or batch) at a time.
#[derive(Debug, Clone)]
pub struct ConvertPipeline {
    ffmpeg: PathBuf,
    runner: ProcessRunner,
    probe: MediaProbe,
    slot: OperationSlot,
}

impl ConvertPipeline {
    pub fn new(ffmpeg: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        let ffmpeg = ffmpeg.into();
        Self {
            probe: MediaProbe::new(ffmpeg.clone(), runner.clone()),
            ffmpeg,
            runner,
            slot: OperationSlot::new("conversion"),
        }
    }

    pub fn state(&self) -> OperationState {
        self.slot.state()
    }

    /// Converts one file next to itself. `on_progress` receives percentages
    /// capped at 99 while ffmpeg runs and a final 100 on success.
    pub async fn convert_one<F>(
        &self,
        input: &Path,
        format: TargetFormat,
        preset: Preset,
        mut on_progress: F,
    ) -> AppResult<ConversionResult>
    where
        F: FnMut(f64),
    {
        let guard = self.slot.begin()?;
        let result = self.convert_in_slot(&guard, input, format, preset, &mut on_progress).await;
        guard.finish(&result);
        result
    }

    /// Converts `inputs` one after another. Failures are collected, not
    /// propagated; a cancel stops the batch before the next item.
    pub async fn convert_batch<P, I>(
        &self,
        inputs: &[PathBuf],
        format: TargetFormat,
        preset: Preset,
        mut on_progress: P,
        mut on_item_complete: I,
    ) -> AppResult<BatchResult>
    where
        P: FnMut(BatchProgress),
        I: FnMut(ItemComplete),
    {
        let guard = self.slot.begin()?;
        let total = inputs.len();
        let mut batch = BatchResult::default();
        log::info!("🎞️ Batch conversion of {} file(s) to {} ({})", total, format, preset);

        for (i, input) in inputs.iter().enumerate() {
            if guard.is_cancel_requested() {
                batch.cancelled = true;
                break;
            }

            let file_name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut item_progress = |percent: f64| {
                on_progress(BatchProgress {
                    file_index: i + 1,
                    total_files: total,
                    file_name: file_name.clone(),
                    file_percent: percent,
                    overall_percent: overall_percent(i, percent, total),
                })
            };

            let result = self
                .convert_in_slot(&guard, input, format, preset, &mut item_progress)
                .await;
            let reported = match result {
                Ok(success) => {
                    batch.successes.push(success.clone());
                    Ok(success)
                }
                Err(e) => {
                    log::warn!("Batch item {} failed: {}", input.display(), e);
                    batch.failures.push(BatchFailure {
                        input: input.clone(),
                        error: e.to_string(),
                    });
                    Err(e.to_string())
                }
            };
            on_item_complete(ItemComplete {
                file_index: i + 1,
                total_files: total,
                input: input.clone(),
                result: reported,
            });
        }

        if guard.is_cancel_requested() {
            batch.cancelled = true;
        }
        log::info!(
            "Batch finished: {} converted, {} failed{}",
            batch.successes.len(),
            batch.failures.len(),
            if batch.cancelled { " (cancelled)" } else { "" }
        );

        if batch.cancelled {
            guard.finish(&Err::<(), _>(AppError::Cancelled));
        } else {
            guard.finish(&Ok::<_, AppError>(()));
        }
        Ok(batch)
    }

    /// Flags the running conversion (or batch) as cancelled and terminates ffmpeg.
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    async fn convert_in_slot<F>(
        &self,
        guard: &OperationGuard,
        input: &Path,
        format: TargetFormat,
        preset: Preset,
        on_progress: &mut F,
    ) -> AppResult<ConversionResult>
    where
        F: FnMut(f64),
    {
        match fs_err::tokio::metadata(input).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::InputNotFound(input.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }

        let output = generate_output_path(input, format);
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            input.as_os_str().to_os_string(),
            "-y".into(),
            "-progress".into(),
            "pipe:1".into(),
            "-nostats".into(),
        ];
        args.extend(encode_args(format, preset).into_iter().map(OsString::from));
        args.push(output.clone().into_os_string());

        log::info!("🔄 Converting {} -> {}", input.display(), output.display());

        let (duration_tx, duration_rx) = watch::channel(None::<f64>);
        let probe = async move {
            match self.probe.inspect(input).await {
                Ok(info) if info.duration > 0.0 => {
                    let _ = duration_tx.send(Some(info.duration));
                }
                Ok(_) => log::debug!("No duration for {}; progress disabled", input.display()),
                Err(e) => log::warn!("Probe of {} failed, progress disabled: {}", input.display(), e),
            }
        };
        let ((), result) = tokio::join!(probe, self.transcode(guard, &args, &duration_rx, on_progress));

        match result {
            Ok(()) => {
                on_progress(100.0);
                log::info!("✅ Converted {}", output.display());
                Ok(ConversionResult {
                    input: input.to_path_buf(),
                    output,
                    format,
                })
            }
            Err(e) => {
                remove_output(&output).await;
                Err(e)
            }
        }
    }

    async fn transcode<F>(
        &self,
        guard: &OperationGuard,
        args: &[OsString],
        duration: &watch::Receiver<Option<f64>>,
        on_progress: &mut F,
    ) -> AppResult<()>
    where
        F: FnMut(f64),
    {
        let mut process = self.runner.spawn(&self.ffmpeg, args)?;
        guard.attach(process.handle());

        let mut last_percent: Option<f64> = None;
        while let Some(event) = process.next_event().await {
            match event {
                ProcessEvent::Stdout(line) => {
                    let Some(out_time) = ffmpeg::parse_out_time_us(&line) else {
                        continue;
                    };
                    let Some(total) = *duration.borrow() else {
                        continue;
                    };
                    if let Some(percent) = ffmpeg::progress_percent(out_time, total) {
                        if last_percent.map_or(true, |last| percent > last) {
                            last_percent = Some(percent);
                            on_progress(percent);
                        }
                    }
                }
                ProcessEvent::Stderr(line) => log::debug!("ffmpeg: {}", line),
            }
        }
        let outcome = process.wait().await?;
        guard.detach();

        if outcome.success() {
            Ok(())
        } else if outcome.was_cancelled() || guard.is_cancel_requested() {
            Err(AppError::Cancelled)
        } else {
            let code = outcome
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            Err(AppError::NonZeroExit {
                tool: "ffmpeg".to_string(),
                code: outcome.code(),
                kind: None,
                message: format!("Conversion failed (code: {code})"),
            })
        }
    }
}

fn overall_percent(index: usize, file_percent: f64, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (((index as f64 + file_percent / 100.0) / total as f64) * 100.0).round()
}

async fn remove_output(path: &Path) {
    match fs_err::tokio::remove_file(path).await {
        Ok(()) => log::debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}
