use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;

use tubecore::binaries::{BinaryKind, DownloadPhase, DownloadProgressEvent, ReadinessReport};
use tubecore::conversion::{supported_formats, Preset, TargetFormat};
use tubecore::core::{config, init_logger, log_tools_configuration};
use tubecore::download::{DownloadOptions, FetchProgress, FetchStatus};
use tubecore::media::MediaKind;
use tubecore::watcher::StatusChange;
use tubecore::TubeDeck;

mod cli;

use cli::{Cli, Commands, CookieAction};

/// Entry point of the tubedeck command line front end
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    let cli = Cli::parse_args();
    init_logger(&config::LOG_FILE_PATH, cli.verbose)?;
    log::info!("🚀 tubedeck {} starting", env!("CARGO_PKG_VERSION"));

    let deck = TubeDeck::from_env()?;
    deck.paths().ensure_dirs()?;
    log_tools_configuration(deck.paths());

    match cli.command {
        Commands::Status => run_status(&deck).await,
        Commands::Install { force } => run_install(&deck, force).await,
        Commands::CheckUpdate => run_check_update(&deck).await,
        Commands::Update => run_update(&deck).await,
        Commands::Probe { file } => run_probe(&deck, &file).await,
        Commands::Info { url, json } => run_info(&deck, &url, json).await,
        Commands::Download {
            url,
            format,
            audio_only,
            output,
        } => run_download(&deck, url, format, audio_only, output).await,
        Commands::Convert { files, to, preset } => run_convert(&deck, files, &to, &preset).await,
        Commands::Formats => {
            print_formats();
            Ok(())
        }
        Commands::Cookies { action } => run_cookies(&deck, action).await,
        Commands::Watch => run_watch(&deck).await,
    }
}

fn print_readiness(report: &ReadinessReport) {
    for kind in BinaryKind::ALL {
        let status = report.status(kind);
        let state = match (status.exists, status.version.as_deref()) {
            (false, _) => "missing".to_string(),
            (true, None) => "present, not runnable".to_string(),
            (true, Some(version)) => version.to_string(),
        };
        println!("  {:<8} {}", kind.to_string(), state);
    }
    println!("Ready: {}", if report.ready { "yes" } else { "no" });
}

fn print_install_progress(event: DownloadProgressEvent) {
    let label = match event.phase {
        DownloadPhase::Downloading => "downloading",
        DownloadPhase::Extracting => "extracting",
        DownloadPhase::Complete => "done",
    };
    print!("\r  {:<8} {:>3}% {:<12}", event.step.to_string(), event.percent, label);
    if event.phase == DownloadPhase::Complete {
        println!();
    }
    let _ = std::io::stdout().flush();
}

async fn run_status(deck: &TubeDeck) -> Result<()> {
    println!("Binaries in {}", deck.paths().bin_dir().display());
    print_readiness(&deck.readiness().await);
    Ok(())
}

async fn run_install(deck: &TubeDeck, force: bool) -> Result<()> {
    let report = if force {
        deck.install_binaries(print_install_progress).await?
    } else {
        deck.prepare(print_install_progress).await?
    };
    print_readiness(&report);
    Ok(())
}

async fn run_check_update(deck: &TubeDeck) -> Result<()> {
    let check = deck.check_update().await?;
    println!(
        "yt-dlp installed: {}, latest: {}",
        check.current_version.as_deref().unwrap_or("unknown"),
        check.latest_version
    );
    if check.needs_update {
        println!("Update available, run `tubedeck update`");
    } else {
        println!("Up to date");
    }
    Ok(())
}

async fn run_update(deck: &TubeDeck) -> Result<()> {
    let version = deck.update_ytdlp(print_install_progress).await?;
    println!("yt-dlp updated to {}", version);
    Ok(())
}

async fn run_probe(deck: &TubeDeck, file: &Path) -> Result<()> {
    let info = deck.probe(file).await?;
    println!("{}", info.file_name);
    println!("  type:     {}", info.media_type);
    println!("  size:     {}", info.size_formatted);
    println!("  duration: {}", info.duration_formatted);
    if let Some(video) = &info.video {
        println!("  video:    {} {}x{}", video.codec, video.width, video.height);
    }
    if let Some(audio) = &info.audio {
        println!("  audio:    {} {} Hz", audio.codec, audio.sample_rate);
    }
    if let Some(bitrate) = info.bitrate_kbps {
        println!("  bitrate:  {} kb/s", bitrate);
    }
    let targets: Vec<String> = supported_formats(info.media_type).iter().map(|f| f.to_string()).collect();
    println!("  convert:  {}", targets.join(", "));
    Ok(())
}

async fn run_info(deck: &TubeDeck, url: &str, json: bool) -> Result<()> {
    let meta = deck.metadata(url).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }

    println!("{}", meta.title);
    if let Some(uploader) = &meta.uploader {
        println!("  by {}", uploader);
    }
    if let Some(duration) = meta.duration {
        println!("  duration: {}", tubecore::core::utils::format_duration(duration as u64));
    }
    println!("Video:");
    for f in &meta.formats.video {
        println!("  {:<10} {}", f.quality, f.format_id);
    }
    println!("Audio:");
    for f in &meta.formats.audio {
        let size = f
            .filesize
            .map(tubecore::core::utils::format_file_size)
            .unwrap_or_default();
        println!("  {:<10} {:<6} {:<5} {}", f.quality, f.format_id, f.ext, size);
    }
    Ok(())
}

/// Calls `cancel` on the first Ctrl-C. Abort the returned task once the work is done.
fn cancel_on_ctrl_c(cancel: impl FnOnce() -> bool + Send + 'static) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            cancel();
        }
    })
}

async fn run_download(
    deck: &TubeDeck,
    url: String,
    format: Option<String>,
    audio_only: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let options = DownloadOptions {
        url,
        format_id: format,
        audio_only,
        output_dir: output.unwrap_or_else(|| PathBuf::from(config::DOWNLOAD_FOLDER.as_str())),
    };

    let canceller = deck.clone();
    let ctrl_c = cancel_on_ctrl_c(move || canceller.cancel_download());

    let result = deck
        .download(&options, |p: FetchProgress| {
            match p.status {
                FetchStatus::Downloading => print!(
                    "\r  {:>5.1}%  {:>12}  ETA {:<8}",
                    p.percent,
                    p.speed.as_deref().unwrap_or("-"),
                    p.eta.as_deref().unwrap_or("-")
                ),
                FetchStatus::Processing => print!("\r  processing...{:<24}", ""),
            }
            let _ = std::io::stdout().flush();
        })
        .await;
    ctrl_c.abort();
    println!();

    match result {
        Ok(outcome) => {
            let file = outcome.filename.as_deref().unwrap_or("(unknown file)");
            if outcome.already_downloaded {
                println!("Already downloaded: {}", file);
            } else {
                println!("Saved: {}", file);
            }
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("Download cancelled");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_convert(deck: &TubeDeck, files: Vec<PathBuf>, to: &str, preset: &str) -> Result<()> {
    let format = TargetFormat::parse(to)?;
    let preset: Preset = preset
        .parse()
        .with_context(|| format!("unknown preset '{}', use fast, balanced or quality", preset))?;

    let canceller = deck.clone();
    let ctrl_c = cancel_on_ctrl_c(move || canceller.cancel_conversion());

    let result = deck
        .convert_batch(
            &files,
            format,
            preset,
            |p| {
                print!(
                    "\r  [{}/{}] {:<32} {:>5.1}%  total {:>3}%",
                    p.file_index, p.total_files, p.file_name, p.file_percent, p.overall_percent
                );
                let _ = std::io::stdout().flush();
            },
            |item| match &item.result {
                Ok(done) => println!("\r  ✅ {}", done.output.display()),
                Err(e) => println!("\r  ❌ {}: {}", item.input.display(), e),
            },
            |batch| {
                println!(
                    "Converted {}, failed {}{}",
                    batch.successes.len(),
                    batch.failures.len(),
                    if batch.cancelled { " (cancelled)" } else { "" }
                )
            },
        )
        .await;
    ctrl_c.abort();

    let batch = result?;
    if batch.failures.is_empty() || batch.cancelled {
        Ok(())
    } else {
        anyhow::bail!("{} file(s) failed to convert", batch.failures.len())
    }
}

fn print_formats() {
    println!("Video targets:");
    for f in TargetFormat::ALL.iter().filter(|f| f.media_kind() == MediaKind::Video) {
        println!("  {:<5} {}", f.to_string(), f.codec());
    }
    println!("Audio targets:");
    for f in TargetFormat::ALL.iter().filter(|f| f.media_kind() == MediaKind::Audio) {
        println!("  {:<5} {}", f.to_string(), f.codec());
    }
    println!("Presets:");
    for p in [Preset::Fast, Preset::Balanced, Preset::Quality] {
        println!("  {:<9} crf {} / {} / audio {}", p.to_string(), p.crf(), p.speed(), p.audio_bitrate());
    }
}

async fn run_cookies(deck: &TubeDeck, action: CookieAction) -> Result<()> {
    match action {
        CookieAction::Status => {
            let status = deck.cookie_status().await;
            println!("Cookie file: {}", deck.cookie_store().path().display());
            println!("  cookies:       {}", status.cookie_count);
            println!("  youtube/google: {}", if status.has_cookies { "yes" } else { "no" });
            println!("  logged in:     {}", if status.has_login_cookies { "yes" } else { "no" });
            if let Some(modified) = status.last_modified {
                println!("  updated:       {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        CookieAction::Import { file } => {
            let content = fs_err::tokio::read_to_string(&file).await?;
            let count = deck.import_cookies(&content).await?;
            println!("Imported {} cookies", count);
        }
        CookieAction::Delete => {
            if deck.delete_cookies().await? {
                println!("Cookie file deleted");
            } else {
                println!("No cookie file");
            }
        }
    }
    Ok(())
}

async fn run_watch(deck: &TubeDeck) -> Result<()> {
    let (handle, mut changes) = deck.watch_status();
    println!("Watching {} (Ctrl-C to stop)", deck.paths().root().display());

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Some(StatusChange::Cookies(status)) => println!(
                    "cookies: {} ({} entries, logged in: {})",
                    if status.has_cookies { "present" } else { "none" },
                    status.cookie_count,
                    status.has_login_cookies
                ),
                Some(StatusChange::Binaries(presence)) => println!(
                    "binaries: yt-dlp {}, ffmpeg {}",
                    if presence.ytdlp { "present" } else { "missing" },
                    if presence.ffmpeg { "present" } else { "missing" }
                ),
                None => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}
