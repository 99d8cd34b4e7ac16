//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup report of installed tools and cookie configuration

use simplelog::*;

use crate::binaries::BinaryKind;
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::paths::AppPaths;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `verbose` - Lower both sinks to Debug (spawned command lines, tool stderr)
pub fn init_logger(log_file_path: &str, verbose: bool) -> AppResult<()> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let log_file = fs_err::File::create(log_file_path)?;

    CombinedLogger::init(vec![
        TermLogger::new(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, Config::default(), log_file.into_parts().0),
    ])
    .map_err(|e| AppError::Io(std::io::Error::other(format!("Failed to initialize logger: {}", e))))?;

    Ok(())
}

/// Logs where the tools and cookies are expected at application startup
pub fn log_tools_configuration(paths: &AppPaths) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🧰 Tools Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Binaries directory: {}", paths.bin_dir().display());

    for kind in BinaryKind::ALL {
        let path = paths.binary_path(kind);
        if path.exists() {
            log::info!("✅ {}: {}", kind, path.display());
        } else {
            log::warn!("⚠️  {}: not installed (expected at {})", kind, path.display());
        }
    }

    let cookie_file = paths.cookie_file();
    let browser = config::YTDL_COOKIES_BROWSER.as_str();
    if cookie_file.exists() {
        log::info!("✅ Cookie file: {}", cookie_file.display());
    } else if !browser.is_empty() && browser != "none" {
        log::info!("✅ YTDL_COOKIES_BROWSER: {} (cookies extracted from browser)", browser);
    } else {
        log::warn!("⚠️  No cookies configured; age-restricted videos will fail");
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
