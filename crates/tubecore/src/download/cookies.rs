//! YouTube cookie file management for yt-dlp
//!
//! This module provides functionality to:
//! - Read and write the Netscape cookie file (`--cookies`)
//! - Summarize it for the status watcher
//! - Pick the cookie source for a yt-dlp invocation

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{AppError, AppResult};
use crate::core::paths::AppPaths;

pub const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

const FILE_HEADER: [&str; 3] = [
    NETSCAPE_HEADER,
    "# https://curl.haxx.se/rfc/cookie_spec.html",
    "# This file was synced by TubeDeck",
];

/// Curl marks HttpOnly cookies by prefixing the domain with this comment tag
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Cookies that prove a signed-in Google session
pub const LOGIN_COOKIE_NAMES: [&str; 5] = ["SID", "SSID", "LOGIN_INFO", "__Secure-1PSID", "__Secure-3PSID"];

const SESSION_DOMAINS: [&str; 2] = [".youtube.com", ".google.com"];

/// Browsers yt-dlp can read cookies from
pub const SUPPORTED_BROWSERS: [&str; 6] = ["chrome", "firefox", "edge", "brave", "opera", "chromium"];

/// One cookie in Netscape format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    /// Unix seconds, 0 for session cookies
    #[serde(default)]
    pub expiration: i64,
    pub name: String,
    #[serde(default)]
    pub value: String,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl CookieRecord {
    /// Tab-separated line: domain, subdomain flag, path, secure, expiration, name, value.
    ///
    /// The domain gets a leading dot, an empty path becomes `/` and negative
    /// expirations become 0. Records without a name or domain yield `None`.
    pub fn to_netscape_line(&self) -> Option<String> {
        if self.name.is_empty() || self.domain.is_empty() {
            return None;
        }

        let domain = if self.domain.starts_with('.') {
            self.domain.clone()
        } else {
            format!(".{}", self.domain)
        };
        let path = if self.path.is_empty() { "/" } else { self.path.as_str() };

        Some(format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            domain,
            netscape_bool(domain.starts_with('.')),
            path,
            netscape_bool(self.secure),
            self.expiration.max(0),
            self.name,
            self.value
        ))
    }

    /// Parses a data line. Comments, blank lines and short lines yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let line = line.strip_prefix(HTTP_ONLY_PREFIX).unwrap_or(line);
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 7 {
            return None;
        }

        Some(Self {
            domain: parts[0].to_string(),
            path: parts[2].to_string(),
            secure: parts[3].eq_ignore_ascii_case("TRUE"),
            expiration: parts[4].parse().unwrap_or(0),
            name: parts[5].to_string(),
            value: parts[6].to_string(),
        })
    }

    pub fn is_login_cookie(&self) -> bool {
        LOGIN_COOKIE_NAMES.contains(&self.name.as_str())
    }

    fn is_session_domain(&self) -> bool {
        SESSION_DOMAINS.iter().any(|d| self.domain.ends_with(d))
    }
}

fn netscape_bool(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// All data lines of a Netscape file
pub fn parse_netscape(content: &str) -> Vec<CookieRecord> {
    content.lines().filter_map(CookieRecord::parse_line).collect()
}

/// Summary of the cookie file, as reported to the UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CookieStatus {
    /// The file holds YouTube or Google cookies
    pub has_cookies: bool,
    pub has_login_cookies: bool,
    pub cookie_count: usize,
    pub last_modified: Option<DateTime<Utc>>,
}

impl CookieStatus {
    /// Cookies outside `.youtube.com` / `.google.com` make the file count as empty.
    pub fn from_content(content: &str, last_modified: Option<DateTime<Utc>>) -> Self {
        let records = parse_netscape(content);
        if !records.iter().any(CookieRecord::is_session_domain) {
            return Self {
                last_modified,
                ..Self::default()
            };
        }

        Self {
            has_cookies: true,
            has_login_cookies: records.iter().any(CookieRecord::is_login_cookie),
            cookie_count: records.len(),
            last_modified,
        }
    }
}

/// Where yt-dlp gets its cookies from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieSource {
    File(PathBuf),
    Browser(String),
    None,
}

impl CookieSource {
    /// Synced file first, then the configured browser; `none` disables the browser.
    pub fn resolve(store: &CookieStore, browser: Option<&str>) -> Self {
        if let Some(file) = store.cookie_file() {
            return CookieSource::File(file);
        }
        match browser.map(str::trim) {
            Some(b) if !b.is_empty() && !b.eq_ignore_ascii_case("none") => CookieSource::Browser(b.to_lowercase()),
            _ => CookieSource::None,
        }
    }

    pub fn args(&self) -> Vec<OsString> {
        match self {
            CookieSource::File(path) => vec!["--cookies".into(), path.clone().into_os_string()],
            CookieSource::Browser(browser) => vec!["--cookies-from-browser".into(), browser.into()],
            CookieSource::None => Vec::new(),
        }
    }

    pub fn browser(&self) -> Option<&str> {
        match self {
            CookieSource::Browser(b) => Some(b),
            _ => None,
        }
    }
}

/// The single synced cookie file
#[derive(Debug, Clone)]
pub struct CookieStore {
    file: PathBuf,
}

impl CookieStore {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn from_paths(paths: &AppPaths) -> Self {
        Self::new(paths.cookie_file())
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Path for `--cookies`, if the file exists
    pub fn cookie_file(&self) -> Option<PathBuf> {
        self.file.exists().then(|| self.file.clone())
    }

    pub async fn status(&self) -> CookieStatus {
        let content = match fs_err::tokio::read_to_string(&self.file).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to read cookie file: {}", e);
                }
                return CookieStatus::default();
            }
        };
        let last_modified = fs_err::tokio::metadata(&self.file)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);
        CookieStatus::from_content(&content, last_modified)
    }

    pub async fn load(&self) -> AppResult<Vec<CookieRecord>> {
        let content = fs_err::tokio::read_to_string(&self.file).await?;
        Ok(parse_netscape(&content))
    }

    /// Overwrites the file with `records`. Returns the number of lines written.
    pub async fn save(&self, records: &[CookieRecord]) -> AppResult<usize> {
        let mut lines: Vec<String> = FILE_HEADER.iter().map(|l| l.to_string()).collect();
        lines.push(String::new());

        let before = lines.len();
        lines.extend(records.iter().filter_map(CookieRecord::to_netscape_line));
        let written = lines.len() - before;
        if written < records.len() {
            log::debug!("Skipped {} cookies without name or domain", records.len() - written);
        }

        self.write_atomic(&lines.join("\n")).await?;
        log::info!("🍪 Saved {} cookies to {}", written, self.file.display());
        Ok(written)
    }

    /// Replaces the file with exported Netscape content. Returns the cookie count.
    pub async fn import(&self, content: &str) -> AppResult<usize> {
        if !content.contains(NETSCAPE_HEADER) && !content.contains(".youtube.com") {
            return Err(AppError::Validation(
                "Invalid cookies format. Expected Netscape HTTP Cookie File format with youtube.com entries".to_string(),
            ));
        }

        self.write_atomic(content).await?;
        let count = parse_netscape(content).len();
        log::info!("🍪 Imported {} cookies into {}", count, self.file.display());
        Ok(count)
    }

    /// Returns whether a file was removed
    pub async fn delete(&self) -> AppResult<bool> {
        match fs_err::tokio::remove_file(&self.file).await {
            Ok(()) => {
                log::info!("🗑️  Deleted cookie file {}", self.file.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(&self, content: &str) -> AppResult<()> {
        if let Some(dir) = self.file.parent() {
            fs_err::tokio::create_dir_all(dir).await?;
        }

        let mut temp_name = self.file.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        temp_name.push(format!(".tmp.{}", std::process::id()));
        let temp_path = self.file.with_file_name(temp_name);

        fs_err::tokio::write(&temp_path, content).await?;
        if let Err(e) = fs_err::tokio::rename(&temp_path, &self.file).await {
            let _ = fs_err::tokio::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(domain: &str, name: &str) -> CookieRecord {
        CookieRecord {
            domain: domain.to_string(),
            path: "/".to_string(),
            secure: true,
            expiration: 1_900_000_000,
            name: name.to_string(),
            value: "v".to_string(),
        }
    }

    #[test]
    fn test_line_normalization() {
        let mut cookie = record("youtube.com", "SID");
        cookie.path = String::new();
        cookie.expiration = -5;
        assert_eq!(
            cookie.to_netscape_line().unwrap(),
            ".youtube.com\tTRUE\t/\tTRUE\t0\tSID\tv"
        );

        assert_eq!(record("", "SID").to_netscape_line(), None);
        assert_eq!(record(".youtube.com", "").to_netscape_line(), None);
    }

    #[test]
    fn test_parse_line() {
        let parsed = CookieRecord::parse_line(".youtube.com\tTRUE\t/\tFALSE\t1700000000\tPREF\tf6=40000000").unwrap();
        assert_eq!(parsed.domain, ".youtube.com");
        assert!(!parsed.secure);
        assert_eq!(parsed.expiration, 1_700_000_000);
        assert_eq!(parsed.value, "f6=40000000");

        let http_only = CookieRecord::parse_line("#HttpOnly_.youtube.com\tTRUE\t/\tTRUE\t0\tLOGIN_INFO\tx").unwrap();
        assert!(http_only.is_login_cookie());

        assert_eq!(CookieRecord::parse_line("# Netscape HTTP Cookie File"), None);
        assert_eq!(CookieRecord::parse_line(""), None);
        assert_eq!(CookieRecord::parse_line(".youtube.com\tTRUE\t/"), None);
    }

    #[test]
    fn test_status_from_content() {
        let content = "# Netscape HTTP Cookie File\n\n.youtube.com\tTRUE\t/\tTRUE\t0\tPREF\ta\n.google.com\tTRUE\t/\tTRUE\t0\tSID\tb\n";
        let status = CookieStatus::from_content(content, None);
        assert_eq!(
            status,
            CookieStatus {
                has_cookies: true,
                has_login_cookies: true,
                cookie_count: 2,
                last_modified: None
            }
        );

        let foreign = ".example.com\tTRUE\t/\tFALSE\t0\tSID\tb\n";
        assert_eq!(CookieStatus::from_content(foreign, None), CookieStatus::default());

        let no_login = ".youtube.com\tTRUE\t/\tTRUE\t0\tPREF\ta\n";
        let status = CookieStatus::from_content(no_login, None);
        assert!(status.has_cookies);
        assert!(!status.has_login_cookies);
    }

    #[tokio::test]
    async fn save_overwrites_with_header() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CookieStore::new(tmp.path().join("cookies").join("youtube_cookies.txt"));

        store.save(&[record("youtube.com", "SID"), record("google.com", "SSID")]).await.unwrap();
        let written = store.save(&[record("youtube.com", "PREF"), record("", "bad")]).await.unwrap();
        assert_eq!(written, 1);

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("# Netscape HTTP Cookie File\n"));
        assert!(!content.contains("SSID"));
        assert_eq!(store.load().await.unwrap().len(), 1);
        assert_eq!(store.load().await.unwrap()[0].domain, ".youtube.com");
    }

    #[tokio::test]
    async fn import_validates_and_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CookieStore::new(tmp.path().join("youtube_cookies.txt"));

        let err = store.import("name=value; other=1").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.cookie_file().is_none());

        let count = store
            .import(".youtube.com\tTRUE\t/\tTRUE\t0\tSID\ta\n.youtube.com\tTRUE\t/\tTRUE\t0\tHSID\tb\n")
            .await
            .unwrap();
        assert_eq!(count, 2);

        let status = store.status().await;
        assert!(status.has_login_cookies);
        assert!(status.last_modified.is_some());
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CookieStore::new(tmp.path().join("youtube_cookies.txt"));
        assert!(!store.delete().await.unwrap());

        store.save(&[record("youtube.com", "SID")]).await.unwrap();
        assert!(store.delete().await.unwrap());
        assert_eq!(store.status().await, CookieStatus::default());
    }

    #[test]
    fn cookie_source_priority() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CookieStore::new(tmp.path().join("youtube_cookies.txt"));

        assert_eq!(CookieSource::resolve(&store, Some("Firefox")), CookieSource::Browser("firefox".into()));
        assert_eq!(CookieSource::resolve(&store, Some("none")), CookieSource::None);
        assert_eq!(CookieSource::resolve(&store, None), CookieSource::None);
        assert!(CookieSource::None.args().is_empty());

        std::fs::write(store.path(), NETSCAPE_HEADER).unwrap();
        let source = CookieSource::resolve(&store, Some("chrome"));
        assert_eq!(source, CookieSource::File(store.path().to_path_buf()));
        assert_eq!(source.args()[0], OsString::from("--cookies"));
        assert_eq!(source.browser(), None);
    }
}
