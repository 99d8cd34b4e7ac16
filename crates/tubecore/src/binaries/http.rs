//! Streamed HTTP downloads with explicit redirect handling

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// HTTP client for binary downloads and release metadata.
///
/// Redirects are followed by hand so that every hop can clear the partial
/// file and the hop count stays bounded.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    max_redirects: usize,
}

impl Downloader {
    pub fn new() -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(config::network::USER_AGENT)
            .connect_timeout(config::network::connect_timeout())
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            max_redirects: config::network::MAX_REDIRECTS,
        })
    }

    /// Downloads `url` to `dest`, reporting whole percentages.
    ///
    /// Bytes go to `<dest>.download` and are renamed into place on success.
    /// The partial file is removed on every failure path. Without a
    /// Content-Length no progress is reported.
    pub async fn download_file<F>(&self, url: &str, dest: &Path, mut on_progress: F) -> AppResult<()>
    where
        F: FnMut(u8),
    {
        let partial = partial_path(dest);
        remove_if_exists(&partial).await;

        let mut current = Url::parse(url)?;
        for hop in 0..=self.max_redirects {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if is_followed_redirect(status) {
                remove_if_exists(&partial).await;
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| AppError::Parse(format!("{} redirect from {} without Location", status, current)))?;
                let next = current.join(location)?;
                log::debug!("↪️  Redirect {} ({}): {} -> {}", hop + 1, status.as_u16(), current, next);
                current = next;
                continue;
            }

            if !status.is_success() {
                remove_if_exists(&partial).await;
                log::warn!("Download of {} failed with HTTP {}", current, status);
                return Err(AppError::HttpStatus(status));
            }

            let total = response.content_length().filter(|len| *len > 0);
            let mut stream = response.bytes_stream();

            let written: AppResult<u64> = async {
                let mut file = fs_err::tokio::File::create(&partial).await?;
                let mut received: u64 = 0;
                let mut last_percent: Option<u8> = None;

                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    file.write_all(&chunk).await?;
                    received += chunk.len() as u64;

                    if let Some(total) = total {
                        let percent = ((received as f64 / total as f64) * 100.0).round().min(100.0) as u8;
                        if last_percent.map_or(true, |last| percent > last) {
                            last_percent = Some(percent);
                            on_progress(percent);
                        }
                    }
                }

                file.flush().await?;
                Ok(received)
            }
            .await;

            let received = match written {
                Ok(received) => received,
                Err(e) => {
                    remove_if_exists(&partial).await;
                    return Err(e);
                }
            };

            if let Err(e) = fs_err::tokio::rename(&partial, dest).await {
                remove_if_exists(&partial).await;
                return Err(e.into());
            }
            log::info!(
                "✅ Downloaded {} ({:.2} MB) -> {}",
                current,
                received as f64 / (1024.0 * 1024.0),
                dest.display()
            );
            return Ok(());
        }

        remove_if_exists(&partial).await;
        Err(AppError::TooManyRedirects(self.max_redirects))
    }

    /// GET a JSON document (release metadata)
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(config::network::release_check_timeout())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus(status));
        }
        Ok(response.json::<T>().await?)
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".download");
    dest.with_file_name(name)
}

async fn remove_if_exists(path: &Path) {
    match fs_err::tokio::remove_file(path).await {
        Ok(()) => log::debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}
