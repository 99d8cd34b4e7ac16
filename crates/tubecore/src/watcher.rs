//! Background change notifications for the binaries and the cookie file
//!
//! The watcher polls cheap filesystem fingerprints and only emits when
//! something actually changed, plus a full refresh on a long period.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::binaries::BinaryKind;
use crate::core::config;
use crate::core::paths::AppPaths;
use crate::download::cookies::{CookieStatus, CookieStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BinaryPresence {
    pub ytdlp: bool,
    pub ffmpeg: bool,
}

impl BinaryPresence {
    pub fn all_present(&self) -> bool {
        self.ytdlp && self.ffmpeg
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "status", rename_all = "lowercase")]
pub enum StatusChange {
    Cookies(CookieStatus),
    Binaries(BinaryPresence),
}

/// Size and mtime; `None` when the file is absent
type Fingerprint = Option<(u64, Option<SystemTime>)>;

async fn fingerprint(path: &Path) -> Fingerprint {
    let metadata = fs_err::tokio::metadata(path).await.ok()?;
    Some((metadata.len(), metadata.modified().ok()))
}

pub struct StatusWatcher {
    binaries: [(BinaryKind, PathBuf); 2],
    cookies: CookieStore,
    poll_interval: Duration,
    refresh_interval: Duration,
}

impl StatusWatcher {
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            binaries: BinaryKind::ALL.map(|kind| (kind, paths.binary_path(kind))),
            cookies: CookieStore::from_paths(paths),
            poll_interval: config::watcher::poll_interval(),
            refresh_interval: config::watcher::refresh_interval(),
        }
    }

    pub fn with_intervals(mut self, poll: Duration, refresh: Duration) -> Self {
        self.poll_interval = poll;
        self.refresh_interval = refresh;
        self
    }

    async fn presence(&self) -> BinaryPresence {
        let mut presence = BinaryPresence {
            ytdlp: false,
            ffmpeg: false,
        };
        for (kind, path) in &self.binaries {
            let exists = fs_err::tokio::metadata(path).await.is_ok();
            match kind {
                BinaryKind::YtDlp => presence.ytdlp = exists,
                BinaryKind::Ffmpeg => presence.ffmpeg = exists,
            }
        }
        presence
    }

    /// Spawns the polling task. Changes arrive on the returned receiver;
    /// the first message is the current cookie status.
    pub fn start(self) -> (WatcherHandle, mpsc::UnboundedReceiver<StatusChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(tx, token.clone()));
        (WatcherHandle { token, task }, rx)
    }

    async fn run(self, tx: mpsc::UnboundedSender<StatusChange>, token: CancellationToken) {
        log::info!(
            "👀 Status watcher started (poll {:?}, refresh {:?})",
            self.poll_interval,
            self.refresh_interval
        );

        let cookie_path = self.cookies.path().to_path_buf();
        let mut cookie_fp = fingerprint(&cookie_path).await;
        let mut presence = self.presence().await;
        if tx.send(StatusChange::Cookies(self.cookies.status().await)).is_err() {
            return;
        }

        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresh = interval_at(Instant::now() + self.refresh_interval, self.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let mut changes = Vec::new();
            tokio::select! {
                _ = token.cancelled() => break,
                _ = poll.tick() => {
                    let fp = fingerprint(&cookie_path).await;
                    if fp != cookie_fp {
                        cookie_fp = fp;
                        log::debug!("Cookie file changed");
                        changes.push(StatusChange::Cookies(self.cookies.status().await));
                    }
                    let current = self.presence().await;
                    if current != presence {
                        presence = current;
                        log::info!("Binary presence changed: {:?}", presence);
                        changes.push(StatusChange::Binaries(presence));
                    }
                }
                _ = refresh.tick() => {
                    cookie_fp = fingerprint(&cookie_path).await;
                    presence = self.presence().await;
                    changes.push(StatusChange::Cookies(self.cookies.status().await));
                    changes.push(StatusChange::Binaries(presence));
                }
            }

            for change in changes {
                if tx.send(change).is_err() {
                    log::debug!("Status receiver dropped, stopping watcher");
                    return;
                }
            }
        }
        log::info!("Status watcher stopped");
    }
}

/// Stops the watcher task
pub struct WatcherHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stops and waits for the task to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            log::warn!("Status watcher task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FAST: Duration = Duration::from_millis(20);
    const NEVER: Duration = Duration::from_secs(3600);

    async fn next(rx: &mut mpsc::UnboundedReceiver<StatusChange>) -> StatusChange {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher timed out")
            .expect("watcher closed")
    }

    #[tokio::test]
    async fn reports_initial_cookies_then_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(tmp.path());
        paths.ensure_dirs().unwrap();

        let (handle, mut rx) = StatusWatcher::new(&paths).with_intervals(FAST, NEVER).start();
        assert_eq!(next(&mut rx).await, StatusChange::Cookies(CookieStatus::default()));

        std::fs::write(paths.binary_path(BinaryKind::YtDlp), b"#!/bin/sh\n").unwrap();
        assert_eq!(
            next(&mut rx).await,
            StatusChange::Binaries(BinaryPresence {
                ytdlp: true,
                ffmpeg: false
            })
        );

        let staged = paths.cookies_dir().join("staged.txt");
        std::fs::write(
            &staged,
            "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc\n",
        )
        .unwrap();
        std::fs::rename(&staged, paths.cookie_file()).unwrap();
        match next(&mut rx).await {
            StatusChange::Cookies(status) => {
                assert!(status.has_login_cookies);
                assert_eq!(status.cookie_count, 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(tmp.path());

        let (handle, mut rx) = StatusWatcher::new(&paths).with_intervals(FAST, NEVER).start();
        next(&mut rx).await;
        handle.stop();

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }

    #[test]
    fn change_serializes_with_kind_tag() {
        let json = serde_json::to_value(StatusChange::Binaries(BinaryPresence {
            ytdlp: true,
            ffmpeg: true,
        }))
        .unwrap();
        assert_eq!(json["kind"], "binaries");
        assert_eq!(json["status"]["ffmpeg"], true);
    }
}
