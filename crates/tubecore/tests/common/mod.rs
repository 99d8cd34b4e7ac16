//! Shared fixtures for the integration tests
//!
//! Fake yt-dlp / ffmpeg are small shell scripts written into a temp
//! binaries directory, so these helpers are Unix only.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tubecore::binaries::BinaryKind;
use tubecore::AppPaths;

pub struct TestEnvironment {
    pub tmp: tempfile::TempDir,
    pub paths: AppPaths,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(tmp.path().join("home"));
        paths.ensure_dirs().expect("ensure_dirs");
        Self { tmp, paths }
    }

    pub fn binary(&self, kind: BinaryKind) -> PathBuf {
        self.paths.binary_path(kind)
    }

    /// Scratch directory for media files
    pub fn media_dir(&self) -> PathBuf {
        let dir = self.tmp.path().join("media");
        std::fs::create_dir_all(&dir).expect("media dir");
        dir
    }

    #[cfg(unix)]
    pub fn install_script(&self, kind: BinaryKind, body: &str) -> PathBuf {
        let path = self.binary(kind);
        write_script(&path, body);
        path
    }
}

#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
}

/// ffmpeg stand-in.
///
/// Probe mode (no `-progress`) prints a 10 second stream description to
/// stderr and exits 1. Encode mode creates the output, then behaves by input
/// name: `bad` fails with exit 2, `slow` blocks until terminated, anything
/// else reports progress and exits 0.
pub const FAKE_FFMPEG: &str = r#"
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 6.1-test Copyright (c) 2000-2023"
  exit 0
fi
case " $* " in
  *" -progress "*) ;;
  *)
    echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 1000 kb/s" >&2
    echo "    Stream #0:0: Video: h264 (High), yuv420p, 640x360, 900 kb/s" >&2
    echo "    Stream #0:1: Audio: aac (LC), 44100 Hz, stereo, fltp, 128 kb/s" >&2
    echo "At least one output file must be specified" >&2
    exit 1
    ;;
esac
input="$2"
for last in "$@"; do :; done
: > "$last"
case "$input" in
  *bad*)
    echo "Error while decoding stream" >&2
    exit 2
    ;;
  *slow*)
    echo "out_time_ms=1000000"
    exec sleep 30
    ;;
esac
sleep 1
echo "out_time_ms=2500000"
echo "out_time_ms=5000000"
echo "out_time_ms=12000000"
echo "progress=end"
exit 0
"#;

/// Polls `cond` until it holds or five seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}
