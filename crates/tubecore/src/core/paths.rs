//! Filesystem layout of the application data root

use std::path::{Path, PathBuf};

use crate::binaries::BinaryKind;
use crate::core::config;
use crate::core::error::AppResult;

/// Name of the synced cookie file inside the cookies directory
pub const COOKIE_FILE_NAME: &str = "youtube_cookies.txt";

/// Every location the engine reads or writes, derived from one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
    bin_dir: PathBuf,
    cookies_dir: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            bin_dir: root.join("bin"),
            cookies_dir: root.join("cookies"),
            root,
        }
    }

    /// Layout from TUBEDECK_HOME and the directory overrides
    pub fn from_env() -> Self {
        let mut paths = Self::new(config::TUBEDECK_HOME.as_str());
        if let Some(ref dir) = *config::TUBEDECK_BIN_DIR {
            paths.bin_dir = PathBuf::from(dir);
        }
        if let Some(ref dir) = *config::TUBEDECK_COOKIES_DIR {
            paths.cookies_dir = PathBuf::from(dir);
        }
        paths
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn cookies_dir(&self) -> &Path {
        &self.cookies_dir
    }

    pub fn cookie_file(&self) -> PathBuf {
        self.cookies_dir.join(COOKIE_FILE_NAME)
    }

    /// Installed location of a tool for the current platform
    pub fn binary_path(&self, kind: BinaryKind) -> PathBuf {
        self.bin_dir.join(kind.file_name())
    }

    pub fn ensure_dirs(&self) -> AppResult<()> {
        fs_err::create_dir_all(&self.bin_dir)?;
        fs_err::create_dir_all(&self.cookies_dir)?;
        Ok(())
    }
}
