use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tubedeck")]
#[command(author, version, about = "Download and convert media with yt-dlp and ffmpeg", long_about = None)]
pub struct Cli {
    /// Debug logging on the terminal and in the log file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show whether yt-dlp and ffmpeg are installed and runnable
    Status,

    /// Download yt-dlp and ffmpeg into the binaries directory
    Install {
        /// Reinstall even when both binaries are ready
        #[arg(long)]
        force: bool,
    },

    /// Compare the installed yt-dlp with the latest release
    CheckUpdate,

    /// Replace yt-dlp with the latest release
    Update,

    /// Inspect a local media file
    Probe {
        file: PathBuf,
    },

    /// Show title, duration and available formats for a URL
    Info {
        url: String,

        /// Print the metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a URL
    Download {
        url: String,

        /// Format selector from `info` (default: best)
        #[arg(short, long)]
        format: Option<String>,

        /// Extract audio to mp3
        #[arg(short, long)]
        audio_only: bool,

        /// Output directory (default: DOWNLOAD_FOLDER)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert local files next to the originals
    Convert {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target format (mp4, mkv, webm, avi, mov, mp3, aac, wav, flac, ogg)
        #[arg(short, long)]
        to: String,

        /// fast, balanced or quality
        #[arg(short, long, default_value = "balanced")]
        preset: String,
    },

    /// List conversion targets and presets
    Formats,

    /// Manage the synced cookie file
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },

    /// Print binary and cookie changes until Ctrl-C
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum CookieAction {
    /// Show cookie file status
    Status,
    /// Replace the cookie file with an exported Netscape cookie file
    Import { file: PathBuf },
    /// Delete the cookie file
    Delete,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
