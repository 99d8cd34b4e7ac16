//! Every pattern applied to yt-dlp and ffmpeg output lives here.
//!
//! The tools' textual output is the only structured channel they offer and
//! its format is outside our control, so each pattern is unit-tested against
//! captured lines.

pub mod ffmpeg;
pub mod ytdlp;
