use std::path::{Path, PathBuf};

use crate::conversion::formats::TargetFormat;

/// `<dir>/<stem>_converted.<ext>`, then `_converted_2`, `_converted_3`, …
/// until a free name is found. Not atomic against other writers.
pub fn generate_output_path(input: &Path, format: TargetFormat) -> PathBuf {
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = format.extension();

    let mut candidate = dir.join(format!("{stem}_converted.{ext}"));
    let mut counter = 2u32;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}_converted_{counter}.{ext}"));
        counter += 1;
    }
    candidate
}
