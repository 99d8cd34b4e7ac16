//! Pulling a single executable out of a zip or tar.xz archive

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::binaries::ArchiveKind;
use crate::core::error::{AppError, AppResult};

/// True when an entry path names `stem` or `stem.exe`, case-insensitively.
/// Only the last path component is compared.
pub fn entry_matches(entry_path: &str, stem: &str) -> bool {
    let base = entry_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(entry_path)
        .to_lowercase();
    let stem = stem.to_lowercase();
    base == stem || base == format!("{}.exe", stem)
}

/// Extracts the first file entry matching `stem` to `dest`.
///
/// Runs on the blocking pool; decompression is CPU bound.
pub async fn extract_binary(archive: &Path, kind: ArchiveKind, stem: &str, dest: &Path) -> AppResult<()> {
    let archive = archive.to_path_buf();
    let stem = stem.to_string();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || extract_blocking(&archive, kind, &stem, &dest))
        .await
        .map_err(|e| AppError::Archive(format!("extraction task failed: {}", e)))?
}

fn extract_blocking(archive: &Path, kind: ArchiveKind, stem: &str, dest: &Path) -> AppResult<()> {
    let staging = staging_path(dest);
    let found = match kind {
        ArchiveKind::Zip => extract_from_zip(archive, stem, &staging),
        ArchiveKind::TarXz => extract_from_tar_xz(archive, stem, &staging),
    };

    match found {
        Ok(Some(entry)) => {
            fs_err::rename(&staging, dest)?;
            log::info!("📦 Extracted {} from {} -> {}", entry, archive.display(), dest.display());
            Ok(())
        }
        Ok(None) => {
            let _ = fs_err::remove_file(&staging);
            Err(AppError::ArchiveEntryNotFound {
                entry: stem.to_string(),
                archive: archive.to_path_buf(),
            })
        }
        Err(e) => {
            let _ = fs_err::remove_file(&staging);
            Err(e)
        }
    }
}

fn extract_from_zip(archive: &Path, stem: &str, out: &Path) -> AppResult<Option<String>> {
    let file = fs_err::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() || !entry_matches(entry.name(), stem) {
            continue;
        }
        let name = entry.name().to_string();
        write_entry(&mut entry, out)?;
        return Ok(Some(name));
    }
    Ok(None)
}

fn extract_from_tar_xz(archive: &Path, stem: &str, out: &Path) -> AppResult<Option<String>> {
    let file = fs_err::File::open(archive)?;
    let mut tar = tar::Archive::new(xz2::read::XzDecoder::new(file));

    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().replace('\\', "/");
        if !entry_matches(&name, stem) {
            continue;
        }
        write_entry(&mut entry, out)?;
        return Ok(Some(name));
    }
    Ok(None)
}

fn write_entry<R: Read>(entry: &mut R, out: &Path) -> AppResult<()> {
    let mut file = fs_err::File::create(out)?;
    std::io::copy(entry, &mut file)?;
    Ok(())
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".extract");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn build_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory("ffmpeg-7.1/", options).unwrap();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn build_tar_xz(path: &Path, entries: &[(&str, &[u8])]) {
        let encoder = xz2::write::XzEncoder::new(std::fs::File::create(path).unwrap(), 6);
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_entry_matches() {
        assert!(entry_matches("ffmpeg-master-latest-linux64-gpl/bin/ffmpeg", "ffmpeg"));
        assert!(entry_matches("ffmpeg-7.1/bin/FFMPEG.EXE", "ffmpeg"));
        assert!(entry_matches("ffmpeg", "ffmpeg"));
        assert!(entry_matches("dir\\bin\\ffmpeg.exe", "ffmpeg"));
        assert!(!entry_matches("ffmpeg-7.1/bin/ffprobe", "ffmpeg"));
        assert!(!entry_matches("ffmpeg-7.1/doc/ffmpeg.html", "ffmpeg"));
        assert!(!entry_matches("ffmpeg-7.1/", "ffmpeg"));
    }

    #[tokio::test]
    async fn extracts_from_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("ffmpeg.zip");
        build_zip(
            &archive,
            &[
                ("ffmpeg-7.1/doc/ffmpeg.html", b"<html>"),
                ("ffmpeg-7.1/bin/ffprobe.exe", b"probe"),
                ("ffmpeg-7.1/bin/ffmpeg.exe", b"real-binary"),
            ],
        );
        let dest = tmp.path().join("ffmpeg");

        extract_binary(&archive, ArchiveKind::Zip, "ffmpeg", &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"real-binary");
        assert!(!staging_path(&dest).exists());
    }

    #[tokio::test]
    async fn extracts_from_tar_xz() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("ffmpeg.tar.xz");
        build_tar_xz(
            &archive,
            &[
                ("ffmpeg-master-latest-linux64-gpl/LICENSE.txt", b"GPL"),
                ("ffmpeg-master-latest-linux64-gpl/bin/ffmpeg", b"elf-bytes"),
            ],
        );
        let dest = tmp.path().join("ffmpeg");

        extract_binary(&archive, ArchiveKind::TarXz, "ffmpeg", &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"elf-bytes");
    }

    #[tokio::test]
    async fn missing_entry_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("ffmpeg.zip");
        build_zip(&archive, &[("ffmpeg-7.1/bin/ffprobe", b"probe")]);
        let dest = tmp.path().join("ffmpeg");

        let err = extract_binary(&archive, ArchiveKind::Zip, "ffmpeg", &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ArchiveEntryNotFound { .. }), "got {err:?}");
        assert!(!dest.exists());
        assert!(!staging_path(&dest).exists());
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_archive_error() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("ffmpeg.zip");
        std::fs::write(&archive, b"not a zip").unwrap();

        let err = extract_binary(&archive, ArchiveKind::Zip, "ffmpeg", &tmp.path().join("ffmpeg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Archive(_)), "got {err:?}");
    }
}
