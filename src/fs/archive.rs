//! Post-run relocation of downloaded files into long-term storage.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::dedup::{files_identical, resolve};
use crate::error::{Error, Result};
use crate::fs::paths::media_dir;
use crate::media::MediaKind;

/// What a relocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    pub moved: Vec<PathBuf>,
    /// Working files dropped because the archive already held identical content.
    pub already_archived: Vec<PathBuf>,
}

/// Files currently in each kind's working directory.
///
/// Hidden files (partial downloads) are left out. Kinds without a working
/// directory map to an empty list.
pub fn working_files(
    download_dir: &Path,
    kinds: &[MediaKind],
) -> Result<BTreeMap<MediaKind, Vec<PathBuf>>> {
    let mut files = BTreeMap::new();
    for &kind in kinds {
        let dir = media_dir(download_dir, kind);
        let mut entries = Vec::new();

        match std::fs::read_dir(&dir) {
            Ok(read_dir) => {
                for entry in read_dir {
                    let path = entry?.path();
                    let hidden = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with('.'));
                    if path.is_file() && !hidden {
                        entries.push(path);
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        entries.sort();
        files.insert(kind, entries);
    }
    Ok(files)
}

/// Move working files into `<archive_folder>/<kind>/`.
///
/// An identical file already in the archive makes the working copy redundant
/// and it is removed; a different file with the same name keeps both, the
/// incoming one under a copy name.
pub async fn relocate(
    download_dir: &Path,
    archive_folder: &Path,
    kinds: &[MediaKind],
) -> Result<RelocationReport> {
    let download_dir = download_dir.to_path_buf();
    let archive_folder = archive_folder.to_path_buf();
    let kinds = kinds.to_vec();

    tokio::task::spawn_blocking(move || relocate_blocking(&download_dir, &archive_folder, &kinds))
        .await
        .map_err(|e| Error::Io(io::Error::other(e)))?
}

fn relocate_blocking(
    download_dir: &Path,
    archive_folder: &Path,
    kinds: &[MediaKind],
) -> Result<RelocationReport> {
    let mut report = RelocationReport::default();

    for (kind, files) in working_files(download_dir, kinds)? {
        if files.is_empty() {
            continue;
        }

        let target_dir = media_dir(archive_folder, kind);
        std::fs::create_dir_all(&target_dir)?;

        for file in files {
            let Some(name) = file.file_name() else {
                continue;
            };
            let target = target_dir.join(name);

            if target.is_file() && files_identical(&file, &target)? {
                std::fs::remove_file(&file)?;
                tracing::debug!("{} already archived", target.display());
                report.already_archived.push(target);
                continue;
            }

            let target = resolve(&target);
            move_file(&file, &target)?;
            tracing::debug!("Archived {} -> {}", file.display(), target.display());
            report.moved.push(target);
        }
    }

    Ok(report)
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }

    std::fs::copy(from, to)?;
    std::fs::remove_file(from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_files() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("audio");
        std::fs::create_dir_all(&audio).unwrap();
        std::fs::write(audio.join("b.mp3"), b"b").unwrap();
        std::fs::write(audio.join("a.mp3"), b"a").unwrap();
        std::fs::write(audio.join(".1234.part"), b"partial").unwrap();

        let files = working_files(dir.path(), &[MediaKind::Audio, MediaKind::Voice]).unwrap();
        assert_eq!(
            files[&MediaKind::Audio],
            vec![audio.join("a.mp3"), audio.join("b.mp3")]
        );
        assert!(files[&MediaKind::Voice].is_empty());
    }

    #[tokio::test]
    async fn test_relocate() {
        let downloads = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let chat_folder = archive.path().join("my_channel");

        let working = downloads.path().join("document");
        std::fs::create_dir_all(&working).unwrap();
        std::fs::write(working.join("new.pdf"), b"new").unwrap();
        std::fs::write(working.join("same.pdf"), b"same").unwrap();
        std::fs::write(working.join("clash.pdf"), b"incoming").unwrap();

        let archived = chat_folder.join("document");
        std::fs::create_dir_all(&archived).unwrap();
        std::fs::write(archived.join("same.pdf"), b"same").unwrap();
        std::fs::write(archived.join("clash.pdf"), b"existing").unwrap();

        let report = relocate(downloads.path(), &chat_folder, &[MediaKind::Document])
            .await
            .unwrap();

        assert_eq!(report.already_archived, vec![archived.join("same.pdf")]);
        assert_eq!(report.moved.len(), 2);
        assert_eq!(std::fs::read(archived.join("new.pdf")).unwrap(), b"new");
        assert_eq!(std::fs::read(archived.join("clash.pdf")).unwrap(), b"existing");
        assert_eq!(
            std::fs::read(archived.join("clash-copy1.pdf")).unwrap(),
            b"incoming"
        );
        assert_eq!(std::fs::read_dir(&working).unwrap().count(), 0);
    }
}
