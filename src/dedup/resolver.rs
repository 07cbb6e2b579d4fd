//! Duplicate file resolution.
//!
//! Downloads never overwrite an existing file. A download is written to a
//! hidden temp file held by a [`PathSlot`]; [`PathSlot::commit`] claims the
//! destination name, falling back to `-copyN` names when it is taken, and
//! drops the new file again if it is a byte-identical retransmission of a
//! file already on disk.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::dedup::hash::files_identical;
use crate::error::{Error, Result};
use crate::fs::naming::{copy_name, next_available_name, parse_copy_name, MAX_COPY_INDEX};

/// Serializes name claims and the duplicate check that follows them.
static COMMIT_LOCK: Mutex<()> = Mutex::new(());

/// Path that writing to will not clobber an existing file (existence check only).
pub fn resolve(path: &Path) -> PathBuf {
    next_available_name(path)
}

/// Where a committed download ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Stored under this path.
    Stored(PathBuf),
    /// Identical to this existing file; the new copy was removed.
    Duplicate(PathBuf),
}

/// A pending download into a hidden temp file next to its destination.
///
/// Nothing is created at the destination until [`commit`](Self::commit).
/// Dropping an uncommitted slot removes the temp file.
#[derive(Debug)]
pub struct PathSlot {
    requested: PathBuf,
    temp: PathBuf,
    committed: bool,
}

impl PathSlot {
    /// Prepare a download for `requested`, creating its directory.
    pub async fn acquire(requested: &Path) -> Result<Self> {
        let parent = requested.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(parent).await?;

        Ok(Self {
            requested: requested.to_path_buf(),
            temp: parent.join(format!(".{}.part", Uuid::new_v4())),
            committed: false,
        })
    }

    /// The temp path to write the download to.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Move the finished download to its destination.
    pub async fn commit(mut self) -> Result<Placement> {
        self.committed = true;
        let temp = std::mem::take(&mut self.temp);
        let requested = std::mem::take(&mut self.requested);

        tokio::task::spawn_blocking(move || {
            let placed = commit_blocking(&temp, &requested);
            if placed.is_err() {
                let _ = std::fs::remove_file(&temp);
            }
            placed
        })
        .await
        .map_err(|e| Error::Io(io::Error::other(e)))?
    }
}

impl Drop for PathSlot {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.temp) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        "Failed to remove partial download {}: {}",
                        self.temp.display(),
                        e
                    );
                }
            }
        }
    }
}

fn commit_blocking(temp: &Path, requested: &Path) -> Result<Placement> {
    let _guard = COMMIT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let path = claim(temp, requested)?;
    match deduplicate(&path, requested) {
        Ok(kept) if kept != path => Ok(Placement::Duplicate(kept)),
        Ok(_) => Ok(Placement::Stored(path)),
        Err(e) => {
            tracing::warn!("Could not compare {} for duplicates: {}", path.display(), e);
            Ok(Placement::Stored(path))
        }
    }
}

/// Move `temp` to `requested` or its first free copy name.
///
/// Existing content is never replaced, except for a zero-length file, which
/// can only be a leftover of an interrupted download.
fn claim(temp: &Path, requested: &Path) -> Result<PathBuf> {
    for index in 0..=MAX_COPY_INDEX {
        let candidate = match index {
            0 => requested.to_path_buf(),
            n => copy_name(requested, n),
        };

        match std::fs::hard_link(temp, &candidate) {
            Ok(()) => {
                std::fs::remove_file(temp)?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if is_empty_file(&candidate) {
                    tracing::debug!("Replacing empty leftover {}", candidate.display());
                    std::fs::rename(temp, &candidate)?;
                    return Ok(candidate);
                }
            }
            // No hard link support on this filesystem.
            Err(_) if std::fs::symlink_metadata(&candidate).is_err() => {
                std::fs::rename(temp, &candidate)?;
                return Ok(candidate);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name left for {}", requested.display()),
    )))
}

fn is_empty_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.is_file() && m.len() == 0)
        .unwrap_or(false)
}

/// Collapse byte-identical files stored under `original` and its copy names.
///
/// If `downloaded` is a copy name and matches `original` or an older copy,
/// it is deleted and that older path is returned. If `downloaded` is
/// `original` itself, identical copies of it are deleted instead. Otherwise
/// `downloaded` is returned unchanged.
pub fn deduplicate(downloaded: &Path, original: &Path) -> Result<PathBuf> {
    if downloaded == original {
        for copy in copies_of(original, downloaded)? {
            if files_identical(original, &copy)? {
                std::fs::remove_file(&copy)?;
                tracing::debug!(
                    "{} is identical to {}, removed",
                    copy.display(),
                    original.display()
                );
            }
        }
        return Ok(original.to_path_buf());
    }

    let mut candidates = Vec::new();
    if original.is_file() {
        candidates.push(original.to_path_buf());
    }
    candidates.extend(copies_of(original, downloaded)?);

    for candidate in candidates {
        if files_identical(downloaded, &candidate)? {
            std::fs::remove_file(downloaded)?;
            tracing::debug!(
                "{} is identical to {}, removed",
                downloaded.display(),
                candidate.display()
            );
            return Ok(candidate);
        }
    }

    Ok(downloaded.to_path_buf())
}

/// Existing copy names of `original`, oldest first, excluding `skip`.
fn copies_of(original: &Path, skip: &Path) -> Result<Vec<PathBuf>> {
    let Some(dir) = original.parent() else {
        return Ok(Vec::new());
    };

    let mut copies: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path == skip || !path.is_file() {
            continue;
        }
        if let Some((source, index)) = parse_copy_name(&path) {
            if source == original {
                copies.push((index, path));
            }
        }
    }
    copies.sort();

    Ok(copies.into_iter().map(|(_, path)| path).collect())
}
