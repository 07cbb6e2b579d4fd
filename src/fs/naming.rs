//! Filename generation and manipulation.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Marker placed between a file stem and its copy counter.
pub const COPY_MARKER: &str = "-copy";

/// Upper bound on copy counters tried before giving up.
pub const MAX_COPY_INDEX: u32 = 1000;

/// Validate and sanitize a filename by removing or replacing invalid characters.
///
/// Returns an error if the filename contains path traversal patterns.
pub fn sanitize_filename(name: &str) -> Result<String> {
    // Reject path traversal attempts
    if name.contains("..") {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidFilename(format!(
            "Path separators not allowed in filename: '{}'",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed in filename: '{}'",
            name
        )));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim().is_empty() {
        return Err(Error::InvalidFilename(
            "Filename cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Sanitize a path component (folder name) with less strict validation.
///
/// Used for chat references, where separators are replaced rather than rejected.
pub fn sanitize_path_component(name: &str) -> Result<String> {
    if name.contains("..") {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed: '{}'",
            name
        )));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim().is_empty() {
        return Err(Error::InvalidFilename(
            "Path component cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Split a file name into its stem and full suffix chain.
///
/// `archive.tar.gz` splits into `("archive", ".tar.gz")`; a leading dot is
/// part of the stem so `.hidden` has no suffix.
pub fn split_name(file_name: &str) -> (&str, &str) {
    let search_from = usize::from(file_name.starts_with('.'));
    match file_name[search_from..].find('.') {
        Some(pos) => file_name.split_at(search_from + pos),
        None => (file_name, ""),
    }
}

/// Build the `index`-th copy name for a path: `dir/stem-copyN.ext`.
pub fn copy_name(path: &Path, index: u32) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let (stem, suffix) = split_name(file_name);
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}{}{}{}", stem, COPY_MARKER, index, suffix))
}

/// Split a copy name into the path it was derived from and its counter.
///
/// Returns `None` if `path` is not a copy name.
pub fn parse_copy_name(path: &Path) -> Option<(PathBuf, u32)> {
    let file_name = path.file_name()?.to_str()?;
    let (stem, suffix) = split_name(file_name);
    let marker = stem.rfind(COPY_MARKER)?;
    let counter = &stem[marker + COPY_MARKER.len()..];
    if counter.is_empty() || !counter.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let index = counter.parse().ok()?;
    let parent = path.parent().unwrap_or(Path::new("."));
    Some((parent.join(format!("{}{}", &stem[..marker], suffix)), index))
}

/// Return `path` if nothing exists there, otherwise the first free copy name.
///
/// This is an existence check only; callers that need exclusivity reserve the
/// name with [`crate::dedup::PathSlot`].
pub fn next_available_name(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let mut counter = 1;
    loop {
        let candidate = copy_name(path, counter);
        if !candidate.exists() || counter >= MAX_COPY_INDEX {
            return candidate;
        }
        counter += 1;
    }
}
