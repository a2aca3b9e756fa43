//! Slash-separated path helpers.
//!
//! Paths are always interpreted relative to the filesystem root, so `a/b`
//! and `/a/b` name the same object.

use crate::error::{Error, Result};

/// Characters the backend query language cannot carry safely.
pub const INVALID_PATH_CHARS: &[char] = &[':', '\0'];

/// Rejects paths containing characters from [`INVALID_PATH_CHARS`].
pub fn check_path<P: AsRef<str>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.contains(INVALID_PATH_CHARS) {
        return Err(Error::invalid_chars(path));
    }
    Ok(())
}

/// Splits a path into its normalized segments.
///
/// Empty and `.` segments are dropped, `..` pops the previous segment.
/// Going above the root is an error.
pub fn segments<P: AsRef<str>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut parts: Vec<String> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(Error::not_found(path));
                }
            }
            name => parts.push(name.to_string()),
        }
    }
    Ok(parts)
}

/// Returns the absolute, normalized form of a path.
pub fn normalize<P: AsRef<str>>(path: P) -> Result<String> {
    Ok(format!("/{}", segments(path)?.join("/")))
}

/// True when the path names the root directory.
pub fn is_root<P: AsRef<str>>(path: P) -> bool {
    matches!(segments(path), Ok(parts) if parts.is_empty())
}

/// Extracts the final component of a path, empty for the root.
pub fn basename<P: AsRef<str>>(path: P) -> String {
    let path = path.as_ref().trim_end_matches('/');
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path.to_string(),
    }
}

/// Extracts the directory part of a path, `/` for top-level entries.
pub fn dirname<P: AsRef<str>>(path: P) -> String {
    let path = path.as_ref().trim_end_matches('/');
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Joins a relative path onto a base path.
pub fn join<B: AsRef<str>, P: AsRef<str>>(base: B, path: P) -> String {
    let base = base.as_ref().trim_end_matches('/');
    let path = path.as_ref().trim_start_matches('/');
    if path.is_empty() {
        if base.is_empty() {
            "/".to_string()
        } else {
            base.to_string()
        }
    } else {
        format!("{base}/{path}")
    }
}

/// Returns the extension of the final component including the dot, or an
/// empty string.
pub fn extension<P: AsRef<str>>(path: P) -> String {
    let name = basename(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_string(),
        _ => String::new(),
    }
}
