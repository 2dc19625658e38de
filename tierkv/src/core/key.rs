//! Key layout
//!
//! Keys are `/`-separated segments. Every segment is percent-escaped on its own
//! before it becomes a path component, so keys may carry characters that are
//! unsafe in file names. Segments made only of dots are escaped as well, which
//! keeps `.` and `..` from ever addressing anything outside the store root.

use super::error::{KvError, Result};
use std::path::{Path, PathBuf};

/// Separator between key segments
pub const SEPARATOR: char = '/';

/// Escape a single key segment into a file name
pub fn escape_segment(segment: &str) -> String {
    if segment.bytes().all(|b| b == b'.') {
        return "%2E".repeat(segment.len());
    }
    urlencoding::encode(segment).into_owned()
}

/// Reverse [`escape_segment`]; `None` if the name does not decode to UTF-8
pub fn unescape_segment(name: &str) -> Option<String> {
    urlencoding::decode(name).ok().map(|s| s.into_owned())
}

/// Check that a key is non-empty and has no empty segments
pub fn validate(key: &str) -> Result<()> {
    if key.is_empty() || key.split(SEPARATOR).any(str::is_empty) {
        return Err(KvError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Map a key to its file path below `root`
pub fn to_path(root: &Path, key: &str) -> Result<PathBuf> {
    validate(key)?;
    let mut path = root.to_path_buf();
    for segment in key.split(SEPARATOR) {
        path.push(escape_segment(segment));
    }
    Ok(path)
}

/// Whether a directory holding keys under `dir_key` can contain a match
/// for `prefix`
pub fn dir_may_match(dir_key: &str, prefix: &str) -> bool {
    let dir_prefix = format!("{dir_key}{SEPARATOR}");
    prefix.starts_with(&dir_prefix) || dir_prefix.starts_with(prefix)
}
