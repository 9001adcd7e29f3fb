//! Naming of encrypted and decrypted artifacts
//!
//! An encrypted artifact lives next to its original and carries a suffix on
//! its last path segment:
//!
//! - file: `docs/report.pdf` -> `docs/report-encrypted.pdf`
//! - directory: `docs/taxes` -> `docs/taxes-encrypted`
//!
//! For files the suffix goes between the stem and the last extension. For
//! directories the whole name is the stem. Everything here is pure path
//! manipulation; nothing touches the filesystem.

use crate::error::{ErrorCategory, ErrorKind, Result, WindtalkerError};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Suffix marking encrypted files and directories.
pub const DEFAULT_SUFFIX: &str = "-encrypted";

/// Derive the encrypted sibling of a file path, keeping its extension.
pub fn encrypted_path(original: &Path, suffix: &str) -> Result<PathBuf> {
    let (stem, extension) = split_file_name(original)?;
    let mut name = OsString::from(stem);
    name.push(suffix);
    if let Some(ext) = extension {
        name.push(".");
        name.push(ext);
    }
    Ok(original.with_file_name(name))
}

/// Recover the original file path from an encrypted one.
///
/// Exactly one trailing occurrence of `suffix` is removed from the stem.
pub fn decrypted_path(encrypted: &Path, suffix: &str) -> Result<PathBuf> {
    let (stem, extension) = split_file_name(encrypted)?;
    let mut name = strip_suffix(encrypted, stem, suffix)?;
    if let Some(ext) = extension {
        name.push(".");
        name.push(ext);
    }
    Ok(encrypted.with_file_name(name))
}

/// Derive the encrypted sibling of a directory path.
pub fn encrypted_dir_path(original: &Path, suffix: &str) -> Result<PathBuf> {
    let mut name = last_segment(original)?.to_os_string();
    name.push(suffix);
    Ok(original.with_file_name(name))
}

/// Recover the original directory path from an encrypted one.
pub fn decrypted_dir_path(encrypted: &Path, suffix: &str) -> Result<PathBuf> {
    let name = last_segment(encrypted)?;
    let stripped = strip_suffix(encrypted, name, suffix)?;
    Ok(encrypted.with_file_name(stripped))
}

fn last_segment(path: &Path) -> Result<&OsStr> {
    path.file_name().ok_or_else(|| {
        WindtalkerError::new(
            ErrorCategory::User,
            format!("'{}' has no final path segment to rename", path.display()),
        )
    })
}

fn split_file_name(path: &Path) -> Result<(&OsStr, Option<&OsStr>)> {
    last_segment(path)?;
    let stem = path.file_stem().ok_or_else(|| {
        WindtalkerError::new(
            ErrorCategory::User,
            format!("'{}' has no file stem", path.display()),
        )
    })?;
    Ok((stem, path.extension()))
}

fn strip_suffix(path: &Path, name: &OsStr, suffix: &str) -> Result<OsString> {
    let not_encrypted = || {
        WindtalkerError::with_kind(
            ErrorCategory::User,
            ErrorKind::PathNotEncrypted,
            format!(
                "'{}' is not an encrypted file or dir path (name does not end with suffix '{}')",
                path.display(),
                suffix
            ),
        )
    };
    match strip_os_suffix(name, suffix) {
        Some(stripped) if !stripped.is_empty() => Ok(stripped),
        _ => Err(not_encrypted()),
    }
}

/// Remove `suffix` from the end of `name`, byte for byte where the
/// platform allows it, so names that are not valid UTF-8 still work.
fn strip_os_suffix(name: &OsStr, suffix: &str) -> Option<OsString> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        name.as_bytes()
            .strip_suffix(suffix.as_bytes())
            .map(|stripped| OsStr::from_bytes(stripped).to_os_string())
    }
    #[cfg(not(unix))]
    {
        name.to_str()?.strip_suffix(suffix).map(OsString::from)
    }
}
