//! Directory tree mirroring
//!
//! Walks a source tree in file-name order and rebuilds its shape under a
//! destination root, handing each regular file to a per-file operation.

use crate::error::{ErrorCategory, ErrorKind, Result, WindtalkerError};
use std::fs;
use std::path::{self, Path};
use tracing::warn;
use walkdir::WalkDir;

/// Mirror `src_root` into `dst_root`, calling `per_file(src, dst)` for
/// every regular file. Returns the number of files processed.
///
/// Directories are created as needed and may already exist. Symbolic links
/// are followed and mirrored as what they point to, so the destination
/// holds regular files and directories only. A broken link or a link loop
/// fails the walk. The first failure aborts the walk; whatever was written
/// before it stays in place.
pub fn mirror_dir<F>(src_root: &Path, dst_root: &Path, mut per_file: F) -> Result<usize>
where
    F: FnMut(&Path, &Path) -> Result<()>,
{
    if !src_root.is_dir() {
        return Err(WindtalkerError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("'{}' is not a directory", src_root.display()),
        ));
    }
    check_not_nested(src_root, dst_root)?;

    let mut files = 0;
    for entry in WalkDir::new(src_root)
        .follow_links(true)
        .sort_by_file_name() {
        let entry = entry.map_err(|e| {
            WindtalkerError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to walk {}", src_root.display()),
                e,
            )
        })?;
        let relative = entry.path().strip_prefix(src_root).map_err(|e| {
            WindtalkerError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("'{}' escaped the walked tree", entry.path().display()),
                e,
            )
        })?;
        let target = dst_root.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                WindtalkerError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to create directory {}", target.display()),
                    e,
                )
            })?;
        } else if file_type.is_file() {
            per_file(entry.path(), &target)?;
            files += 1;
        } else {
            warn!(path = %entry.path().display(), "skipping entry that is not a regular file");
        }
    }
    Ok(files)
}

/// Refuse to write a mirror inside the tree being walked.
fn check_not_nested(src_root: &Path, dst_root: &Path) -> Result<()> {
    let absolute = |p: &Path| {
        path::absolute(p).map_err(|e| {
            WindtalkerError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to resolve {}", p.display()),
                e,
            )
        })
    };
    let src = absolute(src_root)?;
    let dst = absolute(dst_root)?;
    if dst.starts_with(&src) {
        return Err(WindtalkerError::new(
            ErrorCategory::User,
            format!(
                "destination '{}' lies inside source directory '{}'",
                dst_root.display(),
                src_root.display()
            ),
        ));
    }
    Ok(())
}
