//! Chunked file-to-file conversion
//!
//! [`transform`] copies a source file into a destination file, passing the
//! content through a converter. In stream mode the source is read in chunks
//! of exactly `chunk_size` bytes (only the last chunk may be shorter) and
//! each chunk is converted and written on its own, in file order. A cipher
//! plugged in as converter must therefore be self-contained per chunk.

use crate::error::{ErrorCategory, ErrorKind, Result, WindtalkerError};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::trace;

/// Smallest chunk a streamed transform reads.
pub const STREAM_CHUNK_MIN: usize = 1024 * 1024;

/// Largest chunk a streamed transform reads.
pub const STREAM_CHUNK_MAX: usize = 10 * 1024 * 1024;

/// Clamp a requested chunk size into `[STREAM_CHUNK_MIN, STREAM_CHUNK_MAX]`.
pub fn clamp_stream_chunk_size(chunk_size: usize) -> usize {
    chunk_size.clamp(STREAM_CHUNK_MIN, STREAM_CHUNK_MAX)
}

/// Convert `src` into `dst`.
///
/// Fails with [`ErrorKind::DestinationExists`] before opening anything if
/// `overwrite` is false and `dst` exists. Both files are closed on every
/// return path. A failed conversion may leave a partially written `dst`.
pub fn transform<F>(
    src: &Path,
    dst: &Path,
    mut converter: F,
    overwrite: bool,
    stream: bool,
    chunk_size: usize,
) -> Result<()>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>>,
{
    if !overwrite && dst.exists() {
        return Err(destination_exists(dst));
    }
    if same_file(src, dst) {
        return Err(WindtalkerError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("source and destination are the same file: {}", src.display()),
        ));
    }

    let mut input = File::open(src).map_err(|e| read_error(src, e))?;
    let mut output = create_output(dst, overwrite)?;

    if stream {
        let chunk_size = clamp_stream_chunk_size(chunk_size);
        let mut buf = Vec::with_capacity(chunk_size);
        let mut index = 0usize;
        loop {
            buf.clear();
            Read::by_ref(&mut input)
                .take(chunk_size as u64)
                .read_to_end(&mut buf)
                .map_err(|e| read_error(src, e))?;
            if buf.is_empty() {
                break;
            }
            let converted = converter(&buf).map_err(|e| {
                e.with_context(format!(
                    "failed to convert chunk {index} of {}",
                    src.display()
                ))
            })?;
            output
                .write_all(&converted)
                .map_err(|e| write_error(dst, e))?;
            trace!(
                chunk = index,
                read = buf.len(),
                written = converted.len(),
                "converted chunk"
            );
            index += 1;
        }
    } else {
        let mut content = Vec::new();
        input
            .read_to_end(&mut content)
            .map_err(|e| read_error(src, e))?;
        let converted = converter(&content)
            .map_err(|e| e.with_context(format!("failed to convert {}", src.display())))?;
        output
            .write_all(&converted)
            .map_err(|e| write_error(dst, e))?;
    }

    output.flush().map_err(|e| write_error(dst, e))?;
    Ok(())
}

/// Open the destination for writing (0o600 on Unix systems).
///
/// Without `overwrite` the file is created exclusively, so a destination
/// that appeared after the existence check is still never clobbered.
fn create_output(path: &Path, overwrite: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            destination_exists(path)
        } else {
            WindtalkerError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to open {}", path.display()),
                e,
            )
        }
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub(crate) fn destination_exists(path: &Path) -> WindtalkerError {
    WindtalkerError::with_kind(
        ErrorCategory::User,
        ErrorKind::DestinationExists,
        format!("output path '{}' already exists", path.display()),
    )
}

fn read_error(path: &Path, err: io::Error) -> WindtalkerError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    WindtalkerError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}

fn write_error(path: &Path, err: io::Error) -> WindtalkerError {
    WindtalkerError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::Io,
        format!("failed to write {}", path.display()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn identity(chunk: &[u8]) -> Result<Vec<u8>> {
        Ok(chunk.to_vec())
    }

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(clamp_stream_chunk_size(0), STREAM_CHUNK_MIN);
        assert_eq!(clamp_stream_chunk_size(1024), STREAM_CHUNK_MIN);
        assert_eq!(clamp_stream_chunk_size(3 * 1024 * 1024), 3 * 1024 * 1024);
        assert_eq!(clamp_stream_chunk_size(usize::MAX), STREAM_CHUNK_MAX);
    }

    #[test]
    fn test_stream_chunks_are_exact_and_ordered() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.bin");
        let dst = temp_dir.path().join("dst.bin");
        let data: Vec<u8> = (0..(2 * STREAM_CHUNK_MIN + 5)).map(|i| (i % 251) as u8).collect();
        fs::write(&src, &data).unwrap();

        let mut sizes = Vec::new();
        transform(
            &src,
            &dst,
            |chunk| {
                sizes.push(chunk.len());
                Ok(chunk.to_vec())
            },
            false,
            true,
            1,
        )
        .unwrap();

        // A requested size of one byte is clamped up to the stream minimum.
        assert_eq!(sizes, vec![STREAM_CHUNK_MIN, STREAM_CHUNK_MIN, 5]);
        assert_eq!(fs::read(&dst).unwrap(), data);
    }

    #[test]
    fn test_whole_file_mode_converts_once() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.txt");
        let dst = temp_dir.path().join("dst.txt");
        fs::write(&src, b"hello").unwrap();

        let mut calls = 0;
        transform(
            &src,
            &dst,
            |chunk| {
                calls += 1;
                Ok(chunk.iter().rev().copied().collect())
            },
            false,
            false,
            STREAM_CHUNK_MIN,
        )
        .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(fs::read(&dst).unwrap(), b"olleh");
    }

    #[test]
    fn test_empty_source_in_stream_mode() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("empty");
        let dst = temp_dir.path().join("out");
        fs::write(&src, b"").unwrap();

        let mut calls = 0;
        transform(
            &src,
            &dst,
            |chunk| {
                calls += 1;
                identity(chunk)
            },
            false,
            true,
            STREAM_CHUNK_MIN,
        )
        .unwrap();

        assert_eq!(calls, 0);
        assert_eq!(fs::read(&dst).unwrap(), b"");
    }

    #[test]
    fn test_existing_destination_is_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.txt");
        let dst = temp_dir.path().join("dst.txt");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old").unwrap();

        let err = transform(&src, &dst, identity, false, true, STREAM_CHUNK_MIN).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::DestinationExists));
        assert_eq!(fs::read(&dst).unwrap(), b"old");

        transform(&src, &dst, identity, true, true, STREAM_CHUNK_MIN).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"new");
    }

    #[test]
    fn test_converter_error_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.txt");
        let dst = temp_dir.path().join("dst.txt");
        fs::write(&src, b"data").unwrap();

        let err = transform(
            &src,
            &dst,
            |_| {
                Err(WindtalkerError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::PasswordError,
                    "bad token",
                ))
            },
            false,
            true,
            STREAM_CHUNK_MIN,
        )
        .unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PasswordError));
    }

    #[test]
    fn test_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let err = transform(
            &temp_dir.path().join("nope"),
            &temp_dir.path().join("out"),
            identity,
            false,
            true,
            STREAM_CHUNK_MIN,
        )
        .unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Io));
        assert_eq!(err.category, ErrorCategory::User);
    }

    #[test]
    fn test_same_file_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.txt");
        fs::write(&src, b"keep me").unwrap();

        assert!(transform(&src, &src, identity, true, true, STREAM_CHUNK_MIN).is_err());
        assert_eq!(fs::read(&src).unwrap(), b"keep me");
    }

    #[test]
    #[cfg(unix)]
    fn test_output_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.txt");
        let dst = temp_dir.path().join("dst.txt");
        fs::write(&src, b"test").unwrap();

        transform(&src, &dst, identity, false, true, STREAM_CHUNK_MIN).unwrap();

        let permissions = fs::metadata(&dst).unwrap().permissions();
        assert_eq!(permissions.mode() & 0o777, 0o600);
    }
}
