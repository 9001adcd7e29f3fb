//! The cipher capability and the operations derived from it
//!
//! A concrete cipher only supplies [`Cipher::encrypt`] and
//! [`Cipher::decrypt`] over bytes. Text, binary, file and directory
//! operations are built once here on top of those two and shared by every
//! implementation.

use crate::error::{ErrorCategory, ErrorKind, Result, WindtalkerError};
use crate::mirror;
use crate::paths::{self, DEFAULT_SUFFIX};
use crate::transform::{self, STREAM_CHUNK_MAX, STREAM_CHUNK_MIN};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Chunk size used by ciphers that do not configure their own.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

macro_rules! report {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// Settings recognized by the file and directory operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOptions {
    /// Replace destination files that already exist.
    pub overwrite: bool,
    /// Process files chunk by chunk instead of loading them whole.
    pub stream: bool,
    /// Chunk size to stream with; `None` uses the cipher's own size for the
    /// direction of the operation.
    pub chunk_size: Option<usize>,
    /// Report progress at info level rather than debug level.
    pub verbose: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            stream: true,
            chunk_size: None,
            verbose: false,
        }
    }
}

impl FileOptions {
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Encrypt/decrypt capability plus everything derived from it.
pub trait Cipher {
    /// Encrypt a self-contained piece of binary data.
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt data produced by [`Cipher::encrypt`].
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Plaintext bytes per chunk when streaming a file through `encrypt`.
    fn encrypt_chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }

    /// Ciphertext bytes per chunk when streaming a file through `decrypt`.
    ///
    /// Must equal the output length of encrypting `encrypt_chunk_size()`
    /// bytes, or streamed decryption reads across token boundaries.
    fn decrypt_chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }

    fn encrypt_binary(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.encrypt(data)
    }

    fn decrypt_binary(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.decrypt(data)
    }

    /// Encrypt a string, returning the token as standard base64.
    fn encrypt_text(&self, text: &str) -> Result<String> {
        let token = self.encrypt(text.as_bytes())?;
        Ok(BASE64_STANDARD.encode(token))
    }

    /// Decrypt a string produced by [`Cipher::encrypt_text`].
    fn decrypt_text(&self, text: &str) -> Result<String> {
        let token = BASE64_STANDARD.decode(text.trim()).map_err(|e| {
            WindtalkerError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::TextEncoding,
                format!("base64 decoding failed: {}", e),
                e,
            )
        })?;
        let plaintext = self.decrypt(&token)?;
        String::from_utf8(plaintext).map_err(|e| {
            WindtalkerError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::TextEncoding,
                "decrypted text is not valid UTF-8",
                e,
            )
        })
    }

    /// Encrypt a file, returning the path written.
    ///
    /// Without `output` the result goes next to `path` with the encrypted
    /// suffix added (see [`paths::encrypted_path`]).
    fn encrypt_file(
        &self,
        path: &Path,
        output: Option<&Path>,
        options: &FileOptions,
    ) -> Result<PathBuf> {
        let output = match output {
            Some(p) => p.to_path_buf(),
            None => paths::encrypted_path(path, DEFAULT_SUFFIX)?,
        };
        let chunk_size = if options.stream {
            stream_chunk_sizes(self, options)?.encrypt_chunk_size
        } else {
            self.encrypt_chunk_size()
        };
        run_file_job(path, &output, options, chunk_size, "Encrypt", |chunk| {
            self.encrypt(chunk)
        })?;
        Ok(output)
    }

    /// Decrypt a file, returning the path written.
    ///
    /// Without `output` the encrypted suffix is stripped from `path`
    /// (see [`paths::decrypted_path`]).
    fn decrypt_file(
        &self,
        path: &Path,
        output: Option<&Path>,
        options: &FileOptions,
    ) -> Result<PathBuf> {
        let output = match output {
            Some(p) => p.to_path_buf(),
            None => paths::decrypted_path(path, DEFAULT_SUFFIX)?,
        };
        let chunk_size = if options.stream {
            stream_chunk_sizes(self, options)?.decrypt_chunk_size
        } else {
            self.decrypt_chunk_size()
        };
        run_file_job(path, &output, options, chunk_size, "Decrypt", |chunk| {
            self.decrypt(chunk)
        })?;
        Ok(output)
    }

    /// Encrypt every file below `path` into a mirrored tree.
    ///
    /// Only the root directory name gets the encrypted suffix; nested
    /// files keep their names. Stops at the first failing file.
    fn encrypt_dir(
        &self,
        path: &Path,
        output: Option<&Path>,
        options: &FileOptions,
    ) -> Result<PathBuf> {
        let output = match output {
            Some(p) => p.to_path_buf(),
            None => paths::encrypted_dir_path(path, DEFAULT_SUFFIX)?,
        };
        report!(options.verbose, "--- Encrypt directory '{}' ---", path.display());
        let started = Instant::now();
        let files = mirror::mirror_dir(path, &output, |src, dst| {
            self.encrypt_file(src, Some(dst), options).map(|_| ())
        })?;
        report!(
            options.verbose,
            files = files,
            "Complete! Elapse {:.6} seconds",
            started.elapsed().as_secs_f64()
        );
        Ok(output)
    }

    /// Decrypt every file below `path` into a mirrored tree.
    fn decrypt_dir(
        &self,
        path: &Path,
        output: Option<&Path>,
        options: &FileOptions,
    ) -> Result<PathBuf> {
        let output = match output {
            Some(p) => p.to_path_buf(),
            None => paths::decrypted_dir_path(path, DEFAULT_SUFFIX)?,
        };
        report!(options.verbose, "--- Decrypt directory '{}' ---", path.display());
        let started = Instant::now();
        let files = mirror::mirror_dir(path, &output, |src, dst| {
            self.decrypt_file(src, Some(dst), options).map(|_| ())
        })?;
        report!(
            options.verbose,
            files = files,
            "Complete! Elapse {:.6} seconds",
            started.elapsed().as_secs_f64()
        );
        Ok(output)
    }
}

/// Plaintext and ciphertext chunk sizes for streaming a file.
///
/// An explicit [`FileOptions::chunk_size`] is a plaintext size; the matching
/// ciphertext size is measured by encrypting a chunk of that length. Both
/// sizes have to pass the stream clamp unchanged, otherwise one direction
/// would read across token boundaries, so anything else fails with
/// [`ErrorKind::InvalidChunkSize`] before a file is opened.
fn stream_chunk_sizes<C>(cipher: &C, options: &FileOptions) -> Result<StreamChunks>
where
    C: Cipher + ?Sized,
{
    let encrypt_chunk_size = options
        .chunk_size
        .unwrap_or_else(|| cipher.encrypt_chunk_size());
    check_streamable("encrypt", encrypt_chunk_size)?;
    let decrypt_chunk_size = match options.chunk_size {
        Some(size) => cipher.encrypt(&vec![0u8; size])?.len(),
        None => cipher.decrypt_chunk_size(),
    };
    check_streamable("decrypt", decrypt_chunk_size)?;
    Ok(StreamChunks {
        encrypt_chunk_size,
        decrypt_chunk_size,
    })
}

struct StreamChunks {
    encrypt_chunk_size: usize,
    decrypt_chunk_size: usize,
}

fn check_streamable(direction: &str, chunk_size: usize) -> Result<()> {
    if transform::clamp_stream_chunk_size(chunk_size) == chunk_size {
        return Ok(());
    }
    Err(WindtalkerError::with_kind(
        ErrorCategory::User,
        ErrorKind::InvalidChunkSize,
        format!(
            "cannot stream with {direction} chunk size {chunk_size}: streamed chunks must be \
             between {STREAM_CHUNK_MIN} and {STREAM_CHUNK_MAX} bytes"
        ),
    ))
}

fn run_file_job<F>(
    src: &Path,
    dst: &Path,
    options: &FileOptions,
    chunk_size: usize,
    action: &str,
    converter: F,
) -> Result<()>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>>,
{
    if !options.overwrite && dst.exists() {
        return Err(transform::destination_exists(dst));
    }

    report!(options.verbose, "{} '{}' ...", action, src.display());
    let started = Instant::now();
    transform::transform(
        src,
        dst,
        converter,
        options.overwrite,
        options.stream,
        chunk_size,
    )
    .map_err(|e| {
        e.with_context(format!(
            "failed to {} {}",
            action.to_lowercase(),
            src.display()
        ))
    })?;
    report!(
        options.verbose,
        "    Finished! Elapse {:.6} seconds",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
