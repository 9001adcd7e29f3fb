//! Password-based symmetric cipher session
//!
//! The session key is derived once from the password with scrypt, and every
//! call to [`Cipher::encrypt`] seals its input with NaCl secretbox
//! (XSalsa20Poly1305) under a fresh random nonce.
//!
//! The token format is:
//! - nonce: 24 bytes
//! - length: 8 bytes (big-endian signed int64)
//! - sealed box: variable length (includes 16-byte Poly1305 MAC)
//!
//! Because every token is self-contained, a file is encrypted as a
//! concatenation of independently sealed chunks. Decryption must read the
//! file back in chunks of exactly the sealed size, which is what the
//! session's chunk calibration tracks.

use crate::cipher::{Cipher, DEFAULT_CHUNK_SIZE};
use crate::error::{ErrorCategory, ErrorKind, Result, WindtalkerError};
use crate::passphrase::PassphraseReader;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use rand::RngCore;
use rand::rngs::OsRng;
use scrypt::{Params, scrypt};
use std::fmt;
use std::mem::size_of;
use tracing::debug;
use zeroize::Zeroizing;

/// Length of nonce in bytes
const NONCE_LEN: usize = 24;

/// Length of derived key in bytes
const KEY_LEN: usize = 32;

/// Salt for the session key derivation. Sessions built from the same
/// password must agree on the key, so it cannot be random.
const KDF_SALT: &[u8; 8] = b"wndtlkr1";

/// scrypt log2(N) parameter (CPU/memory cost)
const SCRYPT_LOG_N: u8 = 15;

/// scrypt r parameter (block size)
const SCRYPT_R: u32 = 8;

/// scrypt p parameter (parallelization)
const SCRYPT_P: u32 = 1;

/// Encrypt chunk sizes accepted by [`SymmetricCipher::set_encrypt_chunk_size`]
/// lie strictly between these two values.
pub const SESSION_CHUNK_MIN: usize = 1024 * 1024;
pub const SESSION_CHUNK_MAX: usize = 100 * 1024 * 1024;

/// The pair of chunk sizes a session streams files with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub encrypt_chunk_size: usize,
    pub decrypt_chunk_size: usize,
}

/// Symmetric cipher session bound to one password.
///
/// Invariant: `decrypt_chunk_size` is the token length produced by
/// encrypting exactly `encrypt_chunk_size` bytes under this session's key.
#[derive(Clone)]
pub struct SymmetricCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
    encrypt_chunk_size: usize,
    decrypt_chunk_size: usize,
}

impl fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricCipher")
            .field("encrypt_chunk_size", &self.encrypt_chunk_size)
            .field("decrypt_chunk_size", &self.decrypt_chunk_size)
            .finish_non_exhaustive()
    }
}

impl SymmetricCipher {
    /// Create a session from a password.
    pub fn new(password: impl AsRef<[u8]>) -> Result<Self> {
        Self::build(password.as_ref(), DEFAULT_CHUNK_SIZE)
    }

    /// Create a session from an injected password source.
    ///
    /// `None` fails with [`ErrorKind::NoPasswordProvided`]; there is no
    /// fallback lookup.
    pub fn from_reader(reader: Option<&mut dyn PassphraseReader>) -> Result<Self> {
        let reader = reader.ok_or_else(no_password)?;
        let password = reader.read_passphrase()?;
        Self::new(&*password)
    }

    /// Create a new session for another password, keeping this session's
    /// encrypt chunk size. The decrypt chunk size is measured again under
    /// the new key.
    pub fn with_password(&self, password: impl AsRef<[u8]>) -> Result<Self> {
        Self::build(password.as_ref(), self.encrypt_chunk_size)
    }

    fn build(password: &[u8], encrypt_chunk_size: usize) -> Result<Self> {
        if password.is_empty() {
            return Err(no_password());
        }
        let mut session = Self {
            key: derive_key(password)?,
            encrypt_chunk_size,
            decrypt_chunk_size: 0,
        };
        session.decrypt_chunk_size = session.calibrate(encrypt_chunk_size)?;
        Ok(session)
    }

    /// Change the encrypt chunk size, recalibrating the decrypt chunk size.
    ///
    /// `size` must lie strictly between 1 MiB and 100 MiB, otherwise this
    /// fails with [`ErrorKind::InvalidChunkSize`] and nothing changes.
    pub fn set_encrypt_chunk_size(&mut self, size: usize) -> Result<()> {
        if size <= SESSION_CHUNK_MIN || size >= SESSION_CHUNK_MAX {
            return Err(WindtalkerError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidChunkSize,
                format!(
                    "cannot set encrypt chunk size = {size}, \
                     encrypt chunk size has to be between 1MB and 100MB"
                ),
            ));
        }
        let decrypt_chunk_size = self.calibrate(size)?;
        self.encrypt_chunk_size = size;
        self.decrypt_chunk_size = decrypt_chunk_size;
        Ok(())
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            encrypt_chunk_size: self.encrypt_chunk_size,
            decrypt_chunk_size: self.decrypt_chunk_size,
        }
    }

    /// Measure the token length for a plaintext chunk of `size` bytes.
    fn calibrate(&self, size: usize) -> Result<usize> {
        let filler = vec![b'x'; size];
        let sealed = self.seal(&filler, &random_nonce())?.len();
        debug!(
            encrypt_chunk_size = size,
            decrypt_chunk_size = sealed,
            "calibrated chunk sizes"
        );
        Ok(sealed)
    }

    fn cipher(&self) -> XSalsa20Poly1305 {
        XSalsa20Poly1305::new(&(*self.key).into())
    }

    /// Seal `plaintext` under the given nonce into the token format.
    fn seal(&self, plaintext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
        let sealed_box = self
            .cipher()
            .encrypt(&Nonce::from(*nonce), plaintext)
            .map_err(|e| {
                WindtalkerError::with_kind(
                    ErrorCategory::Internal,
                    ErrorKind::CipherFailure,
                    format!("encryption failed: {}", e),
                )
            })?;

        let sealed_box_len = sealed_box.len() as i64;
        let mut output = Vec::with_capacity(NONCE_LEN + size_of::<i64>() + sealed_box.len());
        output.extend_from_slice(nonce);
        output.extend_from_slice(&sealed_box_len.to_be_bytes());
        output.extend_from_slice(&sealed_box);
        Ok(output)
    }

    /// Parse and open a token. Every failure is a password error.
    fn open(&self, token: &[u8]) -> Result<Vec<u8>> {
        let mut pos = 0;

        if token.len() < pos + NONCE_LEN {
            return Err(password_error("input likely truncated while reading nonce"));
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&token[pos..pos + NONCE_LEN]);
        pos += NONCE_LEN;

        if token.len() < pos + size_of::<i64>() {
            return Err(password_error(
                "input likely truncated while reading sealed box",
            ));
        }
        let mut length_bytes = [0u8; 8];
        length_bytes.copy_from_slice(&token[pos..pos + size_of::<i64>()]);
        let sealed_box_len = i64::from_be_bytes(length_bytes);
        pos += size_of::<i64>();

        if sealed_box_len < 0 {
            return Err(password_error(
                "negative sealed box length (when interpreted as a big-endian i64)",
            ));
        }
        let sealed_box_len = usize::try_from(sealed_box_len)
            .map_err(|_| password_error("sealed box length exceeds this system's max usize"))?;

        if token.len() - pos < sealed_box_len {
            return Err(password_error(
                "truncated or corrupt input; claimed length greater than available input",
            ));
        }
        let sealed_box = &token[pos..pos + sealed_box_len];
        pos += sealed_box_len;

        if pos < token.len() {
            return Err(password_error(
                "invalid input: unexpected data after sealed box",
            ));
        }

        self.cipher()
            .decrypt(&Nonce::from(nonce), sealed_box)
            .map_err(|_| password_error("Ops, wrong magic word!"))
    }
}

impl Cipher for SymmetricCipher {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.seal(data, &random_nonce())
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.open(data)
    }

    fn encrypt_chunk_size(&self) -> usize {
        self.encrypt_chunk_size
    }

    fn decrypt_chunk_size(&self) -> usize {
        self.decrypt_chunk_size
    }
}

/// Derive the 32-byte session key from a password using scrypt
fn derive_key(password: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN).map_err(|e| {
        WindtalkerError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "failed to create scrypt params",
            e,
        )
    })?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt(password, KDF_SALT, &params, &mut *key).map_err(|e| {
        WindtalkerError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "scrypt key derivation failed",
            e,
        )
    })?;
    Ok(key)
}

fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn password_error(msg: &str) -> WindtalkerError {
    WindtalkerError::with_kind(ErrorCategory::User, ErrorKind::PasswordError, msg)
}

fn no_password() -> WindtalkerError {
    WindtalkerError::with_kind(
        ErrorCategory::User,
        ErrorKind::NoPasswordProvided,
        "no password provided",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passphrase::ConstantPassphraseReader;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_text_round_trip_and_wrong_password() {
        let cipher = SymmetricCipher::new("MyPassword").unwrap();
        let s = "Turn right at blue tree";

        let encrypted = cipher.encrypt_text(s).unwrap();
        assert_ne!(encrypted, s);
        assert_eq!(cipher.decrypt_text(&encrypted).unwrap(), s);

        let other = SymmetricCipher::new("AnotherPassword").unwrap();
        let err = other.decrypt_text(&encrypted).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PasswordError));
    }

    #[test]
    fn test_same_password_same_key() {
        let a = SymmetricCipher::new(b"shared").unwrap();
        let b = SymmetricCipher::new(b"shared").unwrap();
        let token = a.encrypt(b"hello").unwrap();
        assert_eq!(b.decrypt(&token).unwrap(), b"hello");
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let cipher = SymmetricCipher::new("pw").unwrap();
        let t1 = cipher.encrypt(b"same").unwrap();
        let t2 = cipher.encrypt(b"same").unwrap();
        assert_ne!(t1, t2);
        assert_eq!(cipher.decrypt(&t1).unwrap(), cipher.decrypt(&t2).unwrap());
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = SymmetricCipher::new("pw").unwrap();
        let token = cipher.encrypt(b"").unwrap();
        assert_eq!(cipher.decrypt(&token).unwrap(), b"");
    }

    #[test]
    fn test_seal_is_deterministic_for_fixed_nonce() {
        let cipher = SymmetricCipher::new("pw").unwrap();
        let nonce = [0x24u8; NONCE_LEN];
        let t1 = cipher.seal(b"test payload", &nonce).unwrap();
        let t2 = cipher.seal(b"test payload", &nonce).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(&t1[..NONCE_LEN], &nonce);
        // nonce + length + payload + MAC
        assert_eq!(t1.len(), NONCE_LEN + 8 + 12 + 16);
        assert_eq!(&t1[NONCE_LEN..NONCE_LEN + 8], &28i64.to_be_bytes());
    }

    #[test]
    fn test_default_chunk_calibration() {
        let cipher = SymmetricCipher::new("pw").unwrap();
        let meta = cipher.metadata();
        assert_eq!(meta.encrypt_chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(
            meta.decrypt_chunk_size,
            cipher.encrypt(&vec![0u8; DEFAULT_CHUNK_SIZE]).unwrap().len()
        );
        assert!(meta.decrypt_chunk_size > meta.encrypt_chunk_size);
    }

    #[test]
    fn test_set_encrypt_chunk_size() {
        let mut cipher = SymmetricCipher::new("pw").unwrap();
        cipher.set_encrypt_chunk_size(2 * MIB).unwrap();
        let meta = cipher.metadata();
        assert_eq!(meta.encrypt_chunk_size, 2 * MIB);
        assert_eq!(
            meta.decrypt_chunk_size,
            cipher.encrypt(&vec![7u8; 2 * MIB]).unwrap().len()
        );
    }

    #[test]
    fn test_chunk_size_bounds_are_exclusive() {
        let mut cipher = SymmetricCipher::new("pw").unwrap();
        cipher.set_encrypt_chunk_size(3 * MIB).unwrap();
        let before = cipher.metadata();

        for size in [0, MIB, 100 * MIB, 200 * MIB] {
            let err = cipher.set_encrypt_chunk_size(size).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::InvalidChunkSize));
            assert_eq!(cipher.metadata(), before);
        }
    }

    #[test]
    fn test_with_password_builds_new_session() {
        let mut original = SymmetricCipher::new("first").unwrap();
        original.set_encrypt_chunk_size(2 * MIB).unwrap();

        let replaced = original.with_password("second").unwrap();
        assert_eq!(replaced.metadata(), original.metadata());

        let token = replaced.encrypt(b"secret").unwrap();
        assert_eq!(replaced.decrypt(&token).unwrap(), b"secret");
        let err = original.decrypt(&token).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PasswordError));
    }

    #[test]
    fn test_missing_password() {
        let err = SymmetricCipher::from_reader(None).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NoPasswordProvided));

        let err = SymmetricCipher::new("").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NoPasswordProvided));
    }

    #[test]
    fn test_from_reader() {
        let mut constant = ConstantPassphraseReader::new(b"from reader".to_vec());
        let reader: &mut dyn PassphraseReader = &mut constant;
        let a = SymmetricCipher::from_reader(Some(reader)).unwrap();
        let b = SymmetricCipher::new("from reader").unwrap();
        assert_eq!(b.decrypt(&a.encrypt(b"x").unwrap()).unwrap(), b"x");
    }

    #[test]
    fn test_malformed_tokens_are_password_errors() {
        let cipher = SymmetricCipher::new("pw").unwrap();
        let good = cipher.encrypt(b"hello").unwrap();

        let mut negative = good.clone();
        negative[NONCE_LEN..NONCE_LEN + 8].copy_from_slice(&(-1i64).to_be_bytes());

        let mut too_long = good.clone();
        too_long[NONCE_LEN..NONCE_LEN + 8].copy_from_slice(&1_000_000i64.to_be_bytes());

        let mut trailing = good.clone();
        trailing.push(0xFF);

        let mut flipped = good.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0x01;

        for token in [
            vec![1, 2, 3],
            vec![0u8; NONCE_LEN + 3],
            negative,
            too_long,
            trailing,
            flipped,
        ] {
            let err = cipher.decrypt(&token).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::PasswordError));
        }
    }

    #[test]
    fn test_debug_hides_key() {
        let cipher = SymmetricCipher::new("pw").unwrap();
        let shown = format!("{:?}", cipher);
        assert!(shown.contains("encrypt_chunk_size"));
        assert!(!shown.contains("key"));
    }
}
