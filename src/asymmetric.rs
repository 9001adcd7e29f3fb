//! RSA cipher for short secrets
//!
//! Meant for exchanging small payloads such as a symmetric password between
//! two parties: messages are encrypted to the peer's public key and may carry
//! a detached signature made with the sender's private key. Each message has
//! to fit in a single RSA block, so files and directories are refused.

use crate::cipher::{Cipher, FileOptions};
use crate::error::{ErrorCategory, ErrorKind, Result, WindtalkerError};
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Modulus size used by [`AsymmetricCipher::new_default_keys`].
pub const DEFAULT_KEY_BITS: usize = 2048;

const BULK_DATA_MESSAGE: &str = "asymmetric encryption is only meant for exchanging short secrets \
     (such as a symmetric key); it is not suitable for file or directory encryption";

/// Hash algorithm for detached signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignMethod {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl SignMethod {
    pub const ALL: [SignMethod; 4] = [
        SignMethod::Sha224,
        SignMethod::Sha256,
        SignMethod::Sha384,
        SignMethod::Sha512,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SignMethod::Sha224 => "SHA-224",
            SignMethod::Sha256 => "SHA-256",
            SignMethod::Sha384 => "SHA-384",
            SignMethod::Sha512 => "SHA-512",
        }
    }

    fn scheme(self) -> Pkcs1v15Sign {
        match self {
            SignMethod::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
            SignMethod::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
            SignMethod::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
            SignMethod::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        }
    }

    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            SignMethod::Sha224 => Sha224::digest(data).to_vec(),
            SignMethod::Sha256 => Sha256::digest(data).to_vec(),
            SignMethod::Sha384 => Sha384::digest(data).to_vec(),
            SignMethod::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for SignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignMethod {
    type Err = WindtalkerError;

    /// Accepts names like `SHA-256`, `sha256` or `Sha-256`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "sha224" => Ok(SignMethod::Sha224),
            "sha256" => Ok(SignMethod::Sha256),
            "sha384" => Ok(SignMethod::Sha384),
            "sha512" => Ok(SignMethod::Sha512),
            _ => Err(WindtalkerError::new(
                ErrorCategory::User,
                format!(
                    "unknown sign method '{s}', use one of 'SHA-224', 'SHA-256', 'SHA-384', 'SHA-512'"
                ),
            )),
        }
    }
}

/// One party's side of an RSA exchange.
///
/// Not meant to be shared across threads: the last signature made by
/// [`AsymmetricCipher::encrypt_with`] is kept in a `RefCell`.
pub struct AsymmetricCipher {
    my_public: RsaPublicKey,
    my_private: RsaPrivateKey,
    his_public: RsaPublicKey,
    signature: RefCell<Option<Vec<u8>>>,
}

impl fmt::Debug for AsymmetricCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsymmetricCipher")
            .field("my_key_bits", &(self.my_public.size() * 8))
            .field("his_key_bits", &(self.his_public.size() * 8))
            .finish_non_exhaustive()
    }
}

impl AsymmetricCipher {
    /// `my_public`/`my_private` are this party's keys; `his_public` is the
    /// peer's public key that messages get encrypted to.
    pub fn new(my_public: RsaPublicKey, my_private: RsaPrivateKey, his_public: RsaPublicKey) -> Self {
        Self {
            my_public,
            my_private,
            his_public,
            signature: RefCell::new(None),
        }
    }

    /// Generate a fresh key pair with a modulus of `bits` bits.
    pub fn new_keys(bits: usize) -> Result<(RsaPublicKey, RsaPrivateKey)> {
        let private = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| {
            WindtalkerError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::KeyDerivation,
                format!("failed to generate a {bits}-bit RSA key pair"),
                e,
            )
        })?;
        Ok((RsaPublicKey::from(&private), private))
    }

    /// Generate a fresh key pair of [`DEFAULT_KEY_BITS`] bits.
    pub fn new_default_keys() -> Result<(RsaPublicKey, RsaPrivateKey)> {
        Self::new_keys(DEFAULT_KEY_BITS)
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.my_public
    }

    /// Encrypt `data` to the peer's public key.
    ///
    /// With `use_sign` a detached signature over `data` is made with this
    /// party's private key and kept for [`AsymmetricCipher::signature`].
    pub fn encrypt_with(&self, data: &[u8], use_sign: bool, method: SignMethod) -> Result<Vec<u8>> {
        let token = self
            .his_public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
            .map_err(|e| {
                WindtalkerError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::CipherFailure,
                    format!("RSA encryption of {} bytes failed", data.len()),
                    e,
                )
            })?;
        let signature = if use_sign {
            Some(
                self.my_private
                    .sign(method.scheme(), &method.digest(data))
                    .map_err(|e| {
                        WindtalkerError::with_kind_and_source(
                            ErrorCategory::Internal,
                            ErrorKind::CipherFailure,
                            format!("failed to sign with {method}"),
                            e,
                        )
                    })?,
            )
        } else {
            None
        };
        *self.signature.borrow_mut() = signature;
        Ok(token)
    }

    /// Decrypt a token with this party's private key. If `signature` is
    /// given it must verify against the peer's public key.
    pub fn decrypt_with(&self, token: &[u8], signature: Option<&[u8]>) -> Result<Vec<u8>> {
        let data = self
            .my_private
            .decrypt(Pkcs1v15Encrypt, token)
            .map_err(|e| {
                WindtalkerError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::CipherFailure,
                    "RSA decryption failed",
                    e,
                )
            })?;
        if let Some(signature) = signature {
            self.verify(&data, signature)?;
        }
        Ok(data)
    }

    /// The signature made by the most recent signed encryption, if any.
    pub fn signature(&self) -> Option<Vec<u8>> {
        self.signature.borrow().clone()
    }

    /// Verify `signature` over `data` against the peer's public key, with
    /// whichever supported hash the signer used.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let verified = SignMethod::ALL.iter().any(|method| {
            self.his_public
                .verify(method.scheme(), &method.digest(data), signature)
                .is_ok()
        });
        if verified {
            Ok(())
        } else {
            Err(WindtalkerError::with_kind(
                ErrorCategory::User,
                ErrorKind::SignatureError,
                "signature verification failed",
            ))
        }
    }
}

impl Cipher for AsymmetricCipher {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.encrypt_with(data, true, SignMethod::default())
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_with(data, None)
    }

    fn encrypt_file(&self, _: &Path, _: Option<&Path>, _: &FileOptions) -> Result<PathBuf> {
        Err(bulk_data_refused())
    }

    fn decrypt_file(&self, _: &Path, _: Option<&Path>, _: &FileOptions) -> Result<PathBuf> {
        Err(bulk_data_refused())
    }

    fn encrypt_dir(&self, _: &Path, _: Option<&Path>, _: &FileOptions) -> Result<PathBuf> {
        Err(bulk_data_refused())
    }

    fn decrypt_dir(&self, _: &Path, _: Option<&Path>, _: &FileOptions) -> Result<PathBuf> {
        Err(bulk_data_refused())
    }
}

fn bulk_data_refused() -> WindtalkerError {
    WindtalkerError::with_kind(
        ErrorCategory::User,
        ErrorKind::UnimplementedOperation,
        BULK_DATA_MESSAGE,
    )
}
