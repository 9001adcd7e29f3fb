//! Windtalker - encrypt and decrypt text, binary data, files and whole
//! directory trees through one interface, whatever cipher sits underneath.
//!
//! A cipher only has to implement [`Cipher::encrypt`] and
//! [`Cipher::decrypt`]; text, file and directory handling come with the
//! trait. Two ciphers ship with the crate:
//!
//! - [`SymmetricCipher`]: password based, for any amount of data.
//! - [`AsymmetricCipher`]: RSA, for exchanging short secrets only.

#![forbid(unsafe_code)]

pub mod asymmetric;
pub mod cipher;
pub mod error;
pub mod mirror;
pub mod passphrase;
pub mod paths;
pub mod symmetric;
pub mod transform;

pub use asymmetric::{AsymmetricCipher, SignMethod};
pub use cipher::{Cipher, FileOptions};
pub use error::{ErrorCategory, ErrorKind, Result, WindtalkerError};
pub use paths::DEFAULT_SUFFIX;
pub use symmetric::{ChunkMetadata, SymmetricCipher};
