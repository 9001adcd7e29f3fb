//! Path derivation test vectors

use serde::Deserialize;
use std::path::{Path, PathBuf};
use windtalker::paths::{decrypted_dir_path, decrypted_path, encrypted_dir_path, encrypted_path};
use windtalker::{DEFAULT_SUFFIX, ErrorKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Kind {
    File,
    Dir,
}

#[derive(Debug, Deserialize)]
struct PathVector {
    kind: Kind,
    original: String,
    encrypted: String,
    comment: String,
}

fn load_path_vectors() -> Vec<PathVector> {
    let json_data = include_str!("../testdata/path-vectors.json");
    serde_json::from_str(json_data).expect("failed to parse path vectors")
}

#[test]
fn test_path_vectors() {
    let vectors = load_path_vectors();
    assert!(!vectors.is_empty(), "No path vectors were loaded");

    for vector in &vectors {
        let original = Path::new(&vector.original);
        let expected = PathBuf::from(&vector.encrypted);

        let (encrypted, recovered) = match vector.kind {
            Kind::File => {
                let e = encrypted_path(original, DEFAULT_SUFFIX).unwrap();
                let r = decrypted_path(&e, DEFAULT_SUFFIX).unwrap();
                (e, r)
            }
            Kind::Dir => {
                let e = encrypted_dir_path(original, DEFAULT_SUFFIX).unwrap();
                let r = decrypted_dir_path(&e, DEFAULT_SUFFIX).unwrap();
                (e, r)
            }
        };

        assert_eq!(encrypted, expected, "encrypting: {}", vector.comment);
        assert_eq!(recovered, original, "round trip: {}", vector.comment);
    }
}

#[test]
fn test_originals_are_not_encrypted_paths() {
    for vector in load_path_vectors() {
        let original = Path::new(&vector.original);
        let err = match vector.kind {
            Kind::File => decrypted_path(original, DEFAULT_SUFFIX).unwrap_err(),
            Kind::Dir => decrypted_dir_path(original, DEFAULT_SUFFIX).unwrap_err(),
        };
        assert_eq!(err.kind, Some(ErrorKind::PathNotEncrypted), "{}", vector.comment);
    }
}
