//! Cosigner key loading.
//!
//! Key `i` is resolved in this order:
//!
//! 1. `COSIGNER_{i}_SK` from the environment: a base64 seed. A 64-byte value
//!    (seed followed by public key) is accepted and truncated to the seed.
//! 2. `{key_dir}/cosigner_{i}.key`: the same encoding, one line.
//! 3. Otherwise a fresh key is generated and written to
//!    `{key_dir}/cosigner_{i}.key` with its public half in
//!    `cosigner_{i}.pub`. This is dev mode and is logged as a warning.
//!
//! The environment is read through a lookup closure so tests never touch
//! process state.

use std::fs;
use std::path::{Path, PathBuf};

use nexo_core::{decode_base64, encode_base64, CryptoError};

use crate::cosign::{CosignerId, CosignerKey, CosignerPublic, CosignerRoster};
use crate::ed25519::Ed25519PublicKey;
use crate::error::CosignError;

/// Environment variable holding cosigner `index`'s seed.
pub fn env_var_name(index: usize) -> String {
    format!("COSIGNER_{index}_SK")
}

/// Path of cosigner `index`'s private key file.
pub fn key_file(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{}.key", CosignerId::indexed(index)))
}

/// Path of cosigner `index`'s public key file.
pub fn pub_file(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{}.pub", CosignerId::indexed(index)))
}

fn parse_seed(source: &str, encoded: &str) -> Result<[u8; 32], CosignError> {
    let bytes = decode_base64(source, encoded.trim())
        .map_err(|e| CryptoError::KeyError(e.to_string()))?;
    match bytes.len() {
        32 | 64 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes[..32]);
            Ok(seed)
        }
        n => Err(CryptoError::KeyError(format!(
            "{source}: cosigner seed must be 32 or 64 bytes, got {n}"
        ))
        .into()),
    }
}

fn read_file(path: &Path) -> Result<String, CosignError> {
    fs::read_to_string(path).map_err(|source| CosignError::KeyFile {
        path: path.display().to_string(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), CosignError> {
    fs::write(path, contents).map_err(|source| CosignError::KeyFile {
        path: path.display().to_string(),
        source,
    })
}

/// Write a key pair as `cosigner_{index}.key` and `cosigner_{index}.pub`.
pub fn write_key_files(dir: &Path, index: usize, key: &CosignerKey) -> Result<(), CosignError> {
    fs::create_dir_all(dir).map_err(|source| CosignError::KeyFile {
        path: dir.display().to_string(),
        source,
    })?;
    if let Some(seed) = key.seed() {
        write_file(&key_file(dir, index), &encode_base64(&seed))?;
    }
    write_file(&pub_file(dir, index), &key.public_key().to_base64())
}

/// Resolve `n` cosigner keys from the environment, the key directory, or
/// fresh generation, in that order.
pub fn load_or_generate<F>(n: usize, key_dir: &Path, env: F) -> Result<Vec<CosignerKey>, CosignError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut keys = Vec::with_capacity(n);
    for i in 0..n {
        let id = CosignerId::indexed(i);
        let var = env_var_name(i);
        let path = key_file(key_dir, i);

        let key = if let Some(encoded) = env(&var) {
            tracing::debug!(cosigner = %id, "loaded cosigner key from {var}");
            CosignerKey::from_seed(id, &parse_seed(&var, &encoded)?)
        } else if path.exists() {
            let encoded = read_file(&path)?;
            tracing::debug!(cosigner = %id, path = %path.display(), "loaded cosigner key from file");
            CosignerKey::from_seed(id, &parse_seed(&path.display().to_string(), &encoded)?)
        } else {
            let key = CosignerKey::generate(id);
            write_key_files(key_dir, i, &key)?;
            tracing::warn!(
                cosigner = %key.id(),
                path = %path.display(),
                "generated dev cosigner key; set {var} in production"
            );
            key
        };
        keys.push(key);
    }
    Ok(keys)
}

/// Build a roster from `cosigner_{i}.pub` files in `dir`, for `i` counting
/// up from zero until the first missing file.
pub fn load_public_roster(dir: &Path) -> Result<CosignerRoster, CosignError> {
    let mut cosigners = Vec::new();
    for i in 0.. {
        let path = pub_file(dir, i);
        if !path.exists() {
            break;
        }
        let public_key = Ed25519PublicKey::from_base64(read_file(&path)?.trim())?;
        cosigners.push(CosignerPublic {
            id: CosignerId::indexed(i),
            public_key,
        });
    }
    CosignerRoster::new(cosigners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn generates_and_persists_when_nothing_configured() {
        let dir = tempfile::tempdir().unwrap();
        let keys = load_or_generate(3, dir.path(), no_env).unwrap();
        assert_eq!(keys.len(), 3);
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(key.id(), &CosignerId::indexed(i));
            assert!(key_file(dir.path(), i).exists());
            assert!(pub_file(dir.path(), i).exists());
        }
    }

    #[test]
    fn reloads_persisted_keys() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_generate(3, dir.path(), no_env).unwrap();
        let second = load_or_generate(3, dir.path(), no_env).unwrap();
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.public_key(), b.public_key());
        }
    }

    #[test]
    fn env_overrides_key_file() {
        let dir = tempfile::tempdir().unwrap();
        load_or_generate(2, dir.path(), no_env).unwrap();

        let seed = [9u8; 32];
        let env: HashMap<String, String> =
            [(env_var_name(1), encode_base64(&seed))].into_iter().collect();
        let keys = load_or_generate(2, dir.path(), |k| env.get(k).cloned()).unwrap();
        assert_eq!(
            keys[1].public_key(),
            CosignerKey::from_seed(CosignerId::indexed(1), &seed).public_key()
        );
    }

    #[test]
    fn accepts_64_byte_env_value() {
        let dir = tempfile::tempdir().unwrap();
        let seed = [3u8; 32];
        let key = CosignerKey::from_seed(CosignerId::indexed(0), &seed);
        let mut full = seed.to_vec();
        full.extend_from_slice(key.public_key().as_bytes());
        let encoded = encode_base64(&full);
        let keys = load_or_generate(1, dir.path(), |_| Some(encoded.clone())).unwrap();
        assert_eq!(keys[0].public_key(), key.public_key());
    }

    #[test]
    fn rejects_bad_seed_length() {
        let dir = tempfile::tempdir().unwrap();
        let encoded = encode_base64(&[1u8; 16]);
        let err = load_or_generate(1, dir.path(), |_| Some(encoded.clone())).unwrap_err();
        assert!(matches!(err, CosignError::Crypto(_)));
    }

    #[test]
    fn public_roster_from_pub_files() {
        let dir = tempfile::tempdir().unwrap();
        let keys = load_or_generate(3, dir.path(), no_env).unwrap();
        let roster = load_public_roster(dir.path()).unwrap();
        assert_eq!(roster.len(), 3);
        for key in &keys {
            assert_eq!(roster.public_key(key.id()), Some(key.public_key()));
        }
    }

    #[test]
    fn public_roster_of_empty_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_public_roster(dir.path()).unwrap().is_empty());
    }
}
