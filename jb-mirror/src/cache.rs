use crate::digest::hex_string;
use crate::error::MirrorError;
use sha2::Digest as _;
use std::path::PathBuf;

/// Lookup/store capability for raw API responses.
///
/// A miss is `Ok(None)`; only actual persistence faults are errors.
pub trait ResponseCache {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, MirrorError>;

    fn put(&mut self, key: &str, value: &serde_json::Value) -> Result<(), MirrorError>;
}

/// Caching disabled: every lookup misses, every store is discarded.
#[derive(Debug, Default)]
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, MirrorError> {
        Ok(None)
    }

    fn put(&mut self, _key: &str, _value: &serde_json::Value) -> Result<(), MirrorError> {
        Ok(())
    }
}

/// Durable cache storing each payload under the SHA-256 of its key.
#[derive(Debug)]
pub struct DiskCache {
    destination: PathBuf,
}

impl DiskCache {
    pub fn new(destination: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        let destination = destination.into();
        // A pre-existing directory is fine.
        std::fs::create_dir_all(&destination)?;

        Ok(Self { destination })
    }

    fn file_path(&self, key: &str) -> PathBuf {
        let mut hasher = sha2::Sha256::new();
        hasher.update(key.as_bytes());

        self.destination.join(hex_string(hasher.finalize().as_slice()))
    }
}

impl ResponseCache for DiskCache {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, MirrorError> {
        let file = self.file_path(key);

        let contents = match std::fs::read(&file) {
            Ok(v) => v,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Cache miss for {} at {}", key, file.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!("Cache hit for {} at {}", key, file.display());
        Ok(Some(serde_json::from_slice(&contents)?))
    }

    fn put(&mut self, key: &str, value: &serde_json::Value) -> Result<(), MirrorError> {
        let file = self.file_path(key);
        let payload = serde_json::to_vec(value)?;

        std::fs::write(&file, payload).map_err(|source| MirrorError::CacheWrite {
            key: key.to_owned(),
            source,
        })?;

        tracing::debug!("Caching flush for {} at {}", key, file.display());
        Ok(())
    }
}
