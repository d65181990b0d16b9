//! Atomic whole-file JSON rewrite, used by every durable store in this
//! crate: write one temp file in the target's directory via
//! `tempfile::Builder`, then rename it over the target so a reader never
//! observes a partial write.

use std::path::Path;

use crate::error::{Result, StoreError};

/// Serialize `value` to JSON and atomically replace the file at `path`.
/// Creates the parent directory if missing.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(StoreError::Io)?;
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".bridge-tmp-")
        .suffix(".json")
        .tempfile_in(dir)
        .map_err(StoreError::Io)?;

    let contents = serde_json::to_vec_pretty(value).map_err(StoreError::Serialization)?;
    use std::io::Write;
    tmp.write_all(&contents).map_err(StoreError::Io)?;
    tmp.flush().map_err(StoreError::Io)?;

    tmp.persist(path)
        .map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Read and deserialize a JSON document from `path`, returning `default()`
/// when the file does not exist yet.
pub fn read_json_or_default<T: serde::de::DeserializeOwned>(
    path: &Path,
    default: impl FnOnce() -> T,
) -> Result<T> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::Serialization),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(default()),
        Err(e) => Err(StoreError::Io(e)),
    }
}
