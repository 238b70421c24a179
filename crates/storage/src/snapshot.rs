//! Keyspace snapshot files
//!
//! A snapshot captures the live keyspace of a [`VersionedStore`] at its latest
//! version. The CLI loads one before a run so an external generator can seed
//! instructions, and writes one afterwards for an external verifier.
//!
//! # File Layout
//!
//! ```text
//! [magic: "STKS"][format version: u32 LE][bincode payload]
//! ```
//!
//! Files are written to a temporary path, synced, then renamed into place.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use stacktester_core::KeyValue;
use thiserror::Error;
use tracing::info;

use crate::versioned::VersionedStore;

const SNAPSHOT_MAGIC: &[u8; 4] = b"STKS";
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Snapshot file errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem failure
    #[error("snapshot I/O error: {0}")]
    Io(#[from] io::Error),

    /// Payload could not be encoded or decoded
    #[error("snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// File does not start with the snapshot magic
    #[error("not a snapshot file: bad magic")]
    BadMagic,

    /// File was written by an unknown format version
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u32),
}

/// Result type alias for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotData {
    version: u64,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

/// Write the live keyspace of `store` to `path`.
pub fn save(store: &VersionedStore, path: &Path) -> Result<()> {
    let data = SnapshotData {
        version: store.version(),
        entries: store
            .latest_entries()
            .into_iter()
            .map(|kv| (kv.key, kv.value))
            .collect(),
    };
    let payload = bincode::serialize(&data)?;

    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(SNAPSHOT_MAGIC);
    buf.extend_from_slice(&SNAPSHOT_FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    info!(
        path = %path.display(),
        keys = data.entries.len(),
        version = data.version,
        "Saved keyspace snapshot"
    );
    Ok(())
}

/// Replace the contents of `store` with the snapshot at `path`.
pub fn load(store: &VersionedStore, path: &Path) -> Result<()> {
    let buf = fs::read(path)?;
    if buf.len() < 8 || &buf[0..4] != SNAPSHOT_MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let mut format = [0u8; 4];
    format.copy_from_slice(&buf[4..8]);
    let format = u32::from_le_bytes(format);
    if format != SNAPSHOT_FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(format));
    }
    let data: SnapshotData = bincode::deserialize(&buf[8..])?;

    info!(
        path = %path.display(),
        keys = data.entries.len(),
        version = data.version,
        "Loaded keyspace snapshot"
    );
    let entries = data
        .entries
        .into_iter()
        .map(|(k, v)| KeyValue::new(k, v))
        .collect();
    store.load(entries, data.version);
    Ok(())
}
