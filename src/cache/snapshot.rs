//! Snapshot Module
//!
//! Durable copy of the cache: a JSON object mapping each key to its entry,
//! rewritten as a whole on every mutation.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

/// Reads every entry recorded in the snapshot at `path`.
///
/// A missing file yields an empty map. Unreadable or malformed content is
/// an error; callers decide whether to degrade to an empty cache.
pub fn load(path: &Path) -> Result<HashMap<String, CacheEntry>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(CacheError::Snapshot(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    serde_json::from_str(&raw).map_err(|e| {
        CacheError::Snapshot(format!("failed to parse {}: {}", path.display(), e))
    })
}

/// Replaces the snapshot at `path` with `entries`.
///
/// The content is written to a sibling temp file first and renamed over the
/// target, so readers observe either the old or the new snapshot in full.
pub fn save(path: &Path, entries: &HashMap<String, CacheEntry>) -> Result<()> {
    // Sorted for stable, diffable output.
    let ordered: BTreeMap<&String, &CacheEntry> = entries.iter().collect();
    let content = serde_json::to_string_pretty(&ordered)
        .map_err(|e| CacheError::Snapshot(format!("failed to encode snapshot: {}", e)))?;

    let temp_path = temp_path_for(path);
    write_synced(&temp_path, content.as_bytes()).map_err(|e| {
        CacheError::Snapshot(format!(
            "failed to write temp file {}: {}",
            temp_path.display(),
            e
        ))
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        CacheError::Snapshot(format!(
            "failed to rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        ))
    })
}

/// `<file name>.tmp` next to `path`; never equal to `path` itself.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
