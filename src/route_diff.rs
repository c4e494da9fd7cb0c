// Change detection between two published combined snapshots.
//
// Downstream caches key on the combined route key, so each dirty key gets
// a freshness timestamp file rather than the diff being applied anywhere.

use crate::models::OperatorRoute;
use crate::snapshot::SnapshotError;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref HOSTILE_FILENAME_CHARS: Regex = Regex::new(r#"[\\/:*?"<>|]"#).unwrap();
}

/// Content id of one reconciled record, over its canonical JSON encoding.
pub fn record_hash(route: &OperatorRoute) -> u64 {
    let encoded = serde_json::to_vec(route).unwrap();
    seahash::hash(&encoded)
}

/// Route keys whose records differ between the two snapshots, including
/// keys only one side carries. Order follows the new snapshot, removed
/// keys last.
pub fn dirty_route_keys(
    old: &BTreeMap<String, OperatorRoute>,
    new: &BTreeMap<String, OperatorRoute>,
) -> Vec<String> {
    let mut dirty = Vec::new();
    for (key, record) in new {
        match old.get(key) {
            Some(previous) if record_hash(previous) == record_hash(record) => {}
            _ => dirty.push(key.clone()),
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            dirty.push(key.clone());
        }
    }
    dirty
}

/// Timestamp files are served straight from object storage, so the key is
/// stripped of filesystem-hostile characters and upper-cased.
pub fn timestamp_filename(key: &str) -> String {
    HOSTILE_FILENAME_CHARS.replace_all(key, "").to_uppercase()
}

/// Writes `timestamp` (unix seconds) into one file per dirty key.
pub fn write_route_timestamps(
    directory: &Path,
    keys: &[String],
    timestamp: i64,
) -> Result<(), SnapshotError> {
    fs::create_dir_all(directory).map_err(|source| SnapshotError::Io {
        path: directory.to_path_buf(),
        source,
    })?;
    for key in keys {
        let path = directory.join(timestamp_filename(key));
        fs::write(&path, timestamp.to_string()).map_err(|source| SnapshotError::Io {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}
