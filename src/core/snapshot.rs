//! # Snapshots
//!
//! Save/restore a navigation tree so a host can start from a known state
//! instead of the registry's initial one.
//!
//! A snapshot is a JSON file holding lightweight metadata plus the full tree.
//! Writes use atomic rename (write `.tmp`, then `rename()`) for crash safety,
//! and loads are checked with `state::validate` before they are handed out.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::state::{self, Route};

/// Summary metadata stored next to the tree.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SnapshotMeta {
    pub root_key: String,
    /// Node key of the focused leaf at save time.
    pub focused_key: String,
    pub saved_at: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SnapshotData {
    pub meta: SnapshotMeta,
    pub state: Route,
}

impl SnapshotData {
    pub fn new(state: Route) -> Self {
        let meta = SnapshotMeta {
            root_key: state.key.clone(),
            focused_key: state::current(&state).key.clone(),
            saved_at: Utc::now().timestamp(),
        };
        Self { meta, state }
    }
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Save `state` to `path`, creating parent directories as needed.
pub fn save_snapshot(path: &Path, state: &Route) -> io::Result<SnapshotMeta> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let data = SnapshotData::new(state.clone());
    atomic_write_json(path, &data)?;
    info!("Snapshot saved to {} (focused {})", path.display(), data.meta.focused_key);
    Ok(data.meta)
}

/// Load a snapshot and check the tree's invariants.
pub fn load_snapshot(path: &Path) -> io::Result<SnapshotData> {
    let json = fs::read_to_string(path)?;
    let data: SnapshotData =
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    state::validate(&data.state).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    debug!("Snapshot loaded from {}: root={}", path.display(), data.meta.root_key);
    Ok(data)
}
