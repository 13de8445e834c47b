//! Snapshot file format and atomic persistence

use crate::storage::entry::Entry;
use crate::StoreResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Ordering counters persisted alongside the entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    /// Best-effort item count from the profile page; only seeds `next_index`
    pub approximate_total: Option<u64>,

    /// Index handed to the next created entry; counts down
    pub next_index: Option<i64>,
}

/// Full persisted state of the entry store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub counts: Counts,
}

/// Why a snapshot could not be loaded
#[derive(Debug)]
pub enum LoadFailure {
    Missing,
    Unreadable(std::io::Error),
    Corrupt(serde_json::Error),
}

/// Reads and parses the snapshot at `path`
pub async fn read_snapshot(path: &Path) -> Result<Snapshot, LoadFailure> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(LoadFailure::Missing),
        Err(e) => return Err(LoadFailure::Unreadable(e)),
    };
    serde_json::from_slice(&bytes).map_err(LoadFailure::Corrupt)
}

/// Path the snapshot is written to before being renamed into place
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `bytes` to `path` without ever exposing a truncated file
///
/// The data goes to a sibling temp file which is synced and then renamed
/// over the destination.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/a/database.json")),
            PathBuf::from("/a/database.json.tmp")
        );
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = Snapshot {
            entries: vec![Entry::new("/p/1", 3, None)],
            counts: Counts {
                approximate_total: Some(3),
                next_index: Some(2),
            },
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["counts"]["approximateTotal"], 3);
        assert_eq!(json["counts"]["nextIndex"], 2);
        assert_eq!(json["entries"][0]["key"], "/p/1");
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("database.json");
        let snapshot = Snapshot {
            entries: vec![Entry::new("/p/9", 9, Some("c1".to_string()))],
            counts: Counts::default(),
        };

        write_atomic(&path, &serde_json::to_vec(&snapshot).unwrap())
            .await
            .unwrap();

        assert!(!temp_path(&path).exists());
        let loaded = read_snapshot(&path).await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let dir = TempDir::new().unwrap();
        let result = read_snapshot(&dir.path().join("none.json")).await;
        assert!(matches!(result, Err(LoadFailure::Missing)));
    }

    #[tokio::test]
    async fn test_read_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("database.json");
        std::fs::write(&path, br#"{"entries": [{"key": "/p/1", "ind"#).unwrap();

        let result = read_snapshot(&path).await;
        assert!(matches!(result, Err(LoadFailure::Corrupt(_))));
    }
}
