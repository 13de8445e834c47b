//! In-memory entry store backed by a JSON snapshot

use crate::storage::entry::{is_known_provider, Entry, EntryUpdate};
use crate::storage::snapshot::{read_snapshot, write_atomic, Counts, LoadFailure, Snapshot};
use crate::url::{media_basename, media_file_name};
use crate::{StoreError, StoreResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// Keyed collection of discovered entries
///
/// The store is shared by the pagination driver and every item worker. All
/// in-memory state sits behind one mutex that is never held across an
/// `.await`, so each operation is atomic with respect to the others.
/// The store is the only writer of the snapshot file.
pub struct EntryStore {
    database_path: PathBuf,
    media_dir: PathBuf,
    inner: Mutex<StoreInner>,
    persist_lock: tokio::sync::Mutex<()>,
}

struct StoreInner {
    snapshot: Snapshot,
    positions: HashMap<String, usize>,
    seeded: bool,
}

impl StoreInner {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut entries: Vec<Entry> = Vec::with_capacity(snapshot.entries.len());
        let mut positions = HashMap::with_capacity(snapshot.entries.len());

        for entry in snapshot.entries {
            match positions.get(&entry.key).copied() {
                Some(pos) => {
                    // Older snapshots may list a key twice; a downloaded record wins
                    let existing: &mut Entry = &mut entries[pos];
                    if !existing.downloaded {
                        tracing::debug!("Replacing duplicate snapshot record for {}", entry.key);
                        *existing = entry;
                    }
                }
                None => {
                    positions.insert(entry.key.clone(), entries.len());
                    entries.push(entry);
                }
            }
        }

        Self {
            snapshot: Snapshot {
                entries,
                counts: snapshot.counts,
            },
            positions,
            seeded: false,
        }
    }

    fn entry_mut(&mut self, key: &str) -> StoreResult<&mut Entry> {
        let pos = *self
            .positions
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(&mut self.snapshot.entries[pos])
    }
}

impl EntryStore {
    /// Creates an empty store that persists to `database_path`
    pub fn empty(database_path: impl Into<PathBuf>, media_dir: impl Into<PathBuf>) -> Self {
        Self::from_snapshot(database_path, media_dir, Snapshot::default())
    }

    /// Creates a store holding the given snapshot
    pub fn from_snapshot(
        database_path: impl Into<PathBuf>,
        media_dir: impl Into<PathBuf>,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            database_path: database_path.into(),
            media_dir: media_dir.into(),
            inner: Mutex::new(StoreInner::from_snapshot(snapshot)),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Loads the last persisted snapshot
    ///
    /// A missing, unreadable or corrupt snapshot never blocks a run: the store
    /// falls back to empty and item discovery starts over. Media already on
    /// disk is untouched but no longer tracked, so the fallback is logged
    /// loudly.
    pub async fn open(database_path: impl Into<PathBuf>, media_dir: impl Into<PathBuf>) -> Self {
        let database_path = database_path.into();

        let snapshot = match read_snapshot(&database_path).await {
            Ok(snapshot) => {
                tracing::info!(
                    "Loaded {} entries from {}",
                    snapshot.entries.len(),
                    database_path.display()
                );
                snapshot
            }
            Err(LoadFailure::Missing) => {
                tracing::info!(
                    "No snapshot at {}, starting empty",
                    database_path.display()
                );
                Snapshot::default()
            }
            Err(LoadFailure::Unreadable(e)) => {
                tracing::warn!(
                    "Could not read snapshot {} ({}), starting empty",
                    database_path.display(),
                    e
                );
                Snapshot::default()
            }
            Err(LoadFailure::Corrupt(e)) => {
                tracing::warn!(
                    "Snapshot {} is corrupt ({}), starting empty",
                    database_path.display(),
                    e
                );
                Snapshot::default()
            }
        };

        Self::from_snapshot(database_path, media_dir, snapshot)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of the snapshot file
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Records the approximate item count and seeds the index counter
    ///
    /// Must be called once per run, before any [`create_entry`](Self::create_entry).
    /// A resumed store keeps its persisted counter so indices handed out by
    /// earlier runs are never reused.
    pub fn set_approximate_total(&self, total: u64) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.seeded {
            return Err(StoreError::TotalAlreadySeeded);
        }

        inner.snapshot.counts.approximate_total = Some(total);
        if inner.snapshot.entries.is_empty() || inner.snapshot.counts.next_index.is_none() {
            inner.snapshot.counts.next_index = Some(total as i64);
        }
        inner.seeded = true;
        Ok(())
    }

    /// Registers a newly discovered item
    ///
    /// A downloaded entry is never re-created. A stale, non-downloaded entry
    /// left by an interrupted run is reset in place and keeps its index.
    pub fn create_entry(&self, key: &str, batch_ref: Option<&str>) -> StoreResult<Entry> {
        let mut inner = self.lock();
        let batch_ref = batch_ref.map(str::to_string);

        if let Some(pos) = inner.positions.get(key).copied() {
            let existing = &mut inner.snapshot.entries[pos];
            if existing.downloaded {
                return Err(StoreError::DuplicateEntry(key.to_string()));
            }
            tracing::debug!("Re-creating stale entry {} (index {})", key, existing.index);
            *existing = Entry::new(key, existing.index, batch_ref);
            return Ok(existing.clone());
        }

        let index = inner
            .snapshot
            .counts
            .next_index
            .ok_or(StoreError::TotalNotSeeded)?;
        if index < 1 {
            tracing::warn!(
                "Index counter reached {} for {}; the approximate total was too low",
                index,
                key
            );
        }
        inner.snapshot.counts.next_index = Some(index - 1);

        let entry = Entry::new(key, index, batch_ref);
        let pos = inner.snapshot.entries.len();
        inner.positions.insert(key.to_string(), pos);
        inner.snapshot.entries.push(entry.clone());
        Ok(entry)
    }

    /// Merges a partial update into an entry
    ///
    /// Every check runs before any field is written, so a rejected update
    /// leaves the entry exactly as it was.
    pub fn assign(&self, key: &str, update: EntryUpdate) -> StoreResult<Entry> {
        let mut inner = self.lock();
        let entry = inner.entry_mut(key)?;

        if let Some(provider) = &update.media_provider {
            if !is_known_provider(provider) {
                return Err(StoreError::UnhandledProvider {
                    provider: provider.clone(),
                    key: key.to_string(),
                });
            }
        }

        if let (Some(current), Some(next)) = (entry.kind, update.kind) {
            return Err(StoreError::InvalidTransition {
                key: key.to_string(),
                message: format!("kind already assigned ({} -> {})", current, next),
            });
        }

        match (entry.downloaded, update.downloaded) {
            (true, Some(true)) => {
                return Err(StoreError::InvalidTransition {
                    key: key.to_string(),
                    message: "already marked downloaded".to_string(),
                })
            }
            (true, Some(false)) => {
                return Err(StoreError::InvalidTransition {
                    key: key.to_string(),
                    message: "downloaded flag cannot be cleared".to_string(),
                })
            }
            _ => {}
        }

        if let Some(downloaded) = update.downloaded {
            entry.downloaded = downloaded;
        }
        if let Some(kind) = update.kind {
            entry.kind = Some(kind);
        }
        if let Some(tags) = update.tags {
            entry.tags = tags;
        }
        if let Some(locator) = update.media_locator {
            entry.media_locator = Some(locator);
        }
        if let Some(provider) = update.media_provider {
            entry.media_provider = Some(provider);
        }
        if let Some(location) = update.media_provider_location {
            entry.media_provider_location = Some(location);
        }

        Ok(entry.clone())
    }

    /// Returns true if the entry exists and its media is on disk
    pub fn is_cached(&self, key: &str) -> bool {
        let inner = self.lock();
        let downloaded = inner
            .positions
            .get(key)
            .map(|&pos| inner.snapshot.entries[pos].downloaded)
            .unwrap_or(false);
        downloaded
    }

    /// Returns a copy of one entry
    pub fn get(&self, key: &str) -> StoreResult<Entry> {
        let mut inner = self.lock();
        let entry = inner.entry_mut(key)?.clone();
        Ok(entry)
    }

    /// Resolves where an entry's media is written
    ///
    /// The file name is `<index:04>-<basename of the media locator>`.
    pub fn media_destination(&self, key: &str) -> StoreResult<PathBuf> {
        let entry = self.get(key)?;
        let locator = entry
            .media_locator
            .as_deref()
            .ok_or_else(|| StoreError::MissingMediaLocator(key.to_string()))?;

        let basename = Url::parse(locator)
            .ok()
            .and_then(|url| media_basename(&url))
            .ok_or_else(|| StoreError::MissingMediaLocator(key.to_string()))?;

        Ok(self.media_dir.join(media_file_name(entry.index, &basename)))
    }

    /// Returns a copy of every entry in insertion order
    pub fn entries(&self) -> Vec<Entry> {
        self.lock().snapshot.entries.clone()
    }

    /// Returns a copy of the ordering counters
    pub fn counts(&self) -> Counts {
        self.lock().snapshot.counts.clone()
    }

    /// Number of entries whose media is on disk
    pub fn downloaded_count(&self) -> usize {
        self.lock()
            .snapshot
            .entries
            .iter()
            .filter(|e| e.downloaded)
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().snapshot.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the full snapshot to disk, replacing the previous one atomically
    ///
    /// Mutations that land while the file is being written are picked up by
    /// the next call.
    pub async fn persist(&self) -> StoreResult<()> {
        let _guard = self.persist_lock.lock().await;

        let (bytes, count) = {
            let inner = self.lock();
            (
                serde_json::to_vec_pretty(&inner.snapshot)?,
                inner.snapshot.entries.len(),
            )
        };

        write_atomic(&self.database_path, &bytes).await?;
        tracing::debug!(
            "Persisted {} entries to {}",
            count,
            self.database_path.display()
        );
        Ok(())
    }
}
