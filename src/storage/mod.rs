//! Storage module for persisting harvest progress
//!
//! This module handles the resumable entry store, including:
//! - Entry records and their typed media updates
//! - Idempotent creation and validated partial updates
//! - The decreasing ordering index used to name media files
//! - Atomic JSON snapshot persistence and crash-tolerant loading

mod entry;
mod snapshot;
mod store;

pub use entry::{
    is_known_provider, Entry, EntryUpdate, MediaBase, MediaKind, MediaRecord, KNOWN_PROVIDERS,
};
pub use snapshot::{Counts, Snapshot};
pub use store::EntryStore;

use crate::config::Paths;

/// Opens the entry store for an account
///
/// With `fresh` set the persisted snapshot is ignored (it is overwritten at
/// the first checkpoint).
pub async fn open_store(paths: &Paths, fresh: bool) -> EntryStore {
    if fresh {
        tracing::info!("Ignoring previous snapshot at {}", paths.database.display());
        EntryStore::empty(&paths.database, &paths.media)
    } else {
        EntryStore::open(&paths.database, &paths.media).await
    }
}
