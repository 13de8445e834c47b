//! Statistics generation from a persisted snapshot
//!
//! This module provides functionality for summarising the entry store
//! without crawling (`--stats`).

use crate::storage::{EntryStore, MediaKind};
use std::collections::{BTreeMap, HashMap};

/// Snapshot statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStatistics {
    /// Total number of entries discovered
    pub total_entries: u64,

    /// Entries whose media is on disk
    pub downloaded: u64,

    /// Entries whose detail page has not been parsed yet
    pub pending: u64,

    /// Entries parsed but not downloaded (interrupted or failed downloads)
    pub awaiting_download: u64,

    /// Count of entries by media kind
    pub by_kind: HashMap<MediaKind, u64>,

    /// Count of video entries by embedded provider
    pub by_provider: BTreeMap<String, u64>,

    /// Most frequent tags, highest count first
    pub top_tags: Vec<(String, u64)>,

    /// Item count seen on the profile page
    pub approximate_total: Option<u64>,

    /// Index the next new entry would receive
    pub next_index: Option<i64>,
}

/// Number of tags listed by [`print_statistics`]
const TOP_TAGS: usize = 10;

/// Loads statistics from the entry store
///
/// # Arguments
///
/// * `store` - The loaded entry store
///
/// # Returns
///
/// The computed statistics
pub fn load_statistics(store: &EntryStore) -> SnapshotStatistics {
    let entries = store.entries();
    let counts = store.counts();

    let mut stats = SnapshotStatistics {
        total_entries: entries.len() as u64,
        approximate_total: counts.approximate_total,
        next_index: counts.next_index,
        ..SnapshotStatistics::default()
    };

    let mut tags: HashMap<&str, u64> = HashMap::new();

    for entry in &entries {
        if entry.downloaded {
            stats.downloaded += 1;
        }

        match entry.kind {
            None => stats.pending += 1,
            Some(kind) => {
                *stats.by_kind.entry(kind).or_insert(0) += 1;
                if !entry.downloaded {
                    stats.awaiting_download += 1;
                }
            }
        }

        if let Some(provider) = &entry.media_provider {
            *stats.by_provider.entry(provider.clone()).or_insert(0) += 1;
        }

        for tag in &entry.tags {
            *tags.entry(tag.as_str()).or_insert(0) += 1;
        }
    }

    let mut tags: Vec<(String, u64)> = tags
        .into_iter()
        .map(|(tag, count)| (tag.to_string(), count))
        .collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    tags.truncate(TOP_TAGS);
    stats.top_tags = tags;

    stats
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SnapshotStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Entries discovered: {}", stats.total_entries);
    match stats.approximate_total {
        Some(total) => println!("  Approximate total on profile: {}", total),
        None => println!("  Approximate total on profile: unknown"),
    }
    if let Some(next) = stats.next_index {
        println!("  Next index: {}", next);
    }
    println!();

    println!("Status:");
    println!("  Downloaded: {}", stats.downloaded);
    println!("  Awaiting download: {}", stats.awaiting_download);
    println!("  Not yet parsed: {}", stats.pending);
    println!();

    println!("Media by Kind:");
    for kind in MediaKind::all() {
        let count = stats.by_kind.get(&kind).copied().unwrap_or(0);
        let percentage = if stats.total_entries > 0 {
            (count as f64 / stats.total_entries as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", kind, count, percentage);
    }
    println!();

    if !stats.by_provider.is_empty() {
        println!("Video Providers:");
        for (provider, count) in &stats.by_provider {
            println!("  {}: {}", provider, count);
        }
        println!();
    }

    if !stats.top_tags.is_empty() {
        println!("Top Tags:");
        for (tag, count) in &stats.top_tags {
            println!("  #{}: {}", tag, count);
        }
        println!();
    }

    let completion = if stats.total_entries > 0 {
        (stats.downloaded as f64 / stats.total_entries as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Completion: {:.1}% ({} / {} entries downloaded)",
        completion, stats.downloaded, stats.total_entries
    );
}
