//! Live progress counters for a harvest run
//!
//! Counters are plain atomics so workers can update them without locking.
//! Every event is logged at `debug`; a summary line is logged at `info`
//! every [`REPORT_EVERY`] completed media downloads.

use crate::storage::MediaKind;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Completed downloads between two `info` progress lines
pub const REPORT_EVERY: u64 = 10;

/// Kind of work tracked by [`Progress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    Page,
    Image,
    Gif,
    Video,
    Cached,
}

impl WorkKind {
    fn slot(self) -> usize {
        match self {
            Self::Page => 0,
            Self::Image => 1,
            Self::Gif => 2,
            Self::Video => 3,
            Self::Cached => 4,
        }
    }

    /// Returns true for media downloads
    pub fn is_media(self) -> bool {
        matches!(self, Self::Image | Self::Gif | Self::Video)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Image => "image",
            Self::Gif => "gif",
            Self::Video => "video",
            Self::Cached => "cached",
        }
    }
}

impl From<MediaKind> for WorkKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => Self::Image,
            MediaKind::Gif => Self::Gif,
            MediaKind::Video => Self::Video,
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const KINDS: usize = 5;

/// Shared progress counters
#[derive(Debug, Default)]
pub struct Progress {
    in_progress: [AtomicU64; KINDS],
    completed: [AtomicU64; KINDS],
    failed: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one unit of work as started
    ///
    /// The returned guard ends the work when dropped; call
    /// [`Tracked::complete`] to count it as completed.
    pub fn track(&self, kind: WorkKind) -> Tracked<'_> {
        self.in_progress[kind.slot()].fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Started {}: {}", kind, self.summary());
        Tracked {
            progress: self,
            kind,
            done: false,
        }
    }

    /// Records an item skipped because its media is already on disk
    pub fn record_cached(&self) {
        self.completed[WorkKind::Cached.slot()].fetch_add(1, Ordering::Relaxed);
    }

    /// Records an item whose processing failed and will be retried later
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_progress(&self, kind: WorkKind) -> u64 {
        self.in_progress[kind.slot()].load(Ordering::Relaxed)
    }

    pub fn completed(&self, kind: WorkKind) -> u64 {
        self.completed[kind.slot()].load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Media downloads completed during this run
    pub fn downloaded(&self) -> u64 {
        [WorkKind::Image, WorkKind::Gif, WorkKind::Video]
            .iter()
            .map(|kind| self.completed(*kind))
            .sum()
    }

    /// One-line description of the current counters
    pub fn summary(&self) -> String {
        format!(
            "downloaded {} items ({} images, {} gifs & {} videos in flight) while {} pages are loading, {} already on disk",
            self.downloaded(),
            self.in_progress(WorkKind::Image),
            self.in_progress(WorkKind::Gif),
            self.in_progress(WorkKind::Video),
            self.in_progress(WorkKind::Page),
            self.completed(WorkKind::Cached),
        )
    }

    fn finish(&self, kind: WorkKind, completed: bool) {
        self.in_progress[kind.slot()].fetch_sub(1, Ordering::Relaxed);
        if !completed {
            return;
        }

        self.completed[kind.slot()].fetch_add(1, Ordering::Relaxed);
        if kind.is_media() && self.downloaded() % REPORT_EVERY == 0 {
            tracing::info!("Progress: {}", self.summary());
        } else {
            tracing::debug!("Completed {}: {}", kind, self.summary());
        }
    }
}

/// Guard for one unit of in-flight work
#[must_use = "dropping the guard immediately ends the tracked work"]
pub struct Tracked<'a> {
    progress: &'a Progress,
    kind: WorkKind,
    done: bool,
}

impl Tracked<'_> {
    /// Ends the work and counts it as completed
    pub fn complete(mut self) {
        self.done = true;
        self.progress.finish(self.kind, true);
    }
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.progress.finish(self.kind, false);
        }
    }
}
