//! Harvest coordinator - pagination driver
//!
//! This module contains the main harvest loop, which:
//! - Reads the approximate item count from the profile page
//! - Walks listing batches until no cursor remains
//! - Registers unseen items and schedules their workers
//! - Checkpoints the entry store after every batch
//! - Drains the scheduler and persists the final state

use crate::config::Config;
use crate::crawler::context::HarvestContext;
use crate::crawler::fetcher::LISTING_HEADERS;
use crate::crawler::parser::Listing;
use crate::crawler::scheduler::TaskScheduler;
use crate::crawler::worker::harvest_item;
use crate::output::WorkKind;
use crate::state::PaginationState;
use crate::{HarvestError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Summary of one harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Listing batches walked
    pub batches: u32,

    /// Entries created (or re-created) and scheduled
    pub registered: usize,

    /// References skipped because their media is already on disk
    pub skipped_cached: usize,

    /// Media files downloaded during this run
    pub downloaded: u64,

    /// Items that failed and were left for a later run
    pub failed: u64,

    pub elapsed: Duration,
}

/// Drives one harvest through the pagination state machine
pub struct Harvester {
    ctx: Arc<HarvestContext>,
    state: PaginationState,
    seen: HashSet<String>,
    report: HarvestReport,
}

impl Harvester {
    pub fn new(ctx: Arc<HarvestContext>) -> Self {
        Self {
            ctx,
            state: PaginationState::Start,
            seen: HashSet::new(),
            report: HarvestReport::default(),
        }
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    fn transition(&mut self, next: PaginationState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!("Pagination {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Runs the harvest to completion
    ///
    /// A listing batch that cannot be fetched aborts the traversal, and a
    /// fatal worker error stops it at the next batch boundary. In both cases
    /// the scheduled work is still drained and the store persisted before the
    /// error is returned, so a re-run resumes from the last checkpoint.
    pub async fn run(mut self) -> Result<HarvestReport> {
        let started = Instant::now();
        tracing::info!("Saving files to {}", self.ctx.config.paths.userdir.display());

        tracing::info!("Visiting profile of {}", self.ctx.config.username);
        let total = self.read_profile().await?;
        self.ctx.store.set_approximate_total(total)?;

        if total == 0 {
            tracing::info!("{} has nothing to harvest", self.ctx.config.username);
            self.transition(PaginationState::Done)?;
            self.ctx.store.persist().await?;
            return Ok(self.finish(started));
        }

        let scheduler = TaskScheduler::new(self.ctx.config.concurrency());
        let walked = self.walk(&scheduler).await;
        if let Err(e) = &walked {
            tracing::error!("Listing traversal aborted: {}", e);
        }

        tracing::debug!(
            "Done walking listing batches, waiting for item workers ({} running, {} settled)",
            scheduler.running(),
            scheduler.completed()
        );
        let drained = scheduler.drain().await;

        // The final flags must be durable whatever happened above
        let persisted = self.ctx.store.persist().await;

        walked?;
        drained?;
        persisted?;

        self.transition(PaginationState::Done)?;
        let report = self.finish(started);
        tracing::info!(
            "Harvest complete: {} batches, {} new items, {} already on disk, {} downloaded, {} failed in {:.1}s",
            report.batches,
            report.registered,
            report.skipped_cached,
            report.downloaded,
            report.failed,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    fn finish(&mut self, started: Instant) -> HarvestReport {
        let mut report = std::mem::take(&mut self.report);
        report.downloaded = self.ctx.progress.downloaded();
        report.failed = self.ctx.progress.failed();
        report.elapsed = started.elapsed();
        report
    }

    /// Fetches the profile page and returns the approximate item count
    async fn read_profile(&self) -> Result<u64> {
        let url = self.ctx.config.profile_url()?;

        let page = self.ctx.progress.track(WorkKind::Page);
        let body = self.ctx.cache.fetch_buffered(&url, &[]).await?;
        page.complete();

        let document = String::from_utf8_lossy(&body);
        match self.ctx.extractor.extract_profile_meta(&document) {
            Some(total) => {
                tracing::info!("Profile reports about {} items", total);
                Ok(total)
            }
            None => {
                tracing::warn!("No item count found on {}, treating the account as empty", url);
                Ok(0)
            }
        }
    }

    /// Walks listing batches until no cursor remains
    async fn walk(&mut self, scheduler: &TaskScheduler) -> Result<()> {
        let mut batch_number: u32 = 0;
        let mut cursor: Option<String> = None;

        loop {
            self.transition(PaginationState::FetchingBatch)?;
            let listing = self.fetch_batch(batch_number, cursor.as_deref()).await?;

            self.transition(PaginationState::RegisteringEntries)?;
            self.register(&listing, cursor.as_deref(), scheduler)?;

            self.transition(PaginationState::Persisting)?;
            self.ctx.store.persist().await?;
            self.report.batches += 1;
            batch_number += 1;

            match listing.next_cursor {
                Some(_) if scheduler.is_aborted() => {
                    tracing::warn!("An item worker failed, stopping the listing traversal");
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        self.transition(PaginationState::Draining)
    }

    async fn fetch_batch(&self, batch_number: u32, cursor: Option<&str>) -> Result<Listing> {
        let url = self.ctx.config.batch_url(batch_number, cursor)?;
        tracing::debug!("Fetching listing batch {} ({})", batch_number, url);

        let page = self.ctx.progress.track(WorkKind::Page);
        let body = self.ctx.cache.fetch_buffered(&url, LISTING_HEADERS).await?;
        page.complete();

        let listing = self
            .ctx
            .extractor
            .extract_listing(&String::from_utf8_lossy(&body));
        tracing::debug!(
            "Batch {} lists {} items (next cursor: {:?})",
            batch_number,
            listing.child_refs.len(),
            listing.next_cursor
        );
        Ok(listing)
    }

    /// Creates entries for unseen references and schedules their workers
    fn register(
        &mut self,
        listing: &Listing,
        batch_ref: Option<&str>,
        scheduler: &TaskScheduler,
    ) -> Result<()> {
        for key in &listing.child_refs {
            if self.ctx.store.is_cached(key) {
                self.report.skipped_cached += 1;
                self.ctx.progress.record_cached();
                tracing::trace!("{} already downloaded", key);
                continue;
            }

            if !self.seen.insert(key.clone()) {
                tracing::debug!("Skipping duplicate reference {}", key);
                continue;
            }

            let entry = self.ctx.store.create_entry(key, batch_ref)?;
            tracing::trace!("Registered {} with index {}", entry.key, entry.index);
            self.report.registered += 1;

            scheduler.submit(harvest_item(self.ctx.clone(), key.clone()));
        }
        Ok(())
    }
}

/// Runs a complete harvest for the configured account
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `fresh` - Ignore the persisted snapshot and start over
///
/// # Example
///
/// ```no_run
/// use grid_harvest::config::{load_config, ConfigOverrides};
/// use grid_harvest::run_harvest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(None, "alice", ConfigOverrides::default())?;
/// let report = run_harvest(config, false).await?;
/// println!("Downloaded {} files", report.downloaded);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config, fresh: bool) -> Result<HarvestReport> {
    let ctx = HarvestContext::bootstrap(config, fresh).await?;
    Harvester::new(Arc::new(ctx)).run().await
}
