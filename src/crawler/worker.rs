//! Item worker: one detail page and its media
//!
//! Each registered entry gets one worker task:
//! 1. Fetch the detail page through the cache
//! 2. Extract and classify the media record, then record it on the entry
//! 3. Stream the media to `<index:04>-<basename>` in the media folder
//! 4. Mark the entry downloaded
//!
//! Failures that only concern this item are logged and swallowed so the run
//! continues; the entry stays non-downloaded and a later run retries it.
//! Store invariant violations and local disk errors propagate and stop the
//! run.

use crate::crawler::context::HarvestContext;
use crate::output::WorkKind;
use crate::storage::EntryUpdate;
use crate::Result;
use std::sync::Arc;

/// Harvests one entry, applying the failure policy
pub async fn harvest_item(ctx: Arc<HarvestContext>, key: String) -> Result<()> {
    match process_item(&ctx, &key).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            ctx.progress.record_failed();
            tracing::warn!("{} is gone (404), leaving it for a later run: {}", key, e);
            Ok(())
        }
        Err(e) if e.is_item_local() => {
            ctx.progress.record_failed();
            match ctx.store.get(&key) {
                Ok(entry) => tracing::error!("Failed to harvest {}: {} (entry: {:?})", key, e, entry),
                Err(_) => tracing::error!("Failed to harvest {}: {}", key, e),
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn process_item(ctx: &HarvestContext, key: &str) -> Result<()> {
    let page_url = ctx.config.item_url(key)?;

    let page = ctx.progress.track(WorkKind::Page);
    let body = ctx.cache.fetch_buffered(&page_url, &[]).await?;
    page.complete();

    let document = String::from_utf8_lossy(&body);
    let record = ctx
        .extractor
        .extract_detail(&document)?
        .into_media_record(&ctx.config.base_url, key)?;
    tracing::trace!("Parsed {} as {}", key, record.kind());

    ctx.store.assign(key, EntryUpdate::from(&record))?;
    let destination = ctx.store.media_destination(key)?;

    let media = ctx.progress.track(WorkKind::from(record.kind()));
    ctx.cache.fetch_stream(record.locator(), &destination).await?;
    media.complete();

    ctx.store.assign(key, EntryUpdate::downloaded())?;
    tracing::debug!("Saved {} to {}", key, destination.display());
    Ok(())
}
