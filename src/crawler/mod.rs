//! Crawler module for walking the feed and downloading media
//!
//! This module contains the core harvesting logic, including:
//! - The caching fetch layer and its HTTP transport
//! - HTML extraction of listings, detail pages and the profile count
//! - The bounded-concurrency task scheduler
//! - The item worker that downloads one entry's media
//! - The pagination driver that coordinates a whole run

mod context;
mod coordinator;
mod fetcher;
mod parser;
mod scheduler;
mod worker;

pub use context::HarvestContext;
pub use coordinator::{run_harvest, HarvestReport, Harvester};
pub use fetcher::{
    build_http_client, is_accepted_status, CacheStats, FetchCache, FetchMode, Fetched,
    ReqwestTransport, Transport, LISTING_HEADERS,
};
pub use parser::{
    parse_abbreviated_count, provider_from_class, Extractor, Listing, RawRecord, SelectorExtractor,
};
pub use scheduler::{Task, TaskScheduler};
pub use worker::harvest_item;
