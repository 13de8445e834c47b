//! Grid-Harvest: a resumable feed harvester
//!
//! This crate walks a paginated listing endpoint batch by batch, discovers item
//! pages, extracts their media attributes and downloads the media to disk. All
//! progress is checkpointed into a JSON snapshot so an interrupted run resumes
//! without re-fetching or re-downloading completed work.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Grid-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid pagination transition: {from} -> {to}")]
    InvalidTransition {
        from: state::PaginationState,
        to: state::PaginationState,
    },

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true if this error is an HTTP 404 from any fetch
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Fetch(FetchError::UnexpectedStatus { status: 404, .. })
        )
    }

    /// Returns true if this error only concerns the item being processed
    ///
    /// Network, status and markup problems leave the entry non-downloaded so a
    /// later run retries it. Store invariant violations and local disk errors
    /// are not item-local.
    pub fn is_item_local(&self) -> bool {
        match self {
            Self::Fetch(FetchError::Io { .. }) => false,
            Self::Fetch(_) | Self::Extract(_) | Self::UrlParse(_) => true,
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Errors raised by the fetch cache and its transport
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Unexpected status {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Errors raised by the entry store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entry already downloaded, refusing to re-create: {0}")]
    DuplicateEntry(String),

    #[error("No entry recorded for {0}")]
    NotFound(String),

    #[error("Unhandled media provider \"{provider}\" from {key}")]
    UnhandledProvider { provider: String, key: String },

    #[error("Invalid entry transition for {key}: {message}")]
    InvalidTransition { key: String, message: String },

    #[error("Approximate total was already seeded for this run")]
    TotalAlreadySeeded,

    #[error("Approximate total must be seeded before entries are created")]
    TotalNotSeeded,

    #[error("Entry {0} has no media locator")]
    MissingMediaLocator(String),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while turning a document into structured data
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Missing {field} in {context}")]
    MissingField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid locator '{locator}': {message}")]
    InvalidLocator { locator: String, message: String },
}

/// Result type alias for Grid-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for entry store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_harvest, HarvestReport};
pub use state::PaginationState;
pub use storage::{Entry, EntryStore, MediaKind};
