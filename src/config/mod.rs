//! Configuration module for Grid-Harvest
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file and merging it with command-line overrides.
//!
//! # Example
//!
//! ```no_run
//! use grid_harvest::config::{load_config, ConfigOverrides};
//! use std::path::Path;
//!
//! let config = load_config(Some(Path::new("harvest.toml")), "alice", ConfigOverrides::default()).unwrap();
//! println!("Running {} workers", config.concurrency());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ConfigFile, CrawlerConfig, OutputConfig, Paths, SelectorConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{build_config, load_config, load_config_file, ConfigOverrides};
