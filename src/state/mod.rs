//! State module for tracking harvest progress
//!
//! This module provides the state machine driven by the pagination driver
//! while it walks listing batches.

mod pagination;

// Re-export main types
pub use pagination::PaginationState;
