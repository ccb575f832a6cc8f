//! Output module for crawl statistics and summaries
//!
//! This module handles:
//! - Collecting per-source statistics of a run
//! - Printing run and stored-catalogue statistics
//! - Generating the markdown summary of a run

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{print_statistics, print_stored_statistics, RunStatistics, SourceStatistics};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
