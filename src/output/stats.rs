//! Run statistics
//!
//! This module provides the statistics of a crawl run and of a stored
//! catalogue, and prints them to stdout.

use crate::model::Source;
use crate::storage::StoredList;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Counters of one source after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatistics {
    pub source: Source,

    /// Units announced for processing
    pub max: u64,

    /// Units processed
    pub actual: u64,

    /// Failed units
    pub errors: u64,

    /// Films the crawler returned, before deduplication
    pub films: usize,

    /// Task forks of all task trees
    pub forks: u64,

    /// Deepest task recursion
    pub max_depth: u32,
}

/// Outcome of a crawl run
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub list_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub timed_out: bool,

    /// Films in the catalogue after merging
    pub catalogue_size: usize,

    /// Films taken over from an imported list
    pub imported: usize,

    pub config_hash: Option<String>,
    pub sources: Vec<SourceStatistics>,
}

impl RunStatistics {
    pub fn total_errors(&self) -> u64 {
        self.sources.iter().map(|s| s.errors).sum()
    }

    /// Films returned by all crawlers, before deduplication
    pub fn total_films(&self) -> usize {
        self.sources.iter().map(|s| s.films).sum()
    }

    pub fn total_processed(&self) -> u64 {
        self.sources.iter().map(|s| s.actual).sum()
    }
}

/// Prints run statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  List: {}", stats.list_id);
    println!("  Duration: {:.1}s", stats.elapsed.as_secs_f64());
    if stats.timed_out {
        println!("  Stopped by the time limit");
    }
    println!("  Films in catalogue: {}", stats.catalogue_size);
    println!("  Films imported: {}", stats.imported);
    println!("  Units processed: {}", stats.total_processed());
    println!("  Errors: {}", stats.total_errors());
    println!();

    println!("Sources:");
    for source in &stats.sources {
        println!(
            "  {:<12} {:>6} films  {:>6}/{:<6} units  {:>4} errors  {:>4} forks  depth {}",
            source.source.name(),
            source.films,
            source.actual,
            source.max,
            source.errors,
            source.forks,
            source.max_depth
        );
    }
}

/// Prints the contents of a stored catalogue
///
/// # Arguments
///
/// * `list` - Metadata of the stored list, if any
/// * `counts` - Stored films per source
pub fn print_stored_statistics(list: Option<&StoredList>, counts: &[(Source, u64)]) {
    println!("=== Stored Catalogue ===\n");

    let Some(list) = list else {
        println!("No film list stored yet");
        return;
    };

    println!("  List: {}", list.list_id);
    println!("  Created: {}", list.created_at.to_rfc3339());
    println!("  Saved: {}", list.saved_at.to_rfc3339());
    if let Some(hash) = &list.config_hash {
        println!("  Config hash: {}", hash);
    }
    println!();

    // Sort sources by count (descending)
    let mut counts = counts.to_vec();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let total: u64 = counts.iter().map(|(_, count)| count).sum();
    for (source, count) in counts {
        let percentage = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {:<12} {:>7} ({:.1}%)", source.name(), count, percentage);
    }
    println!("\n  Total: {}", total);
}
