//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a crawl run:
//! run metadata, totals and one table row per source.

use crate::output::stats::RunStatistics;
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run
///
/// # Arguments
///
/// * `stats` - The run statistics
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(stats: &RunStatistics, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(stats);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats run statistics as markdown
pub fn format_markdown_summary(stats: &RunStatistics) -> String {
    let mut md = String::new();

    md.push_str("# Film List Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **List ID**: {}\n", stats.list_id));
    md.push_str(&format!("- **Started**: {}\n", stats.started_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        stats.elapsed.as_secs(),
        stats.elapsed.as_secs_f64() / 60.0
    ));
    let status = if stats.timed_out {
        "stopped by time limit"
    } else {
        "completed"
    };
    md.push_str(&format!("- **Status**: {}\n", status));
    if let Some(hash) = &stats.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Films in Catalogue**: {}\n", stats.catalogue_size));
    md.push_str(&format!("- **Films Imported**: {}\n", stats.imported));
    md.push_str(&format!("- **Films Crawled**: {}\n", stats.total_films()));
    md.push_str(&format!("- **Units Processed**: {}\n", stats.total_processed()));
    md.push_str(&format!("- **Total Errors**: {}\n\n", stats.total_errors()));

    if !stats.sources.is_empty() {
        md.push_str("## Sources\n\n");
        md.push_str("| Source | Films | Processed | Announced | Errors | Forks | Depth |\n");
        md.push_str("|--------|-------|-----------|-----------|--------|-------|-------|\n");

        for source in &stats.sources {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                source.source.name(),
                source.films,
                source.actual,
                source.max,
                source.errors,
                source.forks,
                source.max_depth
            ));
        }
        md.push('\n');
    }

    let failing: Vec<_> = stats.sources.iter().filter(|s| s.errors > 0).collect();
    if !failing.is_empty() {
        md.push_str("## Sources With Errors\n\n");
        for source in failing {
            md.push_str(&format!("- {}: {} errors\n", source.source.name(), source.errors));
        }
        md.push('\n');
    }

    md
}
