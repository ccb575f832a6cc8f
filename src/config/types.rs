use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::crawler::{CrawlBudget, FetchKind};
use crate::model::{Source, SourceConfig};
use crate::ConfigError;

/// Main configuration structure for the filmlist crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,

    /// Feed definitions keyed by source id
    #[serde(default)]
    pub sources: BTreeMap<String, SourceEntry>,
}

/// Run-wide crawl behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Size of the shared worker pool
    #[serde(rename = "worker-threads", default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Global time budget in minutes, 0 for unlimited
    #[serde(rename = "maximum-server-duration-minutes", default)]
    pub maximum_server_duration_minutes: u64,

    /// If non-empty, only these sources are crawled
    #[serde(rename = "included-sources", default)]
    pub included_sources: Vec<String>,

    /// Sources never crawled
    #[serde(rename = "excluded-sources", default)]
    pub excluded_sources: Vec<String>,

    /// Limits applied to every source unless overridden
    #[serde(rename = "source-defaults", default)]
    pub source_defaults: SourceLimits,
}

/// Per-source crawl limits; unset fields fall back to the next layer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceLimits {
    #[serde(rename = "maximum-units-per-task")]
    pub maximum_units_per_task: Option<usize>,

    #[serde(rename = "maximum-subpages")]
    pub maximum_subpages: Option<u32>,

    #[serde(rename = "maximum-requests-per-second")]
    pub maximum_requests_per_second: Option<f64>,

    #[serde(rename = "socket-timeout-seconds")]
    pub socket_timeout_seconds: Option<u64>,

    #[serde(rename = "maximum-days-past")]
    pub maximum_days_past: Option<u32>,

    #[serde(rename = "maximum-days-future")]
    pub maximum_days_future: Option<u32>,

    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: Option<u64>,
}

impl SourceLimits {
    /// Overlays the limits that are set onto `base`
    pub fn apply(&self, base: SourceConfig) -> SourceConfig {
        SourceConfig {
            max_units_per_task: self.maximum_units_per_task.unwrap_or(base.max_units_per_task),
            max_subpages: self.maximum_subpages.unwrap_or(base.max_subpages),
            max_requests_per_second: self
                .maximum_requests_per_second
                .unwrap_or(base.max_requests_per_second),
            socket_timeout: self
                .socket_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(base.socket_timeout),
            max_days_past: self.maximum_days_past.unwrap_or(base.max_days_past),
            max_days_future: self.maximum_days_future.unwrap_or(base.max_days_future),
            retry_backoff: self
                .retry_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(base.retry_backoff),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite catalogue store
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown run summary
    #[serde(rename = "summary-path")]
    pub summary_path: String,

    /// Previously persisted catalogue merged into the fresh one
    #[serde(rename = "import-path", default)]
    pub import_path: Option<String>,
}

/// Feed definition and limit overrides of one source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    #[serde(flatten)]
    pub limits: SourceLimits,

    /// Fixed entry URLs
    #[serde(default)]
    pub seeds: Vec<String>,

    /// URL templates expanded once per day; `{date}` is replaced
    #[serde(rename = "date-seeds", default)]
    pub date_seeds: Vec<String>,

    /// chrono format used for `{date}`
    #[serde(rename = "date-format", default = "default_date_format")]
    pub date_format: String,

    /// Discovery stages, run in order
    #[serde(default)]
    pub discovery: Vec<DiscoveryConfig>,

    pub detail: DetailConfig,
}

/// One discovery stage: turns fetched pages into further units
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub kind: FetchKind,

    /// CSS selector for documents, JSON pointer for JSON payloads
    pub selector: String,

    /// Take the topic label from the link text
    #[serde(rename = "topic-from-text", default)]
    pub topic_from_text: bool,

    /// Query parameter used to probe further pages of every input unit
    #[serde(rename = "page-parameter", default)]
    pub page_parameter: Option<String>,
}

/// The stage turning detail units into films
#[derive(Debug, Clone, Deserialize)]
pub struct DetailConfig {
    pub kind: FetchKind,

    /// Element holding the film record in documents
    #[serde(default)]
    pub selector: Option<String>,
}

fn default_worker_threads() -> usize {
    8
}

fn default_date_format() -> String {
    "%d.%m.%Y".to_string()
}

impl Config {
    /// Global concurrency and time limits of a run
    pub fn budget(&self) -> CrawlBudget {
        let budget = CrawlBudget::new(self.crawler.worker_threads);
        match self.crawler.maximum_server_duration_minutes {
            0 => budget,
            minutes => budget.with_time_limit(Duration::from_secs(minutes * 60)),
        }
    }

    /// Resolves the limits of `source`: built-in defaults, then
    /// `[crawler.source-defaults]`, then `[sources.<id>]`
    pub fn source_config(&self, source: Source) -> SourceConfig {
        let config = self.crawler.source_defaults.apply(SourceConfig::default());
        match self.sources.get(source.id()) {
            Some(entry) => entry.limits.apply(config),
            None => config,
        }
    }

    /// Sources with a feed definition that pass the include/exclude filters,
    /// in source order
    pub fn enabled_sources(&self) -> Result<Vec<(Source, &SourceEntry)>, ConfigError> {
        let included = parse_sources(&self.crawler.included_sources)?;
        let excluded = parse_sources(&self.crawler.excluded_sources)?;

        let mut enabled = Vec::new();
        for (id, entry) in &self.sources {
            let source: Source = id.parse()?;
            if !included.is_empty() && !included.contains(&source) {
                continue;
            }
            if excluded.contains(&source) {
                continue;
            }
            enabled.push((source, entry));
        }
        enabled.sort_by_key(|(source, _)| *source);
        Ok(enabled)
    }
}

fn parse_sources(ids: &[String]) -> Result<Vec<Source>, ConfigError> {
    ids.iter().map(|id| id.parse()).collect()
}
