//! The crawler of one source
//!
//! A [`SourceCrawler`] holds everything shared by the task trees of one
//! source: its limits, its rate-limited fetcher, its progress counters and the
//! [`Pipeline`] that decides which stages run in which order.

use crate::crawler::fetcher::{FetchKind, FetchOutcome, Fetcher, Transport};
use crate::crawler::listener::{Listeners, Message};
use crate::crawler::pool::WorkerPool;
use crate::crawler::task::CrawlTask;
use crate::model::{CrawlTarget, Film, Source, SourceConfig};
use crate::state::{ProgressCounters, ProgressSnapshot, RateLimiter, TaskStats};
use crate::CrawlerError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use url::Url;

/// How a failed fetch is accounted for
///
/// Speculative requests, such as probing whether a sub-page exists, use
/// [`ErrorPolicy::silent`] so that a missing page is neither counted nor
/// reported. Transport failures are always counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub count_errors: bool,
    pub print_message: bool,
}

impl ErrorPolicy {
    pub fn silent() -> Self {
        Self {
            count_errors: false,
            print_message: false,
        }
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            count_errors: true,
            print_message: true,
        }
    }
}

/// The traversal shape of one source
///
/// A pipeline runs its stages one after another, feeding each stage's output
/// into the next, by submitting [`CrawlTask`]s through the crawler. Returning
/// an error makes the crawler yield no films.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn crawl(&self, crawler: &Arc<SourceCrawler>) -> Result<HashSet<Film>, CrawlerError>;
}

/// Crawls one source
pub struct SourceCrawler {
    source: Source,
    config: SourceConfig,
    counters: ProgressCounters,
    task_stats: TaskStats,
    fetcher: Fetcher,
    pool: Arc<WorkerPool>,
    listeners: Arc<Listeners>,
    pipeline: Arc<dyn Pipeline>,
}

impl SourceCrawler {
    /// Creates a crawler with its own rate limiter
    ///
    /// # Arguments
    ///
    /// * `source` - The source this crawler is responsible for
    /// * `config` - Resolved limits of the source
    /// * `transport` - Performs the actual requests
    /// * `pool` - The shared worker pool tasks are forked onto
    /// * `listeners` - Receivers of progress and messages
    /// * `pipeline` - The stages to run
    pub fn new(
        source: Source,
        config: SourceConfig,
        transport: Arc<dyn Transport>,
        pool: Arc<WorkerPool>,
        listeners: Arc<Listeners>,
        pipeline: Arc<dyn Pipeline>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.max_requests_per_second));
        let fetcher = Fetcher::new(
            transport,
            limiter,
            config.socket_timeout,
            config.retry_backoff,
        );

        Self {
            source,
            config,
            counters: ProgressCounters::new(),
            task_stats: TaskStats::new(),
            fetcher,
            pool,
            listeners,
            pipeline,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn task_stats(&self) -> &TaskStats {
        &self.task_stats
    }

    pub fn limiter(&self) -> &RateLimiter {
        self.fetcher.limiter()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.counters.snapshot()
    }

    pub fn increment_error_count(&self) {
        self.counters.increment_errors();
    }

    pub fn increment_actual_count(&self) {
        self.counters.increment_actual();
    }

    /// Adds newly discovered units to the expected total
    pub fn increment_max_count(&self, delta: usize) {
        self.counters.add_max(delta as u64);
    }

    /// Pushes the current counters to every progress listener
    pub fn update_progress(&self) {
        self.listeners.progress(self.source, self.counters.snapshot());
    }

    pub fn print_message(&self, message: Message) {
        self.listeners.message(&message);
    }

    /// Fetches `url` through the source's rate limiter and does the error
    /// bookkeeping
    ///
    /// # Returns
    ///
    /// * `Some(body)` - HTTP 2xx
    /// * `None` - The unit failed; it has been logged and counted per `policy`
    pub async fn fetch(&self, url: &Url, kind: FetchKind, policy: ErrorPolicy) -> Option<String> {
        match self.fetcher.fetch(url, kind).await {
            FetchOutcome::Body(body) => Some(body),
            FetchOutcome::HttpError(status) => {
                tracing::debug!("{}: {} answered HTTP {}", self.source, url, status);
                if policy.count_errors {
                    self.increment_error_count();
                }
                if policy.print_message {
                    self.print_message(Message::DocumentLoadError {
                        source: self.source,
                        url: url.to_string(),
                        status,
                    });
                }
                None
            }
            FetchOutcome::Transport(error) => {
                tracing::error!("fatal: {}: request to {} failed: {}", self.source, url, error);
                self.increment_error_count();
                if policy.print_message {
                    self.print_message(Message::DocumentTransportError {
                        source: self.source,
                        url: url.to_string(),
                        error: error.to_string(),
                    });
                }
                None
            }
        }
    }

    /// Runs a task tree on the worker pool and waits for its result
    ///
    /// Fails when the pool is shut down or the root task dies; failures of
    /// single units never surface here.
    pub async fn submit<U, T>(&self, task: CrawlTask<U, T>) -> Result<HashSet<T>, CrawlerError>
    where
        U: CrawlTarget,
        T: Eq + Hash + Send + 'static,
    {
        let stage = task.step().name().to_string();
        let units = task.len();
        tracing::debug!("{}: submitting stage '{}' with {} units", self.source, stage, units);

        let results = self
            .pool
            .spawn(task.compute())?
            .await
            .map_err(|e| CrawlerError::Stage {
                crawler: self.source,
                message: format!("stage '{}' did not complete: {}", stage, e),
            })?;

        self.print_message(Message::StageFinished {
            source: self.source,
            stage,
            results: results.len(),
        });
        Ok(results)
    }

    /// Runs the pipeline and returns every film it produced
    ///
    /// A failing pipeline is logged as fatal and yields an empty set.
    pub async fn run(self: Arc<Self>) -> HashSet<Film> {
        let started = Instant::now();
        self.print_message(Message::CrawlerStarted {
            source: self.source,
        });

        let span = tracing::info_span!("crawler", source = self.source.id());
        let pipeline = self.pipeline.clone();
        let films = match pipeline.crawl(&self).instrument(span).await {
            Ok(films) => films,
            Err(e) => {
                tracing::error!("fatal: {} crawler failed: {}", self.source, e);
                self.print_message(Message::CrawlerError {
                    source: self.source,
                    error: e.to_string(),
                });
                HashSet::new()
            }
        };

        self.update_progress();
        self.print_message(Message::CrawlerFinished {
            source: self.source,
            films: films.len(),
            elapsed: started.elapsed(),
        });
        films
    }
}

impl std::fmt::Debug for SourceCrawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCrawler")
            .field("source", &self.source)
            .field("config", &self.config)
            .field("progress", &self.counters.snapshot())
            .finish()
    }
}
