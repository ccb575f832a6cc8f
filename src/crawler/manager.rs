//! Crawl manager - runs every source crawler under one budget
//!
//! The manager owns the shared worker pool and the catalogue. It starts all
//! registered source crawlers concurrently, enforces the global time limit by
//! shutting the pool down, and merges every partial result into the catalogue
//! once all crawlers have returned.

use crate::config::Config;
use crate::crawler::fetcher::{ReqwestTransport, Transport};
use crate::crawler::listener::{
    Listeners, Message, MessageListener, ProgressListener, TracingMessageListener,
    TracingProgressListener,
};
use crate::crawler::pool::WorkerPool;
use crate::crawler::source_crawler::{Pipeline, SourceCrawler};
use crate::model::{Catalogue, Film, Source, SourceConfig};
use crate::output::{RunStatistics, SourceStatistics};
use crate::sources::FeedPipeline;
use crate::CrawlerError;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global concurrency and time limits of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlBudget {
    /// Size of the shared worker pool
    pub worker_threads: usize,

    /// Wall-clock limit of a run; `None` is unlimited
    pub time_limit: Option<Duration>,
}

impl CrawlBudget {
    pub fn new(worker_threads: usize) -> Self {
        Self {
            worker_threads,
            time_limit: None,
        }
    }

    /// Sets the time limit; a zero duration means unlimited
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = (!limit.is_zero()).then_some(limit);
        self
    }
}

impl Default for CrawlBudget {
    fn default() -> Self {
        Self::new(8)
    }
}

/// Main crawl manager structure
pub struct CrawlManager {
    budget: CrawlBudget,
    pool: Arc<WorkerPool>,
    transport: Arc<dyn Transport>,
    listeners: Arc<Listeners>,
    crawlers: Vec<Arc<SourceCrawler>>,
    catalogue: Catalogue,
    films_found: HashMap<Source, usize>,
    imported: usize,
    timed_out: bool,
    started_at: Option<DateTime<Utc>>,
    elapsed: Duration,
}

impl CrawlManager {
    /// Creates a manager with an empty catalogue and no crawlers
    ///
    /// # Arguments
    ///
    /// * `budget` - Worker pool size and time limit
    /// * `transport` - Performs the requests of every crawler
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlManager)` - The worker pool is running
    /// * `Err(CrawlerError)` - The worker pool could not be started
    pub fn new(budget: CrawlBudget, transport: Arc<dyn Transport>) -> Result<Self, CrawlerError> {
        let pool = WorkerPool::new(budget.worker_threads)?;

        Ok(Self {
            budget,
            pool: Arc::new(pool),
            transport,
            listeners: Arc::new(Listeners::new()),
            crawlers: Vec::new(),
            catalogue: Catalogue::new(),
            films_found: HashMap::new(),
            imported: 0,
            timed_out: false,
            started_at: None,
            elapsed: Duration::ZERO,
        })
    }

    /// Creates a manager for a configuration
    ///
    /// Builds the HTTP transport from the user agent section, subscribes the
    /// tracing listeners and registers a feed pipeline for every enabled
    /// source.
    pub fn from_config(config: &Config) -> Result<Self, CrawlerError> {
        let transport = Arc::new(ReqwestTransport::from_config(&config.user_agent)?);
        let mut manager = Self::new(config.budget(), transport)?;

        manager.add_message_listener(Arc::new(TracingMessageListener));
        manager.add_progress_listener(Arc::new(TracingProgressListener));

        for (source, entry) in config.enabled_sources()? {
            let pipeline = FeedPipeline::from_entry(source, entry)?;
            manager.register(source, config.source_config(source), Arc::new(pipeline));
        }

        tracing::info!(
            "Registered {} crawlers on {} worker threads",
            manager.crawlers.len(),
            manager.pool.threads()
        );
        Ok(manager)
    }

    /// Registers the crawler of `source`, replacing an earlier registration
    pub fn register(
        &mut self,
        source: Source,
        config: SourceConfig,
        pipeline: Arc<dyn Pipeline>,
    ) -> Arc<SourceCrawler> {
        let crawler = Arc::new(SourceCrawler::new(
            source,
            config,
            self.transport.clone(),
            self.pool.clone(),
            self.listeners.clone(),
            pipeline,
        ));

        match self.crawlers.iter_mut().find(|c| c.source() == source) {
            Some(existing) => *existing = crawler.clone(),
            None => self.crawlers.push(crawler.clone()),
        }
        crawler
    }

    pub fn add_message_listener(&self, listener: Arc<dyn MessageListener>) {
        self.listeners.add_message_listener(listener);
    }

    pub fn add_progress_listener(&self, listener: Arc<dyn ProgressListener>) {
        self.listeners.add_progress_listener(listener);
    }

    pub fn budget(&self) -> CrawlBudget {
        self.budget
    }

    /// Registered sources in registration order
    pub fn sources(&self) -> Vec<Source> {
        self.crawlers.iter().map(|c| c.source()).collect()
    }

    pub fn crawler(&self, source: Source) -> Option<&Arc<SourceCrawler>> {
        self.crawlers.iter().find(|c| c.source() == source)
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Hands the catalogue over for persistence
    pub fn into_catalogue(self) -> Catalogue {
        self.catalogue
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Merges a previously persisted catalogue; returns how many films were new
    pub fn import_catalogue(&mut self, imported: &Catalogue) -> usize {
        let added = self.catalogue.merge(imported);
        self.imported += added;
        tracing::info!(
            "Imported {} of {} films from list {}",
            added,
            imported.len(),
            imported.list_id()
        );
        added
    }

    /// Runs every registered crawler and merges their films into the catalogue
    ///
    /// Returns only after every crawler has finished or been cancelled by the
    /// time limit. A crawler that dies contributes nothing and does not affect
    /// the others.
    pub async fn run_all(&mut self) -> &Catalogue {
        let started = self.start_run();

        let (sources, handles): (Vec<Source>, Vec<_>) = self
            .crawlers
            .iter()
            .map(|crawler| (crawler.source(), tokio::spawn(crawler.clone().run())))
            .unzip();

        let results = self.within_time_limit(join_all(handles)).await;

        for (source, result) in sources.into_iter().zip(results) {
            match result {
                Ok(films) => self.record(source, films),
                Err(e) => self.crawler_died(source, e),
            }
        }

        self.finish_run(started);
        &self.catalogue
    }

    /// Runs the crawler of one source and merges its films into the catalogue
    ///
    /// # Returns
    ///
    /// * `Ok(films)` - The films this run produced
    /// * `Err(CrawlerError::NoCrawler)` - No crawler is registered for `source`
    pub async fn run_one(&mut self, source: Source) -> Result<HashSet<Film>, CrawlerError> {
        let crawler = self
            .crawler(source)
            .cloned()
            .ok_or(CrawlerError::NoCrawler(source))?;

        let started = self.start_run();
        let handle = tokio::spawn(crawler.run());

        let films = match self.within_time_limit(handle).await {
            Ok(films) => films,
            Err(e) => {
                self.crawler_died(source, e);
                HashSet::new()
            }
        };

        self.record(source, films.clone());
        self.finish_run(started);
        Ok(films)
    }

    /// Collects counters of every crawler and the run outcome
    pub fn statistics(&self) -> RunStatistics {
        let sources = self
            .crawlers
            .iter()
            .map(|crawler| {
                let progress = crawler.progress();
                SourceStatistics {
                    source: crawler.source(),
                    max: progress.max,
                    actual: progress.actual,
                    errors: progress.errors,
                    films: self.films_found.get(&crawler.source()).copied().unwrap_or(0),
                    forks: crawler.task_stats().forks(),
                    max_depth: crawler.task_stats().max_depth(),
                }
            })
            .collect();

        RunStatistics {
            list_id: self.catalogue.list_id(),
            started_at: self.started_at.unwrap_or_else(Utc::now),
            elapsed: self.elapsed,
            timed_out: self.timed_out,
            catalogue_size: self.catalogue.len(),
            imported: self.imported,
            config_hash: None,
            sources,
        }
    }

    fn start_run(&mut self) -> Instant {
        self.started_at.get_or_insert_with(Utc::now);
        tracing::info!("Starting {} crawlers", self.crawlers.len());
        Instant::now()
    }

    fn finish_run(&mut self, started: Instant) {
        self.elapsed += started.elapsed();
        tracing::info!(
            "Crawl finished after {:.1}s, catalogue holds {} films",
            self.elapsed.as_secs_f64(),
            self.catalogue.len()
        );
    }

    fn record(&mut self, source: Source, films: HashSet<Film>) {
        *self.films_found.entry(source).or_default() += films.len();
        let added = self.catalogue.add_all(films);
        tracing::debug!("{}: {} new films merged into the catalogue", source, added);
    }

    fn crawler_died(&self, source: Source, error: tokio::task::JoinError) {
        tracing::error!("fatal: {} crawler died: {}", source, error);
        self.listeners.message(&Message::ServerError {
            error: format!("{} crawler died: {}", source, error),
        });
    }

    /// Awaits `work`, shutting the pool down once the time limit expires
    ///
    /// After the shutdown `work` is still awaited, so every crawler gets to
    /// return its (possibly empty) result. The timeout is signalled once.
    async fn within_time_limit<F: Future>(&mut self, work: F) -> F::Output {
        let Some(limit) = self.budget.time_limit else {
            return work.await;
        };

        tokio::pin!(work);
        tokio::select! {
            output = &mut work => output,
            _ = tokio::time::sleep(limit) => {
                tracing::error!("fatal: time limit of {:?} reached, stopping all crawlers", limit);
                self.timed_out = true;
                self.pool.shutdown();
                self.listeners.message(&Message::ServerTimeout { after: limit });
                work.await
            }
        }
    }
}

impl std::fmt::Debug for CrawlManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlManager")
            .field("budget", &self.budget)
            .field("sources", &self.sources())
            .field("catalogue", &self.catalogue.len())
            .field("timed_out", &self.timed_out)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::{FetchKind, RawResponse, TransportError};
    use crate::crawler::listener::MessageLog;
    use crate::crawler::parser::{ParseError, Payload};
    use crate::crawler::{CrawlStep, CrawlTask};
    use crate::model::{CrawlQueue, CrawlUnit};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use url::Url;

    /// Answers with the last path segment; requests to `slow.example.com`
    /// take a minute
    struct HostTransport;

    #[async_trait]
    impl Transport for HostTransport {
        async fn get(
            &self,
            url: &Url,
            _kind: FetchKind,
            _timeout: Duration,
        ) -> Result<RawResponse, TransportError> {
            if url.host_str() == Some("slow.example.com") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            let id = url.path_segments().and_then(|s| s.last()).unwrap_or("");
            Ok(RawResponse::new(200, id))
        }
    }

    fn film(source: Source, n: u64) -> Film {
        let published = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        Film::new(source, "Topic", format!("Film {}", n), published, Duration::from_secs(60))
    }

    /// Fetches `count` numbered detail pages on `host` and turns each into a film
    struct NumberedFilms {
        host: &'static str,
        count: u64,
    }

    #[async_trait]
    impl Pipeline for NumberedFilms {
        async fn crawl(&self, crawler: &Arc<SourceCrawler>) -> Result<HashSet<Film>, CrawlerError> {
            let queue: CrawlQueue<CrawlUnit> = (0..self.count)
                .map(|n| CrawlUnit::parse(&format!("https://{}/film/{}", self.host, n)).unwrap())
                .collect();
            crawler.increment_max_count(queue.len());

            let source = crawler.source();
            let step = CrawlStep::new(
                "films",
                FetchKind::Json,
                move |payload: &Payload, _: &CrawlUnit| -> Result<Vec<Film>, ParseError> {
                    let n = payload
                        .as_json()?
                        .as_u64()
                        .ok_or_else(|| ParseError::Invalid("no id".to_string()))?;
                    Ok(vec![film(source, n)])
                },
            )
            .track_progress();

            crawler
                .submit(CrawlTask::new(crawler.clone(), Arc::new(step), queue))
                .await
        }
    }

    struct PanickingPipeline;

    #[async_trait]
    impl Pipeline for PanickingPipeline {
        async fn crawl(&self, _crawler: &Arc<SourceCrawler>) -> Result<HashSet<Film>, CrawlerError> {
            panic!("broken crawler");
        }
    }

    fn config(max_units_per_task: usize) -> SourceConfig {
        SourceConfig {
            max_units_per_task,
            max_requests_per_second: 10_000.0,
            ..SourceConfig::default()
        }
    }

    fn manager(budget: CrawlBudget) -> (CrawlManager, Arc<MessageLog>) {
        let manager = CrawlManager::new(budget, Arc::new(HostTransport)).unwrap();
        let log = Arc::new(MessageLog::new());
        manager.add_message_listener(log.clone());
        (manager, log)
    }

    #[tokio::test]
    async fn test_run_one_without_crawler_fails() {
        let (mut manager, _log) = manager(CrawlBudget::new(2));
        manager.register(
            Source::Ard,
            config(2),
            Arc::new(NumberedFilms {
                host: "fast.example.com",
                count: 1,
            }),
        );

        let result = manager.run_one(Source::Zdf).await;

        assert!(matches!(result, Err(CrawlerError::NoCrawler(Source::Zdf))));
        assert!(manager.catalogue().is_empty());
    }

    #[tokio::test]
    async fn test_run_one_five_films() {
        let (mut manager, _log) = manager(CrawlBudget::new(4));
        manager.register(
            Source::Ard,
            config(2),
            Arc::new(NumberedFilms {
                host: "fast.example.com",
                count: 5,
            }),
        );

        let films = manager.run_one(Source::Ard).await.unwrap();

        assert_eq!(films.len(), 5);
        assert_eq!(manager.catalogue().len(), 5);

        let crawler = manager.crawler(Source::Ard).unwrap();
        assert_eq!(crawler.task_stats().forks(), 2);
        assert_eq!(crawler.task_stats().max_depth(), 2);
        assert_eq!(crawler.progress().max, 5);
        assert_eq!(crawler.progress().actual, 5);

        let stats = manager.statistics();
        assert_eq!(stats.sources[0].films, 5);
        assert!(!stats.timed_out);
    }

    #[tokio::test]
    async fn test_run_all_survives_a_dying_crawler() {
        let (mut manager, log) = manager(CrawlBudget::new(4));
        manager.register(
            Source::Ard,
            config(3),
            Arc::new(NumberedFilms {
                host: "fast.example.com",
                count: 10,
            }),
        );
        manager.register(Source::Br, config(3), Arc::new(PanickingPipeline));
        manager.register(
            Source::Zdf,
            config(3),
            Arc::new(NumberedFilms {
                host: "fast.example.com",
                count: 4,
            }),
        );

        let catalogue = manager.run_all().await;

        assert_eq!(catalogue.len(), 14);
        assert_eq!(catalogue.films_of(Source::Br).count(), 0);
        assert_eq!(log.count("server-error"), 1);
        assert_eq!(log.count("server-timeout"), 0);
    }

    #[tokio::test]
    async fn test_register_replaces_existing_crawler() {
        let (mut manager, _log) = manager(CrawlBudget::new(1));
        manager.register(Source::Ard, config(1), Arc::new(PanickingPipeline));
        manager.register(
            Source::Ard,
            config(1),
            Arc::new(NumberedFilms {
                host: "fast.example.com",
                count: 2,
            }),
        );

        assert_eq!(manager.sources(), vec![Source::Ard]);
        assert_eq!(manager.run_one(Source::Ard).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_stops_run_and_fires_once() {
        let limit = Duration::from_millis(300);
        let (mut manager, log) = manager(CrawlBudget::new(2).with_time_limit(limit));
        manager.register(
            Source::Ard,
            config(2),
            Arc::new(NumberedFilms {
                host: "fast.example.com",
                count: 3,
            }),
        );
        manager.register(
            Source::Orf,
            config(2),
            Arc::new(NumberedFilms {
                host: "slow.example.com",
                count: 6,
            }),
        );

        let started = Instant::now();
        let size = manager.run_all().await.len();
        let elapsed = started.elapsed();

        assert!(elapsed >= limit);
        assert!(elapsed < limit + Duration::from_secs(5), "took {:?}", elapsed);
        assert!(manager.timed_out());
        assert_eq!(log.count("server-timeout"), 1);

        // The fast source finished before the deadline and keeps its films
        assert_eq!(size, 3);
        assert_eq!(manager.catalogue().films_of(Source::Orf).count(), 0);
    }

    #[tokio::test]
    async fn test_timer_disarmed_when_crawl_finishes_early() {
        let (mut manager, log) =
            manager(CrawlBudget::new(2).with_time_limit(Duration::from_secs(30)));
        manager.register(
            Source::Ard,
            config(2),
            Arc::new(NumberedFilms {
                host: "fast.example.com",
                count: 4,
            }),
        );

        let started = Instant::now();
        manager.run_all().await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!manager.timed_out());
        assert_eq!(log.count("server-timeout"), 0);
        assert_eq!(manager.catalogue().len(), 4);
    }

    #[tokio::test]
    async fn test_import_then_crawl_collapses_duplicates() {
        let (mut manager, _log) = manager(CrawlBudget::new(2));
        manager.register(
            Source::Ard,
            config(2),
            Arc::new(NumberedFilms {
                host: "fast.example.com",
                count: 4,
            }),
        );

        let imported: Catalogue = (2..6).map(|n| film(Source::Ard, n)).collect();
        assert_eq!(manager.import_catalogue(&imported), 4);
        assert_eq!(manager.import_catalogue(&imported), 0);

        manager.run_all().await;

        assert_eq!(manager.catalogue().len(), 6);
        assert_eq!(manager.statistics().imported, 4);
    }

    #[test]
    fn test_zero_time_limit_is_unlimited() {
        let budget = CrawlBudget::new(4).with_time_limit(Duration::ZERO);
        assert_eq!(budget.time_limit, None);
    }
}
