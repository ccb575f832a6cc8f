//! The recursive divide-and-conquer crawl task
//!
//! A [`CrawlTask`] owns a queue of units. Small queues are processed in place;
//! larger ones are split in two, the front half is forked onto the worker pool
//! and the rest is computed by the current task, then both result sets are
//! unioned. Every failure below the task is absorbed into the crawler's error
//! counter, so `compute` always yields a (possibly smaller) result set.

use crate::crawler::parser::{parse_payload, ParseError, UnitParser};
use crate::crawler::source_crawler::{ErrorPolicy, SourceCrawler};
use crate::crawler::FetchKind;
use crate::model::{CrawlQueue, CrawlTarget};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// How one kind of unit is fetched and parsed
///
/// A step is the strategy value a task applies to each of its units: the
/// fetch kind, the parser, the error policy and whether finishing a unit
/// counts as progress.
pub struct CrawlStep<U, T> {
    name: String,
    kind: FetchKind,
    parser: Arc<dyn UnitParser<U, T>>,
    policy: ErrorPolicy,
    track_progress: bool,
}

impl<U, T> CrawlStep<U, T>
where
    U: CrawlTarget,
    T: Send + 'static,
{
    pub fn new<P>(name: impl Into<String>, kind: FetchKind, parser: P) -> Self
    where
        P: UnitParser<U, T> + 'static,
    {
        Self {
            name: name.into(),
            kind,
            parser: Arc::new(parser),
            policy: ErrorPolicy::default(),
            track_progress: false,
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Count every processed unit as completed work of the crawler
    pub fn track_progress(mut self) -> Self {
        self.track_progress = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FetchKind {
        self.kind
    }

    /// Fetches and parses one unit; failures are counted, never returned
    async fn process(&self, crawler: &SourceCrawler, unit: &U) -> Vec<T> {
        let produced = match crawler.fetch(unit.url(), self.kind, self.policy).await {
            Some(body) => match self.parse(&body, unit) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(
                        "{}: failed to parse {} in stage '{}': {}",
                        crawler.source(),
                        unit.url(),
                        self.name,
                        e
                    );
                    crawler.increment_error_count();
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        if self.track_progress {
            crawler.increment_actual_count();
            crawler.update_progress();
        }

        produced
    }

    fn parse(&self, body: &str, unit: &U) -> Result<Vec<T>, ParseError> {
        // A panicking parser is one bad unit, not a dead task
        catch_unwind(AssertUnwindSafe(|| {
            let payload = parse_payload(self.kind, body)?;
            self.parser.parse(&payload, unit)
        }))
        .unwrap_or_else(|_| Err(ParseError::Invalid("parser panicked".to_string())))
    }
}

/// A queue of units plus everything needed to process it
pub struct CrawlTask<U, T> {
    crawler: Arc<SourceCrawler>,
    step: Arc<CrawlStep<U, T>>,
    queue: CrawlQueue<U>,
    depth: u32,
}

impl<U, T> CrawlTask<U, T>
where
    U: CrawlTarget,
    T: Eq + Hash + Send + 'static,
{
    /// Creates a root task
    pub fn new(crawler: Arc<SourceCrawler>, step: Arc<CrawlStep<U, T>>, queue: CrawlQueue<U>) -> Self {
        Self {
            crawler,
            step,
            queue,
            depth: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn step(&self) -> &CrawlStep<U, T> {
        &self.step
    }

    fn child(&self, queue: CrawlQueue<U>) -> Self {
        Self {
            crawler: self.crawler.clone(),
            step: self.step.clone(),
            queue,
            depth: self.depth + 1,
        }
    }

    /// Computes the union of the results of every unit in the queue
    ///
    /// Queues no larger than the source's split threshold are processed
    /// sequentially. Larger ones fork their front half onto the pool and
    /// compute the remainder in place.
    pub fn compute(mut self) -> BoxFuture<'static, HashSet<T>> {
        async move {
            let stats = self.crawler.task_stats();
            stats.record_depth(self.depth);

            if self.queue.len() <= self.crawler.config().split_threshold() {
                return self.process_all().await;
            }

            let front = self.queue.split_front_half();
            let rest = std::mem::take(&mut self.queue);
            let sibling = self.child(front);
            let continuation = self.child(rest);

            stats.record_fork();
            let forked = match self.crawler.pool().spawn(sibling.compute()) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!("{}: could not fork crawl task: {}", self.crawler.source(), e);
                    stats.record_lost_branch();
                    None
                }
            };

            let mut results = continuation.compute().await;

            if let Some(handle) = forked {
                match handle.await {
                    Ok(sibling_results) => results.extend(sibling_results),
                    Err(e) => {
                        tracing::warn!(
                            "{}: forked crawl task at depth {} did not complete: {}",
                            self.crawler.source(),
                            self.depth + 1,
                            e
                        );
                        stats.record_lost_branch();
                    }
                }
            }

            results
        }
        .boxed()
    }

    async fn process_all(self) -> HashSet<T> {
        let CrawlTask {
            crawler,
            step,
            mut queue,
            ..
        } = self;

        let mut results = HashSet::new();
        while let Some(unit) = queue.poll() {
            results.extend(step.process(&crawler, &unit).await);
        }
        results
    }
}
