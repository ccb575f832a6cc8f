//! Crawl core: fetching, fork/join tasks, source crawlers and the manager
//!
//! This module contains the crawl orchestration, including:
//! - Rate-limited fetching with retry on HTTP 429
//! - Payload parsing and link extraction
//! - Recursive crawl tasks on a shared worker pool
//! - Per-source crawlers and the manager that runs them under a time limit

mod fetcher;
mod listener;
mod manager;
mod parser;
mod pool;
mod source_crawler;
mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use fetcher::{
    build_http_client, FetchKind, FetchOutcome, Fetcher, RawResponse, ReqwestTransport, Transport,
    TransportError,
};
pub use listener::{
    Listeners, Message, MessageListener, MessageLog, ProgressListener, TracingMessageListener,
    TracingProgressListener,
};
pub use manager::{CrawlBudget, CrawlManager};
pub use parser::{
    element_text, parse_payload, resolve_link, select_links, Link, ParseError, Payload, UnitParser,
};
pub use pool::WorkerPool;
pub use source_crawler::{ErrorPolicy, Pipeline, SourceCrawler};
pub use task::{CrawlStep, CrawlTask};
