//! Progress and message notifications pushed by the crawl core
//!
//! Listeners subscribe before a run starts. Notifications are best effort and
//! may arrive out of order across sources.

use crate::model::Source;
use crate::state::ProgressSnapshot;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A notable event during a crawl run
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    CrawlerStarted {
        source: Source,
    },
    CrawlerFinished {
        source: Source,
        films: usize,
        elapsed: Duration,
    },
    /// A unit was answered with a terminal HTTP error
    DocumentLoadError {
        source: Source,
        url: String,
        status: u16,
    },
    /// A unit's request never completed
    DocumentTransportError {
        source: Source,
        url: String,
        error: String,
    },
    /// A crawler's pipeline failed and it yields nothing
    CrawlerError {
        source: Source,
        error: String,
    },
    StageFinished {
        source: Source,
        stage: String,
        results: usize,
    },
    /// The global time budget ran out
    ServerTimeout {
        after: Duration,
    },
    /// A crawler died outside its own error handling
    ServerError {
        error: String,
    },
}

impl Message {
    /// Stable identifier of the message kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CrawlerStarted { .. } => "crawler-started",
            Self::CrawlerFinished { .. } => "crawler-finished",
            Self::DocumentLoadError { .. } => "document-load-error",
            Self::DocumentTransportError { .. } => "document-transport-error",
            Self::CrawlerError { .. } => "crawler-error",
            Self::StageFinished { .. } => "stage-finished",
            Self::ServerTimeout { .. } => "server-timeout",
            Self::ServerError { .. } => "server-error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::DocumentLoadError { .. }
                | Self::DocumentTransportError { .. }
                | Self::CrawlerError { .. }
                | Self::ServerTimeout { .. }
                | Self::ServerError { .. }
        )
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CrawlerStarted { source } => write!(f, "{}: crawler started", source),
            Self::CrawlerFinished {
                source,
                films,
                elapsed,
            } => write!(
                f,
                "{}: crawler finished with {} films after {:.1}s",
                source,
                films,
                elapsed.as_secs_f64()
            ),
            Self::DocumentLoadError {
                source,
                url,
                status,
            } => write!(f, "{}: loading {} failed with HTTP {}", source, url, status),
            Self::DocumentTransportError { source, url, error } => {
                write!(f, "{}: loading {} failed: {}", source, url, error)
            }
            Self::CrawlerError { source, error } => write!(f, "{}: crawler failed: {}", source, error),
            Self::StageFinished {
                source,
                stage,
                results,
            } => write!(f, "{}: stage '{}' produced {} results", source, stage, results),
            Self::ServerTimeout { after } => write!(
                f,
                "Time limit of {}s reached, crawling stopped",
                after.as_secs()
            ),
            Self::ServerError { error } => write!(f, "Server error: {}", error),
        }
    }
}

/// Receives progress updates of every source
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, source: Source, progress: ProgressSnapshot);
}

/// Receives crawl messages
pub trait MessageListener: Send + Sync {
    fn on_message(&self, message: &Message);
}

/// Logs every message through `tracing`
#[derive(Debug, Default)]
pub struct TracingMessageListener;

impl MessageListener for TracingMessageListener {
    fn on_message(&self, message: &Message) {
        match message {
            Message::ServerTimeout { .. } | Message::ServerError { .. } => {
                tracing::error!("{}", message)
            }
            _ if message.is_error() => tracing::warn!("{}", message),
            Message::StageFinished { .. } => tracing::debug!("{}", message),
            _ => tracing::info!("{}", message),
        }
    }
}

/// Logs progress through `tracing` at debug level
#[derive(Debug, Default)]
pub struct TracingProgressListener;

impl ProgressListener for TracingProgressListener {
    fn on_progress(&self, source: Source, progress: ProgressSnapshot) {
        tracing::debug!(
            "{}: {}/{} ({:.1}%), {} errors",
            source,
            progress.actual,
            progress.max,
            progress.percent(),
            progress.errors
        );
    }
}

/// The subscribers of a crawl run
#[derive(Default)]
pub struct Listeners {
    progress: RwLock<Vec<Arc<dyn ProgressListener>>>,
    messages: RwLock<Vec<Arc<dyn MessageListener>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_progress_listener(&self, listener: Arc<dyn ProgressListener>) {
        self.progress
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn add_message_listener(&self, listener: Arc<dyn MessageListener>) {
        self.messages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn progress(&self, source: Source, progress: ProgressSnapshot) {
        let listeners = self
            .progress
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for listener in listeners.iter() {
            listener.on_progress(source, progress);
        }
    }

    pub fn message(&self, message: &Message) {
        let listeners = self
            .messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for listener in listeners.iter() {
            listener.on_message(message);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = self.progress.read().map(|l| l.len()).unwrap_or(0);
        let messages = self.messages.read().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("Listeners")
            .field("progress", &progress)
            .field("messages", &messages)
            .finish()
    }
}

/// Records every message; used by tests and the run summary
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: RwLock<Vec<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of recorded messages of the given kind
    pub fn count(&self, kind: &str) -> usize {
        self.messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|message| message.kind() == kind)
            .count()
    }
}

impl MessageListener for MessageLog {
    fn on_message(&self, message: &Message) {
        self.messages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
    }
}
