//! Fetch targets and the queues crawl tasks consume

use std::collections::VecDeque;
use url::Url;

/// Anything a crawl task can fetch
pub trait CrawlTarget: Clone + Send + Sync + 'static {
    fn url(&self) -> &Url;
}

/// A single addressable fetch target plus the context needed to interpret it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrawlUnit {
    pub url: Url,

    /// Topic or category label inherited from the page that linked here
    pub topic: Option<String>,

    /// Pagination cursor (page number or opaque token)
    pub cursor: Option<String>,

    /// Identifier of the parent entry, if any
    pub parent: Option<String>,
}

impl CrawlUnit {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            topic: None,
            cursor: None,
            parent: None,
        }
    }

    /// Parses `url` and wraps it in a unit
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Derives a unit for sub-page `page`, carrying the page number in
    /// `parameter` and as cursor
    pub fn sub_page(&self, parameter: &str, page: u32) -> Self {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair(parameter, &page.to_string());
        Self {
            url,
            topic: self.topic.clone(),
            cursor: Some(page.to_string()),
            parent: Some(self.url.to_string()),
        }
    }
}

impl CrawlTarget for CrawlUnit {
    fn url(&self) -> &Url {
        &self.url
    }
}

impl CrawlTarget for Url {
    fn url(&self) -> &Url {
        self
    }
}

/// An ordered multiset of units awaiting processing
///
/// A queue is owned by exactly one task at a time and moves between tasks
/// when work is split, so it needs no internal locking.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlQueue<U> {
    items: VecDeque<U>,
}

impl<U> CrawlQueue<U> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends a unit discovered while processing
    pub fn push(&mut self, unit: U) {
        self.items.push_back(unit);
    }

    /// Takes the next unit
    pub fn poll(&mut self) -> Option<U> {
        self.items.pop_front()
    }

    /// Removes the first half of the current elements into a new queue
    ///
    /// For any queue with two or more units both this queue and the returned
    /// one are non-empty afterwards.
    pub fn split_front_half(&mut self) -> CrawlQueue<U> {
        let half = self.items.len() / 2;
        let rest = self.items.split_off(half);
        let front = std::mem::replace(&mut self.items, rest);
        CrawlQueue { items: front }
    }

    pub fn iter(&self) -> impl Iterator<Item = &U> {
        self.items.iter()
    }
}

impl<U> Default for CrawlQueue<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> FromIterator<U> for CrawlQueue<U> {
    fn from_iter<I: IntoIterator<Item = U>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<U> Extend<U> for CrawlQueue<U> {
    fn extend<I: IntoIterator<Item = U>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<U> IntoIterator for CrawlQueue<U> {
    type Item = U;
    type IntoIter = std::collections::vec_deque::IntoIter<U>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
