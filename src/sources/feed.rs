//! Config-driven pipeline: seeds, discovery stages, then film details
//!
//! Every configured source is crawled by a [`FeedPipeline`]. Seeds are fixed
//! URLs plus per-day URLs built from templates. Each discovery stage fetches
//! the current units and turns them into the next ones, either by following
//! the links matched by a CSS selector or by reading an array behind a JSON
//! pointer. The last stage parses one film record per detail unit.

use crate::config::{DetailConfig, DiscoveryConfig, SourceEntry};
use crate::crawler::{
    resolve_link, select_links, CrawlStep, CrawlTask, ErrorPolicy, FetchKind,
    ParseError, Payload, Pipeline, SourceCrawler,
};
use crate::model::{CrawlQueue, CrawlUnit, Film, Source};
use crate::sources::record::FilmRecord;
use crate::CrawlerError;
use async_trait::async_trait;
use chrono::{Duration as Days, Local, NaiveDate};
use scraper::Selector;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

const DEFAULT_RECORD_SELECTOR: &str = "script[type='application/json']";

/// Where links are found in a fetched page
#[derive(Clone)]
enum Extractor {
    /// `href` of every matching element
    Links(Selector),

    /// Array of URL strings or `{url, topic}` objects
    Pointer(String),
}

impl Extractor {
    fn new(source: Source, kind: FetchKind, selector: &str) -> Result<Self, CrawlerError> {
        match kind {
            FetchKind::Document => Ok(Self::Links(parse_selector(source, selector)?)),
            FetchKind::Json => Ok(Self::Pointer(selector.to_string())),
        }
    }
}

#[derive(Clone)]
struct DiscoveryStage {
    name: String,
    kind: FetchKind,
    extractor: Extractor,
    topic_from_text: bool,
    page_parameter: Option<String>,
}

impl DiscoveryStage {
    fn from_config(source: Source, index: usize, config: &DiscoveryConfig) -> Result<Self, CrawlerError> {
        Ok(Self {
            name: format!("discovery-{}", index + 1),
            kind: config.kind,
            extractor: Extractor::new(source, config.kind, &config.selector)?,
            topic_from_text: config.topic_from_text,
            page_parameter: config.page_parameter.clone(),
        })
    }

    fn step(&self) -> CrawlStep<CrawlUnit, CrawlUnit> {
        let extractor = self.extractor.clone();
        let topic_from_text = self.topic_from_text;
        CrawlStep::new(
            self.name.clone(),
            self.kind,
            move |payload: &Payload, unit: &CrawlUnit| discover(&extractor, topic_from_text, payload, unit),
        )
    }
}

#[derive(Clone)]
struct DetailStage {
    kind: FetchKind,
    extractor: RecordExtractor,
}

/// Where the film record sits in a detail payload
#[derive(Clone)]
enum RecordExtractor {
    /// Text of the first matching element
    Element(Selector),

    /// Value behind a JSON pointer; empty is the whole body
    Pointer(String),
}

impl DetailStage {
    fn from_config(source: Source, config: &DetailConfig) -> Result<Self, CrawlerError> {
        let extractor = match config.kind {
            FetchKind::Document => RecordExtractor::Element(parse_selector(
                source,
                config.selector.as_deref().unwrap_or(DEFAULT_RECORD_SELECTOR),
            )?),
            FetchKind::Json => RecordExtractor::Pointer(config.selector.clone().unwrap_or_default()),
        };
        Ok(Self {
            kind: config.kind,
            extractor,
        })
    }

    fn step(&self, source: Source) -> CrawlStep<CrawlUnit, Film> {
        let extractor = self.extractor.clone();
        CrawlStep::new(
            "films",
            self.kind,
            move |payload: &Payload, unit: &CrawlUnit| -> Result<Vec<Film>, ParseError> {
                let record = read_record(&extractor, payload)?;
                Ok(vec![record.into_film(source, unit)?])
            },
        )
        .track_progress()
    }
}

/// The pipeline of one configured source
#[derive(Clone)]
pub struct FeedPipeline {
    source: Source,
    seeds: Vec<CrawlUnit>,
    date_seeds: Vec<String>,
    date_format: String,
    discovery: Vec<DiscoveryStage>,
    detail: DetailStage,
}

impl FeedPipeline {
    /// Builds the pipeline from its config entry
    ///
    /// Seeds and selectors are parsed up front so that a broken feed
    /// definition fails before the run starts.
    pub fn from_entry(source: Source, entry: &SourceEntry) -> Result<Self, CrawlerError> {
        let seeds = entry
            .seeds
            .iter()
            .map(|seed| {
                CrawlUnit::parse(seed).map_err(|e| CrawlerError::Feed {
                    crawler: source,
                    message: format!("invalid seed '{}': {}", seed, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(template) = entry.date_seeds.iter().find(|t| !t.contains("{date}")) {
            return Err(CrawlerError::Feed {
                crawler: source,
                message: format!("date seed '{}' has no {{date}} placeholder", template),
            });
        }

        let discovery = entry
            .discovery
            .iter()
            .enumerate()
            .map(|(index, stage)| DiscoveryStage::from_config(source, index, stage))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source,
            seeds,
            date_seeds: entry.date_seeds.clone(),
            date_format: entry.date_format.clone(),
            discovery,
            detail: DetailStage::from_config(source, &entry.detail)?,
        })
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn stage_count(&self) -> usize {
        self.discovery.len() + 1
    }

    /// Fixed seeds followed by the day pages around `today`
    pub fn seed_units(&self, days_past: u32, days_future: u32, today: NaiveDate) -> Vec<CrawlUnit> {
        let mut units = self.seeds.clone();
        for template in &self.date_seeds {
            for url in day_urls(template, days_past, days_future, today, &self.date_format) {
                match CrawlUnit::parse(&url) {
                    Ok(unit) => units.push(unit),
                    Err(e) => tracing::warn!("{}: skipping day page {}: {}", self.source, url, e),
                }
            }
        }
        units
    }
}

#[async_trait]
impl Pipeline for FeedPipeline {
    async fn crawl(&self, crawler: &Arc<SourceCrawler>) -> Result<HashSet<Film>, CrawlerError> {
        let config = crawler.config().clone();
        let mut units = self.seed_units(
            config.max_days_past,
            config.max_days_future,
            Local::now().date_naive(),
        );
        tracing::info!("{}: starting with {} seed units", self.source, units.len());

        for stage in &self.discovery {
            let mut found = crawler
                .submit(CrawlTask::new(
                    crawler.clone(),
                    Arc::new(stage.step()),
                    units.iter().cloned().collect(),
                ))
                .await?;

            if let Some(parameter) = &stage.page_parameter {
                let pages: CrawlQueue<CrawlUnit> = units
                    .iter()
                    .flat_map(|unit| (2..=config.max_subpages).map(move |page| unit.sub_page(parameter, page)))
                    .collect();
                if !pages.is_empty() {
                    let probe = stage.step().with_policy(ErrorPolicy::silent());
                    found.extend(
                        crawler
                            .submit(CrawlTask::new(crawler.clone(), Arc::new(probe), pages))
                            .await?,
                    );
                }
            }

            units = found.into_iter().collect();
            units.sort();
            tracing::debug!("{}: stage '{}' found {} units", self.source, stage.name, units.len());
        }

        crawler.increment_max_count(units.len());
        crawler.update_progress();

        crawler
            .submit(CrawlTask::new(
                crawler.clone(),
                Arc::new(self.detail.step(self.source)),
                units.into_iter().collect(),
            ))
            .await
    }
}

impl std::fmt::Debug for FeedPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedPipeline")
            .field("source", &self.source)
            .field("seeds", &self.seeds.len())
            .field("date_seeds", &self.date_seeds)
            .field("stages", &self.stage_count())
            .finish()
    }
}

/// Expands a `{date}` template into one URL per day
///
/// Starts `days_future` days after `today` and walks back over
/// `days_past + days_future` days. Days outside the calendar range are skipped.
pub fn day_urls(
    template: &str,
    days_past: u32,
    days_future: u32,
    today: NaiveDate,
    format: &str,
) -> Vec<String> {
    let window = i64::from(days_past) + i64::from(days_future);
    (0..window)
        .filter_map(|i| today.checked_add_signed(Days::days(i64::from(days_future) - i)))
        .map(|day| template.replace("{date}", &day.format(format).to_string()))
        .collect()
}

fn parse_selector(source: Source, selector: &str) -> Result<Selector, CrawlerError> {
    Selector::parse(selector).map_err(|e| CrawlerError::Feed {
        crawler: source,
        message: format!("invalid selector '{}': {}", selector, e),
    })
}

fn discover(
    extractor: &Extractor,
    topic_from_text: bool,
    payload: &Payload,
    unit: &CrawlUnit,
) -> Result<Vec<CrawlUnit>, ParseError> {
    let parent = unit.url.to_string();

    match extractor {
        Extractor::Links(selector) => {
            let links = select_links(payload.as_document()?, selector, &unit.url);
            Ok(links
                .into_iter()
                .map(|link| {
                    let topic = if topic_from_text && !link.text.is_empty() {
                        Some(link.text)
                    } else {
                        unit.topic.clone()
                    };
                    child_unit(link.url, topic, &parent)
                })
                .collect())
        }
        Extractor::Pointer(pointer) => {
            let entries = payload
                .as_json()?
                .pointer(pointer)
                .ok_or_else(|| ParseError::Missing(pointer.clone()))?
                .as_array()
                .ok_or_else(|| ParseError::Invalid(format!("'{}' is not an array", pointer)))?;

            Ok(entries
                .iter()
                .filter_map(|entry| {
                    let (href, topic) = match entry {
                        serde_json::Value::String(href) => (href.as_str(), None),
                        serde_json::Value::Object(fields) => (
                            fields.get("url")?.as_str()?,
                            fields.get("topic").and_then(|t| t.as_str()).map(str::to_string),
                        ),
                        _ => return None,
                    };
                    let url = resolve_link(href, &unit.url)?;
                    Some(child_unit(url, topic.or_else(|| unit.topic.clone()), &parent))
                })
                .collect())
        }
    }
}

fn child_unit(url: Url, topic: Option<String>, parent: &str) -> CrawlUnit {
    let unit = CrawlUnit::new(url).with_parent(parent);
    match topic {
        Some(topic) => unit.with_topic(topic),
        None => unit,
    }
}

fn read_record(extractor: &RecordExtractor, payload: &Payload) -> Result<FilmRecord, ParseError> {
    match extractor {
        RecordExtractor::Element(selector) => {
            let document = payload.as_document()?;
            let element = document
                .select(selector)
                .next()
                .ok_or_else(|| ParseError::Missing("film record element".to_string()))?;
            let text: String = element.text().collect();
            Ok(serde_json::from_str(&text)?)
        }
        RecordExtractor::Pointer(pointer) => {
            let value = payload
                .as_json()?
                .pointer(pointer)
                .ok_or_else(|| ParseError::Missing(pointer.clone()))?;
            Ok(FilmRecord::deserialize(value)?)
        }
    }
}
