//! Payload pre-parsing and the parse seam of crawl steps
//!
//! A fetched body is turned into a [`Payload`] according to the step's
//! [`FetchKind`] and handed to a [`UnitParser`]. Parsers are plain
//! synchronous functions; `scraper::Html` is not `Send`, so a payload never
//! lives across an await point.

use crate::crawler::FetchKind;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// A failure turning one fetched unit into results
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a {expected} payload")]
    UnexpectedPayload { expected: FetchKind },

    #[error("Missing element: {0}")]
    Missing(String),

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("{0}")]
    Invalid(String),
}

/// A fetched body, pre-parsed according to its fetch kind
#[derive(Debug)]
pub enum Payload {
    Document(Html),
    Json(serde_json::Value),
}

impl Payload {
    pub fn as_document(&self) -> Result<&Html, ParseError> {
        match self {
            Self::Document(document) => Ok(document),
            Self::Json(_) => Err(ParseError::UnexpectedPayload {
                expected: FetchKind::Document,
            }),
        }
    }

    pub fn as_json(&self) -> Result<&serde_json::Value, ParseError> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Document(_) => Err(ParseError::UnexpectedPayload {
                expected: FetchKind::Json,
            }),
        }
    }
}

/// Pre-parses `body` as the given kind
pub fn parse_payload(kind: FetchKind, body: &str) -> Result<Payload, ParseError> {
    match kind {
        FetchKind::Document => Ok(Payload::Document(Html::parse_document(body))),
        FetchKind::Json => Ok(Payload::Json(serde_json::from_str(body)?)),
    }
}

/// Turns the payload of one fetched unit into zero or more results
///
/// Any error counts as a failure of that unit only.
pub trait UnitParser<U, T>: Send + Sync {
    fn parse(&self, payload: &Payload, unit: &U) -> Result<Vec<T>, ParseError>;
}

impl<U, T, F> UnitParser<U, T> for F
where
    F: Fn(&Payload, &U) -> Result<Vec<T>, ParseError> + Send + Sync,
{
    fn parse(&self, payload: &Payload, unit: &U) -> Result<Vec<T>, ParseError> {
        self(payload, unit)
    }
}

/// A link found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: Url,

    /// Whitespace-normalized link text
    pub text: String,
}

/// Collects the `href` targets of every element matching `selector`
///
/// Relative links are resolved against `base_url`; links that do not
/// resolve to HTTP(S) are skipped.
pub fn select_links(document: &Html, selector: &Selector, base_url: &Url) -> Vec<Link> {
    document
        .select(selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = resolve_link(href, base_url)?;
            Some(Link {
                url,
                text: element_text(&element),
            })
        })
        .collect()
}

/// Text content of an element with runs of whitespace collapsed
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url),
        _ => None,
    }
}
