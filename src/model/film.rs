//! The catalogued film entity

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::model::Source;

/// Quality tier of a download URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Small,
    Normal,
    Hd,
}

/// Region a film may be watched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoLocation {
    De,
    At,
    Ch,
    Eu,
    World,
}

/// Natural key of a film
///
/// Two films with the same key describe the same program; everything else
/// (generated id, URLs, subtitles) is payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilmKey {
    pub source: Source,
    pub topic: String,
    pub title: String,
    pub published: NaiveDateTime,
    pub duration: Duration,
}

/// One catalogued video program
#[derive(Debug, Clone)]
pub struct Film {
    /// Generated identity; not part of equality
    pub id: Uuid,
    pub source: Source,
    pub topic: String,
    pub title: String,
    pub published: NaiveDateTime,
    pub duration: Duration,
    pub description: String,
    pub website: Option<Url>,

    /// Regular download URLs by resolution
    pub urls: BTreeMap<Resolution, Url>,

    /// Sign language versions by resolution
    pub sign_language_urls: BTreeMap<Resolution, Url>,

    /// Audio description versions by resolution
    pub audio_description_urls: BTreeMap<Resolution, Url>,

    pub subtitles: BTreeSet<Url>,
    pub geo_locations: BTreeSet<GeoLocation>,
}

impl Film {
    /// Creates a film with a fresh id and no URLs
    pub fn new(
        source: Source,
        topic: impl Into<String>,
        title: impl Into<String>,
        published: NaiveDateTime,
        duration: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            topic: topic.into(),
            title: title.into(),
            published,
            duration,
            description: String::new(),
            website: None,
            urls: BTreeMap::new(),
            sign_language_urls: BTreeMap::new(),
            audio_description_urls: BTreeMap::new(),
            subtitles: BTreeSet::new(),
            geo_locations: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_website(mut self, website: Url) -> Self {
        self.website = Some(website);
        self
    }

    pub fn with_url(mut self, resolution: Resolution, url: Url) -> Self {
        self.urls.insert(resolution, url);
        self
    }

    pub fn with_subtitle(mut self, url: Url) -> Self {
        self.subtitles.insert(url);
        self
    }

    pub fn with_geo_location(mut self, geo: GeoLocation) -> Self {
        self.geo_locations.insert(geo);
        self
    }

    /// The natural key used for deduplication
    pub fn key(&self) -> FilmKey {
        FilmKey {
            source: self.source,
            topic: self.topic.clone(),
            title: self.title.clone(),
            published: self.published,
            duration: self.duration,
        }
    }

    /// Best available download URL, preferring HD
    pub fn best_url(&self) -> Option<&Url> {
        [Resolution::Hd, Resolution::Normal, Resolution::Small]
            .iter()
            .find_map(|resolution| self.urls.get(resolution))
    }

    fn key_fields(&self) -> (Source, &str, &str, NaiveDateTime, Duration) {
        (
            self.source,
            &self.topic,
            &self.title,
            self.published,
            self.duration,
        )
    }
}

impl PartialEq for Film {
    fn eq(&self, other: &Self) -> bool {
        self.key_fields() == other.key_fields()
    }
}

impl Eq for Film {}

impl Hash for Film {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_fields().hash(state);
    }
}
