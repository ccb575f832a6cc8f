//! The film record detail pages deliver

use crate::crawler::ParseError;
use crate::model::{CrawlUnit, Film, GeoLocation, Resolution, Source};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use url::Url;

/// Longest duration whose millisecond count still fits the store
const MAX_DURATION_SECS: u64 = i64::MAX as u64 / 1000;

/// One film as published by a feed
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmRecord {
    /// Falls back to the topic of the unit that linked here
    #[serde(default)]
    pub topic: Option<String>,
    pub title: String,
    pub published: NaiveDateTime,

    /// Length in seconds
    pub duration: u64,

    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: Option<Url>,
    #[serde(default)]
    pub urls: BTreeMap<Resolution, Url>,
    #[serde(default)]
    pub sign_language_urls: BTreeMap<Resolution, Url>,
    #[serde(default)]
    pub audio_description_urls: BTreeMap<Resolution, Url>,
    #[serde(default)]
    pub subtitles: BTreeSet<Url>,
    #[serde(default)]
    pub geo: BTreeSet<GeoLocation>,
}

impl FilmRecord {
    /// Builds the film, taking the topic from `unit` when the record has none
    pub fn into_film(self, source: Source, unit: &CrawlUnit) -> Result<Film, ParseError> {
        let topic = self
            .topic
            .filter(|topic| !topic.trim().is_empty())
            .or_else(|| unit.topic.clone())
            .ok_or_else(|| ParseError::Missing("topic".to_string()))?;

        if self.title.trim().is_empty() {
            return Err(ParseError::Missing("title".to_string()));
        }

        if self.duration > MAX_DURATION_SECS {
            return Err(ParseError::Invalid(format!(
                "duration of '{}' out of range: {}s",
                self.title, self.duration
            )));
        }

        let mut film = Film::new(
            source,
            topic,
            self.title,
            self.published,
            Duration::from_secs(self.duration),
        )
        .with_description(self.description);

        film.website = self.website;
        film.urls = self.urls;
        film.sign_language_urls = self.sign_language_urls;
        film.audio_description_urls = self.audio_description_urls;
        film.subtitles = self.subtitles;
        film.geo_locations = self.geo;
        Ok(film)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> CrawlUnit {
        CrawlUnit::parse("https://example.com/film/1")
            .unwrap()
            .with_topic("Tatort")
    }

    #[test]
    fn test_full_record() {
        let record: FilmRecord = serde_json::from_str(
            r#"{
                "topic": "Sportschau",
                "title": "Bundesliga",
                "published": "2024-05-04T18:30:00",
                "duration": 3600,
                "description": "Alle Spiele",
                "website": "https://example.com/sportschau",
                "urls": {"normal": "https://cdn.example.com/n.mp4", "hd": "https://cdn.example.com/hd.mp4"},
                "subtitles": ["https://cdn.example.com/sub.vtt"],
                "geo": ["de", "at"]
            }"#,
        )
        .unwrap();

        let film = record.into_film(Source::Ard, &unit()).unwrap();

        assert_eq!(film.topic, "Sportschau");
        assert_eq!(film.duration, Duration::from_secs(3600));
        assert_eq!(film.urls.len(), 2);
        assert_eq!(film.best_url().unwrap().as_str(), "https://cdn.example.com/hd.mp4");
        assert!(film.geo_locations.contains(&GeoLocation::At));
        assert_eq!(film.subtitles.len(), 1);
    }

    #[test]
    fn test_topic_inherited_from_unit() {
        let record: FilmRecord = serde_json::from_str(
            r#"{"title": "Der Fall", "published": "2024-05-05T20:15:00", "duration": 5400}"#,
        )
        .unwrap();

        let film = record.into_film(Source::Ard, &unit()).unwrap();
        assert_eq!(film.topic, "Tatort");
    }

    #[test]
    fn test_out_of_range_duration_is_rejected() {
        let record: FilmRecord = serde_json::from_str(
            r#"{"title": "Endlos", "published": "2024-05-05T20:15:00", "duration": 18446744073709551615}"#,
        )
        .unwrap();

        assert!(matches!(
            record.into_film(Source::Ard, &unit()),
            Err(ParseError::Invalid(message)) if message.contains("Endlos")
        ));

        let longest: FilmRecord = serde_json::from_str(&format!(
            r#"{{"title": "Lang", "published": "2024-05-05T20:15:00", "duration": {}}}"#,
            MAX_DURATION_SECS
        ))
        .unwrap();
        assert!(longest.into_film(Source::Ard, &unit()).is_ok());
    }

    #[test]
    fn test_missing_topic_is_an_error() {
        let record: FilmRecord = serde_json::from_str(
            r#"{"title": "Der Fall", "published": "2024-05-05T20:15:00", "duration": 5400}"#,
        )
        .unwrap();
        let unit = CrawlUnit::parse("https://example.com/film/1").unwrap();

        assert!(matches!(
            record.into_film(Source::Ard, &unit),
            Err(ParseError::Missing(_))
        ));
    }
}
