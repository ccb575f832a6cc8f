//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CatalogueStore
//! trait. Collections on a film (URLs, subtitles, geo locations) are stored as
//! JSON text columns.

use crate::model::{Catalogue, Film, Source};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CatalogueStore, StorageError, StorageResult, StoredList};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

const PUBLISHED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// SQLite catalogue store
pub struct SqliteCatalogueStore {
    conn: Connection,
}

impl SqliteCatalogueStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCatalogueStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// A films row before conversion
struct FilmRow {
    film_id: String,
    source: String,
    topic: String,
    title: String,
    published: String,
    duration_ms: i64,
    description: String,
    website: Option<String>,
    urls: String,
    sign_language_urls: String,
    audio_description_urls: String,
    subtitles: String,
    geo_locations: String,
}

impl FilmRow {
    fn into_film(self) -> StorageResult<Film> {
        let source: Source = self
            .source
            .parse()
            .map_err(|_| StorageError::InvalidData(format!("unknown source '{}'", self.source)))?;
        let published = NaiveDateTime::parse_from_str(&self.published, PUBLISHED_FORMAT)
            .map_err(|e| StorageError::InvalidData(format!("published '{}': {}", self.published, e)))?;
        let duration_ms = u64::try_from(self.duration_ms)
            .map_err(|_| StorageError::InvalidData(format!("negative duration {}", self.duration_ms)))?;

        let mut film = Film::new(
            source,
            self.topic,
            self.title,
            published,
            Duration::from_millis(duration_ms),
        )
        .with_description(self.description);

        film.id = Uuid::parse_str(&self.film_id)
            .map_err(|e| StorageError::InvalidData(format!("film id '{}': {}", self.film_id, e)))?;
        film.website = self
            .website
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| StorageError::InvalidData(format!("website: {}", e)))?;
        film.urls = serde_json::from_str(&self.urls)?;
        film.sign_language_urls = serde_json::from_str(&self.sign_language_urls)?;
        film.audio_description_urls = serde_json::from_str(&self.audio_description_urls)?;
        film.subtitles = serde_json::from_str(&self.subtitles)?;
        film.geo_locations = serde_json::from_str(&self.geo_locations)?;
        Ok(film)
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("timestamp '{}': {}", value, e)))
}

impl CatalogueStore for SqliteCatalogueStore {
    fn save(&mut self, catalogue: &Catalogue, config_hash: Option<&str>) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM films", [])?;
        tx.execute("DELETE FROM catalogue", [])?;

        tx.execute(
            "INSERT INTO catalogue (list_id, created_at, saved_at, config_hash) VALUES (?1, ?2, ?3, ?4)",
            params![
                catalogue.list_id().to_string(),
                catalogue.created_at().to_rfc3339(),
                Utc::now().to_rfc3339(),
                config_hash
            ],
        )?;

        let mut skipped = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO films (film_id, source, topic, title, published, duration_ms,
                 description, website, urls, sign_language_urls, audio_description_urls,
                 subtitles, geo_locations)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;

            for film in catalogue.iter() {
                let Ok(duration_ms) = i64::try_from(film.duration.as_millis()) else {
                    tracing::warn!(
                        "Skipping film '{}' of {}: duration {:?} out of range",
                        film.title,
                        film.source.name(),
                        film.duration
                    );
                    skipped += 1;
                    continue;
                };
                stmt.execute(params![
                    film.id.to_string(),
                    film.source.id(),
                    film.topic,
                    film.title,
                    film.published.format(PUBLISHED_FORMAT).to_string(),
                    duration_ms,
                    film.description,
                    film.website.as_ref().map(Url::as_str),
                    serde_json::to_string(&film.urls)?,
                    serde_json::to_string(&film.sign_language_urls)?,
                    serde_json::to_string(&film.audio_description_urls)?,
                    serde_json::to_string(&film.subtitles)?,
                    serde_json::to_string(&film.geo_locations)?,
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!(
            "Saved {} films as list {}",
            catalogue.len() - skipped,
            catalogue.list_id()
        );
        Ok(())
    }

    fn load(&self) -> StorageResult<Option<Catalogue>> {
        let Some(list) = self.stored_list()? else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT film_id, source, topic, title, published, duration_ms, description, website,
                    urls, sign_language_urls, audio_description_urls, subtitles, geo_locations
             FROM films ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(FilmRow {
                film_id: row.get(0)?,
                source: row.get(1)?,
                topic: row.get(2)?,
                title: row.get(3)?,
                published: row.get(4)?,
                duration_ms: row.get(5)?,
                description: row.get(6)?,
                website: row.get(7)?,
                urls: row.get(8)?,
                sign_language_urls: row.get(9)?,
                audio_description_urls: row.get(10)?,
                subtitles: row.get(11)?,
                geo_locations: row.get(12)?,
            })
        })?;

        let mut catalogue = Catalogue::with_metadata(list.list_id, list.created_at);
        for row in rows {
            catalogue.add(row?.into_film()?);
        }

        Ok(Some(catalogue))
    }

    fn stored_list(&self) -> StorageResult<Option<StoredList>> {
        let row = self
            .conn
            .query_row(
                "SELECT list_id, created_at, saved_at, config_hash FROM catalogue LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((list_id, created_at, saved_at, config_hash)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredList {
            list_id: Uuid::parse_str(&list_id)
                .map_err(|e| StorageError::InvalidData(format!("list id '{}': {}", list_id, e)))?,
            created_at: parse_timestamp(&created_at)?,
            saved_at: parse_timestamp(&saved_at)?,
            config_hash,
        }))
    }

    fn count_films_by_source(&self) -> StorageResult<Vec<(Source, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM films GROUP BY source")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (id, count) = row?;
            let source: Source = id
                .parse()
                .map_err(|_| StorageError::InvalidData(format!("unknown source '{}'", id)))?;
            counts.push((source, count.max(0) as u64));
        }
        counts.sort();
        Ok(counts)
    }
}

impl std::fmt::Debug for SqliteCatalogueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalogueStore")
            .field("path", &self.conn.path())
            .finish()
    }
}
