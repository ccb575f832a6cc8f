//! Storage traits and error types
//!
//! This module defines the trait interface for catalogue stores and
//! associated error types.

use crate::model::{Catalogue, Source};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Metadata of the stored film list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredList {
    pub list_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    pub config_hash: Option<String>,
}

/// Trait for catalogue persistence backends
///
/// A store holds exactly one film list. Saving replaces it as a whole.
pub trait CatalogueStore {
    /// Replaces the stored list with `catalogue`
    ///
    /// # Arguments
    ///
    /// * `catalogue` - The list to persist
    /// * `config_hash` - Hash of the configuration that produced it
    fn save(&mut self, catalogue: &Catalogue, config_hash: Option<&str>) -> StorageResult<()>;

    /// Loads the stored list, if there is one
    fn load(&self) -> StorageResult<Option<Catalogue>>;

    /// Metadata of the stored list, if there is one
    fn stored_list(&self) -> StorageResult<Option<StoredList>>;

    /// Number of stored films per source, ordered by source
    fn count_films_by_source(&self) -> StorageResult<Vec<(Source, u64)>>;
}
