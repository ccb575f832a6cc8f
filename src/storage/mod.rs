//! Storage module for persisting film lists
//!
//! This module handles all database operations of the crawler, including:
//! - SQLite database initialization and schema management
//! - Saving the merged catalogue after a run
//! - Loading a previous catalogue for import and statistics
//! - Fetching an import list from a file or over HTTP

mod import;
mod schema;
mod sqlite;
mod traits;

pub use import::{load_import, ImportLocation};
pub use sqlite::SqliteCatalogueStore;
pub use traits::{CatalogueStore, StorageError, StorageResult, StoredList};

use std::path::Path;

/// Opens or creates the catalogue database at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteCatalogueStore> {
    SqliteCatalogueStore::new(path)
}
