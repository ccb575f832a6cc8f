//! Database schema definitions
//!
//! This module contains the SQL schema of the catalogue database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- The stored film list; at most one row
CREATE TABLE IF NOT EXISTS catalogue (
    list_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    saved_at TEXT NOT NULL,
    config_hash TEXT
);

-- Films of the stored list
CREATE TABLE IF NOT EXISTS films (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    film_id TEXT NOT NULL,
    source TEXT NOT NULL,
    topic TEXT NOT NULL,
    title TEXT NOT NULL,
    published TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    description TEXT NOT NULL,
    website TEXT,
    urls TEXT NOT NULL,
    sign_language_urls TEXT NOT NULL,
    audio_description_urls TEXT NOT NULL,
    subtitles TEXT NOT NULL,
    geo_locations TEXT NOT NULL,
    UNIQUE(source, topic, title, published, duration_ms)
);

CREATE INDEX IF NOT EXISTS idx_films_source ON films(source);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["catalogue", "films"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_natural_key_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let insert = "INSERT INTO films (film_id, source, topic, title, published, duration_ms,
                      description, urls, sign_language_urls, audio_description_urls, subtitles,
                      geo_locations)
                      VALUES (?1, 'ard', 'Topic', 'Title', '2024-01-01T20:15:00', 60000, '',
                      '{}', '{}', '{}', '[]', '[]')";
        conn.execute(insert, ["a"]).unwrap();
        assert!(conn.execute(insert, ["b"]).is_err());
    }
}
