//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
-- Dated detection snapshots. detected_items is a JSON object mapping
-- item keys to counts.
CREATE TABLE IF NOT EXISTS fridge_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    detected_items TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fridge_history_date ON fridge_history(date);

-- Singleton user preference record.
CREATE TABLE IF NOT EXISTS preferences (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    custom_instructions TEXT NOT NULL DEFAULT '',
    preferred_provider TEXT NOT NULL DEFAULT 'getir',
    detection_threshold REAL NOT NULL DEFAULT 0.4,
    selection_mode TEXT NOT NULL DEFAULT 'cheapest'
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name='fridge_history'")
            .unwrap();
        assert!(stmt.exists([]).unwrap());

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name='preferences'")
            .unwrap();
        assert!(stmt.exists([]).unwrap());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_preferences_singleton_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute("INSERT INTO preferences (id) VALUES (1)", [])
            .unwrap();
        let result = conn.execute("INSERT INTO preferences (id) VALUES (2)", []);
        assert!(result.is_err());
    }
}
