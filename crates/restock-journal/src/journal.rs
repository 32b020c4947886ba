//! Journal implementation over tokio-rusqlite.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::debug;

use restock_protocols::{HistoryRecord, JournalError, Preference, PreferencePatch, ProviderId};

use crate::schema::init_schema;

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Async handle to the journal database.
pub struct Journal {
    conn: Connection,
}

impl Journal {
    /// Open a file-backed journal, creating the file and any missing
    /// parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening journal at {}", path.display());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| JournalError::Connection(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| JournalError::Connection(e.to_string()))?;

        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(|e| JournalError::Query(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Open an in-memory journal.
    pub async fn in_memory() -> Result<Self, JournalError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| JournalError::Connection(e.to_string()))?;

        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(|e| JournalError::Query(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Save one detection snapshot and return its journal id.
    pub async fn save_snapshot(
        &self,
        date: NaiveDate,
        items: BTreeMap<String, u32>,
    ) -> Result<i64, JournalError> {
        let detected = serde_json::to_string(&items)
            .map_err(|e| JournalError::Serialization(e.to_string()))?;
        let date_str = date.format(DATE_FORMAT).to_string();
        let created = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO fridge_history (date, detected_items, created_at)
                     VALUES (?1, ?2, ?3)",
                    params![date_str, detected, created],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(|e| JournalError::Query(e.to_string()))
    }

    /// Most recent snapshots first.
    pub async fn recent_snapshots(&self, limit: u32) -> Result<Vec<HistoryRecord>, JournalError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, date, detected_items, created_at FROM fridge_history
                     ORDER BY date DESC, id DESC LIMIT ?1",
                )?;
                let records = stmt
                    .query_map([limit], row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(|e| JournalError::Query(e.to_string()))
    }

    /// The newest snapshot, if any was ever saved.
    pub async fn latest_snapshot(&self) -> Result<Option<HistoryRecord>, JournalError> {
        let mut records = self.recent_snapshots(1).await?;
        Ok(records.pop())
    }

    pub async fn snapshot(&self, id: i64) -> Result<Option<HistoryRecord>, JournalError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, date, detected_items, created_at FROM fridge_history WHERE id = ?1",
                )?;
                match stmt.query_row([id], row_to_record) {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(|e| JournalError::Query(e.to_string()))
    }

    pub async fn delete_snapshot(&self, id: i64) -> Result<(), JournalError> {
        let deleted = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM fridge_history WHERE id = ?1", [id])?)
            })
            .await
            .map_err(|e| JournalError::Query(e.to_string()))?;

        if deleted == 0 {
            return Err(JournalError::NotFound(id));
        }
        Ok(())
    }

    /// Delete every snapshot, returning how many rows went away.
    pub async fn clear_snapshots(&self) -> Result<usize, JournalError> {
        self.conn
            .call(|conn| Ok(conn.execute("DELETE FROM fridge_history", [])?))
            .await
            .map_err(|e| JournalError::Query(e.to_string()))
    }

    /// The preference record; defaults when none was saved yet.
    pub async fn preference(&self) -> Result<Preference, JournalError> {
        self.conn
            .call(|conn| read_preference(conn))
            .await
            .map_err(|e| JournalError::Query(e.to_string()))
    }

    /// Apply a partial update and return the stored record.
    pub async fn update_preference(
        &self,
        patch: PreferencePatch,
    ) -> Result<Preference, JournalError> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut preference = read_preference(&tx)?;
                preference.apply(patch);

                tx.execute(
                    "INSERT OR REPLACE INTO preferences
                     (id, custom_instructions, preferred_provider, detection_threshold, selection_mode)
                     VALUES (1, ?1, ?2, ?3, ?4)",
                    params![
                        preference.custom_instructions,
                        preference.preferred_provider.as_str(),
                        preference.detection_threshold as f64,
                        preference.selection_mode.as_str(),
                    ],
                )?;
                tx.commit()?;
                Ok(preference)
            })
            .await
            .map_err(|e| JournalError::Query(e.to_string()))
    }
}

fn read_preference(conn: &rusqlite::Connection) -> Result<Preference, tokio_rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT custom_instructions, preferred_provider, detection_threshold, selection_mode
         FROM preferences WHERE id = 1",
    )?;
    let row = stmt.query_row([], |row| {
        let instructions: String = row.get(0)?;
        let provider: String = row.get(1)?;
        let threshold: f64 = row.get(2)?;
        let mode: String = row.get(3)?;
        Ok((instructions, provider, threshold, mode))
    });

    match row {
        Ok((custom_instructions, provider, threshold, mode)) => Ok(Preference {
            custom_instructions,
            preferred_provider: provider.parse().unwrap_or(ProviderId::Getir),
            detection_threshold: threshold as f32,
            selection_mode: mode.parse().unwrap_or_default(),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(Preference::default()),
        Err(e) => Err(e.into()),
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let id: i64 = row.get(0)?;
    let date_str: String = row.get(1)?;
    let items_str: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let items: BTreeMap<String, u32> = serde_json::from_str(&items_str).unwrap_or_default();
    // Rows inserted by other tooling may carry a non-RFC3339 timestamp;
    // those read back as the epoch rather than failing the whole query.
    let created_at = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();

    Ok(HistoryRecord { id, date, items, created_at })
}
