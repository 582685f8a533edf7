//! SQLite-backed EventStore

use crate::error::Result;
use crate::model::{Event, FocalMechanism, JournalEntry, Origin};
use crate::store::EventStore;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};

/// Store implementation used by the service binary.
///
/// Domain objects are stored as JSON documents; the columns needed for the
/// association queries (preferred origin id, origin time, reference links)
/// are maintained alongside so the time-window and reverse-reference
/// lookups stay in SQL.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn decode<T: serde::de::DeserializeOwned>(data: String) -> Result<T> {
        Ok(serde_json::from_str(&data)?)
    }
}

impl EventStore for SqliteStore {
    async fn events_in_span(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            "SELECT e.data FROM events e
             JOIN origins o ON o.public_id = e.preferred_origin_id
             WHERE o.time_ms >= ? AND o.time_ms <= ?
             ORDER BY e.public_id",
        )
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Self::decode(row.get::<String, _>(0)))
            .collect()
    }

    async fn event_for_origin(&self, origin_id: &str) -> Result<Option<Event>> {
        let row = sqlx::query(
            "SELECT e.data FROM events e
             JOIN event_origin_refs r ON r.event_id = e.public_id
             WHERE r.origin_id = ?",
        )
        .bind(origin_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::decode(r.get::<String, _>(0))).transpose()
    }

    async fn event_for_focal_mechanism(&self, fm_id: &str) -> Result<Option<Event>> {
        let row = sqlx::query(
            "SELECT e.data FROM events e
             JOIN event_fm_refs r ON r.event_id = e.public_id
             WHERE r.fm_id = ?",
        )
        .bind(fm_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::decode(r.get::<String, _>(0))).transpose()
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        let row = sqlx::query("SELECT data FROM events WHERE public_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::decode(r.get::<String, _>(0))).transpose()
    }

    async fn get_origin(&self, origin_id: &str) -> Result<Option<Origin>> {
        let row = sqlx::query("SELECT data FROM origins WHERE public_id = ?")
            .bind(origin_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::decode(r.get::<String, _>(0))).transpose()
    }

    async fn get_focal_mechanism(&self, fm_id: &str) -> Result<Option<FocalMechanism>> {
        let row = sqlx::query("SELECT data FROM focal_mechanisms WHERE public_id = ?")
            .bind(fm_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::decode(r.get::<String, _>(0))).transpose()
    }

    async fn put_event(&self, event: &Event) -> Result<()> {
        let data = serde_json::to_string(event)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO events (public_id, preferred_origin_id, data) VALUES (?, ?, ?)
             ON CONFLICT(public_id) DO UPDATE SET
                preferred_origin_id = excluded.preferred_origin_id,
                data = excluded.data",
        )
        .bind(&event.public_id)
        .bind(&event.preferred_origin_id)
        .bind(&data)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM event_origin_refs WHERE event_id = ?")
            .bind(&event.public_id)
            .execute(&mut *tx)
            .await?;
        for origin_id in &event.origin_refs {
            sqlx::query("INSERT INTO event_origin_refs (event_id, origin_id) VALUES (?, ?)")
                .bind(&event.public_id)
                .bind(origin_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM event_fm_refs WHERE event_id = ?")
            .bind(&event.public_id)
            .execute(&mut *tx)
            .await?;
        for fm_id in &event.focal_mechanism_refs {
            sqlx::query("INSERT INTO event_fm_refs (event_id, fm_id) VALUES (?, ?)")
                .bind(&event.public_id)
                .bind(fm_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn put_origin(&self, origin: &Origin) -> Result<()> {
        let data = serde_json::to_string(origin)?;
        sqlx::query(
            "INSERT INTO origins (public_id, time_ms, data) VALUES (?, ?, ?)
             ON CONFLICT(public_id) DO UPDATE SET
                time_ms = excluded.time_ms,
                data = excluded.data",
        )
        .bind(&origin.public_id)
        .bind(origin.time.timestamp_millis())
        .bind(&data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_focal_mechanism(&self, fm: &FocalMechanism) -> Result<()> {
        let data = serde_json::to_string(fm)?;
        sqlx::query(
            "INSERT INTO focal_mechanisms (public_id, data) VALUES (?, ?)
             ON CONFLICT(public_id) DO UPDATE SET data = excluded.data",
        )
        .bind(&fm.public_id)
        .bind(&data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_journal_entry(&self, entry: &JournalEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO journal (object_id, action, parameters, created, sender)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.object_id)
        .bind(&entry.action)
        .bind(&entry.parameters)
        .bind(entry.created.timestamp_millis())
        .bind(&entry.sender)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn journal_for(&self, object_id: &str) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            "SELECT object_id, action, parameters, created, sender
             FROM journal WHERE object_id = ? ORDER BY id",
        )
        .bind(object_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| JournalEntry {
                object_id: row.get(0),
                action: row.get(1),
                parameters: row.get(2),
                created: Utc
                    .timestamp_millis_opt(row.get::<i64, _>(3))
                    .single()
                    .unwrap_or_else(Utc::now),
                sender: row.get(4),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::model::{CreationInfo, Quantity};

    async fn test_store() -> SqliteStore {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let pool = init_database(&path).await.expect("init db");
        // Keep the directory alive for the pool's lifetime
        std::mem::forget(dir);
        SqliteStore::new(pool)
    }

    fn origin(id: &str, secs: i64) -> Origin {
        Origin {
            public_id: id.to_string(),
            time: Utc.timestamp_opt(secs, 0).unwrap(),
            latitude: Quantity::from(10.0),
            longitude: Quantity::from(20.0),
            depth: None,
            evaluation_mode: None,
            method_id: None,
            creation_info: CreationInfo::default(),
            quality: Default::default(),
            arrivals: Vec::new(),
            magnitudes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_event_round_trip_and_refs() {
        let store = test_store().await;
        store.put_origin(&origin("Origin/1", 1000)).await.unwrap();

        let mut event = Event::new("Event/1".into(), CreationInfo::default());
        event.preferred_origin_id = Some("Origin/1".into());
        event.add_origin_ref("Origin/1");
        store.put_event(&event).await.unwrap();

        let loaded = store.get_event("Event/1").await.unwrap().expect("event");
        assert_eq!(loaded, event);

        let by_origin = store.event_for_origin("Origin/1").await.unwrap();
        assert_eq!(by_origin.map(|e| e.public_id).as_deref(), Some("Event/1"));

        let in_span = store
            .events_in_span(
                Utc.timestamp_opt(0, 0).unwrap(),
                Utc.timestamp_opt(2000, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(in_span.len(), 1);
    }

    #[tokio::test]
    async fn test_journal_insert_and_query() {
        let store = test_store().await;
        let entry = JournalEntry::new("Event/1", "EvPrefOrgIDOK", "Origin/1", "quakefuse");
        store.add_journal_entry(&entry).await.unwrap();
        let found = store.journal_for("Event/1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].parameters, "Origin/1");
    }
}
