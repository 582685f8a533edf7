//! Backing store interface and in-memory implementation
//!
//! Queries are synchronous from the engine's point of view: the run loop
//! awaits each call before continuing, so a hung store stalls the service
//! rather than reordering its work.

use crate::error::Result;
use crate::model::{Event, FocalMechanism, JournalEntry, Origin};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Persistent store for events, origins, focal mechanisms and the journal
pub trait EventStore {
    /// Events whose preferred-origin time lies within `[start, end]`
    async fn events_in_span(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<Event>>;

    /// Event referencing the given origin, if any
    async fn event_for_origin(&self, origin_id: &str) -> Result<Option<Event>>;

    /// Event referencing the given focal mechanism, if any
    async fn event_for_focal_mechanism(&self, fm_id: &str) -> Result<Option<Event>>;

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>>;

    /// Fully loaded origin (arrivals and magnitudes included)
    async fn get_origin(&self, origin_id: &str) -> Result<Option<Origin>>;

    async fn get_focal_mechanism(&self, fm_id: &str) -> Result<Option<FocalMechanism>>;

    async fn put_event(&self, event: &Event) -> Result<()>;

    async fn put_origin(&self, origin: &Origin) -> Result<()>;

    async fn put_focal_mechanism(&self, fm: &FocalMechanism) -> Result<()>;

    async fn add_journal_entry(&self, entry: &JournalEntry) -> Result<()>;

    /// Journal entries addressed to one object, in insertion order
    async fn journal_for(&self, object_id: &str) -> Result<Vec<JournalEntry>>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    events: HashMap<String, Event>,
    origins: HashMap<String, Origin>,
    focal_mechanisms: HashMap<String, FocalMechanism>,
    journal: Vec<JournalEntry>,
}

/// HashMap-backed store used by tests and tooling
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // Recover the data from a poisoned lock; state stays consistent
        // because every mutation is a single map operation.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventStore for MemoryStore {
    async fn events_in_span(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let inner = self.lock();
        let mut found: Vec<Event> = inner
            .events
            .values()
            .filter(|ev| {
                ev.preferred_origin_id
                    .as_deref()
                    .and_then(|id| inner.origins.get(id))
                    .map(|o| o.time >= start && o.time <= end)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        // Deterministic order for scan-and-score callers
        found.sort_by(|a, b| a.public_id.cmp(&b.public_id));
        Ok(found)
    }

    async fn event_for_origin(&self, origin_id: &str) -> Result<Option<Event>> {
        let inner = self.lock();
        Ok(inner
            .events
            .values()
            .find(|ev| ev.origin_refs.iter().any(|id| id == origin_id))
            .cloned())
    }

    async fn event_for_focal_mechanism(&self, fm_id: &str) -> Result<Option<Event>> {
        let inner = self.lock();
        Ok(inner
            .events
            .values()
            .find(|ev| ev.focal_mechanism_refs.iter().any(|id| id == fm_id))
            .cloned())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        Ok(self.lock().events.get(event_id).cloned())
    }

    async fn get_origin(&self, origin_id: &str) -> Result<Option<Origin>> {
        Ok(self.lock().origins.get(origin_id).cloned())
    }

    async fn get_focal_mechanism(&self, fm_id: &str) -> Result<Option<FocalMechanism>> {
        Ok(self.lock().focal_mechanisms.get(fm_id).cloned())
    }

    async fn put_event(&self, event: &Event) -> Result<()> {
        self.lock()
            .events
            .insert(event.public_id.clone(), event.clone());
        Ok(())
    }

    async fn put_origin(&self, origin: &Origin) -> Result<()> {
        self.lock()
            .origins
            .insert(origin.public_id.clone(), origin.clone());
        Ok(())
    }

    async fn put_focal_mechanism(&self, fm: &FocalMechanism) -> Result<()> {
        self.lock()
            .focal_mechanisms
            .insert(fm.public_id.clone(), fm.clone());
        Ok(())
    }

    async fn add_journal_entry(&self, entry: &JournalEntry) -> Result<()> {
        self.lock().journal.push(entry.clone());
        Ok(())
    }

    async fn journal_for(&self, object_id: &str) -> Result<Vec<JournalEntry>> {
        Ok(self
            .lock()
            .journal
            .iter()
            .filter(|e| e.object_id == object_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CreationInfo, Quantity};
    use chrono::TimeZone;

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
    async fn test_events_in_span_uses_preferred_origin_time() {
        let store = MemoryStore::new();
        store.put_origin(&origin("Origin/1", 1000)).await.unwrap();
        store.put_origin(&origin("Origin/2", 5000)).await.unwrap();

        let mut ev1 = Event::new("Event/1".into(), CreationInfo::default());
        ev1.preferred_origin_id = Some("Origin/1".into());
        let mut ev2 = Event::new("Event/2".into(), CreationInfo::default());
        ev2.preferred_origin_id = Some("Origin/2".into());
        store.put_event(&ev1).await.unwrap();
        store.put_event(&ev2).await.unwrap();

        let found = store
            .events_in_span(
                Utc.timestamp_opt(500, 0).unwrap(),
                Utc.timestamp_opt(2000, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].public_id, "Event/1");
    }

    #[tokio::test]
    async fn test_event_for_origin() {
        let store = MemoryStore::new();
        let mut ev = Event::new("Event/1".into(), CreationInfo::default());
        ev.add_origin_ref("Origin/9");
        store.put_event(&ev).await.unwrap();

        let found = store.event_for_origin("Origin/9").await.unwrap();
        assert_eq!(found.map(|e| e.public_id).as_deref(), Some("Event/1"));
        assert!(store.event_for_origin("Origin/0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_journal_round_trip() {
        let store = MemoryStore::new();
        let entry = JournalEntry::new("Event/1", "EvTypeOK", "earthquake", "quakefuse");
        store.add_journal_entry(&entry).await.unwrap();
        let found = store.journal_for("Event/1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].action, "EvTypeOK");
    }
}
