//! Per-event engine bookkeeping
//!
//! One record per live event, kept in a table keyed by event id alongside
//! the object cache and removed in the same critical section as the cache
//! entry. Records hold the operator constraints and an explicit preference
//! state per axis, so "no preferred yet", "auto-selected" and "pinned by an
//! operator" are distinguishable without re-deriving them from the journal.

use quakefuse_common::model::EvaluationMode;
use std::collections::HashMap;

/// Selection state of one preference axis (origin, magnitude, mechanism)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Preference {
    /// Nothing selected yet
    #[default]
    Unset,
    /// Chosen by the arbitration cascade; may be deposed at any time
    Auto,
    /// Pinned by an operator command; automatic arbitration is suspended
    Pinned { by: String },
}

impl Preference {
    pub fn is_pinned(&self) -> bool {
        matches!(self, Preference::Pinned { .. })
    }
}

/// Operator pins. A set constraint suspends automatic arbitration for that
/// axis until explicitly released.
#[derive(Debug, Clone, Default)]
pub struct EventConstraints {
    pub fixed_origin_id: Option<String>,
    pub fixed_evaluation_mode: Option<EvaluationMode>,
    pub fixed_magnitude_type: Option<String>,
    pub fixed_focal_mechanism_id: Option<String>,
}

impl EventConstraints {
    /// True when the fixed-origin pin (if any) permits this candidate
    pub fn allows_origin(&self, origin_id: &str) -> bool {
        match &self.fixed_origin_id {
            Some(fixed) => fixed == origin_id,
            None => true,
        }
    }

    pub fn allows_evaluation_mode(&self, mode: EvaluationMode) -> bool {
        match self.fixed_evaluation_mode {
            Some(fixed) => fixed == mode,
            None => true,
        }
    }

    pub fn allows_focal_mechanism(&self, fm_id: &str) -> bool {
        match &self.fixed_focal_mechanism_id {
            Some(fixed) => fixed == fm_id,
            None => true,
        }
    }
}

/// Engine-side state for one event
#[derive(Debug, Clone, Default)]
pub struct EventRecord {
    pub constraints: EventConstraints,
    pub origin_state: Preference,
    pub magnitude_state: Preference,
    pub focal_mechanism_state: Preference,
}

/// Record table keyed by event id; lifetime tied to the event cache
#[derive(Debug, Default)]
pub struct RecordTable {
    records: HashMap<String, EventRecord>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, event_id: &str) -> Option<&EventRecord> {
        self.records.get(event_id)
    }

    /// Fetch-or-create; a record exists for every cached event
    pub fn entry(&mut self, event_id: &str) -> &mut EventRecord {
        self.records.entry(event_id.to_string()).or_default()
    }

    pub fn remove(&mut self, event_id: &str) -> Option<EventRecord> {
        self.records.remove(event_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraints_default_allow_everything() {
        let c = EventConstraints::default();
        assert!(c.allows_origin("Origin/1"));
        assert!(c.allows_evaluation_mode(EvaluationMode::Automatic));
        assert!(c.allows_focal_mechanism("FM/1"));
    }

    #[test]
    fn test_fixed_origin_rejects_other_candidates() {
        let c = EventConstraints {
            fixed_origin_id: Some("Origin/1".into()),
            ..Default::default()
        };
        assert!(c.allows_origin("Origin/1"));
        assert!(!c.allows_origin("Origin/2"));
    }

    #[test]
    fn test_fixed_mode() {
        let c = EventConstraints {
            fixed_evaluation_mode: Some(EvaluationMode::Manual),
            ..Default::default()
        };
        assert!(c.allows_evaluation_mode(EvaluationMode::Manual));
        assert!(!c.allows_evaluation_mode(EvaluationMode::Automatic));
    }

    #[test]
    fn test_record_table_entry_creates_once() {
        let mut table = RecordTable::new();
        table.entry("Event/1").origin_state = Preference::Pinned { by: "op".into() };
        assert!(table.entry("Event/1").origin_state.is_pinned());
        assert_eq!(table.len(), 1);
        table.remove("Event/1");
        assert!(table.is_empty());
    }
}
