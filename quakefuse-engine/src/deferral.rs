//! Deferral buffer
//!
//! Inputs matching the configured delay filter are parked with a countdown
//! and retried by the engine's timer, independently of message arrival.
//! Each tick runs two passes: expired entries get a full association, and
//! the remainder get an opportunistic association without event creation so
//! a still-delayed object can ride along once a matching event exists.

use quakefuse_common::config::DelayConfig;
use quakefuse_common::model::{EvaluationMode, FocalMechanism, Origin};

/// Object classes that can be deferred
#[derive(Debug, Clone)]
pub enum Deferrable {
    Origin(Origin),
    FocalMechanism(FocalMechanism),
}

impl Deferrable {
    pub fn public_id(&self) -> &str {
        match self {
            Deferrable::Origin(o) => &o.public_id,
            Deferrable::FocalMechanism(f) => &f.public_id,
        }
    }
}

#[derive(Debug)]
struct Entry {
    object: Deferrable,
    remaining_secs: i64,
}

/// FIFO buffer of (object, countdown) pairs. A countdown strictly
/// decreases each tick; an entry is removed exactly once, on expiry or on
/// an early opportunistic flush.
#[derive(Debug, Default)]
pub struct DeferralBuffer {
    entries: Vec<Entry>,
}

impl DeferralBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: Deferrable, delay_secs: u64) {
        self.entries.push(Entry {
            object,
            remaining_secs: delay_secs as i64,
        });
    }

    pub fn contains_origin(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(&e.object, Deferrable::Origin(o) if o.public_id == id))
    }

    pub fn contains_focal_mechanism(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(&e.object, Deferrable::FocalMechanism(f) if f.public_id == id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tick pass 1: decrement every countdown and drain expired entries
    pub fn expire(&mut self, tick_secs: u64) -> Vec<Deferrable> {
        for entry in &mut self.entries {
            entry.remaining_secs -= tick_secs as i64;
        }
        let mut expired = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].remaining_secs <= 0 {
                expired.push(self.entries.remove(i).object);
            } else {
                i += 1;
            }
        }
        expired
    }

    /// Snapshot of still-pending entries for tick pass 2
    pub fn pending(&self) -> Vec<Deferrable> {
        self.entries.iter().map(|e| e.object.clone()).collect()
    }

    pub fn remove_origin(&mut self, id: &str) {
        self.entries
            .retain(|e| !matches!(&e.object, Deferrable::Origin(o) if o.public_id == id));
    }

    pub fn remove_focal_mechanism(&mut self, id: &str) {
        self.entries
            .retain(|e| !matches!(&e.object, Deferrable::FocalMechanism(f) if f.public_id == id));
    }
}

/// True when the delay filter is active and every configured criterion
/// matches the candidate's provenance. With a positive span and no
/// criteria set, everything is delayed.
pub fn delay_filter_matches(
    cfg: &DelayConfig,
    agency: &str,
    author: &str,
    mode: EvaluationMode,
) -> bool {
    if cfg.span_secs == 0 {
        return false;
    }
    if let Some(a) = &cfg.agency_id {
        if a != agency {
            return false;
        }
    }
    if let Some(a) = &cfg.author {
        if a != author {
            return false;
        }
    }
    if let Some(m) = cfg.evaluation_mode {
        if m != mode {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quakefuse_common::model::{CreationInfo, Quantity};

    fn origin(id: &str) -> Origin {
        Origin {
            public_id: id.to_string(),
            time: Utc::now(),
            latitude: Quantity::from(0.0),
            longitude: Quantity::from(0.0),
            depth: None,
            evaluation_mode: None,
            method_id: None,
            creation_info: CreationInfo::default(),
            quality: Default::default(),
            arrivals: Vec::new(),
            magnitudes: Vec::new(),
        }
    }

    #[test]
    fn test_expires_on_exactly_the_third_tick() {
        let mut buffer = DeferralBuffer::new();
        buffer.push(Deferrable::Origin(origin("Origin/1")), 30);

        assert!(buffer.expire(10).is_empty());
        assert!(buffer.expire(10).is_empty());
        let expired = buffer.expire(10);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].public_id(), "Origin/1");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_early_removal_on_opportunistic_flush() {
        let mut buffer = DeferralBuffer::new();
        buffer.push(Deferrable::Origin(origin("Origin/1")), 30);
        buffer.expire(10);
        buffer.remove_origin("Origin/1");
        assert!(buffer.is_empty());
        assert!(buffer.expire(10).is_empty());
    }

    #[test]
    fn test_filter_requires_positive_span() {
        let mut cfg = DelayConfig::default();
        // span unset
        cfg.agency_id = Some("NEIC".into());
        assert!(!delay_filter_matches(&cfg, "NEIC", "x", EvaluationMode::Automatic));

        cfg.span_secs = 30;
        assert!(delay_filter_matches(&cfg, "NEIC", "x", EvaluationMode::Automatic));
        assert!(!delay_filter_matches(&cfg, "GFZ", "x", EvaluationMode::Automatic));
    }

    #[test]
    fn test_filter_without_criteria_delays_everything() {
        let cfg = DelayConfig {
            span_secs: 30,
            ..Default::default()
        };
        assert!(delay_filter_matches(&cfg, "NEIC", "x", EvaluationMode::Automatic));
        assert!(delay_filter_matches(&cfg, "GFZ", "y", EvaluationMode::Manual));
    }

    #[test]
    fn test_filter_all_criteria_must_match() {
        let cfg = DelayConfig {
            span_secs: 30,
            agency_id: Some("NEIC".into()),
            evaluation_mode: Some(EvaluationMode::Automatic),
            ..Default::default()
        };
        assert!(delay_filter_matches(&cfg, "NEIC", "x", EvaluationMode::Automatic));
        assert!(!delay_filter_matches(&cfg, "NEIC", "x", EvaluationMode::Manual));
    }
}
