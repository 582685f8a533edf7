//! Event aggregate and reference types

use super::origin::CreationInfo;
use serde::{Deserialize, Serialize};

/// Classification tag settable via the `EvType` journal command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Earthquake,
    Explosion,
    QuarryBlast,
    Induced,
    Landslide,
    NotExisting,
    Other,
}

impl EventType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earthquake" => Some(Self::Earthquake),
            "explosion" => Some(Self::Explosion),
            "quarry blast" | "quarry_blast" => Some(Self::QuarryBlast),
            "induced" => Some(Self::Induced),
            "landslide" => Some(Self::Landslide),
            "not existing" | "not_existing" => Some(Self::NotExisting),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earthquake => "earthquake",
            Self::Explosion => "explosion",
            Self::QuarryBlast => "quarry blast",
            Self::Induced => "induced",
            Self::Landslide => "landslide",
            Self::NotExisting => "not existing",
            Self::Other => "other",
        }
    }
}

/// Kind of free-text description attached to an Event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionKind {
    RegionName,
    EventName,
    OperatorComment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescription {
    pub kind: DescriptionKind,
    pub text: String,
}

/// Canonical aggregate grouping related Origins/FocalMechanisms with one
/// preferred solution per axis. Created by the engine, never deleted by it
/// (only evicted from the in-memory cache).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub public_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_origin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_magnitude_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_focal_mechanism_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub origin_refs: Vec<String>,
    #[serde(default)]
    pub focal_mechanism_refs: Vec<String>,
    #[serde(default)]
    pub descriptions: Vec<EventDescription>,
    #[serde(default)]
    pub creation_info: CreationInfo,
}

impl Event {
    pub fn new(public_id: String, creation_info: CreationInfo) -> Self {
        Self {
            public_id,
            preferred_origin_id: None,
            preferred_magnitude_id: None,
            preferred_focal_mechanism_id: None,
            event_type: None,
            origin_refs: Vec::new(),
            focal_mechanism_refs: Vec::new(),
            descriptions: Vec::new(),
            creation_info,
        }
    }

    /// Add an origin reference; returns false when already present
    pub fn add_origin_ref(&mut self, origin_id: &str) -> bool {
        if self.origin_refs.iter().any(|id| id == origin_id) {
            return false;
        }
        self.origin_refs.push(origin_id.to_string());
        true
    }

    /// Add a focal-mechanism reference; returns false when already present
    pub fn add_focal_mechanism_ref(&mut self, fm_id: &str) -> bool {
        if self.focal_mechanism_refs.iter().any(|id| id == fm_id) {
            return false;
        }
        self.focal_mechanism_refs.push(fm_id.to_string());
        true
    }

    pub fn description(&self, kind: DescriptionKind) -> Option<&str> {
        self.descriptions
            .iter()
            .find(|d| d.kind == kind)
            .map(|d| d.text.as_str())
    }

    /// Replace-or-append a description of the given kind
    pub fn set_description(&mut self, kind: DescriptionKind, text: String) {
        if let Some(d) = self.descriptions.iter_mut().find(|d| d.kind == kind) {
            d.text = text;
        } else {
            self.descriptions.push(EventDescription { kind, text });
        }
    }

    pub fn remove_description(&mut self, kind: DescriptionKind) {
        self.descriptions.retain(|d| d.kind != kind);
    }
}

/// Link attaching an Origin to an Event; the notifier parent id names the Event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginReference {
    pub origin_id: String,
}

/// Link attaching a FocalMechanism to an Event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalMechanismReference {
    pub focal_mechanism_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_origin_ref_is_idempotent() {
        let mut event = Event::new("Event/1".into(), CreationInfo::default());
        assert!(event.add_origin_ref("Origin/1"));
        assert!(!event.add_origin_ref("Origin/1"));
        assert_eq!(event.origin_refs.len(), 1);
    }

    #[test]
    fn test_set_description_replaces() {
        let mut event = Event::new("Event/1".into(), CreationInfo::default());
        event.set_description(DescriptionKind::RegionName, "Honshu".into());
        event.set_description(DescriptionKind::RegionName, "Off Honshu".into());
        assert_eq!(event.description(DescriptionKind::RegionName), Some("Off Honshu"));
        assert_eq!(event.descriptions.len(), 1);
    }

    #[test]
    fn test_event_type_parse_round_trip() {
        for s in ["earthquake", "quarry blast", "not existing", "other"] {
            let t = EventType::parse(s).expect("known type");
            assert_eq!(t.as_str(), s);
        }
        assert!(EventType::parse("meteorite").is_none());
    }
}
