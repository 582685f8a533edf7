//! Notifier messages and the outgoing transport seam
//!
//! Upstream producers publish domain objects as add/update/remove notifiers
//! tagged with a parent id. The engine consumes whole messages in delivery
//! order and answers with one batch of change notifications per message.

use crate::error::{Error, Result};
use crate::model::{
    Event, FocalMechanism, FocalMechanismReference, JournalEntry, Magnitude, MomentTensor, Origin,
    OriginReference,
};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Closed set of objects that travel on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainObject {
    Origin(Origin),
    Magnitude(Magnitude),
    FocalMechanism(FocalMechanism),
    MomentTensor(MomentTensor),
    OriginReference(OriginReference),
    FocalMechanismReference(FocalMechanismReference),
    Event(Event),
    JournalEntry(JournalEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Update,
    Remove,
}

/// One object change, tagged with the id of its parent in the object tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notifier {
    pub parent_id: String,
    pub operation: Operation,
    pub object: DomainObject,
}

/// One bus message: a batch of notifiers processed as a unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifierMessage {
    pub notifiers: Vec<Notifier>,
}

impl NotifierMessage {
    pub fn new(notifiers: Vec<Notifier>) -> Self {
        Self { notifiers }
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

/// Outgoing side of the pub/sub bus
pub trait Transport {
    fn send(&mut self, group: &str, message: &NotifierMessage) -> Result<()>;
}

/// Writes one JSON message per line to stdout
#[derive(Debug, Default)]
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for StdioTransport {
    fn send(&mut self, _group: &str, message: &NotifierMessage) -> Result<()> {
        let line = serde_json::to_string(message)?;
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(line.as_bytes())
            .and_then(|_| stdout.write_all(b"\n"))
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

/// Captures outgoing batches; used by tests
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<(String, NotifierMessage)>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, group: &str, message: &NotifierMessage) -> Result<()> {
        self.sent.push((group.to_string(), message.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CreationInfo;

    #[test]
    fn test_notifier_round_trip() {
        let msg = NotifierMessage::new(vec![Notifier {
            parent_id: "EventParameters".into(),
            operation: Operation::Add,
            object: DomainObject::Event(Event::new("Event/1".into(), CreationInfo::default())),
        }]);
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"type\":\"Event\""));
        let back: NotifierMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, msg);
    }

    #[test]
    fn test_recording_transport_captures() {
        let mut t = RecordingTransport::new();
        t.send("EVENT", &NotifierMessage::default()).expect("send");
        assert_eq!(t.sent.len(), 1);
        assert_eq!(t.sent[0].0, "EVENT");
    }
}
