//! Journal entries: operator commands and acknowledgements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Addressed command/acknowledgement record used for operator overrides
///
/// Commands carry an action token (e.g. `EvPrefOrgID`); the engine answers
/// every command with exactly one `<action>OK` or `<action>Failed` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Target Event id
    pub object_id: String,
    /// Command token, or `<token>OK` / `<token>Failed` for responses
    pub action: String,
    /// Command argument or human-readable outcome
    #[serde(default)]
    pub parameters: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub sender: String,
}

impl JournalEntry {
    pub fn new(
        object_id: impl Into<String>,
        action: impl Into<String>,
        parameters: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            action: action.into(),
            parameters: parameters.into(),
            created: Utc::now(),
            sender: sender.into(),
        }
    }
}
