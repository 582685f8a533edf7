//! FocalMechanism and MomentTensor types

use super::origin::{CreationInfo, EvaluationMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moment-tensor solution attached to a FocalMechanism
///
/// The derived origin (the centroid solution the tensor inversion produced)
/// must never become an Event's preferred Origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentTensor {
    pub public_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_origin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moment_magnitude_id: Option<String>,
}

/// Candidate source-mechanism solution referencing a triggering Origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalMechanism {
    pub public_id: String,
    pub triggering_origin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_mode: Option<EvaluationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_id: Option<String>,
    #[serde(default)]
    pub creation_info: CreationInfo,
    #[serde(default)]
    pub moment_tensors: Vec<MomentTensor>,
}

impl FocalMechanism {
    pub fn agency(&self) -> &str {
        self.creation_info.agency_id.as_deref().unwrap_or("")
    }

    pub fn author(&self) -> &str {
        self.creation_info.author.as_deref().unwrap_or("")
    }

    pub fn method(&self) -> &str {
        self.method_id.as_deref().unwrap_or("")
    }

    /// Missing evaluation mode counts as automatic
    pub fn mode(&self) -> EvaluationMode {
        self.evaluation_mode.unwrap_or(EvaluationMode::Automatic)
    }

    pub fn is_automatic(&self) -> bool {
        self.mode() == EvaluationMode::Automatic
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.creation_info.creation_time
    }
}
