//! Origin, Magnitude and supporting types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Automatic vs. analyst-reviewed status of a solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    Automatic,
    Manual,
}

impl EvaluationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "automatic" => Some(Self::Automatic),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}

/// Provenance tuple attached to producer-owned objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

/// Measured value with optional uncertainty
///
/// Absent uncertainty is modelled explicitly rather than via a thrown-error
/// convention; comparisons must check presence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<f64>,
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Self {
            value,
            uncertainty: None,
        }
    }
}

/// Reference from an Origin to one of the Picks used to compute it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    pub pick_id: String,
    #[serde(default)]
    pub phase: String,
    /// Pick time, when known; used for matching-pick time tolerance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_time: Option<DateTime<Utc>>,
    /// Whether this arrival was actively used (defining) in the computation
    #[serde(default = "default_true")]
    pub time_used: bool,
}

fn default_true() -> bool {
    true
}

/// Solution quality summary carried by an Origin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginQuality {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_phase_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_phase_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_station_count: Option<u32>,
    /// RMS residual of the location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_error: Option<f64>,
}

/// Candidate earthquake location+time solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub public_id: String,
    pub time: DateTime<Utc>,
    pub latitude: Quantity,
    pub longitude: Quantity,
    /// Depth in kilometers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_mode: Option<EvaluationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_id: Option<String>,
    #[serde(default)]
    pub creation_info: CreationInfo,
    #[serde(default)]
    pub quality: OriginQuality,
    #[serde(default)]
    pub arrivals: Vec<Arrival>,
    #[serde(default)]
    pub magnitudes: Vec<Magnitude>,
}

impl Origin {
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

    /// Number of arrivals actively used in the computation
    pub fn defining_phase_count(&self) -> u32 {
        self.quality
            .used_phase_count
            .unwrap_or_else(|| self.arrivals.iter().filter(|a| a.time_used).count() as u32)
    }

    pub fn rms(&self) -> Option<f64> {
        self.quality.standard_error
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.creation_info.creation_time
    }

    pub fn magnitude(&self, id: &str) -> Option<&Magnitude> {
        self.magnitudes.iter().find(|m| m.public_id == id)
    }

    /// Attach or replace a magnitude by public id
    pub fn set_magnitude(&mut self, magnitude: Magnitude) {
        self.magnitudes.retain(|m| m.public_id != magnitude.public_id);
        self.magnitudes.push(magnitude);
    }
}

/// Size estimate tied to exactly one Origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Magnitude {
    pub public_id: String,
    /// Parent origin; filled in from the notifier parent id on ingestion
    #[serde(default)]
    pub origin_id: String,
    #[serde(rename = "type")]
    pub magnitude_type: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_count: Option<u32>,
    #[serde(default)]
    pub creation_info: CreationInfo,
}

impl Magnitude {
    pub fn agency(&self) -> &str {
        self.creation_info.agency_id.as_deref().unwrap_or("")
    }
}
