//! Priority-token comparators
//!
//! The arbitration cascade is an ordered list of comparators; the first
//! token whose comparison is unequal decides the outcome. `*_AUTOMATIC`
//! tokens tie (continue the cascade) whenever the *candidate* is not
//! automatic, regardless of the incumbent's mode — an intentional
//! asymmetry carried over from the original policy.

use quakefuse_common::config::PriorityConfig;
use quakefuse_common::model::{FocalMechanism, Origin};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    IncumbentWins,
    CandidateWins,
    Tie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityToken {
    Agency,
    Author,
    Status,
    Method,
    Phases,
    PhasesAutomatic,
    Rms,
    RmsAutomatic,
    Time,
    TimeAutomatic,
}

impl PriorityToken {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AGENCY" => Some(Self::Agency),
            "AUTHOR" => Some(Self::Author),
            "STATUS" => Some(Self::Status),
            "METHOD" => Some(Self::Method),
            "PHASES" => Some(Self::Phases),
            "PHASES_AUTOMATIC" => Some(Self::PhasesAutomatic),
            "RMS" => Some(Self::Rms),
            "RMS_AUTOMATIC" => Some(Self::RmsAutomatic),
            "TIME" => Some(Self::Time),
            "TIME_AUTOMATIC" => Some(Self::TimeAutomatic),
            _ => None,
        }
    }

    /// Focal mechanisms carry no arrival residuals, so phase/RMS tokens
    /// do not apply to them.
    pub fn applies_to_focal_mechanism(&self) -> bool {
        matches!(
            self,
            Self::Agency | Self::Author | Self::Status | Self::Method | Self::Time
                | Self::TimeAutomatic
        )
    }
}

/// Parse a configured token list, warning about unknown entries
pub fn parse_tokens(tokens: &[String]) -> Vec<PriorityToken> {
    let mut parsed = Vec::new();
    for t in tokens {
        match PriorityToken::parse(t) {
            Some(token) => parsed.push(token),
            None => warn!("unknown priority token ignored: {}", t),
        }
    }
    parsed
}

/// Position in a priority table; first entry is the highest, unlisted is 0
fn list_priority(list: &[String], value: &str) -> u32 {
    list.iter()
        .position(|v| v == value)
        .map(|i| (list.len() - i) as u32)
        .unwrap_or(0)
}

/// Manual solutions outrank automatic ones
pub fn status_priority(is_automatic: bool) -> u32 {
    if is_automatic {
        1
    } else {
        2
    }
}

fn cmp_higher_wins(incumbent: u32, candidate: u32) -> Compare {
    match candidate.cmp(&incumbent) {
        std::cmp::Ordering::Greater => Compare::CandidateWins,
        std::cmp::Ordering::Less => Compare::IncumbentWins,
        std::cmp::Ordering::Equal => Compare::Tie,
    }
}

/// Lower residual wins; a value present beats a value absent
fn cmp_lower_wins(incumbent: Option<f64>, candidate: Option<f64>) -> Compare {
    match (incumbent, candidate) {
        (Some(i), Some(c)) => {
            if c < i {
                Compare::CandidateWins
            } else if c > i {
                Compare::IncumbentWins
            } else {
                Compare::Tie
            }
        }
        (None, Some(_)) => Compare::CandidateWins,
        (Some(_), None) => Compare::IncumbentWins,
        (None, None) => Compare::Tie,
    }
}

/// Later creation time wins; absent counts as the oldest possible
fn cmp_later_wins(
    incumbent: Option<chrono::DateTime<chrono::Utc>>,
    candidate: Option<chrono::DateTime<chrono::Utc>>,
) -> Compare {
    let i = incumbent.map(|t| t.timestamp_millis()).unwrap_or(i64::MIN);
    let c = candidate.map(|t| t.timestamp_millis()).unwrap_or(i64::MIN);
    match c.cmp(&i) {
        std::cmp::Ordering::Greater => Compare::CandidateWins,
        std::cmp::Ordering::Less => Compare::IncumbentWins,
        std::cmp::Ordering::Equal => Compare::Tie,
    }
}

/// Earlier creation time wins (the fallback cascade's final tiebreak:
/// "first is sticky"); absent counts as the oldest possible
pub fn cmp_earlier_wins(
    incumbent: Option<chrono::DateTime<chrono::Utc>>,
    candidate: Option<chrono::DateTime<chrono::Utc>>,
) -> Compare {
    match cmp_later_wins(incumbent, candidate) {
        Compare::CandidateWins => Compare::IncumbentWins,
        Compare::IncumbentWins => Compare::CandidateWins,
        Compare::Tie => Compare::Tie,
    }
}

/// Evaluate one token for an origin pair
pub fn compare_origins(
    token: PriorityToken,
    cfg: &PriorityConfig,
    incumbent: &Origin,
    candidate: &Origin,
) -> Compare {
    match token {
        PriorityToken::Agency => cmp_higher_wins(
            list_priority(&cfg.agencies, incumbent.agency()),
            list_priority(&cfg.agencies, candidate.agency()),
        ),
        PriorityToken::Author => cmp_higher_wins(
            list_priority(&cfg.authors, incumbent.author()),
            list_priority(&cfg.authors, candidate.author()),
        ),
        PriorityToken::Status => cmp_higher_wins(
            status_priority(incumbent.is_automatic()),
            status_priority(candidate.is_automatic()),
        ),
        PriorityToken::Method => cmp_higher_wins(
            list_priority(&cfg.methods, incumbent.method()),
            list_priority(&cfg.methods, candidate.method()),
        ),
        PriorityToken::Phases => cmp_higher_wins(
            incumbent.defining_phase_count(),
            candidate.defining_phase_count(),
        ),
        PriorityToken::PhasesAutomatic => {
            if !candidate.is_automatic() {
                Compare::Tie
            } else {
                compare_origins(PriorityToken::Phases, cfg, incumbent, candidate)
            }
        }
        PriorityToken::Rms => cmp_lower_wins(incumbent.rms(), candidate.rms()),
        PriorityToken::RmsAutomatic => {
            if !candidate.is_automatic() {
                Compare::Tie
            } else {
                compare_origins(PriorityToken::Rms, cfg, incumbent, candidate)
            }
        }
        PriorityToken::Time => cmp_later_wins(incumbent.creation_time(), candidate.creation_time()),
        PriorityToken::TimeAutomatic => {
            if !candidate.is_automatic() {
                Compare::Tie
            } else {
                compare_origins(PriorityToken::Time, cfg, incumbent, candidate)
            }
        }
    }
}

/// Evaluate one token for a focal-mechanism pair; inapplicable tokens tie
pub fn compare_focal_mechanisms(
    token: PriorityToken,
    cfg: &PriorityConfig,
    incumbent: &FocalMechanism,
    candidate: &FocalMechanism,
) -> Compare {
    match token {
        PriorityToken::Agency => cmp_higher_wins(
            list_priority(&cfg.agencies, incumbent.agency()),
            list_priority(&cfg.agencies, candidate.agency()),
        ),
        PriorityToken::Author => cmp_higher_wins(
            list_priority(&cfg.authors, incumbent.author()),
            list_priority(&cfg.authors, candidate.author()),
        ),
        PriorityToken::Status => cmp_higher_wins(
            status_priority(incumbent.is_automatic()),
            status_priority(candidate.is_automatic()),
        ),
        PriorityToken::Method => cmp_higher_wins(
            list_priority(&cfg.methods, incumbent.method()),
            list_priority(&cfg.methods, candidate.method()),
        ),
        PriorityToken::Time => {
            cmp_later_wins(incumbent.creation_time(), candidate.creation_time())
        }
        PriorityToken::TimeAutomatic => {
            if !candidate.is_automatic() {
                Compare::Tie
            } else {
                cmp_later_wins(incumbent.creation_time(), candidate.creation_time())
            }
        }
        _ => Compare::Tie,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use quakefuse_common::model::{CreationInfo, EvaluationMode, OriginQuality, Quantity};

    fn origin(id: &str, agency: &str, mode: EvaluationMode, phases: u32, rms: f64) -> Origin {
        Origin {
            public_id: id.to_string(),
            time: Utc.timestamp_opt(1000, 0).unwrap(),
            latitude: Quantity::from(0.0),
            longitude: Quantity::from(0.0),
            depth: None,
            evaluation_mode: Some(mode),
            method_id: None,
            creation_info: CreationInfo {
                agency_id: Some(agency.to_string()),
                author: None,
                creation_time: Some(Utc.timestamp_opt(2000, 0).unwrap()),
            },
            quality: OriginQuality {
                used_phase_count: Some(phases),
                standard_error: Some(rms),
                ..Default::default()
            },
            arrivals: Vec::new(),
            magnitudes: Vec::new(),
        }
    }

    #[test]
    fn test_token_parse() {
        assert_eq!(PriorityToken::parse("AGENCY"), Some(PriorityToken::Agency));
        assert_eq!(
            PriorityToken::parse("PHASES_AUTOMATIC"),
            Some(PriorityToken::PhasesAutomatic)
        );
        assert_eq!(PriorityToken::parse("DEPTH"), None);
    }

    #[test]
    fn test_agency_priority_order() {
        let cfg = PriorityConfig {
            agencies: vec!["GFZ".into(), "NEIC".into()],
            ..Default::default()
        };
        let inc = origin("Origin/1", "NEIC", EvaluationMode::Automatic, 10, 0.5);
        let cand = origin("Origin/2", "GFZ", EvaluationMode::Automatic, 5, 0.9);
        assert_eq!(
            compare_origins(PriorityToken::Agency, &cfg, &inc, &cand),
            Compare::CandidateWins
        );
    }

    #[test]
    fn test_cascade_is_complementary_when_roles_swap() {
        // Determinism: swapping candidate and incumbent flips the decision.
        let cfg = PriorityConfig::default();
        let a = origin("Origin/1", "GFZ", EvaluationMode::Automatic, 20, 0.5);
        let b = origin("Origin/2", "GFZ", EvaluationMode::Automatic, 30, 0.5);
        for token in [
            PriorityToken::Status,
            PriorityToken::Phases,
            PriorityToken::Rms,
        ] {
            let ab = compare_origins(token, &cfg, &a, &b);
            let ba = compare_origins(token, &cfg, &b, &a);
            match ab {
                Compare::CandidateWins => assert_eq!(ba, Compare::IncumbentWins),
                Compare::IncumbentWins => assert_eq!(ba, Compare::CandidateWins),
                Compare::Tie => assert_eq!(ba, Compare::Tie),
            }
        }
    }

    #[test]
    fn test_automatic_token_skips_manual_candidate() {
        let cfg = PriorityConfig::default();
        let inc = origin("Origin/1", "GFZ", EvaluationMode::Automatic, 5, 0.5);
        let cand = origin("Origin/2", "GFZ", EvaluationMode::Manual, 50, 0.1);
        // Manual candidate: the automatic-only tokens must tie, not compare
        assert_eq!(
            compare_origins(PriorityToken::PhasesAutomatic, &cfg, &inc, &cand),
            Compare::Tie
        );
        assert_eq!(
            compare_origins(PriorityToken::RmsAutomatic, &cfg, &inc, &cand),
            Compare::Tie
        );
    }

    #[test]
    fn test_automatic_token_compares_against_manual_incumbent() {
        // The asymmetry: an automatic candidate is compared even when the
        // incumbent is manual.
        let cfg = PriorityConfig::default();
        let inc = origin("Origin/1", "GFZ", EvaluationMode::Manual, 5, 0.5);
        let cand = origin("Origin/2", "GFZ", EvaluationMode::Automatic, 50, 0.1);
        assert_eq!(
            compare_origins(PriorityToken::PhasesAutomatic, &cfg, &inc, &cand),
            Compare::CandidateWins
        );
    }

    #[test]
    fn test_rms_lower_wins_and_presence_beats_absence() {
        let cfg = PriorityConfig::default();
        let mut inc = origin("Origin/1", "GFZ", EvaluationMode::Automatic, 10, 0.8);
        let cand = origin("Origin/2", "GFZ", EvaluationMode::Automatic, 10, 0.3);
        assert_eq!(
            compare_origins(PriorityToken::Rms, &cfg, &inc, &cand),
            Compare::CandidateWins
        );
        inc.quality.standard_error = None;
        assert_eq!(
            compare_origins(PriorityToken::Rms, &cfg, &inc, &cand),
            Compare::CandidateWins
        );
    }

    #[test]
    fn test_time_later_wins_earlier_sticky() {
        let t1 = Some(Utc.timestamp_opt(1000, 0).unwrap());
        let t2 = Some(Utc.timestamp_opt(2000, 0).unwrap());
        assert_eq!(cmp_later_wins(t1, t2), Compare::CandidateWins);
        assert_eq!(cmp_earlier_wins(t1, t2), Compare::IncumbentWins);
    }
}
