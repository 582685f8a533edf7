//! Preferred-origin and preferred-magnitude arbitration
//!
//! The configured priority tokens are evaluated in order; the first
//! non-tie decides. With no configured list a fixed fallback cascade
//! applies: agency, status, defining phases (automatic pairs only), and
//! creation time with the earlier origin sticky. Every rejection is an Ok
//! outcome, logged and dropped; arbitration fails closed.

use super::{Engine, EVENT_PARAMETERS};
use crate::bookkeeping::Preference;
use crate::error::Result;
use crate::filter;
use crate::magnitude;
use crate::priority::{self, Compare, PriorityToken};
use quakefuse_common::messaging::{DomainObject, Operation, Transport};
use quakefuse_common::model::{
    DescriptionKind, EvaluationMode, Event, JournalEntry, Origin,
};
use quakefuse_common::store::EventStore;
use tracing::{debug, info};

impl<S: EventStore, T: Transport> Engine<S, T> {
    /// Decide whether `candidate` becomes the event's preferred origin.
    /// Returns whether it was accepted.
    pub async fn choose_preferred(&mut self, event_id: &str, candidate: &Origin) -> Result<bool> {
        if self.blacklist.contains(&candidate.public_id) {
            debug!(
                "origin {} is derived from a moment tensor and cannot become preferred",
                candidate.public_id
            );
            return Ok(false);
        }
        let Some(event) = self.resolve_event(event_id).await? else {
            debug!("event {} not found for arbitration", event_id);
            return Ok(false);
        };

        if !self
            .records
            .entry(event_id)
            .constraints
            .allows_origin(&candidate.public_id)
        {
            debug!(
                "origin {} rejected by fixed-origin pin on {}",
                candidate.public_id, event_id
            );
            return Ok(false);
        }

        let incumbent_id = event.preferred_origin_id.clone();
        let incumbent_id = match incumbent_id {
            None => {
                if !filter::agency_allowed(&self.config.filter, candidate.agency()) {
                    debug!(
                        "origin {} from blocked agency {} cannot become preferred",
                        candidate.public_id,
                        candidate.agency()
                    );
                    return Ok(false);
                }
                if !self
                    .records
                    .entry(event_id)
                    .constraints
                    .allows_evaluation_mode(candidate.mode())
                {
                    debug!(
                        "origin {} rejected by fixed evaluation mode on {}",
                        candidate.public_id, event_id
                    );
                    return Ok(false);
                }
                self.accept_preferred(&event, candidate).await?;
                return Ok(true);
            }
            Some(id) if id == candidate.public_id => {
                // Refresh of the current preferred origin
                self.accept_preferred(&event, candidate).await?;
                return Ok(true);
            }
            Some(id) => id,
        };

        let Some(incumbent) = self.resolve_origin(&incumbent_id).await? else {
            debug!(
                "preferred origin {} of {} not found, keeping current preference",
                incumbent_id, event_id
            );
            return Ok(false);
        };

        // Fixed evaluation mode: a strictly higher-status candidate may
        // depose through the pin, releasing it only if it actually wins
        // the cascade below; everything else outside the pinned mode is
        // rejected.
        let mut release_pin = false;
        let fixed_mode = self
            .records
            .entry(event_id)
            .constraints
            .fixed_evaluation_mode;
        if let Some(fixed) = fixed_mode {
            if candidate.mode() != fixed {
                let candidate_status = priority::status_priority(candidate.is_automatic());
                let fixed_status = priority::status_priority(fixed == EvaluationMode::Automatic);
                if candidate_status > fixed_status {
                    release_pin = true;
                } else {
                    debug!(
                        "origin {} rejected by fixed evaluation mode {} on {}",
                        candidate.public_id,
                        fixed.as_str(),
                        event_id
                    );
                    return Ok(false);
                }
            } else if incumbent.mode() != fixed {
                // The incumbent violates the pin; the first conforming
                // candidate replaces it without a cascade.
                self.accept_preferred(&event, candidate).await?;
                return Ok(true);
            }
        }

        let (decision, agency_driven) = if self.tokens.is_empty() {
            self.fallback_cascade(&incumbent, candidate)
        } else {
            self.token_cascade(&incumbent, candidate)
        };
        if decision != Compare::CandidateWins {
            debug!(
                "origin {} does not outrank preferred origin {} of {}",
                candidate.public_id, incumbent_id, event_id
            );
            return Ok(false);
        }

        // A deposing candidate must bring a usable magnitude when the
        // incumbent already has one, unless the deposition is purely
        // agency-driven.
        if event.preferred_magnitude_id.is_some() && !agency_driven {
            let has_magnitude =
                magnitude::preferred_magnitude(candidate, &self.config.priority, &self.config.filter)
                    .is_some();
            if !has_magnitude {
                debug!(
                    "origin {} carries no usable magnitude, keeping {}",
                    candidate.public_id, incumbent_id
                );
                return Ok(false);
            }
        }

        if release_pin {
            self.release_fixed_mode(event_id, candidate).await?;
        }
        self.accept_preferred(&event, candidate).await?;
        Ok(true)
    }

    async fn release_fixed_mode(&mut self, event_id: &str, candidate: &Origin) -> Result<()> {
        self.records
            .entry(event_id)
            .constraints
            .fixed_evaluation_mode = None;
        info!(
            "fixed evaluation mode on {} released by higher-priority origin {}",
            event_id, candidate.public_id
        );
        let entry = JournalEntry::new(
            event_id,
            "EvPrefOrgEvalModeOK",
            format!("released by origin {}", candidate.public_id),
            self.config.author.clone(),
        );
        self.store.add_journal_entry(&entry).await?;
        self.queue_notifier(
            event_id.to_string(),
            Operation::Add,
            DomainObject::JournalEntry(entry),
        );
        Ok(())
    }

    /// Explicit token list: first non-tie decides
    fn token_cascade(&self, incumbent: &Origin, candidate: &Origin) -> (Compare, bool) {
        for token in &self.tokens {
            let outcome =
                priority::compare_origins(*token, &self.config.priority, incumbent, candidate);
            if outcome != Compare::Tie {
                return (outcome, *token == PriorityToken::Agency);
            }
        }
        (Compare::Tie, false)
    }

    /// Built-in cascade when no token list is configured
    fn fallback_cascade(&self, incumbent: &Origin, candidate: &Origin) -> (Compare, bool) {
        let outcome = priority::compare_origins(
            PriorityToken::Agency,
            &self.config.priority,
            incumbent,
            candidate,
        );
        if outcome != Compare::Tie {
            return (outcome, true);
        }
        let outcome = priority::compare_origins(
            PriorityToken::Status,
            &self.config.priority,
            incumbent,
            candidate,
        );
        if outcome != Compare::Tie {
            return (outcome, false);
        }
        if incumbent.is_automatic() && candidate.is_automatic() {
            let outcome = priority::compare_origins(
                PriorityToken::Phases,
                &self.config.priority,
                incumbent,
                candidate,
            );
            if outcome != Compare::Tie {
                return (outcome, false);
            }
        }
        (
            priority::cmp_earlier_wins(incumbent.creation_time(), candidate.creation_time()),
            false,
        )
    }

    /// Install the accepted origin: preferred id, region description and
    /// preferred magnitude, then publish the event update and run the
    /// registered extensions.
    pub(crate) async fn accept_preferred(&mut self, event: &Event, origin: &Origin) -> Result<()> {
        let mut event = event.clone();
        let mut changed = event.preferred_origin_id.as_deref() != Some(origin.public_id.as_str());
        if changed {
            info!(
                "preferred origin of {} is now {}",
                event.public_id, origin.public_id
            );
        }
        event.preferred_origin_id = Some(origin.public_id.clone());
        {
            let record = self.records.entry(&event.public_id);
            let pinned = record.constraints.fixed_origin_id.as_deref()
                == Some(origin.public_id.as_str());
            if !pinned && !record.origin_state.is_pinned() {
                record.origin_state = Preference::Auto;
            }
        }

        let region = self
            .region_names
            .name_for(origin.latitude.value, origin.longitude.value);
        if event.description(DescriptionKind::RegionName) != Some(region.as_str()) {
            event.set_description(DescriptionKind::RegionName, region);
            changed = true;
        }

        let magnitude_id = self.select_magnitude(&event.public_id, origin);
        if event.preferred_magnitude_id != magnitude_id {
            event.preferred_magnitude_id = magnitude_id;
            changed = true;
            let has_magnitude = event.preferred_magnitude_id.is_some();
            let record = self.records.entry(&event.public_id);
            if !record.magnitude_state.is_pinned() {
                record.magnitude_state = if has_magnitude {
                    Preference::Auto
                } else {
                    Preference::Unset
                };
            }
        }

        if changed {
            self.store.put_event(&event).await?;
            self.register_event(event.clone());
            self.queue_notifier(
                EVENT_PARAMETERS.to_string(),
                Operation::Update,
                DomainObject::Event(event.clone()),
            );
        }
        self.run_processors(&event);
        Ok(())
    }

    /// Preferred-magnitude id for an origin, honoring a pinned type
    pub(crate) fn select_magnitude(&mut self, event_id: &str, origin: &Origin) -> Option<String> {
        let fixed_type = self
            .records
            .entry(event_id)
            .constraints
            .fixed_magnitude_type
            .clone();
        match fixed_type {
            Some(magnitude_type) => origin
                .magnitudes
                .iter()
                .filter(|m| {
                    m.magnitude_type == magnitude_type
                        && filter::agency_allowed(&self.config.filter, m.agency())
                })
                .max_by_key(|m| m.station_count.unwrap_or(0))
                .map(|m| m.public_id.clone()),
            None => magnitude::preferred_magnitude(
                origin,
                &self.config.priority,
                &self.config.filter,
            )
            .map(|m| m.public_id.clone()),
        }
    }

    /// Magnitude-only refresh for the current preferred origin; publishes
    /// an event update only when the choice actually changed.
    pub(crate) async fn refresh_preferred_magnitude(
        &mut self,
        event_id: &str,
        origin: &Origin,
    ) -> Result<()> {
        let Some(mut event) = self.resolve_event(event_id).await? else {
            return Ok(());
        };
        let magnitude_id = self.select_magnitude(event_id, origin);
        if event.preferred_magnitude_id != magnitude_id {
            info!(
                "preferred magnitude of {} is now {:?}",
                event_id, magnitude_id
            );
            event.preferred_magnitude_id = magnitude_id;
            self.store.put_event(&event).await?;
            self.register_event(event.clone());
            self.queue_notifier(
                EVENT_PARAMETERS.to_string(),
                Operation::Update,
                DomainObject::Event(event.clone()),
            );
        }
        self.run_processors(&event);
        Ok(())
    }

    /// Re-run arbitration over every origin referenced by the event
    pub(crate) async fn reevaluate_origins(&mut self, event_id: &str) -> Result<()> {
        let Some(event) = self.resolve_event(event_id).await? else {
            return Ok(());
        };
        for origin_id in event.origin_refs {
            if let Some(origin) = self.resolve_origin(&origin_id).await? {
                self.choose_preferred(event_id, &origin).await?;
            }
        }
        Ok(())
    }
}
