//! Focal-mechanism association and arbitration
//!
//! A focal mechanism joins an event only through its triggering origin.
//! With no standing subscription for missing origins, an unassociable
//! mechanism is dropped with a log; a later add or update of it retries.

use super::{Engine, EVENT_PARAMETERS};
use crate::bookkeeping::Preference;
use crate::error::Result;
use crate::priority::{self, Compare, PriorityToken};
use quakefuse_common::messaging::{DomainObject, Operation, Transport};
use quakefuse_common::model::{Event, FocalMechanism, FocalMechanismReference};
use quakefuse_common::store::EventStore;
use tracing::{debug, info};

/// Cascade used when no configured token applies to focal mechanisms
const FALLBACK_TOKENS: [PriorityToken; 2] = [PriorityToken::Agency, PriorityToken::Status];

impl<S: EventStore, T: Transport> Engine<S, T> {
    /// Attach a focal mechanism to the event of its triggering origin.
    /// Returns whether it ended up attached.
    pub async fn associate_focal_mechanism(&mut self, fm: &FocalMechanism) -> Result<bool> {
        let Some(event_id) = self.event_id_for_origin(&fm.triggering_origin_id).await? else {
            debug!(
                "focal mechanism {} dropped: triggering origin {} not associated",
                fm.public_id, fm.triggering_origin_id
            );
            return Ok(false);
        };
        let Some(mut event) = self.resolve_event(&event_id).await? else {
            return Ok(false);
        };
        for tensor in &fm.moment_tensors {
            if let Some(derived) = &tensor.derived_origin_id {
                self.blacklist.insert(derived.clone());
            }
        }
        self.focal_mechanisms.feed(fm.public_id.clone(), fm.clone());
        self.store.put_focal_mechanism(fm).await?;
        if !event.add_focal_mechanism_ref(&fm.public_id) {
            debug!(
                "focal mechanism {} already associated with {}",
                fm.public_id, event_id
            );
            return Ok(true);
        }
        info!(
            "associated focal mechanism {} with {}",
            fm.public_id, event_id
        );
        self.store.put_event(&event).await?;
        self.register_event(event);
        self.queue_notifier(
            event_id.clone(),
            Operation::Add,
            DomainObject::FocalMechanismReference(FocalMechanismReference {
                focal_mechanism_id: fm.public_id.clone(),
            }),
        );
        self.choose_preferred_focal_mechanism(&event_id, fm).await?;
        Ok(true)
    }

    /// Decide whether `candidate` becomes the event's preferred mechanism
    pub async fn choose_preferred_focal_mechanism(
        &mut self,
        event_id: &str,
        candidate: &FocalMechanism,
    ) -> Result<bool> {
        let Some(event) = self.resolve_event(event_id).await? else {
            debug!("event {} not found for mechanism arbitration", event_id);
            return Ok(false);
        };
        if !self
            .records
            .entry(event_id)
            .constraints
            .allows_focal_mechanism(&candidate.public_id)
        {
            debug!(
                "focal mechanism {} rejected by fixed-mechanism pin on {}",
                candidate.public_id, event_id
            );
            return Ok(false);
        }

        let incumbent_id = match event.preferred_focal_mechanism_id.clone() {
            None => {
                self.accept_preferred_focal_mechanism(&event, candidate).await?;
                return Ok(true);
            }
            Some(id) if id == candidate.public_id => {
                self.accept_preferred_focal_mechanism(&event, candidate).await?;
                return Ok(true);
            }
            Some(id) => id,
        };

        let Some(incumbent) = self.resolve_focal_mechanism(&incumbent_id).await? else {
            debug!(
                "preferred focal mechanism {} of {} not found, keeping current preference",
                incumbent_id, event_id
            );
            return Ok(false);
        };

        let decision = self.focal_cascade(&incumbent, candidate);
        if decision != Compare::CandidateWins {
            debug!(
                "focal mechanism {} does not outrank {} on {}",
                candidate.public_id, incumbent_id, event_id
            );
            return Ok(false);
        }
        self.accept_preferred_focal_mechanism(&event, candidate).await?;
        Ok(true)
    }

    fn focal_cascade(&self, incumbent: &FocalMechanism, candidate: &FocalMechanism) -> Compare {
        let applicable: Vec<PriorityToken> = self
            .tokens
            .iter()
            .copied()
            .filter(PriorityToken::applies_to_focal_mechanism)
            .collect();
        let tokens: &[PriorityToken] = if applicable.is_empty() {
            &FALLBACK_TOKENS
        } else {
            &applicable
        };
        for token in tokens {
            let outcome = priority::compare_focal_mechanisms(
                *token,
                &self.config.priority,
                incumbent,
                candidate,
            );
            if outcome != Compare::Tie {
                return outcome;
            }
        }
        // Final tiebreak mirrors the origin fallback: first is sticky
        priority::cmp_earlier_wins(incumbent.creation_time(), candidate.creation_time())
    }

    pub(crate) async fn accept_preferred_focal_mechanism(
        &mut self,
        event: &Event,
        fm: &FocalMechanism,
    ) -> Result<()> {
        let mut event = event.clone();
        if event.preferred_focal_mechanism_id.as_deref() != Some(fm.public_id.as_str()) {
            info!(
                "preferred focal mechanism of {} is now {}",
                event.public_id, fm.public_id
            );
            event.preferred_focal_mechanism_id = Some(fm.public_id.clone());
            {
                let record = self.records.entry(&event.public_id);
                let pinned = record.constraints.fixed_focal_mechanism_id.as_deref()
                    == Some(fm.public_id.as_str());
                if !pinned && !record.focal_mechanism_state.is_pinned() {
                    record.focal_mechanism_state = Preference::Auto;
                }
            }
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

    /// Re-run mechanism arbitration over every referenced mechanism
    pub(crate) async fn reevaluate_focal_mechanisms(&mut self, event_id: &str) -> Result<()> {
        let Some(event) = self.resolve_event(event_id).await? else {
            return Ok(());
        };
        for fm_id in event.focal_mechanism_refs {
            if let Some(fm) = self.resolve_focal_mechanism(&fm_id).await? {
                self.choose_preferred_focal_mechanism(event_id, &fm).await?;
            }
        }
        Ok(())
    }
}
