//! Origin-to-event association
//!
//! A candidate origin first scans the live event cache, then falls back to
//! a store query over the configured time window. Distance/time thresholds
//! and the defining-phase minimum are the only hard gates for new-event
//! creation; everything else influences preference, not membership.

use super::{Engine, EVENT_PARAMETERS};
use crate::error::Result;
use crate::filter;
use crate::matching::{self, MatchResult};
use quakefuse_common::geo;
use quakefuse_common::messaging::{DomainObject, Operation, Transport};
use quakefuse_common::model::{CreationInfo, Event, Origin, OriginReference};
use quakefuse_common::store::EventStore;
use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

impl<S: EventStore, T: Transport> Engine<S, T> {
    /// Associate an origin with an existing or new event. Returns whether
    /// the origin ended up attached to an event.
    pub async fn associate_origin(&mut self, origin: &Origin, allow_create: bool) -> Result<bool> {
        let mut matched = self.find_matching_event(origin).await?;

        if matched.is_none() {
            matched = self.find_matching_stored_event(origin).await?;
        }

        let event_id = match matched {
            Some(event_id) => event_id,
            None => {
                if !allow_create {
                    return Ok(false);
                }
                if !self.admits_new_event(origin) {
                    return Ok(false);
                }
                let event = self.new_event();
                let event_id = event.public_id.clone();
                info!(
                    "created {} for origin {}",
                    event_id, origin.public_id
                );
                self.store.put_event(&event).await?;
                self.queue_notifier(
                    EVENT_PARAMETERS.to_string(),
                    Operation::Add,
                    DomainObject::Event(event.clone()),
                );
                self.register_event(event);
                event_id
            }
        };

        self.attach_origin(&event_id, origin).await?;
        Ok(true)
    }

    /// Best-scoring live event for the candidate; ties keep the first found
    async fn find_matching_event(&mut self, origin: &Origin) -> Result<Option<String>> {
        let event_ids = self.cached_event_ids();
        let mut best: Option<(MatchResult, String)> = None;
        for event_id in event_ids {
            let Some(event) = self.events.peek(&event_id).cloned() else {
                continue;
            };
            // Already a member: idempotent no-op match
            if event.origin_refs.iter().any(|id| id == &origin.public_id) {
                return Ok(Some(event_id));
            }
            let Some(preferred) = self.preferred_origin_of(&event).await? else {
                continue;
            };
            let score = matching::match_result(&self.config.association, &preferred, origin);
            if score == MatchResult::Nothing {
                continue;
            }
            if best.as_ref().map_or(true, |(b, _)| score > *b) {
                best = Some((score, event_id));
            }
        }
        Ok(best.map(|(_, id)| id))
    }

    /// Store query over the configured time window around the origin time
    async fn find_matching_stored_event(&mut self, origin: &Origin) -> Result<Option<String>> {
        let before = Duration::milliseconds(
            (self.config.association.event_time_before_secs * 1000.0) as i64,
        );
        let after = Duration::milliseconds(
            (self.config.association.event_time_after_secs * 1000.0) as i64,
        );
        let candidates = self
            .store
            .events_in_span(origin.time - before, origin.time + after)
            .await?;

        let mut best: Option<(MatchResult, Event)> = None;
        for event in candidates {
            if self.events.contains(&event.public_id) {
                continue; // already scanned via the cache
            }
            if event.origin_refs.iter().any(|id| id == &origin.public_id) {
                let event_id = event.public_id.clone();
                self.register_event(event);
                return Ok(Some(event_id));
            }
            let Some(preferred) = self.preferred_origin_of(&event).await? else {
                continue;
            };
            if let Some(max_dist) = self.config.association.max_preferred_origin_distance_km {
                let dist = geo::distance_km(
                    origin.latitude.value,
                    origin.longitude.value,
                    preferred.latitude.value,
                    preferred.longitude.value,
                );
                if dist > max_dist {
                    continue;
                }
            }
            let score = matching::match_result(&self.config.association, &preferred, origin);
            if score == MatchResult::Nothing {
                continue;
            }
            if best.as_ref().map_or(true, |(b, _)| score > *b) {
                best = Some((score, event));
            }
        }
        match best {
            Some((_, event)) => {
                let event_id = event.public_id.clone();
                self.register_event(event);
                Ok(Some(event_id))
            }
            None => Ok(None),
        }
    }

    async fn preferred_origin_of(&mut self, event: &Event) -> Result<Option<Origin>> {
        let Some(preferred_id) = event.preferred_origin_id.clone() else {
            return Ok(None);
        };
        self.resolve_origin(&preferred_id).await
    }

    /// Hard gates for new-event creation
    fn admits_new_event(&self, origin: &Origin) -> bool {
        if !filter::agency_allowed(&self.config.filter, origin.agency()) {
            debug!(
                "origin {} from blocked agency {} cannot create an event",
                origin.public_id,
                origin.agency()
            );
            return false;
        }
        if origin.is_automatic()
            && origin.defining_phase_count() < self.config.association.min_defining_phases
        {
            debug!(
                "automatic origin {} has {} defining phases, below minimum {}",
                origin.public_id,
                origin.defining_phase_count(),
                self.config.association.min_defining_phases
            );
            return false;
        }
        if !filter::region_admits(&self.config.filter, origin) {
            debug!(
                "origin {} outside the configured region/depth filter",
                origin.public_id
            );
            return false;
        }
        true
    }

    fn new_event(&self) -> Event {
        let event_id = format!("Event/{}", Uuid::new_v4().simple());
        Event::new(
            event_id,
            CreationInfo {
                agency_id: Some(self.config.agency_id.clone()),
                author: Some(self.config.author.clone()),
                creation_time: Some(Utc::now()),
            },
        )
    }

    /// Attach the origin and run arbitration. Re-attaching an already
    /// referenced origin is a no-op, including for arbitration.
    async fn attach_origin(&mut self, event_id: &str, origin: &Origin) -> Result<()> {
        let Some(mut event) = self.resolve_event(event_id).await? else {
            debug!("event {} vanished before attach", event_id);
            return Ok(());
        };
        self.origins.feed(origin.public_id.clone(), origin.clone());
        self.store.put_origin(origin).await?;
        if !event.add_origin_ref(&origin.public_id) {
            debug!(
                "origin {} already associated with {}",
                origin.public_id, event_id
            );
            return Ok(());
        }
        info!("associated origin {} with {}", origin.public_id, event_id);
        self.store.put_event(&event).await?;
        self.register_event(event);
        self.queue_notifier(
            event_id.to_string(),
            Operation::Add,
            DomainObject::OriginReference(OriginReference {
                origin_id: origin.public_id.clone(),
            }),
        );
        self.choose_preferred(event_id, origin).await?;
        Ok(())
    }
}
