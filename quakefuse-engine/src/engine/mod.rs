//! Engine core: state ownership and the single-worker run loop
//!
//! One task consumes the delivery queue; each message is handled to
//! completion before the next, and the deferral tick runs on the same
//! task via `select!`, so message handling and timer work never overlap.

mod arbitration;
mod association;
mod focal;
mod ingest;
mod journal;

use crate::bookkeeping::RecordTable;
use crate::deferral::{Deferrable, DeferralBuffer};
use crate::error::Result;
use crate::priority::{self, PriorityToken};
use quakefuse_common::cache::TimedCache;
use quakefuse_common::config::EngineConfig;
use quakefuse_common::geo::RegionNames;
use quakefuse_common::messaging::{
    DomainObject, Notifier, NotifierMessage, Operation, Transport,
};
use quakefuse_common::model::{Event, FocalMechanism, Origin};
use quakefuse_common::store::EventStore;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Group outgoing change notifications are published to
pub const MESSAGE_GROUP: &str = "EVENT";
/// Parent id of top-level Event notifiers
pub const EVENT_PARAMETERS: &str = "EventParameters";

/// Extension point invoked after every accepted preference change
pub trait EventProcessor {
    fn process(&mut self, event: &Event);
}

/// Association and arbitration engine
///
/// Generic over the backing store and the outgoing transport so tests run
/// against the in-memory store and a recording transport.
pub struct Engine<S: EventStore, T: Transport> {
    config: EngineConfig,
    tokens: Vec<PriorityToken>,
    region_names: RegionNames,
    store: S,
    transport: T,
    events: TimedCache<Event>,
    origins: TimedCache<Origin>,
    focal_mechanisms: TimedCache<FocalMechanism>,
    records: RecordTable,
    deferral: DeferralBuffer,
    processors: Vec<Box<dyn EventProcessor>>,
    outgoing: Vec<Notifier>,
    /// Origin ids that must never become preferred; reset per message
    blacklist: HashSet<String>,
}

impl<S: EventStore, T: Transport> Engine<S, T> {
    pub fn new(config: EngineConfig, store: S, transport: T) -> Self {
        let tokens = priority::parse_tokens(&config.priority.tokens);
        let region_names = RegionNames::new(config.regions.clone());
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        Self {
            config,
            tokens,
            region_names,
            store,
            transport,
            events: TimedCache::new(ttl),
            origins: TimedCache::new(ttl),
            focal_mechanisms: TimedCache::new(ttl),
            records: RecordTable::new(),
            deferral: DeferralBuffer::new(),
            processors: Vec::new(),
            outgoing: Vec::new(),
            blacklist: HashSet::new(),
        }
    }

    pub fn add_processor(&mut self, processor: Box<dyn EventProcessor>) {
        self.processors.push(processor);
    }

    /// Consume the delivery queue until it closes, interleaving the
    /// deferral tick on the same task.
    pub async fn run(&mut self, mut delivery: mpsc::Receiver<NotifierMessage>) -> Result<()> {
        let tick_secs = self.config.delay.tick_secs.max(1);
        let mut tick = tokio::time::interval(Duration::from_secs(tick_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; skip it
        tick.tick().await;
        loop {
            tokio::select! {
                message = delivery.recv() => match message {
                    Some(message) => self.handle_message(message).await?,
                    None => {
                        info!("delivery queue closed, shutting down");
                        return Ok(());
                    }
                },
                _ = tick.tick() => self.handle_tick().await?,
            }
        }
    }

    /// Timer path: deferral passes, then cache maintenance
    pub async fn handle_tick(&mut self) -> Result<()> {
        let tick_secs = self.config.delay.tick_secs.max(1);

        // Pass 1: expired entries get a full association
        for object in self.deferral.expire(tick_secs) {
            match object {
                Deferrable::Origin(origin) => {
                    debug!("deferred origin {} expired", origin.public_id);
                    self.associate_origin(&origin, true).await?;
                }
                Deferrable::FocalMechanism(fm) => {
                    debug!("deferred focal mechanism {} expired", fm.public_id);
                    self.associate_focal_mechanism(&fm).await?;
                }
            }
        }

        // Pass 2: still-pending entries may ride along with an event that
        // appeared in the meantime; no event creation here.
        for object in self.deferral.pending() {
            match object {
                Deferrable::Origin(origin) => {
                    if self.associate_origin(&origin, false).await? {
                        debug!("deferred origin {} flushed early", origin.public_id);
                        self.deferral.remove_origin(&origin.public_id);
                    }
                }
                Deferrable::FocalMechanism(fm) => {
                    if self.associate_focal_mechanism(&fm).await? {
                        debug!("deferred focal mechanism {} flushed early", fm.public_id);
                        self.deferral.remove_focal_mechanism(&fm.public_id);
                    }
                }
            }
        }

        // Record removal happens in the same pass as cache eviction so no
        // path can observe a cached event without its record.
        let evicted = self.events.sweep();
        for event_id in &evicted {
            self.records.remove(event_id);
        }
        let origins_evicted = self.origins.sweep().len();
        let fms_evicted = self.focal_mechanisms.sweep().len();
        if !evicted.is_empty() || origins_evicted > 0 || fms_evicted > 0 {
            debug!(
                "cache sweep: {} events, {} origins, {} focal mechanisms evicted",
                evicted.len(),
                origins_evicted,
                fms_evicted
            );
        }

        self.flush_notifiers()
    }

    /// Cached event, or loaded from the store and registered
    pub(crate) async fn resolve_event(&mut self, event_id: &str) -> Result<Option<Event>> {
        if let Some(event) = self.events.get(event_id).cloned() {
            return Ok(Some(event));
        }
        match self.store.get_event(event_id).await? {
            Some(event) => {
                self.register_event(event.clone());
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn resolve_origin(&mut self, origin_id: &str) -> Result<Option<Origin>> {
        if let Some(origin) = self.origins.get(origin_id).cloned() {
            return Ok(Some(origin));
        }
        match self.store.get_origin(origin_id).await? {
            Some(origin) => {
                self.origins.feed(origin_id.to_string(), origin.clone());
                Ok(Some(origin))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn resolve_focal_mechanism(
        &mut self,
        fm_id: &str,
    ) -> Result<Option<FocalMechanism>> {
        if let Some(fm) = self.focal_mechanisms.get(fm_id).cloned() {
            return Ok(Some(fm));
        }
        match self.store.get_focal_mechanism(fm_id).await? {
            Some(fm) => {
                self.focal_mechanisms.feed(fm_id.to_string(), fm.clone());
                Ok(Some(fm))
            }
            None => Ok(None),
        }
    }

    /// Feed the event cache and ensure its bookkeeping record exists
    pub(crate) fn register_event(&mut self, event: Event) {
        self.records.entry(&event.public_id);
        self.events.feed(event.public_id.clone(), event);
    }

    /// Event currently referencing the origin, cache first then store
    pub(crate) async fn event_id_for_origin(&mut self, origin_id: &str) -> Result<Option<String>> {
        let cached = self
            .events
            .iter()
            .find(|(_, ev)| ev.origin_refs.iter().any(|id| id == origin_id))
            .map(|(id, _)| id.clone());
        if cached.is_some() {
            return Ok(cached);
        }
        match self.store.event_for_origin(origin_id).await? {
            Some(event) => {
                let id = event.public_id.clone();
                self.register_event(event);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn event_id_for_focal_mechanism(
        &mut self,
        fm_id: &str,
    ) -> Result<Option<String>> {
        let cached = self
            .events
            .iter()
            .find(|(_, ev)| ev.focal_mechanism_refs.iter().any(|id| id == fm_id))
            .map(|(id, _)| id.clone());
        if cached.is_some() {
            return Ok(cached);
        }
        match self.store.event_for_focal_mechanism(fm_id).await? {
            Some(event) => {
                let id = event.public_id.clone();
                self.register_event(event);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn queue_notifier(
        &mut self,
        parent_id: String,
        operation: Operation,
        object: DomainObject,
    ) {
        self.outgoing.push(Notifier {
            parent_id,
            operation,
            object,
        });
    }

    /// Publish accumulated notifiers as one message; no-op when empty
    pub(crate) fn flush_notifiers(&mut self) -> Result<()> {
        if self.outgoing.is_empty() {
            return Ok(());
        }
        let message = NotifierMessage::new(std::mem::take(&mut self.outgoing));
        debug!("publishing {} notifiers", message.notifiers.len());
        self.transport.send(MESSAGE_GROUP, &message)?;
        Ok(())
    }

    pub(crate) fn run_processors(&mut self, event: &Event) {
        for processor in &mut self.processors {
            processor.process(event);
        }
    }

    // Introspection, used by tests and tooling

    pub fn cached_event(&self, event_id: &str) -> Option<&Event> {
        self.events.peek(event_id)
    }

    /// Ids of all live events, sorted so cache scans visit events in a
    /// stable order and score ties resolve the same way every run.
    pub fn cached_event_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.events.iter().map(|(id, _)| id.clone()).collect();
        ids.sort();
        ids
    }

    pub fn record(&self, event_id: &str) -> Option<&crate::bookkeeping::EventRecord> {
        self.records.get(event_id)
    }

    pub fn deferred_count(&self) -> usize {
        self.deferral.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
