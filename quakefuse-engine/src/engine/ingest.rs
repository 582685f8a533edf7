//! Ingestion and per-batch deduplication
//!
//! Each inbound message is staged into add/update sets before any
//! association runs. A reference explicitly linking an object to an event
//! supersedes a pending add of the same object in the same batch; without
//! that move the object would be processed twice with conflicting
//! semantics. Adds run before updates, and updates already handled as an
//! add in this batch (or parked in the deferral buffer) are skipped.

use super::Engine;
use crate::deferral::{self, Deferrable};
use crate::error::Result;
use quakefuse_common::messaging::{DomainObject, Notifier, NotifierMessage, Operation, Transport};
use quakefuse_common::model::{FocalMechanism, Origin};
use quakefuse_common::store::EventStore;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug)]
enum Staged {
    Origin(Origin),
    FocalMechanism(FocalMechanism),
}

impl Staged {
    fn public_id(&self) -> &str {
        match self {
            Staged::Origin(o) => &o.public_id,
            Staged::FocalMechanism(f) => &f.public_id,
        }
    }
}

/// Per-message staging sets; dropped at batch end
#[derive(Debug, Default)]
struct Batch {
    adds: Vec<Staged>,
    updates: Vec<Staged>,
    /// Updates not solely triggered by a magnitude/tensor change
    real_updates: HashSet<String>,
    /// Ids already processed as adds in this batch
    handled: HashSet<String>,
}

impl Batch {
    fn stage_add(&mut self, staged: Staged) {
        if self.adds.iter().any(|s| s.public_id() == staged.public_id()) {
            return;
        }
        self.adds.push(staged);
    }

    /// Stage an update, replacing an earlier staging of the same object
    fn stage_update(&mut self, staged: Staged, real: bool) {
        if real {
            self.real_updates.insert(staged.public_id().to_string());
        }
        if let Some(existing) = self
            .updates
            .iter_mut()
            .find(|s| s.public_id() == staged.public_id())
        {
            *existing = staged;
        } else {
            self.updates.push(staged);
        }
    }

    fn take_add(&mut self, id: &str) -> Option<Staged> {
        let pos = self.adds.iter().position(|s| s.public_id() == id)?;
        Some(self.adds.remove(pos))
    }
}

impl<S: EventStore, T: Transport> Engine<S, T> {
    /// Process one delivered message to completion and flush the
    /// accumulated change notifications as a single outgoing batch.
    pub async fn handle_message(&mut self, message: NotifierMessage) -> Result<()> {
        self.blacklist.clear();
        let mut batch = Batch::default();
        for notifier in message.notifiers {
            self.stage(notifier, &mut batch).await?;
        }

        // New objects must exist before their updates mean anything. The
        // cache copy is authoritative here: a magnitude or moment tensor
        // later in the same batch merges into it, and processing the
        // staged snapshot would discard that merge.
        for staged in std::mem::take(&mut batch.adds) {
            batch.handled.insert(staged.public_id().to_string());
            match staged {
                Staged::Origin(origin) => {
                    let origin = self
                        .origins
                        .peek(&origin.public_id)
                        .cloned()
                        .unwrap_or(origin);
                    self.process_origin_add(origin).await?;
                }
                Staged::FocalMechanism(fm) => {
                    let fm = self
                        .focal_mechanisms
                        .peek(&fm.public_id)
                        .cloned()
                        .unwrap_or(fm);
                    self.process_focal_add(fm).await?;
                }
            }
        }

        for staged in std::mem::take(&mut batch.updates) {
            let id = staged.public_id().to_string();
            if batch.handled.contains(&id) {
                debug!("update of {} already handled as add in this batch", id);
                continue;
            }
            let parked = match &staged {
                Staged::Origin(_) => self.deferral.contains_origin(&id),
                Staged::FocalMechanism(_) => self.deferral.contains_focal_mechanism(&id),
            };
            if parked {
                debug!("update of {} skipped, object is deferred", id);
                continue;
            }
            let real = batch.real_updates.contains(&id);
            match staged {
                Staged::Origin(origin) => self.process_origin_update(origin, real).await?,
                Staged::FocalMechanism(fm) => self.process_focal_update(fm).await?,
            }
        }

        self.flush_notifiers()
    }

    async fn stage(&mut self, notifier: Notifier, batch: &mut Batch) -> Result<()> {
        let Notifier {
            parent_id,
            operation,
            object,
        } = notifier;
        if operation == Operation::Remove {
            debug!("remove notification ignored");
            return Ok(());
        }
        match object {
            DomainObject::Origin(origin) => {
                self.origins.feed(origin.public_id.clone(), origin.clone());
                match operation {
                    Operation::Add => batch.stage_add(Staged::Origin(origin)),
                    _ => batch.stage_update(Staged::Origin(origin), true),
                }
            }
            DomainObject::Magnitude(mut magnitude) => {
                // The notifier parent names the owning origin
                magnitude.origin_id = parent_id.clone();
                let Some(mut parent) = self.origins.get(&parent_id).cloned() else {
                    debug!(
                        "magnitude {} for unknown origin {} dropped",
                        magnitude.public_id, parent_id
                    );
                    return Ok(());
                };
                parent.set_magnitude(magnitude);
                self.origins.feed(parent_id.clone(), parent.clone());
                self.store.put_origin(&parent).await?;
                batch.stage_update(Staged::Origin(parent), false);
            }
            DomainObject::FocalMechanism(fm) => {
                self.blacklist_derived_origins(&fm);
                self.focal_mechanisms.feed(fm.public_id.clone(), fm.clone());
                match operation {
                    Operation::Add => batch.stage_add(Staged::FocalMechanism(fm)),
                    _ => batch.stage_update(Staged::FocalMechanism(fm), true),
                }
            }
            DomainObject::MomentTensor(tensor) => {
                if let Some(derived) = &tensor.derived_origin_id {
                    self.blacklist.insert(derived.clone());
                }
                let Some(mut fm) = self.focal_mechanisms.get(&parent_id).cloned() else {
                    debug!(
                        "moment tensor {} for unknown focal mechanism {} dropped",
                        tensor.public_id, parent_id
                    );
                    return Ok(());
                };
                fm.moment_tensors.retain(|t| t.public_id != tensor.public_id);
                fm.moment_tensors.push(tensor);
                self.focal_mechanisms.feed(parent_id.clone(), fm.clone());
                self.store.put_focal_mechanism(&fm).await?;
                batch.stage_update(Staged::FocalMechanism(fm), false);
            }
            DomainObject::OriginReference(reference) => {
                // Explicit association supersedes a pending add
                if let Some(staged) = batch.take_add(&reference.origin_id) {
                    batch.stage_update(staged, true);
                } else if let Some(origin) = self.resolve_origin(&reference.origin_id).await? {
                    batch.stage_update(Staged::Origin(origin), true);
                }
                self.apply_origin_reference(&parent_id, &reference.origin_id)
                    .await?;
            }
            DomainObject::FocalMechanismReference(reference) => {
                if let Some(staged) = batch.take_add(&reference.focal_mechanism_id) {
                    batch.stage_update(staged, true);
                } else if let Some(fm) = self
                    .resolve_focal_mechanism(&reference.focal_mechanism_id)
                    .await?
                {
                    batch.stage_update(Staged::FocalMechanism(fm), true);
                }
                self.apply_focal_mechanism_reference(&parent_id, &reference.focal_mechanism_id)
                    .await?;
            }
            DomainObject::Event(event) => {
                // Externally published event state replaces ours
                self.store.put_event(&event).await?;
                self.register_event(event);
            }
            DomainObject::JournalEntry(entry) => {
                // Our own acknowledgements also travel the bus; only
                // command entries are interpreted.
                if entry.action.ends_with("OK") || entry.action.ends_with("Failed") {
                    return Ok(());
                }
                self.handle_journal_command(entry).await?;
            }
        }
        Ok(())
    }

    fn blacklist_derived_origins(&mut self, fm: &FocalMechanism) {
        for tensor in &fm.moment_tensors {
            if let Some(derived) = &tensor.derived_origin_id {
                self.blacklist.insert(derived.clone());
            }
        }
    }

    async fn apply_origin_reference(&mut self, event_id: &str, origin_id: &str) -> Result<()> {
        let Some(mut event) = self.resolve_event(event_id).await? else {
            debug!(
                "origin reference {} -> unknown event {} dropped",
                origin_id, event_id
            );
            return Ok(());
        };
        if event.add_origin_ref(origin_id) {
            self.store.put_event(&event).await?;
            self.register_event(event);
        }
        Ok(())
    }

    async fn apply_focal_mechanism_reference(&mut self, event_id: &str, fm_id: &str) -> Result<()> {
        let Some(mut event) = self.resolve_event(event_id).await? else {
            debug!(
                "focal mechanism reference {} -> unknown event {} dropped",
                fm_id, event_id
            );
            return Ok(());
        };
        if event.add_focal_mechanism_ref(fm_id) {
            self.store.put_event(&event).await?;
            self.register_event(event);
        }
        Ok(())
    }

    async fn process_origin_add(&mut self, origin: Origin) -> Result<()> {
        self.store.put_origin(&origin).await?;
        if deferral::delay_filter_matches(
            &self.config.delay,
            origin.agency(),
            origin.author(),
            origin.mode(),
        ) {
            debug!(
                "origin {} deferred for {}s",
                origin.public_id, self.config.delay.span_secs
            );
            self.deferral
                .push(Deferrable::Origin(origin), self.config.delay.span_secs);
            return Ok(());
        }
        self.associate_origin(&origin, true).await?;
        Ok(())
    }

    async fn process_focal_add(&mut self, fm: FocalMechanism) -> Result<()> {
        self.store.put_focal_mechanism(&fm).await?;
        if deferral::delay_filter_matches(
            &self.config.delay,
            fm.agency(),
            fm.author(),
            fm.mode(),
        ) {
            debug!(
                "focal mechanism {} deferred for {}s",
                fm.public_id, self.config.delay.span_secs
            );
            self.deferral
                .push(Deferrable::FocalMechanism(fm), self.config.delay.span_secs);
            return Ok(());
        }
        self.associate_focal_mechanism(&fm).await?;
        Ok(())
    }

    async fn process_origin_update(&mut self, origin: Origin, real: bool) -> Result<()> {
        self.store.put_origin(&origin).await?;
        self.origins.feed(origin.public_id.clone(), origin.clone());
        match self.event_id_for_origin(&origin.public_id).await? {
            Some(event_id) => {
                if real {
                    self.choose_preferred(&event_id, &origin).await?;
                } else {
                    // Magnitude-only change: no full re-arbitration. The
                    // preferred origin refreshes its magnitude choice;
                    // extensions run either way.
                    let Some(event) = self.resolve_event(&event_id).await? else {
                        return Ok(());
                    };
                    if event.preferred_origin_id.as_deref() == Some(origin.public_id.as_str()) {
                        self.refresh_preferred_magnitude(&event_id, &origin).await?;
                    } else {
                        self.run_processors(&event);
                    }
                }
            }
            None => {
                // Late first sighting: an update to an origin never seen
                // as an add still gets a chance to associate.
                self.associate_origin(&origin, true).await?;
            }
        }
        Ok(())
    }

    async fn process_focal_update(&mut self, fm: FocalMechanism) -> Result<()> {
        self.store.put_focal_mechanism(&fm).await?;
        self.focal_mechanisms.feed(fm.public_id.clone(), fm.clone());
        match self.event_id_for_focal_mechanism(&fm.public_id).await? {
            Some(event_id) => {
                self.choose_preferred_focal_mechanism(&event_id, &fm).await?;
            }
            None => {
                self.associate_focal_mechanism(&fm).await?;
            }
        }
        Ok(())
    }
}
