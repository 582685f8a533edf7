//! Journal-command processor
//!
//! Operator overrides arrive as journal entries addressed to an event.
//! Every command is answered with exactly one `<command>OK` or
//! `<command>Failed` acknowledgement carrying the new state or the failure
//! reason; unknown commands fail generically. Acknowledgements are
//! persisted and published in the same outgoing batch as any arbitration
//! side effects the command triggered.

use super::{Engine, EVENT_PARAMETERS};
use crate::bookkeeping::Preference;
use crate::error::Result;
use quakefuse_common::messaging::{DomainObject, Operation, Transport};
use quakefuse_common::model::{DescriptionKind, EvaluationMode, EventType, JournalEntry};
use quakefuse_common::store::EventStore;
use tracing::{info, warn};

/// Success payload or human-readable failure reason
type Outcome = std::result::Result<String, String>;

impl<S: EventStore, T: Transport> Engine<S, T> {
    pub async fn handle_journal_command(&mut self, entry: JournalEntry) -> Result<()> {
        info!(
            "journal command {} on {} ({:?})",
            entry.action, entry.object_id, entry.parameters
        );
        self.store.add_journal_entry(&entry).await?;

        let outcome = match entry.action.as_str() {
            "EvPrefMagType" => self.cmd_pref_mag_type(&entry).await?,
            "EvPrefOrgID" => self.cmd_pref_org_id(&entry).await?,
            "EvPrefOrgEvalMode" => self.cmd_pref_org_eval_mode(&entry).await?,
            "EvPrefOrgAutomatic" => self.cmd_pref_org_automatic(&entry).await?,
            "EvType" => self.cmd_ev_type(&entry).await?,
            "EvName" => self.cmd_ev_name(&entry).await?,
            "EvOpComment" => self.cmd_ev_op_comment(&entry).await?,
            "EvPrefFocMecID" => self.cmd_pref_foc_mec_id(&entry).await?,
            _ => Err("unknown command".to_string()),
        };

        let (suffix, parameters) = match outcome {
            Ok(parameters) => ("OK", parameters),
            Err(reason) => {
                warn!(
                    "journal command {} on {} failed: {}",
                    entry.action, entry.object_id, reason
                );
                ("Failed", reason)
            }
        };
        let ack = JournalEntry::new(
            entry.object_id.clone(),
            format!("{}{}", entry.action, suffix),
            parameters,
            self.config.author.clone(),
        );
        self.store.add_journal_entry(&ack).await?;
        self.queue_notifier(
            entry.object_id,
            Operation::Add,
            DomainObject::JournalEntry(ack),
        );
        Ok(())
    }

    /// Pin or release the preferred magnitude type, then re-select
    async fn cmd_pref_mag_type(&mut self, entry: &JournalEntry) -> Result<Outcome> {
        let event_id = entry.object_id.as_str();
        let Some(event) = self.resolve_event(event_id).await? else {
            return Ok(Err(format!("unknown event {}", event_id)));
        };
        let param = entry.parameters.trim().to_string();
        {
            let record = self.records.entry(event_id);
            if param.is_empty() {
                record.constraints.fixed_magnitude_type = None;
                record.magnitude_state = Preference::Auto;
            } else {
                record.constraints.fixed_magnitude_type = Some(param.clone());
                record.magnitude_state = Preference::Pinned {
                    by: entry.sender.clone(),
                };
            }
        }
        if let Some(preferred_id) = event.preferred_origin_id.clone() {
            if let Some(origin) = self.resolve_origin(&preferred_id).await? {
                self.refresh_preferred_magnitude(event_id, &origin).await?;
            }
        }
        if param.is_empty() {
            Ok(Ok("unset".to_string()))
        } else {
            Ok(Ok(param))
        }
    }

    /// Pin the preferred origin by id, or release the pin and re-evaluate
    async fn cmd_pref_org_id(&mut self, entry: &JournalEntry) -> Result<Outcome> {
        let event_id = entry.object_id.as_str();
        let Some(event) = self.resolve_event(event_id).await? else {
            return Ok(Err(format!("unknown event {}", event_id)));
        };
        let param = entry.parameters.trim().to_string();
        if param.is_empty() {
            {
                let record = self.records.entry(event_id);
                record.constraints.fixed_origin_id = None;
                record.origin_state = Preference::Auto;
            }
            self.reevaluate_origins(event_id).await?;
            return Ok(Ok("unset".to_string()));
        }
        if !event.origin_refs.iter().any(|id| id == &param) {
            return Ok(Err(format!("origin {} is not associated", param)));
        }
        let Some(origin) = self.resolve_origin(&param).await? else {
            return Ok(Err(format!("unknown origin {}", param)));
        };
        {
            let record = self.records.entry(event_id);
            record.constraints.fixed_origin_id = Some(param.clone());
            record.origin_state = Preference::Pinned {
                by: entry.sender.clone(),
            };
        }
        self.accept_preferred(&event, &origin).await?;
        Ok(Ok(param))
    }

    /// Pin or release the evaluation-mode constraint and re-evaluate
    async fn cmd_pref_org_eval_mode(&mut self, entry: &JournalEntry) -> Result<Outcome> {
        let event_id = entry.object_id.as_str();
        if self.resolve_event(event_id).await?.is_none() {
            return Ok(Err(format!("unknown event {}", event_id)));
        }
        let param = entry.parameters.trim().to_string();
        if param.is_empty() {
            self.records
                .entry(event_id)
                .constraints
                .fixed_evaluation_mode = None;
            self.reevaluate_origins(event_id).await?;
            return Ok(Ok("unset".to_string()));
        }
        let Some(mode) = EvaluationMode::parse(&param) else {
            return Ok(Err(format!("invalid evaluation mode '{}'", param)));
        };
        self.records
            .entry(event_id)
            .constraints
            .fixed_evaluation_mode = Some(mode);
        self.reevaluate_origins(event_id).await?;
        Ok(Ok(param))
    }

    /// Drop every origin pin and force a full automatic re-evaluation
    async fn cmd_pref_org_automatic(&mut self, entry: &JournalEntry) -> Result<Outcome> {
        let event_id = entry.object_id.as_str();
        if self.resolve_event(event_id).await?.is_none() {
            return Ok(Err(format!("unknown event {}", event_id)));
        }
        {
            let record = self.records.entry(event_id);
            record.constraints.fixed_origin_id = None;
            record.constraints.fixed_evaluation_mode = None;
            record.origin_state = Preference::Auto;
        }
        self.reevaluate_origins(event_id).await?;
        Ok(Ok("automatic".to_string()))
    }

    /// Set or clear the event classification tag
    async fn cmd_ev_type(&mut self, entry: &JournalEntry) -> Result<Outcome> {
        let event_id = entry.object_id.as_str();
        let Some(mut event) = self.resolve_event(event_id).await? else {
            return Ok(Err(format!("unknown event {}", event_id)));
        };
        let param = entry.parameters.trim().to_string();
        if param.is_empty() {
            event.event_type = None;
        } else {
            let Some(event_type) = EventType::parse(&param) else {
                return Ok(Err(format!("unknown event type '{}'", param)));
            };
            event.event_type = Some(event_type);
        }
        self.store.put_event(&event).await?;
        self.register_event(event.clone());
        self.queue_notifier(
            EVENT_PARAMETERS.to_string(),
            Operation::Update,
            DomainObject::Event(event),
        );
        if param.is_empty() {
            Ok(Ok("unset".to_string()))
        } else {
            Ok(Ok(param))
        }
    }

    async fn cmd_ev_name(&mut self, entry: &JournalEntry) -> Result<Outcome> {
        self.set_event_description(entry, DescriptionKind::EventName)
            .await
    }

    async fn cmd_ev_op_comment(&mut self, entry: &JournalEntry) -> Result<Outcome> {
        self.set_event_description(entry, DescriptionKind::OperatorComment)
            .await
    }

    async fn set_event_description(
        &mut self,
        entry: &JournalEntry,
        kind: DescriptionKind,
    ) -> Result<Outcome> {
        let event_id = entry.object_id.as_str();
        let Some(mut event) = self.resolve_event(event_id).await? else {
            return Ok(Err(format!("unknown event {}", event_id)));
        };
        let param = entry.parameters.trim().to_string();
        if param.is_empty() {
            event.remove_description(kind);
        } else {
            event.set_description(kind, param.clone());
        }
        self.store.put_event(&event).await?;
        self.register_event(event.clone());
        self.queue_notifier(
            EVENT_PARAMETERS.to_string(),
            Operation::Update,
            DomainObject::Event(event),
        );
        if param.is_empty() {
            Ok(Ok("unset".to_string()))
        } else {
            Ok(Ok(param))
        }
    }

    /// Pin or release the preferred focal mechanism
    async fn cmd_pref_foc_mec_id(&mut self, entry: &JournalEntry) -> Result<Outcome> {
        let event_id = entry.object_id.as_str();
        let Some(event) = self.resolve_event(event_id).await? else {
            return Ok(Err(format!("unknown event {}", event_id)));
        };
        let param = entry.parameters.trim().to_string();
        if param.is_empty() {
            {
                let record = self.records.entry(event_id);
                record.constraints.fixed_focal_mechanism_id = None;
                record.focal_mechanism_state = Preference::Auto;
            }
            self.reevaluate_focal_mechanisms(event_id).await?;
            return Ok(Ok("unset".to_string()));
        }
        if !event.focal_mechanism_refs.iter().any(|id| id == &param) {
            return Ok(Err(format!("focal mechanism {} is not associated", param)));
        }
        let Some(fm) = self.resolve_focal_mechanism(&param).await? else {
            return Ok(Err(format!("unknown focal mechanism {}", param)));
        };
        {
            let record = self.records.entry(event_id);
            record.constraints.fixed_focal_mechanism_id = Some(param.clone());
            record.focal_mechanism_state = Preference::Pinned {
                by: entry.sender.clone(),
            };
        }
        self.accept_preferred_focal_mechanism(&event, &fm).await?;
        Ok(Ok(param))
    }
}
