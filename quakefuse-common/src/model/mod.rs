//! Seismic domain model
//!
//! Data-only types produced by upstream locators and magnitude processors.
//! The engine reads these, recomputes derived fields (region description)
//! and marks objects updated to trigger re-publication; it never computes
//! locations or magnitudes itself.

mod event;
mod focal;
mod journal;
mod origin;

pub use event::{
    DescriptionKind, Event, EventDescription, EventType, FocalMechanismReference, OriginReference,
};
pub use focal::{FocalMechanism, MomentTensor};
pub use journal::JournalEntry;
pub use origin::{
    Arrival, CreationInfo, EvaluationMode, Magnitude, Origin, OriginQuality, Quantity,
};
