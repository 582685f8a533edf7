//! # QuakeFuse Engine
//!
//! Real-time association and arbitration engine for seismic-network
//! results. Independent automatic and analyst processes publish candidate
//! Origins, Magnitudes and FocalMechanisms; this engine groups them into
//! canonical Events and deterministically selects one preferred solution
//! per axis under a configurable priority policy, tolerating out-of-order
//! and late-arriving input.

pub mod bookkeeping;
pub mod deferral;
pub mod engine;
pub mod error;
pub mod filter;
pub mod magnitude;
pub mod matching;
pub mod priority;

pub use engine::{Engine, EventProcessor};
pub use error::{Error, Result};
