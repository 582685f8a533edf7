//! # QuakeFuse Common Library
//!
//! Shared code for the QuakeFuse correlation service:
//! - Seismic domain model (Origin, Magnitude, Event, FocalMechanism, ...)
//! - Notifier message types and the Transport trait
//! - EventStore trait with in-memory and SQLite implementations
//! - Time-bounded object cache
//! - Geographic helpers and region naming
//! - Configuration loading

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod messaging;
pub mod model;
pub mod store;

pub use error::{Error, Result};
