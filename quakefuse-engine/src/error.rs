//! Engine error types
//!
//! Policy rejections and missing dependencies are not errors: the engine
//! fails closed by skipping the change and logging. Only collaborator
//! failures (store, transport) propagate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Store or transport failure surfaced by a collaborator
    #[error(transparent)]
    Shared(#[from] quakefuse_common::Error),
}
