//! Driver creation errors.

use thiserror::Error;

use crate::context::ContextError;

/// Reasons a driver cannot be created.
///
/// Once created, a driver never fails: per-frame operations report problems through logs and
/// `bool` / `Option` returns.
#[derive(Debug, Error)]
pub enum DriverError {
  #[error("context manager failure: {0}")]
  Context(#[from] ContextError),
  #[error("cannot load the graphics API: {0}")]
  ApiLoad(String),
  #[error("graphics state unavailable: {0}")]
  StateUnavailable(String),
}
