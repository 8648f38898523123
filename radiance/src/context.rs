//! Graphics context management.
//!
//! Creating windows and contexts is tightly related to the kind of application being written, so
//! the driver never does it itself: it is handed a [`ContextManager`] and calls into it at
//! creation, at the start and end of every frame, and when dropped.

use std::ffi::c_void;

use thiserror::Error;

/// Context manager failure.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ContextError {
  #[error("cannot create surface: {0}")]
  Surface(String),
  #[error("cannot create context: {0}")]
  Context(String),
  #[error("cannot make context current: {0}")]
  Activation(String),
  #[error("cannot swap buffers: {0}")]
  SwapBuffers(String),
}

/// Owner of a rendering surface and its graphics context.
pub trait ContextManager {
  fn generate_surface(&mut self) -> Result<(), ContextError>;

  fn generate_context(&mut self) -> Result<(), ContextError>;

  /// Make the context current on the calling thread. With `restore_null`, a failure to bind the
  /// context leaves no context current.
  fn activate_context(&mut self, restore_null: bool) -> Result<(), ContextError>;

  fn swap_buffers(&mut self) -> Result<(), ContextError>;

  fn destroy_context(&mut self);

  fn destroy_surface(&mut self);

  /// Address of a graphics API entry point, null if unavailable.
  fn proc_address(&self, name: &str) -> *const c_void;
}
