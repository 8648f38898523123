//! OpenGL backends.
//!
//! This crate exports [OpenGL](https://www.khronos.org/opengl/) backends for radiance. The
//! backend type, [`Gl33`], implements [`radiance::backend::GlApi`] on top of an OpenGL 3.3 core
//! context, loaded through the entry points of a [`ContextManager`].

#[cfg(feature = "gl33")]
pub mod gl33;

#[cfg(feature = "gl33")]
pub use gl33::{Gl33, StateQueryError};

#[cfg(feature = "gl33")]
use radiance::{context::ContextManager, shader::ShaderLoader, Driver, DriverConfig, DriverError};

/// Create a driver rendering through OpenGL 3.3 into the surface of a context manager.
#[cfg(feature = "gl33")]
pub fn create_driver(
  config: DriverConfig,
  context: Box<dyn ContextManager>,
  shader_loader: Box<dyn ShaderLoader>,
) -> Result<Driver<Gl33>, DriverError> {
  Driver::new(config, context, shader_loader, |context| {
    Gl33::load_with(|name| context.proc_address(name))
      .map_err(|e| DriverError::StateUnavailable(e.to_string()))
  })
}
