//! Shader source loading.
//!
//! Built-in materials are emulated with GLSL programs whose sources are looked up by file name
//! (`Solid.vsh`, `Renderer2D.fsh`…) through a [`ShaderLoader`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::DriverConfig;

/// Shader source lookup failure.
#[derive(Debug, Error)]
pub enum ShaderLoadError {
  #[error("missing shader source {0}")]
  Missing(String),
  #[error("cannot read shader source {path}: {source}")]
  Unreadable {
    path: String,
    #[source]
    source: io::Error,
  },
}

/// Source of shader texts.
pub trait ShaderLoader {
  fn load(&self, name: &str) -> Result<String, ShaderLoadError>;
}

/// Shader sources read from a directory.
#[derive(Clone, Debug)]
pub struct FileShaderLoader {
  root: PathBuf,
}

impl FileShaderLoader {
  pub fn new<P>(root: P) -> Self
  where
    P: Into<PathBuf>,
  {
    FileShaderLoader { root: root.into() }
  }

  /// Loader rooted at the shader path of a configuration.
  pub fn from_config(config: &DriverConfig) -> Self {
    Self::new(config.shader_path())
  }
}

impl ShaderLoader for FileShaderLoader {
  fn load(&self, name: &str) -> Result<String, ShaderLoadError> {
    let path = self.root.join(name);

    fs::read_to_string(&path).map_err(|source| {
      if source.kind() == io::ErrorKind::NotFound {
        ShaderLoadError::Missing(path.display().to_string())
      } else {
        ShaderLoadError::Unreadable {
          path: path.display().to_string(),
          source,
        }
      }
    })
  }
}

/// In-memory shader sources, by name.
#[derive(Clone, Debug, Default)]
pub struct MemoryShaderLoader {
  sources: HashMap<String, String>,
}

impl MemoryShaderLoader {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
    self.sources.insert(name.into(), source.into());
  }

  pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
    self.insert(name, source);
    self
  }
}

impl ShaderLoader for MemoryShaderLoader {
  fn load(&self, name: &str) -> Result<String, ShaderLoadError> {
    self
      .sources
      .get(name)
      .cloned()
      .ok_or_else(|| ShaderLoadError::Missing(name.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn memory_loader() {
    let loader = MemoryShaderLoader::new().with("Solid.vsh", "void main() {}");

    assert_eq!(loader.load("Solid.vsh").unwrap(), "void main() {}");
    assert!(matches!(loader.load("Solid.fsh"), Err(ShaderLoadError::Missing(_))));
  }

  #[test]
  fn missing_files_are_reported_with_their_path() {
    let loader = FileShaderLoader::new("/nonexistent/shaders");

    match loader.load("Solid.vsh") {
      Err(ShaderLoadError::Missing(path)) => assert!(path.ends_with("Solid.vsh")),
      other => panic!("unexpected {:?}", other),
    }
  }
}
