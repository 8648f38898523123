//! Driver configuration.

use std::path::{Path, PathBuf};

use glam::UVec2;
use serde::{Deserialize, Serialize};

/// Largest vertex count of a 2D batch; quad indices must fit in 16 bits.
pub const MAX_2D_VERTICES: usize = 65536;

/// Options used when creating a driver.
///
/// Feel free to look at the different methods available to tweak the options. You may want to
/// start with `default()` though.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DriverConfig {
  screen_size: [u32; 2],
  shader_path: PathBuf,
  max_2d_vertices: usize,
  stencil_buffer: bool,
  anti_alias: u8,
  allow_zwrite_on_transparent: bool,
  create_mipmaps: bool,
}

impl Default for DriverConfig {
  /// Defaults:
  ///
  /// - `screen_size` set to `800×600`.
  /// - `shader_path` set to `media/Shaders`.
  /// - `max_2d_vertices` set to `65536`.
  /// - `stencil_buffer` set to `false`.
  /// - `anti_alias` set to `0`.
  /// - `allow_zwrite_on_transparent` set to `false`.
  /// - `create_mipmaps` set to `true`.
  fn default() -> Self {
    DriverConfig {
      screen_size: [800, 600],
      shader_path: PathBuf::from("media/Shaders"),
      max_2d_vertices: MAX_2D_VERTICES,
      stencil_buffer: false,
      anti_alias: 0,
      allow_zwrite_on_transparent: false,
      create_mipmaps: true,
    }
  }
}

impl DriverConfig {
  /// Size of the default framebuffer.
  #[inline]
  pub fn with_screen_size(self, size: [u32; 2]) -> Self {
    DriverConfig {
      screen_size: size,
      ..self
    }
  }

  #[inline]
  pub fn screen_size(&self) -> UVec2 {
    UVec2::from(self.screen_size)
  }

  /// Directory the built-in shader sources are read from.
  #[inline]
  pub fn with_shader_path<P>(self, path: P) -> Self
  where
    P: Into<PathBuf>,
  {
    DriverConfig {
      shader_path: path.into(),
      ..self
    }
  }

  #[inline]
  pub fn shader_path(&self) -> &Path {
    &self.shader_path
  }

  /// Maximal number of vertices of a 2D image batch. Clamped to [`MAX_2D_VERTICES`].
  #[inline]
  pub fn with_max_2d_vertices(self, count: usize) -> Self {
    DriverConfig {
      max_2d_vertices: count,
      ..self
    }
  }

  #[inline]
  pub fn max_2d_vertices(&self) -> usize {
    self.max_2d_vertices.min(MAX_2D_VERTICES)
  }

  #[inline]
  pub fn with_stencil_buffer(self, stencil_buffer: bool) -> Self {
    DriverConfig {
      stencil_buffer,
      ..self
    }
  }

  #[inline]
  pub fn stencil_buffer(&self) -> bool {
    self.stencil_buffer
  }

  /// Number of samples requested for multisampling; `0` disables it.
  #[inline]
  pub fn with_anti_alias(self, samples: u8) -> Self {
    DriverConfig {
      anti_alias: samples,
      ..self
    }
  }

  #[inline]
  pub fn anti_alias(&self) -> u8 {
    self.anti_alias
  }

  /// Let transparent materials with an automatic depth write mode write depth.
  #[inline]
  pub fn with_allow_zwrite_on_transparent(self, allow: bool) -> Self {
    DriverConfig {
      allow_zwrite_on_transparent: allow,
      ..self
    }
  }

  #[inline]
  pub fn allow_zwrite_on_transparent(&self) -> bool {
    self.allow_zwrite_on_transparent
  }

  /// Generate mipmaps for textures added to the driver.
  #[inline]
  pub fn with_create_mipmaps(self, create: bool) -> Self {
    DriverConfig {
      create_mipmaps: create,
      ..self
    }
  }

  #[inline]
  pub fn create_mipmaps(&self) -> bool {
    self.create_mipmaps
  }
}
