//! Textures.
//!
//! A [`Texture`] is a shared handle: cloning it grabs a new reference, dropping it releases one.
//! The GPU object itself is owned by the driver registry and deleted when the driver removes the
//! texture; stale clones then report [`Texture::is_alive`] as `false` and bind as no texture.
//!
//! Each texture carries the sampling state last applied to its GPU object, so that per-draw
//! filter refreshes only issue calls for what actually changed.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use glam::UVec2;
use serde::{Deserialize, Serialize};

use crate::backend::{MagFilter, MinFilter, PixelFormat, TextureHandle, Wrap};

/// Texture coordinate wrapping requested by a material layer.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum TextureClamp {
  #[default]
  Repeat,
  Clamp,
  ClampToEdge,
  ClampToBorder,
  Mirror,
}

impl TextureClamp {
  /// Wrap mode actually used on the GPU.
  pub fn wrap(self) -> Wrap {
    match self {
      TextureClamp::Repeat => Wrap::Repeat,
      TextureClamp::Clamp | TextureClamp::ClampToEdge | TextureClamp::ClampToBorder => {
        Wrap::ClampToEdge
      }
      TextureClamp::Mirror => Wrap::MirroredRepeat,
    }
  }
}

/// Sampling state last applied to a texture object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerStates {
  /// Whether the other fields reflect the GPU object. Cleared to force a full refresh.
  pub is_cached: bool,
  pub mag_filter: MagFilter,
  pub min_filter: MinFilter,
  pub anisotropy: f32,
  pub wrap_s: Wrap,
  pub wrap_t: Wrap,
}

impl Default for SamplerStates {
  fn default() -> Self {
    SamplerStates {
      is_cached: false,
      mag_filter: MagFilter::Linear,
      min_filter: MinFilter::NearestMipmapLinear,
      anisotropy: 1.,
      wrap_s: Wrap::Repeat,
      wrap_t: Wrap::Repeat,
    }
  }
}

struct TextureInner {
  handle: TextureHandle,
  name: String,
  size: UVec2,
  format: PixelFormat,
  render_target: bool,
  mipmaps: bool,
  owner: u64,
  alive: Cell<bool>,
  sampler: Cell<SamplerStates>,
}

/// Shared texture handle.
#[derive(Clone)]
pub struct Texture(Rc<TextureInner>);

impl Texture {
  pub(crate) fn new(
    handle: TextureHandle,
    name: &str,
    size: UVec2,
    format: PixelFormat,
    render_target: bool,
    mipmaps: bool,
    owner: u64,
  ) -> Self {
    Texture(Rc::new(TextureInner {
      handle,
      name: name.to_owned(),
      size,
      format,
      render_target,
      mipmaps,
      owner,
      alive: Cell::new(true),
      sampler: Cell::new(SamplerStates::default()),
    }))
  }

  pub fn handle(&self) -> TextureHandle {
    self.0.handle
  }

  pub fn name(&self) -> &str {
    &self.0.name
  }

  pub fn size(&self) -> UVec2 {
    self.0.size
  }

  pub fn format(&self) -> PixelFormat {
    self.0.format
  }

  /// Whether that texture is rendered into. Such textures are stored bottom-up.
  pub fn is_render_target(&self) -> bool {
    self.0.render_target
  }

  pub fn has_mipmaps(&self) -> bool {
    self.0.mipmaps
  }

  pub fn has_alpha(&self) -> bool {
    matches!(self.0.format, PixelFormat::Rgba8)
  }

  /// Whether the GPU object still exists.
  pub fn is_alive(&self) -> bool {
    self.0.alive.get()
  }

  /// Number of live handles to that texture, the driver registry included.
  pub fn reference_count(&self) -> usize {
    Rc::strong_count(&self.0)
  }

  pub fn sampler_states(&self) -> SamplerStates {
    self.0.sampler.get()
  }

  pub(crate) fn set_sampler_states(&self, states: SamplerStates) {
    self.0.sampler.set(states);
  }

  pub(crate) fn owner(&self) -> u64 {
    self.0.owner
  }

  pub(crate) fn mark_deleted(&self) {
    self.0.alive.set(false);
  }
}

impl PartialEq for Texture {
  fn eq(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }
}

impl Eq for Texture {}

impl fmt::Debug for Texture {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Texture")
      .field("handle", &self.0.handle)
      .field("name", &self.0.name)
      .field("size", &self.0.size)
      .field("render_target", &self.0.render_target)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn texture(name: &str) -> Texture {
    Texture::new(TextureHandle(1), name, UVec2::new(4, 4), PixelFormat::Rgba8, false, true, 0)
  }

  #[test]
  fn identity_equality() {
    let a = texture("a");
    let b = texture("a");

    assert_eq!(a, a.clone());
    assert_ne!(a, b);
    assert_eq!(a.reference_count(), 1);
  }

  #[test]
  fn clamp_modes() {
    assert_eq!(TextureClamp::Repeat.wrap(), Wrap::Repeat);
    assert_eq!(TextureClamp::ClampToBorder.wrap(), Wrap::ClampToEdge);
    assert_eq!(TextureClamp::Mirror.wrap(), Wrap::MirroredRepeat);
  }

  #[test]
  fn deletion_is_shared() {
    let a = texture("a");
    let b = a.clone();

    a.mark_deleted();
    assert!(!b.is_alive());
  }
}
