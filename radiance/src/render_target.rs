//! Render targets.
//!
//! A [`RenderTarget`] is a shared handle around a framebuffer object and the textures rendered
//! into. Attachments are only recorded here; the driver attaches them to the framebuffer the next
//! time the target gets bound.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use glam::UVec2;

use crate::backend::FramebufferHandle;
use crate::texture::Texture;

struct RenderTargetInner {
  framebuffer: FramebufferHandle,
  owner: u64,
  textures: RefCell<Vec<Texture>>,
  depth_stencil: RefCell<Option<Texture>>,
  dirty: Cell<bool>,
  alive: Cell<bool>,
}

#[derive(Clone)]
pub struct RenderTarget(Rc<RenderTargetInner>);

impl RenderTarget {
  pub(crate) fn new(framebuffer: FramebufferHandle, owner: u64) -> Self {
    RenderTarget(Rc::new(RenderTargetInner {
      framebuffer,
      owner,
      textures: RefCell::new(Vec::new()),
      depth_stencil: RefCell::new(None),
      dirty: Cell::new(false),
      alive: Cell::new(true),
    }))
  }

  pub fn framebuffer(&self) -> FramebufferHandle {
    self.0.framebuffer
  }

  /// Set the color attachments, in order, and the optional depth(-stencil) attachment.
  pub fn set_textures(&self, textures: &[Texture], depth_stencil: Option<Texture>) {
    *self.0.textures.borrow_mut() = textures.to_vec();
    *self.0.depth_stencil.borrow_mut() = depth_stencil;
    self.0.dirty.set(true);
  }

  /// Set a single color attachment.
  pub fn set_texture(&self, texture: Texture, depth_stencil: Option<Texture>) {
    self.set_textures(&[texture], depth_stencil);
  }

  pub fn textures(&self) -> Vec<Texture> {
    self.0.textures.borrow().clone()
  }

  pub fn depth_stencil(&self) -> Option<Texture> {
    self.0.depth_stencil.borrow().clone()
  }

  /// Size of the first attachment, zero without attachments.
  pub fn size(&self) -> UVec2 {
    self
      .0
      .textures
      .borrow()
      .first()
      .or(self.0.depth_stencil.borrow().as_ref())
      .map_or(UVec2::ZERO, Texture::size)
  }

  pub fn is_alive(&self) -> bool {
    self.0.alive.get()
  }

  pub(crate) fn owner(&self) -> u64 {
    self.0.owner
  }

  pub(crate) fn take_dirty(&self) -> bool {
    self.0.dirty.replace(false)
  }

  pub(crate) fn mark_deleted(&self) {
    self.0.alive.set(false);
  }
}

impl PartialEq for RenderTarget {
  fn eq(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }
}

impl Eq for RenderTarget {}

impl fmt::Debug for RenderTarget {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("RenderTarget")
      .field("framebuffer", &self.0.framebuffer)
      .field("size", &self.size())
      .finish()
  }
}
