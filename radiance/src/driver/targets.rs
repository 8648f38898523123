//! Render targets and viewport.

use glam::UVec2;
use log::{error, warn};

use crate::backend::{Attachment, ClearFlags, FramebufferHandle, GlApi, PixelFormat};
use crate::color::Color;
use crate::rect::Rect;
use crate::render_target::RenderTarget;
use crate::texture::Texture;

use super::Driver;

impl<A> Driver<A>
where
  A: GlApi,
{
  /// Create an empty render target. Give it textures with [`RenderTarget::set_textures`].
  pub fn add_render_target(&mut self) -> RenderTarget {
    let framebuffer = self.pipeline.state.raw().create_framebuffer();
    let target = RenderTarget::new(framebuffer, self.id);

    self.render_targets.push(target.clone());
    target
  }

  /// Create a texture meant to be rendered into.
  ///
  /// Its sampling is set to linear filtering, clamped to edges, without mipmaps.
  pub fn add_render_target_texture(&mut self, size: UVec2, name: &str, format: PixelFormat) -> Option<Texture> {
    self.create_texture(name, size, format, None, true)
  }

  /// Direct rendering into a render target, or back to the screen with `None`, and clear it.
  ///
  /// Returns `false`, leaving the current target alone, if the target is dead or was created by
  /// another driver.
  pub fn set_render_target(
    &mut self,
    target: Option<&RenderTarget>,
    clear: ClearFlags,
    color: Color,
    depth: f32,
    stencil: i32,
  ) -> bool {
    if let Some(target) = target {
      if target.owner() != self.id || !target.is_alive() {
        error!("Tried to set a render target not owned by this driver.");
        return false;
      }
    }

    let previous_size = self.current_render_target_size();

    match target {
      Some(target) => {
        self.pipeline.state.bind_framebuffer(target.framebuffer());

        if target.take_dirty() {
          self.attach_textures(target);
        }

        self.current_render_target = Some(target.clone());
        self.current_render_target_size = target.size();
      }

      None => self.bind_screen(),
    }

    let size = self.current_render_target_size();
    self.reset_viewport(size);

    if size != previous_size {
      self.pipeline.transforms.invalidate();
    }

    self.clear_buffers(clear, color, depth, stencil);
    true
  }

  fn bind_screen(&mut self) {
    self.pipeline.state.bind_framebuffer(FramebufferHandle::NONE);
    self.current_render_target = None;
    self.current_render_target_size = UVec2::ZERO;
  }

  fn attach_textures(&mut self, target: &RenderTarget) {
    let max_draw_buffers = self.pipeline.caps.max_draw_buffers as usize;
    let textures = target.textures();
    let api = self.pipeline.state.raw();

    if textures.len() > max_draw_buffers {
      warn!(
        "Render target has {} color textures, only {} are used",
        textures.len(),
        max_draw_buffers
      );
    }

    let colors: Vec<_> = textures
      .iter()
      .take(max_draw_buffers)
      .filter(|texture| {
        if texture.format().is_depth() {
          error!("Depth texture {} cannot be a color attachment", texture.name());
        }

        !texture.format().is_depth()
      })
      .collect();
    let color_count = colors.len();

    for (i, texture) in colors.into_iter().enumerate() {
      api.framebuffer_texture(Attachment::Color(i as u32), texture.handle());
    }

    match target.depth_stencil() {
      Some(depth_stencil) if depth_stencil.format().is_depth() => {
        let attachment = if depth_stencil.format().has_stencil() {
          Attachment::DepthStencil
        } else {
          Attachment::Depth
        };

        api.framebuffer_texture(attachment, depth_stencil.handle());
      }

      Some(texture) => error!("Color texture {} cannot be a depth attachment", texture.name()),

      None => (),
    }

    api.draw_buffers(color_count as u32);

    if let Err(reason) = api.framebuffer_status() {
      error!("Render target is incomplete: {}", reason);
    }
  }

  /// Delete a render target. Rendering goes back to the screen if it was the current one.
  pub fn remove_render_target(&mut self, target: &RenderTarget) {
    let Some(index) = self.render_targets.iter().position(|t| t == target) else {
      return;
    };

    let target = self.render_targets.swap_remove(index);

    if self.current_render_target.as_ref() == Some(&target) {
      self.bind_screen();
      self.reset_viewport(self.screen_size);
      self.pipeline.transforms.invalidate();
    }

    self.pipeline.state.delete_framebuffer(target.framebuffer());
    target.mark_deleted();
  }

  pub fn remove_all_render_targets(&mut self) {
    for target in self.render_targets.clone() {
      self.remove_render_target(&target);
    }
  }

  /// Size of what is currently rendered into.
  pub fn current_render_target_size(&self) -> UVec2 {
    if self.current_render_target_size == UVec2::ZERO {
      self.screen_size
    } else {
      self.current_render_target_size
    }
  }

  pub fn screen_size(&self) -> UVec2 {
    self.screen_size
  }

  /// Track a new window size.
  pub fn on_resize(&mut self, size: UVec2) {
    self.screen_size = size;

    if self.current_render_target.is_none() {
      self.reset_viewport(size);
      self.pipeline.transforms.invalidate();
    }
  }

  fn reset_viewport(&mut self, size: UVec2) {
    self.viewport = Rect::from_size(size);
    self
      .pipeline
      .state
      .set_viewport([0, 0, size.x as i32, size.y as i32]);
  }

  /// Restrict rendering to part of the current render target.
  ///
  /// The rectangle is given top-down and clipped to the target; empty results are ignored.
  pub fn set_viewport(&mut self, area: Rect) {
    let size = self.current_render_target_size();
    let area = area.clipped(&Rect::from_size(size));

    if area.width() <= 0 || area.height() <= 0 {
      return;
    }

    let bottom = size.y as i32 - area.max.y;
    self
      .pipeline
      .state
      .set_viewport([area.min.x, bottom, area.width(), area.height()]);
    self.viewport = area;
  }

  pub fn viewport(&self) -> Rect {
    self.viewport
  }
}

#[cfg(test)]
mod tests {
  use crate::backend::recording::{CallLog, GlCall, RecordingGl};
  use crate::backend::{MagFilter, MinFilter, TextureParameter, Wrap};
  use crate::config::DriverConfig;
  use crate::shader::MemoryShaderLoader;

  use super::*;

  fn driver() -> (Driver<RecordingGl>, CallLog) {
    let (gl, log) = RecordingGl::new();
    let config = DriverConfig::default().with_screen_size([320, 240]);
    let driver = Driver::headless(gl, config, Box::new(MemoryShaderLoader::new()));
    log.clear();
    (driver, log)
  }

  #[test]
  fn binding_attaches_textures_once() {
    let (mut driver, log) = driver();

    let target = driver.add_render_target();
    let color = driver
      .add_render_target_texture(UVec2::new(64, 32), "rt", PixelFormat::Rgba8)
      .expect("color texture");
    target.set_texture(color.clone(), None);

    assert!(driver.set_render_target(Some(&target), ClearFlags::COLOR, Color::BLACK, 1., 0));
    assert_eq!(driver.current_render_target_size(), UVec2::new(64, 32));

    let calls = log.take();
    assert!(calls.contains(&GlCall::BindFramebuffer(target.framebuffer())));
    assert!(calls.contains(&GlCall::FramebufferTexture(Attachment::Color(0), color.handle())));
    assert!(calls.contains(&GlCall::DrawBuffers(1)));
    assert!(calls.contains(&GlCall::Viewport([0, 0, 64, 32])));

    assert!(driver.set_render_target(None, ClearFlags::empty(), Color::BLACK, 1., 0));
    assert!(driver.set_render_target(Some(&target), ClearFlags::empty(), Color::BLACK, 1., 0));
    assert_eq!(log.count(|c| matches!(c, GlCall::FramebufferTexture(..))), 0);
  }

  #[test]
  fn render_target_textures_are_sampled_linearly() {
    let (mut driver, log) = driver();

    let previous = driver.add_texture("previous", &image::RgbaImage::new(2, 2)).expect("texture");
    driver.state_mut().set_texture(0, Some(&previous));
    log.clear();

    let color = driver
      .add_render_target_texture(UVec2::new(4, 4), "rt", PixelFormat::Rgba8)
      .expect("color texture");
    let calls = log.take();

    for param in [
      TextureParameter::MagFilter(MagFilter::Linear),
      TextureParameter::MinFilter(MinFilter::Linear),
      TextureParameter::WrapS(Wrap::ClampToEdge),
      TextureParameter::WrapT(Wrap::ClampToEdge),
      TextureParameter::MaxLevel(0),
    ] {
      assert!(calls.contains(&GlCall::TexParameter(param)), "{:?} not issued", param);
    }

    let sampler = color.sampler_states();
    assert!(sampler.is_cached);
    assert_eq!(sampler.min_filter, MinFilter::Linear);
    assert_eq!(sampler.wrap_t, Wrap::ClampToEdge);
    assert_eq!(driver.state().texture(0), Some(&previous));
  }

  #[test]
  fn mismatched_attachment_formats_are_skipped() {
    let (mut driver, log) = driver();

    let target = driver.add_render_target();
    let depth = driver
      .add_render_target_texture(UVec2::new(8, 8), "depth", PixelFormat::Depth24Stencil8)
      .expect("depth texture");
    let color = driver
      .add_render_target_texture(UVec2::new(8, 8), "color", PixelFormat::Rgba8)
      .expect("color texture");
    target.set_textures(&[depth.clone()], Some(color.clone()));
    log.clear();

    driver.set_render_target(Some(&target), ClearFlags::empty(), Color::BLACK, 1., 0);

    assert_eq!(log.count(|c| matches!(c, GlCall::FramebufferTexture(..))), 0);
    assert!(log.calls().contains(&GlCall::DrawBuffers(0)));

    target.set_textures(&[color.clone()], Some(depth.clone()));
    driver.set_render_target(Some(&target), ClearFlags::empty(), Color::BLACK, 1., 0);

    assert!(log.calls().contains(&GlCall::FramebufferTexture(Attachment::Color(0), color.handle())));
    assert!(log
      .calls()
      .contains(&GlCall::FramebufferTexture(Attachment::DepthStencil, depth.handle())));
  }

  #[test]
  fn size_changes_invalidate_transforms() {
    let (mut driver, _log) = driver();

    let target = driver.add_render_target();
    let color = driver
      .add_render_target_texture(UVec2::new(64, 64), "rt", PixelFormat::Rgba8)
      .expect("color texture");
    target.set_texture(color, None);

    let generation = driver.pipeline.transforms.generation();
    driver.set_render_target(Some(&target), ClearFlags::empty(), Color::BLACK, 1., 0);
    assert!(driver.pipeline.transforms.generation() > generation);

    let generation = driver.pipeline.transforms.generation();
    driver.set_render_target(Some(&target), ClearFlags::empty(), Color::BLACK, 1., 0);
    assert_eq!(driver.pipeline.transforms.generation(), generation);
  }

  #[test]
  fn foreign_targets_are_rejected() {
    let (mut driver, log) = driver();
    let (mut other, _other_log) = self::driver();

    let foreign = other.add_render_target();

    assert!(!driver.set_render_target(Some(&foreign), ClearFlags::COLOR, Color::BLACK, 1., 0));
    assert_eq!(log.count(|c| matches!(c, GlCall::BindFramebuffer(_))), 0);
  }

  #[test]
  fn removing_the_current_target_goes_back_to_the_screen() {
    let (mut driver, log) = driver();

    let target = driver.add_render_target();
    driver.set_render_target(Some(&target), ClearFlags::empty(), Color::BLACK, 1., 0);
    driver.remove_render_target(&target);

    assert!(!target.is_alive());
    assert!(log.calls().contains(&GlCall::DeleteFramebuffer(target.framebuffer())));
    assert!(!driver.set_render_target(Some(&target), ClearFlags::empty(), Color::BLACK, 1., 0));
    assert_eq!(driver.current_render_target_size(), UVec2::new(320, 240));
  }

  #[test]
  fn viewport_is_clipped_and_flipped() {
    let (mut driver, log) = driver();

    driver.set_viewport(Rect::new(10, 20, 400, 120));

    assert_eq!(driver.viewport(), Rect::new(10, 20, 320, 120));
    assert!(log.calls().contains(&GlCall::Viewport([10, 120, 310, 100])));

    log.clear();
    driver.set_viewport(Rect::new(400, 400, 500, 500));
    assert_eq!(log.count(|c| matches!(c, GlCall::Viewport(_))), 0);
  }
}
