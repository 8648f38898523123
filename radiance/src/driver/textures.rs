//! Texture registry.

use glam::UVec2;
use image::RgbaImage;
use log::{error, warn};

use crate::backend::{GlApi, MagFilter, MinFilter, PixelFormat, TextureParameter, TextureTarget, Wrap};
use crate::texture::{SamplerStates, Texture};

use super::Driver;

impl<A> Driver<A>
where
  A: GlApi,
{
  /// Create a texture object and upload its texels, if any.
  ///
  /// The texture is bound on unit 0 for the upload; whatever was bound there is bound back
  /// afterwards. Textures without mipmaps are limited to their base level, and render target
  /// textures are sampled linearly and clamped to their edges until a material says otherwise.
  pub(crate) fn create_texture(
    &mut self,
    name: &str,
    size: UVec2,
    format: PixelFormat,
    texels: Option<&[u8]>,
    render_target: bool,
  ) -> Option<Texture> {
    let max_size = self.pipeline.caps.max_texture_size;

    if size.x == 0 || size.y == 0 || size.x > max_size || size.y > max_size {
      error!(
        "Could not create texture {}: size {}x{} is out of range (max {})",
        name, size.x, size.y, max_size
      );
      return None;
    }

    if let Some(texels) = texels {
      let needed = size.x as usize * size.y as usize * format.bytes_per_pixel();

      if texels.len() < needed {
        error!(
          "Could not create texture {}: {} bytes of texels given, {} needed",
          name,
          texels.len(),
          needed
        );
        return None;
      }
    }

    let mipmaps = !render_target && !format.is_depth() && self.config.create_mipmaps();
    let state = &mut self.pipeline.state;
    let handle = state.raw().create_texture();
    let texture = Texture::new(handle, name, size, format, render_target, mipmaps, self.id);
    let previous = state.texture(0).cloned();

    state.set_texture(0, Some(&texture));
    state
      .raw()
      .tex_image_2d(TextureTarget::Texture2D, size.to_array(), format, texels);

    if mipmaps {
      state.raw().generate_mipmap(TextureTarget::Texture2D);
    } else {
      state
        .raw()
        .tex_parameter(TextureTarget::Texture2D, TextureParameter::MaxLevel(0));
    }

    if render_target {
      let sampler = SamplerStates {
        is_cached: true,
        mag_filter: MagFilter::Linear,
        min_filter: MinFilter::Linear,
        anisotropy: 1.,
        wrap_s: Wrap::ClampToEdge,
        wrap_t: Wrap::ClampToEdge,
      };

      for param in [
        TextureParameter::MagFilter(sampler.mag_filter),
        TextureParameter::MinFilter(sampler.min_filter),
        TextureParameter::WrapS(sampler.wrap_s),
        TextureParameter::WrapT(sampler.wrap_t),
      ] {
        state.raw().tex_parameter(TextureTarget::Texture2D, param);
      }

      texture.set_sampler_states(sampler);
    }

    state.set_texture(0, previous.as_ref());

    if self.test_gl_error(line!()) {
      warn!("GPU errors while creating texture {}", name);
    }

    self.textures.push(texture.clone());
    Some(texture)
  }

  /// Upload an image as a new texture.
  pub fn add_texture(&mut self, name: &str, image: &RgbaImage) -> Option<Texture> {
    let size = UVec2::new(image.width(), image.height());
    self.create_texture(name, size, PixelFormat::Rgba8, Some(image.as_raw()), false)
  }

  /// First texture created with that name.
  pub fn texture(&self, name: &str) -> Option<Texture> {
    self.textures.iter().find(|t| t.name() == name).cloned()
  }

  pub fn texture_count(&self) -> usize {
    self.textures.len()
  }

  /// Delete a texture. Outstanding clones turn dead and bind as no texture.
  pub fn remove_texture(&mut self, texture: &Texture) {
    let Some(index) = self.textures.iter().position(|t| t == texture) else {
      return;
    };

    let texture = self.textures.swap_remove(index);
    self.pipeline.state.remove_texture(&texture);
    self.pipeline.state.raw().delete_texture(texture.handle());
    texture.mark_deleted();
  }

  pub fn remove_all_textures(&mut self) {
    for texture in std::mem::take(&mut self.textures) {
      self.pipeline.state.remove_texture(&texture);
      self.pipeline.state.raw().delete_texture(texture.handle());
      texture.mark_deleted();
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::backend::recording::{GlCall, RecordingGl};
  use crate::backend::TextureHandle;
  use crate::config::DriverConfig;
  use crate::shader::MemoryShaderLoader;

  use super::*;

  fn driver(config: DriverConfig) -> (Driver<RecordingGl>, crate::backend::recording::CallLog) {
    let (gl, log) = RecordingGl::new();
    let driver = Driver::headless(gl, config, Box::new(MemoryShaderLoader::new()));
    log.clear();
    (driver, log)
  }

  #[test]
  fn upload_restores_unit_zero() {
    let (mut driver, log) = driver(DriverConfig::default());

    let first = driver.add_texture("first", &RgbaImage::new(2, 2)).expect("first");
    driver.state_mut().set_texture(0, Some(&first));

    let second = driver.add_texture("second", &RgbaImage::new(4, 2)).expect("second");

    assert_eq!(driver.state().texture(0), Some(&first));
    assert!(log.calls().contains(&GlCall::TexImage2D {
      size: [4, 2],
      format: PixelFormat::Rgba8,
      with_texels: true,
    }));
    assert_eq!(driver.texture("second"), Some(second));
    assert_eq!(driver.texture_count(), 2);
  }

  #[test]
  fn mipmaps_follow_config() {
    let (mut driver, log) = driver(DriverConfig::default().with_create_mipmaps(false));

    let texture = driver.add_texture("flat", &RgbaImage::new(2, 2)).expect("texture");

    assert!(!texture.has_mipmaps());
    assert_eq!(log.count(|c| *c == GlCall::GenerateMipmap), 0);
  }

  #[test]
  fn textures_without_mipmaps_stop_at_the_base_level() {
    let (mut driver, log) = driver(DriverConfig::default().with_create_mipmaps(false));

    driver.add_texture("flat", &RgbaImage::new(2, 2)).expect("texture");
    assert!(log
      .calls()
      .contains(&GlCall::TexParameter(TextureParameter::MaxLevel(0))));

    let (mut driver, log) = self::driver(DriverConfig::default());
    driver.add_texture("mipmapped", &RgbaImage::new(2, 2)).expect("texture");
    assert_eq!(
      log.count(|c| matches!(c, GlCall::TexParameter(TextureParameter::MaxLevel(_)))),
      0
    );
  }

  #[test]
  fn short_texel_buffers_are_rejected() {
    let (mut driver, log) = driver(DriverConfig::default());

    let texels = [0u8; 12];
    let texture = driver.create_texture("short", UVec2::new(2, 2), PixelFormat::Rgba8, Some(&texels), false);

    assert!(texture.is_none());
    assert_eq!(driver.texture_count(), 0);
    assert_eq!(log.count(|c| matches!(c, GlCall::TexImage2D { .. })), 0);
  }

  #[test]
  fn empty_images_are_rejected() {
    let (mut driver, _log) = driver(DriverConfig::default());
    assert!(driver.add_texture("empty", &RgbaImage::new(0, 4)).is_none());
    assert_eq!(driver.texture_count(), 0);
  }

  #[test]
  fn removed_textures_are_dead() {
    let (mut driver, log) = driver(DriverConfig::default());

    let texture = driver.add_texture("t", &RgbaImage::new(2, 2)).expect("texture");
    driver.state_mut().set_texture(1, Some(&texture));
    driver.remove_texture(&texture);

    assert!(!texture.is_alive());
    assert_eq!(driver.state().texture(1), None);
    assert!(log.calls().contains(&GlCall::DeleteTexture(texture.handle())));
    assert_ne!(texture.handle(), TextureHandle::NONE);
  }
}
