//! 2D / 3D render-state machine.

use glam::Mat4;

use crate::backend::GlApi;
use crate::blending::{BlendingFactors, Equation};
use crate::depth_test::ZWriteMode;
use crate::material::{Material, MaterialType};
use crate::renderer::MaterialRenderer;
use crate::texture::Texture;
use crate::transform::TransformState;
use crate::vertex::VertexType;

use super::pipeline::RenderServices;
use super::{Active2D, Driver};

/// Broad rendering configuration last applied.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum RenderMode {
  /// Nothing drawn yet.
  #[default]
  None,
  TwoD,
  ThreeD,
}

impl<A> Driver<A>
where
  A: GlApi,
{
  /// Make the current material's render states current for a 3D draw.
  pub fn set_render_states_3d_mode(&mut self, vertex_type: VertexType) {
    if self.render_mode != RenderMode::ThreeD {
      self.pipeline.state.set_blend(false);
      self.pipeline.state.set_blend_func_separate(BlendingFactors::alpha());
      self.reset_render_states = true;
    }

    if self.reset_render_states || self.last_material != self.material {
      let active_2d = match self.render_mode {
        RenderMode::TwoD => self.active_2d.take(),
        _ => None,
      };

      if let Some(active) = active_2d {
        self.unset_renderer_2d(active);
      } else if self.last_material.material_type != self.material.material_type {
        self.unset_material_renderer(self.last_material.material_type);
      }

      let (renderer, transparency) = self.renderers.split_mut(self.material.material_type);

      if let Some(renderer) = renderer {
        let mut services = RenderServices::new(&mut self.pipeline, &self.material, transparency);
        renderer.on_set_material(
          &self.material,
          &self.last_material,
          self.reset_render_states,
          &mut services,
        );
      }

      self.last_material = self.material.clone();
      self.pipeline.state.correct_cache_material(&mut self.last_material);
      self.reset_render_states = false;
    }

    self.pipeline.set_texture_render_states(&self.material, false);

    let (renderer, transparency) = self.renderers.split_mut(self.material.material_type);

    if let Some(renderer) = renderer {
      let mut services = RenderServices::new(&mut self.pipeline, &self.material, transparency);
      renderer.on_render(&mut services, vertex_type);
    }

    self.render_mode = RenderMode::ThreeD;
  }

  /// Make 2D render states current.
  ///
  /// `alpha` requests blending for translucent colors, `texture` selects the textured 2D renderer
  /// and `alpha_channel` blends with the alpha channel of the texture.
  pub fn set_render_states_2d_mode(&mut self, alpha: bool, texture: bool, alpha_channel: bool) {
    let next = if texture {
      Active2D::Texture
    } else {
      Active2D::NoTexture
    };

    if self.render_mode != RenderMode::TwoD {
      if self.render_mode == RenderMode::ThreeD {
        self.unset_material_renderer(self.last_material.material_type);
      }

      self.render_mode = RenderMode::TwoD;
    } else if let Some(active) = self.active_2d {
      if active != next {
        self.unset_renderer_2d(active);
      }
    }

    self.active_2d = Some(next);

    {
      let renderer = &mut self.renderers_2d[next as usize];
      let mut services = RenderServices::new(&mut self.pipeline, &self.material, self.renderers.transparency());
      renderer.on_set_material(&self.material, &self.last_material, true, &mut services);
    }

    self.last_material = self.material.clone();
    self.pipeline.state.correct_cache_material(&mut self.last_material);

    let state = &mut self.pipeline.state;

    if alpha || (alpha_channel && texture) {
      state.set_blend(true);
      state.set_blend_func_separate(BlendingFactors::alpha());
      state.set_blend_equation(Equation::Additive);
    } else {
      state.set_blend(false);
    }

    let bound = state.texture(0).cloned();
    self.material.set_texture(0, bound);
    self
      .pipeline
      .transforms
      .set(TransformState::Texture(0), Mat4::IDENTITY);

    if texture {
      let material = if self.override_material_2d_enabled {
        &self.override_material_2d
      } else {
        &self.init_material_2d
      };

      self.pipeline.set_texture_render_states(material, false);
    }

    let renderer = &mut self.renderers_2d[next as usize];
    let mut services = RenderServices::new(&mut self.pipeline, &self.material, self.renderers.transparency());
    renderer.on_render(&mut services, VertexType::Image2D);
  }

  /// Apply the render states of a material, leaving renderer selection alone.
  pub fn set_basic_render_states(&mut self, material: &Material, last_material: &Material, reset_all: bool) {
    let transparent = self.renderers.is_transparent(material.material_type);
    self
      .pipeline
      .set_basic_render_states(material, last_material, reset_all, transparent);
  }

  /// Apply the sampling states of the material layers to the bound textures.
  pub fn set_texture_render_states(&mut self, material: &Material, reset_all: bool) {
    self.pipeline.set_texture_render_states(material, reset_all);
  }

  /// Material the 2D draws start from: the init 2D material, or the override one when enabled.
  pub(crate) fn choose_material_2d(&mut self) {
    self.material = if self.override_material_2d_enabled {
      let material = &mut self.override_material_2d;
      material.lighting = false;
      material.z_write = ZWriteMode::Off;
      material.z_buffer = None;
      material.clone()
    } else {
      self.init_material_2d.clone()
    };
  }

  /// Set a layer of the current material and bind its texture.
  pub(crate) fn set_material_texture(&mut self, layer: usize, texture: Option<&Texture>) -> bool {
    self.material.set_texture(layer, texture.cloned());
    self.pipeline.state.set_texture(layer as u32, texture)
  }

  fn unset_material_renderer(&mut self, id: MaterialType) {
    let (renderer, transparency) = self.renderers.split_mut(id);

    if let Some(renderer) = renderer {
      let mut services = RenderServices::new(&mut self.pipeline, &self.material, transparency);
      renderer.on_unset_material(&mut services);
    }
  }

  fn unset_renderer_2d(&mut self, which: Active2D) {
    let renderer = &mut self.renderers_2d[which as usize];
    let mut services = RenderServices::new(&mut self.pipeline, &self.material, self.renderers.transparency());
    renderer.on_unset_material(&mut services);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::recording::{GlCall, RecordingGl};
  use crate::backend::Capability;
  use crate::config::DriverConfig;
  use crate::shader::MemoryShaderLoader;

  fn driver() -> (Driver<RecordingGl>, crate::backend::recording::CallLog) {
    let (gl, log) = RecordingGl::new();
    let driver = Driver::headless(gl, DriverConfig::default(), Box::new(MemoryShaderLoader::new()));
    log.clear();
    (driver, log)
  }

  #[test]
  fn starts_in_3d_with_a_pending_reset() {
    let (driver, _log) = driver();
    assert_eq!(driver.render_mode(), RenderMode::ThreeD);
    assert!(driver.reset_render_states);
  }

  #[test]
  fn switching_to_2d_and_back() {
    let (mut driver, log) = driver();

    driver.set_render_states_2d_mode(true, false, false);
    assert_eq!(driver.render_mode(), RenderMode::TwoD);
    assert_eq!(driver.active_2d, Some(Active2D::NoTexture));
    assert!(log.calls().contains(&GlCall::Enable(Capability::Blend)));

    driver.set_render_states_3d_mode(VertexType::Standard);
    assert_eq!(driver.render_mode(), RenderMode::ThreeD);
    assert_eq!(driver.active_2d, None);
    assert!(!driver.reset_render_states);
    assert_eq!(driver.pipeline.state.blend(), Some(false));
  }

  #[test]
  fn alpha_channel_needs_a_texture() {
    let (mut driver, _log) = driver();

    driver.set_render_states_2d_mode(false, false, true);
    assert_eq!(driver.pipeline.state.blend(), Some(false));
  }
}
