//! Pipeline state shared with material renderers.

use crate::backend::{
  Capabilities, GlApi, MagFilter, MinFilter, ProgramHandle, TextureParameter, TextureTarget,
  UniformLocation, UniformValue,
};
use crate::blending::{BlendingFactors, Equation, PackedBlendFunc};
use crate::color::Colorf;
use crate::depth_test::ZWriteMode;
use crate::face_culling::FaceCullingMode;
use crate::fog::Fog;
use crate::material::{AntiAliasing, Material, MaterialType, MATERIAL_MAX_TEXTURES};
use crate::renderer::MaterialRendererServices;
use crate::state::StateCache;
use crate::texture::SamplerStates;
use crate::transform::TransformStack;

/// GPU state and scene-wide parameters, everything renderers may touch.
pub(crate) struct Pipeline<A> {
  pub(crate) state: StateCache<A>,
  pub(crate) caps: Capabilities,
  pub(crate) transforms: TransformStack,
  pub(crate) fog: Fog,
  pub(crate) ambient_light: Colorf,
  pub(crate) allow_zwrite_on_transparent: bool,
}

impl<A> Pipeline<A>
where
  A: GlApi,
{
  pub(crate) fn new(state: StateCache<A>, allow_zwrite_on_transparent: bool) -> Self {
    let caps = state.api().capabilities();

    Pipeline {
      state,
      caps,
      transforms: TransformStack::default(),
      fog: Fog::default(),
      ambient_light: Colorf::new(0., 0., 0., 0.),
      allow_zwrite_on_transparent,
    }
  }

  /// Whether a material writes depth.
  pub(crate) fn depth_write(&self, material: &Material, transparent: bool) -> bool {
    match material.z_write {
      ZWriteMode::On => true,
      ZWriteMode::Off => false,
      ZWriteMode::Auto => {
        self.allow_zwrite_on_transparent || !(transparent || material.is_alpha_blend_operation())
      }
    }
  }

  pub(crate) fn set_basic_render_states(
    &mut self,
    material: &Material,
    last_material: &Material,
    reset_all: bool,
    transparent: bool,
  ) {
    match material.z_buffer {
      None => self.state.set_depth_test(false),
      Some(comparison) => {
        self.state.set_depth_test(true);
        self.state.set_depth_func(comparison);
      }
    }

    let depth_write = self.depth_write(material, transparent);
    self.state.set_depth_mask(depth_write);

    match FaceCullingMode::from_switches(material.backface_culling, material.frontface_culling) {
      Some(mode) => {
        self.state.set_cull_face(mode);
        self.state.set_cull(true);
      }
      None => self.state.set_cull(false),
    }

    self.state.set_color_mask(material.color_mask);

    match material.blend_operation {
      None => self.state.set_blend(false),
      Some(equation) => {
        self.state.set_blend(true);
        self.state.set_blend_equation(equation);
      }
    }

    // one-texture-blend carries its blend function in the type parameter instead
    if material.blend_factor.to_bits() != 0 && material.material_type != MaterialType::ONE_TEXTURE_BLEND {
      let func = PackedBlendFunc::unpack(material.blend_factor);
      self.state.set_blend_func_separate(func.factors);
    }

    if reset_all || last_material.thickness != material.thickness {
      let [min, max] = self.caps.line_width_range;
      self.state.set_line_width(material.thickness.clamp(min, max.max(min)));
    }

    if reset_all || last_material.anti_aliasing != material.anti_aliasing {
      let alpha_to_coverage = material
        .anti_aliasing
        .contains(AntiAliasing::ALPHA_TO_COVERAGE);
      self.state.set_alpha_to_coverage(alpha_to_coverage);
    }

    self.set_texture_render_states(material, reset_all);
  }

  /// Apply the sampling parameters of the material layers to the bound textures.
  ///
  /// Material equality ignores those parameters, so this runs on every draw; only parameters
  /// differing from what each texture last received are issued.
  pub(crate) fn set_texture_render_states(&mut self, material: &Material, reset_all: bool) {
    let units = self.state.textures().len().min(MATERIAL_MAX_TEXTURES);

    for unit in (0..units).rev() {
      let Some(texture) = self.state.texture(unit as u32).cloned() else {
        continue;
      };

      self.state.set_active_texture(unit as u32);

      let layer = &material.layers[unit];
      let mut cached = texture.sampler_states();

      if reset_all {
        cached.is_cached = false;
      }

      let smooth = layer.bilinear_filter || layer.trilinear_filter;
      let mag_filter = if smooth {
        MagFilter::Linear
      } else {
        MagFilter::Nearest
      };

      let min_filter = if material.use_mipmaps && texture.has_mipmaps() {
        if layer.trilinear_filter {
          MinFilter::LinearMipmapLinear
        } else if layer.bilinear_filter {
          MinFilter::LinearMipmapNearest
        } else {
          MinFilter::NearestMipmapNearest
        }
      } else if smooth {
        MinFilter::Linear
      } else {
        MinFilter::Nearest
      };

      let anisotropy = if layer.anisotropic_filter > 1 {
        self.caps.max_anisotropy.min(layer.anisotropic_filter as f32)
      } else {
        1.
      };

      let wrap_s = layer.wrap_u.wrap();
      let wrap_t = layer.wrap_v.wrap();

      let fresh = !cached.is_cached;
      let target = TextureTarget::Texture2D;
      let api = self.state.raw();

      if fresh || cached.mag_filter != mag_filter {
        api.tex_parameter(target, TextureParameter::MagFilter(mag_filter));
      }

      if fresh || cached.min_filter != min_filter {
        api.tex_parameter(target, TextureParameter::MinFilter(min_filter));
      }

      if self.caps.anisotropic_filter && (fresh || cached.anisotropy != anisotropy) {
        api.tex_parameter(target, TextureParameter::MaxAnisotropy(anisotropy));
      }

      if fresh || cached.wrap_s != wrap_s {
        api.tex_parameter(target, TextureParameter::WrapS(wrap_s));
      }

      if fresh || cached.wrap_t != wrap_t {
        api.tex_parameter(target, TextureParameter::WrapT(wrap_t));
      }

      texture.set_sampler_states(SamplerStates {
        is_cached: true,
        mag_filter,
        min_filter,
        anisotropy,
        wrap_s,
        wrap_t,
      });
    }
  }
}

/// Driver view handed to material renderers.
pub(crate) struct RenderServices<'a, A> {
  pipeline: &'a mut Pipeline<A>,
  material: &'a Material,
  transparency: &'a [bool],
}

impl<'a, A> RenderServices<'a, A> {
  pub(crate) fn new(pipeline: &'a mut Pipeline<A>, material: &'a Material, transparency: &'a [bool]) -> Self {
    RenderServices {
      pipeline,
      material,
      transparency,
    }
  }
}

impl<'a, A> MaterialRendererServices for RenderServices<'a, A>
where
  A: GlApi,
{
  fn set_basic_render_states(&mut self, material: &Material, last_material: &Material, reset_all: bool) {
    let transparent = self
      .transparency
      .get(material.material_type.index())
      .copied()
      .unwrap_or(false);

    self
      .pipeline
      .set_basic_render_states(material, last_material, reset_all, transparent);
  }

  fn set_texture_render_states(&mut self, material: &Material, reset_all: bool) {
    self.pipeline.set_texture_render_states(material, reset_all);
  }

  fn use_program(&mut self, program: ProgramHandle) {
    self.pipeline.state.use_program(program);
  }

  fn delete_program(&mut self, program: ProgramHandle) {
    self.pipeline.state.delete_program(program);
  }

  fn current_program(&self) -> ProgramHandle {
    self.pipeline.state.current_program()
  }

  fn uniform_location(&mut self, name: &str) -> Option<UniformLocation> {
    let program = self.pipeline.state.current_program();

    if program.is_none() {
      return None;
    }

    self.pipeline.state.raw().uniform_location(program, name)
  }

  fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) -> bool {
    match location {
      Some(location) => {
        self.pipeline.state.raw().uniform(location, value);
        true
      }
      None => false,
    }
  }

  fn set_blend(&mut self, enabled: bool) {
    self.pipeline.state.set_blend(enabled);
  }

  fn set_blend_func(&mut self, factors: BlendingFactors) {
    self.pipeline.state.set_blend_func_separate(factors);
  }

  fn set_blend_equation(&mut self, equation: Equation) {
    self.pipeline.state.set_blend_equation(equation);
  }

  fn transforms(&self) -> &TransformStack {
    &self.pipeline.transforms
  }

  fn fog(&self) -> &Fog {
    &self.pipeline.fog
  }

  fn ambient_light(&self) -> Colorf {
    self.pipeline.ambient_light
  }

  fn material(&self) -> &Material {
    self.material
  }
}
