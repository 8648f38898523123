//! Material renderers.
//!
//! A material renderer configures the pipeline for one material type. The driver keeps them in a
//! [`MaterialRendererRegistry`], indexed by [`MaterialType`], and drives them through the
//! [`MaterialRenderer`] interface:
//!
//! - [`MaterialRenderer::on_set_material`] when the material of the next draws changes.
//! - [`MaterialRenderer::on_render`] before every single draw, to refresh per-draw uniforms.
//! - [`MaterialRenderer::on_unset_material`] when another renderer takes over.
//!
//! Renderers only see the driver through [`MaterialRendererServices`].

use glam::Mat4;

use crate::backend::{ProgramHandle, UniformLocation, UniformValue};
use crate::blending::{BlendingFactors, Equation, Factor, PackedBlendFunc};
use crate::color::Colorf;
use crate::fog::Fog;
use crate::material::{Material, MaterialType};
use crate::transform::TransformStack;
use crate::vertex::VertexType;

/// What material renderers and shader callbacks can do with the driver.
pub trait MaterialRendererServices {
  /// Apply the render states every material carries (depth, culling, blending, line width…).
  fn set_basic_render_states(&mut self, material: &Material, last_material: &Material, reset_all: bool);

  /// Refresh the sampling states of bound textures from the layers of a material.
  fn set_texture_render_states(&mut self, material: &Material, reset_all: bool);

  fn use_program(&mut self, program: ProgramHandle);

  fn delete_program(&mut self, program: ProgramHandle);

  fn current_program(&self) -> ProgramHandle;

  /// Location of a uniform of the program in use.
  fn uniform_location(&mut self, name: &str) -> Option<UniformLocation>;

  /// Upload a uniform of the program in use. Returns `false` without a location.
  fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) -> bool;

  fn set_blend(&mut self, enabled: bool);

  fn set_blend_func(&mut self, factors: BlendingFactors);

  fn set_blend_equation(&mut self, equation: Equation);

  fn transforms(&self) -> &TransformStack;

  fn fog(&self) -> &Fog;

  fn ambient_light(&self) -> Colorf;

  /// Material of the current draw.
  fn material(&self) -> &Material;
}

/// Pipeline configuration for a material type.
pub trait MaterialRenderer {
  fn on_set_material(
    &mut self,
    material: &Material,
    last_material: &Material,
    reset_all: bool,
    services: &mut dyn MaterialRendererServices,
  );

  fn on_unset_material(&mut self, _services: &mut dyn MaterialRendererServices) {}

  /// Called before each draw. Returns `false` if the draw cannot be rendered.
  fn on_render(&mut self, _services: &mut dyn MaterialRendererServices, _vertex_type: VertexType) -> bool {
    true
  }

  /// Whether materials of that type need a transparent render pass.
  fn is_transparent(&self) -> bool {
    false
  }

  /// Release GPU objects; called once, when the driver goes away.
  fn release(&mut self, _services: &mut dyn MaterialRendererServices) {}
}

/// Lazily resolved uniform locations.
///
/// Locations only exist once a program is linked and in use, so they are looked up on the first
/// upload.
#[derive(Clone, Debug)]
pub enum UniformState<L> {
  Unresolved,
  Ready(L),
}

impl<L> Default for UniformState<L> {
  fn default() -> Self {
    UniformState::Unresolved
  }
}

impl<L> UniformState<L> {
  pub fn resolve<F>(&mut self, lookup: F) -> &L
  where
    F: FnOnce() -> L,
  {
    if let UniformState::Unresolved = self {
      *self = UniformState::Ready(lookup());
    }

    match self {
      UniformState::Ready(locations) => locations,
      UniformState::Unresolved => unreachable!(),
    }
  }

  pub fn is_ready(&self) -> bool {
    matches!(self, UniformState::Ready(_))
  }
}

/// Upload helpers.
pub(crate) fn set_int(services: &mut dyn MaterialRendererServices, location: Option<UniformLocation>, value: i32) {
  services.set_uniform(location, UniformValue::Int(value));
}

pub(crate) fn set_float(services: &mut dyn MaterialRendererServices, location: Option<UniformLocation>, value: f32) {
  services.set_uniform(location, UniformValue::Float(value));
}

pub(crate) fn set_vec4(services: &mut dyn MaterialRendererServices, location: Option<UniformLocation>, value: [f32; 4]) {
  services.set_uniform(location, UniformValue::Vec4(value));
}

pub(crate) fn set_mat4(services: &mut dyn MaterialRendererServices, location: Option<UniformLocation>, value: &Mat4) {
  services.set_uniform(location, UniformValue::Mat4(value.to_cols_array()));
}

/// Uniform upload hook of shader materials.
pub trait ShaderConstantSetCallback {
  /// Called when a material using the shader is set.
  fn on_set_material(&mut self, _material: &Material) {}

  /// Called before each draw, with the program in use.
  fn on_set_constants(&mut self, services: &mut dyn MaterialRendererServices, user_data: i32);
}

/// Blending a shader material applies on top of the material's own blend states.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum BaseBlending {
  #[default]
  None,
  /// Source alpha blending.
  Alpha,
  /// Additive color blending.
  FixedAdd,
  /// Blend function unpacked from `material_type_param`.
  Packed,
}

impl BaseBlending {
  /// Blending of a built-in material type.
  pub fn of(material_type: MaterialType) -> Self {
    match material_type {
      MaterialType::TRANSPARENT_ADD_COLOR => BaseBlending::FixedAdd,
      MaterialType::TRANSPARENT_ALPHA_CHANNEL
      | MaterialType::TRANSPARENT_VERTEX_ALPHA
      | MaterialType::TRANSPARENT_REFLECTION_2_LAYER => BaseBlending::Alpha,
      MaterialType::ONE_TEXTURE_BLEND => BaseBlending::Packed,
      _ => BaseBlending::None,
    }
  }
}

/// Material renderer backed by a shader program.
///
/// A renderer whose program failed to load keeps its slot in the registry and renders nothing
/// meaningful.
pub struct ShaderMaterialRenderer {
  program: ProgramHandle,
  callback: Option<Box<dyn ShaderConstantSetCallback>>,
  blending: BaseBlending,
  user_data: i32,
}

impl ShaderMaterialRenderer {
  pub fn new(
    program: ProgramHandle,
    callback: Option<Box<dyn ShaderConstantSetCallback>>,
    blending: BaseBlending,
    user_data: i32,
  ) -> Self {
    ShaderMaterialRenderer {
      program,
      callback,
      blending,
      user_data,
    }
  }

  pub fn program(&self) -> ProgramHandle {
    self.program
  }

  pub fn blending(&self) -> BaseBlending {
    self.blending
  }

  pub fn user_data(&self) -> i32 {
    self.user_data
  }
}

impl MaterialRenderer for ShaderMaterialRenderer {
  fn on_set_material(
    &mut self,
    material: &Material,
    last_material: &Material,
    reset_all: bool,
    services: &mut dyn MaterialRendererServices,
  ) {
    services.use_program(self.program);
    services.set_basic_render_states(material, last_material, reset_all);

    match self.blending {
      BaseBlending::None => (),

      BaseBlending::Alpha => {
        services.set_blend(true);
        services.set_blend_func(BlendingFactors::alpha());
      }

      BaseBlending::FixedAdd => {
        services.set_blend(true);
        services.set_blend_func(BlendingFactors::new(Factor::One, Factor::SrcColorComplement));
      }

      BaseBlending::Packed => {
        let func = PackedBlendFunc::unpack(material.material_type_param);
        services.set_blend(true);
        services.set_blend_func(func.factors);
      }
    }

    if let Some(callback) = &mut self.callback {
      callback.on_set_material(material);
    }
  }

  fn on_unset_material(&mut self, services: &mut dyn MaterialRendererServices) {
    if self.blending != BaseBlending::None {
      services.set_blend(false);
    }
  }

  fn on_render(&mut self, services: &mut dyn MaterialRendererServices, _: VertexType) -> bool {
    if self.program.is_none() {
      return true;
    }

    services.use_program(self.program);

    if let Some(callback) = &mut self.callback {
      callback.on_set_constants(services, self.user_data);
    }

    true
  }

  fn is_transparent(&self) -> bool {
    self.blending != BaseBlending::None
  }

  fn release(&mut self, services: &mut dyn MaterialRendererServices) {
    if !self.program.is_none() {
      services.delete_program(self.program);
      self.program = ProgramHandle::NONE;
    }
  }
}

struct Registration {
  renderer: Box<dyn MaterialRenderer>,
  name: String,
}

/// Material renderers, indexed by material type.
///
/// Identifiers are dense and never reused: the n-th registered renderer handles
/// `MaterialType(n)` for as long as the registry lives.
#[derive(Default)]
pub struct MaterialRendererRegistry {
  registrations: Vec<Registration>,
  // transparency of each renderer, queried while one of them is borrowed
  transparency: Vec<bool>,
}

impl MaterialRendererRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<R>(&mut self, renderer: R, name: impl Into<String>) -> MaterialType
  where
    R: MaterialRenderer + 'static,
  {
    self.register_boxed(Box::new(renderer), name)
  }

  pub fn register_boxed(&mut self, renderer: Box<dyn MaterialRenderer>, name: impl Into<String>) -> MaterialType {
    let id = MaterialType(self.registrations.len() as u32);

    self.transparency.push(renderer.is_transparent());
    self.registrations.push(Registration {
      renderer,
      name: name.into(),
    });

    id
  }

  pub fn get(&self, id: MaterialType) -> Option<&dyn MaterialRenderer> {
    self.registrations.get(id.index()).map(|r| &*r.renderer)
  }

  pub fn get_mut(&mut self, id: MaterialType) -> Option<&mut (dyn MaterialRenderer + 'static)> {
    self.registrations.get_mut(id.index()).map(|r| &mut *r.renderer)
  }

  pub fn len(&self) -> usize {
    self.registrations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registrations.is_empty()
  }

  pub fn name(&self, id: MaterialType) -> Option<&str> {
    self.registrations.get(id.index()).map(|r| r.name.as_str())
  }

  pub fn is_transparent(&self, id: MaterialType) -> bool {
    self.transparency.get(id.index()).copied().unwrap_or(false)
  }

  pub(crate) fn transparency(&self) -> &[bool] {
    &self.transparency
  }

  /// A renderer along with the transparency table.
  pub(crate) fn split_mut(&mut self, id: MaterialType) -> (Option<&mut (dyn MaterialRenderer + 'static)>, &[bool]) {
    (
      self.registrations.get_mut(id.index()).map(|r| &mut *r.renderer),
      &self.transparency,
    )
  }

  pub(crate) fn drain(&mut self) -> impl Iterator<Item = Box<dyn MaterialRenderer>> + '_ {
    self.transparency.clear();
    self.registrations.drain(..).map(|r| r.renderer)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Nop(bool);

  impl MaterialRenderer for Nop {
    fn on_set_material(&mut self, _: &Material, _: &Material, _: bool, _: &mut dyn MaterialRendererServices) {}

    fn is_transparent(&self) -> bool {
      self.0
    }
  }

  #[test]
  fn ids_are_dense_and_stable() {
    let mut registry = MaterialRendererRegistry::new();

    let a = registry.register(Nop(false), "a");
    let b = registry.register(Nop(true), "b");
    let c = registry.register(Nop(false), "c");

    assert_eq!([a, b, c], [MaterialType(0), MaterialType(1), MaterialType(2)]);
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.name(b), Some("b"));
    assert!(registry.is_transparent(b));
    assert!(!registry.is_transparent(MaterialType(42)));
    assert!(registry.get(MaterialType(3)).is_none());
  }

  #[test]
  fn base_blending_of_builtin_types() {
    assert_eq!(BaseBlending::of(MaterialType::SOLID), BaseBlending::None);
    assert_eq!(BaseBlending::of(MaterialType::TRANSPARENT_ALPHA_CHANNEL_REF), BaseBlending::None);
    assert_eq!(BaseBlending::of(MaterialType::TRANSPARENT_VERTEX_ALPHA), BaseBlending::Alpha);
    assert_eq!(BaseBlending::of(MaterialType::TRANSPARENT_ADD_COLOR), BaseBlending::FixedAdd);
    assert_eq!(BaseBlending::of(MaterialType::ONE_TEXTURE_BLEND), BaseBlending::Packed);
  }

  #[test]
  fn uniform_state_resolves_once() {
    let mut state = UniformState::Unresolved;
    let mut lookups = 0;

    for _ in 0..3 {
      state.resolve(|| {
        lookups += 1;
        7
      });
    }

    assert!(state.is_ready());
    assert_eq!(lookups, 1);
  }
}
