//! Fixed-function emulation.
//!
//! The legacy material families (solid, two layers, lightmaps, reflections, one-texture-blend) are
//! all drawn with the same draw path; what differs is the GLSL program and the uniforms it
//! expects. Each family gets a [`ShaderConstantSetCallback`] capturing what it needs from the
//! material when it is set, and uploading uniforms on every render.
//!
//! Every family shares [`BaseCallback`]: matrices, material colors, fog and thickness.

use crate::backend::UniformLocation;
use crate::blending::PackedBlendFunc;
use crate::color::Colorf;
use crate::material::Material;
use crate::renderer::{
  set_float, set_int, set_mat4, set_vec4, MaterialRendererServices, ShaderConstantSetCallback,
  UniformState,
};
use crate::transform::TransformState;

fn locate(services: &mut dyn MaterialRendererServices, name: &str) -> Option<UniformLocation> {
  services.uniform_location(name)
}

fn texture_usage(material: &Material, layer: usize) -> i32 {
  material.texture(layer).is_some() as i32
}

#[derive(Clone, Copy, Debug)]
struct BaseLocations {
  wvp: Option<UniformLocation>,
  wv: Option<UniformLocation>,
  normal: Option<UniformLocation>,
  global_ambient: Option<UniformLocation>,
  ambient: Option<UniformLocation>,
  diffuse: Option<UniformLocation>,
  emissive: Option<UniformLocation>,
  specular: Option<UniformLocation>,
  shininess: Option<UniformLocation>,
  fog_enable: Option<UniformLocation>,
  fog_type: Option<UniformLocation>,
  fog_color: Option<UniformLocation>,
  fog_start: Option<UniformLocation>,
  fog_end: Option<UniformLocation>,
  fog_density: Option<UniformLocation>,
  thickness: Option<UniformLocation>,
}

impl BaseLocations {
  fn lookup(services: &mut dyn MaterialRendererServices) -> Self {
    BaseLocations {
      wvp: locate(services, "uWVPMatrix"),
      wv: locate(services, "uWVMatrix"),
      normal: locate(services, "uNMatrix"),
      global_ambient: locate(services, "uGlobalAmbient"),
      ambient: locate(services, "uMaterialAmbient"),
      diffuse: locate(services, "uMaterialDiffuse"),
      emissive: locate(services, "uMaterialEmissive"),
      specular: locate(services, "uMaterialSpecular"),
      shininess: locate(services, "uMaterialShininess"),
      fog_enable: locate(services, "uFogEnable"),
      fog_type: locate(services, "uFogType"),
      fog_color: locate(services, "uFogColor"),
      fog_start: locate(services, "uFogStart"),
      fog_end: locate(services, "uFogEnd"),
      fog_density: locate(services, "uFogDensity"),
      thickness: locate(services, "uThickness"),
    }
  }
}

/// Uniforms shared by every fixed-function family.
#[derive(Debug)]
pub struct BaseCallback {
  locations: UniformState<BaseLocations>,
  // transform generation of the last matrix upload
  uploaded_generation: Option<u64>,
  lighting: bool,
  ambient: Colorf,
  diffuse: Colorf,
  emissive: Colorf,
  specular: Colorf,
  shininess: f32,
  fog_enable: bool,
  thickness: f32,
}

impl Default for BaseCallback {
  fn default() -> Self {
    let black = Colorf::new(0., 0., 0., 0.);

    BaseCallback {
      locations: UniformState::Unresolved,
      uploaded_generation: None,
      lighting: false,
      ambient: black,
      diffuse: black,
      emissive: black,
      specular: black,
      shininess: 0.,
      fog_enable: false,
      thickness: 1.,
    }
  }
}

impl BaseCallback {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on_set_material(&mut self, material: &Material) {
    self.lighting = material.lighting;
    self.ambient = material.ambient_color.into();
    self.diffuse = material.diffuse_color.into();
    self.emissive = material.emissive_color.into();
    self.specular = material.specular_color.into();
    self.shininess = material.shininess;
    self.fog_enable = material.fog_enable;
    self.thickness = if material.thickness > 0. {
      material.thickness
    } else {
      1.
    };
  }

  /// Upload the shared uniforms. Returns whether the transforms changed since the last upload, in
  /// which case families must upload their texture matrices too.
  pub fn on_set_constants(&mut self, services: &mut dyn MaterialRendererServices) -> bool {
    let loc = *self.locations.resolve(|| BaseLocations::lookup(services));

    let generation = services.transforms().generation();
    let transforms_changed = self.uploaded_generation != Some(generation);

    if transforms_changed {
      let transforms = services.transforms();
      let wvp = transforms.world_view_projection();
      let wv = transforms.world_view();
      let normal = transforms.normal_matrix();

      set_mat4(services, loc.wvp, &wvp);
      set_mat4(services, loc.wv, &wv);
      set_mat4(services, loc.normal, &normal);

      self.uploaded_generation = Some(generation);
    }

    if self.lighting {
      let global_ambient = services.ambient_light();

      set_vec4(services, loc.global_ambient, global_ambient.to_array());
      set_vec4(services, loc.ambient, self.ambient.to_array());
      set_vec4(services, loc.diffuse, self.diffuse.to_array());
      set_vec4(services, loc.emissive, self.emissive.to_array());
      set_vec4(services, loc.specular, self.specular.to_array());
      set_float(services, loc.shininess, self.shininess);
    }

    set_int(services, loc.fog_enable, self.fog_enable as i32);

    if self.fog_enable {
      let fog = *services.fog();

      set_int(services, loc.fog_type, fog.fog_type as i32);
      set_vec4(services, loc.fog_color, Colorf::from(fog.color).to_array());
      set_float(services, loc.fog_start, fog.start);
      set_float(services, loc.fog_end, fog.end);
      set_float(services, loc.fog_density, fog.density);
    }

    set_float(services, loc.thickness, self.thickness);

    transforms_changed
  }
}

fn upload_texture_matrix(services: &mut dyn MaterialRendererServices, location: Option<UniformLocation>, layer: u8) {
  let matrix = services.transforms().get(TransformState::Texture(layer));
  set_mat4(services, location, &matrix);
}

#[derive(Clone, Copy, Debug)]
struct SolidLocations {
  texture_matrix0: Option<UniformLocation>,
  alpha_ref: Option<UniformLocation>,
  texture_usage0: Option<UniformLocation>,
  texture_unit0: Option<UniformLocation>,
}

/// Solid, transparent add color, transparent alpha channel (with or without reference) and
/// transparent vertex alpha.
#[derive(Debug)]
pub struct SolidCallback {
  base: BaseCallback,
  locations: UniformState<SolidLocations>,
  alpha_ref: f32,
  texture_usage0: i32,
}

impl Default for SolidCallback {
  fn default() -> Self {
    SolidCallback {
      base: BaseCallback::new(),
      locations: UniformState::Unresolved,
      alpha_ref: 0.5,
      texture_usage0: 0,
    }
  }
}

impl SolidCallback {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ShaderConstantSetCallback for SolidCallback {
  fn on_set_material(&mut self, material: &Material) {
    self.base.on_set_material(material);
    self.alpha_ref = material.material_type_param;
    self.texture_usage0 = texture_usage(material, 0);
  }

  fn on_set_constants(&mut self, services: &mut dyn MaterialRendererServices, _: i32) {
    let transforms_changed = self.base.on_set_constants(services);

    let loc = *self.locations.resolve(|| SolidLocations {
      texture_matrix0: locate(services, "uTMatrix0"),
      alpha_ref: locate(services, "uAlphaRef"),
      texture_usage0: locate(services, "uTextureUsage0"),
      texture_unit0: locate(services, "uTextureUnit0"),
    });

    if transforms_changed {
      upload_texture_matrix(services, loc.texture_matrix0, 0);
    }

    set_float(services, loc.alpha_ref, self.alpha_ref);
    set_int(services, loc.texture_usage0, self.texture_usage0);
    set_int(services, loc.texture_unit0, 0);
  }
}

#[derive(Clone, Copy, Debug)]
struct TwoLayerLocations {
  texture_matrix0: Option<UniformLocation>,
  texture_matrix1: Option<UniformLocation>,
  texture_usage0: Option<UniformLocation>,
  texture_usage1: Option<UniformLocation>,
  texture_unit0: Option<UniformLocation>,
  texture_unit1: Option<UniformLocation>,
}

impl TwoLayerLocations {
  fn lookup(services: &mut dyn MaterialRendererServices) -> Self {
    TwoLayerLocations {
      texture_matrix0: locate(services, "uTMatrix0"),
      texture_matrix1: locate(services, "uTMatrix1"),
      texture_usage0: locate(services, "uTextureUsage0"),
      texture_usage1: locate(services, "uTextureUsage1"),
      texture_unit0: locate(services, "uTextureUnit0"),
      texture_unit1: locate(services, "uTextureUnit1"),
    }
  }

  fn upload(&self, services: &mut dyn MaterialRendererServices, usage: [i32; 2]) {
    set_int(services, self.texture_usage0, usage[0]);
    set_int(services, self.texture_usage1, usage[1]);
    set_int(services, self.texture_unit0, 0);
    set_int(services, self.texture_unit1, 1);
  }
}

/// Solid two layers and detail map.
#[derive(Debug, Default)]
pub struct Solid2LayerCallback {
  base: BaseCallback,
  locations: UniformState<TwoLayerLocations>,
  texture_usage: [i32; 2],
}

impl Solid2LayerCallback {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ShaderConstantSetCallback for Solid2LayerCallback {
  fn on_set_material(&mut self, material: &Material) {
    self.base.on_set_material(material);
    self.texture_usage = [texture_usage(material, 0), texture_usage(material, 1)];
  }

  fn on_set_constants(&mut self, services: &mut dyn MaterialRendererServices, _: i32) {
    let transforms_changed = self.base.on_set_constants(services);
    let loc = *self.locations.resolve(|| TwoLayerLocations::lookup(services));

    if transforms_changed {
      upload_texture_matrix(services, loc.texture_matrix0, 0);
      upload_texture_matrix(services, loc.texture_matrix1, 1);
    }

    loc.upload(services, self.texture_usage);
  }
}

/// Lightmap family: modulation of the lightmap layer by 1, 2 or 4.
#[derive(Debug)]
pub struct LightmapCallback {
  base: BaseCallback,
  locations: UniformState<(TwoLayerLocations, Option<UniformLocation>)>,
  modulate: f32,
  texture_usage: [i32; 2],
}

impl LightmapCallback {
  pub fn new(modulate: f32) -> Self {
    LightmapCallback {
      base: BaseCallback::new(),
      locations: UniformState::Unresolved,
      modulate,
      texture_usage: [0; 2],
    }
  }

  pub fn modulate(&self) -> f32 {
    self.modulate
  }
}

impl ShaderConstantSetCallback for LightmapCallback {
  fn on_set_material(&mut self, material: &Material) {
    self.base.on_set_material(material);
    self.texture_usage = [texture_usage(material, 0), texture_usage(material, 1)];
  }

  fn on_set_constants(&mut self, services: &mut dyn MaterialRendererServices, _: i32) {
    let transforms_changed = self.base.on_set_constants(services);
    let (loc, modulate) = *self.locations.resolve(|| {
      let layers = TwoLayerLocations::lookup(services);
      (layers, locate(services, "uModulate"))
    });

    if transforms_changed {
      upload_texture_matrix(services, loc.texture_matrix0, 0);
      upload_texture_matrix(services, loc.texture_matrix1, 1);
    }

    set_float(services, modulate, self.modulate);
    loc.upload(services, self.texture_usage);
  }
}

/// Sphere map, reflection two layers and its transparent variant. Only the first layer has a
/// texture matrix; the reflection layer coordinates are generated.
#[derive(Debug, Default)]
pub struct ReflectionCallback {
  base: BaseCallback,
  locations: UniformState<TwoLayerLocations>,
  texture_usage: [i32; 2],
}

impl ReflectionCallback {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ShaderConstantSetCallback for ReflectionCallback {
  fn on_set_material(&mut self, material: &Material) {
    self.base.on_set_material(material);
    self.texture_usage = [texture_usage(material, 0), texture_usage(material, 1)];
  }

  fn on_set_constants(&mut self, services: &mut dyn MaterialRendererServices, _: i32) {
    let transforms_changed = self.base.on_set_constants(services);
    let loc = *self.locations.resolve(|| TwoLayerLocations::lookup(services));

    if transforms_changed {
      upload_texture_matrix(services, loc.texture_matrix0, 0);
    }

    loc.upload(services, self.texture_usage);
  }
}

#[derive(Clone, Copy, Debug)]
struct OneTextureBlendLocations {
  texture_matrix0: Option<UniformLocation>,
  blend_type: Option<UniformLocation>,
  texture_usage0: Option<UniformLocation>,
  texture_unit0: Option<UniformLocation>,
}

/// One-texture-blend: blend function packed in `material_type_param`.
#[derive(Debug, Default)]
pub struct OneTextureBlendCallback {
  base: BaseCallback,
  locations: UniformState<OneTextureBlendLocations>,
  blend_type: i32,
  texture_usage0: i32,
}

impl OneTextureBlendCallback {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ShaderConstantSetCallback for OneTextureBlendCallback {
  fn on_set_material(&mut self, material: &Material) {
    self.base.on_set_material(material);
    self.blend_type = PackedBlendFunc::unpack(material.material_type_param).blend_type() as i32;
    self.texture_usage0 = texture_usage(material, 0);
  }

  fn on_set_constants(&mut self, services: &mut dyn MaterialRendererServices, _: i32) {
    let transforms_changed = self.base.on_set_constants(services);

    let loc = *self.locations.resolve(|| OneTextureBlendLocations {
      texture_matrix0: locate(services, "uTMatrix0"),
      blend_type: locate(services, "uBlendType"),
      texture_usage0: locate(services, "uTextureUsage0"),
      texture_unit0: locate(services, "uTextureUnit0"),
    });

    if transforms_changed {
      upload_texture_matrix(services, loc.texture_matrix0, 0);
    }

    set_int(services, loc.blend_type, self.blend_type);
    set_int(services, loc.texture_usage0, self.texture_usage0);
    set_int(services, loc.texture_unit0, 0);
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use glam::{Mat4, Vec3};

  use super::*;
  use crate::backend::{ProgramHandle, UniformValue};
  use crate::blending::{AlphaSource, BlendingFactors, Equation, Factor, Modulate};
  use crate::fog::Fog;
  use crate::transform::TransformStack;

  #[derive(Default)]
  struct FakeServices {
    transforms: TransformStack,
    fog: Fog,
    material: Material,
    names: HashMap<String, i32>,
    uploads: Vec<(String, UniformValue)>,
  }

  impl FakeServices {
    fn uploads_of(&self, name: &str) -> Vec<UniformValue> {
      self
        .uploads
        .iter()
        .filter(|(n, _)| n == name)
        .map(|(_, v)| *v)
        .collect()
    }
  }

  impl MaterialRendererServices for FakeServices {
    fn set_basic_render_states(&mut self, _: &Material, _: &Material, _: bool) {}

    fn set_texture_render_states(&mut self, _: &Material, _: bool) {}

    fn use_program(&mut self, _: ProgramHandle) {}

    fn delete_program(&mut self, _: ProgramHandle) {}

    fn current_program(&self) -> ProgramHandle {
      ProgramHandle(1)
    }

    fn uniform_location(&mut self, name: &str) -> Option<UniformLocation> {
      let next = self.names.len() as i32;
      Some(UniformLocation(*self.names.entry(name.to_owned()).or_insert(next)))
    }

    fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) -> bool {
      let Some(location) = location else {
        return false;
      };

      let name = self
        .names
        .iter()
        .find(|(_, l)| **l == location.0)
        .map(|(n, _)| n.clone())
        .unwrap_or_default();
      self.uploads.push((name, value));
      true
    }

    fn set_blend(&mut self, _: bool) {}

    fn set_blend_func(&mut self, _: BlendingFactors) {}

    fn set_blend_equation(&mut self, _: Equation) {}

    fn transforms(&self) -> &TransformStack {
      &self.transforms
    }

    fn fog(&self) -> &Fog {
      &self.fog
    }

    fn ambient_light(&self) -> Colorf {
      Colorf::new(0.1, 0.1, 0.1, 1.)
    }

    fn material(&self) -> &Material {
      &self.material
    }
  }

  #[test]
  fn matrices_follow_transform_generation() {
    let mut services = FakeServices::default();
    let mut cb = SolidCallback::new();

    cb.on_set_material(&Material::default());
    cb.on_set_constants(&mut services, 0);
    cb.on_set_constants(&mut services, 0);
    assert_eq!(services.uploads_of("uWVPMatrix").len(), 1);
    assert_eq!(services.uploads_of("uTMatrix0").len(), 1);

    services
      .transforms
      .set(TransformState::World, Mat4::from_translation(Vec3::X));
    cb.on_set_constants(&mut services, 0);
    assert_eq!(services.uploads_of("uWVPMatrix").len(), 2);

    // scalars go up on every render
    assert_eq!(services.uploads_of("uThickness").len(), 3);
    assert_eq!(services.uploads_of("uTextureUnit0").len(), 3);
  }

  #[test]
  fn fog_parameters_only_with_fog() {
    let mut services = FakeServices::default();
    let mut cb = Solid2LayerCallback::new();

    cb.on_set_material(&Material::default());
    cb.on_set_constants(&mut services, 0);
    assert_eq!(services.uploads_of("uFogEnable"), [UniformValue::Int(0)]);
    assert!(services.uploads_of("uFogStart").is_empty());

    cb.on_set_material(&Material {
      fog_enable: true,
      ..Material::default()
    });
    cb.on_set_constants(&mut services, 0);
    assert_eq!(services.uploads_of("uFogStart"), [UniformValue::Float(50.)]);
    assert_eq!(services.uploads_of("uFogType"), [UniformValue::Int(1)]);
  }

  #[test]
  fn material_colors_only_with_lighting() {
    let mut services = FakeServices::default();
    let mut cb = ReflectionCallback::new();

    cb.on_set_material(&Material {
      lighting: false,
      ..Material::default()
    });
    cb.on_set_constants(&mut services, 0);
    assert!(services.uploads_of("uMaterialDiffuse").is_empty());

    cb.on_set_material(&Material::default());
    cb.on_set_constants(&mut services, 0);
    assert_eq!(services.uploads_of("uMaterialDiffuse"), [UniformValue::Vec4([1.; 4])]);
    assert!(services.uploads_of("uTMatrix1").is_empty());
  }

  #[test]
  fn thickness_defaults_to_one() {
    let mut services = FakeServices::default();
    let mut cb = LightmapCallback::new(2.);

    cb.on_set_material(&Material {
      thickness: 0.,
      ..Material::default()
    });
    cb.on_set_constants(&mut services, 0);

    assert_eq!(services.uploads_of("uThickness"), [UniformValue::Float(1.)]);
    assert_eq!(services.uploads_of("uModulate"), [UniformValue::Float(2.)]);
  }

  #[test]
  fn blend_type_from_packed_param() {
    let mut services = FakeServices::default();
    let mut cb = OneTextureBlendCallback::new();

    let material = Material {
      material_type_param: PackedBlendFunc::new(
        Factor::SrcAlpha,
        Factor::SrcAlphaComplement,
        Modulate::X1,
        AlphaSource::TEXTURE,
      )
      .pack(),
      ..Material::default()
    };

    cb.on_set_material(&material);
    cb.on_set_constants(&mut services, 0);

    assert_eq!(services.uploads_of("uBlendType"), [UniformValue::Int(2)]);
    assert_eq!(services.uploads_of("uTextureUsage0"), [UniformValue::Int(0)]);
  }
}
