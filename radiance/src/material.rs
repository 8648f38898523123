//! Materials.
//!
//! A [`Material`] is a plain value describing how a batch of geometry is rendered: which
//! material renderer handles it, which textures are bound in which layer, and the fixed render
//! states (blending, depth, culling, fog, line thickness…).
//!
//! Materials are compared by value to decide whether the renderer set/unset sequence has to run.
//! That comparison deliberately ignores the sampling parameters of texture layers (filters,
//! anisotropy, wrap modes), which are refreshed on every draw instead.

use bitflags::bitflags;
use glam::Mat4;

use crate::backend::ColorMask;
use crate::blending::{Equation, PackedBlendFunc};
use crate::color::Color;
use crate::depth_test::{DepthComparison, ZWriteMode};
use crate::texture::{Texture, TextureClamp};

/// Number of texture layers of a material.
pub const MATERIAL_MAX_TEXTURES: usize = 4;

/// Material type identifier, indexing the material renderer registry.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MaterialType(pub u32);

impl MaterialType {
  pub const SOLID: Self = MaterialType(0);
  pub const SOLID_2_LAYER: Self = MaterialType(1);
  pub const LIGHTMAP: Self = MaterialType(2);
  pub const LIGHTMAP_ADD: Self = MaterialType(3);
  pub const LIGHTMAP_M2: Self = MaterialType(4);
  pub const LIGHTMAP_M4: Self = MaterialType(5);
  pub const LIGHTMAP_LIGHTING: Self = MaterialType(6);
  pub const LIGHTMAP_LIGHTING_M2: Self = MaterialType(7);
  pub const LIGHTMAP_LIGHTING_M4: Self = MaterialType(8);
  pub const DETAIL_MAP: Self = MaterialType(9);
  pub const SPHERE_MAP: Self = MaterialType(10);
  pub const REFLECTION_2_LAYER: Self = MaterialType(11);
  pub const TRANSPARENT_ADD_COLOR: Self = MaterialType(12);
  pub const TRANSPARENT_ALPHA_CHANNEL: Self = MaterialType(13);
  pub const TRANSPARENT_ALPHA_CHANNEL_REF: Self = MaterialType(14);
  pub const TRANSPARENT_VERTEX_ALPHA: Self = MaterialType(15);
  pub const TRANSPARENT_REFLECTION_2_LAYER: Self = MaterialType(16);
  pub const ONE_TEXTURE_BLEND: Self = MaterialType(17);

  /// Number of built-in material types. Custom renderers get ids from there on.
  pub const BUILTIN_COUNT: u32 = 18;

  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl Default for MaterialType {
  fn default() -> Self {
    MaterialType::SOLID
  }
}

bitflags! {
  /// Antialiasing features enabled by a material.
  #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
  pub struct AntiAliasing: u8 {
    const SIMPLE = 1;
    const LINE_SMOOTH = 4;
    const ALPHA_TO_COVERAGE = 16;
  }
}

/// One texture layer of a material.
#[derive(Clone, Debug)]
pub struct TextureLayer {
  pub texture: Option<Texture>,
  pub bilinear_filter: bool,
  pub trilinear_filter: bool,
  /// Maximal anisotropy; 0 or 1 disables anisotropic filtering.
  pub anisotropic_filter: u8,
  pub wrap_u: TextureClamp,
  pub wrap_v: TextureClamp,
  /// Texture coordinate transform.
  pub matrix: Mat4,
}

impl Default for TextureLayer {
  fn default() -> Self {
    TextureLayer {
      texture: None,
      bilinear_filter: true,
      trilinear_filter: false,
      anisotropic_filter: 0,
      wrap_u: TextureClamp::Repeat,
      wrap_v: TextureClamp::Repeat,
      matrix: Mat4::IDENTITY,
    }
  }
}

impl TextureLayer {
  // sampling parameters left out on purpose
  fn same_binding(&self, other: &Self) -> bool {
    self.texture == other.texture && self.matrix == other.matrix
  }
}

/// Rendering configuration of a draw.
#[derive(Clone, Debug)]
pub struct Material {
  pub material_type: MaterialType,
  pub ambient_color: Color,
  pub diffuse_color: Color,
  pub emissive_color: Color,
  pub specular_color: Color,
  pub shininess: f32,
  /// Alpha reference for alpha-tested types, packed blend function for one-texture-blend.
  pub material_type_param: f32,
  pub material_type_param2: f32,
  /// Line and point size.
  pub thickness: f32,
  /// Depth comparison; `None` disables the depth test.
  pub z_buffer: Option<DepthComparison>,
  pub z_write: ZWriteMode,
  pub color_mask: ColorMask,
  /// Blend equation; `None` disables blending.
  pub blend_operation: Option<Equation>,
  /// Packed blend function (see [`PackedBlendFunc`]); 0 leaves the renderer's blend function.
  pub blend_factor: f32,
  pub anti_aliasing: AntiAliasing,
  pub backface_culling: bool,
  pub frontface_culling: bool,
  pub fog_enable: bool,
  pub lighting: bool,
  pub wireframe: bool,
  pub point_cloud: bool,
  pub use_mipmaps: bool,
  pub layers: [TextureLayer; MATERIAL_MAX_TEXTURES],
}

impl Default for Material {
  fn default() -> Self {
    Material {
      material_type: MaterialType::SOLID,
      ambient_color: Color::WHITE,
      diffuse_color: Color::WHITE,
      emissive_color: Color::BLACK,
      specular_color: Color::WHITE,
      shininess: 0.,
      material_type_param: 0.,
      material_type_param2: 0.,
      thickness: 1.,
      z_buffer: Some(DepthComparison::LessOrEqual),
      z_write: ZWriteMode::Auto,
      color_mask: ColorMask::all(),
      blend_operation: None,
      blend_factor: 0.,
      anti_aliasing: AntiAliasing::SIMPLE,
      backface_culling: true,
      frontface_culling: false,
      fog_enable: false,
      lighting: true,
      wireframe: false,
      point_cloud: false,
      use_mipmaps: true,
      layers: Default::default(),
    }
  }
}

impl Material {
  /// Material used for 2D drawing: unlit, no depth test or write, no mipmaps, no filtering.
  pub fn default_2d() -> Self {
    let mut material = Material {
      anti_aliasing: AntiAliasing::empty(),
      lighting: false,
      z_write: ZWriteMode::Off,
      z_buffer: None,
      use_mipmaps: false,
      ..Material::default()
    };

    for layer in &mut material.layers {
      layer.bilinear_filter = false;
      layer.wrap_u = TextureClamp::Repeat;
      layer.wrap_v = TextureClamp::Repeat;
    }

    material
  }

  pub fn texture(&self, layer: usize) -> Option<&Texture> {
    self.layers.get(layer).and_then(|l| l.texture.as_ref())
  }

  pub fn set_texture(&mut self, layer: usize, texture: Option<Texture>) {
    if let Some(l) = self.layers.get_mut(layer) {
      l.texture = texture;
    }
  }

  pub fn with_texture(mut self, layer: usize, texture: Texture) -> Self {
    self.set_texture(layer, Some(texture));
    self
  }

  pub fn with_type(mut self, material_type: MaterialType) -> Self {
    self.material_type = material_type;
    self
  }

  /// Whether the blend operation and factor of that material read a per-pixel alpha.
  pub fn is_alpha_blend_operation(&self) -> bool {
    if self.blend_operation.is_none() || self.blend_factor == 0. {
      return false;
    }

    let factors = PackedBlendFunc::unpack(self.blend_factor).factors;
    factors.src_rgb.has_alpha() || factors.dst_rgb.has_alpha()
  }
}

impl PartialEq for Material {
  fn eq(&self, other: &Self) -> bool {
    self.material_type == other.material_type
      && self.ambient_color == other.ambient_color
      && self.diffuse_color == other.diffuse_color
      && self.emissive_color == other.emissive_color
      && self.specular_color == other.specular_color
      && self.shininess == other.shininess
      && self.material_type_param == other.material_type_param
      && self.material_type_param2 == other.material_type_param2
      && self.thickness == other.thickness
      && self.z_buffer == other.z_buffer
      && self.z_write == other.z_write
      && self.color_mask == other.color_mask
      && self.blend_operation == other.blend_operation
      && self.blend_factor == other.blend_factor
      && self.anti_aliasing == other.anti_aliasing
      && self.backface_culling == other.backface_culling
      && self.frontface_culling == other.frontface_culling
      && self.fog_enable == other.fog_enable
      && self.lighting == other.lighting
      && self.wireframe == other.wireframe
      && self.point_cloud == other.point_cloud
      && self.use_mipmaps == other.use_mipmaps
      && self
        .layers
        .iter()
        .zip(&other.layers)
        .all(|(a, b)| a.same_binding(b))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::blending::{AlphaSource, Factor, Modulate};

  #[test]
  fn equality_ignores_sampling() {
    let a = Material::default();
    let mut b = a.clone();

    b.layers[0].bilinear_filter = false;
    b.layers[0].trilinear_filter = true;
    b.layers[1].anisotropic_filter = 16;
    b.layers[2].wrap_u = TextureClamp::Mirror;
    assert_eq!(a, b);

    b.layers[0].matrix = Mat4::from_scale(glam::Vec3::splat(2.));
    assert_ne!(a, b);
  }

  #[test]
  fn equality_sees_render_states() {
    let a = Material::default();

    let b = Material {
      wireframe: true,
      ..a.clone()
    };
    assert_ne!(a, b);

    let c = a.clone().with_type(MaterialType::LIGHTMAP);
    assert_ne!(a, c);
  }

  #[test]
  fn alpha_blend_operation() {
    let mut m = Material::default();
    assert!(!m.is_alpha_blend_operation());

    m.blend_operation = Some(Equation::Additive);
    m.blend_factor = PackedBlendFunc::new(
      Factor::SrcAlpha,
      Factor::SrcAlphaComplement,
      Modulate::X1,
      AlphaSource::TEXTURE,
    )
    .pack();
    assert!(m.is_alpha_blend_operation());

    m.blend_factor = PackedBlendFunc::new(Factor::One, Factor::One, Modulate::X1, AlphaSource::empty()).pack();
    assert!(!m.is_alpha_blend_operation());
  }
}
