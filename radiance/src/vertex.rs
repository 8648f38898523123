//! Vertex formats and their attribute layouts.
//!
//! Every vertex record the driver knows how to draw is a `#[repr(C)]` [`Pod`] type. Each of them
//! maps to a [`VertexType`], which in turns maps to a constant [`VertexLayout`] describing, per
//! attribute, the semantics index, dimension, component type, normalization mode and byte offset
//! inside the record. Layouts are resolved at every draw and never mutated.
//!
//! # Semantics
//!
//! Shaders and vertex records talk to each other through [`Semantics`]: each semantics has a fixed
//! attribute index, and shader programs get their input attributes bound to those indices by name
//! before linking.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::mem::{offset_of, size_of};

use crate::color::Color;

/// Vertex attribute semantics.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Semantics {
  Position = 0,
  Normal = 1,
  Color = 2,
  TexCoord0 = 3,
  TexCoord1 = 4,
  Tangent = 5,
  Binormal = 6,
}

impl Semantics {
  pub const ALL: [Semantics; 7] = [
    Semantics::Position,
    Semantics::Normal,
    Semantics::Color,
    Semantics::TexCoord0,
    Semantics::TexCoord1,
    Semantics::Tangent,
    Semantics::Binormal,
  ];

  /// Retrieve the attribute index of this semantics.
  pub fn index(self) -> u32 {
    self as u32
  }

  /// Name of the matching shader input.
  pub fn name(self) -> &'static str {
    match self {
      Semantics::Position => "inVertexPosition",
      Semantics::Normal => "inVertexNormal",
      Semantics::Color => "inVertexColor",
      Semantics::TexCoord0 => "inTexCoord0",
      Semantics::TexCoord1 => "inTexCoord1",
      Semantics::Tangent => "inVertexTangent",
      Semantics::Binormal => "inVertexBinormal",
    }
  }

  /// Convert from a shader input name to a semantics.
  pub fn parse(name: &str) -> Option<Self> {
    Self::ALL.iter().copied().find(|sem| sem.name() == name)
  }
}

/// Possible type of vertex attribute components.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VertexAttribType {
  F32,
  U8,
  U16,
  I16,
  U32,
  I32,
}

impl VertexAttribType {
  pub fn size(self) -> usize {
    match self {
      VertexAttribType::U8 => 1,
      VertexAttribType::U16 | VertexAttribType::I16 => 2,
      VertexAttribType::F32 | VertexAttribType::U32 | VertexAttribType::I32 => 4,
    }
  }
}

/// How components reach the shader.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AttribMode {
  /// Converted to floating point as-is.
  Regular,
  /// Integers mapped to `[0; 1]` (or `[-1; 1]` for signed types).
  Normalized,
  /// Integers kept as integers.
  Integral,
}

/// One attribute of a vertex layout.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct VertexAttribute {
  pub semantics: Semantics,
  /// Number of components, in 1–4.
  pub dim: u8,
  pub comp_type: VertexAttribType,
  pub mode: AttribMode,
  /// Offset in bytes from the start of the vertex record.
  pub offset: usize,
}

impl VertexAttribute {
  const fn new(
    semantics: Semantics,
    dim: u8,
    comp_type: VertexAttribType,
    mode: AttribMode,
    offset: usize,
  ) -> Self {
    VertexAttribute {
      semantics,
      dim,
      comp_type,
      mode,
      offset,
    }
  }
}

/// Attribute layout of a vertex record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct VertexLayout {
  pub stride: usize,
  pub attributes: &'static [VertexAttribute],
}

/// Kinds of vertex records.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VertexType {
  /// Position, normal, color and one set of texture coordinates.
  Standard,
  /// [`VertexType::Standard`] with a second set of texture coordinates.
  TwoTCoords,
  /// [`VertexType::Standard`] with tangent and binormal vectors.
  Tangents,
  /// Screen-space quads of the 2D path.
  Image2D,
  /// Position and color only; used for lines and points.
  Primitive,
}

impl VertexType {
  pub fn layout(self) -> &'static VertexLayout {
    match self {
      VertexType::Standard => &STANDARD_LAYOUT,
      VertexType::TwoTCoords => &TWO_TCOORDS_LAYOUT,
      VertexType::Tangents => &TANGENTS_LAYOUT,
      VertexType::Image2D => &IMAGE_2D_LAYOUT,
      VertexType::Primitive => &PRIMITIVE_LAYOUT,
    }
  }
}

/// Class of vertex records the driver can draw.
pub trait Vertex: Pod {
  const TYPE: VertexType;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StandardVertex {
  pub pos: [f32; 3],
  pub normal: [f32; 3],
  pub color: [u8; 4],
  pub tcoords: [f32; 2],
}

impl StandardVertex {
  pub fn new(pos: Vec3, normal: Vec3, color: Color, tcoords: Vec2) -> Self {
    StandardVertex {
      pos: pos.to_array(),
      normal: normal.to_array(),
      color: color.to_rgba8(),
      tcoords: tcoords.to_array(),
    }
  }
}

impl Vertex for StandardVertex {
  const TYPE: VertexType = VertexType::Standard;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TwoTCoordsVertex {
  pub pos: [f32; 3],
  pub normal: [f32; 3],
  pub color: [u8; 4],
  pub tcoords: [f32; 2],
  pub tcoords2: [f32; 2],
}

impl Vertex for TwoTCoordsVertex {
  const TYPE: VertexType = VertexType::TwoTCoords;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TangentsVertex {
  pub pos: [f32; 3],
  pub normal: [f32; 3],
  pub color: [u8; 4],
  pub tcoords: [f32; 2],
  pub tangent: [f32; 3],
  pub binormal: [f32; 3],
}

impl Vertex for TangentsVertex {
  const TYPE: VertexType = VertexType::Tangents;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Image2DVertex {
  pub pos: [f32; 3],
  pub color: [u8; 4],
  pub tcoords: [f32; 2],
}

impl Image2DVertex {
  pub fn new(x: f32, y: f32, color: Color, u: f32, v: f32) -> Self {
    Image2DVertex {
      pos: [x, y, 0.],
      color: color.to_rgba8(),
      tcoords: [u, v],
    }
  }
}

impl Vertex for Image2DVertex {
  const TYPE: VertexType = VertexType::Image2D;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PrimitiveVertex {
  pub pos: [f32; 3],
  pub color: [u8; 4],
}

impl PrimitiveVertex {
  pub fn new(pos: Vec3, color: Color) -> Self {
    PrimitiveVertex {
      pos: pos.to_array(),
      color: color.to_rgba8(),
    }
  }
}

impl Vertex for PrimitiveVertex {
  const TYPE: VertexType = VertexType::Primitive;
}

use self::AttribMode::{Normalized, Regular};
use self::Semantics as S;
use self::VertexAttribType::{F32, U8};

pub const STANDARD_LAYOUT: VertexLayout = VertexLayout {
  stride: size_of::<StandardVertex>(),
  attributes: &[
    VertexAttribute::new(S::Position, 3, F32, Regular, offset_of!(StandardVertex, pos)),
    VertexAttribute::new(S::Normal, 3, F32, Regular, offset_of!(StandardVertex, normal)),
    VertexAttribute::new(S::Color, 4, U8, Normalized, offset_of!(StandardVertex, color)),
    VertexAttribute::new(S::TexCoord0, 2, F32, Regular, offset_of!(StandardVertex, tcoords)),
  ],
};

pub const TWO_TCOORDS_LAYOUT: VertexLayout = VertexLayout {
  stride: size_of::<TwoTCoordsVertex>(),
  attributes: &[
    VertexAttribute::new(S::Position, 3, F32, Regular, offset_of!(TwoTCoordsVertex, pos)),
    VertexAttribute::new(S::Normal, 3, F32, Regular, offset_of!(TwoTCoordsVertex, normal)),
    VertexAttribute::new(S::Color, 4, U8, Normalized, offset_of!(TwoTCoordsVertex, color)),
    VertexAttribute::new(S::TexCoord0, 2, F32, Regular, offset_of!(TwoTCoordsVertex, tcoords)),
    VertexAttribute::new(S::TexCoord1, 2, F32, Regular, offset_of!(TwoTCoordsVertex, tcoords2)),
  ],
};

pub const TANGENTS_LAYOUT: VertexLayout = VertexLayout {
  stride: size_of::<TangentsVertex>(),
  attributes: &[
    VertexAttribute::new(S::Position, 3, F32, Regular, offset_of!(TangentsVertex, pos)),
    VertexAttribute::new(S::Normal, 3, F32, Regular, offset_of!(TangentsVertex, normal)),
    VertexAttribute::new(S::Color, 4, U8, Normalized, offset_of!(TangentsVertex, color)),
    VertexAttribute::new(S::TexCoord0, 2, F32, Regular, offset_of!(TangentsVertex, tcoords)),
    VertexAttribute::new(S::Tangent, 3, F32, Regular, offset_of!(TangentsVertex, tangent)),
    VertexAttribute::new(S::Binormal, 3, F32, Regular, offset_of!(TangentsVertex, binormal)),
  ],
};

pub const IMAGE_2D_LAYOUT: VertexLayout = VertexLayout {
  stride: size_of::<Image2DVertex>(),
  attributes: &[
    VertexAttribute::new(S::Position, 3, F32, Regular, offset_of!(Image2DVertex, pos)),
    VertexAttribute::new(S::Color, 4, U8, Normalized, offset_of!(Image2DVertex, color)),
    VertexAttribute::new(S::TexCoord0, 2, F32, Regular, offset_of!(Image2DVertex, tcoords)),
  ],
};

pub const PRIMITIVE_LAYOUT: VertexLayout = VertexLayout {
  stride: size_of::<PrimitiveVertex>(),
  attributes: &[
    VertexAttribute::new(S::Position, 3, F32, Regular, offset_of!(PrimitiveVertex, pos)),
    VertexAttribute::new(S::Color, 4, U8, Normalized, offset_of!(PrimitiveVertex, color)),
  ],
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strides_match_records() {
    assert_eq!(VertexType::Standard.layout().stride, 36);
    assert_eq!(VertexType::TwoTCoords.layout().stride, 44);
    assert_eq!(VertexType::Tangents.layout().stride, 60);
    assert_eq!(VertexType::Image2D.layout().stride, 24);
    assert_eq!(VertexType::Primitive.layout().stride, 16);
  }

  #[test]
  fn attributes_fit_in_stride() {
    for ty in [
      VertexType::Standard,
      VertexType::TwoTCoords,
      VertexType::Tangents,
      VertexType::Image2D,
      VertexType::Primitive,
    ] {
      let layout = ty.layout();

      for attr in layout.attributes {
        let end = attr.offset + attr.dim as usize * attr.comp_type.size();
        assert!(end <= layout.stride, "{:?} {:?}", ty, attr.semantics);
      }
    }
  }

  #[test]
  fn tangent_layout_indices() {
    let indices: Vec<_> = TANGENTS_LAYOUT
      .attributes
      .iter()
      .map(|a| a.semantics.index())
      .collect();

    assert_eq!(indices, [0, 1, 2, 3, 5, 6]);
  }

  #[test]
  fn semantics_names_round_trip() {
    for sem in Semantics::ALL {
      assert_eq!(Semantics::parse(sem.name()), Some(sem));
    }

    assert_eq!(Semantics::parse("inFoo"), None);
  }
}
