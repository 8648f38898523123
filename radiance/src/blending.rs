//! That module exports blending-related types and functions.
//!
//! Given two pixels *src* and *dst* – source and destination, we associate each pixel a blending
//! factor – respectively, *srcK* and *dstK*. *src* is the pixel being computed, and *dst* is the
//! pixel that is already stored in the framebuffer.
//!
//! The pixels can be blended in several ways. See the documentation of [`Equation`] for further
//! details.
//!
//! Materials can also carry a whole blend function packed in a single `f32` parameter (see
//! [`PackedBlendFunc`]); that is how the one-texture-blend material family and the per-material
//! blend factor are described.

use bitflags::bitflags;

/// Blending equation. Used to state how blending factors and pixel data should be blended.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Equation {
  /// `Additive` represents the following blending equation:
  ///
  /// > `blended = src * srcK + dst * dstK`
  Additive,
  /// `Subtract` represents the following blending equation:
  ///
  /// > `blended = src * srcK - dst * dstK`
  Subtract,
  /// Because subtracting is not commutative, `ReverseSubtract` represents the following additional
  /// blending equation:
  ///
  /// > `blended = dst * dstK - src * srcK`
  ReverseSubtract,
  /// `Min` represents the following blending equation:
  ///
  /// > `blended = min(src, dst)`
  Min,
  /// `Max` represents the following blending equation:
  ///
  /// > `blended = max(src, dst)`
  Max,
}

/// Blending factors. Pixel data are multiplied by these factors to achieve several effects driven
/// by *blending equations*.
///
/// The discriminants are the codes used in packed blend functions.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Factor {
  /// `0 * color = 0`
  Zero = 0,
  /// `1 * color = factor`
  One = 1,
  /// `dst * color`
  DestColor = 2,
  /// `(1 - dst) * color`
  DestColorComplement = 3,
  /// `src * color`
  SrcColor = 4,
  /// `(1 - src) * color`
  SrcColorComplement = 5,
  /// `srcA * color`
  SrcAlpha = 6,
  /// `(1 - srcA) * color`
  SrcAlphaComplement = 7,
  /// `dstA * color`
  DstAlpha = 8,
  /// `(1 - dstA) * color`
  DstAlphaComplement = 9,
  /// `min(srcA, 1 - dstA) * color`
  SrcAlphaSaturate = 10,
}

impl Factor {
  const ALL: [Factor; 11] = [
    Factor::Zero,
    Factor::One,
    Factor::DestColor,
    Factor::DestColorComplement,
    Factor::SrcColor,
    Factor::SrcColorComplement,
    Factor::SrcAlpha,
    Factor::SrcAlphaComplement,
    Factor::DstAlpha,
    Factor::DstAlphaComplement,
    Factor::SrcAlphaSaturate,
  ];

  pub fn from_code(code: u32) -> Option<Self> {
    Self::ALL.get(code as usize).copied()
  }

  pub fn code(self) -> u32 {
    self as u32
  }

  /// Whether that factor reads a per-pixel alpha value.
  pub fn has_alpha(self) -> bool {
    matches!(
      self,
      Factor::SrcAlpha
        | Factor::SrcAlphaComplement
        | Factor::DstAlpha
        | Factor::DstAlphaComplement
        | Factor::SrcAlphaSaturate
    )
  }
}

/// The four factors of a (possibly separate) blend function.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BlendingFactors {
  pub src_rgb: Factor,
  pub dst_rgb: Factor,
  pub src_alpha: Factor,
  pub dst_alpha: Factor,
}

impl BlendingFactors {
  /// Same factors for the color and alpha channels.
  pub const fn new(src: Factor, dst: Factor) -> Self {
    BlendingFactors {
      src_rgb: src,
      dst_rgb: dst,
      src_alpha: src,
      dst_alpha: dst,
    }
  }

  pub const fn separate(src_rgb: Factor, dst_rgb: Factor, src_alpha: Factor, dst_alpha: Factor) -> Self {
    BlendingFactors {
      src_rgb,
      dst_rgb,
      src_alpha,
      dst_alpha,
    }
  }

  /// Regular alpha blending: `SrcAlpha, SrcAlphaComplement`.
  pub const fn alpha() -> Self {
    BlendingFactors::new(Factor::SrcAlpha, Factor::SrcAlphaComplement)
  }

  pub fn is_separate(&self) -> bool {
    self.src_rgb != self.src_alpha || self.dst_rgb != self.dst_alpha
  }

  pub fn has_alpha(&self) -> bool {
    self.src_rgb.has_alpha()
      || self.dst_rgb.has_alpha()
      || self.src_alpha.has_alpha()
      || self.dst_alpha.has_alpha()
  }
}

/// Color modulation applied after texture blending.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Modulate {
  X1 = 1,
  X2 = 2,
  X4 = 4,
}

impl Modulate {
  fn from_code(code: u32) -> Self {
    match code {
      2 => Modulate::X2,
      4 => Modulate::X4,
      _ => Modulate::X1,
    }
  }

  pub fn factor(self) -> f32 {
    self as u32 as f32
  }
}

bitflags! {
  /// Where the alpha of a packed blend function is read from.
  #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
  pub struct AlphaSource: u32 {
    const VERTEX_COLOR = 1;
    const TEXTURE = 2;
  }
}

/// Interpretation of a packed blend function, as consumed by blending shaders.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BlendType {
  /// No per-pixel alpha involved.
  NoAlpha = 0,
  /// Alpha comes from the vertex colors.
  VertexAlpha = 1,
  /// Alpha comes from the texture.
  TextureAlpha = 2,
}

impl BlendType {
  /// Classify a packed blend function.
  pub fn classify(func: &PackedBlendFunc) -> Self {
    if func.factors.has_alpha() {
      if func.alpha_source == AlphaSource::VERTEX_COLOR {
        return BlendType::VertexAlpha;
      } else if func.alpha_source == AlphaSource::TEXTURE {
        return BlendType::TextureAlpha;
      }
    }

    BlendType::NoAlpha
  }
}

/// A blend function with its modulation and alpha source, storable in a material `f32` parameter.
///
/// The bits of the `f32` hold `alpha_source << 20 | modulate << 16 | src_rgb << 12 | dst_rgb << 8 |
/// src_alpha << 4 | dst_alpha`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PackedBlendFunc {
  pub factors: BlendingFactors,
  pub modulate: Modulate,
  pub alpha_source: AlphaSource,
}

impl PackedBlendFunc {
  pub fn new(src: Factor, dst: Factor, modulate: Modulate, alpha_source: AlphaSource) -> Self {
    PackedBlendFunc {
      factors: BlendingFactors::new(src, dst),
      modulate,
      alpha_source,
    }
  }

  pub fn separate(factors: BlendingFactors, modulate: Modulate, alpha_source: AlphaSource) -> Self {
    PackedBlendFunc {
      factors,
      modulate,
      alpha_source,
    }
  }

  pub fn pack(&self) -> f32 {
    let f = &self.factors;
    let bits = (self.alpha_source.bits() & 0xF) << 20
      | (self.modulate as u32) << 16
      | f.src_rgb.code() << 12
      | f.dst_rgb.code() << 8
      | f.src_alpha.code() << 4
      | f.dst_alpha.code();

    f32::from_bits(bits)
  }

  /// Unpack a material parameter. Unknown factor codes decode as [`Factor::Zero`].
  pub fn unpack(param: f32) -> Self {
    let bits = param.to_bits();
    let factor = |shift: u32| Factor::from_code((bits >> shift) & 0xF).unwrap_or(Factor::Zero);

    PackedBlendFunc {
      factors: BlendingFactors::separate(factor(12), factor(8), factor(4), factor(0)),
      modulate: Modulate::from_code((bits >> 16) & 0xF),
      alpha_source: AlphaSource::from_bits_truncate((bits >> 20) & 0xF),
    }
  }

  pub fn blend_type(&self) -> BlendType {
    BlendType::classify(self)
  }
}

/// Pack a separate blend function into a material parameter.
pub fn pack_blend_func(
  src_rgb: Factor,
  dst_rgb: Factor,
  src_alpha: Factor,
  dst_alpha: Factor,
  modulate: Modulate,
  alpha_source: AlphaSource,
) -> f32 {
  PackedBlendFunc::separate(
    BlendingFactors::separate(src_rgb, dst_rgb, src_alpha, dst_alpha),
    modulate,
    alpha_source,
  )
  .pack()
}

pub fn unpack_blend_func(param: f32) -> PackedBlendFunc {
  PackedBlendFunc::unpack(param)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn texture_alpha_classification() {
    let func = PackedBlendFunc::new(
      Factor::SrcAlpha,
      Factor::SrcAlphaComplement,
      Modulate::X1,
      AlphaSource::TEXTURE,
    );

    assert_eq!(PackedBlendFunc::unpack(func.pack()).blend_type(), BlendType::TextureAlpha);
  }

  #[test]
  fn classification_needs_alpha_factor() {
    let additive = PackedBlendFunc::new(Factor::One, Factor::One, Modulate::X1, AlphaSource::TEXTURE);
    assert_eq!(additive.blend_type(), BlendType::NoAlpha);

    let vertex = PackedBlendFunc::new(
      Factor::One,
      Factor::DstAlpha,
      Modulate::X1,
      AlphaSource::VERTEX_COLOR,
    );
    assert_eq!(vertex.blend_type(), BlendType::VertexAlpha);

    // both sources at once is not a single alpha source
    let both = PackedBlendFunc::new(
      Factor::SrcAlpha,
      Factor::SrcAlphaComplement,
      Modulate::X1,
      AlphaSource::all(),
    );
    assert_eq!(both.blend_type(), BlendType::NoAlpha);
  }

  #[test]
  fn packed_layout() {
    let func = PackedBlendFunc::separate(
      BlendingFactors::separate(
        Factor::SrcAlpha,
        Factor::SrcAlphaComplement,
        Factor::One,
        Factor::Zero,
      ),
      Modulate::X4,
      AlphaSource::VERTEX_COLOR,
    );
    let packed = func.pack();

    assert_eq!(packed.to_bits(), 0x0014_6710);
    assert_eq!(unpack_blend_func(packed), func);
    assert_eq!(
      pack_blend_func(
        Factor::SrcAlpha,
        Factor::SrcAlphaComplement,
        Factor::One,
        Factor::Zero,
        Modulate::X4,
        AlphaSource::VERTEX_COLOR,
      ),
      packed
    );
  }

  #[test]
  fn zero_param_is_zero_factors() {
    let func = PackedBlendFunc::unpack(0.);

    assert_eq!(func.factors, BlendingFactors::new(Factor::Zero, Factor::Zero));
    assert_eq!(func.modulate, Modulate::X1);
    assert!(func.alpha_source.is_empty());
  }
}
