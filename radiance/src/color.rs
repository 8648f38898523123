//! Colors.
//!
//! Two representations are used: [`Color`], a packed 32-bit ARGB value used for vertex colors and
//! per-draw tints, and [`Colorf`], a floating-point RGBA value used for uniforms and clear colors.

use serde::{Deserialize, Serialize};

/// Packed ARGB color, 8 bits per channel.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Color(pub u32);

impl Color {
  pub const WHITE: Color = Color(0xFFFF_FFFF);
  pub const BLACK: Color = Color(0xFF00_0000);
  pub const TRANSPARENT: Color = Color(0);

  pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
    Color((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
  }

  pub const fn alpha(self) -> u8 {
    (self.0 >> 24) as u8
  }

  pub const fn red(self) -> u8 {
    (self.0 >> 16) as u8
  }

  pub const fn green(self) -> u8 {
    (self.0 >> 8) as u8
  }

  pub const fn blue(self) -> u8 {
    self.0 as u8
  }

  /// Whether the color is not fully opaque.
  pub const fn is_translucent(self) -> bool {
    self.alpha() < 255
  }

  /// Byte layout uploaded in vertex records (normalized `u8x4`, RGBA order).
  pub const fn to_rgba8(self) -> [u8; 4] {
    [self.red(), self.green(), self.blue(), self.alpha()]
  }
}

/// Floating-point RGBA color, each channel in `[0; 1]`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Colorf {
  pub r: f32,
  pub g: f32,
  pub b: f32,
  pub a: f32,
}

impl Colorf {
  pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
    Colorf { r, g, b, a }
  }

  pub const fn to_array(self) -> [f32; 4] {
    [self.r, self.g, self.b, self.a]
  }
}

impl Default for Colorf {
  fn default() -> Self {
    Colorf::new(0., 0., 0., 1.)
  }
}

impl From<Color> for Colorf {
  fn from(c: Color) -> Self {
    let k = 1. / 255.;

    Colorf::new(
      c.red() as f32 * k,
      c.green() as f32 * k,
      c.blue() as f32 * k,
      c.alpha() as f32 * k,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn channels() {
    let c = Color::new(10, 20, 30, 40);

    assert_eq!(c.alpha(), 10);
    assert_eq!(c.red(), 20);
    assert_eq!(c.green(), 30);
    assert_eq!(c.blue(), 40);
    assert_eq!(c.to_rgba8(), [20, 30, 40, 10]);
    assert!(c.is_translucent());
    assert!(!Color::WHITE.is_translucent());
  }

  #[test]
  fn to_float() {
    let c = Colorf::from(Color::new(255, 0, 255, 0));
    assert_eq!(c.to_array(), [0., 1., 0., 1.]);
  }
}
