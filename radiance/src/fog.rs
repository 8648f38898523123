//! Fog parameters.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Fog falloff.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum FogType {
  Exp = 0,
  #[default]
  Linear = 1,
  Exp2 = 2,
}

/// Scene-wide fog, applied to materials enabling it.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Fog {
  pub color: Color,
  pub fog_type: FogType,
  /// Start distance of linear fog.
  pub start: f32,
  /// End distance of linear fog.
  pub end: f32,
  /// Density of exponential fogs.
  pub density: f32,
  pub pixel_fog: bool,
  pub range_fog: bool,
}

impl Default for Fog {
  fn default() -> Self {
    Fog {
      color: Color::BLACK,
      fog_type: FogType::Linear,
      start: 50.,
      end: 100.,
      density: 0.01,
      pixel_fog: false,
      range_fog: false,
    }
  }
}
