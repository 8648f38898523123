//! Transform stack.
//!
//! The driver keeps one matrix per [`TransformState`]. Texture matrices transform texture
//! coordinates as `M * vec4(u, v, 0, 1)`.
//!
//! Every actual change bumps a generation counter; material callbacks compare it with the
//! generation they last uploaded to know whether matrices must be recomputed.

use glam::{Mat4, Vec3};

use crate::material::MATERIAL_MAX_TEXTURES;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TransformState {
  View,
  World,
  Projection,
  /// Texture matrix of a material layer.
  Texture(u8),
}

impl TransformState {
  pub const COUNT: usize = 3 + MATERIAL_MAX_TEXTURES;

  fn index(self) -> usize {
    match self {
      TransformState::View => 0,
      TransformState::World => 1,
      TransformState::Projection => 2,
      TransformState::Texture(i) => 3 + (i as usize).min(MATERIAL_MAX_TEXTURES - 1),
    }
  }
}

/// Matrix mapping texture coordinates of render targets, stored bottom-up, to regular ones.
pub fn texture_flip_matrix() -> Mat4 {
  Mat4::from_translation(Vec3::Y) * Mat4::from_scale(Vec3::new(1., -1., 1.))
}

#[derive(Clone, Debug)]
pub struct TransformStack {
  matrices: [Mat4; TransformState::COUNT],
  generation: u64,
}

impl Default for TransformStack {
  fn default() -> Self {
    TransformStack {
      matrices: [Mat4::IDENTITY; TransformState::COUNT],
      generation: 0,
    }
  }
}

impl TransformStack {
  pub fn get(&self, state: TransformState) -> Mat4 {
    self.matrices[state.index()]
  }

  /// Set a matrix. Returns whether it changed.
  pub fn set(&mut self, state: TransformState, matrix: Mat4) -> bool {
    let slot = &mut self.matrices[state.index()];

    if *slot == matrix {
      return false;
    }

    *slot = matrix;
    self.generation += 1;
    true
  }

  /// Mark every matrix as changed without touching them.
  pub fn invalidate(&mut self) {
    self.generation += 1;
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// World-view-projection matrix.
  pub fn world_view_projection(&self) -> Mat4 {
    self.get(TransformState::Projection) * self.world_view()
  }

  pub fn world_view(&self) -> Mat4 {
    self.get(TransformState::View) * self.get(TransformState::World)
  }

  /// Inverse-transpose of the world-view matrix.
  pub fn normal_matrix(&self) -> Mat4 {
    self.world_view().inverse().transpose()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::Vec4;

  #[test]
  fn generation_tracks_actual_changes() {
    let mut stack = TransformStack::default();
    let g = stack.generation();

    assert!(!stack.set(TransformState::World, Mat4::IDENTITY));
    assert_eq!(stack.generation(), g);

    assert!(stack.set(TransformState::World, Mat4::from_translation(Vec3::X)));
    assert_eq!(stack.generation(), g + 1);

    stack.invalidate();
    assert_eq!(stack.generation(), g + 2);
  }

  #[test]
  fn wvp_order() {
    let mut stack = TransformStack::default();
    stack.set(TransformState::World, Mat4::from_translation(Vec3::X));
    stack.set(TransformState::View, Mat4::from_scale(Vec3::splat(2.)));

    let p = stack.world_view_projection() * Vec4::new(0., 0., 0., 1.);
    assert_eq!(p, Vec4::new(2., 0., 0., 1.));
  }

  #[test]
  fn flip_matrix_flips_v() {
    let uv = texture_flip_matrix() * Vec4::new(0.25, 0.25, 0., 1.);
    assert_eq!(uv, Vec4::new(0.25, 0.75, 0., 1.));
  }

  #[test]
  fn normal_matrix_of_uniform_scale() {
    let mut stack = TransformStack::default();
    stack.set(TransformState::World, Mat4::from_scale(Vec3::splat(2.)));

    assert!(stack
      .normal_matrix()
      .abs_diff_eq(Mat4::from_scale(Vec3::splat(0.5)), 1e-6));
  }
}
