//! Face culling is the operation of removing triangles if they’re facing the screen in a specific
//! direction with a specific mode.

/// Face culling order.
///
/// The order determines how a triangle is determined to be discarded. If the triangle’s vertices
/// wind up in the same direction as the `FaceCullingOrder`, it’s assigned the front side,
/// otherwise, it’s the back side.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum FaceCullingOrder {
  /// Clockwise order.
  CW,
  /// Counter-clockwise order.
  CCW,
}

/// Side to show and side to cull.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum FaceCullingMode {
  /// Cull the front side only.
  Front,
  /// Cull the back side only.
  Back,
  /// Always cull any triangle.
  Both,
}

impl FaceCullingMode {
  /// Culling mode for a pair of material culling switches, `None` when nothing is culled.
  pub fn from_switches(back: bool, front: bool) -> Option<Self> {
    match (back, front) {
      (true, true) => Some(FaceCullingMode::Both),
      (true, false) => Some(FaceCullingMode::Back),
      (false, true) => Some(FaceCullingMode::Front),
      (false, false) => None,
    }
  }
}
