//! Integer rectangles, in pixels, with a top-left origin.

use glam::{IVec2, UVec2};

/// Axis-aligned pixel rectangle.
///
/// `min` is the upper-left corner, `max` the lower-right one (exclusive).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Rect {
  pub min: IVec2,
  pub max: IVec2,
}

impl Rect {
  pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
    Rect {
      min: IVec2::new(x0, y0),
      max: IVec2::new(x1, y1),
    }
  }

  pub fn from_pos_size(pos: IVec2, size: UVec2) -> Self {
    Rect {
      min: pos,
      max: pos + size.as_ivec2(),
    }
  }

  /// Rectangle covering a whole surface of the given size.
  pub fn from_size(size: UVec2) -> Self {
    Rect::from_pos_size(IVec2::ZERO, size)
  }

  pub fn width(&self) -> i32 {
    self.max.x - self.min.x
  }

  pub fn height(&self) -> i32 {
    self.max.y - self.min.y
  }

  pub fn size(&self) -> UVec2 {
    UVec2::new(self.width().max(0) as u32, self.height().max(0) as u32)
  }

  /// A rectangle is valid as long as it is not inverted; empty rectangles are valid.
  pub fn is_valid(&self) -> bool {
    self.width() >= 0 && self.height() >= 0
  }

  pub fn is_empty(&self) -> bool {
    self.width() <= 0 || self.height() <= 0
  }

  pub fn contains(&self, p: IVec2) -> bool {
    p.x >= self.min.x && p.y >= self.min.y && p.x < self.max.x && p.y < self.max.y
  }

  /// Clip against another rectangle. The result may be invalid if both do not overlap.
  pub fn clipped(&self, other: &Rect) -> Rect {
    let mut r = *self;

    r.max.x = r.max.x.min(other.max.x);
    r.max.y = r.max.y.min(other.max.y);
    r.min.x = r.min.x.max(other.min.x);
    r.min.y = r.min.y.max(other.min.y);

    // collapse fully outside rectangles onto the clip border
    if r.min.y > r.max.y {
      r.min.y = r.max.y;
    }
    if r.min.x > r.max.x {
      r.min.x = r.max.x;
    }

    r
  }

  pub fn translated(&self, offset: IVec2) -> Rect {
    Rect {
      min: self.min + offset,
      max: self.max + offset,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clipping() {
    let r = Rect::new(-10, -10, 50, 50);
    let clip = Rect::new(0, 0, 20, 30);

    assert_eq!(r.clipped(&clip), Rect::new(0, 0, 20, 30));
    assert_eq!(Rect::new(5, 5, 10, 10).clipped(&clip), Rect::new(5, 5, 10, 10));

    let outside = Rect::new(40, 40, 60, 60).clipped(&clip);
    assert!(outside.is_valid());
    assert!(outside.is_empty());
  }

  #[test]
  fn validity() {
    assert!(Rect::new(0, 0, 0, 0).is_valid());
    assert!(!Rect::new(10, 0, 0, 10).is_valid());
    assert_eq!(Rect::from_size(UVec2::new(4, 3)).size(), UVec2::new(4, 3));
  }
}
