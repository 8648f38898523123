//! 2D drawing.
//!
//! Positions are given in pixels, origin at the top-left corner of the current render target,
//! and converted to normalized device coordinates before submission. Clip rectangles are applied
//! with the scissor test; an invalid clip rectangle makes the draw a no-op.

use bytemuck::cast_slice;
use glam::{IVec2, UVec2, Vec2, Vec3};

use crate::backend::{GlApi, IndexType, PrimitiveMode};
use crate::color::Color;
use crate::rect::Rect;
use crate::texture::Texture;
use crate::vertex::{Image2DVertex, PrimitiveVertex, VertexType};

use super::draw::VertexSource;
use super::Driver;

/// Texture coordinates `[u0, v0, u1, v1]` of a source rectangle, in texels.
///
/// Render targets are stored bottom-up, so their rows are swapped.
fn source_tcoords(texture: &Texture, source: &Rect) -> [f32; 4] {
  let size = texture.size().max(UVec2::ONE).as_vec2();
  let (top, bottom) = if texture.is_render_target() {
    (source.max.y, source.min.y)
  } else {
    (source.min.y, source.max.y)
  };

  [
    source.min.x as f32 / size.x,
    top as f32 / size.y,
    source.max.x as f32 / size.x,
    bottom as f32 / size.y,
  ]
}

impl<A> Driver<A>
where
  A: GlApi,
{
  /// Normalized device coordinates of a pixel position of the current render target.
  pub fn to_ndc(&self, p: IVec2) -> Vec2 {
    let size = self.current_render_target_size().max(UVec2::ONE).as_vec2();

    Vec2::new(
      p.x as f32 / size.x * 2. - 1.,
      1. - p.y as f32 / size.y * 2.,
    )
  }

  fn begin_clip(&mut self, clip: Option<&Rect>) {
    if let Some(clip) = clip {
      let height = self.current_render_target_size().y as i32;
      let state = &mut self.pipeline.state;

      state.set_scissor_test(true);
      state.set_scissor([clip.min.x, height - clip.max.y, clip.width(), clip.height()]);
    }
  }

  fn end_clip(&mut self, clip: Option<&Rect>) {
    if clip.is_some() {
      self.pipeline.state.set_scissor_test(false);
    }
  }

  fn image_quad(&self, dest: &Rect, tcoords: [f32; 4], colors: &[Color; 4]) -> [Image2DVertex; 4] {
    let [u0, v0, u1, v1] = tcoords;
    let p0 = self.to_ndc(dest.min);
    let p1 = self.to_ndc(dest.max);

    [
      Image2DVertex::new(p0.x, p0.y, colors[0], u0, v0),
      Image2DVertex::new(p1.x, p0.y, colors[3], u1, v0),
      Image2DVertex::new(p1.x, p1.y, colors[2], u1, v1),
      Image2DVertex::new(p0.x, p1.y, colors[1], u0, v1),
    ]
  }

  /// Draw part of a texture at a position, unscaled.
  pub fn draw_2d_image(
    &mut self,
    texture: &Texture,
    pos: IVec2,
    source: &Rect,
    clip: Option<&Rect>,
    color: Color,
    use_alpha_channel: bool,
  ) {
    if !source.is_valid() {
      return;
    }

    let dest = Rect::from_pos_size(pos, source.size());
    self.draw_2d_image_rect(texture, &dest, source, clip, Some([color; 4]), use_alpha_channel);
  }

  /// Draw part of a texture into a destination rectangle.
  ///
  /// `colors` modulate the corners, in upper-left, lower-left, lower-right, upper-right order;
  /// white if not given.
  pub fn draw_2d_image_rect(
    &mut self,
    texture: &Texture,
    dest: &Rect,
    source: &Rect,
    clip: Option<&Rect>,
    colors: Option<[Color; 4]>,
    use_alpha_channel: bool,
  ) {
    if !source.is_valid() || !dest.is_valid() || clip.map_or(false, |c| !c.is_valid()) {
      return;
    }

    let colors = colors.unwrap_or([Color::WHITE; 4]);
    let alpha = colors.iter().any(|c| c.alpha() < 255);

    self.choose_material_2d();

    if !self.set_material_texture(0, Some(texture)) {
      return;
    }

    self.set_render_states_2d_mode(alpha, true, use_alpha_channel);
    self.begin_clip(clip);

    let vertices = self.image_quad(dest, source_tcoords(texture, source), &colors);
    self.draw_client_arrays(
      VertexType::Image2D,
      cast_slice(&vertices),
      PrimitiveMode::TriangleFan,
      4,
    );

    self.end_clip(clip);
    self.test_gl_error(line!());
  }

  /// Draw a texture over the whole render target, optionally flipped vertically.
  pub fn draw_2d_image_quad(&mut self, texture: &Texture, flip: bool) {
    self.choose_material_2d();

    if !self.set_material_texture(0, Some(texture)) {
      return;
    }

    self.set_render_states_2d_mode(false, true, true);

    let (top, bottom) = if flip { (1., 0.) } else { (0., 1.) };
    let white = Color::WHITE;
    let vertices = [
      Image2DVertex::new(-1., 1., white, 0., top),
      Image2DVertex::new(1., 1., white, 1., top),
      Image2DVertex::new(1., -1., white, 1., bottom),
      Image2DVertex::new(-1., -1., white, 0., bottom),
    ];

    self.draw_client_arrays(
      VertexType::Image2D,
      cast_slice(&vertices),
      PrimitiveMode::TriangleFan,
      4,
    );

    self.test_gl_error(line!());
  }

  /// Draw many parts of a texture in a single draw call.
  ///
  /// Draws as many images as there are both positions and source rectangles, up to the batch
  /// capacity of the driver.
  pub fn draw_2d_image_batch(
    &mut self,
    texture: &Texture,
    positions: &[IVec2],
    sources: &[Rect],
    clip: Option<&Rect>,
    color: Color,
    use_alpha_channel: bool,
  ) {
    let capacity = self.config.max_2d_vertices() / 4;
    let count = positions.len().min(sources.len()).min(capacity);

    if count == 0 || clip.map_or(false, |c| !c.is_valid()) {
      return;
    }

    self.choose_material_2d();

    if !self.set_material_texture(0, Some(texture)) {
      return;
    }

    self.set_render_states_2d_mode(color.alpha() < 255, true, use_alpha_channel);
    self.begin_clip(clip);

    let colors = [color; 4];
    let vertices: Vec<Image2DVertex> = positions
      .iter()
      .zip(sources)
      .take(count)
      .filter(|(_, source)| source.is_valid())
      .flat_map(|(&pos, source)| {
        let dest = Rect::from_pos_size(pos, source.size());
        self.image_quad(&dest, source_tcoords(texture, source), &colors)
      })
      .collect();

    let quads = vertices.len() / 4;

    if quads > 0 {
      let layout = VertexType::Image2D.layout();

      self.bind_vertices(VertexSource::Client(cast_slice(&vertices)), layout);
      self.pipeline.state.bind_element_array_buffer(self.quad_indices);
      self
        .pipeline
        .state
        .raw()
        .draw_elements(PrimitiveMode::Triangles, quads * 6, IndexType::U16, 0);
      self.unbind_vertices(layout);

      self.stats.primitives += quads * 2;
      self.stats.draw_calls += 1;
    }

    self.end_clip(clip);
    self.test_gl_error(line!());
  }

  /// Fill a rectangle with a color.
  pub fn draw_2d_rectangle(&mut self, color: Color, rect: &Rect, clip: Option<&Rect>) {
    self.draw_2d_rectangle_gradient(rect, [color; 4], clip);
  }

  /// Fill a rectangle with a gradient.
  ///
  /// `colors` are given in upper-left, upper-right, lower-left, lower-right order.
  pub fn draw_2d_rectangle_gradient(&mut self, rect: &Rect, colors: [Color; 4], clip: Option<&Rect>) {
    let rect = match clip {
      Some(clip) if !clip.is_valid() => return,
      Some(clip) => rect.clipped(clip),
      None => *rect,
    };

    if !rect.is_valid() {
      return;
    }

    let alpha = colors.iter().any(|c| c.alpha() < 255);

    self.choose_material_2d();
    self.set_material_texture(0, None);
    self.set_render_states_2d_mode(alpha, false, false);

    let [upper_left, upper_right, lower_left, lower_right] = colors;
    let p0 = self.to_ndc(rect.min);
    let p1 = self.to_ndc(rect.max);
    let vertices = [
      PrimitiveVertex::new(Vec3::new(p0.x, p0.y, 0.), upper_left),
      PrimitiveVertex::new(Vec3::new(p1.x, p0.y, 0.), upper_right),
      PrimitiveVertex::new(Vec3::new(p1.x, p1.y, 0.), lower_right),
      PrimitiveVertex::new(Vec3::new(p0.x, p1.y, 0.), lower_left),
    ];

    self.draw_client_arrays(
      VertexType::Primitive,
      cast_slice(&vertices),
      PrimitiveMode::TriangleFan,
      4,
    );

    self.test_gl_error(line!());
  }

  /// Draw a line between two pixels.
  pub fn draw_2d_line(&mut self, start: IVec2, end: IVec2, color: Color) {
    if start == end {
      if start.x >= 0 && start.y >= 0 {
        self.draw_pixel(start.x as u32, start.y as u32, color);
      }

      return;
    }

    self.choose_material_2d();
    self.set_material_texture(0, None);
    self.set_render_states_2d_mode(color.alpha() < 255, false, false);

    let vertices = [
      PrimitiveVertex::new(self.to_ndc(start).extend(0.), color),
      PrimitiveVertex::new(self.to_ndc(end).extend(0.), color),
    ];

    self.draw_client_arrays(VertexType::Primitive, cast_slice(&vertices), PrimitiveMode::Lines, 2);
    self.test_gl_error(line!());
  }

  /// Draw a single pixel. Pixels outside of the render target are ignored.
  pub fn draw_pixel(&mut self, x: u32, y: u32, color: Color) {
    let size = self.current_render_target_size();

    if x >= size.x || y >= size.y {
      return;
    }

    self.choose_material_2d();
    self.set_material_texture(0, None);
    self.set_render_states_2d_mode(color.alpha() < 255, false, false);

    let vertex = [PrimitiveVertex::new(
      self.to_ndc(IVec2::new(x as i32, y as i32)).extend(0.),
      color,
    )];

    self.draw_client_arrays(VertexType::Primitive, cast_slice(&vertex), PrimitiveMode::Points, 1);
    self.test_gl_error(line!());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::recording::{GlCall, RecordingGl};
  use crate::backend::{Capability, PixelFormat, TextureHandle};
  use crate::config::DriverConfig;
  use crate::shader::MemoryShaderLoader;

  fn driver() -> (Driver<RecordingGl>, crate::backend::recording::CallLog) {
    let (gl, log) = RecordingGl::new();
    let config = DriverConfig::default().with_screen_size([200, 100]);
    let driver = Driver::headless(gl, config, Box::new(MemoryShaderLoader::new()));
    log.clear();
    (driver, log)
  }

  #[test]
  fn ndc_corners() {
    let (driver, _log) = driver();

    assert_eq!(driver.to_ndc(IVec2::ZERO), Vec2::new(-1., 1.));
    assert_eq!(driver.to_ndc(IVec2::new(200, 100)), Vec2::new(1., -1.));
    assert_eq!(driver.to_ndc(IVec2::new(100, 50)), Vec2::ZERO);
  }

  #[test]
  fn render_target_rows_are_swapped() {
    let size = UVec2::new(64, 64);
    let regular = Texture::new(TextureHandle(1), "a", size, PixelFormat::Rgba8, false, false, 0);
    let target = Texture::new(TextureHandle(2), "b", size, PixelFormat::Rgba8, true, false, 0);
    let source = Rect::new(0, 16, 32, 48);

    assert_eq!(source_tcoords(&regular, &source), [0., 0.25, 0.5, 0.75]);
    assert_eq!(source_tcoords(&target, &source), [0., 0.75, 0.5, 0.25]);
  }

  #[test]
  fn clipping_uses_the_scissor_test() {
    let (mut driver, log) = driver();
    let clip = Rect::new(10, 20, 60, 40);

    driver.draw_2d_rectangle(Color::WHITE, &Rect::new(0, 0, 50, 50), Some(&clip));
    driver.draw_2d_line(IVec2::new(0, 0), IVec2::new(10, 10), Color::WHITE);

    let calls = log.take();
    assert!(!calls.iter().any(|c| matches!(c, GlCall::Scissor(_))));
    assert_eq!(calls.iter().filter(|c| c.is_draw()).count(), 2);

    let texture = driver
      .add_texture("t", &image::RgbaImage::new(4, 4))
      .expect("texture");
    log.clear();

    driver.draw_2d_image(
      &texture,
      IVec2::ZERO,
      &Rect::new(0, 0, 4, 4),
      Some(&clip),
      Color::WHITE,
      false,
    );

    let calls = log.take();
    assert!(calls.contains(&GlCall::Enable(Capability::ScissorTest)));
    assert!(calls.contains(&GlCall::Scissor([10, 60, 50, 20])));
    assert!(calls.contains(&GlCall::Disable(Capability::ScissorTest)));
  }

  #[test]
  fn invalid_clip_draws_nothing() {
    let (mut driver, log) = driver();
    let inverted = Rect::new(50, 50, 10, 10);

    driver.draw_2d_rectangle(Color::WHITE, &Rect::new(0, 0, 50, 50), Some(&inverted));
    assert_eq!(log.draw_count(), 0);
  }

  #[test]
  fn degenerate_lines_are_pixels() {
    let (mut driver, log) = driver();

    driver.draw_2d_line(IVec2::new(5, 5), IVec2::new(5, 5), Color::WHITE);
    assert_eq!(
      log.count(|c| matches!(c, GlCall::DrawArrays { mode: PrimitiveMode::Points, count: 1, .. })),
      1
    );

    driver.draw_pixel(500, 5, Color::WHITE);
    assert_eq!(log.draw_count(), 1);
  }

  #[test]
  fn pixels_on_the_far_edges_are_off_target() {
    let (mut driver, log) = driver();
    let size = driver.current_render_target_size();

    driver.draw_pixel(size.x, 0, Color::WHITE);
    driver.draw_pixel(0, size.y, Color::WHITE);
    assert_eq!(log.draw_count(), 0);

    driver.draw_pixel(size.x - 1, size.y - 1, Color::WHITE);
    assert_eq!(log.draw_count(), 1);
  }
}
