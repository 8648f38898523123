//! Graphics state.
//!
//! [`StateCache`] mirrors the GPU pipeline state of one context. Every state change the driver
//! makes goes through it, and it only forwards a call to the [`GlApi`] when the requested value
//! differs from the cached one. Nothing is assumed about the context at creation: every value
//! starts out not cached, so the first request for any state always reaches the GPU.

use log::error;

use crate::backend::{
  BufferHandle, BufferTarget, Capability, ColorMask, FramebufferHandle, GlApi, ProgramHandle,
  TextureHandle, TextureTarget,
};
use crate::blending::{BlendingFactors, Equation, Factor};
use crate::depth_test::DepthComparison;
use crate::face_culling::{FaceCullingMode, FaceCullingOrder};
use crate::material::Material;
use crate::texture::Texture;

/// Cached value.
///
/// A cached value is used to prevent issuing costy GPU commands if we know the target value is
/// already set to what the command tries to set. For instance, if you ask to use a texture ID
/// `34` once, that value will be set on the GPU and cached on our side. Later, if no other texture
/// setting has occurred, if you ask to use the texture ID `34` again, because the value is cached,
/// we know the GPU is already using it, so we don’t have to perform anything GPU-wise.
#[derive(Debug)]
struct Cached<T>(Option<T>)
where
  T: PartialEq;

impl<T> Cached<T>
where
  T: PartialEq,
{
  fn empty() -> Self {
    Cached(None)
  }

  /// Explicitly invalidate a value.
  ///
  /// This is necessary when we want to be able to force a GPU command to run.
  fn invalidate(&mut self) {
    self.0 = None;
  }

  fn set(&mut self, value: T) {
    self.0 = Some(value);
  }

  fn get(&self) -> Option<&T> {
    self.0.as_ref()
  }

  /// Check if the cached value is invalid regarding a value.
  ///
  /// A non-cached value (i.e. empty) is always invalid whatever compared value. If a value is
  /// already cached, then it’s invalid if it’s not equal ([`PartialEq`]) to the input value.
  fn is_invalid(&self, new_val: &T) -> bool {
    match &self.0 {
      Some(ref t) => t != new_val,
      _ => true,
    }
  }
}

fn toggle<A: GlApi>(api: &mut A, cached: &mut Cached<bool>, cap: Capability, enabled: bool) {
  if cached.is_invalid(&enabled) {
    if enabled {
      api.enable(cap);
    } else {
      api.disable(cap);
    }

    cached.set(enabled);
  }
}

/// Texture bound to each texture unit.
///
/// A unit whose binding is not known holds no cached value; an empty unit caches `None`.
#[derive(Debug)]
pub struct TextureCache {
  slots: Vec<Cached<Option<Texture>>>,
  owner: u64,
}

impl TextureCache {
  fn new(units: usize, owner: u64) -> Self {
    TextureCache {
      slots: (0..units).map(|_| Cached::empty()).collect(),
      owner,
    }
  }

  /// Texture bound to a unit, `None` if the unit is empty or its binding unknown.
  pub fn get(&self, unit: u32) -> Option<&Texture> {
    self
      .slots
      .get(unit as usize)
      .and_then(Cached::get)
      .and_then(Option::as_ref)
  }

  /// Number of texture units.
  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }

  /// Units currently holding that texture.
  fn units_of(&self, texture: &Texture) -> Vec<u32> {
    self
      .slots
      .iter()
      .enumerate()
      .filter(|(_, slot)| matches!(slot.get(), Some(Some(t)) if t == texture))
      .map(|(unit, _)| unit as u32)
      .collect()
  }
}

/// The graphics state.
///
/// This type represents the current state of a given graphics context. It acts
/// as a forward-gate to all the exposed features from the low-level API but
/// adds a small cache layer over it to prevent from issuing the same API call (with
/// the same parameters).
#[derive(Debug)]
pub struct StateCache<A> {
  api: A,

  // viewport and scissor box
  viewport: Cached<[i32; 4]>,
  scissor_box: Cached<[i32; 4]>,
  scissor_test: Cached<bool>,

  // clear values
  clear_color: Cached<[f32; 4]>,
  clear_depth: Cached<f32>,
  clear_stencil: Cached<i32>,

  // blending
  blending_state: Cached<bool>,
  blending_equation: Cached<Equation>,
  blending_funcs: Cached<BlendingFactors>,

  // depth test
  depth_test: Cached<bool>,
  depth_test_comparison: Cached<DepthComparison>,
  depth_mask: Cached<bool>,

  // face culling
  face_culling_state: Cached<bool>,
  face_culling_order: Cached<FaceCullingOrder>,
  face_culling_mode: Cached<FaceCullingMode>,

  // rasterization
  color_mask: Cached<ColorMask>,
  line_width: Cached<f32>,
  alpha_to_coverage: Cached<bool>,

  // texture
  current_texture_unit: Cached<u32>,
  textures: TextureCache,

  // buffers
  bound_array_buffer: Cached<BufferHandle>,
  bound_element_array_buffer: Cached<BufferHandle>,

  // framebuffer
  bound_framebuffer: Cached<FramebufferHandle>,

  // shader program
  current_program: Cached<ProgramHandle>,
}

impl<A> StateCache<A>
where
  A: GlApi,
{
  /// Wrap an API value. `owner` identifies the driver textures must come from.
  pub fn new(api: A, owner: u64) -> Self {
    let units = api.capabilities().max_texture_units.max(1) as usize;

    StateCache {
      api,
      viewport: Cached::empty(),
      scissor_box: Cached::empty(),
      scissor_test: Cached::empty(),
      clear_color: Cached::empty(),
      clear_depth: Cached::empty(),
      clear_stencil: Cached::empty(),
      blending_state: Cached::empty(),
      blending_equation: Cached::empty(),
      blending_funcs: Cached::empty(),
      depth_test: Cached::empty(),
      depth_test_comparison: Cached::empty(),
      depth_mask: Cached::empty(),
      face_culling_state: Cached::empty(),
      face_culling_order: Cached::empty(),
      face_culling_mode: Cached::empty(),
      color_mask: Cached::empty(),
      line_width: Cached::empty(),
      alpha_to_coverage: Cached::empty(),
      current_texture_unit: Cached::empty(),
      textures: TextureCache::new(units, owner),
      bound_array_buffer: Cached::empty(),
      bound_element_array_buffer: Cached::empty(),
      bound_framebuffer: Cached::empty(),
      current_program: Cached::empty(),
    }
  }

  pub fn api(&self) -> &A {
    &self.api
  }

  /// Access the API without going through the cache.
  ///
  /// # Safety
  ///
  /// Any state changed that way must be reported with [`StateCache::invalidate_all`], or the cache
  /// stops mirroring the GPU.
  pub unsafe fn api_mut(&mut self) -> &mut A {
    &mut self.api
  }

  // uncached calls issued by the driver itself (uploads, draws, uniforms…)
  pub(crate) fn raw(&mut self) -> &mut A {
    &mut self.api
  }

  /// Forget every cached value.
  ///
  /// Texture bindings become unknown, so the next [`StateCache::set_texture`] on every unit binds,
  /// and the sampling states of the textures that were bound are no longer trusted.
  pub fn invalidate_all(&mut self) {
    self.viewport.invalidate();
    self.scissor_box.invalidate();
    self.scissor_test.invalidate();
    self.clear_color.invalidate();
    self.clear_depth.invalidate();
    self.clear_stencil.invalidate();
    self.blending_state.invalidate();
    self.blending_equation.invalidate();
    self.blending_funcs.invalidate();
    self.depth_test.invalidate();
    self.depth_test_comparison.invalidate();
    self.depth_mask.invalidate();
    self.face_culling_state.invalidate();
    self.face_culling_order.invalidate();
    self.face_culling_mode.invalidate();
    self.color_mask.invalidate();
    self.line_width.invalidate();
    self.alpha_to_coverage.invalidate();
    self.current_texture_unit.invalidate();
    self.bound_array_buffer.invalidate();
    self.bound_element_array_buffer.invalidate();
    self.bound_framebuffer.invalidate();
    self.current_program.invalidate();

    for slot in &mut self.textures.slots {
      if let Some(Some(texture)) = slot.get() {
        let mut sampler = texture.sampler_states();
        sampler.is_cached = false;
        texture.set_sampler_states(sampler);
      }

      slot.invalidate();
    }
  }

  pub fn set_viewport(&mut self, viewport: [i32; 4]) {
    if self.viewport.is_invalid(&viewport) {
      self.api.viewport(viewport);
      self.viewport.set(viewport);
    }
  }

  pub fn viewport(&self) -> Option<[i32; 4]> {
    self.viewport.get().copied()
  }

  pub fn set_scissor(&mut self, rect: [i32; 4]) {
    if self.scissor_box.is_invalid(&rect) {
      self.api.scissor(rect);
      self.scissor_box.set(rect);
    }
  }

  pub fn set_scissor_test(&mut self, enabled: bool) {
    toggle(&mut self.api, &mut self.scissor_test, Capability::ScissorTest, enabled);
  }

  pub fn set_clear_color(&mut self, color: [f32; 4]) {
    if self.clear_color.is_invalid(&color) {
      self.api.clear_color(color);
      self.clear_color.set(color);
    }
  }

  pub fn set_clear_depth(&mut self, depth: f32) {
    if self.clear_depth.is_invalid(&depth) {
      self.api.clear_depth(depth);
      self.clear_depth.set(depth);
    }
  }

  pub fn set_clear_stencil(&mut self, stencil: i32) {
    if self.clear_stencil.is_invalid(&stencil) {
      self.api.clear_stencil(stencil);
      self.clear_stencil.set(stencil);
    }
  }

  pub fn set_blend(&mut self, enabled: bool) {
    toggle(&mut self.api, &mut self.blending_state, Capability::Blend, enabled);
  }

  pub fn blend(&self) -> Option<bool> {
    self.blending_state.get().copied()
  }

  pub fn set_blend_equation(&mut self, equation: Equation) {
    if self.blending_equation.is_invalid(&equation) {
      self.api.blend_equation(equation);
      self.blending_equation.set(equation);
    }
  }

  pub fn set_blend_func(&mut self, src: Factor, dst: Factor) {
    self.set_blend_func_separate(BlendingFactors::new(src, dst));
  }

  pub fn set_blend_func_separate(&mut self, funcs: BlendingFactors) {
    if self.blending_funcs.is_invalid(&funcs) {
      if funcs.is_separate() {
        self
          .api
          .blend_func_separate(funcs.src_rgb, funcs.dst_rgb, funcs.src_alpha, funcs.dst_alpha);
      } else {
        self.api.blend_func(funcs.src_rgb, funcs.dst_rgb);
      }

      self.blending_funcs.set(funcs);
    }
  }

  pub fn blend_func(&self) -> Option<BlendingFactors> {
    self.blending_funcs.get().copied()
  }

  pub fn set_depth_test(&mut self, enabled: bool) {
    toggle(&mut self.api, &mut self.depth_test, Capability::DepthTest, enabled);
  }

  pub fn set_depth_func(&mut self, comparison: DepthComparison) {
    if self.depth_test_comparison.is_invalid(&comparison) {
      self.api.depth_func(comparison);
      self.depth_test_comparison.set(comparison);
    }
  }

  pub fn set_depth_mask(&mut self, write: bool) {
    if self.depth_mask.is_invalid(&write) {
      self.api.depth_mask(write);
      self.depth_mask.set(write);
    }
  }

  pub fn depth_mask(&self) -> Option<bool> {
    self.depth_mask.get().copied()
  }

  pub fn set_cull(&mut self, enabled: bool) {
    toggle(&mut self.api, &mut self.face_culling_state, Capability::CullFace, enabled);
  }

  pub fn set_cull_face(&mut self, mode: FaceCullingMode) {
    if self.face_culling_mode.is_invalid(&mode) {
      self.api.cull_face(mode);
      self.face_culling_mode.set(mode);
    }
  }

  pub fn set_front_face(&mut self, order: FaceCullingOrder) {
    if self.face_culling_order.is_invalid(&order) {
      self.api.front_face(order);
      self.face_culling_order.set(order);
    }
  }

  pub fn set_color_mask(&mut self, mask: ColorMask) {
    if self.color_mask.is_invalid(&mask) {
      self.api.color_mask(mask);
      self.color_mask.set(mask);
    }
  }

  pub fn color_mask(&self) -> Option<ColorMask> {
    self.color_mask.get().copied()
  }

  pub fn set_line_width(&mut self, width: f32) {
    if self.line_width.is_invalid(&width) {
      self.api.line_width(width);
      self.line_width.set(width);
    }
  }

  pub fn set_alpha_to_coverage(&mut self, enabled: bool) {
    toggle(
      &mut self.api,
      &mut self.alpha_to_coverage,
      Capability::SampleAlphaToCoverage,
      enabled,
    );
  }

  pub fn set_active_texture(&mut self, unit: u32) {
    if self.current_texture_unit.is_invalid(&unit) {
      self.api.active_texture(unit);
      self.current_texture_unit.set(unit);
    }
  }

  pub fn textures(&self) -> &TextureCache {
    &self.textures
  }

  pub fn texture(&self, unit: u32) -> Option<&Texture> {
    self.textures.get(unit)
  }

  /// Bind a texture (or nothing) to a unit.
  ///
  /// Dead textures bind as nothing. Returns `false` if the unit does not exist or the texture
  /// belongs to another driver, in which case nothing happens.
  pub fn set_texture(&mut self, unit: u32, texture: Option<&Texture>) -> bool {
    if unit as usize >= self.textures.len() {
      return false;
    }

    let texture = texture.filter(|t| t.is_alive());

    if let Some(t) = texture {
      if t.owner() != self.textures.owner {
        error!("Tried to set a texture not owned by this driver.");
        return false;
      }
    }

    let texture = texture.cloned();

    if !self.textures.slots[unit as usize].is_invalid(&texture) {
      return true;
    }

    self.set_active_texture(unit);
    self.api.bind_texture(
      TextureTarget::Texture2D,
      texture.as_ref().map_or(TextureHandle::NONE, Texture::handle),
    );
    self.textures.slots[unit as usize].set(texture);

    true
  }

  /// Unbind a texture from every unit holding it.
  pub fn remove_texture(&mut self, texture: &Texture) {
    for unit in self.textures.units_of(texture) {
      self.set_texture(unit, None);
    }
  }

  /// Unbind every texture.
  pub fn clear_textures(&mut self) {
    for unit in 0..self.textures.len() as u32 {
      self.set_texture(unit, None);
    }
  }

  /// Make the texture layers of a material reflect what is actually bound.
  pub fn correct_cache_material(&self, material: &mut Material) {
    for (unit, layer) in material.layers.iter_mut().enumerate() {
      if unit >= self.textures.len() {
        break;
      }

      let bound = self.textures.get(unit as u32);
      if layer.texture.as_ref() != bound {
        layer.texture = bound.cloned();
      }
    }
  }

  pub fn bind_array_buffer(&mut self, buffer: BufferHandle) {
    if self.bound_array_buffer.is_invalid(&buffer) {
      self.api.bind_buffer(BufferTarget::Array, buffer);
      self.bound_array_buffer.set(buffer);
    }
  }

  pub fn bind_element_array_buffer(&mut self, buffer: BufferHandle) {
    if self.bound_element_array_buffer.is_invalid(&buffer) {
      self.api.bind_buffer(BufferTarget::ElementArray, buffer);
      self.bound_element_array_buffer.set(buffer);
    }
  }

  pub fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferHandle) {
    match target {
      BufferTarget::Array => self.bind_array_buffer(buffer),
      BufferTarget::ElementArray => self.bind_element_array_buffer(buffer),
    }
  }

  /// Delete a buffer, forgetting its bindings.
  pub fn delete_buffer(&mut self, buffer: BufferHandle) {
    if self.bound_array_buffer.get() == Some(&buffer) {
      self.bound_array_buffer.set(BufferHandle::NONE);
    }

    if self.bound_element_array_buffer.get() == Some(&buffer) {
      self.bound_element_array_buffer.set(BufferHandle::NONE);
    }

    self.api.delete_buffer(buffer);
  }

  pub fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) {
    if self.bound_framebuffer.is_invalid(&framebuffer) {
      self.api.bind_framebuffer(framebuffer);
      self.bound_framebuffer.set(framebuffer);
    }
  }

  pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
    self.bound_framebuffer.get().copied()
  }

  /// Delete a framebuffer, falling back to the default one if it was bound.
  pub fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
    if self.bound_framebuffer.get() == Some(&framebuffer) {
      self.bind_framebuffer(FramebufferHandle::NONE);
    }

    self.api.delete_framebuffer(framebuffer);
  }

  pub fn use_program(&mut self, program: ProgramHandle) {
    if self.current_program.is_invalid(&program) {
      self.api.use_program(program);
      self.current_program.set(program);
    }
  }

  pub fn current_program(&self) -> ProgramHandle {
    self.current_program.get().copied().unwrap_or_default()
  }

  pub fn delete_program(&mut self, program: ProgramHandle) {
    if self.current_program.get() == Some(&program) {
      self.use_program(ProgramHandle::NONE);
    }

    self.api.delete_program(program);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::recording::{GlCall, RecordingGl};
  use crate::backend::PixelFormat;
  use crate::texture::SamplerStates;
  use glam::UVec2;

  fn cache() -> (StateCache<RecordingGl>, crate::backend::recording::CallLog) {
    let (gl, log) = RecordingGl::new();
    (StateCache::new(gl, 7), log)
  }

  fn texture(handle: u32, owner: u64) -> Texture {
    Texture::new(
      TextureHandle(handle),
      "t",
      UVec2::new(2, 2),
      PixelFormat::Rgba8,
      false,
      false,
      owner,
    )
  }

  #[test]
  fn redundant_calls_are_elided() {
    let (mut state, log) = cache();

    state.set_blend(true);
    state.set_blend(true);
    state.set_blend(false);
    state.set_blend(false);
    state.set_blend(true);

    assert_eq!(
      log.take(),
      [
        GlCall::Enable(Capability::Blend),
        GlCall::Disable(Capability::Blend),
        GlCall::Enable(Capability::Blend)
      ]
    );

    for _ in 0..3 {
      state.set_depth_func(DepthComparison::Less);
      state.set_viewport([0, 0, 10, 10]);
      state.set_color_mask(ColorMask::all());
      state.set_active_texture(3);
      state.bind_framebuffer(FramebufferHandle(2));
      state.set_cull_face(FaceCullingMode::Back);
    }

    assert_eq!(log.take().len(), 6);
  }

  #[test]
  fn first_call_always_reaches_the_api() {
    let (mut state, log) = cache();

    state.set_depth_mask(true);
    state.set_blend_func(Factor::One, Factor::Zero);

    assert_eq!(
      log.take(),
      [
        GlCall::DepthMask(true),
        GlCall::BlendFunc(Factor::One, Factor::Zero)
      ]
    );
  }

  #[test]
  fn separate_blend_funcs() {
    let (mut state, log) = cache();
    let separate = BlendingFactors::separate(Factor::SrcAlpha, Factor::One, Factor::One, Factor::Zero);

    state.set_blend_func_separate(separate);
    state.set_blend_func_separate(separate);
    state.set_blend_func(Factor::One, Factor::Zero);

    assert_eq!(
      log.take(),
      [
        GlCall::BlendFuncSeparate(separate),
        GlCall::BlendFunc(Factor::One, Factor::Zero)
      ]
    );
  }

  #[test]
  fn invalidation_forces_calls() {
    let (mut state, log) = cache();

    state.set_line_width(2.);
    state.invalidate_all();
    state.set_line_width(2.);

    assert_eq!(log.count(|c| matches!(c, GlCall::LineWidth(_))), 2);
  }

  #[test]
  fn invalidation_forgets_texture_bindings() {
    let (mut state, log) = cache();
    let t = texture(5, 7);

    state.set_texture(0, None);
    state.set_texture(1, Some(&t));
    t.set_sampler_states(SamplerStates {
      is_cached: true,
      ..SamplerStates::default()
    });
    state.invalidate_all();
    log.clear();

    // foreign code may have bound anything on those units
    state.set_texture(0, None);
    state.set_texture(1, Some(&t));

    assert_eq!(log.count(|c| matches!(c, GlCall::BindTexture(_))), 2);
    assert!(log.calls().contains(&GlCall::BindTexture(TextureHandle::NONE)));
    assert!(!t.sampler_states().is_cached);
  }

  #[test]
  fn texture_binding() {
    let (mut state, log) = cache();
    let t = texture(5, 7);

    assert!(state.set_texture(1, Some(&t)));
    assert!(state.set_texture(1, Some(&t)));
    assert_eq!(state.texture(1), Some(&t));
    assert_eq!(
      log.take(),
      [GlCall::ActiveTexture(1), GlCall::BindTexture(TextureHandle(5))]
    );

    assert!(!state.set_texture(1000, Some(&t)));
  }

  #[test]
  fn foreign_textures_are_rejected() {
    let (mut state, log) = cache();
    let t = texture(5, 8);

    assert!(!state.set_texture(0, Some(&t)));
    assert_eq!(state.texture(0), None);
    assert!(log.take().is_empty());
  }

  #[test]
  fn removing_a_bound_texture_unbinds_every_unit() {
    let (mut state, log) = cache();
    let t = texture(5, 7);
    let u = texture(6, 7);

    state.set_texture(0, Some(&t));
    state.set_texture(1, Some(&u));
    state.set_texture(2, Some(&t));
    log.clear();

    state.remove_texture(&t);

    assert_eq!(state.texture(0), None);
    assert_eq!(state.texture(1), Some(&u));
    assert_eq!(state.texture(2), None);
    assert_eq!(log.count(|c| *c == GlCall::BindTexture(TextureHandle::NONE)), 2);
  }

  #[test]
  fn dead_textures_bind_as_nothing() {
    let (mut state, _log) = cache();
    let t = texture(5, 7);

    t.mark_deleted();
    assert!(state.set_texture(0, Some(&t)));
    assert_eq!(state.texture(0), None);
  }

  #[test]
  fn cache_material_correction() {
    let (mut state, _log) = cache();
    let t = texture(5, 7);
    let mut material = Material::default().with_texture(0, t.clone()).with_texture(1, t.clone());

    state.set_texture(0, Some(&t));
    state.correct_cache_material(&mut material);

    assert_eq!(material.texture(0), Some(&t));
    assert_eq!(material.texture(1), None);
  }

  #[test]
  fn deleting_bound_objects_forgets_them() {
    let (mut state, log) = cache();

    state.bind_array_buffer(BufferHandle(3));
    state.delete_buffer(BufferHandle(3));
    log.clear();

    state.bind_array_buffer(BufferHandle(3));
    assert_eq!(log.take(), [GlCall::BindBuffer(BufferTarget::Array, BufferHandle(3))]);

    state.use_program(ProgramHandle(4));
    state.delete_program(ProgramHandle(4));
    assert_eq!(state.current_program(), ProgramHandle::NONE);
  }
}
