//! Driver core.
//!
//! A [`Driver`] owns everything tied to one graphics context: the [`StateCache`] mirroring the
//! GPU, the transform stack, the material renderers, the textures, render targets and hardware
//! buffers created through it. It turns the current [`Material`] into GPU state with a small
//! render-state machine switching between a 2D mode (overlay drawing) and a 3D mode (scene
//! drawing):
//!
//! - entering 3D resets blending and forces the next material to be fully applied;
//! - in 3D, a material differing from the last one rendered unsets the previous renderer and sets
//!   the new one; every draw then lets the current renderer refresh its per-draw uniforms;
//! - entering 2D unsets the last 3D renderer and picks one of the two 2D renderers, depending on
//!   whether a texture is drawn.
//!
//! Per-frame operations never fail loudly: invalid input is a no-op, degraded operation is logged
//! and reported through `bool` / `Option` returns.

mod builtin;
mod draw;
mod draw_2d;
mod hardware;
mod pipeline;
mod render_states;
mod screenshot;
mod targets;
mod textures;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, UVec2};
use log::{error, info};

use crate::backend::{
  BufferHandle, BufferTarget, BufferUsage, Capabilities, ClearFlags, ColorMask, GlApi, InfoKind,
};
use crate::color::{Color, Colorf};
use crate::config::DriverConfig;
use crate::context::ContextManager;
use crate::error::DriverError;
use crate::face_culling::FaceCullingOrder;
use crate::fog::Fog;
use crate::material::{Material, MaterialType, MATERIAL_MAX_TEXTURES};
use crate::mesh::{HardwareBufferLink, MeshBufferId};
use crate::rect::Rect;
use crate::render_target::RenderTarget;
use crate::renderer::{
  BaseBlending, MaterialRenderer, MaterialRendererRegistry, ShaderConstantSetCallback,
  ShaderMaterialRenderer,
};
use crate::renderer2d::Renderer2D;
use crate::shader::ShaderLoader;
use crate::state::StateCache;
use crate::texture::Texture;
use crate::transform::{texture_flip_matrix, TransformState};
use crate::vertex::VertexType;

use self::pipeline::{Pipeline, RenderServices};

pub use self::render_states::RenderMode;

static NEXT_DRIVER_ID: AtomicU64 = AtomicU64::new(1);

/// Largest primitive count of a single draw.
pub const MAX_PRIMITIVE_COUNT: usize = 65535;

/// Counters reset by [`Driver::begin_scene`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct FrameStats {
  pub primitives: usize,
  pub draw_calls: usize,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Active2D {
  Texture = 0,
  NoTexture = 1,
}

/// Quad index pattern of the 2D batch path: `4k, 4k+1, 4k+2, 4k, 4k+2, 4k+3` per quad.
pub(crate) fn quad_indices(max_vertices: usize) -> Vec<u16> {
  (0..max_vertices / 4)
    .flat_map(|quad| {
      let base = (quad * 4) as u16;
      [base, base + 1, base + 2, base, base + 2, base + 3]
    })
    .collect()
}

/// The rendering driver.
pub struct Driver<A>
where
  A: GlApi,
{
  id: u64,
  name: String,
  config: DriverConfig,
  pipeline: Pipeline<A>,

  renderers: MaterialRendererRegistry,
  renderers_2d: [Renderer2D; 2],
  active_2d: Option<Active2D>,
  render_mode: RenderMode,

  material: Material,
  last_material: Material,
  reset_render_states: bool,
  init_material_2d: Material,
  override_material_2d: Material,
  override_material_2d_enabled: bool,
  texture_flip: Mat4,

  context: Option<Box<dyn ContextManager>>,
  shader_loader: Box<dyn ShaderLoader>,

  screen_size: UVec2,
  viewport: Rect,
  current_render_target: Option<RenderTarget>,
  current_render_target_size: UVec2,
  render_targets: Vec<RenderTarget>,
  textures: Vec<Texture>,
  hw_buffers: HashMap<MeshBufferId, HardwareBufferLink>,

  stream_vertices: BufferHandle,
  stream_indices: BufferHandle,
  quad_indices: BufferHandle,
  stats: FrameStats,
}

impl<A> Driver<A>
where
  A: GlApi,
{
  /// Create a driver rendering into the surface of a context manager.
  ///
  /// The surface and context are generated and activated before `load_api` builds the API value
  /// from the now current context.
  pub fn new<F>(
    config: DriverConfig,
    mut context: Box<dyn ContextManager>,
    shader_loader: Box<dyn ShaderLoader>,
    load_api: F,
  ) -> Result<Self, DriverError>
  where
    F: FnOnce(&dyn ContextManager) -> Result<A, DriverError>,
  {
    context.generate_surface()?;
    context.generate_context()?;
    context.activate_context(true)?;

    let api = load_api(&*context)?;

    Ok(Self::init(api, config, Some(context), shader_loader))
  }

  /// Create a driver around an API value whose context is managed elsewhere.
  pub fn headless(api: A, config: DriverConfig, shader_loader: Box<dyn ShaderLoader>) -> Self {
    Self::init(api, config, None, shader_loader)
  }

  fn init(
    api: A,
    config: DriverConfig,
    context: Option<Box<dyn ContextManager>>,
    shader_loader: Box<dyn ShaderLoader>,
  ) -> Self {
    let id = NEXT_DRIVER_ID.fetch_add(1, Ordering::Relaxed);
    let name = format!("OpenGL {}", api.info(InfoKind::Version));
    let caps = api.capabilities();

    info!("Using renderer: {}", name);
    info!(
      "{} ({}), GLSL {}",
      api.info(InfoKind::Renderer),
      api.info(InfoKind::Vendor),
      api.info(InfoKind::ShadingLanguageVersion)
    );
    info!("{} texture units", caps.max_texture_units);

    let screen_size = config.screen_size();
    let state = StateCache::new(api, id);
    let pipeline = Pipeline::new(state, config.allow_zwrite_on_transparent());

    let mut driver = Driver {
      id,
      name,
      config,
      pipeline,
      renderers: MaterialRendererRegistry::new(),
      renderers_2d: [
        Renderer2D::new(Default::default(), true),
        Renderer2D::new(Default::default(), false),
      ],
      active_2d: None,
      render_mode: RenderMode::None,
      material: Material::default(),
      last_material: Material::default(),
      reset_render_states: true,
      init_material_2d: Material::default_2d(),
      override_material_2d: Material::default_2d(),
      override_material_2d_enabled: false,
      texture_flip: Mat4::IDENTITY,
      context,
      shader_loader,
      screen_size,
      viewport: Rect::from_size(screen_size),
      current_render_target: None,
      current_render_target_size: UVec2::ZERO,
      render_targets: Vec::new(),
      textures: Vec::new(),
      hw_buffers: HashMap::new(),
      stream_vertices: BufferHandle::NONE,
      stream_indices: BufferHandle::NONE,
      quad_indices: BufferHandle::NONE,
      stats: FrameStats::default(),
    };

    driver.setup();
    driver
  }

  fn setup(&mut self) {
    let state = &mut self.pipeline.state;

    state.set_front_face(FaceCullingOrder::CW);
    state.set_clear_depth(1.);
    state.set_viewport([0, 0, self.screen_size.x as i32, self.screen_size.y as i32]);

    builtin::register_builtin_materials(state, &mut self.renderers, &*self.shader_loader);

    let vs = "Renderer2D.vsh";
    let textured = builtin::load_program(state, &*self.shader_loader, vs, "Renderer2D.fsh");
    let untextured = builtin::load_program(state, &*self.shader_loader, vs, "Renderer2D_noTex.fsh");
    self.renderers_2d = [Renderer2D::new(textured, true), Renderer2D::new(untextured, false)];

    self.stream_vertices = state.raw().create_buffer();
    self.stream_indices = state.raw().create_buffer();
    self.quad_indices = state.raw().create_buffer();

    let indices = quad_indices(self.config.max_2d_vertices());
    state.bind_element_array_buffer(self.quad_indices);
    state.raw().buffer_data(
      BufferTarget::ElementArray,
      bytemuck::cast_slice(&indices),
      BufferUsage::Static,
    );

    self.set_render_states_3d_mode(VertexType::Standard);
    self.texture_flip = texture_flip_matrix();
    self.reset_render_states = true;

    self.test_gl_error(line!());
  }

  /// Name of the driver, including the API version.
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn config(&self) -> &DriverConfig {
    &self.config
  }

  pub fn capabilities(&self) -> Capabilities {
    self.pipeline.caps
  }

  /// Cached GPU state.
  pub fn state(&self) -> &StateCache<A> {
    &self.pipeline.state
  }

  /// Cached GPU state, for hosts mixing their own GPU calls with the driver's.
  pub fn state_mut(&mut self) -> &mut StateCache<A> {
    &mut self.pipeline.state
  }

  /// Forget everything known about the GPU state after foreign code used the context.
  ///
  /// Every cached pipeline value is dropped and the textures of the current material are bound
  /// again. Textures re-apply their sampling states on their next use, and the next draw sets its
  /// material up from scratch.
  pub fn invalidate_states(&mut self) {
    self.pipeline.state.invalidate_all();

    for texture in &self.textures {
      let mut sampler = texture.sampler_states();
      sampler.is_cached = false;
      texture.set_sampler_states(sampler);
    }

    self.reset_render_states = true;
    self.set_material(self.material.clone());
  }

  pub fn maximal_primitive_count(&self) -> usize {
    MAX_PRIMITIVE_COUNT
  }

  /// Counters since the last [`Driver::begin_scene`].
  pub fn frame_stats(&self) -> FrameStats {
    self.stats
  }

  pub fn render_mode(&self) -> RenderMode {
    self.render_mode
  }

  /// Start a frame: activate the context and clear the requested buffers.
  pub fn begin_scene(&mut self, clear: ClearFlags, color: Color, depth: f32, stencil: i32) -> bool {
    if let Some(context) = &mut self.context {
      if let Err(e) = context.activate_context(true) {
        error!("{}", e);
        return false;
      }
    }

    self.stats = FrameStats::default();
    self.clear_buffers(clear, color, depth, stencil);

    true
  }

  /// End a frame: flush and present. Returns `false` without a context to present to.
  pub fn end_scene(&mut self) -> bool {
    self.pipeline.state.raw().flush();

    match &mut self.context {
      Some(context) => match context.swap_buffers() {
        Ok(()) => true,
        Err(e) => {
          error!("{}", e);
          false
        }
      },

      None => false,
    }
  }

  /// Clear buffers of the bound framebuffer, whatever the current color and depth masks.
  pub fn clear_buffers(&mut self, flags: ClearFlags, color: Color, depth: f32, stencil: i32) {
    let state = &mut self.pipeline.state;
    let color_mask = state.color_mask();
    let depth_mask = state.depth_mask();

    if flags.contains(ClearFlags::COLOR) {
      state.set_color_mask(ColorMask::all());
      state.set_clear_color(Colorf::from(color).to_array());
    }

    if flags.contains(ClearFlags::DEPTH) {
      state.set_depth_mask(true);
      state.set_clear_depth(depth);
    }

    if flags.contains(ClearFlags::STENCIL) {
      state.set_clear_stencil(stencil);
    }

    if !flags.is_empty() {
      state.raw().clear(flags);
    }

    if let Some(mask) = color_mask {
      state.set_color_mask(mask);
    }

    if let Some(mask) = depth_mask {
      state.set_depth_mask(mask);
    }
  }

  /// Set the material used by the next draws and bind its textures.
  ///
  /// Texture matrices of render-target layers get the vertical flip applied.
  pub fn set_material(&mut self, material: Material) {
    self.material = material;

    let units = self.pipeline.state.textures().len().min(MATERIAL_MAX_TEXTURES);

    for unit in 0..units {
      let layer = &self.material.layers[unit];
      let texture = layer.texture.clone();
      let matrix = match &texture {
        Some(t) if t.is_render_target() => self.texture_flip * layer.matrix,
        _ => layer.matrix,
      };

      self.pipeline.state.set_texture(unit as u32, texture.as_ref());
      self.pipeline.transforms.set(TransformState::Texture(unit as u8), matrix);
    }
  }

  pub fn material(&self) -> &Material {
    &self.material
  }

  pub fn set_transform(&mut self, state: TransformState, matrix: Mat4) {
    self.pipeline.transforms.set(state, matrix);
  }

  pub fn transform(&self, state: TransformState) -> Mat4 {
    self.pipeline.transforms.get(state)
  }

  pub fn set_fog(&mut self, fog: Fog) {
    self.pipeline.fog = fog;
  }

  pub fn fog(&self) -> Fog {
    self.pipeline.fog
  }

  /// Global ambient light of lit materials.
  pub fn set_ambient_light(&mut self, color: Colorf) {
    self.pipeline.ambient_light = color;
  }

  pub fn ambient_light(&self) -> Colorf {
    self.pipeline.ambient_light
  }

  /// Material whose sampling states are used by textured 2D draws when enabled.
  pub fn material_2d_mut(&mut self) -> &mut Material {
    &mut self.override_material_2d
  }

  pub fn enable_material_2d(&mut self, enable: bool) {
    self.override_material_2d_enabled = enable;
  }

  /// Poll pending GPU errors and log them. Always `false` in release builds.
  pub fn test_gl_error(&mut self, line: u32) -> bool {
    if !cfg!(debug_assertions) {
      return false;
    }

    let mut failed = false;

    while let Some(e) = self.pipeline.state.raw().get_error() {
      error!("GL error {} (line {})", e, line);
      failed = true;
    }

    failed
  }

  /// Register a custom material renderer.
  pub fn add_material_renderer<R>(&mut self, renderer: R, name: &str) -> MaterialType
  where
    R: MaterialRenderer + 'static,
  {
    self.renderers.register(renderer, name)
  }

  /// Build a shader material from GLSL sources.
  ///
  /// Returns `None`, after logging why, if the program does not build.
  pub fn add_shader_material(
    &mut self,
    vertex: &str,
    fragment: &str,
    callback: Option<Box<dyn ShaderConstantSetCallback>>,
    blending: BaseBlending,
    user_data: i32,
  ) -> Option<MaterialType> {
    match self.pipeline.state.raw().create_program(vertex, fragment) {
      Ok(program) => {
        let renderer = ShaderMaterialRenderer::new(program, callback, blending, user_data);
        Some(self.renderers.register(renderer, "shader"))
      }

      Err(e) => {
        error!("cannot add shader material: {}", e);
        None
      }
    }
  }

  pub fn material_renderer_count(&self) -> usize {
    self.renderers.len()
  }

  pub fn material_renderer_name(&self, id: MaterialType) -> Option<&str> {
    self.renderers.name(id)
  }

  pub fn material_renderers(&self) -> &MaterialRendererRegistry {
    &self.renderers
  }

  fn release_renderers(&mut self) {
    let mut released: Vec<_> = self.renderers.drain().collect();
    let mut services = RenderServices::new(&mut self.pipeline, &self.material, &[]);

    for renderer in &mut released {
      renderer.release(&mut services);
    }

    for renderer in &mut self.renderers_2d {
      renderer.release(&mut services);
    }
  }
}

impl<A> Drop for Driver<A>
where
  A: GlApi,
{
  fn drop(&mut self) {
    self.release_renderers();
    self.pipeline.state.clear_textures();

    self.remove_all_render_targets();
    self.remove_all_textures();
    self.remove_all_hardware_buffers();

    for buffer in [self.stream_vertices, self.stream_indices, self.quad_indices] {
      if !buffer.is_none() {
        self.pipeline.state.delete_buffer(buffer);
      }
    }

    if let Some(context) = &mut self.context {
      context.destroy_context();
      context.destroy_surface();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quad_index_pattern() {
    let indices = quad_indices(8);
    assert_eq!(indices, [0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
  }

  #[test]
  fn quad_indices_fit_sixteen_bits() {
    let indices = quad_indices(crate::config::MAX_2D_VERTICES);
    assert_eq!(indices.len(), crate::config::MAX_2D_VERTICES / 4 * 6);
    assert_eq!(indices.last(), Some(&65535));
  }
}
