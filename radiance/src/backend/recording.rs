//! Headless backend recording every call it receives.
//!
//! [`RecordingGl`] hands out sequential object names and uniform locations, and appends a
//! [`GlCall`] to a shared [`CallLog`] for every state-changing call. The log outlives the backend
//! (which usually ends up owned by a driver), so it can be inspected and driven from the outside:
//! pending errors, read-back pixels and compilation failures are injected through it.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::mem::size_of;
use std::rc::Rc;

use bytemuck::Pod;

use crate::backend::{
  Attachment, BufferHandle, BufferTarget, BufferUsage, Capabilities, Capability, ClearFlags,
  ColorMask, FramebufferHandle, GlApi, GlError, IncompleteReason, IndexType, InfoKind, PixelFormat,
  PrimitiveMode, ProgramError, ProgramHandle, StageKind, TextureHandle, TextureParameter,
  TextureTarget, UniformLocation, UniformValue,
};
use crate::blending::{BlendingFactors, Equation, Factor};
use crate::depth_test::DepthComparison;
use crate::face_culling::{FaceCullingMode, FaceCullingOrder};
use crate::vertex::VertexAttribute;

/// A recorded call.
#[derive(Clone, Debug, PartialEq)]
pub enum GlCall {
  Flush,
  Enable(Capability),
  Disable(Capability),
  BlendFunc(Factor, Factor),
  BlendFuncSeparate(BlendingFactors),
  BlendEquation(Equation),
  DepthFunc(DepthComparison),
  DepthMask(bool),
  CullFace(FaceCullingMode),
  FrontFace(FaceCullingOrder),
  ColorMask(ColorMask),
  LineWidth(f32),
  Viewport([i32; 4]),
  Scissor([i32; 4]),
  ClearColor([f32; 4]),
  ClearDepth(f32),
  ClearStencil(i32),
  Clear(ClearFlags),
  ActiveTexture(u32),
  CreateTexture(TextureHandle),
  DeleteTexture(TextureHandle),
  BindTexture(TextureHandle),
  TexImage2D {
    size: [u32; 2],
    format: PixelFormat,
    with_texels: bool,
  },
  TexParameter(TextureParameter),
  GenerateMipmap,
  CreateBuffer(BufferHandle),
  DeleteBuffer(BufferHandle),
  BindBuffer(BufferTarget, BufferHandle),
  BufferData {
    target: BufferTarget,
    buffer: BufferHandle,
    data: Vec<u8>,
    usage: BufferUsage,
  },
  BufferSubData {
    target: BufferTarget,
    buffer: BufferHandle,
    offset: usize,
    data: Vec<u8>,
  },
  EnableVertexAttrib(u32),
  DisableVertexAttrib(u32),
  VertexAttribPointer {
    index: u32,
    stride: usize,
    offset: usize,
  },
  DrawArrays {
    mode: PrimitiveMode,
    first: usize,
    count: usize,
  },
  DrawElements {
    mode: PrimitiveMode,
    count: usize,
    index_type: IndexType,
    offset: usize,
  },
  CreateProgram(ProgramHandle),
  DeleteProgram(ProgramHandle),
  UseProgram(ProgramHandle),
  Uniform {
    program: ProgramHandle,
    name: String,
    value: UniformValue,
  },
  CreateFramebuffer(FramebufferHandle),
  DeleteFramebuffer(FramebufferHandle),
  BindFramebuffer(FramebufferHandle),
  FramebufferTexture(Attachment, TextureHandle),
  DrawBuffers(u32),
  ReadPixels([i32; 4]),
}

impl GlCall {
  pub fn is_draw(&self) -> bool {
    matches!(self, GlCall::DrawArrays { .. } | GlCall::DrawElements { .. })
  }

  /// Whether that call uploads content into a buffer object.
  pub fn is_buffer_upload(&self) -> bool {
    matches!(self, GlCall::BufferData { .. } | GlCall::BufferSubData { .. })
  }
}

#[derive(Debug, Default)]
struct Recorder {
  calls: Vec<GlCall>,
  pending_errors: VecDeque<GlError>,
  read_back: Vec<u8>,
  fail_compilation: bool,
  error_polls: usize,
}

/// Shared view on what a [`RecordingGl`] received.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Rc<RefCell<Recorder>>);

impl CallLog {
  /// Copy of every call recorded so far.
  pub fn calls(&self) -> Vec<GlCall> {
    self.0.borrow().calls.clone()
  }

  /// Drain recorded calls.
  pub fn take(&self) -> Vec<GlCall> {
    std::mem::take(&mut self.0.borrow_mut().calls)
  }

  pub fn clear(&self) {
    self.0.borrow_mut().calls.clear();
  }

  pub fn count(&self, pred: impl Fn(&GlCall) -> bool) -> usize {
    self.0.borrow().calls.iter().filter(|&c| pred(c)).count()
  }

  pub fn draw_count(&self) -> usize {
    self.count(GlCall::is_draw)
  }

  /// Values uploaded to a uniform, by name, in call order.
  pub fn uniform_uploads(&self, name: &str) -> Vec<UniformValue> {
    self
      .0
      .borrow()
      .calls
      .iter()
      .filter_map(|c| match c {
        GlCall::Uniform { name: n, value, .. } if n == name => Some(*value),
        _ => None,
      })
      .collect()
  }

  /// Make the next `get_error` calls return that error.
  pub fn push_error(&self, error: GlError) {
    self.0.borrow_mut().pending_errors.push_back(error);
  }

  /// Number of times errors were polled.
  pub fn error_polls(&self) -> usize {
    self.0.borrow().error_polls
  }

  /// Bytes returned by `read_pixels`, bottom row first.
  pub fn set_read_back(&self, pixels: Vec<u8>) {
    self.0.borrow_mut().read_back = pixels;
  }

  pub fn fail_compilation(&self, fail: bool) {
    self.0.borrow_mut().fail_compilation = fail;
  }

  fn record(&self, call: GlCall) {
    self.0.borrow_mut().calls.push(call);
  }
}

/// Decode vertex or index records out of recorded buffer content.
pub fn read_records<T: Pod>(bytes: &[u8]) -> Vec<T> {
  bytes
    .chunks_exact(size_of::<T>())
    .map(bytemuck::pod_read_unaligned)
    .collect()
}

/// Headless [`GlApi`] implementation.
#[derive(Debug)]
pub struct RecordingGl {
  log: CallLog,
  caps: Capabilities,
  next_name: u32,
  bound_array: BufferHandle,
  bound_element: BufferHandle,
  current_program: ProgramHandle,
  locations: HashMap<(ProgramHandle, String), i32>,
  location_names: HashMap<(ProgramHandle, i32), String>,
}

impl RecordingGl {
  pub fn new() -> (Self, CallLog) {
    Self::with_capabilities(Capabilities::default())
  }

  pub fn with_capabilities(caps: Capabilities) -> (Self, CallLog) {
    let log = CallLog::default();
    let gl = RecordingGl {
      log: log.clone(),
      caps,
      next_name: 1,
      bound_array: BufferHandle::NONE,
      bound_element: BufferHandle::NONE,
      current_program: ProgramHandle::NONE,
      locations: HashMap::new(),
      location_names: HashMap::new(),
    };

    (gl, log)
  }

  fn gen_name(&mut self) -> u32 {
    let name = self.next_name;
    self.next_name += 1;
    name
  }

  fn bound(&self, target: BufferTarget) -> BufferHandle {
    match target {
      BufferTarget::Array => self.bound_array,
      BufferTarget::ElementArray => self.bound_element,
    }
  }
}

unsafe impl GlApi for RecordingGl {
  fn info(&self, kind: InfoKind) -> String {
    match kind {
      InfoKind::Vendor => "radiance".to_owned(),
      InfoKind::Renderer => "recording".to_owned(),
      InfoKind::Version => "3.3 (headless)".to_owned(),
      InfoKind::ShadingLanguageVersion => "3.30".to_owned(),
    }
  }

  fn capabilities(&self) -> Capabilities {
    self.caps
  }

  fn get_error(&mut self) -> Option<GlError> {
    let mut rec = self.log.0.borrow_mut();
    rec.error_polls += 1;
    rec.pending_errors.pop_front()
  }

  fn flush(&mut self) {
    self.log.record(GlCall::Flush);
  }

  fn enable(&mut self, cap: Capability) {
    self.log.record(GlCall::Enable(cap));
  }

  fn disable(&mut self, cap: Capability) {
    self.log.record(GlCall::Disable(cap));
  }

  fn blend_func(&mut self, src: Factor, dst: Factor) {
    self.log.record(GlCall::BlendFunc(src, dst));
  }

  fn blend_func_separate(&mut self, src_rgb: Factor, dst_rgb: Factor, src_alpha: Factor, dst_alpha: Factor) {
    self.log.record(GlCall::BlendFuncSeparate(BlendingFactors::separate(
      src_rgb, dst_rgb, src_alpha, dst_alpha,
    )));
  }

  fn blend_equation(&mut self, equation: Equation) {
    self.log.record(GlCall::BlendEquation(equation));
  }

  fn depth_func(&mut self, comparison: DepthComparison) {
    self.log.record(GlCall::DepthFunc(comparison));
  }

  fn depth_mask(&mut self, write: bool) {
    self.log.record(GlCall::DepthMask(write));
  }

  fn cull_face(&mut self, mode: FaceCullingMode) {
    self.log.record(GlCall::CullFace(mode));
  }

  fn front_face(&mut self, order: FaceCullingOrder) {
    self.log.record(GlCall::FrontFace(order));
  }

  fn color_mask(&mut self, mask: ColorMask) {
    self.log.record(GlCall::ColorMask(mask));
  }

  fn line_width(&mut self, width: f32) {
    self.log.record(GlCall::LineWidth(width));
  }

  fn viewport(&mut self, rect: [i32; 4]) {
    self.log.record(GlCall::Viewport(rect));
  }

  fn scissor(&mut self, rect: [i32; 4]) {
    self.log.record(GlCall::Scissor(rect));
  }

  fn clear_color(&mut self, color: [f32; 4]) {
    self.log.record(GlCall::ClearColor(color));
  }

  fn clear_depth(&mut self, depth: f32) {
    self.log.record(GlCall::ClearDepth(depth));
  }

  fn clear_stencil(&mut self, stencil: i32) {
    self.log.record(GlCall::ClearStencil(stencil));
  }

  fn clear(&mut self, flags: ClearFlags) {
    self.log.record(GlCall::Clear(flags));
  }

  fn active_texture(&mut self, unit: u32) {
    self.log.record(GlCall::ActiveTexture(unit));
  }

  fn create_texture(&mut self) -> TextureHandle {
    let handle = TextureHandle(self.gen_name());
    self.log.record(GlCall::CreateTexture(handle));
    handle
  }

  fn delete_texture(&mut self, texture: TextureHandle) {
    self.log.record(GlCall::DeleteTexture(texture));
  }

  fn bind_texture(&mut self, _: TextureTarget, texture: TextureHandle) {
    self.log.record(GlCall::BindTexture(texture));
  }

  fn tex_image_2d(&mut self, _: TextureTarget, size: [u32; 2], format: PixelFormat, texels: Option<&[u8]>) {
    self.log.record(GlCall::TexImage2D {
      size,
      format,
      with_texels: texels.is_some(),
    });
  }

  fn tex_parameter(&mut self, _: TextureTarget, param: TextureParameter) {
    self.log.record(GlCall::TexParameter(param));
  }

  fn generate_mipmap(&mut self, _: TextureTarget) {
    self.log.record(GlCall::GenerateMipmap);
  }

  fn create_buffer(&mut self) -> BufferHandle {
    let handle = BufferHandle(self.gen_name());
    self.log.record(GlCall::CreateBuffer(handle));
    handle
  }

  fn delete_buffer(&mut self, buffer: BufferHandle) {
    if self.bound_array == buffer {
      self.bound_array = BufferHandle::NONE;
    }
    if self.bound_element == buffer {
      self.bound_element = BufferHandle::NONE;
    }

    self.log.record(GlCall::DeleteBuffer(buffer));
  }

  fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferHandle) {
    match target {
      BufferTarget::Array => self.bound_array = buffer,
      BufferTarget::ElementArray => self.bound_element = buffer,
    }

    self.log.record(GlCall::BindBuffer(target, buffer));
  }

  fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
    self.log.record(GlCall::BufferData {
      target,
      buffer: self.bound(target),
      data: data.to_vec(),
      usage,
    });
  }

  fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
    self.log.record(GlCall::BufferSubData {
      target,
      buffer: self.bound(target),
      offset,
      data: data.to_vec(),
    });
  }

  fn enable_vertex_attrib(&mut self, index: u32) {
    self.log.record(GlCall::EnableVertexAttrib(index));
  }

  fn disable_vertex_attrib(&mut self, index: u32) {
    self.log.record(GlCall::DisableVertexAttrib(index));
  }

  fn vertex_attrib_pointer(&mut self, attribute: &VertexAttribute, stride: usize, base: usize) {
    self.log.record(GlCall::VertexAttribPointer {
      index: attribute.semantics.index(),
      stride,
      offset: base + attribute.offset,
    });
  }

  fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize) {
    self.log.record(GlCall::DrawArrays { mode, first, count });
  }

  fn draw_elements(&mut self, mode: PrimitiveMode, count: usize, index_type: IndexType, offset: usize) {
    self.log.record(GlCall::DrawElements {
      mode,
      count,
      index_type,
      offset,
    });
  }

  fn create_program(&mut self, _: &str, _: &str) -> Result<ProgramHandle, ProgramError> {
    if self.log.0.borrow().fail_compilation {
      return Err(ProgramError::CompilationFailed {
        stage: StageKind::Vertex,
        log: "compilation disabled".to_owned(),
      });
    }

    let handle = ProgramHandle(self.gen_name());
    self.log.record(GlCall::CreateProgram(handle));
    Ok(handle)
  }

  fn delete_program(&mut self, program: ProgramHandle) {
    self.log.record(GlCall::DeleteProgram(program));
  }

  fn use_program(&mut self, program: ProgramHandle) {
    self.current_program = program;
    self.log.record(GlCall::UseProgram(program));
  }

  fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
    if program.is_none() {
      return None;
    }

    let next = self.locations.len() as i32;
    let location = *self
      .locations
      .entry((program, name.to_owned()))
      .or_insert(next);
    self
      .location_names
      .insert((program, location), name.to_owned());

    Some(UniformLocation(location))
  }

  fn uniform(&mut self, location: UniformLocation, value: UniformValue) {
    let program = self.current_program;
    let name = self
      .location_names
      .get(&(program, location.0))
      .cloned()
      .unwrap_or_default();

    self.log.record(GlCall::Uniform {
      program,
      name,
      value,
    });
  }

  fn create_framebuffer(&mut self) -> FramebufferHandle {
    let handle = FramebufferHandle(self.gen_name());
    self.log.record(GlCall::CreateFramebuffer(handle));
    handle
  }

  fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
    self.log.record(GlCall::DeleteFramebuffer(framebuffer));
  }

  fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) {
    self.log.record(GlCall::BindFramebuffer(framebuffer));
  }

  fn framebuffer_texture(&mut self, attachment: Attachment, texture: TextureHandle) {
    self.log.record(GlCall::FramebufferTexture(attachment, texture));
  }

  fn framebuffer_status(&mut self) -> Result<(), IncompleteReason> {
    Ok(())
  }

  fn draw_buffers(&mut self, count: u32) {
    self.log.record(GlCall::DrawBuffers(count));
  }

  fn read_pixels(&mut self, rect: [i32; 4], out: &mut [u8]) {
    self.log.record(GlCall::ReadPixels(rect));

    let rec = self.log.0.borrow();
    let len = out.len().min(rec.read_back.len());
    out[..len].copy_from_slice(&rec.read_back[..len]);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn uploads_are_attributed_to_bound_buffers() {
    let (mut gl, log) = RecordingGl::new();
    let a = gl.create_buffer();
    let b = gl.create_buffer();

    gl.bind_buffer(BufferTarget::Array, a);
    gl.bind_buffer(BufferTarget::ElementArray, b);
    gl.buffer_data(BufferTarget::Array, &[1, 2, 3], BufferUsage::Static);
    gl.buffer_sub_data(BufferTarget::ElementArray, 2, &[4]);

    let uploads: Vec<_> = log
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        GlCall::BufferData { buffer, .. } | GlCall::BufferSubData { buffer, .. } => Some(buffer),
        _ => None,
      })
      .collect();

    assert_eq!(uploads, [a, b]);
  }

  #[test]
  fn uniforms_are_recorded_by_name() {
    let (mut gl, log) = RecordingGl::new();
    let program = gl.create_program("", "").unwrap();
    let loc = gl.uniform_location(program, "uThickness").unwrap();

    assert_eq!(gl.uniform_location(program, "uThickness"), Some(loc));
    assert_eq!(gl.uniform_location(ProgramHandle::NONE, "uThickness"), None);

    gl.use_program(program);
    gl.uniform(loc, UniformValue::Float(2.));

    assert_eq!(log.uniform_uploads("uThickness"), [UniformValue::Float(2.)]);
  }

  #[test]
  fn injected_errors_are_popped_in_order() {
    let (mut gl, log) = RecordingGl::new();

    log.push_error(GlError::InvalidEnum);
    log.push_error(GlError::OutOfMemory);

    assert_eq!(gl.get_error(), Some(GlError::InvalidEnum));
    assert_eq!(gl.get_error(), Some(GlError::OutOfMemory));
    assert_eq!(gl.get_error(), None);
    assert_eq!(log.error_polls(), 3);
  }
}
