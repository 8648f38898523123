//! OpenGL 3.3 backend.
//!
//! This module implements [`GlApi`] on top of an OpenGL 3.3 core context. The backend type is
//! [`Gl33`]. It forwards every call verbatim: caching is the job of the driver state cache.

mod convert;
mod program;

use std::cell::RefCell;
use std::ffi::{c_void, CStr};
use std::marker::PhantomData;
use std::ptr::null;

use gl::types::*;
use log::{debug, warn};
use radiance::backend::{
  Attachment, BufferHandle, BufferTarget, BufferUsage, Capabilities, Capability, ClearFlags,
  ColorMask, FramebufferHandle, GlApi, GlError, IncompleteReason, IndexType, InfoKind, PixelFormat,
  PrimitiveMode, ProgramError, ProgramHandle, TextureHandle, TextureParameter, TextureTarget,
  UniformLocation, UniformValue,
};
use radiance::blending::{Equation, Factor};
use radiance::depth_test::DepthComparison;
use radiance::face_culling::{FaceCullingMode, FaceCullingOrder};
use radiance::vertex::{AttribMode, VertexAttribute};
use thiserror::Error;

use self::convert::*;

// TLS synchronization barrier for `Gl33`.
thread_local!(static TLS_ACQUIRE_GFX_STATE: RefCell<Option<()>> = RefCell::new(Some(())));

// GL_EXT_texture_filter_anisotropic, core in 4.6 only
const TEXTURE_MAX_ANISOTROPY: GLenum = 0x84FE;
const MAX_TEXTURE_MAX_ANISOTROPY: GLenum = 0x84FF;

/// An error that might happen when the backend is created.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum StateQueryError {
  /// A backend already exists on the current thread.
  #[error("unavailable graphics state")]
  UnavailableGlState,
  /// An entry point could not be loaded.
  #[error("missing OpenGL entry point: {0}")]
  MissingEntryPoint(&'static str),
}

/// An OpenGL 3.3 backend.
///
/// Only one can exist per thread at a time, as it assumes it has exclusive access to the context
/// current on that thread.
#[derive(Debug)]
pub struct Gl33 {
  _a: PhantomData<*const ()>, // !Send and !Sync
  caps: Capabilities,
  vertex_array: GLuint,
}

impl Gl33 {
  /// Load the OpenGL entry points with `loader` and create the backend from the current context.
  pub fn load_with<F>(loader: F) -> Result<Self, StateQueryError>
  where
    F: FnMut(&'static str) -> *const c_void,
  {
    gl::load_with(loader);
    Self::new()
  }

  /// Create the backend from the current context, assuming the entry points are loaded.
  pub fn new() -> Result<Self, StateQueryError> {
    TLS_ACQUIRE_GFX_STATE.with(|rc| {
      let mut inner = rc.borrow_mut();

      match inner.take() {
        Some(_) => match unsafe { Self::get_from_context() } {
          Ok(gl33) => Ok(gl33),
          Err(e) => {
            *inner = Some(());
            Err(e)
          }
        },

        None => Err(StateQueryError::UnavailableGlState),
      }
    })
  }

  unsafe fn get_from_context() -> Result<Self, StateQueryError> {
    if !gl::GetString::is_loaded() {
      return Err(StateQueryError::MissingEntryPoint("glGetString"));
    }

    if !gl::GenVertexArrays::is_loaded() {
      return Err(StateQueryError::MissingEntryPoint("glGenVertexArrays"));
    }

    let caps = query_capabilities();
    debug!("OpenGL capabilities: {:?}", caps);

    // client-side arrays are not a thing in core profiles; one vertex array serves every draw
    let mut vertex_array = 0;
    gl::GenVertexArrays(1, &mut vertex_array);
    gl::BindVertexArray(vertex_array);

    gl::PixelStorei(gl::PACK_ALIGNMENT, 1);
    gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);

    Ok(Gl33 {
      _a: PhantomData,
      caps,
      vertex_array,
    })
  }
}

impl Drop for Gl33 {
  fn drop(&mut self) {
    unsafe {
      gl::BindVertexArray(0);
      gl::DeleteVertexArrays(1, &self.vertex_array);
    }

    TLS_ACQUIRE_GFX_STATE.with(|rc| *rc.borrow_mut() = Some(()));
  }
}

unsafe fn get_integer(name: GLenum) -> GLint {
  let mut value = 0;
  gl::GetIntegerv(name, &mut value);
  value
}

unsafe fn get_string(name: GLenum) -> String {
  let ptr = gl::GetString(name);

  if ptr.is_null() {
    String::new()
  } else {
    CStr::from_ptr(ptr as *const _).to_string_lossy().into_owned()
  }
}

unsafe fn has_extension(name: &str) -> bool {
  let count = get_integer(gl::NUM_EXTENSIONS).max(0) as GLuint;

  (0..count).any(|i| {
    let ptr = gl::GetStringi(gl::EXTENSIONS, i);
    !ptr.is_null() && CStr::from_ptr(ptr as *const _).to_bytes() == name.as_bytes()
  })
}

unsafe fn query_capabilities() -> Capabilities {
  let anisotropic_filter = has_extension("GL_EXT_texture_filter_anisotropic")
    || has_extension("GL_ARB_texture_filter_anisotropic");

  let mut max_anisotropy = 1.;

  if anisotropic_filter {
    gl::GetFloatv(MAX_TEXTURE_MAX_ANISOTROPY, &mut max_anisotropy);
  }

  let mut line_width_range = [1.; 2];
  gl::GetFloatv(gl::ALIASED_LINE_WIDTH_RANGE, line_width_range.as_mut_ptr());

  Capabilities {
    max_texture_units: get_integer(gl::MAX_TEXTURE_IMAGE_UNITS).max(1) as u32,
    max_texture_size: get_integer(gl::MAX_TEXTURE_SIZE).max(0) as u32,
    anisotropic_filter,
    max_anisotropy,
    element_index_u32: true,
    line_width_range,
    max_draw_buffers: get_integer(gl::MAX_DRAW_BUFFERS).max(1) as u32,
  }
}

/// Bytes `glTexImage2D` reads for a full level of that size and format.
fn texel_bytes(size: [u32; 2], format: PixelFormat) -> usize {
  size[0] as usize * size[1] as usize * format.bytes_per_pixel()
}

fn gl_bool(b: bool) -> GLboolean {
  if b {
    gl::TRUE
  } else {
    gl::FALSE
  }
}

unsafe impl GlApi for Gl33 {
  fn info(&self, kind: InfoKind) -> String {
    let name = match kind {
      InfoKind::Vendor => gl::VENDOR,
      InfoKind::Renderer => gl::RENDERER,
      InfoKind::Version => gl::VERSION,
      InfoKind::ShadingLanguageVersion => gl::SHADING_LANGUAGE_VERSION,
    };

    unsafe { get_string(name) }
  }

  fn capabilities(&self) -> Capabilities {
    self.caps
  }

  fn get_error(&mut self) -> Option<GlError> {
    glenum_to_error(unsafe { gl::GetError() })
  }

  fn flush(&mut self) {
    unsafe { gl::Flush() }
  }

  fn enable(&mut self, cap: Capability) {
    unsafe { gl::Enable(capability_to_glenum(cap)) }
  }

  fn disable(&mut self, cap: Capability) {
    unsafe { gl::Disable(capability_to_glenum(cap)) }
  }

  fn blend_func(&mut self, src: Factor, dst: Factor) {
    unsafe { gl::BlendFunc(blending_factor_to_glenum(src), blending_factor_to_glenum(dst)) }
  }

  fn blend_func_separate(&mut self, src_rgb: Factor, dst_rgb: Factor, src_alpha: Factor, dst_alpha: Factor) {
    unsafe {
      gl::BlendFuncSeparate(
        blending_factor_to_glenum(src_rgb),
        blending_factor_to_glenum(dst_rgb),
        blending_factor_to_glenum(src_alpha),
        blending_factor_to_glenum(dst_alpha),
      )
    }
  }

  fn blend_equation(&mut self, equation: Equation) {
    unsafe { gl::BlendEquation(blending_equation_to_glenum(equation)) }
  }

  fn depth_func(&mut self, comparison: DepthComparison) {
    unsafe { gl::DepthFunc(depth_comparison_to_glenum(comparison)) }
  }

  fn depth_mask(&mut self, write: bool) {
    unsafe { gl::DepthMask(gl_bool(write)) }
  }

  fn cull_face(&mut self, mode: FaceCullingMode) {
    unsafe { gl::CullFace(face_culling_mode_to_glenum(mode)) }
  }

  fn front_face(&mut self, order: FaceCullingOrder) {
    unsafe { gl::FrontFace(face_culling_order_to_glenum(order)) }
  }

  fn color_mask(&mut self, mask: ColorMask) {
    unsafe {
      gl::ColorMask(
        gl_bool(mask.contains(ColorMask::RED)),
        gl_bool(mask.contains(ColorMask::GREEN)),
        gl_bool(mask.contains(ColorMask::BLUE)),
        gl_bool(mask.contains(ColorMask::ALPHA)),
      )
    }
  }

  fn line_width(&mut self, width: f32) {
    unsafe { gl::LineWidth(width) }
  }

  fn viewport(&mut self, [x, y, w, h]: [i32; 4]) {
    unsafe { gl::Viewport(x, y, w, h) }
  }

  fn scissor(&mut self, [x, y, w, h]: [i32; 4]) {
    unsafe { gl::Scissor(x, y, w, h) }
  }

  fn clear_color(&mut self, [r, g, b, a]: [f32; 4]) {
    unsafe { gl::ClearColor(r, g, b, a) }
  }

  fn clear_depth(&mut self, depth: f32) {
    unsafe { gl::ClearDepth(depth as GLdouble) }
  }

  fn clear_stencil(&mut self, stencil: i32) {
    unsafe { gl::ClearStencil(stencil) }
  }

  fn clear(&mut self, flags: ClearFlags) {
    let mut bits = 0;

    if flags.contains(ClearFlags::COLOR) {
      bits |= gl::COLOR_BUFFER_BIT;
    }

    if flags.contains(ClearFlags::DEPTH) {
      bits |= gl::DEPTH_BUFFER_BIT;
    }

    if flags.contains(ClearFlags::STENCIL) {
      bits |= gl::STENCIL_BUFFER_BIT;
    }

    unsafe { gl::Clear(bits) }
  }

  fn active_texture(&mut self, unit: u32) {
    unsafe { gl::ActiveTexture(gl::TEXTURE0 + unit) }
  }

  fn create_texture(&mut self) -> TextureHandle {
    let mut handle = 0;
    unsafe { gl::GenTextures(1, &mut handle) };
    TextureHandle(handle)
  }

  fn delete_texture(&mut self, texture: TextureHandle) {
    unsafe { gl::DeleteTextures(1, &texture.0) }
  }

  fn bind_texture(&mut self, target: TextureTarget, texture: TextureHandle) {
    unsafe { gl::BindTexture(texture_target_to_glenum(target), texture.0) }
  }

  fn tex_image_2d(&mut self, target: TextureTarget, [w, h]: [u32; 2], format: PixelFormat, texels: Option<&[u8]>) {
    if let Some(texels) = texels {
      let needed = texel_bytes([w, h], format);

      if texels.len() < needed {
        warn!("tex_image_2d: {} bytes needed, {} given", needed, texels.len());
        return;
      }
    }

    let (internal, format, ty) = pixel_format_to_glenums(format);
    let ptr = texels.map_or(null(), |t| t.as_ptr() as *const c_void);

    unsafe {
      gl::TexImage2D(
        texture_target_to_glenum(target),
        0,
        internal as GLint,
        w as GLsizei,
        h as GLsizei,
        0,
        format,
        ty,
        ptr,
      )
    }
  }

  fn tex_parameter(&mut self, target: TextureTarget, param: TextureParameter) {
    let target = texture_target_to_glenum(target);

    unsafe {
      match param {
        TextureParameter::MagFilter(f) => {
          gl::TexParameteri(target, gl::TEXTURE_MAG_FILTER, mag_filter_to_glint(f))
        }
        TextureParameter::MinFilter(f) => {
          gl::TexParameteri(target, gl::TEXTURE_MIN_FILTER, min_filter_to_glint(f))
        }
        TextureParameter::WrapS(w) => gl::TexParameteri(target, gl::TEXTURE_WRAP_S, wrap_to_glint(w)),
        TextureParameter::WrapT(w) => gl::TexParameteri(target, gl::TEXTURE_WRAP_T, wrap_to_glint(w)),
        TextureParameter::MaxAnisotropy(a) => {
          if self.caps.anisotropic_filter {
            gl::TexParameterf(target, TEXTURE_MAX_ANISOTROPY, a);
          }
        }
        TextureParameter::MaxLevel(l) => gl::TexParameteri(target, gl::TEXTURE_MAX_LEVEL, l as GLint),
      }
    }
  }

  fn generate_mipmap(&mut self, target: TextureTarget) {
    unsafe { gl::GenerateMipmap(texture_target_to_glenum(target)) }
  }

  fn create_buffer(&mut self) -> BufferHandle {
    let mut handle = 0;
    unsafe { gl::GenBuffers(1, &mut handle) };
    BufferHandle(handle)
  }

  fn delete_buffer(&mut self, buffer: BufferHandle) {
    unsafe { gl::DeleteBuffers(1, &buffer.0) }
  }

  fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferHandle) {
    unsafe { gl::BindBuffer(buffer_target_to_glenum(target), buffer.0) }
  }

  fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
    unsafe {
      gl::BufferData(
        buffer_target_to_glenum(target),
        data.len() as GLsizeiptr,
        data.as_ptr() as *const c_void,
        buffer_usage_to_glenum(usage),
      )
    }
  }

  fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
    unsafe {
      gl::BufferSubData(
        buffer_target_to_glenum(target),
        offset as GLintptr,
        data.len() as GLsizeiptr,
        data.as_ptr() as *const c_void,
      )
    }
  }

  fn enable_vertex_attrib(&mut self, index: u32) {
    unsafe { gl::EnableVertexAttribArray(index) }
  }

  fn disable_vertex_attrib(&mut self, index: u32) {
    unsafe { gl::DisableVertexAttribArray(index) }
  }

  fn vertex_attrib_pointer(&mut self, attribute: &VertexAttribute, stride: usize, base: usize) {
    let index = attribute.semantics.index();
    let size = attribute.dim as GLint;
    let ty = attrib_type_to_glenum(attribute.comp_type);
    let ptr = (base + attribute.offset) as *const c_void;

    unsafe {
      match attribute.mode {
        AttribMode::Integral => gl::VertexAttribIPointer(index, size, ty, stride as GLsizei, ptr),
        AttribMode::Regular => gl::VertexAttribPointer(index, size, ty, gl::FALSE, stride as GLsizei, ptr),
        AttribMode::Normalized => gl::VertexAttribPointer(index, size, ty, gl::TRUE, stride as GLsizei, ptr),
      }
    }
  }

  fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize) {
    unsafe { gl::DrawArrays(primitive_mode_to_glenum(mode), first as GLint, count as GLsizei) }
  }

  fn draw_elements(&mut self, mode: PrimitiveMode, count: usize, index_type: IndexType, offset: usize) {
    unsafe {
      gl::DrawElements(
        primitive_mode_to_glenum(mode),
        count as GLsizei,
        index_type_to_glenum(index_type),
        offset as *const c_void,
      )
    }
  }

  fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle, ProgramError> {
    unsafe { program::create_program(vertex, fragment).map(ProgramHandle) }
  }

  fn delete_program(&mut self, program: ProgramHandle) {
    unsafe { gl::DeleteProgram(program.0) }
  }

  fn use_program(&mut self, program: ProgramHandle) {
    unsafe { gl::UseProgram(program.0) }
  }

  fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
    unsafe { program::uniform_location(program.0, name).map(UniformLocation) }
  }

  fn uniform(&mut self, location: UniformLocation, value: UniformValue) {
    let loc = location.0;

    unsafe {
      match value {
        UniformValue::Int(x) => gl::Uniform1i(loc, x),
        UniformValue::Float(x) => gl::Uniform1f(loc, x),
        UniformValue::Vec4(v) => gl::Uniform4fv(loc, 1, v.as_ptr()),
        UniformValue::Mat4(m) => gl::UniformMatrix4fv(loc, 1, gl::FALSE, m.as_ptr()),
      }
    }
  }

  fn create_framebuffer(&mut self) -> FramebufferHandle {
    let mut handle = 0;
    unsafe { gl::GenFramebuffers(1, &mut handle) };
    FramebufferHandle(handle)
  }

  fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
    unsafe { gl::DeleteFramebuffers(1, &framebuffer.0) }
  }

  fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) {
    unsafe { gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer.0) }
  }

  fn framebuffer_texture(&mut self, attachment: Attachment, texture: TextureHandle) {
    unsafe {
      gl::FramebufferTexture2D(
        gl::FRAMEBUFFER,
        attachment_to_glenum(attachment),
        gl::TEXTURE_2D,
        texture.0,
        0,
      )
    }
  }

  fn framebuffer_status(&mut self) -> Result<(), IncompleteReason> {
    framebuffer_status(unsafe { gl::CheckFramebufferStatus(gl::FRAMEBUFFER) })
  }

  fn draw_buffers(&mut self, count: u32) {
    if count == 0 {
      unsafe { gl::DrawBuffer(gl::NONE) };
      return;
    }

    let buffers: Vec<GLenum> = (0..count).map(|i| gl::COLOR_ATTACHMENT0 + i).collect();
    unsafe { gl::DrawBuffers(count as GLsizei, buffers.as_ptr()) }
  }

  fn read_pixels(&mut self, [x, y, w, h]: [i32; 4], out: &mut [u8]) {
    let needed = w.max(0) as usize * h.max(0) as usize * 4;

    if out.len() < needed {
      warn!("read_pixels: {} bytes needed, {} given", needed, out.len());
      return;
    }

    unsafe {
      gl::ReadPixels(
        x,
        y,
        w,
        h,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        out.as_mut_ptr() as *mut c_void,
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn texel_sizes() {
    assert_eq!(texel_bytes([4, 2], PixelFormat::Rgba8), 32);
    assert_eq!(texel_bytes([3, 3], PixelFormat::Rgb8), 27);
    assert_eq!(texel_bytes([5, 1], PixelFormat::R8), 5);
    assert_eq!(texel_bytes([2, 2], PixelFormat::Depth16), 8);
    assert_eq!(texel_bytes([0, 7], PixelFormat::Rgba8), 0);
  }
}
