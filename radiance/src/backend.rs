//! Backend interface.
//!
//! The driver never talks to a graphics API directly: it goes through [`GlApi`], a thin trait
//! mirroring the OpenGL entry points it needs. Every call reaching a [`GlApi`] has already been
//! filtered by the [`StateCache`](crate::state::StateCache), so implementors must forward calls
//! as-is and never cache anything themselves.
//!
//! Two implementations exist: the OpenGL 3.3 one, living in the `radiance-gl` crate, and
//! [`recording::RecordingGl`], a headless backend recording every call, used to test the driver
//! without a GPU.

use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

use crate::blending::{Equation, Factor};
use crate::depth_test::DepthComparison;
use crate::face_culling::{FaceCullingMode, FaceCullingOrder};
use crate::vertex::VertexAttribute;

pub mod recording;

macro_rules! handle {
  ($(#[$attr:meta])* $name:ident) => {
    $(#[$attr])*
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
    pub struct $name(pub u32);

    impl $name {
      /// The null object.
      pub const NONE: $name = $name(0);

      pub fn is_none(self) -> bool {
        self.0 == 0
      }
    }
  };
}

handle!(
  /// Texture object name.
  TextureHandle
);
handle!(
  /// Buffer object name.
  BufferHandle
);
handle!(
  /// Framebuffer object name. [`FramebufferHandle::NONE`] is the default framebuffer.
  FramebufferHandle
);
handle!(
  /// Linked shader program name.
  ProgramHandle
);

/// Location of an active uniform in a program.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct UniformLocation(pub i32);

/// Server-side capabilities toggled with enable / disable.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Capability {
  Blend,
  DepthTest,
  CullFace,
  ScissorTest,
  SampleAlphaToCoverage,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BufferTarget {
  Array,
  ElementArray,
}

/// Usage hint given when (re)allocating buffer storage.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BufferUsage {
  Static,
  Dynamic,
  Stream,
}

/// Primitive topology of a draw call.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PrimitiveMode {
  Points,
  LineStrip,
  LineLoop,
  Lines,
  TriangleStrip,
  TriangleFan,
  Triangles,
}

/// Width of indices in an element buffer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IndexType {
  U16,
  U32,
}

impl IndexType {
  pub fn size(self) -> usize {
    match self {
      IndexType::U16 => 2,
      IndexType::U32 => 4,
    }
  }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TextureTarget {
  Texture2D,
}

/// Magnification filter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MagFilter {
  Nearest,
  Linear,
}

/// Minification filter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MinFilter {
  Nearest,
  Linear,
  NearestMipmapNearest,
  LinearMipmapNearest,
  NearestMipmapLinear,
  LinearMipmapLinear,
}

/// Texture wrapping mode, along one axis.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Wrap {
  Repeat,
  ClampToEdge,
  MirroredRepeat,
}

/// Sampling parameters of a texture object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureParameter {
  MagFilter(MagFilter),
  MinFilter(MinFilter),
  WrapS(Wrap),
  WrapT(Wrap),
  MaxAnisotropy(f32),
  MaxLevel(u32),
}

/// Storage format of texture texels.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PixelFormat {
  Rgba8,
  Rgb8,
  R8,
  Depth16,
  Depth32F,
  Depth24Stencil8,
}

impl PixelFormat {
  pub fn is_depth(self) -> bool {
    matches!(
      self,
      PixelFormat::Depth16 | PixelFormat::Depth32F | PixelFormat::Depth24Stencil8
    )
  }

  pub fn has_stencil(self) -> bool {
    self == PixelFormat::Depth24Stencil8
  }

  /// Size of a texel, in bytes.
  pub fn bytes_per_pixel(self) -> usize {
    match self {
      PixelFormat::Rgba8 => 4,
      PixelFormat::Rgb8 => 3,
      PixelFormat::R8 => 1,
      PixelFormat::Depth16 => 2,
      PixelFormat::Depth32F | PixelFormat::Depth24Stencil8 => 4,
    }
  }
}

/// Framebuffer attachment points.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Attachment {
  Color(u32),
  Depth,
  DepthStencil,
}

bitflags! {
  /// Buffers to clear.
  #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
  pub struct ClearFlags: u8 {
    const COLOR = 0b001;
    const DEPTH = 0b010;
    const STENCIL = 0b100;
  }
}

bitflags! {
  /// Color channels written by draws.
  #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
  pub struct ColorMask: u8 {
    const RED = 0b0001;
    const GREEN = 0b0010;
    const BLUE = 0b0100;
    const ALPHA = 0b1000;
  }
}

impl Default for ColorMask {
  fn default() -> Self {
    ColorMask::all()
  }
}

/// Uniform values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
  Int(i32),
  Float(f32),
  Vec4([f32; 4]),
  /// Column-major 4×4 matrix.
  Mat4([f32; 16]),
}

/// Feature limits and extensions of a context.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Capabilities {
  /// Number of texture units usable from fragment shaders.
  pub max_texture_units: u32,
  pub max_texture_size: u32,
  /// Anisotropic filtering support.
  pub anisotropic_filter: bool,
  pub max_anisotropy: f32,
  /// Support for 32-bit element indices.
  pub element_index_u32: bool,
  /// Aliased line width range.
  pub line_width_range: [f32; 2],
  pub max_draw_buffers: u32,
}

impl Default for Capabilities {
  fn default() -> Self {
    Capabilities {
      max_texture_units: 8,
      max_texture_size: 4096,
      anisotropic_filter: false,
      max_anisotropy: 1.,
      element_index_u32: true,
      line_width_range: [1., 1.],
      max_draw_buffers: 4,
    }
  }
}

/// Descriptive strings of a context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum InfoKind {
  Vendor,
  Renderer,
  Version,
  ShadingLanguageVersion,
}

/// GPU-side error codes.
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
pub enum GlError {
  #[error("GL_INVALID_ENUM")]
  InvalidEnum,
  #[error("GL_INVALID_VALUE")]
  InvalidValue,
  #[error("GL_INVALID_OPERATION")]
  InvalidOperation,
  #[error("GL_OUT_OF_MEMORY")]
  OutOfMemory,
  #[error("GL_INVALID_FRAMEBUFFER_OPERATION")]
  InvalidFramebufferOperation,
  #[error("unknown error code {0:#x}")]
  Unknown(u32),
}

/// Reason a framebuffer is incomplete.
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
pub enum IncompleteReason {
  #[error("undefined framebuffer")]
  Undefined,
  #[error("incomplete attachment")]
  IncompleteAttachment,
  #[error("missing attachment")]
  MissingAttachment,
  #[error("incomplete draw buffer")]
  IncompleteDrawBuffer,
  #[error("incomplete read buffer")]
  IncompleteReadBuffer,
  #[error("unsupported")]
  Unsupported,
  #[error("incomplete multisample")]
  IncompleteMultisample,
  #[error("incomplete layer targets")]
  IncompleteLayerTargets,
  #[error("unknown status {0:#x}")]
  Unknown(u32),
}

/// Shader program creation failure.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ProgramError {
  #[error("cannot create {0} shader stage")]
  StageCreation(StageKind),
  #[error("{stage} shader compilation failed:\n{log}")]
  CompilationFailed { stage: StageKind, log: String },
  #[error("program link failed:\n{0}")]
  LinkFailed(String),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StageKind {
  Vertex,
  Fragment,
}

impl fmt::Display for StageKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      StageKind::Vertex => f.write_str("vertex"),
      StageKind::Fragment => f.write_str("fragment"),
    }
  }
}

/// Graphics API entry points used by the driver.
///
/// # Safety
///
/// The driver mirrors GPU state on its side and assumes every call is forwarded verbatim to the
/// context it was created for. An implementation skipping, reordering or caching calls makes that
/// mirror diverge from the real GPU state.
pub unsafe trait GlApi {
  fn info(&self, kind: InfoKind) -> String;

  fn capabilities(&self) -> Capabilities;

  /// Pop one pending error, if any.
  fn get_error(&mut self) -> Option<GlError>;

  fn flush(&mut self);

  fn enable(&mut self, cap: Capability);

  fn disable(&mut self, cap: Capability);

  fn blend_func(&mut self, src: Factor, dst: Factor);

  fn blend_func_separate(&mut self, src_rgb: Factor, dst_rgb: Factor, src_alpha: Factor, dst_alpha: Factor);

  fn blend_equation(&mut self, equation: Equation);

  fn depth_func(&mut self, comparison: DepthComparison);

  fn depth_mask(&mut self, write: bool);

  fn cull_face(&mut self, mode: FaceCullingMode);

  fn front_face(&mut self, order: FaceCullingOrder);

  fn color_mask(&mut self, mask: ColorMask);

  fn line_width(&mut self, width: f32);

  /// `[x, y, width, height]`, origin at the bottom-left corner.
  fn viewport(&mut self, rect: [i32; 4]);

  /// `[x, y, width, height]`, origin at the bottom-left corner.
  fn scissor(&mut self, rect: [i32; 4]);

  fn clear_color(&mut self, color: [f32; 4]);

  fn clear_depth(&mut self, depth: f32);

  fn clear_stencil(&mut self, stencil: i32);

  fn clear(&mut self, flags: ClearFlags);

  fn active_texture(&mut self, unit: u32);

  fn create_texture(&mut self) -> TextureHandle;

  fn delete_texture(&mut self, texture: TextureHandle);

  fn bind_texture(&mut self, target: TextureTarget, texture: TextureHandle);

  /// Allocate storage for the bound texture, optionally filling it with tightly packed texels.
  fn tex_image_2d(&mut self, target: TextureTarget, size: [u32; 2], format: PixelFormat, texels: Option<&[u8]>);

  fn tex_parameter(&mut self, target: TextureTarget, param: TextureParameter);

  fn generate_mipmap(&mut self, target: TextureTarget);

  fn create_buffer(&mut self) -> BufferHandle;

  fn delete_buffer(&mut self, buffer: BufferHandle);

  fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferHandle);

  /// Reallocate the storage of the bound buffer with the given content.
  fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);

  /// Replace a region of the bound buffer.
  fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

  fn enable_vertex_attrib(&mut self, index: u32);

  fn disable_vertex_attrib(&mut self, index: u32);

  /// Point an attribute at the bound array buffer; `base` is the offset of the first vertex.
  fn vertex_attrib_pointer(&mut self, attribute: &VertexAttribute, stride: usize, base: usize);

  fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize);

  /// Draw from the bound element buffer, starting `offset` bytes in.
  fn draw_elements(&mut self, mode: PrimitiveMode, count: usize, index_type: IndexType, offset: usize);

  /// Compile both stages and link them, binding vertex inputs to their semantics indices.
  fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle, ProgramError>;

  fn delete_program(&mut self, program: ProgramHandle);

  fn use_program(&mut self, program: ProgramHandle);

  fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

  /// Upload a uniform of the program in use.
  fn uniform(&mut self, location: UniformLocation, value: UniformValue);

  fn create_framebuffer(&mut self) -> FramebufferHandle;

  fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);

  fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle);

  /// Attach a texture to the bound framebuffer.
  fn framebuffer_texture(&mut self, attachment: Attachment, texture: TextureHandle);

  fn framebuffer_status(&mut self) -> Result<(), IncompleteReason>;

  /// Enable the first `count` color attachments of the bound framebuffer.
  fn draw_buffers(&mut self, count: u32);

  /// Read RGBA8 pixels of the bound framebuffer, rows bottom to top.
  fn read_pixels(&mut self, rect: [i32; 4], out: &mut [u8]);
}
