//! Conversions from backend-agnostic values to OpenGL enums.

use gl::types::*;
use radiance::backend::{
  Attachment, BufferTarget, BufferUsage, Capability, GlError, IncompleteReason, IndexType, MagFilter,
  MinFilter, PixelFormat, PrimitiveMode, TextureTarget, Wrap,
};
use radiance::blending::{Equation, Factor};
use radiance::depth_test::DepthComparison;
use radiance::face_culling::{FaceCullingMode, FaceCullingOrder};
use radiance::vertex::VertexAttribType;

pub(crate) fn capability_to_glenum(cap: Capability) -> GLenum {
  match cap {
    Capability::Blend => gl::BLEND,
    Capability::DepthTest => gl::DEPTH_TEST,
    Capability::CullFace => gl::CULL_FACE,
    Capability::ScissorTest => gl::SCISSOR_TEST,
    Capability::SampleAlphaToCoverage => gl::SAMPLE_ALPHA_TO_COVERAGE,
  }
}

pub(crate) fn blending_equation_to_glenum(equation: Equation) -> GLenum {
  match equation {
    Equation::Additive => gl::FUNC_ADD,
    Equation::Subtract => gl::FUNC_SUBTRACT,
    Equation::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
    Equation::Min => gl::MIN,
    Equation::Max => gl::MAX,
  }
}

pub(crate) fn blending_factor_to_glenum(factor: Factor) -> GLenum {
  match factor {
    Factor::One => gl::ONE,
    Factor::Zero => gl::ZERO,
    Factor::SrcColor => gl::SRC_COLOR,
    Factor::SrcColorComplement => gl::ONE_MINUS_SRC_COLOR,
    Factor::DestColor => gl::DST_COLOR,
    Factor::DestColorComplement => gl::ONE_MINUS_DST_COLOR,
    Factor::SrcAlpha => gl::SRC_ALPHA,
    Factor::SrcAlphaComplement => gl::ONE_MINUS_SRC_ALPHA,
    Factor::DstAlpha => gl::DST_ALPHA,
    Factor::DstAlphaComplement => gl::ONE_MINUS_DST_ALPHA,
    Factor::SrcAlphaSaturate => gl::SRC_ALPHA_SATURATE,
  }
}

pub(crate) fn depth_comparison_to_glenum(dc: DepthComparison) -> GLenum {
  match dc {
    DepthComparison::Never => gl::NEVER,
    DepthComparison::Always => gl::ALWAYS,
    DepthComparison::Equal => gl::EQUAL,
    DepthComparison::NotEqual => gl::NOTEQUAL,
    DepthComparison::Less => gl::LESS,
    DepthComparison::LessOrEqual => gl::LEQUAL,
    DepthComparison::Greater => gl::GREATER,
    DepthComparison::GreaterOrEqual => gl::GEQUAL,
  }
}

pub(crate) fn face_culling_mode_to_glenum(mode: FaceCullingMode) -> GLenum {
  match mode {
    FaceCullingMode::Front => gl::FRONT,
    FaceCullingMode::Back => gl::BACK,
    FaceCullingMode::Both => gl::FRONT_AND_BACK,
  }
}

pub(crate) fn face_culling_order_to_glenum(order: FaceCullingOrder) -> GLenum {
  match order {
    FaceCullingOrder::CW => gl::CW,
    FaceCullingOrder::CCW => gl::CCW,
  }
}

pub(crate) fn texture_target_to_glenum(target: TextureTarget) -> GLenum {
  match target {
    TextureTarget::Texture2D => gl::TEXTURE_2D,
  }
}

pub(crate) fn mag_filter_to_glint(filter: MagFilter) -> GLint {
  let e = match filter {
    MagFilter::Nearest => gl::NEAREST,
    MagFilter::Linear => gl::LINEAR,
  };

  e as GLint
}

pub(crate) fn min_filter_to_glint(filter: MinFilter) -> GLint {
  let e = match filter {
    MinFilter::Nearest => gl::NEAREST,
    MinFilter::Linear => gl::LINEAR,
    MinFilter::NearestMipmapNearest => gl::NEAREST_MIPMAP_NEAREST,
    MinFilter::LinearMipmapNearest => gl::LINEAR_MIPMAP_NEAREST,
    MinFilter::NearestMipmapLinear => gl::NEAREST_MIPMAP_LINEAR,
    MinFilter::LinearMipmapLinear => gl::LINEAR_MIPMAP_LINEAR,
  };

  e as GLint
}

pub(crate) fn wrap_to_glint(wrap: Wrap) -> GLint {
  let e = match wrap {
    Wrap::Repeat => gl::REPEAT,
    Wrap::ClampToEdge => gl::CLAMP_TO_EDGE,
    Wrap::MirroredRepeat => gl::MIRRORED_REPEAT,
  };

  e as GLint
}

/// Internal format, format and component type of a pixel format.
pub(crate) fn pixel_format_to_glenums(format: PixelFormat) -> (GLenum, GLenum, GLenum) {
  match format {
    PixelFormat::Rgba8 => (gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
    PixelFormat::Rgb8 => (gl::RGB8, gl::RGB, gl::UNSIGNED_BYTE),
    PixelFormat::R8 => (gl::R8, gl::RED, gl::UNSIGNED_BYTE),
    PixelFormat::Depth16 => (gl::DEPTH_COMPONENT16, gl::DEPTH_COMPONENT, gl::UNSIGNED_SHORT),
    PixelFormat::Depth32F => (gl::DEPTH_COMPONENT32F, gl::DEPTH_COMPONENT, gl::FLOAT),
    PixelFormat::Depth24Stencil8 => (gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8),
  }
}

pub(crate) fn buffer_target_to_glenum(target: BufferTarget) -> GLenum {
  match target {
    BufferTarget::Array => gl::ARRAY_BUFFER,
    BufferTarget::ElementArray => gl::ELEMENT_ARRAY_BUFFER,
  }
}

pub(crate) fn buffer_usage_to_glenum(usage: BufferUsage) -> GLenum {
  match usage {
    BufferUsage::Static => gl::STATIC_DRAW,
    BufferUsage::Dynamic => gl::DYNAMIC_DRAW,
    BufferUsage::Stream => gl::STREAM_DRAW,
  }
}

pub(crate) fn primitive_mode_to_glenum(mode: PrimitiveMode) -> GLenum {
  match mode {
    PrimitiveMode::Points => gl::POINTS,
    PrimitiveMode::LineStrip => gl::LINE_STRIP,
    PrimitiveMode::LineLoop => gl::LINE_LOOP,
    PrimitiveMode::Lines => gl::LINES,
    PrimitiveMode::TriangleStrip => gl::TRIANGLE_STRIP,
    PrimitiveMode::TriangleFan => gl::TRIANGLE_FAN,
    PrimitiveMode::Triangles => gl::TRIANGLES,
  }
}

pub(crate) fn index_type_to_glenum(ty: IndexType) -> GLenum {
  match ty {
    IndexType::U16 => gl::UNSIGNED_SHORT,
    IndexType::U32 => gl::UNSIGNED_INT,
  }
}

pub(crate) fn attrib_type_to_glenum(ty: VertexAttribType) -> GLenum {
  match ty {
    VertexAttribType::F32 => gl::FLOAT,
    VertexAttribType::U8 => gl::UNSIGNED_BYTE,
    VertexAttribType::U16 => gl::UNSIGNED_SHORT,
    VertexAttribType::I16 => gl::SHORT,
    VertexAttribType::U32 => gl::UNSIGNED_INT,
    VertexAttribType::I32 => gl::INT,
  }
}

pub(crate) fn attachment_to_glenum(attachment: Attachment) -> GLenum {
  match attachment {
    Attachment::Color(i) => gl::COLOR_ATTACHMENT0 + i,
    Attachment::Depth => gl::DEPTH_ATTACHMENT,
    Attachment::DepthStencil => gl::DEPTH_STENCIL_ATTACHMENT,
  }
}

pub(crate) fn glenum_to_error(e: GLenum) -> Option<GlError> {
  match e {
    gl::NO_ERROR => None,
    gl::INVALID_ENUM => Some(GlError::InvalidEnum),
    gl::INVALID_VALUE => Some(GlError::InvalidValue),
    gl::INVALID_OPERATION => Some(GlError::InvalidOperation),
    gl::OUT_OF_MEMORY => Some(GlError::OutOfMemory),
    gl::INVALID_FRAMEBUFFER_OPERATION => Some(GlError::InvalidFramebufferOperation),
    _ => Some(GlError::Unknown(e)),
  }
}

pub(crate) fn framebuffer_status(status: GLenum) -> Result<(), IncompleteReason> {
  match status {
    gl::FRAMEBUFFER_COMPLETE => Ok(()),
    gl::FRAMEBUFFER_UNDEFINED => Err(IncompleteReason::Undefined),
    gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => Err(IncompleteReason::IncompleteAttachment),
    gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => Err(IncompleteReason::MissingAttachment),
    gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => Err(IncompleteReason::IncompleteDrawBuffer),
    gl::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => Err(IncompleteReason::IncompleteReadBuffer),
    gl::FRAMEBUFFER_UNSUPPORTED => Err(IncompleteReason::Unsupported),
    gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => Err(IncompleteReason::IncompleteMultisample),
    gl::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => Err(IncompleteReason::IncompleteLayerTargets),
    _ => Err(IncompleteReason::Unknown(status)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_codes() {
    assert_eq!(glenum_to_error(gl::NO_ERROR), None);
    assert_eq!(glenum_to_error(gl::OUT_OF_MEMORY), Some(GlError::OutOfMemory));
    assert_eq!(glenum_to_error(0xdead), Some(GlError::Unknown(0xdead)));
  }

  #[test]
  fn unknown_framebuffer_status_is_reported() {
    assert_eq!(framebuffer_status(gl::FRAMEBUFFER_COMPLETE), Ok(()));
    assert_eq!(
      framebuffer_status(0x1234),
      Err(IncompleteReason::Unknown(0x1234))
    );
  }

  #[test]
  fn color_attachments_are_contiguous() {
    assert_eq!(attachment_to_glenum(Attachment::Color(0)), gl::COLOR_ATTACHMENT0);
    assert_eq!(attachment_to_glenum(Attachment::Color(3)), gl::COLOR_ATTACHMENT3);
  }
}
