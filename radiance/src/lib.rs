//! # A cached render-state machine for OpenGL-family backends
//!
//! radiance sits between a scene layer and a graphics API. The scene describes *what* to draw
//! with plain values (a [`Material`], transforms, vertices); radiance turns them into the minimal
//! amount of GPU calls needed to draw it.
//!
//! It is organized around a few pieces:
//!
//! - **State cache**: [`state::StateCache`] mirrors the pipeline state of a context and drops
//!   redundant state changes before they reach the API.
//! - **Material renderers**: every [`MaterialType`] is rendered by a
//!   [`renderer::MaterialRenderer`], registered in a dense registry. Built-in types emulate the
//!   legacy fixed-function materials with shader programs and per-draw uniform callbacks (see
//!   [`fixed_pipeline`]); custom ones can be added at runtime.
//! - **Driver**: [`Driver`] owns the state cache, the renderers and every GPU resource created
//!   through it. It switches between a 2D mode (overlays, images, rectangles) and a 3D mode (scene
//!   geometry), streams client-side vertices, caches mesh buffers on the GPU, renders into
//!   textures and takes screenshots.
//!
//! # Backends
//!
//! The driver is generic over [`backend::GlApi`], a thin trait mirroring the OpenGL entry points
//! it needs. The OpenGL 3.3 implementation lives in the `radiance-gl` crate. A headless,
//! recording implementation, [`backend::recording::RecordingGl`], is shipped here to test code
//! using the driver without a GPU.
//!
//! # Errors
//!
//! Only driver creation can fail loudly, with a [`DriverError`]. Everything done per frame
//! degrades instead: invalid input is a no-op, and failures are logged through the [`log`] crate
//! and reported as `bool` / `Option` returns.
//!
//! [`log`]: https://crates.io/crates/log

pub mod backend;
pub mod blending;
pub mod color;
pub mod config;
pub mod context;
pub mod depth_test;
pub mod driver;
pub mod error;
pub mod face_culling;
pub mod fixed_pipeline;
pub mod fog;
pub mod material;
pub mod mesh;
pub mod rect;
pub mod render_target;
pub mod renderer;
pub mod renderer2d;
pub mod shader;
pub mod state;
pub mod texture;
pub mod transform;
pub mod vertex;

pub use crate::color::{Color, Colorf};
pub use crate::config::DriverConfig;
pub use crate::driver::{Driver, FrameStats, RenderMode};
pub use crate::error::DriverError;
pub use crate::material::{Material, MaterialType};
pub use crate::rect::Rect;
pub use crate::render_target::RenderTarget;
pub use crate::texture::Texture;
