//! Primitive submission.

use bytemuck::cast_slice;
use glam::{Vec2, Vec3};
use log::{error, warn};

use crate::backend::{BufferHandle, BufferTarget, BufferUsage, GlApi, IndexType, PrimitiveMode};
use crate::color::Color;
use crate::mesh::{IndexSlice, MeshBuffer, PrimitiveType};
use crate::vertex::{StandardVertex, Vertex, VertexLayout, VertexType};

use super::{Driver, MAX_PRIMITIVE_COUNT};

/// Where vertices are read from.
#[derive(Clone, Copy, Debug)]
pub(crate) enum VertexSource<'a> {
  /// Client memory, streamed before the draw.
  Client(&'a [u8]),
  Buffer(BufferHandle),
}

/// Where indices are read from.
#[derive(Clone, Copy, Debug)]
pub(crate) enum IndexSource<'a> {
  Client(IndexSlice<'a>),
  Buffer(BufferHandle, IndexType),
}

impl<'a> IndexSource<'a> {
  fn index_type(&self) -> IndexType {
    match self {
      IndexSource::Client(slice) => slice.index_type(),
      IndexSource::Buffer(_, index_type) => *index_type,
    }
  }
}

/// Number of indices read to draw primitives of a topology.
pub(crate) fn index_count(primitive_type: PrimitiveType, primitive_count: usize) -> usize {
  match primitive_type {
    PrimitiveType::Points | PrimitiveType::PointSprites | PrimitiveType::LineLoop => primitive_count,
    PrimitiveType::LineStrip => primitive_count + 1,
    PrimitiveType::Lines => primitive_count * 2,
    PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => primitive_count + 2,
    PrimitiveType::Triangles => primitive_count * 3,
  }
}

fn is_points(primitive_type: PrimitiveType) -> bool {
  matches!(primitive_type, PrimitiveType::Points | PrimitiveType::PointSprites)
}

impl<A> Driver<A>
where
  A: GlApi,
{
  /// Draw primitives from client memory with the current material.
  ///
  /// Empty lists and lists longer than [`MAX_PRIMITIVE_COUNT`] are ignored.
  pub fn draw_vertex_primitive_list<V>(
    &mut self,
    vertices: &[V],
    indices: IndexSlice,
    primitive_count: usize,
    primitive_type: PrimitiveType,
  ) where
    V: Vertex,
  {
    self.draw_primitives(
      VertexSource::Client(cast_slice(vertices)),
      vertices.len(),
      V::TYPE,
      IndexSource::Client(indices),
      primitive_count,
      primitive_type,
    );
  }

  /// Draw a mesh buffer, from its hardware buffers if it asks for them.
  pub fn draw_mesh_buffer(&mut self, mesh: &MeshBuffer) {
    if self.draw_hardware_buffer(mesh) {
      return;
    }

    self.draw_primitives(
      VertexSource::Client(mesh.vertices().as_bytes()),
      mesh.vertices().len(),
      mesh.vertices().vertex_type(),
      IndexSource::Client(mesh.indices().as_slice()),
      mesh.primitive_count(),
      mesh.primitive_type(),
    );
  }

  /// Draw a line in world space with the current material.
  pub fn draw_3d_line(&mut self, start: Vec3, end: Vec3, color: Color) {
    self.set_render_states_3d_mode(VertexType::Standard);

    let vertices = [
      StandardVertex::new(start, Vec3::ZERO, color, Vec2::ZERO),
      StandardVertex::new(end, Vec3::ZERO, color, Vec2::ZERO),
    ];

    self.draw_client_arrays(VertexType::Standard, cast_slice(&vertices), PrimitiveMode::Lines, 2);
  }

  pub(crate) fn draw_primitives(
    &mut self,
    vertices: VertexSource,
    vertex_count: usize,
    vertex_type: VertexType,
    indices: IndexSource,
    primitive_count: usize,
    primitive_type: PrimitiveType,
  ) {
    if primitive_count == 0 || vertex_count == 0 {
      return;
    }

    if primitive_count > MAX_PRIMITIVE_COUNT {
      warn!(
        "Could not draw {} primitives, the maximum is {}",
        primitive_count, MAX_PRIMITIVE_COUNT
      );
      return;
    }

    let index_type = indices.index_type();

    if index_type == IndexType::U32 && !self.pipeline.caps.element_index_u32 {
      error!("32-bit indices are not supported by this context; draw skipped");
      return;
    }

    let count = index_count(primitive_type, primitive_count);

    if is_points(primitive_type) {
      if vertex_count < count {
        warn!("{} points requested from {} vertices; draw skipped", count, vertex_count);
        return;
      }
    } else if let IndexSource::Client(slice) = indices {
      if slice.len() < count {
        warn!("{} indices needed, {} given; draw skipped", count, slice.len());
        return;
      }
    }

    self.set_render_states_3d_mode(vertex_type);

    let layout = vertex_type.layout();
    self.bind_vertices(vertices, layout);

    if is_points(primitive_type) {
      self.pipeline.state.raw().draw_arrays(PrimitiveMode::Points, 0, count);
    } else {
      match indices {
        IndexSource::Client(slice) => {
          let bytes = &slice.as_bytes()[..count * index_type.size()];
          self.pipeline.state.bind_element_array_buffer(self.stream_indices);
          self
            .pipeline
            .state
            .raw()
            .buffer_data(BufferTarget::ElementArray, bytes, BufferUsage::Stream);
        }

        IndexSource::Buffer(buffer, _) => self.pipeline.state.bind_element_array_buffer(buffer),
      }

      let mode = self.primitive_mode(primitive_type);
      self.pipeline.state.raw().draw_elements(mode, count, index_type, 0);
    }

    self.unbind_vertices(layout);

    self.stats.primitives += primitive_count;
    self.stats.draw_calls += 1;
  }

  fn primitive_mode(&self, primitive_type: PrimitiveType) -> PrimitiveMode {
    match primitive_type {
      PrimitiveType::Points | PrimitiveType::PointSprites => PrimitiveMode::Points,
      PrimitiveType::LineStrip => PrimitiveMode::LineStrip,
      PrimitiveType::LineLoop => PrimitiveMode::LineLoop,
      PrimitiveType::Lines => PrimitiveMode::Lines,
      PrimitiveType::TriangleStrip => PrimitiveMode::TriangleStrip,
      PrimitiveType::TriangleFan => PrimitiveMode::TriangleFan,
      PrimitiveType::Triangles if self.last_material.wireframe => PrimitiveMode::Lines,
      PrimitiveType::Triangles if self.last_material.point_cloud => PrimitiveMode::Points,
      PrimitiveType::Triangles => PrimitiveMode::Triangles,
    }
  }

  /// Draw non-indexed vertices from client memory, with the render states already set.
  pub(crate) fn draw_client_arrays(
    &mut self,
    vertex_type: VertexType,
    vertices: &[u8],
    mode: PrimitiveMode,
    count: usize,
  ) {
    let layout = vertex_type.layout();

    self.bind_vertices(VertexSource::Client(vertices), layout);
    self.pipeline.state.raw().draw_arrays(mode, 0, count);
    self.unbind_vertices(layout);

    self.stats.draw_calls += 1;
  }

  pub(crate) fn bind_vertices(&mut self, source: VertexSource, layout: &VertexLayout) {
    let state = &mut self.pipeline.state;

    match source {
      VertexSource::Client(bytes) => {
        state.bind_array_buffer(self.stream_vertices);
        state
          .raw()
          .buffer_data(BufferTarget::Array, bytes, BufferUsage::Stream);
      }

      VertexSource::Buffer(buffer) => state.bind_array_buffer(buffer),
    }

    let api = state.raw();

    for attribute in layout.attributes {
      api.enable_vertex_attrib(attribute.semantics.index());
      api.vertex_attrib_pointer(attribute, layout.stride, 0);
    }
  }

  pub(crate) fn unbind_vertices(&mut self, layout: &VertexLayout) {
    let api = self.pipeline.state.raw();

    for attribute in layout.attributes {
      api.disable_vertex_attrib(attribute.semantics.index());
    }
  }
}
