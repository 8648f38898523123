//! Mesh buffers and their GPU-side links.
//!
//! A [`MeshBuffer`] owns CPU-side vertices and indices along with a hardware mapping hint per
//! side. Mutable access to either side bumps that side's version counter; the driver compares
//! those versions with the ones recorded in the [`HardwareBufferLink`] it keeps for the mesh to
//! decide whether a re-upload is needed.

use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::cast_slice;

use crate::backend::{BufferHandle, BufferUsage, IndexType};
use crate::vertex::{StandardVertex, TangentsVertex, TwoTCoordsVertex, VertexType};

static NEXT_MESH_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a mesh buffer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MeshBufferId(u64);

impl MeshBufferId {
  fn next() -> Self {
    MeshBufferId(NEXT_MESH_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
  }
}

/// How a mesh buffer side should be cached on the GPU.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum MappingHint {
  /// Never cached; drawn from client memory.
  #[default]
  Never,
  Static,
  Dynamic,
  Stream,
}

impl MappingHint {
  pub fn usage(self) -> BufferUsage {
    match self {
      MappingHint::Static => BufferUsage::Static,
      _ => BufferUsage::Dynamic,
    }
  }
}

/// Side(s) of a mesh buffer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BufferKind {
  Vertex,
  Index,
  VertexAndIndex,
}

impl BufferKind {
  fn has_vertex(self) -> bool {
    self != BufferKind::Index
  }

  fn has_index(self) -> bool {
    self != BufferKind::Vertex
  }
}

/// Primitive topology of submitted geometry.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum PrimitiveType {
  Points,
  PointSprites,
  LineStrip,
  LineLoop,
  Lines,
  TriangleStrip,
  TriangleFan,
  #[default]
  Triangles,
}

impl PrimitiveType {
  /// Number of primitives described by a number of indices.
  pub fn primitive_count(self, index_count: usize) -> usize {
    match self {
      PrimitiveType::Points | PrimitiveType::PointSprites | PrimitiveType::LineLoop => index_count,
      PrimitiveType::LineStrip => index_count.saturating_sub(1),
      PrimitiveType::Lines => index_count / 2,
      PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => index_count.saturating_sub(2),
      PrimitiveType::Triangles => index_count / 3,
    }
  }
}

/// Vertex storage of a mesh buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum Vertices {
  Standard(Vec<StandardVertex>),
  TwoTCoords(Vec<TwoTCoordsVertex>),
  Tangents(Vec<TangentsVertex>),
}

impl Vertices {
  pub fn vertex_type(&self) -> VertexType {
    match self {
      Vertices::Standard(_) => VertexType::Standard,
      Vertices::TwoTCoords(_) => VertexType::TwoTCoords,
      Vertices::Tangents(_) => VertexType::Tangents,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Vertices::Standard(v) => v.len(),
      Vertices::TwoTCoords(v) => v.len(),
      Vertices::Tangents(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn as_bytes(&self) -> &[u8] {
    match self {
      Vertices::Standard(v) => cast_slice(v),
      Vertices::TwoTCoords(v) => cast_slice(v),
      Vertices::Tangents(v) => cast_slice(v),
    }
  }
}

/// Index storage of a mesh buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum Indices {
  U16(Vec<u16>),
  U32(Vec<u32>),
}

impl Indices {
  pub fn as_slice(&self) -> IndexSlice<'_> {
    match self {
      Indices::U16(i) => IndexSlice::U16(i),
      Indices::U32(i) => IndexSlice::U32(i),
    }
  }

  pub fn len(&self) -> usize {
    self.as_slice().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Borrowed indices of either width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IndexSlice<'a> {
  U16(&'a [u16]),
  U32(&'a [u32]),
}

impl<'a> IndexSlice<'a> {
  pub fn index_type(&self) -> IndexType {
    match self {
      IndexSlice::U16(_) => IndexType::U16,
      IndexSlice::U32(_) => IndexType::U32,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      IndexSlice::U16(i) => i.len(),
      IndexSlice::U32(i) => i.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn as_bytes(&self) -> &'a [u8] {
    match *self {
      IndexSlice::U16(i) => cast_slice(i),
      IndexSlice::U32(i) => cast_slice(i),
    }
  }
}

/// Geometry drawable by the driver, optionally cached on the GPU.
#[derive(Debug)]
pub struct MeshBuffer {
  id: MeshBufferId,
  vertices: Vertices,
  indices: Indices,
  primitive_type: PrimitiveType,
  vertex_hint: MappingHint,
  index_hint: MappingHint,
  vertex_version: u32,
  index_version: u32,
}

impl Clone for MeshBuffer {
  // a clone is a distinct mesh, with its own GPU link
  fn clone(&self) -> Self {
    MeshBuffer {
      id: MeshBufferId::next(),
      vertices: self.vertices.clone(),
      indices: self.indices.clone(),
      primitive_type: self.primitive_type,
      vertex_hint: self.vertex_hint,
      index_hint: self.index_hint,
      vertex_version: self.vertex_version,
      index_version: self.index_version,
    }
  }
}

impl MeshBuffer {
  pub fn new(vertices: Vertices, indices: Indices, primitive_type: PrimitiveType) -> Self {
    MeshBuffer {
      id: MeshBufferId::next(),
      vertices,
      indices,
      primitive_type,
      vertex_hint: MappingHint::Never,
      index_hint: MappingHint::Never,
      vertex_version: 1,
      index_version: 1,
    }
  }

  pub fn id(&self) -> MeshBufferId {
    self.id
  }

  pub fn vertices(&self) -> &Vertices {
    &self.vertices
  }

  /// Mutable access to the vertices; marks them changed.
  pub fn vertices_mut(&mut self) -> &mut Vertices {
    self.set_dirty(BufferKind::Vertex);
    &mut self.vertices
  }

  pub fn indices(&self) -> &Indices {
    &self.indices
  }

  /// Mutable access to the indices; marks them changed.
  pub fn indices_mut(&mut self) -> &mut Indices {
    self.set_dirty(BufferKind::Index);
    &mut self.indices
  }

  pub fn primitive_type(&self) -> PrimitiveType {
    self.primitive_type
  }

  pub fn primitive_count(&self) -> usize {
    self.primitive_type.primitive_count(self.indices.len())
  }

  pub fn set_hardware_mapping_hint(&mut self, hint: MappingHint, kind: BufferKind) {
    if kind.has_vertex() {
      self.vertex_hint = hint;
    }

    if kind.has_index() {
      self.index_hint = hint;
    }
  }

  pub fn vertex_hint(&self) -> MappingHint {
    self.vertex_hint
  }

  pub fn index_hint(&self) -> MappingHint {
    self.index_hint
  }

  /// Mark a side as changed.
  pub fn set_dirty(&mut self, kind: BufferKind) {
    if kind.has_vertex() {
      self.vertex_version = self.vertex_version.wrapping_add(1);
    }

    if kind.has_index() {
      self.index_version = self.index_version.wrapping_add(1);
    }
  }

  pub fn vertex_version(&self) -> u32 {
    self.vertex_version
  }

  pub fn index_version(&self) -> u32 {
    self.index_version
  }
}

/// GPU buffer and the size of its storage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GpuBuffer {
  pub handle: BufferHandle,
  pub size: usize,
}

/// GPU-side copy of a mesh buffer.
#[derive(Debug)]
pub struct HardwareBufferLink {
  pub(crate) vertex: Option<GpuBuffer>,
  pub(crate) index: Option<GpuBuffer>,
  pub(crate) vertex_version: u32,
  pub(crate) index_version: u32,
  pub(crate) vertex_hint: MappingHint,
  pub(crate) index_hint: MappingHint,
}

impl HardwareBufferLink {
  pub(crate) fn new(mesh: &MeshBuffer) -> Self {
    HardwareBufferLink {
      vertex: None,
      index: None,
      vertex_version: 0,
      index_version: 0,
      vertex_hint: mesh.vertex_hint,
      index_hint: mesh.index_hint,
    }
  }

  pub fn vertex_buffer(&self) -> Option<BufferHandle> {
    self.vertex.map(|b| b.handle)
  }

  pub fn index_buffer(&self) -> Option<BufferHandle> {
    self.index.map(|b| b.handle)
  }

  pub(crate) fn vertex_outdated(&self, mesh: &MeshBuffer) -> bool {
    self.vertex_hint != MappingHint::Never
      && (self.vertex_version != mesh.vertex_version || self.vertex.is_none())
  }

  pub(crate) fn index_outdated(&self, mesh: &MeshBuffer) -> bool {
    self.index_hint != MappingHint::Never
      && (self.index_version != mesh.index_version || self.index.is_none())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn quad() -> MeshBuffer {
    MeshBuffer::new(
      Vertices::Standard(vec![StandardVertex::default(); 4]),
      Indices::U16(vec![0, 1, 2, 0, 2, 3]),
      PrimitiveType::Triangles,
    )
  }

  #[test]
  fn mutation_bumps_versions() {
    let mut mesh = quad();
    let (v, i) = (mesh.vertex_version(), mesh.index_version());

    let _ = mesh.vertices_mut();
    assert_eq!(mesh.vertex_version(), v + 1);
    assert_eq!(mesh.index_version(), i);

    mesh.set_dirty(BufferKind::VertexAndIndex);
    assert_eq!(mesh.vertex_version(), v + 2);
    assert_eq!(mesh.index_version(), i + 1);
  }

  #[test]
  fn clones_are_distinct_meshes() {
    let mesh = quad();
    assert_ne!(mesh.clone().id(), mesh.id());
  }

  #[test]
  fn link_outdating() {
    let mut mesh = quad();
    mesh.set_hardware_mapping_hint(MappingHint::Static, BufferKind::Vertex);

    let mut link = HardwareBufferLink::new(&mesh);
    assert!(link.vertex_outdated(&mesh));
    assert!(!link.index_outdated(&mesh));

    link.vertex = Some(GpuBuffer {
      handle: BufferHandle(1),
      size: 144,
    });
    link.vertex_version = mesh.vertex_version();
    assert!(!link.vertex_outdated(&mesh));

    mesh.set_dirty(BufferKind::Vertex);
    assert!(link.vertex_outdated(&mesh));
  }

  #[test]
  fn primitive_counts() {
    assert_eq!(quad().primitive_count(), 2);
    assert_eq!(PrimitiveType::TriangleFan.primitive_count(4), 2);
    assert_eq!(PrimitiveType::LineStrip.primitive_count(0), 0);
    assert_eq!(PrimitiveType::Lines.primitive_count(6), 3);
  }

  #[test]
  fn byte_views() {
    let mesh = quad();

    assert_eq!(mesh.vertices().as_bytes().len(), 4 * 36);
    assert_eq!(mesh.indices().as_slice().as_bytes().len(), 12);
    assert_eq!(mesh.indices().as_slice().index_type(), IndexType::U16);
  }
}
