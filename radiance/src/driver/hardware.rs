//! Hardware buffers: GPU-side copies of mesh buffers.

use log::warn;

use crate::backend::{BufferTarget, GlApi};
use crate::mesh::{GpuBuffer, HardwareBufferLink, MappingHint, MeshBuffer, MeshBufferId};
use crate::state::StateCache;

use super::draw::{IndexSource, VertexSource};
use super::Driver;

/// Upload content into a link slot, creating the buffer on first use.
///
/// Storage is reused when large enough, reallocated otherwise.
fn upload<A>(
  state: &mut StateCache<A>,
  slot: &mut Option<GpuBuffer>,
  target: BufferTarget,
  data: &[u8],
  hint: MappingHint,
) where
  A: GlApi,
{
  let mut buffer = match *slot {
    Some(buffer) => buffer,
    None => GpuBuffer {
      handle: state.raw().create_buffer(),
      size: 0,
    },
  };

  state.bind_buffer(target, buffer.handle);

  if buffer.size > 0 && buffer.size >= data.len() {
    state.raw().buffer_sub_data(target, 0, data);
  } else {
    state.raw().buffer_data(target, data, hint.usage());
    buffer.size = data.len();
  }

  *slot = Some(buffer);
}

impl<A> Driver<A>
where
  A: GlApi,
{
  /// Hardware buffers of a mesh, created and uploaded on first request.
  ///
  /// `None` if the mesh never wants to be cached or the first upload failed. A mesh whose both
  /// hints went back to [`MappingHint::Never`] loses the buffers it had.
  pub fn hardware_buffer(&mut self, mesh: &MeshBuffer) -> Option<&HardwareBufferLink> {
    if mesh.vertex_hint() == MappingHint::Never && mesh.index_hint() == MappingHint::Never {
      self.remove_hardware_buffer(mesh.id());
      return None;
    }

    if !self.hw_buffers.contains_key(&mesh.id()) {
      self.hw_buffers.insert(mesh.id(), HardwareBufferLink::new(mesh));

      if !self.update_hardware_buffer(mesh) {
        self.remove_hardware_buffer(mesh.id());
        return None;
      }
    }

    self.hw_buffers.get(&mesh.id())
  }

  /// Re-upload whatever side of a mesh changed since its last upload.
  ///
  /// Returns `false` if the mesh has no hardware buffers or the upload raised a GPU error.
  pub fn update_hardware_buffer(&mut self, mesh: &MeshBuffer) -> bool {
    let Some(link) = self.hw_buffers.get_mut(&mesh.id()) else {
      return false;
    };

    let state = &mut self.pipeline.state;

    // hint changes force a full upload of that side
    if link.vertex_hint != mesh.vertex_hint() {
      link.vertex_hint = mesh.vertex_hint();
      link.vertex_version = mesh.vertex_version().wrapping_sub(1);
    }

    if link.index_hint != mesh.index_hint() {
      link.index_hint = mesh.index_hint();
      link.index_version = mesh.index_version().wrapping_sub(1);
    }

    // sides no longer cached go back to client memory
    for (hint, slot) in [
      (link.vertex_hint, &mut link.vertex),
      (link.index_hint, &mut link.index),
    ] {
      if hint == MappingHint::Never {
        if let Some(buffer) = slot.take() {
          state.delete_buffer(buffer.handle);
        }
      }
    }

    if link.vertex_outdated(mesh) {
      upload(
        state,
        &mut link.vertex,
        BufferTarget::Array,
        mesh.vertices().as_bytes(),
        link.vertex_hint,
      );
      link.vertex_version = mesh.vertex_version();
    }

    if link.index_outdated(mesh) {
      upload(
        state,
        &mut link.index,
        BufferTarget::ElementArray,
        mesh.indices().as_slice().as_bytes(),
        link.index_hint,
      );
      link.index_version = mesh.index_version();
    }

    !self.test_gl_error(line!())
  }

  /// Draw a mesh from its hardware buffers, updating them first.
  ///
  /// Sides without a hardware buffer are streamed from client memory. Returns `false` if the mesh
  /// has no hardware buffers, in which case nothing is drawn. A failed update deletes the buffers.
  pub fn draw_hardware_buffer(&mut self, mesh: &MeshBuffer) -> bool {
    if self.hardware_buffer(mesh).is_none() {
      return false;
    }

    if !self.update_hardware_buffer(mesh) {
      warn!("Hardware buffer update failed, dropping the buffers of mesh {:?}", mesh.id());
      self.remove_hardware_buffer(mesh.id());
      return false;
    }

    let Some(link) = self.hw_buffers.get(&mesh.id()) else {
      return false;
    };

    let vertices = match link.vertex_buffer() {
      Some(buffer) => VertexSource::Buffer(buffer),
      None => VertexSource::Client(mesh.vertices().as_bytes()),
    };

    let index_slice = mesh.indices().as_slice();
    let indices = match link.index_buffer() {
      Some(buffer) => IndexSource::Buffer(buffer, index_slice.index_type()),
      None => IndexSource::Client(index_slice),
    };

    self.draw_primitives(
      vertices,
      mesh.vertices().len(),
      mesh.vertices().vertex_type(),
      indices,
      mesh.primitive_count(),
      mesh.primitive_type(),
    );

    true
  }

  /// Delete the hardware buffers of a mesh.
  pub fn remove_hardware_buffer(&mut self, id: MeshBufferId) {
    if let Some(link) = self.hw_buffers.remove(&id) {
      for buffer in [link.vertex, link.index].into_iter().flatten() {
        self.pipeline.state.delete_buffer(buffer.handle);
      }
    }
  }

  pub fn remove_all_hardware_buffers(&mut self) {
    let ids: Vec<_> = self.hw_buffers.keys().copied().collect();

    for id in ids {
      self.remove_hardware_buffer(id);
    }
  }

  pub fn hardware_buffer_count(&self) -> usize {
    self.hw_buffers.len()
  }
}

#[cfg(test)]
mod tests {
  use glam::{Vec2, Vec3};

  use super::*;
  use crate::backend::recording::{CallLog, GlCall, RecordingGl};
  use crate::color::Color;
  use crate::config::DriverConfig;
  use crate::mesh::{BufferKind, Indices, PrimitiveType, Vertices};
  use crate::shader::MemoryShaderLoader;
  use crate::vertex::StandardVertex;

  fn driver() -> (Driver<RecordingGl>, CallLog) {
    let (gl, log) = RecordingGl::new();
    let driver = Driver::headless(gl, DriverConfig::default(), Box::new(MemoryShaderLoader::new()));
    log.clear();
    (driver, log)
  }

  fn static_mesh() -> MeshBuffer {
    let vertices = [Vec3::ZERO, Vec3::X, Vec3::Y]
      .map(|pos| StandardVertex::new(pos, Vec3::Z, Color::WHITE, Vec2::ZERO))
      .to_vec();
    let mut mesh = MeshBuffer::new(
      Vertices::Standard(vertices),
      Indices::U16(vec![0, 1, 2]),
      PrimitiveType::Triangles,
    );
    mesh.set_hardware_mapping_hint(MappingHint::Static, BufferKind::VertexAndIndex);
    mesh
  }

  #[test]
  fn uncached_meshes_release_their_buffers() {
    let (mut driver, log) = driver();
    let mut mesh = static_mesh();

    driver.draw_mesh_buffer(&mesh);
    assert_eq!(driver.hardware_buffer_count(), 1);
    log.clear();

    mesh.set_hardware_mapping_hint(MappingHint::Never, BufferKind::VertexAndIndex);
    driver.draw_mesh_buffer(&mesh);

    assert_eq!(driver.hardware_buffer_count(), 0);
    assert_eq!(log.count(|c| matches!(c, GlCall::DeleteBuffer(_))), 2);
    assert_eq!(log.draw_count(), 1);
  }

  #[cfg(debug_assertions)]
  #[test]
  fn failed_updates_fall_back_to_client_memory() {
    let (mut driver, log) = driver();
    let mut mesh = static_mesh();

    driver.draw_mesh_buffer(&mesh);
    log.clear();

    mesh.set_dirty(BufferKind::Vertex);
    log.push_error(crate::backend::GlError::OutOfMemory);
    driver.draw_mesh_buffer(&mesh);

    assert_eq!(driver.hardware_buffer_count(), 0);
    assert_eq!(log.draw_count(), 1);
  }
}
