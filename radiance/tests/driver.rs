//! End-to-end driver tests, run against the recording backend.

use glam::{IVec2, UVec2, Vec2, Vec3};
use radiance::backend::recording::{read_records, CallLog, GlCall, RecordingGl};
use radiance::backend::{
  BufferTarget, Capabilities, ClearFlags, IndexType, PixelFormat, TextureParameter, UniformValue, Wrap,
};
use radiance::blending::{AlphaSource, Factor, Modulate, PackedBlendFunc};
use radiance::mesh::{BufferKind, IndexSlice, Indices, MappingHint, MeshBuffer, PrimitiveType, Vertices};
use radiance::renderer::BaseBlending;
use radiance::shader::MemoryShaderLoader;
use radiance::texture::TextureClamp;
use radiance::vertex::{Image2DVertex, StandardVertex};
use radiance::{Color, Driver, DriverConfig, Material, MaterialType, Rect};

const SHADERS: [&str; 18] = [
  "Solid.vsh",
  "Solid.fsh",
  "Solid2.vsh",
  "Solid2Layer.fsh",
  "LightmapModulate.fsh",
  "LightmapAdd.fsh",
  "DetailMap.fsh",
  "SphereMap.vsh",
  "SphereMap.fsh",
  "Reflection2Layer.vsh",
  "Reflection2Layer.fsh",
  "TransparentAlphaChannel.fsh",
  "TransparentAlphaChannelRef.fsh",
  "TransparentVertexAlpha.fsh",
  "OneTextureBlend.fsh",
  "Renderer2D.vsh",
  "Renderer2D.fsh",
  "Renderer2D_noTex.fsh",
];

fn shader_loader() -> MemoryShaderLoader {
  SHADERS
    .iter()
    .fold(MemoryShaderLoader::new(), |loader, name| {
      loader.with(*name, "void main() {}")
    })
}

fn driver() -> (Driver<RecordingGl>, CallLog) {
  let _ = env_logger::builder().is_test(true).try_init();

  let (gl, log) = RecordingGl::new();
  let config = DriverConfig::default().with_screen_size([640, 480]);
  let driver = Driver::headless(gl, config, Box::new(shader_loader()));
  log.clear();

  (driver, log)
}

fn triangle() -> [StandardVertex; 3] {
  [
    StandardVertex::new(Vec3::ZERO, Vec3::Z, Color::WHITE, Vec2::ZERO),
    StandardVertex::new(Vec3::X, Vec3::Z, Color::WHITE, Vec2::X),
    StandardVertex::new(Vec3::Y, Vec3::Z, Color::WHITE, Vec2::Y),
  ]
}

fn draw_triangle(driver: &mut Driver<RecordingGl>) {
  driver.draw_vertex_primitive_list(
    &triangle(),
    IndexSlice::U16(&[0, 1, 2]),
    1,
    PrimitiveType::Triangles,
  );
}

#[test]
fn equal_materials_are_applied_once() {
  let (mut driver, log) = driver();

  driver.set_material(Material::default());
  draw_triangle(&mut driver);

  assert_eq!(log.draw_count(), 1);
  log.clear();

  driver.set_material(Material::default());
  draw_triangle(&mut driver);

  assert_eq!(log.draw_count(), 1);
  assert_eq!(log.count(|c| matches!(c, GlCall::UseProgram(_))), 0);
  assert_eq!(log.count(|c| matches!(c, GlCall::Enable(_) | GlCall::Disable(_))), 0);
  assert_eq!(driver.frame_stats().primitives, 2);
}

#[test]
fn empty_and_oversized_lists_draw_nothing() {
  let (mut driver, log) = driver();

  driver.draw_vertex_primitive_list(
    &triangle(),
    IndexSlice::U16(&[0, 1, 2]),
    0,
    PrimitiveType::Triangles,
  );
  driver.draw_vertex_primitive_list::<StandardVertex>(
    &[],
    IndexSlice::U16(&[0, 1, 2]),
    1,
    PrimitiveType::Triangles,
  );

  let indices = vec![0u16; 3 * 65536];
  driver.draw_vertex_primitive_list(
    &triangle(),
    IndexSlice::U16(&indices),
    65536,
    PrimitiveType::Triangles,
  );

  assert_eq!(log.draw_count(), 0);
  assert_eq!(driver.maximal_primitive_count(), 65535);
}

#[test]
fn one_texture_blend_uploads_the_blend_type() {
  let (mut driver, log) = driver();

  let material = Material {
    material_type_param: PackedBlendFunc::new(
      Factor::SrcAlpha,
      Factor::SrcAlphaComplement,
      Modulate::X1,
      AlphaSource::TEXTURE,
    )
    .pack(),
    ..Material::default().with_type(MaterialType::ONE_TEXTURE_BLEND)
  };

  driver.set_material(material);
  draw_triangle(&mut driver);

  assert_eq!(log.uniform_uploads("uBlendType"), [UniformValue::Int(2)]);
}

#[test]
fn hardware_buffers_upload_only_changes() {
  let (mut driver, log) = driver();

  let mut mesh = MeshBuffer::new(
    Vertices::Standard(triangle().to_vec()),
    Indices::U16(vec![0, 1, 2]),
    PrimitiveType::Triangles,
  );
  mesh.set_hardware_mapping_hint(MappingHint::Static, BufferKind::VertexAndIndex);

  driver.draw_mesh_buffer(&mesh);
  assert_eq!(log.count(GlCall::is_buffer_upload), 2);
  assert_eq!(driver.hardware_buffer_count(), 1);
  log.clear();

  driver.draw_mesh_buffer(&mesh);
  assert_eq!(log.count(GlCall::is_buffer_upload), 0);
  assert_eq!(log.draw_count(), 1);
  log.clear();

  mesh.set_dirty(BufferKind::Vertex);
  driver.draw_mesh_buffer(&mesh);
  assert_eq!(log.count(GlCall::is_buffer_upload), 1);

  driver.remove_hardware_buffer(mesh.id());
  assert_eq!(driver.hardware_buffer_count(), 0);
}

#[test]
fn client_meshes_have_no_hardware_buffers() {
  let (mut driver, _log) = driver();

  let mesh = MeshBuffer::new(
    Vertices::Standard(triangle().to_vec()),
    Indices::U16(vec![0, 1, 2]),
    PrimitiveType::Triangles,
  );

  assert!(driver.hardware_buffer(&mesh).is_none());
  driver.draw_mesh_buffer(&mesh);
  assert_eq!(driver.hardware_buffer_count(), 0);
}

fn uploaded_image_vertices(log: &CallLog) -> Vec<Image2DVertex> {
  log
    .calls()
    .into_iter()
    .filter_map(|c| match c {
      GlCall::BufferData {
        target: BufferTarget::Array,
        data,
        ..
      } => Some(data),
      _ => None,
    })
    .last()
    .map(|data| read_records(&data))
    .unwrap_or_default()
}

#[test]
fn render_target_textures_are_sampled_flipped() {
  let (mut driver, log) = driver();
  let source = Rect::new(0, 16, 32, 48);

  let image = driver
    .add_texture("image", &image::RgbaImage::new(64, 64))
    .expect("texture");
  let target = driver
    .add_render_target_texture(UVec2::new(64, 64), "rtt", PixelFormat::Rgba8)
    .expect("render target texture");

  log.clear();
  driver.draw_2d_image(&image, IVec2::ZERO, &source, None, Color::WHITE, false);
  let regular = uploaded_image_vertices(&log);

  log.clear();
  driver.draw_2d_image(&target, IVec2::ZERO, &source, None, Color::WHITE, false);
  let flipped = uploaded_image_vertices(&log);

  assert_eq!(regular.len(), 4);
  assert_eq!(flipped.len(), 4);

  for (r, f) in regular.iter().zip(&flipped) {
    assert_eq!(r.pos, f.pos);
    assert_eq!(r.tcoords[0], f.tcoords[0]);
    assert_eq!(r.tcoords[1], 1. - f.tcoords[1]);
  }
}

#[test]
fn image_corners_map_to_ndc() {
  let (mut driver, log) = driver();

  let image = driver
    .add_texture("image", &image::RgbaImage::new(640, 480))
    .expect("texture");
  log.clear();

  driver.draw_2d_image(&image, IVec2::ZERO, &Rect::new(0, 0, 640, 480), None, Color::WHITE, false);

  let vertices = uploaded_image_vertices(&log);
  assert_eq!(vertices[0].pos, [-1., 1., 0.]);
  assert_eq!(vertices[2].pos, [1., -1., 0.]);
  assert_eq!(vertices[0].tcoords, [0., 0.]);
  assert_eq!(vertices[2].tcoords, [1., 1.]);
}

#[test]
fn render_target_size_change_reuploads_matrices() {
  let (mut driver, log) = driver();

  driver.set_material(Material::default());
  draw_triangle(&mut driver);
  let uploads = log.uniform_uploads("uWVPMatrix").len();

  draw_triangle(&mut driver);
  assert_eq!(log.uniform_uploads("uWVPMatrix").len(), uploads);

  let target = driver.add_render_target();
  let color = driver
    .add_render_target_texture(UVec2::new(128, 128), "rtt", PixelFormat::Rgba8)
    .expect("render target texture");
  target.set_texture(color, None);

  assert!(driver.set_render_target(Some(&target), ClearFlags::all(), Color::BLACK, 1., 0));
  draw_triangle(&mut driver);

  assert_eq!(log.uniform_uploads("uWVPMatrix").len(), uploads + 1);
}

#[test]
fn batches_use_the_quad_index_buffer() {
  let (mut driver, log) = driver();

  let image = driver
    .add_texture("atlas", &image::RgbaImage::new(32, 32))
    .expect("texture");
  log.clear();

  let positions = [IVec2::new(0, 0), IVec2::new(16, 0), IVec2::new(32, 0)];
  let sources = [Rect::new(0, 0, 16, 16), Rect::new(16, 0, 32, 16)];
  driver.draw_2d_image_batch(&image, &positions, &sources, None, Color::WHITE, true);

  assert_eq!(uploaded_image_vertices(&log).len(), 8);
  assert_eq!(
    log.count(|c| matches!(c, GlCall::DrawElements { count: 12, .. })),
    1
  );
}

#[test]
fn missing_shaders_keep_builtin_ids_dense() {
  let (gl, _log) = RecordingGl::new();
  let mut driver = Driver::headless(gl, DriverConfig::default(), Box::new(MemoryShaderLoader::new()));

  assert_eq!(driver.material_renderer_count(), MaterialType::BUILTIN_COUNT as usize);

  let custom = driver.add_shader_material("void main() {}", "void main() {}", None, BaseBlending::None, 0);
  assert_eq!(custom, Some(MaterialType(MaterialType::BUILTIN_COUNT)));
}

#[test]
fn failed_shader_materials_are_not_registered() {
  let (mut driver, log) = driver();
  log.fail_compilation(true);

  let custom = driver.add_shader_material("", "", None, BaseBlending::None, 0);

  assert_eq!(custom, None);
  assert_eq!(driver.material_renderer_count(), MaterialType::BUILTIN_COUNT as usize);
}

#[test]
fn screenshots_are_top_down() {
  let (gl, log) = RecordingGl::new();
  let config = DriverConfig::default().with_screen_size([1, 2]);
  let mut driver = Driver::headless(gl, config, Box::new(shader_loader()));

  log.set_read_back(vec![10, 10, 10, 255, 20, 20, 20, 255]);
  let shot = driver.create_screenshot().expect("screenshot");

  assert_eq!(shot.get_pixel(0, 0).0, [20, 20, 20, 255]);
  assert_eq!(shot.get_pixel(0, 1).0, [10, 10, 10, 255]);
}

#[test]
fn drop_releases_gpu_objects() {
  let (mut driver, log) = driver();

  let texture = driver
    .add_texture("t", &image::RgbaImage::new(2, 2))
    .expect("texture");
  let target = driver.add_render_target();
  drop(driver);

  assert!(!texture.is_alive());
  assert!(!target.is_alive());
  assert!(log.calls().contains(&GlCall::DeleteTexture(texture.handle())));
  assert!(log.calls().contains(&GlCall::DeleteFramebuffer(target.framebuffer())));
}

#[test]
fn sampling_changes_reach_bound_textures() {
  let (mut driver, log) = driver();

  let texture = driver
    .add_texture("t", &image::RgbaImage::new(4, 4))
    .expect("texture");
  let material = Material::default().with_texture(0, texture.clone());

  driver.set_material(material.clone());
  draw_triangle(&mut driver);
  log.clear();

  let mut clamped = material;
  clamped.layers[0].wrap_u = TextureClamp::Clamp;
  driver.set_material(clamped.clone());
  draw_triangle(&mut driver);

  assert_eq!(log.count(|c| matches!(c, GlCall::TexParameter(_))), 1);
  assert!(log
    .calls()
    .contains(&GlCall::TexParameter(TextureParameter::WrapS(Wrap::ClampToEdge))));
  assert_eq!(log.count(|c| matches!(c, GlCall::UseProgram(_))), 0);
  assert_eq!(log.draw_count(), 1);
  log.clear();

  driver.set_material(clamped);
  draw_triangle(&mut driver);
  assert_eq!(log.count(|c| matches!(c, GlCall::TexParameter(_))), 0);
}

#[test]
fn wide_indices_need_the_capability() {
  let caps = Capabilities {
    element_index_u32: false,
    ..Capabilities::default()
  };
  let (gl, log) = RecordingGl::with_capabilities(caps);
  let mut narrow = Driver::headless(gl, DriverConfig::default(), Box::new(shader_loader()));
  log.clear();

  narrow.draw_vertex_primitive_list(
    &triangle(),
    IndexSlice::U32(&[0, 1, 2]),
    1,
    PrimitiveType::Triangles,
  );

  assert_eq!(log.draw_count(), 0);
  assert_eq!(log.count(GlCall::is_buffer_upload), 0);

  let (mut wide, log) = driver();
  wide.draw_vertex_primitive_list(
    &triangle(),
    IndexSlice::U32(&[0, 1, 2]),
    1,
    PrimitiveType::Triangles,
  );

  assert_eq!(
    log.count(|c| matches!(
      c,
      GlCall::DrawElements {
        count: 3,
        index_type: IndexType::U32,
        ..
      }
    )),
    1
  );
}

#[test]
fn invalidated_states_are_applied_again() {
  let (mut driver, log) = driver();

  let texture = driver
    .add_texture("t", &image::RgbaImage::new(4, 4))
    .expect("texture");
  driver.set_material(Material::default().with_texture(0, texture.clone()));
  draw_triangle(&mut driver);
  log.clear();

  driver.invalidate_states();
  draw_triangle(&mut driver);

  let calls = log.take();
  assert!(calls.contains(&GlCall::BindTexture(texture.handle())));
  assert!(calls.contains(&GlCall::TexParameter(TextureParameter::WrapS(Wrap::Repeat))));
  assert_eq!(calls.iter().filter(|c| matches!(c, GlCall::UseProgram(_))).count(), 1);
  assert_eq!(calls.iter().filter(|c| c.is_draw()).count(), 1);
}
