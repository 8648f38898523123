//! 2D renderers.
//!
//! The 2D path uses two dedicated programs, one sampling a texture and one using vertex colors
//! only. They are not part of the material renderer registry: the driver selects one of them for
//! every 2D draw, depending on whether a texture is used.

use crate::backend::{ProgramHandle, UniformLocation};
use crate::material::Material;
use crate::renderer::{set_float, set_int, MaterialRenderer, MaterialRendererServices, UniformState};
use crate::vertex::VertexType;

#[derive(Clone, Copy, Debug)]
struct Locations {
  thickness: Option<UniformLocation>,
  texture_usage: Option<UniformLocation>,
  texture_unit: Option<UniformLocation>,
}

#[derive(Debug)]
pub struct Renderer2D {
  program: ProgramHandle,
  textured: bool,
  locations: UniformState<Locations>,
  thickness: f32,
  texture_usage: i32,
}

impl Renderer2D {
  pub fn new(program: ProgramHandle, textured: bool) -> Self {
    Renderer2D {
      program,
      textured,
      locations: UniformState::Unresolved,
      thickness: 1.,
      texture_usage: 0,
    }
  }

  pub fn program(&self) -> ProgramHandle {
    self.program
  }

  pub fn is_textured(&self) -> bool {
    self.textured
  }
}

impl MaterialRenderer for Renderer2D {
  fn on_set_material(
    &mut self,
    material: &Material,
    last_material: &Material,
    reset_all: bool,
    services: &mut dyn MaterialRendererServices,
  ) {
    services.use_program(self.program);
    services.set_basic_render_states(material, last_material, reset_all);

    self.thickness = if material.thickness > 0. {
      material.thickness
    } else {
      1.
    };
    self.texture_usage = material.texture(0).is_some() as i32;
  }

  fn on_render(&mut self, services: &mut dyn MaterialRendererServices, _: VertexType) -> bool {
    if self.program.is_none() {
      return true;
    }

    services.use_program(self.program);

    let loc = *self.locations.resolve(|| Locations {
      thickness: services.uniform_location("uThickness"),
      texture_usage: services.uniform_location("uTextureUsage"),
      texture_unit: services.uniform_location("uTextureUnit"),
    });

    set_float(services, loc.thickness, self.thickness);

    if self.textured {
      set_int(services, loc.texture_usage, self.texture_usage);
      set_int(services, loc.texture_unit, 0);
    }

    true
  }

  fn release(&mut self, services: &mut dyn MaterialRendererServices) {
    if !self.program.is_none() {
      services.delete_program(self.program);
      self.program = ProgramHandle::NONE;
    }
  }
}
