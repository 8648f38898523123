//! Built-in material renderers and program loading.

use log::{error, warn};

use crate::backend::{GlApi, ProgramHandle};
use crate::fixed_pipeline::{
  LightmapCallback, OneTextureBlendCallback, ReflectionCallback, Solid2LayerCallback, SolidCallback,
};
use crate::material::MaterialType;
use crate::renderer::{
  BaseBlending, MaterialRendererRegistry, ShaderConstantSetCallback, ShaderMaterialRenderer,
};
use crate::shader::{ShaderLoadError, ShaderLoader};
use crate::state::StateCache;

struct BuiltinMaterial {
  name: &'static str,
  vertex: &'static str,
  fragment: &'static str,
  callback: fn() -> Box<dyn ShaderConstantSetCallback>,
}

fn solid() -> Box<dyn ShaderConstantSetCallback> {
  Box::new(SolidCallback::new())
}

fn solid_2_layer() -> Box<dyn ShaderConstantSetCallback> {
  Box::new(Solid2LayerCallback::new())
}

fn lightmap_x1() -> Box<dyn ShaderConstantSetCallback> {
  Box::new(LightmapCallback::new(1.))
}

fn lightmap_x2() -> Box<dyn ShaderConstantSetCallback> {
  Box::new(LightmapCallback::new(2.))
}

fn lightmap_x4() -> Box<dyn ShaderConstantSetCallback> {
  Box::new(LightmapCallback::new(4.))
}

fn reflection() -> Box<dyn ShaderConstantSetCallback> {
  Box::new(ReflectionCallback::new())
}

fn one_texture_blend() -> Box<dyn ShaderConstantSetCallback> {
  Box::new(OneTextureBlendCallback::new())
}

// in material type order
const BUILTIN_MATERIALS: [BuiltinMaterial; MaterialType::BUILTIN_COUNT as usize] = [
  BuiltinMaterial {
    name: "solid",
    vertex: "Solid.vsh",
    fragment: "Solid.fsh",
    callback: solid,
  },
  BuiltinMaterial {
    name: "solid_2_layer",
    vertex: "Solid2.vsh",
    fragment: "Solid2Layer.fsh",
    callback: solid_2_layer,
  },
  BuiltinMaterial {
    name: "lightmap",
    vertex: "Solid2.vsh",
    fragment: "LightmapModulate.fsh",
    callback: lightmap_x1,
  },
  BuiltinMaterial {
    name: "lightmap_add",
    vertex: "Solid2.vsh",
    fragment: "LightmapAdd.fsh",
    callback: lightmap_x1,
  },
  BuiltinMaterial {
    name: "lightmap_m2",
    vertex: "Solid2.vsh",
    fragment: "LightmapModulate.fsh",
    callback: lightmap_x2,
  },
  BuiltinMaterial {
    name: "lightmap_m4",
    vertex: "Solid2.vsh",
    fragment: "LightmapModulate.fsh",
    callback: lightmap_x4,
  },
  BuiltinMaterial {
    name: "lightmap_lighting",
    vertex: "Solid2.vsh",
    fragment: "LightmapModulate.fsh",
    callback: lightmap_x1,
  },
  BuiltinMaterial {
    name: "lightmap_lighting_m2",
    vertex: "Solid2.vsh",
    fragment: "LightmapModulate.fsh",
    callback: lightmap_x2,
  },
  BuiltinMaterial {
    name: "lightmap_lighting_m4",
    vertex: "Solid2.vsh",
    fragment: "LightmapModulate.fsh",
    callback: lightmap_x4,
  },
  BuiltinMaterial {
    name: "detail_map",
    vertex: "Solid2.vsh",
    fragment: "DetailMap.fsh",
    callback: solid_2_layer,
  },
  BuiltinMaterial {
    name: "sphere_map",
    vertex: "SphereMap.vsh",
    fragment: "SphereMap.fsh",
    callback: reflection,
  },
  BuiltinMaterial {
    name: "reflection_2_layer",
    vertex: "Reflection2Layer.vsh",
    fragment: "Reflection2Layer.fsh",
    callback: reflection,
  },
  BuiltinMaterial {
    name: "transparent_add_color",
    vertex: "Solid.vsh",
    fragment: "Solid.fsh",
    callback: solid,
  },
  BuiltinMaterial {
    name: "transparent_alpha_channel",
    vertex: "Solid.vsh",
    fragment: "TransparentAlphaChannel.fsh",
    callback: solid,
  },
  BuiltinMaterial {
    name: "transparent_alpha_channel_ref",
    vertex: "Solid.vsh",
    fragment: "TransparentAlphaChannelRef.fsh",
    callback: solid,
  },
  BuiltinMaterial {
    name: "transparent_vertex_alpha",
    vertex: "Solid.vsh",
    fragment: "TransparentVertexAlpha.fsh",
    callback: solid,
  },
  BuiltinMaterial {
    name: "transparent_reflection_2_layer",
    vertex: "Reflection2Layer.vsh",
    fragment: "Reflection2Layer.fsh",
    callback: reflection,
  },
  BuiltinMaterial {
    name: "one_texture_blend",
    vertex: "Solid.vsh",
    fragment: "OneTextureBlend.fsh",
    callback: one_texture_blend,
  },
];

/// Load and link a program from two named sources.
///
/// Failures are logged and yield [`ProgramHandle::NONE`].
pub(crate) fn load_program<A>(
  state: &mut StateCache<A>,
  loader: &dyn ShaderLoader,
  vertex: &str,
  fragment: &str,
) -> ProgramHandle
where
  A: GlApi,
{
  let sources = loader
    .load(vertex)
    .and_then(|vs| loader.load(fragment).map(|fs| (vs, fs)));

  let (vs, fs) = match sources {
    Ok(sources) => sources,

    Err(ShaderLoadError::Missing(path)) => {
      warn!(
        "Missing shader files needed to simulate fixed function materials: {} (the shader search path can be changed with DriverConfig::with_shader_path)",
        path
      );
      return ProgramHandle::NONE;
    }

    Err(e) => {
      error!("{}", e);
      return ProgramHandle::NONE;
    }
  };

  match state.raw().create_program(&vs, &fs) {
    Ok(program) => program,
    Err(e) => {
      error!("cannot build program from {} and {}: {}", vertex, fragment, e);
      ProgramHandle::NONE
    }
  }
}

/// Register the built-in material renderers, in material type order.
pub(crate) fn register_builtin_materials<A>(
  state: &mut StateCache<A>,
  registry: &mut MaterialRendererRegistry,
  loader: &dyn ShaderLoader,
) where
  A: GlApi,
{
  for (index, builtin) in BUILTIN_MATERIALS.iter().enumerate() {
    let program = load_program(state, loader, builtin.vertex, builtin.fragment);
    let blending = BaseBlending::of(MaterialType(index as u32));
    let renderer = ShaderMaterialRenderer::new(program, Some((builtin.callback)()), blending, 0);

    registry.register(renderer, builtin.name);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_follows_material_types() {
    assert_eq!(BUILTIN_MATERIALS[MaterialType::SOLID.index()].name, "solid");
    assert_eq!(BUILTIN_MATERIALS[MaterialType::DETAIL_MAP.index()].fragment, "DetailMap.fsh");
    assert_eq!(
      BUILTIN_MATERIALS[MaterialType::ONE_TEXTURE_BLEND.index()].fragment,
      "OneTextureBlend.fsh"
    );
  }
}
