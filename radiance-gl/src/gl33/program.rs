//! Shader stages and programs.

use std::ffi::CString;
use std::ptr::{null, null_mut};

use gl::types::*;
use radiance::backend::{ProgramError, StageKind};
use radiance::vertex::Semantics;

fn stage_to_glenum(kind: StageKind) -> GLenum {
  match kind {
    StageKind::Vertex => gl::VERTEX_SHADER,
    StageKind::Fragment => gl::FRAGMENT_SHADER,
  }
}

/// Compiled shader stage, deleted when dropped.
struct Stage {
  handle: GLuint,
}

impl Drop for Stage {
  fn drop(&mut self) {
    unsafe {
      gl::DeleteShader(self.handle);
    }
  }
}

unsafe fn shader_info_log(handle: GLuint) -> String {
  let mut log_len: GLint = 0;
  gl::GetShaderiv(handle, gl::INFO_LOG_LENGTH, &mut log_len);

  let mut log: Vec<u8> = vec![0; log_len.max(0) as usize];
  gl::GetShaderInfoLog(handle, log_len, null_mut(), log.as_mut_ptr() as *mut GLchar);

  String::from_utf8_lossy(&log).trim_end_matches('\0').to_owned()
}

unsafe fn program_info_log(handle: GLuint) -> String {
  let mut log_len: GLint = 0;
  gl::GetProgramiv(handle, gl::INFO_LOG_LENGTH, &mut log_len);

  let mut log: Vec<u8> = vec![0; log_len.max(0) as usize];
  gl::GetProgramInfoLog(handle, log_len, null_mut(), log.as_mut_ptr() as *mut GLchar);

  String::from_utf8_lossy(&log).trim_end_matches('\0').to_owned()
}

unsafe fn compile_stage(kind: StageKind, src: &str) -> Result<Stage, ProgramError> {
  let c_src = CString::new(src).map_err(|_| ProgramError::CompilationFailed {
    stage: kind,
    log: "source contains a nul byte".to_owned(),
  })?;

  let handle = gl::CreateShader(stage_to_glenum(kind));

  if handle == 0 {
    return Err(ProgramError::StageCreation(kind));
  }

  let stage = Stage { handle };

  gl::ShaderSource(handle, 1, [c_src.as_ptr()].as_ptr(), null());
  gl::CompileShader(handle);

  let mut compiled: GLint = gl::FALSE.into();
  gl::GetShaderiv(handle, gl::COMPILE_STATUS, &mut compiled);

  if compiled == gl::TRUE.into() {
    Ok(stage)
  } else {
    Err(ProgramError::CompilationFailed {
      stage: kind,
      log: shader_info_log(handle),
    })
  }
}

/// Compile and link a program, with vertex inputs bound to their semantics indices.
pub(crate) unsafe fn create_program(vertex: &str, fragment: &str) -> Result<GLuint, ProgramError> {
  let vs = compile_stage(StageKind::Vertex, vertex)?;
  let fs = compile_stage(StageKind::Fragment, fragment)?;

  let handle = gl::CreateProgram();
  gl::AttachShader(handle, vs.handle);
  gl::AttachShader(handle, fs.handle);

  // inputs a shader does not declare are ignored by the linker
  for sem in Semantics::ALL {
    if let Ok(c_name) = CString::new(sem.name()) {
      gl::BindAttribLocation(handle, sem.index(), c_name.as_ptr() as *const GLchar);
    }
  }

  gl::LinkProgram(handle);

  let mut linked: GLint = gl::FALSE.into();
  gl::GetProgramiv(handle, gl::LINK_STATUS, &mut linked);

  gl::DetachShader(handle, vs.handle);
  gl::DetachShader(handle, fs.handle);

  if linked == gl::TRUE.into() {
    Ok(handle)
  } else {
    let log = program_info_log(handle);
    gl::DeleteProgram(handle);
    Err(ProgramError::LinkFailed(log))
  }
}

pub(crate) unsafe fn uniform_location(program: GLuint, name: &str) -> Option<GLint> {
  let c_name = CString::new(name).ok()?;
  let location = gl::GetUniformLocation(program, c_name.as_ptr() as *const GLchar);

  if location < 0 {
    None
  } else {
    Some(location)
  }
}
