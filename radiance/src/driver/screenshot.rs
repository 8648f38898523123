use image::RgbaImage;
use log::warn;

use crate::backend::GlApi;

use super::Driver;

impl<A> Driver<A>
where
  A: GlApi,
{
  /// Read the screen back into an image, top row first.
  ///
  /// `None` while rendering into a render target, for an empty screen, or when reading raised a
  /// GPU error.
  pub fn create_screenshot(&mut self) -> Option<RgbaImage> {
    if self.current_render_target.is_some() {
      warn!("Screenshots cannot be taken while rendering into a texture");
      return None;
    }

    let [width, height] = self.screen_size.to_array();

    if width == 0 || height == 0 {
      return None;
    }

    let row = width as usize * 4;
    let mut pixels = vec![0; row * height as usize];

    self
      .pipeline
      .state
      .raw()
      .read_pixels([0, 0, width as i32, height as i32], &mut pixels);

    if self.test_gl_error(line!()) {
      return None;
    }

    // rows come bottom-up
    let flipped = pixels.chunks_exact(row).rev().flatten().copied().collect();

    RgbaImage::from_raw(width, height, flipped)
  }
}

#[cfg(test)]
mod tests {
  use crate::backend::recording::{GlCall, RecordingGl};
  use crate::backend::GlError;
  use crate::config::DriverConfig;
  use crate::shader::MemoryShaderLoader;

  use super::*;

  fn driver() -> (Driver<RecordingGl>, crate::backend::recording::CallLog) {
    let (gl, log) = RecordingGl::new();
    let config = DriverConfig::default().with_screen_size([2, 2]);
    let driver = Driver::headless(gl, config, Box::new(MemoryShaderLoader::new()));
    log.clear();
    (driver, log)
  }

  #[test]
  fn rows_are_top_down() {
    let (mut driver, log) = driver();
    let bottom = [1, 1, 1, 255, 2, 2, 2, 255];
    let top = [3, 3, 3, 255, 4, 4, 4, 255];
    log.set_read_back([bottom, top].concat());

    let shot = driver.create_screenshot().expect("screenshot");

    assert!(log.calls().contains(&GlCall::ReadPixels([0, 0, 2, 2])));
    assert_eq!(shot.get_pixel(0, 0).0, [3, 3, 3, 255]);
    assert_eq!(shot.get_pixel(1, 1).0, [2, 2, 2, 255]);
  }

  #[cfg(debug_assertions)]
  #[test]
  fn gpu_errors_void_the_screenshot() {
    let (mut driver, log) = driver();
    log.set_read_back(vec![0; 16]);
    log.push_error(GlError::InvalidOperation);

    assert!(driver.create_screenshot().is_none());
  }
}
