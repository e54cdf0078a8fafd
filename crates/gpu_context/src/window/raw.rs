//! Surface provider for any window exposing raw handles
//!
//! Lets hosts that do not use GLFW (winit, SDL through its raw-window-handle
//! impls) drive the same context.

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;

use super::{SurfaceProvider, WindowError, WindowResult};

/// Raw display/window handle pair with a host-maintained drawable size
pub struct RawWindowSurface {
    display: RawDisplayHandle,
    window: RawWindowHandle,
    size: (u32, u32),
}

impl RawWindowSurface {
    /// Capture `window`'s handles
    ///
    /// # Safety
    /// The window must outlive every surface created from this provider.
    pub unsafe fn new<W>(window: &W, size: (u32, u32)) -> Self
    where
        W: HasRawWindowHandle + HasRawDisplayHandle,
    {
        Self {
            display: window.raw_display_handle(),
            window: window.raw_window_handle(),
            size,
        }
    }

    /// Record a new drawable size, typically from a resize event
    pub fn set_drawable_size(&mut self, size: (u32, u32)) {
        self.size = size;
    }
}

impl SurfaceProvider for RawWindowSurface {
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        let names = ash_window::enumerate_required_extensions(self.display)
            .map_err(WindowError::SurfaceCreation)?;

        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
            .collect())
    }

    fn drawable_size(&self) -> (u32, u32) {
        self.size
    }

    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> WindowResult<vk::SurfaceKHR> {
        unsafe { ash_window::create_surface(entry, instance, self.display, self.window, None) }
            .map_err(WindowError::SurfaceCreation)
    }
}
