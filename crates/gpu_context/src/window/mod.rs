//! Window system seam
//!
//! The Vulkan side only needs three things from a window: the instance
//! extensions it requires, its current drawable size, and a way to bind it to
//! an instance as a surface. [`SurfaceProvider`] is that contract.

use ash::vk;
use thiserror::Error;

/// GLFW window
pub mod glfw_window;

/// Surface provider over raw window handles
pub mod raw;

pub use glfw_window::Window;
pub use raw::RawWindowSurface;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// The window system could not be initialised
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// The window system cannot present through Vulkan
    #[error("Vulkan presentation unsupported: {0}")]
    VulkanUnsupported(String),

    /// Surface creation returned a failure status
    #[error("Surface creation failed: {0:?}")]
    SurfaceCreation(vk::Result),

    /// Any other window system error
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Source of presentation surfaces
pub trait SurfaceProvider {
    /// Instance extensions needed to present to this window
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>>;

    /// Current drawable size in pixels
    fn drawable_size(&self) -> (u32, u32);

    /// Bind the window to `instance`, returning a surface the caller owns
    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> WindowResult<vk::SurfaceKHR>;
}
