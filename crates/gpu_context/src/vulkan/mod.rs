//! Vulkan backend: ownership, negotiation, resources and presentation

/// Render context tying the layers together
pub mod context;

/// Error taxonomy
pub mod error;

/// Move-only handle ownership
pub mod handle;

/// Instance, device and surface negotiation
pub mod initialization;

/// Resource creation facade
pub mod resources;

/// Swapchain, recording and frame state
pub mod state;

pub use context::RenderContext;
pub use error::{CheckNative, VulkanError, VulkanResult};
pub use handle::{Object, Resource};
pub use state::SwapchainState;
