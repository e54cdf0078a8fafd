//! # GPU Context
//!
//! Vulkan bootstrap and frame driver: negotiates an instance, physical device
//! and logical device, binds a window surface, and presents a render target
//! through a swapchain that is rebuilt when the window changes size.
//!
//! ## Layers
//!
//! - **Ownership**: [`vulkan::handle`] wraps every native handle in a
//!   move-only owner released exactly once.
//! - **Facade**: [`vulkan::resources`] creates resources from creation info
//!   with the structure tags filled in.
//! - **Negotiation**: [`vulkan::initialization`] picks a device by version,
//!   name and type, resolves queue roles and checks features strictly.
//! - **Presentation**: [`vulkan::state`] builds swapchains, records the
//!   blit-and-present commands and runs the per-frame state machine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gpu_context::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ContextConfig::default();
//!     let mut window = Window::new("demo", 800, 600)?;
//!     let mut context = RenderContext::new(&config, &window)?;
//!     context.recreate_swapchain(&window)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         if context.needs_recreation(&window) {
//!             let _ = context.recreate_swapchain(&window);
//!         }
//!         context.render();
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod vulkan;
pub mod window;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ContextConfig},
        foundation::time::FramePacer,
        vulkan::{
            initialization::DeviceType,
            state::{FrameStats, RecreationPolicy},
            RenderContext, SwapchainState, VulkanError, VulkanResult,
        },
        window::{SurfaceProvider, Window, WindowError},
    };
}
