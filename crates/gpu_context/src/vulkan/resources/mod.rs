//! Vulkan resource creation
//!
//! One creation function per resource kind. Create-info structures are taken
//! by value and their `s_type` tag is overwritten, so callers never supply it.

/// Pipeline barrier recording
pub mod barrier;

/// Buffers and host-visible buffer allocations
pub mod buffer;

/// Command pools and command buffers
pub mod command;

/// Descriptor pools, layouts and sets
pub mod descriptor;

/// Images, views and samplers
pub mod image;

/// Memory type selection, allocation and mapped transfers
pub mod memory;

/// Shader modules, pipelines, render passes and framebuffers
pub mod pipeline;

/// Semaphores and fences
pub mod sync;

/// Image + memory + view bundles
pub mod texture;

pub use barrier::PipelineBarrier;
pub use buffer::AllocatedBuffer;
pub use memory::{Allocation, MemoryMapping};
pub use texture::{Texture, TextureParameters};
