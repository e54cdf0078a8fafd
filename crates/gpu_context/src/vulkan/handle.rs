//! Move-only ownership of native handles
//!
//! Two shapes cover every owned Vulkan object in the crate:
//!
//! - [`Object`] owns a parentless dispatch table (`ash::Instance`, `ash::Device`)
//!   and disposes it exactly once.
//! - [`Resource`] owns a handle created from a parent (a device, or an extension
//!   loader) and releases it through that parent iff the handle is non-null.
//!
//! Neither type implements `Clone` or `Copy`. A move hands the handle to the
//! destination and the source is never dropped; [`Resource::take`] is the
//! explicit "move out and leave null" operation for fields that must stay
//! in place.

use ash::vk::{self, Handle};
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;

/// Native release function for a handle type created from parent `P`
pub trait Release<P>: Handle + Copy {
    /// Destroy the handle.
    ///
    /// # Safety
    /// `self` must be a live handle created from `parent` and must not be in
    /// use by pending device work.
    unsafe fn release(self, parent: &P);
}

/// Native destroy function for a parentless dispatch table
pub trait Dispose {
    /// Destroy the underlying object.
    ///
    /// # Safety
    /// Called once, after every child object has been destroyed.
    unsafe fn dispose(&mut self);
}

/// Parent-bearing owned handle
pub struct Resource<P, H: Release<P>> {
    parent: P,
    handle: H,
}

impl<P, H: Release<P>> Resource<P, H> {
    /// Take ownership of `handle`.
    ///
    /// # Safety
    /// `handle` must be null or a live handle created from `parent` that no
    /// other wrapper owns.
    pub unsafe fn from_raw(parent: P, handle: H) -> Self {
        Self { parent, handle }
    }

    /// Null handle bound to `parent`
    pub fn null(parent: P) -> Self {
        Self {
            parent,
            handle: H::from_raw(0),
        }
    }

    /// Whether the wrapper currently owns nothing
    pub fn is_null(&self) -> bool {
        self.handle.as_raw() == 0
    }

    /// Raw handle, for interop
    pub fn handle(&self) -> H {
        self.handle
    }

    /// Parent the handle was created from
    pub fn parent(&self) -> &P {
        &self.parent
    }

    /// Relinquish ownership without releasing
    #[must_use]
    pub fn into_raw(mut self) -> H {
        std::mem::replace(&mut self.handle, H::from_raw(0))
    }

    /// Move the handle out, leaving this wrapper null
    #[must_use]
    pub fn take(&mut self) -> Self
    where
        P: Clone,
    {
        Self {
            parent: self.parent.clone(),
            handle: std::mem::replace(&mut self.handle, H::from_raw(0)),
        }
    }
}

impl<P, H: Release<P>> Drop for Resource<P, H> {
    fn drop(&mut self) {
        if !self.is_null() {
            unsafe { self.handle.release(&self.parent) };
        }
    }
}

impl<P, H: Release<P>> Deref for Resource<P, H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<P, H: Release<P> + fmt::Debug> fmt::Debug for Resource<P, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Resource").field(&self.handle).finish()
    }
}

/// Parentless owned dispatch table
pub struct Object<T: Dispose> {
    inner: ManuallyDrop<T>,
}

impl<T: Dispose> Object<T> {
    /// Take ownership of `inner`.
    ///
    /// # Safety
    /// `inner` must wrap a live object that nothing else will dispose.
    pub unsafe fn from_raw(inner: T) -> Self {
        Self {
            inner: ManuallyDrop::new(inner),
        }
    }

    /// Relinquish ownership without disposing
    #[must_use]
    pub fn into_inner(self) -> T {
        let mut this = ManuallyDrop::new(self);
        unsafe { ManuallyDrop::take(&mut this.inner) }
    }
}

impl<T: Dispose> Drop for Object<T> {
    fn drop(&mut self) {
        unsafe {
            self.inner.dispose();
            ManuallyDrop::drop(&mut self.inner);
        }
    }
}

impl<T: Dispose> Deref for Object<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl Dispose for ash::Instance {
    unsafe fn dispose(&mut self) {
        self.destroy_instance(None);
    }
}

impl Dispose for ash::Device {
    unsafe fn dispose(&mut self) {
        self.destroy_device(None);
    }
}

impl Release<ash::extensions::khr::Surface> for vk::SurfaceKHR {
    unsafe fn release(self, parent: &ash::extensions::khr::Surface) {
        parent.destroy_surface(self, None);
    }
}

impl Release<ash::extensions::khr::Swapchain> for vk::SwapchainKHR {
    unsafe fn release(self, parent: &ash::extensions::khr::Swapchain) {
        parent.destroy_swapchain(self, None);
    }
}

impl Release<ash::extensions::ext::DebugUtils> for vk::DebugUtilsMessengerEXT {
    unsafe fn release(self, parent: &ash::extensions::ext::DebugUtils) {
        parent.destroy_debug_utils_messenger(self, None);
    }
}

/// Implement [`Release`] for device children and declare their owning alias
macro_rules! device_child {
    ($($(#[$meta:meta])* $alias:ident => $handle:ty, $destroy:ident;)*) => {
        $(
            impl Release<ash::Device> for $handle {
                unsafe fn release(self, parent: &ash::Device) {
                    parent.$destroy(self, None);
                }
            }

            $(#[$meta])*
            pub type $alias = Resource<ash::Device, $handle>;
        )*
    };
}

device_child! {
    /// Owned device memory allocation
    Memory => vk::DeviceMemory, free_memory;
    /// Owned buffer
    Buffer => vk::Buffer, destroy_buffer;
    /// Owned image
    Image => vk::Image, destroy_image;
    /// Owned image view
    ImageView => vk::ImageView, destroy_image_view;
    /// Owned sampler
    Sampler => vk::Sampler, destroy_sampler;
    /// Owned command pool
    CommandPool => vk::CommandPool, destroy_command_pool;
    /// Owned binary semaphore
    Semaphore => vk::Semaphore, destroy_semaphore;
    /// Owned fence
    Fence => vk::Fence, destroy_fence;
    /// Owned descriptor pool
    DescriptorPool => vk::DescriptorPool, destroy_descriptor_pool;
    /// Owned descriptor set layout
    DescriptorSetLayout => vk::DescriptorSetLayout, destroy_descriptor_set_layout;
    /// Owned pipeline layout
    PipelineLayout => vk::PipelineLayout, destroy_pipeline_layout;
    /// Owned compute or graphics pipeline
    Pipeline => vk::Pipeline, destroy_pipeline;
    /// Owned shader module
    ShaderModule => vk::ShaderModule, destroy_shader_module;
    /// Owned render pass
    RenderPass => vk::RenderPass, destroy_render_pass;
    /// Owned framebuffer
    Framebuffer => vk::Framebuffer, destroy_framebuffer;
}

/// Owned surface, released through the surface extension loader
pub type Surface = Resource<ash::extensions::khr::Surface, vk::SurfaceKHR>;

/// Owned swapchain, released through the swapchain extension loader
pub type Swapchain = Resource<ash::extensions::khr::Swapchain, vk::SwapchainKHR>;

/// Owned debug messenger
pub type DebugMessenger = Resource<ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT>;
