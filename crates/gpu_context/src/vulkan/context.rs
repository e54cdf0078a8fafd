//! Render context: everything between a window and a presented frame
//!
//! [`RenderContext::new`] negotiates the instance, device, surface and
//! synchronization objects once. The swapchain and everything sized from it
//! are built by [`RenderContext::recreate_swapchain`], which is also how the
//! first swapchain comes into existence. [`RenderContext::render`] runs one
//! frame and never reports failure.

use ash::prelude::VkResult;
use ash::vk;

use crate::config::ContextConfig;
use crate::vulkan::error::{VulkanError, VulkanResult};
use crate::vulkan::handle::{CommandPool, Semaphore, Surface, Swapchain};
use crate::vulkan::initialization::surface::{self, SurfaceProperties};
use crate::vulkan::initialization::{Device, DeviceParameters, Instance, PhysicalDevice, Queues};
use crate::vulkan::resources::{command, sync, Texture, TextureParameters};
use crate::vulkan::state::frame::{
    AcquiredImage, FrameSemaphores, FrameStats, PresentationEngine, SwapchainLifecycle, SwapchainState,
};
use crate::vulkan::state::recording;
use crate::vulkan::state::swapchain::{self, SwapchainParameters};
use crate::window::SurfaceProvider;

/// Render target format; storage-capable on every conformant device
const RENDER_TARGET_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Swapchain extent for a drawable of `width` x `height`
///
/// Uses the surface's fixed extent when it reports one, otherwise clamps the
/// drawable size into the supported range.
pub fn swapchain_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// GPU context presenting a cleared render target to a window
///
/// Field order is drop order: command buffers and swapchain-sized resources
/// first, then pools and semaphores, then the device, surface and instance.
pub struct RenderContext {
    presentation_buffers: Vec<vk::CommandBuffer>,
    render_buffer: vk::CommandBuffer,
    swapchain_images: Vec<vk::Image>,
    render_target: Option<Texture>,
    swapchain: Swapchain,
    presentation_pool: CommandPool,
    rendering_pool: CommandPool,
    rendering_semaphore: Semaphore,
    acquired_semaphore: Semaphore,
    completed_semaphore: Semaphore,
    lifecycle: SwapchainLifecycle,
    swapchain_params: SwapchainParameters,
    clear_color: [f32; 4],
    surface_properties: SurfaceProperties,
    device: Device,
    surface: Surface,
    instance: Instance,
}

impl RenderContext {
    /// Negotiate a device able to present to `provider`'s window
    ///
    /// The swapchain is not built yet; call [`Self::recreate_swapchain`]
    /// before the first [`Self::render`].
    pub fn new(config: &ContextConfig, provider: &dyn SurfaceProvider) -> VulkanResult<Self> {
        config
            .validate()
            .map_err(|e| VulkanError::validation(e.to_string()))?;

        let extensions = provider
            .required_instance_extensions()
            .map_err(|e| VulkanError::validation(format!("window cannot list instance extensions: {e}")))?;
        let instance = Instance::new(&config.instance_parameters(extensions))?;

        let physical = PhysicalDevice::select(&instance, &config.device_preference())?;

        let features = config.device_features()?;
        let missing = physical.features(&instance).missing(&features);
        if !missing.is_empty() {
            return Err(VulkanError::not_found(format!(
                "device features [{}] on {}",
                missing.join(", "),
                physical.name()
            )));
        }

        let missing = physical.missing_extensions(&instance, &config.device_extensions)?;
        if !missing.is_empty() {
            return Err(VulkanError::not_found(format!(
                "device extensions [{}] on {}",
                missing.join(", "),
                physical.name()
            )));
        }

        let surface = surface::create_surface(&instance, provider)?;
        let surface_properties = SurfaceProperties::query(&surface, &physical)?;
        let swapchain_params =
            SwapchainParameters::negotiate(surface.handle(), &surface_properties, config.image_count)?;

        let device = Device::new(
            &instance,
            physical,
            &DeviceParameters {
                features,
                extensions: config.device_extensions.clone(),
                surface: Some(&surface),
            },
        )?;

        let rendering_semaphore = sync::create_semaphore(&device)?;
        let acquired_semaphore = sync::create_semaphore(&device)?;
        let completed_semaphore = sync::create_semaphore(&device)?;

        // Both passes run on the graphics queue
        let pool_info = vk::CommandPoolCreateInfo {
            queue_family_index: device.queues().families.graphics,
            ..Default::default()
        };
        let rendering_pool = command::create_command_pool(&device, pool_info)?;
        let presentation_pool = command::create_command_pool(&device, pool_info)?;

        let render_buffer = command::allocate_command_buffers(&rendering_pool, vk::CommandBufferLevel::PRIMARY, 1)
            .first()
            .copied()
            .ok_or_else(|| VulkanError::exhausted("render command buffer"))?;

        let swapchain = swapchain::null_swapchain(&instance, &device);

        Ok(Self {
            presentation_buffers: Vec::new(),
            render_buffer,
            swapchain_images: Vec::new(),
            render_target: None,
            swapchain,
            presentation_pool,
            rendering_pool,
            rendering_semaphore,
            acquired_semaphore,
            completed_semaphore,
            lifecycle: SwapchainLifecycle::new(config.recreation_policy),
            swapchain_params,
            clear_color: config.clear_color,
            surface_properties,
            device,
            surface,
            instance,
        })
    }

    /// Build the swapchain for the current drawable size, replacing any previous one
    ///
    /// Waits for the device to go idle, drops the render target, rebuilds the
    /// swapchain with the old one as predecessor, resets both command pools,
    /// re-queries the images and re-records every command buffer. On failure
    /// the context stays [`SwapchainState::Invalid`] until a later call succeeds.
    pub fn recreate_swapchain(&mut self, provider: &dyn SurfaceProvider) -> VulkanResult<()> {
        self.lifecycle.begin_rebuild();
        let outcome = self.rebuild_swapchain(provider);

        match self.lifecycle.finish_rebuild(outcome) {
            Ok(()) => {
                log::info!(
                    "Swapchain ready: {}x{}, {} images, {:?}",
                    self.swapchain_params.image_extent.width,
                    self.swapchain_params.image_extent.height,
                    self.swapchain_images.len(),
                    self.swapchain_params.present_mode
                );
                Ok(())
            }
            Err(error) => {
                log::warn!("Swapchain rebuild failed: {error}");
                Err(error)
            }
        }
    }

    /// Returns the drawable size the new swapchain was requested for
    fn rebuild_swapchain(&mut self, provider: &dyn SurfaceProvider) -> VulkanResult<vk::Extent2D> {
        self.device.wait_idle()?;
        self.render_target = None;

        let (width, height) = provider.drawable_size();
        if width == 0 || height == 0 {
            return Err(VulkanError::validation(format!("drawable size {width}x{height} must be non-zero")));
        }

        self.surface_properties = SurfaceProperties::query(&self.surface, self.device.physical())?;
        let params = SwapchainParameters {
            image_extent: swapchain_extent(&self.surface_properties.capabilities, width, height),
            transform: self.surface_properties.capabilities.current_transform,
            ..self.swapchain_params
        };

        self.swapchain_images.clear();
        let (instance, device) = (&self.instance, &self.device);
        swapchain::replace_swapchain(
            &mut self.swapchain,
            |predecessor| swapchain::create_swapchain(predecessor, &params),
            || swapchain::null_swapchain(instance, device),
        )?;
        self.swapchain_params = params;

        command::reset_command_pool(&self.rendering_pool)?;
        command::reset_command_pool(&self.presentation_pool)?;

        self.swapchain_images = swapchain::swapchain_images(&self.swapchain)?;
        self.reserve_presentation_buffers(self.swapchain_images.len())?;

        let extent = params.image_extent;
        let render_target = Texture::new(
            &self.device,
            &TextureParameters {
                image_type: vk::ImageType::TYPE_2D,
                format: RENDER_TARGET_FORMAT,
                extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
                usage: vk::ImageUsageFlags::STORAGE
                    | vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                memory_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;

        let raw = self.device.raw();
        let families = self.device.queues().families;
        recording::record_render(raw, self.render_buffer, render_target.image(), self.clear_color, &families)?;
        for (&command_buffer, &image) in self.presentation_buffers.iter().zip(&self.swapchain_images) {
            recording::record_presentation(raw, command_buffer, render_target.image(), image, extent, &families)?;
        }

        self.render_target = Some(render_target);
        Ok(vk::Extent2D { width, height })
    }

    /// Grow the presentation buffer list to at least `count` entries
    fn reserve_presentation_buffers(&mut self, count: usize) -> VulkanResult<()> {
        let Some(extra) = count.checked_sub(self.presentation_buffers.len()).filter(|&extra| extra > 0) else {
            return Ok(());
        };

        let requested = u32::try_from(extra).map_err(|_| VulkanError::exhausted("presentation command buffers"))?;
        let allocated =
            command::allocate_command_buffers(&self.presentation_pool, vk::CommandBufferLevel::PRIMARY, requested);
        if allocated.len() != extra {
            return Err(VulkanError::exhausted(format!(
                "presentation command buffers: got {} of {extra}",
                allocated.len()
            )));
        }

        self.presentation_buffers.extend(allocated);
        Ok(())
    }

    /// Whether the swapchain should be rebuilt before the next frame
    ///
    /// See [`SwapchainLifecycle::needs_recreation`].
    pub fn needs_recreation(&mut self, provider: &dyn SurfaceProvider) -> bool {
        let (width, height) = provider.drawable_size();
        self.lifecycle.needs_recreation(vk::Extent2D { width, height })
    }

    /// Run one acquire, submit and present cycle
    ///
    /// Per-frame failures are absorbed and counted in [`Self::frame_stats`].
    /// Does nothing while the swapchain is invalid.
    pub fn render(&mut self) {
        let semaphores = FrameSemaphores {
            acquired: self.acquired_semaphore.handle(),
            completed: self.completed_semaphore.handle(),
        };
        let mut engine = SwapchainEngine {
            device: self.device.raw(),
            swapchain: &self.swapchain,
            queues: *self.device.queues(),
            render_buffer: self.render_buffer,
            presentation_buffers: &self.presentation_buffers,
            rendering: self.rendering_semaphore.handle(),
        };

        self.lifecycle.render(&mut engine, semaphores);
    }

    /// Whether the swapchain can currently be rendered to
    pub fn swapchain_state(&self) -> SwapchainState {
        self.lifecycle.state()
    }

    /// Current swapchain extent
    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain_params.image_extent
    }

    /// Negotiated swapchain format and present mode
    pub fn swapchain_parameters(&self) -> &SwapchainParameters {
        &self.swapchain_params
    }

    /// Presented and dropped frame counts
    pub fn frame_stats(&self) -> FrameStats {
        self.lifecycle.driver().stats()
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        log::debug!("Cleaning up RenderContext...");

        if let Err(error) = self.device.wait_idle() {
            log::warn!("Device did not go idle before teardown: {error}");
        }
    }
}

/// Swapchain and queues behind one frame
///
/// Submission is a single batch of two: the render buffer signals the
/// rendering semaphore, then the presentation buffer waits on both the
/// acquired image and the render.
struct SwapchainEngine<'a> {
    device: &'a ash::Device,
    swapchain: &'a Swapchain,
    queues: Queues,
    render_buffer: vk::CommandBuffer,
    presentation_buffers: &'a [vk::CommandBuffer],
    rendering: vk::Semaphore,
}

impl PresentationEngine for SwapchainEngine<'_> {
    fn acquire_next_image(&mut self, signal: vk::Semaphore) -> VkResult<AcquiredImage> {
        let (index, suboptimal) = unsafe {
            self.swapchain
                .parent()
                .acquire_next_image(self.swapchain.handle(), u64::MAX, signal, vk::Fence::null())
        }?;

        Ok(AcquiredImage { index, suboptimal })
    }

    fn submit(&mut self, image_index: u32, wait: vk::Semaphore, signal: vk::Semaphore) -> VkResult<()> {
        let presentation = *self
            .presentation_buffers
            .get(image_index as usize)
            .ok_or(vk::Result::ERROR_UNKNOWN)?;

        let render_buffers = [self.render_buffer];
        let render_signals = [self.rendering];
        let presentation_buffers = [presentation];
        let presentation_waits = [wait, self.rendering];
        let wait_stages = [vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER];
        let presentation_signals = [signal];

        let batches = [
            vk::SubmitInfo::builder()
                .command_buffers(&render_buffers)
                .signal_semaphores(&render_signals)
                .build(),
            vk::SubmitInfo::builder()
                .wait_semaphores(&presentation_waits)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&presentation_buffers)
                .signal_semaphores(&presentation_signals)
                .build(),
        ];

        unsafe { self.device.queue_submit(self.queues.graphics, &batches, vk::Fence::null()) }
    }

    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> VkResult<bool> {
        let waits = [wait];
        let swapchains = [self.swapchain.handle()];
        let indices = [image_index];
        let info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&waits)
            .swapchains(&swapchains)
            .image_indices(&indices);

        unsafe { self.swapchain.parent().queue_present(self.queues.presentation, &info) }
    }
}
