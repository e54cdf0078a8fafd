//! Image + memory + view bundle used for size-dependent render targets

use ash::vk;

use crate::vulkan::error::{CheckNative, VulkanResult};
use crate::vulkan::handle::{Image, ImageView};
use crate::vulkan::initialization::device::Device;
use crate::vulkan::resources::image;
use crate::vulkan::resources::memory::{self, Allocation};

/// Texture creation parameters
#[derive(Debug, Clone, Copy)]
pub struct TextureParameters {
    /// Image dimensionality
    pub image_type: vk::ImageType,
    /// Pixel format
    pub format: vk::Format,
    /// Size in texels
    pub extent: vk::Extent3D,
    /// How the image will be used
    pub usage: vk::ImageUsageFlags,
    /// Required memory properties
    pub memory_flags: vk::MemoryPropertyFlags,
}

/// Single-mip, single-layer image with its own memory allocation
///
/// Fields drop in declaration order: the view goes first, the memory last.
pub struct Texture {
    view: ImageView,
    image: Image,
    memory: Allocation,
    format: vk::Format,
    extent: vk::Extent3D,
}

impl Texture {
    /// Create the image, back it with one allocation and create a full view
    pub fn new(device: &Device, params: &TextureParameters) -> VulkanResult<Self> {
        let image = image::create_image(
            device,
            vk::ImageCreateInfo::builder()
                .image_type(params.image_type)
                .format(params.format)
                .extent(params.extent)
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(params.usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .build(),
        )?;

        let requirements = unsafe { device.raw().get_image_memory_requirements(*image) };
        let memory = memory::allocate(device, requirements, params.memory_flags)?;

        unsafe { device.raw().bind_image_memory(*image, memory.handle(), 0) }.check()?;

        let view = image::create_image_view(
            device,
            vk::ImageViewCreateInfo::builder()
                .image(*image)
                .view_type(image::view_type_for(params.image_type))
                .format(params.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: image::aspect_mask_for(params.format),
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .build(),
        )?;

        Ok(Self {
            view,
            image,
            memory,
            format: params.format,
            extent: params.extent,
        })
    }

    /// Raw image handle
    pub fn image(&self) -> vk::Image {
        self.image.handle()
    }

    /// Raw view handle
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Backing allocation
    pub fn memory(&self) -> &Allocation {
        &self.memory
    }

    /// Pixel format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Size in texels
    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }
}
