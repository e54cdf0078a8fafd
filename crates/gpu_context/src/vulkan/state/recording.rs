//! Command recording for the render and presentation passes
//!
//! The render pass clears the render target. Each presentation buffer copies
//! the render target into one swapchain image and hands that image to the
//! presentation queue:
//!
//! 1. swapchain image `UNDEFINED -> TRANSFER_DST_OPTIMAL`, render target
//!    `TRANSFER_DST_OPTIMAL -> TRANSFER_SRC_OPTIMAL`
//! 2. blit render target to swapchain image
//! 3. swapchain image `TRANSFER_DST_OPTIMAL -> PRESENT_SRC_KHR`, releasing
//!    ownership from the graphics family to the presentation family
//!
//! Buffers are recorded once per swapchain build and resubmitted every frame,
//! so they are recorded for simultaneous use. The barrier builders are pure
//! and can be checked without a device.

use ash::vk;

use crate::vulkan::error::VulkanResult;
use crate::vulkan::initialization::device::QueueFamilyIndices;
use crate::vulkan::resources::command;
use crate::vulkan::resources::PipelineBarrier;

/// Default clear colour for the render target (opaque red)
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

/// Single-mip, single-layer colour range
pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn color_layers() -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn image_barrier(
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access_mask: vk::AccessFlags,
    dst_access_mask: vk::AccessFlags,
    src_queue_family_index: u32,
    dst_queue_family_index: u32,
) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier {
        src_access_mask,
        dst_access_mask,
        old_layout,
        new_layout,
        src_queue_family_index,
        dst_queue_family_index,
        image,
        subresource_range: color_subresource_range(),
        ..Default::default()
    }
}

/// Discard the render target's contents and prepare it for the clear
pub fn render_target_to_transfer_dst(image: vk::Image, families: &QueueFamilyIndices) -> vk::ImageMemoryBarrier {
    image_barrier(
        image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::AccessFlags::MEMORY_READ,
        vk::AccessFlags::TRANSFER_WRITE,
        families.graphics,
        families.graphics,
    )
}

/// Prepare an acquired swapchain image for the blit
pub fn swapchain_to_transfer_dst(image: vk::Image) -> vk::ImageMemoryBarrier {
    image_barrier(
        image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::AccessFlags::MEMORY_READ,
        vk::AccessFlags::TRANSFER_WRITE,
        vk::QUEUE_FAMILY_IGNORED,
        vk::QUEUE_FAMILY_IGNORED,
    )
}

/// Make the cleared render target readable by the blit
pub fn render_target_to_transfer_src(image: vk::Image, families: &QueueFamilyIndices) -> vk::ImageMemoryBarrier {
    image_barrier(
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        vk::AccessFlags::MEMORY_WRITE,
        vk::AccessFlags::TRANSFER_READ,
        families.graphics,
        families.graphics,
    )
}

/// Transition a written swapchain image for presentation
///
/// This is the release half of a graphics to presentation ownership transfer.
pub fn swapchain_to_present(image: vk::Image, families: &QueueFamilyIndices) -> vk::ImageMemoryBarrier {
    image_barrier(
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::PRESENT_SRC_KHR,
        vk::AccessFlags::TRANSFER_WRITE,
        vk::AccessFlags::empty(),
        families.graphics,
        families.presentation,
    )
}

/// Blit region covering a whole 2D image of `extent`
pub fn full_blit(extent: vk::Extent2D) -> vk::ImageBlit {
    let corner = vk::Offset3D {
        x: i32::try_from(extent.width).unwrap_or(i32::MAX),
        y: i32::try_from(extent.height).unwrap_or(i32::MAX),
        z: 1,
    };

    vk::ImageBlit {
        src_subresource: color_layers(),
        src_offsets: [vk::Offset3D::default(), corner],
        dst_subresource: color_layers(),
        dst_offsets: [vk::Offset3D::default(), corner],
    }
}

/// Record the render pass: clear `render_target` to `clear_color`
pub fn record_render(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    render_target: vk::Image,
    clear_color: [f32; 4],
    families: &QueueFamilyIndices,
) -> VulkanResult<()> {
    command::begin(device, command_buffer, vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)?;

    let barriers = [render_target_to_transfer_dst(render_target, families)];
    PipelineBarrier::images(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::TRANSFER,
        &barriers,
    )
    .record(device, command_buffer);

    let clear = vk::ClearColorValue { float32: clear_color };
    unsafe {
        device.cmd_clear_color_image(
            command_buffer,
            render_target,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &clear,
            &[color_subresource_range()],
        );
    }

    command::end(device, command_buffer)
}

/// Record one presentation buffer copying `render_target` into `swapchain_image`
pub fn record_presentation(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    render_target: vk::Image,
    swapchain_image: vk::Image,
    extent: vk::Extent2D,
    families: &QueueFamilyIndices,
) -> VulkanResult<()> {
    command::begin(device, command_buffer, vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)?;

    let prepare = [
        swapchain_to_transfer_dst(swapchain_image),
        render_target_to_transfer_src(render_target, families),
    ];
    PipelineBarrier::images(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::TRANSFER,
        &prepare,
    )
    .record(device, command_buffer);

    unsafe {
        device.cmd_blit_image(
            command_buffer,
            render_target,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            swapchain_image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[full_blit(extent)],
            vk::Filter::NEAREST,
        );
    }

    let release = [swapchain_to_present(swapchain_image, families)];
    PipelineBarrier::images(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        &release,
    )
    .record(device, command_buffer);

    command::end(device, command_buffer)
}
