//! Command pools and command buffers
//!
//! Command buffers are plain handles scoped to their pool: they are freed
//! with it and invalidated by [`reset_command_pool`].

use ash::vk;

use crate::vulkan::error::{CheckNative, VulkanResult};
use crate::vulkan::handle::CommandPool;
use crate::vulkan::initialization::device::Device;

/// Create a command pool
pub fn create_command_pool(
    device: &Device,
    info: vk::CommandPoolCreateInfo,
) -> VulkanResult<CommandPool> {
    let info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        ..info
    };

    let handle = unsafe { device.raw().create_command_pool(&info, None) }.check()?;
    Ok(unsafe { CommandPool::from_raw(device.raw().clone(), handle) })
}

/// Allocate command buffers from `pool`
///
/// Returns an empty list on failure; compare the length against
/// `command_buffer_count` before use.
pub fn allocate_command_buffers(
    pool: &CommandPool,
    level: vk::CommandBufferLevel,
    command_buffer_count: u32,
) -> Vec<vk::CommandBuffer> {
    if command_buffer_count == 0 {
        return Vec::new();
    }

    let info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(pool.handle())
        .level(level)
        .command_buffer_count(command_buffer_count);

    match unsafe { pool.parent().allocate_command_buffers(&info) } {
        Ok(buffers) => buffers,
        Err(code) => {
            log::warn!("Command buffer allocation of {command_buffer_count} failed: {code:?}");
            Vec::new()
        }
    }
}

/// Reset `pool`, returning every buffer allocated from it to the initial state
pub fn reset_command_pool(pool: &CommandPool) -> VulkanResult<()> {
    unsafe {
        pool.parent()
            .reset_command_pool(pool.handle(), vk::CommandPoolResetFlags::empty())
    }
    .check()
}

/// Begin recording into `command_buffer`
pub fn begin(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    flags: vk::CommandBufferUsageFlags,
) -> VulkanResult<()> {
    let info = vk::CommandBufferBeginInfo::builder().flags(flags);
    unsafe { device.begin_command_buffer(command_buffer, &info) }.check()
}

/// Finish recording into `command_buffer`
pub fn end(device: &ash::Device, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
    unsafe { device.end_command_buffer(command_buffer) }.check()
}
