//! Binary semaphores and fences

use ash::vk;

use crate::vulkan::error::{CheckNative, VulkanResult};
use crate::vulkan::handle::{Fence, Semaphore};
use crate::vulkan::initialization::device::Device;

/// Create a binary semaphore
pub fn create_semaphore(device: &Device) -> VulkanResult<Semaphore> {
    let info = vk::SemaphoreCreateInfo::default();
    let handle = unsafe { device.raw().create_semaphore(&info, None) }.check()?;
    Ok(unsafe { Semaphore::from_raw(device.raw().clone(), handle) })
}

/// Create a fence, optionally already signaled
pub fn create_fence(device: &Device, signaled: bool) -> VulkanResult<Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let info = vk::FenceCreateInfo::builder().flags(flags);
    let handle = unsafe { device.raw().create_fence(&info, None) }.check()?;
    Ok(unsafe { Fence::from_raw(device.raw().clone(), handle) })
}

/// Block until `fence` signals or `timeout` nanoseconds pass
pub fn wait_for_fence(fence: &Fence, timeout: u64) -> VulkanResult<()> {
    unsafe { fence.parent().wait_for_fences(&[fence.handle()], true, timeout) }.check()
}

/// Return `fence` to the unsignaled state
pub fn reset_fence(fence: &Fence) -> VulkanResult<()> {
    unsafe { fence.parent().reset_fences(&[fence.handle()]) }.check()
}
