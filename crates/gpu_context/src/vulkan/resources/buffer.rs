//! Buffers and host-visible buffer allocations

use ash::vk;

use crate::vulkan::error::{CheckNative, VulkanError, VulkanResult};
use crate::vulkan::handle::Buffer;
use crate::vulkan::initialization::device::Device;
use crate::vulkan::resources::memory::{self, Allocation};

/// Create a buffer
pub fn create_buffer(device: &Device, info: vk::BufferCreateInfo) -> VulkanResult<Buffer> {
    if info.size == 0 {
        return Err(VulkanError::validation("buffer size must be non-zero"));
    }

    let info = vk::BufferCreateInfo {
        s_type: vk::StructureType::BUFFER_CREATE_INFO,
        ..info
    };

    let handle = unsafe { device.raw().create_buffer(&info, None) }.check()?;
    Ok(unsafe { Buffer::from_raw(device.raw().clone(), handle) })
}

/// Buffer bound to its own allocation
pub struct AllocatedBuffer {
    buffer: Buffer,
    memory: Allocation,
    size: vk::DeviceSize,
}

impl AllocatedBuffer {
    /// Create an exclusive buffer of `size` bytes and bind fresh memory to it
    pub fn new(
        device: &Device,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory_flags: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer = create_buffer(
            device,
            vk::BufferCreateInfo::builder()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .build(),
        )?;

        let requirements = unsafe { device.raw().get_buffer_memory_requirements(*buffer) };
        let memory = memory::allocate(device, requirements, memory_flags)?;

        unsafe { device.raw().bind_buffer_memory(*buffer, memory.handle(), 0) }.check()?;

        Ok(Self {
            buffer,
            memory,
            size,
        })
    }

    /// Write bytes at `offset`; the memory must be host visible
    pub fn write(&self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        self.check_range(offset, bytes.len())?;
        memory::write(&self.memory, offset, bytes)
    }

    /// Read bytes at `offset`; the memory must be host visible
    pub fn read(&self, offset: vk::DeviceSize, bytes: &mut [u8]) -> VulkanResult<()> {
        self.check_range(offset, bytes.len())?;
        memory::read(&self.memory, offset, bytes)
    }

    fn check_range(&self, offset: vk::DeviceSize, len: usize) -> VulkanResult<()> {
        let len = vk::DeviceSize::try_from(len)
            .map_err(|_| VulkanError::validation(format!("{len} bytes do not fit a device size")))?;
        memory::check_range(offset, len, self.size)
    }

    /// Raw buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}
