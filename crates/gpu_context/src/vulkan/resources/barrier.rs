//! Pipeline barrier recording

use ash::vk;

/// Contents of one `vkCmdPipelineBarrier` call
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineBarrier<'a> {
    /// Stages that must complete before the barrier
    pub src_stage_mask: vk::PipelineStageFlags,
    /// Stages that wait on the barrier
    pub dst_stage_mask: vk::PipelineStageFlags,
    /// Dependency flags
    pub dependency_flags: vk::DependencyFlags,
    /// Global memory barriers
    pub memory_barriers: &'a [vk::MemoryBarrier],
    /// Buffer memory barriers
    pub buffer_memory_barriers: &'a [vk::BufferMemoryBarrier],
    /// Image memory barriers
    pub image_memory_barriers: &'a [vk::ImageMemoryBarrier],
}

impl<'a> PipelineBarrier<'a> {
    /// Barrier carrying only image transitions
    pub fn images(
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        image_memory_barriers: &'a [vk::ImageMemoryBarrier],
    ) -> Self {
        Self {
            src_stage_mask,
            dst_stage_mask,
            image_memory_barriers,
            ..Self::default()
        }
    }

    /// Record into `command_buffer`
    pub fn record(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                self.src_stage_mask,
                self.dst_stage_mask,
                self.dependency_flags,
                self.memory_barriers,
                self.buffer_memory_barriers,
                self.image_memory_barriers,
            );
        }
    }
}
