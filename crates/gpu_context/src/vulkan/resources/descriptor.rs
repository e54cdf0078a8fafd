//! Descriptor pools, set layouts and set allocation

use ash::vk;

use crate::vulkan::error::{CheckNative, VulkanError, VulkanResult};
use crate::vulkan::handle::{DescriptorPool, DescriptorSetLayout};
use crate::vulkan::initialization::device::Device;

/// Create a descriptor pool
pub fn create_descriptor_pool(
    device: &Device,
    info: vk::DescriptorPoolCreateInfo,
) -> VulkanResult<DescriptorPool> {
    let info = vk::DescriptorPoolCreateInfo {
        s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
        ..info
    };

    let handle = unsafe { device.raw().create_descriptor_pool(&info, None) }.check()?;
    Ok(unsafe { DescriptorPool::from_raw(device.raw().clone(), handle) })
}

/// Reset `pool`, freeing every set allocated from it
///
/// The native call cannot fail, so nothing is reported.
pub fn reset_descriptor_pool(pool: &DescriptorPool) {
    // vkResetDescriptorPool always returns VK_SUCCESS
    let _ = unsafe {
        pool.parent()
            .reset_descriptor_pool(pool.handle(), vk::DescriptorPoolResetFlags::empty())
    };
}

/// Descriptor set layout parameters
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutParameters {
    /// Layout flags
    pub flags: vk::DescriptorSetLayoutCreateFlags,
    /// Bindings in the set
    pub bindings: Vec<vk::DescriptorSetLayoutBinding>,
    /// Per-binding flags; empty, or one entry per binding
    pub binding_flags: Vec<vk::DescriptorBindingFlags>,
}

/// Create a descriptor set layout
pub fn create_descriptor_set_layout(
    device: &Device,
    params: &DescriptorSetLayoutParameters,
) -> VulkanResult<DescriptorSetLayout> {
    if !params.binding_flags.is_empty() && params.binding_flags.len() != params.bindings.len() {
        return Err(VulkanError::validation(format!(
            "{} binding flags for {} bindings",
            params.binding_flags.len(),
            params.bindings.len()
        )));
    }

    let mut flags_info =
        vk::DescriptorSetLayoutBindingFlagsCreateInfo::builder().binding_flags(&params.binding_flags);

    let mut info = vk::DescriptorSetLayoutCreateInfo::builder()
        .flags(params.flags)
        .bindings(&params.bindings);
    if !params.binding_flags.is_empty() {
        info = info.push_next(&mut flags_info);
    }

    let handle = unsafe { device.raw().create_descriptor_set_layout(&info, None) }.check()?;
    Ok(unsafe { DescriptorSetLayout::from_raw(device.raw().clone(), handle) })
}

/// Allocate one set per layout from `pool`
///
/// `variable_counts` is empty or holds one variable descriptor count per
/// layout. Returns an empty list on mismatched lengths or native failure.
pub fn allocate_descriptor_sets(
    pool: &DescriptorPool,
    layouts: &[vk::DescriptorSetLayout],
    variable_counts: &[u32],
) -> Vec<vk::DescriptorSet> {
    if layouts.is_empty() || (!variable_counts.is_empty() && variable_counts.len() != layouts.len()) {
        return Vec::new();
    }

    let mut counts_info = vk::DescriptorSetVariableDescriptorCountAllocateInfo::builder()
        .descriptor_counts(variable_counts);

    let mut info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(pool.handle())
        .set_layouts(layouts);
    if !variable_counts.is_empty() {
        info = info.push_next(&mut counts_info);
    }

    match unsafe { pool.parent().allocate_descriptor_sets(&info) } {
        Ok(sets) => sets,
        Err(code) => {
            log::warn!("Descriptor set allocation of {} failed: {code:?}", layouts.len());
            Vec::new()
        }
    }
}
