//! Shader modules, pipeline layouts, pipelines, render passes and framebuffers
//!
//! Shader bytecode and pipeline state come from the caller; these functions
//! only wrap creation.

use ash::vk;

use crate::vulkan::error::{CheckNative, VulkanError, VulkanResult};
use crate::vulkan::handle::{Framebuffer, Pipeline, PipelineLayout, RenderPass, ShaderModule};
use crate::vulkan::initialization::device::Device;

/// Create a shader module from SPIR-V words
pub fn create_shader_module(device: &Device, code: &[u32]) -> VulkanResult<ShaderModule> {
    if code.is_empty() {
        return Err(VulkanError::validation("shader bytecode is empty"));
    }

    let info = vk::ShaderModuleCreateInfo::builder().code(code);
    let handle = unsafe { device.raw().create_shader_module(&info, None) }.check()?;
    Ok(unsafe { ShaderModule::from_raw(device.raw().clone(), handle) })
}

/// Create a shader module from a SPIR-V byte stream
pub fn create_shader_module_from_bytes(device: &Device, bytes: &[u8]) -> VulkanResult<ShaderModule> {
    let words = ash::util::read_spv(&mut std::io::Cursor::new(bytes))
        .map_err(|e| VulkanError::validation(format!("invalid SPIR-V: {e}")))?;
    create_shader_module(device, &words)
}

/// Create a pipeline layout
pub fn create_pipeline_layout(
    device: &Device,
    info: vk::PipelineLayoutCreateInfo,
) -> VulkanResult<PipelineLayout> {
    let info = vk::PipelineLayoutCreateInfo {
        s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
        ..info
    };

    let handle = unsafe { device.raw().create_pipeline_layout(&info, None) }.check()?;
    Ok(unsafe { PipelineLayout::from_raw(device.raw().clone(), handle) })
}

/// Create a compute pipeline
pub fn create_compute_pipeline(
    device: &Device,
    info: vk::ComputePipelineCreateInfo,
) -> VulkanResult<Pipeline> {
    let info = vk::ComputePipelineCreateInfo {
        s_type: vk::StructureType::COMPUTE_PIPELINE_CREATE_INFO,
        ..info
    };

    let pipelines = unsafe {
        device
            .raw()
            .create_compute_pipelines(vk::PipelineCache::null(), &[info], None)
    }
    .map_err(|(_, code)| code)
    .check()?;

    single_pipeline(device, pipelines)
}

/// Create a graphics pipeline
pub fn create_graphics_pipeline(
    device: &Device,
    info: vk::GraphicsPipelineCreateInfo,
) -> VulkanResult<Pipeline> {
    let info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        ..info
    };

    let pipelines = unsafe {
        device
            .raw()
            .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
    }
    .map_err(|(_, code)| code)
    .check()?;

    single_pipeline(device, pipelines)
}

fn single_pipeline(device: &Device, pipelines: Vec<vk::Pipeline>) -> VulkanResult<Pipeline> {
    pipelines
        .into_iter()
        .next()
        .map(|handle| unsafe { Pipeline::from_raw(device.raw().clone(), handle) })
        .ok_or_else(|| VulkanError::exhausted("driver returned no pipeline"))
}

/// Create a render pass
pub fn create_render_pass(device: &Device, info: vk::RenderPassCreateInfo) -> VulkanResult<RenderPass> {
    let info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        ..info
    };

    let handle = unsafe { device.raw().create_render_pass(&info, None) }.check()?;
    Ok(unsafe { RenderPass::from_raw(device.raw().clone(), handle) })
}

/// Create a framebuffer
pub fn create_framebuffer(
    device: &Device,
    info: vk::FramebufferCreateInfo,
) -> VulkanResult<Framebuffer> {
    if info.width == 0 || info.height == 0 {
        return Err(VulkanError::validation("framebuffer extent must be non-zero"));
    }

    let info = vk::FramebufferCreateInfo {
        s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
        ..info
    };

    let handle = unsafe { device.raw().create_framebuffer(&info, None) }.check()?;
    Ok(unsafe { Framebuffer::from_raw(device.raw().clone(), handle) })
}
