//! Images, image views and samplers

use ash::vk;

use crate::vulkan::error::{CheckNative, VulkanResult};
use crate::vulkan::handle::{Image, ImageView, Sampler};
use crate::vulkan::initialization::device::Device;

/// Create an image; the structure tag is filled in here
pub fn create_image(device: &Device, info: vk::ImageCreateInfo) -> VulkanResult<Image> {
    let info = vk::ImageCreateInfo {
        s_type: vk::StructureType::IMAGE_CREATE_INFO,
        ..info
    };

    let handle = unsafe { device.raw().create_image(&info, None) }.check()?;
    Ok(unsafe { Image::from_raw(device.raw().clone(), handle) })
}

/// Create an image view
pub fn create_image_view(device: &Device, info: vk::ImageViewCreateInfo) -> VulkanResult<ImageView> {
    let info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        ..info
    };

    let handle = unsafe { device.raw().create_image_view(&info, None) }.check()?;
    Ok(unsafe { ImageView::from_raw(device.raw().clone(), handle) })
}

/// Create a sampler
pub fn create_sampler(device: &Device, info: vk::SamplerCreateInfo) -> VulkanResult<Sampler> {
    let info = vk::SamplerCreateInfo {
        s_type: vk::StructureType::SAMPLER_CREATE_INFO,
        ..info
    };

    let handle = unsafe { device.raw().create_sampler(&info, None) }.check()?;
    Ok(unsafe { Sampler::from_raw(device.raw().clone(), handle) })
}

/// Aspect a full view of `format` covers
pub fn aspect_mask_for(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// View type matching a single-layer image of `image_type`
pub fn view_type_for(image_type: vk::ImageType) -> vk::ImageViewType {
    match image_type {
        vk::ImageType::TYPE_1D => vk::ImageViewType::TYPE_1D,
        vk::ImageType::TYPE_3D => vk::ImageViewType::TYPE_3D,
        _ => vk::ImageViewType::TYPE_2D,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_mask_for_formats() {
        assert_eq!(aspect_mask_for(vk::Format::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
        assert_eq!(aspect_mask_for(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(aspect_mask_for(vk::Format::S8_UINT), vk::ImageAspectFlags::STENCIL);
        assert_eq!(
            aspect_mask_for(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }

    #[test]
    fn test_view_type_for_image_type() {
        assert_eq!(view_type_for(vk::ImageType::TYPE_2D), vk::ImageViewType::TYPE_2D);
        assert_eq!(view_type_for(vk::ImageType::TYPE_3D), vk::ImageViewType::TYPE_3D);
    }
}
