//! Surface creation, property queries and swapchain selection policies

use ash::vk;

use crate::vulkan::error::{CheckNative, VulkanError, VulkanResult};
use crate::vulkan::handle::Surface;
use crate::vulkan::initialization::instance::Instance;
use crate::vulkan::initialization::physical_device::PhysicalDevice;
use crate::window::{SurfaceProvider, WindowError};

/// Bind the provider's window to `instance`
pub fn create_surface(instance: &Instance, provider: &dyn SurfaceProvider) -> VulkanResult<Surface> {
    let handle = match provider.create_surface(instance.entry(), instance.raw()) {
        Ok(handle) => handle,
        Err(WindowError::SurfaceCreation(code)) => return Err(VulkanError::native(code)),
        Err(error) => return Err(VulkanError::validation(format!("window cannot provide a surface: {error}"))),
    };

    if handle == vk::SurfaceKHR::null() {
        return Err(VulkanError::validation("window returned a null surface"));
    }

    Ok(unsafe { Surface::from_raw(instance.surface_loader().clone(), handle) })
}

/// Snapshot of what a surface supports on a physical device
#[derive(Debug, Clone, Default)]
pub struct SurfaceProperties {
    /// Image count, extent, usage and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and colour space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceProperties {
    /// Query capabilities, formats and present modes together
    ///
    /// Any failing query fails the whole call.
    pub fn query(surface: &Surface, physical_device: &PhysicalDevice) -> VulkanResult<Self> {
        if surface.is_null() {
            return Err(VulkanError::validation("surface is null"));
        }
        if physical_device.handle == vk::PhysicalDevice::null() {
            return Err(VulkanError::validation("physical device is null"));
        }

        let loader = surface.parent();
        let capabilities = unsafe {
            loader.get_physical_device_surface_capabilities(physical_device.handle, surface.handle())
        }
        .check()?;
        let formats = unsafe {
            loader.get_physical_device_surface_formats(physical_device.handle, surface.handle())
        }
        .check()?;
        let present_modes = unsafe {
            loader.get_physical_device_surface_present_modes(physical_device.handle, surface.handle())
        }
        .check()?;

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Whether swapchain images may be created with `usage`
    pub fn supports_usage(&self, usage: vk::ImageUsageFlags) -> bool {
        self.capabilities.supported_usage_flags.contains(usage)
    }
}

/// Prefer 8-bit RGBA (UNORM or SNORM); otherwise the first supported format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|candidate| {
            matches!(
                candidate.format,
                vk::Format::R8G8B8A8_UNORM | vk::Format::R8G8B8A8_SNORM
            )
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| VulkanError::not_found("surface format"))
}

/// Prefer MAILBOX; FIFO is always available otherwise
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_format_prefers_rgba8_over_list_order() {
        let formats = [
            format(vk::Format::B8G8R8A8_SRGB),
            format(vk::Format::R8G8B8A8_UNORM),
            format(vk::Format::R8G8B8A8_SNORM),
        ];

        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_format_accepts_snorm() {
        let formats = [format(vk::Format::B8G8R8A8_UNORM), format(vk::Format::R8G8B8A8_SNORM)];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_SNORM);
    }

    #[test]
    fn test_format_falls_back_to_first() {
        let formats = [format(vk::Format::B8G8R8A8_SRGB), format(vk::Format::A2B10G10R10_UNORM_PACK32)];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_format_empty_list_not_found() {
        assert!(matches!(choose_surface_format(&[]), Err(VulkanError::NotFound { .. })));
    }

    #[test]
    fn test_present_mode_policy() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO]), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_supports_usage_is_subset() {
        let properties = SurfaceProperties {
            capabilities: vk::SurfaceCapabilitiesKHR {
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(properties.supports_usage(vk::ImageUsageFlags::TRANSFER_DST));
        assert!(!properties.supports_usage(vk::ImageUsageFlags::STORAGE));
    }
}
