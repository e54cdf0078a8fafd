//! Swapchain creation, recreation and image retrieval
//!
//! A swapchain is always created from a predecessor, which may be null. The
//! predecessor stays owned by the caller and must be kept alive until the new
//! swapchain exists; dropping it afterwards retires it.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

use crate::vulkan::error::{CheckNative, VulkanError, VulkanResult};
use crate::vulkan::handle::Swapchain;
use crate::vulkan::initialization::device::Device;
use crate::vulkan::initialization::instance::Instance;
use crate::vulkan::initialization::surface::{self, SurfaceProperties};

/// Swapchain creation parameters
#[derive(Debug, Clone, Copy)]
pub struct SwapchainParameters {
    /// Target surface
    pub surface: vk::SurfaceKHR,
    /// Image format and colour space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Pre-transform applied by the presentation engine
    pub transform: vk::SurfaceTransformFlagsKHR,
    /// How swapchain images will be used
    pub image_usage: vk::ImageUsageFlags,
    /// Minimum number of images requested
    pub image_count: u32,
    /// Image size
    pub image_extent: vk::Extent2D,
    /// Array layers per image
    pub image_array_layers: u32,
}

impl SwapchainParameters {
    /// Negotiate parameters for `surface` from its queried properties
    ///
    /// Fails if the surface cannot be written by transfers or needs more than
    /// `image_count` images.
    pub fn negotiate(
        surface: vk::SurfaceKHR,
        properties: &SurfaceProperties,
        image_count: u32,
    ) -> VulkanResult<Self> {
        if !properties.supports_usage(vk::ImageUsageFlags::TRANSFER_DST) {
            return Err(VulkanError::not_found("surface supporting transfer destination usage"));
        }

        let capabilities = &properties.capabilities;
        if capabilities.min_image_count > image_count {
            return Err(VulkanError::not_found(format!(
                "surface accepting {image_count} swapchain images (needs at least {})",
                capabilities.min_image_count
            )));
        }

        let image_count = if capabilities.max_image_count == 0 {
            image_count
        } else {
            image_count.min(capabilities.max_image_count)
        };

        Ok(Self {
            surface,
            surface_format: surface::choose_surface_format(&properties.formats)?,
            present_mode: surface::choose_present_mode(&properties.present_modes),
            transform: capabilities.current_transform,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            image_count,
            image_extent: vk::Extent2D::default(),
            image_array_layers: 1,
        })
    }
}

/// Null swapchain bound to `device`, used as the first predecessor
pub fn null_swapchain(instance: &Instance, device: &Device) -> Swapchain {
    Swapchain::null(SwapchainLoader::new(instance.raw(), device.raw()))
}

/// Create a swapchain replacing `predecessor`
///
/// The new swapchain reuses the predecessor's device. The predecessor is only
/// read; the caller drops it once this returns.
pub fn create_swapchain(predecessor: &Swapchain, params: &SwapchainParameters) -> VulkanResult<Swapchain> {
    if params.surface == vk::SurfaceKHR::null() {
        return Err(VulkanError::validation("swapchain surface is null"));
    }
    if params.image_extent.width == 0 || params.image_extent.height == 0 {
        return Err(VulkanError::validation("swapchain extent must be non-zero"));
    }

    let info = vk::SwapchainCreateInfoKHR::builder()
        .surface(params.surface)
        .min_image_count(params.image_count)
        .image_format(params.surface_format.format)
        .image_color_space(params.surface_format.color_space)
        .image_extent(params.image_extent)
        .image_array_layers(params.image_array_layers)
        .image_usage(params.image_usage)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(params.transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(params.present_mode)
        .clipped(true)
        .old_swapchain(predecessor.handle());

    let loader = predecessor.parent();
    let handle = unsafe { loader.create_swapchain(&info, None) }.check()?;

    log::debug!(
        "Created swapchain {}x{} ({:?}, {:?}, {} images requested)",
        params.image_extent.width,
        params.image_extent.height,
        params.surface_format.format,
        params.present_mode,
        params.image_count
    );

    Ok(unsafe { Swapchain::from_raw(loader.clone(), handle) })
}

/// Build a successor to `current` and install it
///
/// Creation retires the predecessor whether or not it succeeds, so a retired
/// swapchain is never handed back: on failure `current` becomes `null()` and
/// the old one is released.
pub fn replace_swapchain<T>(
    current: &mut T,
    build: impl FnOnce(&T) -> VulkanResult<T>,
    null: impl FnOnce() -> T,
) -> VulkanResult<()> {
    match build(current) {
        Ok(successor) => {
            *current = successor;
            Ok(())
        }
        Err(error) => {
            *current = null();
            Err(error)
        }
    }
}

/// Presentable images of `swapchain`
pub fn swapchain_images(swapchain: &Swapchain) -> VulkanResult<Vec<vk::Image>> {
    if swapchain.is_null() {
        return Err(VulkanError::validation("swapchain is null"));
    }

    unsafe { swapchain.parent().get_swapchain_images(swapchain.handle()) }.check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn properties(usage: vk::ImageUsageFlags, min_images: u32, max_images: u32) -> SurfaceProperties {
        SurfaceProperties {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: min_images,
                max_image_count: max_images,
                supported_usage_flags: usage,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    #[test]
    fn test_negotiate_applies_policies() {
        let props = properties(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::COLOR_ATTACHMENT, 2, 8);
        let params = SwapchainParameters::negotiate(vk::SurfaceKHR::null(), &props, 3).unwrap();

        assert_eq!(params.surface_format.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(params.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(params.image_count, 3);
        assert_eq!(params.transform, vk::SurfaceTransformFlagsKHR::IDENTITY);
        assert!(params.image_usage.contains(vk::ImageUsageFlags::TRANSFER_DST));
    }

    #[test]
    fn test_negotiate_requires_transfer_destination() {
        let props = properties(vk::ImageUsageFlags::COLOR_ATTACHMENT, 2, 8);
        let error = SwapchainParameters::negotiate(vk::SurfaceKHR::null(), &props, 3).unwrap_err();
        assert!(matches!(error, VulkanError::NotFound { .. }));
    }

    #[test]
    fn test_negotiate_rejects_excessive_minimum() {
        let props = properties(vk::ImageUsageFlags::TRANSFER_DST, 4, 8);
        assert!(SwapchainParameters::negotiate(vk::SurfaceKHR::null(), &props, 3).is_err());
    }

    #[test]
    fn test_negotiate_clamps_to_maximum() {
        let props = properties(vk::ImageUsageFlags::TRANSFER_DST, 1, 2);
        let params = SwapchainParameters::negotiate(vk::SurfaceKHR::null(), &props, 3).unwrap();
        assert_eq!(params.image_count, 2);

        let unbounded = properties(vk::ImageUsageFlags::TRANSFER_DST, 1, 0);
        let params = SwapchainParameters::negotiate(vk::SurfaceKHR::null(), &unbounded, 3).unwrap();
        assert_eq!(params.image_count, 3);
    }

    struct Tracked {
        name: &'static str,
        released: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.released.borrow_mut().push(self.name);
        }
    }

    #[test]
    fn test_failed_replacement_drops_retired_predecessor() {
        let released = Rc::new(RefCell::new(Vec::new()));
        let tracked = |name| Tracked {
            name,
            released: Rc::clone(&released),
        };
        let mut current = tracked("first");

        let error = replace_swapchain(
            &mut current,
            |old| {
                assert_eq!(old.name, "first");
                Err(VulkanError::native(vk::Result::ERROR_SURFACE_LOST_KHR))
            },
            || tracked("null"),
        )
        .unwrap_err();

        assert_eq!(error.code(), Some(vk::Result::ERROR_SURFACE_LOST_KHR));
        assert_eq!(current.name, "null");
        assert_eq!(*released.borrow(), ["first"]);

        replace_swapchain(
            &mut current,
            |old| {
                assert_eq!(old.name, "null");
                Ok(tracked("second"))
            },
            || tracked("unused"),
        )
        .unwrap();

        assert_eq!(current.name, "second");
        assert_eq!(*released.borrow(), ["first", "null"]);
    }
}
