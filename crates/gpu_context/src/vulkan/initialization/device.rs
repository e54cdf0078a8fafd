//! Logical device creation and queue role resolution

use ash::vk;
use ash::prelude::VkResult;
use std::ffi::CString;

use crate::vulkan::error::{CheckNative, VulkanError, VulkanResult};
use crate::vulkan::handle::{Object, Surface};
use crate::vulkan::initialization::features::DeviceFeatures;
use crate::vulkan::initialization::instance::Instance;
use crate::vulkan::initialization::physical_device::PhysicalDevice;

static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Queue family index per role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family advertising compute
    pub compute: u32,
    /// First family advertising graphics
    pub graphics: u32,
    /// First family able to present to the target surface
    pub presentation: u32,
}

impl QueueFamilyIndices {
    /// Resolve roles by scanning `families` in order
    ///
    /// `presentation_support` answers whether a family can present to the
    /// target surface; a failed query counts as "no". Without it, presentation
    /// shares the graphics family.
    pub fn resolve(
        families: &[vk::QueueFamilyProperties],
        presentation_support: Option<&mut dyn FnMut(u32) -> VkResult<bool>>,
    ) -> VulkanResult<Self> {
        let first_with = |flag: vk::QueueFlags, role: &str| {
            families
                .iter()
                .position(|family| family.queue_flags.contains(flag))
                .map(|index| index as u32)
                .ok_or_else(|| VulkanError::not_found(format!("{role} queue family")))
        };

        let compute = first_with(vk::QueueFlags::COMPUTE, "compute")?;
        let graphics = first_with(vk::QueueFlags::GRAPHICS, "graphics")?;

        let presentation = match presentation_support {
            Some(supports) => (0..families.len() as u32)
                .find(|&index| matches!(supports(index), Ok(true)))
                .ok_or_else(|| VulkanError::not_found("presentation queue family"))?,
            None => graphics,
        };

        Ok(Self {
            compute,
            graphics,
            presentation,
        })
    }

    /// Distinct families, ascending
    pub fn distinct(&self) -> Vec<u32> {
        let mut families = vec![self.compute, self.graphics, self.presentation];
        families.sort_unstable();
        families.dedup();
        families
    }

    /// One single-queue creation request per distinct family
    pub fn queue_create_requests(&self) -> Vec<vk::DeviceQueueCreateInfo> {
        self.distinct()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&QUEUE_PRIORITIES)
                    .build()
            })
            .collect()
    }
}

/// One queue handle per role; roles sharing a family share the queue
#[derive(Debug, Clone, Copy)]
pub struct Queues {
    /// Resolved family indices
    pub families: QueueFamilyIndices,
    /// Compute queue
    pub compute: vk::Queue,
    /// Graphics queue
    pub graphics: vk::Queue,
    /// Presentation queue
    pub presentation: vk::Queue,
}

/// Device creation parameters
#[derive(Default)]
pub struct DeviceParameters<'a> {
    /// Features to enable, forwarded as a chain
    pub features: DeviceFeatures,
    /// Device extension names, forwarded verbatim
    pub extensions: Vec<String>,
    /// Surface the presentation role must support
    pub surface: Option<&'a Surface>,
}

/// Logical device with its resolved queues
pub struct Device {
    raw: Object<ash::Device>,
    physical: PhysicalDevice,
    queues: Queues,
}

impl Device {
    /// Create a logical device on `physical`
    pub fn new(
        instance: &Instance,
        physical: PhysicalDevice,
        params: &DeviceParameters<'_>,
    ) -> VulkanResult<Self> {
        let families = physical.queue_families(instance);

        let families = match params.surface {
            Some(surface) if surface.is_null() => {
                return Err(VulkanError::validation("device surface is null"));
            }
            Some(surface) => {
                let mut supports = |index: u32| unsafe {
                    surface.parent().get_physical_device_surface_support(
                        physical.handle,
                        index,
                        surface.handle(),
                    )
                };
                QueueFamilyIndices::resolve(&families, Some(&mut supports))?
            }
            None => QueueFamilyIndices::resolve(&families, None)?,
        };

        let queue_infos = families.queue_create_requests();

        let extension_names = params
            .extensions
            .iter()
            .map(|name| {
                CString::new(name.as_str())
                    .map_err(|_| VulkanError::validation(format!("extension name contains NUL: {name:?}")))
            })
            .collect::<VulkanResult<Vec<_>>>()?;
        let extension_pointers: Vec<_> = extension_names.iter().map(|name| name.as_ptr()).collect();

        let level = physical.feature_level(instance);
        let raw = params.features.with_chain(level, |chain| {
            let create_info = vk::DeviceCreateInfo::builder()
                .queue_create_infos(&queue_infos)
                .enabled_extension_names(&extension_pointers);
            let create_info = match chain {
                Some(features) => create_info.push_next(features),
                None => create_info.enabled_features(&params.features.core),
            };

            unsafe { instance.raw().create_device(physical.handle, &create_info, None) }.check()
        })?;
        let raw = unsafe { Object::from_raw(raw) };

        let queues = unsafe {
            Queues {
                families,
                compute: raw.get_device_queue(families.compute, 0),
                graphics: raw.get_device_queue(families.graphics, 0),
                presentation: raw.get_device_queue(families.presentation, 0),
            }
        };

        log::info!(
            "Created logical device: queue families compute={} graphics={} presentation={}",
            families.compute,
            families.graphics,
            families.presentation
        );

        Ok(Self {
            raw,
            physical,
            queues,
        })
    }

    /// Device dispatch table
    pub fn raw(&self) -> &ash::Device {
        &self.raw
    }

    /// Physical device the device was created on
    pub fn physical(&self) -> &PhysicalDevice {
        &self.physical
    }

    /// Queue handles and families
    pub fn queues(&self) -> &Queues {
        &self.queues
    }

    /// Block until the device finishes all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.raw.device_wait_idle() }.check()
    }
}
