//! Device feature aggregate
//!
//! The four feature payloads are stored unlinked (null `p_next`), so the
//! aggregate can be copied and moved freely. A chain is linked on the stack
//! only for the duration of a query or of device creation.

use ash::vk;
use std::ptr;

use crate::vulkan::error::{VulkanError, VulkanResult};

/// Feature structures an API version can carry
///
/// `VkPhysicalDeviceFeatures2` arrived in 1.1, the per-version 1.1 and 1.2
/// payloads in 1.2, the 1.3 payload in 1.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeatureLevel {
    /// `VkPhysicalDeviceFeatures` only
    Core,
    /// `VkPhysicalDeviceFeatures2` with nothing chained
    Features2,
    /// Features2 with the 1.1 and 1.2 payloads
    Vulkan12,
    /// Features2 with the 1.1, 1.2 and 1.3 payloads
    Vulkan13,
}

impl FeatureLevel {
    /// Level for an API version; only major and minor count
    pub fn for_version(api_version: u32) -> Self {
        match (vk::api_version_major(api_version), vk::api_version_minor(api_version)) {
            (0, _) | (1, 0) => Self::Core,
            (1, 1) => Self::Features2,
            (1, 2) => Self::Vulkan12,
            _ => Self::Vulkan13,
        }
    }
}

/// Core, 1.1, 1.2 and 1.3 feature payloads
#[derive(Clone, Copy, Default)]
pub struct DeviceFeatures {
    /// `VkPhysicalDeviceFeatures`
    pub core: vk::PhysicalDeviceFeatures,
    /// `VkPhysicalDeviceVulkan11Features`
    pub vulkan_11: vk::PhysicalDeviceVulkan11Features,
    /// `VkPhysicalDeviceVulkan12Features`
    pub vulkan_12: vk::PhysicalDeviceVulkan12Features,
    /// `VkPhysicalDeviceVulkan13Features`
    pub vulkan_13: vk::PhysicalDeviceVulkan13Features,
}

/// Table of features addressable by name
macro_rules! named_features {
    ($($name:literal => $group:ident . $field:ident,)*) => {
        impl DeviceFeatures {
            /// Every feature name accepted by [`DeviceFeatures::from_names`]
            pub const NAMES: &'static [&'static str] = &[$($name),*];

            fn flag(&self, name: &str) -> Option<vk::Bool32> {
                match name {
                    $($name => Some(self.$group.$field),)*
                    _ => None,
                }
            }

            fn flag_mut(&mut self, name: &str) -> Option<&mut vk::Bool32> {
                match name {
                    $($name => Some(&mut self.$group.$field),)*
                    _ => None,
                }
            }
        }
    };
}

named_features! {
    "sampler_anisotropy" => core.sampler_anisotropy,
    "fill_mode_non_solid" => core.fill_mode_non_solid,
    "geometry_shader" => core.geometry_shader,
    "multi_draw_indirect" => core.multi_draw_indirect,
    "draw_indirect_first_instance" => core.draw_indirect_first_instance,
    "shader_int64" => core.shader_int64,
    "multiview" => vulkan_11.multiview,
    "shader_draw_parameters" => vulkan_11.shader_draw_parameters,
    "draw_indirect_count" => vulkan_12.draw_indirect_count,
    "descriptor_indexing" => vulkan_12.descriptor_indexing,
    "descriptor_binding_variable_descriptor_count" => vulkan_12.descriptor_binding_variable_descriptor_count,
    "runtime_descriptor_array" => vulkan_12.runtime_descriptor_array,
    "scalar_block_layout" => vulkan_12.scalar_block_layout,
    "timeline_semaphore" => vulkan_12.timeline_semaphore,
    "buffer_device_address" => vulkan_12.buffer_device_address,
    "synchronization2" => vulkan_13.synchronization2,
    "dynamic_rendering" => vulkan_13.dynamic_rendering,
    "maintenance4" => vulkan_13.maintenance4,
}

impl DeviceFeatures {
    /// Aggregate with exactly the named features enabled
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> VulkanResult<Self> {
        let mut features = Self::default();
        for name in names {
            features.enable(name.as_ref())?;
        }
        Ok(features)
    }

    /// Enable one feature by name
    pub fn enable(&mut self, name: &str) -> VulkanResult<()> {
        let flag = self
            .flag_mut(name)
            .ok_or_else(|| VulkanError::validation(format!("unknown device feature: {name}")))?;
        *flag = vk::TRUE;
        Ok(())
    }

    /// Whether a named feature is enabled
    pub fn is_enabled(&self, name: &str) -> VulkanResult<bool> {
        self.flag(name)
            .map(|flag| flag == vk::TRUE)
            .ok_or_else(|| VulkanError::validation(format!("unknown device feature: {name}")))
    }

    /// Names enabled in `requested` but not in `self`
    pub fn missing(&self, requested: &Self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .copied()
            .filter(|name| requested.flag(name) == Some(vk::TRUE) && self.flag(name) != Some(vk::TRUE))
            .collect()
    }

    /// Query what `physical_device` supports at `level`
    ///
    /// Payloads the level does not provide are left zeroed.
    pub fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice, level: FeatureLevel) -> Self {
        let mut vulkan_11 = vk::PhysicalDeviceVulkan11Features::default();
        let mut vulkan_12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut vulkan_13 = vk::PhysicalDeviceVulkan13Features::default();

        let core = if level >= FeatureLevel::Features2 {
            let mut head = vk::PhysicalDeviceFeatures2::builder();
            if level >= FeatureLevel::Vulkan12 {
                head = head.push_next(&mut vulkan_11).push_next(&mut vulkan_12);
            }
            if level >= FeatureLevel::Vulkan13 {
                head = head.push_next(&mut vulkan_13);
            }
            unsafe { instance.get_physical_device_features2(physical_device, &mut head) };
            head.features
        } else {
            unsafe { instance.get_physical_device_features(physical_device) }
        };

        Self {
            core,
            vulkan_11,
            vulkan_12,
            vulkan_13,
        }
        .unlinked()
    }

    /// Link a fresh chain for the duration of `use_chain`
    ///
    /// Only the payloads `level` provides are linked. At
    /// [`FeatureLevel::Core`] there is no chain and `use_chain` gets `None`;
    /// pass [`Self::core`] as `pEnabledFeatures` instead.
    pub fn with_chain<R>(
        &self,
        level: FeatureLevel,
        use_chain: impl FnOnce(Option<&mut vk::PhysicalDeviceFeatures2>) -> R,
    ) -> R {
        let Self {
            core,
            mut vulkan_11,
            mut vulkan_12,
            mut vulkan_13,
        } = self.unlinked();

        if level == FeatureLevel::Core {
            return use_chain(None);
        }

        let mut head = vk::PhysicalDeviceFeatures2::builder().features(core);
        if level >= FeatureLevel::Vulkan12 {
            head = head.push_next(&mut vulkan_11).push_next(&mut vulkan_12);
        }
        if level >= FeatureLevel::Vulkan13 {
            head = head.push_next(&mut vulkan_13);
        }

        use_chain(Some(&mut *head))
    }

    fn unlinked(mut self) -> Self {
        self.vulkan_11.p_next = ptr::null_mut();
        self.vulkan_12.p_next = ptr::null_mut();
        self.vulkan_13.p_next = ptr::null_mut();
        self
    }
}

impl std::fmt::Debug for DeviceFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let enabled: Vec<_> = Self::NAMES
            .iter()
            .filter(|name| self.flag(name) == Some(vk::TRUE))
            .collect();
        f.debug_struct("DeviceFeatures").field("enabled", &enabled).finish()
    }
}
