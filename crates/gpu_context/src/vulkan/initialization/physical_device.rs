//! Physical device selection
//!
//! Selection is first-match in enumeration order. There is no scoring: the
//! preference is a filter, and the first device passing it wins.

use ash::vk;
use serde::{Deserialize, Serialize};
use std::ffi::CStr;

use crate::vulkan::error::{CheckNative, VulkanError, VulkanResult};
use crate::vulkan::initialization::features::{DeviceFeatures, FeatureLevel};
use crate::vulkan::initialization::instance::Instance;

/// Device type constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Discrete GPU
    Discrete,
    /// GPU integrated with the host
    Integrated,
    /// Virtualised GPU
    Virtual,
    /// Software rasteriser
    Cpu,
    /// Anything else the driver reports
    Other,
}

impl From<DeviceType> for vk::PhysicalDeviceType {
    fn from(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Discrete => Self::DISCRETE_GPU,
            DeviceType::Integrated => Self::INTEGRATED_GPU,
            DeviceType::Virtual => Self::VIRTUAL_GPU,
            DeviceType::Cpu => Self::CPU,
            DeviceType::Other => Self::OTHER,
        }
    }
}

/// Constraints a physical device must satisfy
#[derive(Debug, Clone, Default)]
pub struct DevicePreference {
    /// Minimum API version, compared by major then minor
    pub api_version: u32,
    /// Exact device name, if constrained
    pub name: Option<String>,
    /// Exact device type, if constrained
    pub device_type: Option<DeviceType>,
}

impl DevicePreference {
    /// Whether a device with `properties` satisfies every constraint
    pub fn matches(&self, properties: &vk::PhysicalDeviceProperties) -> bool {
        if !version_satisfies(properties.api_version, self.api_version) {
            return false;
        }

        if let Some(name) = &self.name {
            if device_name(properties) != *name {
                return false;
            }
        }

        match self.device_type {
            Some(device_type) => properties.device_type == device_type.into(),
            None => true,
        }
    }
}

/// `available >= requested`, comparing major then minor; patch is ignored
pub fn version_satisfies(available: u32, requested: u32) -> bool {
    let available = (vk::api_version_major(available), vk::api_version_minor(available));
    let requested = (vk::api_version_major(requested), vk::api_version_minor(requested));
    available >= requested
}

/// Lower of two versions, comparing major then minor
pub fn lower_version(a: u32, b: u32) -> u32 {
    if version_satisfies(a, b) {
        b
    } else {
        a
    }
}

/// Device name from its properties
pub fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    let bytes: Vec<u8> = properties
        .device_name
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Selected physical device with cached properties
///
/// A plain value: it owns no native state and is never destroyed.
#[derive(Debug, Clone, Copy)]
pub struct PhysicalDevice {
    /// Native handle
    pub handle: vk::PhysicalDevice,
    /// Properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory type and heap table
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl PhysicalDevice {
    /// Select the first enumerated device satisfying `preference`
    pub fn select(instance: &Instance, preference: &DevicePreference) -> VulkanResult<Self> {
        let handles = unsafe { instance.raw().enumerate_physical_devices() }.check()?;

        let candidates = handles.into_iter().map(|handle| {
            let properties = unsafe { instance.raw().get_physical_device_properties(handle) };
            (handle, properties)
        });

        let (handle, properties) = first_match(candidates, preference).ok_or_else(|| {
            VulkanError::not_found(format!("physical device matching {preference:?}"))
        })?;

        let memory_properties =
            unsafe { instance.raw().get_physical_device_memory_properties(handle) };

        log::info!(
            "Selected GPU: {} ({:?}, Vulkan {}.{})",
            device_name(&properties),
            properties.device_type,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version)
        );

        Ok(Self {
            handle,
            properties,
            memory_properties,
        })
    }

    /// Device name
    pub fn name(&self) -> String {
        device_name(&self.properties)
    }

    /// Queue family table
    pub fn queue_families(&self, instance: &Instance) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            instance
                .raw()
                .get_physical_device_queue_family_properties(self.handle)
        }
    }

    /// API version usable through `instance`: the lower of the two
    pub fn api_version(&self, instance: &Instance) -> u32 {
        lower_version(instance.api_version(), self.properties.api_version)
    }

    /// Feature structures usable through `instance`
    pub fn feature_level(&self, instance: &Instance) -> FeatureLevel {
        FeatureLevel::for_version(self.api_version(instance))
    }

    /// Supported features
    pub fn features(&self, instance: &Instance) -> DeviceFeatures {
        DeviceFeatures::query(instance.raw(), self.handle, self.feature_level(instance))
    }

    /// Entries of `required` the device does not advertise
    pub fn missing_extensions<S: AsRef<str>>(
        &self,
        instance: &Instance,
        required: &[S],
    ) -> VulkanResult<Vec<String>> {
        let available = unsafe {
            instance
                .raw()
                .enumerate_device_extension_properties(self.handle)
        }
        .check()?;

        let available: Vec<&CStr> = available
            .iter()
            .map(|properties| unsafe { CStr::from_ptr(properties.extension_name.as_ptr()) })
            .collect();

        Ok(required
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !available.iter().any(|known| known.to_str() == Ok(*name)))
            .map(str::to_string)
            .collect())
    }
}

fn first_match<H>(
    candidates: impl IntoIterator<Item = (H, vk::PhysicalDeviceProperties)>,
    preference: &DevicePreference,
) -> Option<(H, vk::PhysicalDeviceProperties)> {
    candidates
        .into_iter()
        .find(|(_, properties)| preference.matches(properties))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(name: &str, device_type: vk::PhysicalDeviceType, api_version: u32) -> vk::PhysicalDeviceProperties {
        let mut properties = vk::PhysicalDeviceProperties {
            device_type,
            api_version,
            ..Default::default()
        };
        for (slot, byte) in properties.device_name.iter_mut().zip(name.bytes()) {
            *slot = byte as std::ffi::c_char;
        }
        properties
    }

    #[test]
    fn test_version_compares_major_then_minor() {
        assert!(version_satisfies(vk::API_VERSION_1_3, vk::API_VERSION_1_2));
        assert!(version_satisfies(vk::make_api_version(0, 1, 3, 0), vk::make_api_version(0, 1, 3, 250)));
        assert!(!version_satisfies(vk::API_VERSION_1_1, vk::API_VERSION_1_2));
        assert!(version_satisfies(vk::make_api_version(0, 2, 0, 0), vk::API_VERSION_1_3));
    }

    #[test]
    fn test_lower_version_takes_older() {
        assert_eq!(lower_version(vk::API_VERSION_1_1, vk::API_VERSION_1_3), vk::API_VERSION_1_1);
        assert_eq!(lower_version(vk::API_VERSION_1_3, vk::API_VERSION_1_0), vk::API_VERSION_1_0);
        assert_eq!(
            FeatureLevel::for_version(lower_version(vk::API_VERSION_1_3, vk::make_api_version(0, 1, 2, 198))),
            FeatureLevel::Vulkan12
        );
    }

    #[test]
    fn test_device_name_stops_at_nul() {
        let properties = properties("Test GPU", vk::PhysicalDeviceType::CPU, vk::API_VERSION_1_3);
        assert_eq!(device_name(&properties), "Test GPU");
    }

    #[test]
    fn test_first_match_is_enumeration_order() {
        let candidates = vec![
            (0, properties("old", vk::PhysicalDeviceType::DISCRETE_GPU, vk::API_VERSION_1_1)),
            (1, properties("igpu", vk::PhysicalDeviceType::INTEGRATED_GPU, vk::API_VERSION_1_3)),
            (2, properties("dgpu", vk::PhysicalDeviceType::DISCRETE_GPU, vk::API_VERSION_1_3)),
        ];

        let any = DevicePreference {
            api_version: vk::API_VERSION_1_2,
            ..Default::default()
        };
        assert_eq!(first_match(candidates.clone(), &any).map(|(id, _)| id), Some(1));

        let discrete = DevicePreference {
            api_version: vk::API_VERSION_1_2,
            device_type: Some(DeviceType::Discrete),
            ..Default::default()
        };
        assert_eq!(first_match(candidates.clone(), &discrete).map(|(id, _)| id), Some(2));

        let named = DevicePreference {
            api_version: vk::API_VERSION_1_0,
            name: Some("old".to_string()),
            ..Default::default()
        };
        assert_eq!(first_match(candidates, &named).map(|(id, _)| id), Some(0));
    }

    #[test]
    fn test_no_match_returns_none() {
        let candidates = vec![(0, properties("gpu", vk::PhysicalDeviceType::DISCRETE_GPU, vk::API_VERSION_1_2))];
        let preference = DevicePreference {
            api_version: vk::API_VERSION_1_3,
            ..Default::default()
        };
        assert!(first_match(candidates, &preference).is_none());
    }

    #[test]
    fn test_name_must_match_exactly() {
        let props = properties("GeForce", vk::PhysicalDeviceType::DISCRETE_GPU, vk::API_VERSION_1_3);
        let preference = DevicePreference {
            name: Some("GeForce RTX".to_string()),
            ..Default::default()
        };
        assert!(!preference.matches(&props));
    }
}
