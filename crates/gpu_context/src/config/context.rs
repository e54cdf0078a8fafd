//! Startup settings for a [`RenderContext`](crate::vulkan::context::RenderContext)
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```toml
//! device_type = "discrete"
//! features = ["sampler_anisotropy"]
//! recreation_policy = "out_of_date_status"
//!
//! [window]
//! width = 1280
//! height = 720
//! ```

use ash::vk;
use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::vulkan::error::VulkanResult;
use crate::vulkan::initialization::{DeviceFeatures, DevicePreference, DeviceType, InstanceParameters};
use crate::vulkan::state::{recording, RecreationPolicy};

const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Vulkan API version, major and minor only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

impl ApiVersion {
    /// Packed form used by the API
    pub fn to_vk(self) -> u32 {
        vk::make_api_version(0, self.major, self.minor, 0)
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self { major: 1, minor: 3 }
    }
}

/// Window settings for the host application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "gpu_context".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Context configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Application name reported to the driver
    pub application_name: String,
    /// Minimum API version of the instance and the selected device
    pub api_version: ApiVersion,
    /// Required device type
    pub device_type: Option<DeviceType>,
    /// Required device name, matched exactly
    pub device_name: Option<String>,
    /// Device extensions; must include the swapchain extension
    pub device_extensions: Vec<String>,
    /// Device features that must all be supported
    pub features: Vec<String>,
    /// Enable the validation layer
    pub enable_validation: bool,
    /// Swapchain images requested
    pub image_count: u32,
    /// Render target clear colour (RGBA)
    pub clear_color: [f32; 4],
    /// When the swapchain is rebuilt
    pub recreation_policy: RecreationPolicy,
    /// Window settings
    pub window: WindowConfig,
    /// Target frame interval in milliseconds
    pub frame_interval_ms: u64,
    /// Sleep in milliseconds after a frame that overran the interval
    pub min_sleep_ms: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            application_name: "gpu_context".to_string(),
            api_version: ApiVersion::default(),
            device_type: None,
            device_name: None,
            device_extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
            features: Vec::new(),
            enable_validation: cfg!(debug_assertions),
            image_count: 3,
            clear_color: recording::DEFAULT_CLEAR_COLOR,
            recreation_policy: RecreationPolicy::default(),
            window: WindowConfig::default(),
            frame_interval_ms: 16,
            min_sleep_ms: 2,
        }
    }
}

impl Config for ContextConfig {}

impl ContextConfig {
    /// Reject settings no context can be built from
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.device_extensions.iter().any(|name| name == SWAPCHAIN_EXTENSION) {
            return Err(ConfigError::Invalid(format!(
                "device_extensions must include {SWAPCHAIN_EXTENSION}"
            )));
        }
        if self.image_count == 0 {
            return Err(ConfigError::Invalid("image_count must be at least 1".to_string()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{} must be non-zero",
                self.window.width, self.window.height
            )));
        }
        if self.api_version.major == 0 {
            return Err(ConfigError::Invalid("api_version.major must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Physical device constraints
    pub fn device_preference(&self) -> DevicePreference {
        DevicePreference {
            api_version: self.api_version.to_vk(),
            name: self.device_name.clone(),
            device_type: self.device_type,
        }
    }

    /// Instance parameters, adding the window system's `extensions`
    pub fn instance_parameters(&self, extensions: Vec<String>) -> InstanceParameters {
        InstanceParameters {
            application_name: self.application_name.clone(),
            api_version: self.api_version.to_vk(),
            extensions,
            layers: Vec::new(),
            enable_validation: self.enable_validation,
        }
    }

    /// Requested feature set; unknown names are an error
    pub fn device_features(&self) -> VulkanResult<DeviceFeatures> {
        DeviceFeatures::from_names(&self.features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ContextConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.image_count, 3);
        assert_eq!(config.recreation_policy, RecreationPolicy::PollDrawableSize);
        assert_eq!(config.device_extensions, vec![SWAPCHAIN_EXTENSION.to_string()]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ContextConfig = toml::from_str(
            r#"
            device_type = "discrete"
            features = ["sampler_anisotropy"]
            recreation_policy = "out_of_date_status"

            [api_version]
            major = 1
            minor = 2

            [window]
            width = 1280
            "#,
        )
        .unwrap();

        assert_eq!(config.device_type, Some(DeviceType::Discrete));
        assert_eq!(config.recreation_policy, RecreationPolicy::OutOfDateStatus);
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.image_count, 3);
        assert_eq!(config.api_version.to_vk(), vk::API_VERSION_1_2);
        assert!(config.device_features().unwrap().is_enabled("sampler_anisotropy").unwrap());
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        let without_swapchain = ContextConfig {
            device_extensions: Vec::new(),
            ..ContextConfig::default()
        };
        assert!(matches!(without_swapchain.validate(), Err(ConfigError::Invalid(_))));

        let no_images = ContextConfig {
            image_count: 0,
            ..ContextConfig::default()
        };
        assert!(no_images.validate().is_err());

        let mut flat_window = ContextConfig::default();
        flat_window.window.height = 0;
        assert!(flat_window.validate().is_err());
    }

    #[test]
    fn test_unknown_feature_name_rejected() {
        let config = ContextConfig {
            features: vec!["warp_drive".to_string()],
            ..ContextConfig::default()
        };
        assert!(config.device_features().is_err());
    }

    #[test]
    fn test_device_preference_carries_constraints() {
        let config = ContextConfig {
            device_name: Some("llvmpipe".to_string()),
            device_type: Some(DeviceType::Cpu),
            ..ContextConfig::default()
        };

        let preference = config.device_preference();
        assert_eq!(preference.api_version, vk::API_VERSION_1_3);
        assert_eq!(preference.name.as_deref(), Some("llvmpipe"));
        assert_eq!(preference.device_type, Some(DeviceType::Cpu));
    }

    #[test]
    fn test_ron_file_round_trip() {
        let path = std::env::temp_dir().join(format!("gpu_context_config_{}.ron", std::process::id()));
        let path = path.to_string_lossy().into_owned();

        let config = ContextConfig {
            image_count: 2,
            clear_color: [0.0, 0.5, 1.0, 1.0],
            ..ContextConfig::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = ContextConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            ContextConfig::default().save_to_file("settings.ini"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
