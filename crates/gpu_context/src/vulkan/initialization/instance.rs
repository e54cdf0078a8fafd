//! Vulkan instance creation with optional validation
//!
//! Validation messages are routed into the `log` facade by
//! [`debug_callback`], so they show up alongside the rest of the crate's
//! output under `RUST_LOG`.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Surface as SurfaceLoader;
use ash::{vk, Entry};
use std::ffi::{CStr, CString};

use crate::vulkan::error::{CheckNative, VulkanError, VulkanResult};
use crate::vulkan::handle::{DebugMessenger, Object};

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Instance creation parameters
#[derive(Debug, Clone)]
pub struct InstanceParameters {
    /// Application name reported to the driver
    pub application_name: String,
    /// Requested API version, as built by `vk::make_api_version`
    pub api_version: u32,
    /// Instance extensions, usually the window system's required set
    pub extensions: Vec<String>,
    /// Extra instance layers
    pub layers: Vec<String>,
    /// Enable the Khronos validation layer and a debug messenger
    pub enable_validation: bool,
}

impl Default for InstanceParameters {
    fn default() -> Self {
        Self {
            application_name: "gpu_context".to_string(),
            api_version: vk::API_VERSION_1_3,
            extensions: Vec::new(),
            layers: Vec::new(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

/// Vulkan instance wrapper with RAII cleanup
///
/// Field order is drop order: the messenger goes before the instance, and the
/// loader library is unloaded last.
pub struct Instance {
    debug_messenger: Option<DebugMessenger>,
    surface_loader: SurfaceLoader,
    raw: Object<ash::Instance>,
    api_version: u32,
    entry: Entry,
}

impl Instance {
    /// Load the Vulkan library and create an instance
    pub fn new(params: &InstanceParameters) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::not_found(format!("Vulkan loader: {e}")))?;

        let application_name = to_cstring(&params.application_name)?;
        let engine_name = to_cstring("gpu_context")?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&application_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(params.api_version);

        let mut extension_names = params
            .extensions
            .iter()
            .map(|name| to_cstring(name))
            .collect::<VulkanResult<Vec<_>>>()?;
        let mut layer_names = params
            .layers
            .iter()
            .map(|name| to_cstring(name))
            .collect::<VulkanResult<Vec<_>>>()?;

        let validation = params.enable_validation && layer_available(&entry, VALIDATION_LAYER);
        if params.enable_validation && !validation {
            log::warn!("{VALIDATION_LAYER} requested but not installed, continuing without it");
        }
        if validation {
            extension_names.push(DebugUtils::name().to_owned());
            layer_names.push(to_cstring(VALIDATION_LAYER)?);
        }

        let extension_pointers: Vec<_> = extension_names.iter().map(|name| name.as_ptr()).collect();
        let layer_pointers: Vec<_> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_pointers)
            .enabled_layer_names(&layer_pointers);

        let raw = unsafe { entry.create_instance(&create_info, None) }.check()?;
        let raw = unsafe { Object::from_raw(raw) };

        let debug_messenger = if validation {
            Some(create_debug_messenger(&entry, &raw)?)
        } else {
            None
        };

        log::debug!(
            "Created Vulkan instance ({} extensions, {} layers, validation {})",
            extension_pointers.len(),
            layer_pointers.len(),
            if validation { "on" } else { "off" }
        );

        Ok(Self {
            debug_messenger,
            surface_loader: SurfaceLoader::new(&entry, &raw),
            raw,
            api_version: params.api_version,
            entry,
        })
    }

    /// Loader entry points
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Instance dispatch table
    pub fn raw(&self) -> &ash::Instance {
        &self.raw
    }

    /// `VK_KHR_surface` loader bound to this instance
    pub fn surface_loader(&self) -> &SurfaceLoader {
        &self.surface_loader
    }

    /// API version the instance was created with
    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Whether validation messages are being routed to the log
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }
}

fn to_cstring(name: &str) -> VulkanResult<CString> {
    CString::new(name).map_err(|_| VulkanError::validation(format!("name contains NUL: {name:?}")))
}

#[allow(unused_unsafe)]
fn layer_available(entry: &Entry, layer: &str) -> bool {
    match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => layers.iter().any(|properties| {
            let name = unsafe { CStr::from_ptr(properties.layer_name.as_ptr()) };
            name.to_str() == Ok(layer)
        }),
        Err(code) => {
            log::warn!("Failed to enumerate instance layers: {code:?}");
            false
        }
    }
}

fn create_debug_messenger(entry: &Entry, instance: &ash::Instance) -> VulkanResult<DebugMessenger> {
    let debug_utils = DebugUtils::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let handle = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }.check()?;
    Ok(unsafe { DebugMessenger::from_raw(debug_utils, handle) })
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}
