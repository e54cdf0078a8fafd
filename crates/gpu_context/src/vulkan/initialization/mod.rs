//! Vulkan initialization: instance, device negotiation and surfaces

/// Logical device and queue roles
pub mod device;

/// Feature aggregate and named feature lookup
pub mod features;

/// Instance creation and validation messenger
pub mod instance;

/// Physical device selection
pub mod physical_device;

/// Surface creation, properties and selection policies
pub mod surface;

pub use device::{Device, DeviceParameters, QueueFamilyIndices, Queues};
pub use features::{DeviceFeatures, FeatureLevel};
pub use instance::{Instance, InstanceParameters};
pub use physical_device::{DevicePreference, DeviceType, PhysicalDevice};
pub use surface::SurfaceProperties;
