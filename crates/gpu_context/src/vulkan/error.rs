//! Vulkan error taxonomy
//!
//! Every fallible operation in the crate returns [`VulkanResult`]. Native
//! failures carry the source location of the facade call that observed them,
//! so a log line points straight at the failing creation or query.

use ash::vk;
use std::panic::Location;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VulkanError {
    /// Malformed caller input
    #[error("Validation failed: {reason}")]
    Validation {
        /// What was wrong with the input
        reason: String,
    },

    /// A native call returned a failure status
    #[error("Vulkan call failed at {location}: {code:?}")]
    NativeCall {
        /// Source location of the facade call that failed
        location: &'static Location<'static>,
        /// Status code returned by the driver
        code: vk::Result,
    },

    /// No matching memory type, or a result list could not be sized
    #[error("Resource exhausted: {reason}")]
    ResourceExhausted {
        /// Which resource ran out
        reason: String,
    },

    /// Negotiation found no device, queue family or image satisfying constraints
    #[error("Not found: {what}")]
    NotFound {
        /// What was being looked for
        what: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

impl VulkanError {
    /// Wrap a native status code, recording the caller's location
    #[track_caller]
    #[must_use]
    pub fn native(code: vk::Result) -> Self {
        Self::NativeCall {
            location: Location::caller(),
            code,
        }
    }

    /// Build a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }

    /// Build a resource exhaustion error
    pub fn exhausted(reason: impl Into<String>) -> Self {
        Self::ResourceExhausted { reason: reason.into() }
    }

    /// Build a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Native status code, if this error came from a native call
    #[must_use]
    pub const fn code(&self) -> Option<vk::Result> {
        match self {
            Self::NativeCall { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Conversion of raw `ash` results into [`VulkanResult`]
///
/// `map_err(VulkanError::native)` would record the location inside the
/// closure machinery, so the conversion goes through a `#[track_caller]`
/// method instead.
pub trait CheckNative<T> {
    /// Convert, tagging failures with the caller's location
    fn check(self) -> VulkanResult<T>;
}

impl<T> CheckNative<T> for Result<T, vk::Result> {
    #[track_caller]
    fn check(self) -> VulkanResult<T> {
        match self {
            Ok(value) => Ok(value),
            Err(code) => Err(VulkanError::native(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_records_call_site() {
        let line = line!() + 1;
        let error = Err::<(), _>(vk::Result::ERROR_DEVICE_LOST).check().unwrap_err();

        match error {
            VulkanError::NativeCall { location, code } => {
                assert_eq!(code, vk::Result::ERROR_DEVICE_LOST);
                assert_eq!(location.line(), line);
                assert!(location.file().ends_with("error.rs"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_code_only_for_native_errors() {
        assert_eq!(
            VulkanError::native(vk::Result::TIMEOUT).code(),
            Some(vk::Result::TIMEOUT)
        );
        assert_eq!(VulkanError::not_found("gpu").code(), None);
    }

    #[test]
    fn test_display_messages() {
        let error = VulkanError::exhausted("no memory type");
        assert_eq!(error.to_string(), "Resource exhausted: no memory type");

        let error = VulkanError::validation("zero-sized drawable");
        assert_eq!(error.to_string(), "Validation failed: zero-sized drawable");
    }
}
