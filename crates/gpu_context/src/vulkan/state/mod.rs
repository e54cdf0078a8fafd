//! Presentation state: swapchain lifecycle, command recording and frame pacing

/// Frame state machine
pub mod frame;

/// Render and presentation command recording
pub mod recording;

/// Swapchain creation and image retrieval
pub mod swapchain;

pub use frame::{
    AcquiredImage, FrameDriver, FrameSemaphores, FrameState, FrameStats, PresentationEngine, RecreationPolicy,
    SwapchainLifecycle, SwapchainState,
};
pub use swapchain::SwapchainParameters;
