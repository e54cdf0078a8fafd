//! Per-frame acquire, submit and present state machine
//!
//! The driver knows nothing about swapchains or queues; it talks to a
//! [`PresentationEngine`]. Native failures are absorbed: the frame is dropped,
//! counted, and the next tick starts again from [`FrameState::Idle`].

use ash::prelude::VkResult;
use ash::vk;
use serde::{Deserialize, Serialize};

use crate::vulkan::error::VulkanResult;

/// Image handed out by the presentation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Index into the swapchain image list
    pub index: u32,
    /// Image is usable but the swapchain no longer matches the surface
    pub suboptimal: bool,
}

/// Native operations behind one frame
pub trait PresentationEngine {
    /// Acquire the next presentable image, signalling `signal` when it is ready
    fn acquire_next_image(&mut self, signal: vk::Semaphore) -> VkResult<AcquiredImage>;

    /// Submit the work recorded for `image_index`
    ///
    /// Waits on `wait` at the transfer stage and signals `signal` on completion.
    fn submit(&mut self, image_index: u32, wait: vk::Semaphore, signal: vk::Semaphore) -> VkResult<()>;

    /// Queue `image_index` for presentation once `wait` is signalled
    ///
    /// Returns whether the swapchain is suboptimal.
    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> VkResult<bool>;
}

/// Where the current frame got to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    /// No image held
    #[default]
    Idle,
    /// Image acquired, work not yet submitted
    Acquired {
        /// Acquired image index
        image_index: u32,
    },
    /// Work submitted, image not yet presented
    Submitted {
        /// Acquired image index
        image_index: u32,
    },
    /// Image queued for presentation; the next tick starts from Idle
    Presented {
        /// Presented image index
        image_index: u32,
    },
}

/// Semaphores linking the three stages of a frame
#[derive(Debug, Clone, Copy)]
pub struct FrameSemaphores {
    /// Signalled by acquire, waited on by submit
    pub acquired: vk::Semaphore,
    /// Signalled by submit, waited on by present
    pub completed: vk::Semaphore,
}

/// When the swapchain should be rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecreationPolicy {
    /// Compare the drawable size with the swapchain extent before each frame
    #[default]
    PollDrawableSize,
    /// Rebuild when acquire or present report out-of-date or suboptimal
    OutOfDateStatus,
}

/// Frame counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Frames queued for presentation
    pub presented: u64,
    /// Frames abandoned after a native failure
    pub dropped: u64,
}

/// Drives one acquire, submit and present cycle per tick
#[derive(Debug, Default)]
pub struct FrameDriver {
    state: FrameState,
    policy: RecreationPolicy,
    stats: FrameStats,
    recreation_requested: bool,
}

impl FrameDriver {
    /// Create an idle driver
    pub fn new(policy: RecreationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Run one frame
    ///
    /// Never reports failure; a failing stage drops the frame and leaves the
    /// driver Idle.
    pub fn tick<E: PresentationEngine + ?Sized>(&mut self, engine: &mut E, semaphores: FrameSemaphores) {
        if let FrameState::Presented { .. } = self.state {
            self.state = FrameState::Idle;
        }

        let acquired = match engine.acquire_next_image(semaphores.acquired) {
            Ok(acquired) => acquired,
            Err(code) => return self.drop_frame("acquire", code),
        };
        if acquired.suboptimal {
            self.flag_stale();
        }
        self.state = FrameState::Acquired {
            image_index: acquired.index,
        };

        if let Err(code) = engine.submit(acquired.index, semaphores.acquired, semaphores.completed) {
            return self.drop_frame("submit", code);
        }
        self.state = FrameState::Submitted {
            image_index: acquired.index,
        };

        match engine.present(acquired.index, semaphores.completed) {
            Ok(suboptimal) => {
                if suboptimal {
                    self.flag_stale();
                }
                self.state = FrameState::Presented {
                    image_index: acquired.index,
                };
                self.stats.presented += 1;
            }
            Err(code) => self.drop_frame("present", code),
        }
    }

    /// Current state
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Counters since creation
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Active recreation policy
    pub fn policy(&self) -> RecreationPolicy {
        self.policy
    }

    /// Whether a rebuild was flagged since the last call, clearing the flag
    pub fn take_recreation_request(&mut self) -> bool {
        std::mem::take(&mut self.recreation_requested)
    }

    fn drop_frame(&mut self, stage: &str, code: vk::Result) {
        log::debug!("Frame dropped at {stage}: {code:?}");
        if code == vk::Result::ERROR_OUT_OF_DATE_KHR {
            self.flag_stale();
        }
        self.state = FrameState::Idle;
        self.stats.dropped += 1;
    }

    fn flag_stale(&mut self) {
        if self.policy == RecreationPolicy::OutOfDateStatus {
            self.recreation_requested = true;
        }
    }
}

/// Whether the current swapchain can be rendered to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// Swapchain, images and command buffers are consistent
    Valid,
    /// Not built yet, or the last rebuild failed
    Invalid,
}

/// Frame driver gated on the swapchain's state
///
/// A rebuild is bracketed by [`Self::begin_rebuild`] and
/// [`Self::finish_rebuild`]; until one finishes successfully
/// [`Self::render`] does nothing.
#[derive(Debug)]
pub struct SwapchainLifecycle {
    driver: FrameDriver,
    state: SwapchainState,
    requested_extent: vk::Extent2D,
}

impl SwapchainLifecycle {
    /// Start without a swapchain
    pub fn new(policy: RecreationPolicy) -> Self {
        Self {
            driver: FrameDriver::new(policy),
            state: SwapchainState::Invalid,
            requested_extent: vk::Extent2D::default(),
        }
    }

    /// Whether the swapchain should be rebuilt for a drawable of `drawable` size
    ///
    /// Always false while the drawable has a zero dimension (minimised
    /// windows), since nothing can be built for it.
    pub fn needs_recreation(&mut self, drawable: vk::Extent2D) -> bool {
        if drawable.width == 0 || drawable.height == 0 {
            return false;
        }

        let flagged = self.driver.take_recreation_request();
        if self.state == SwapchainState::Invalid || flagged {
            return true;
        }

        self.driver.policy() == RecreationPolicy::PollDrawableSize && self.requested_extent != drawable
    }

    /// Mark the swapchain unusable while it is rebuilt
    pub fn begin_rebuild(&mut self) {
        self.state = SwapchainState::Invalid;
    }

    /// Record the outcome of a rebuild requested for the returned drawable size
    ///
    /// Failure keeps the state [`SwapchainState::Invalid`].
    pub fn finish_rebuild(&mut self, outcome: VulkanResult<vk::Extent2D>) -> VulkanResult<()> {
        let requested = outcome?;
        self.requested_extent = requested;
        self.state = SwapchainState::Valid;
        Ok(())
    }

    /// Run one frame, or nothing while the swapchain is invalid
    pub fn render<E: PresentationEngine + ?Sized>(&mut self, engine: &mut E, semaphores: FrameSemaphores) {
        if self.state == SwapchainState::Valid {
            self.driver.tick(engine, semaphores);
        }
    }

    /// Current swapchain state
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// Drawable size the current swapchain was built for
    pub fn requested_extent(&self) -> vk::Extent2D {
        self.requested_extent
    }

    /// Underlying frame driver
    pub fn driver(&self) -> &FrameDriver {
        &self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vulkan::error::VulkanError;
    use ash::vk::Handle;

    #[derive(Default)]
    struct FakeEngine {
        fail_acquire: Option<vk::Result>,
        fail_submit: Option<vk::Result>,
        fail_present: Option<vk::Result>,
        suboptimal: bool,
        next_index: u32,
        calls: Vec<&'static str>,
    }

    impl PresentationEngine for FakeEngine {
        fn acquire_next_image(&mut self, signal: vk::Semaphore) -> VkResult<AcquiredImage> {
            assert_eq!(signal, semaphores().acquired);
            self.calls.push("acquire");
            if let Some(code) = self.fail_acquire {
                return Err(code);
            }
            let index = self.next_index;
            self.next_index = (self.next_index + 1) % 3;
            Ok(AcquiredImage {
                index,
                suboptimal: self.suboptimal,
            })
        }

        fn submit(&mut self, _image_index: u32, wait: vk::Semaphore, signal: vk::Semaphore) -> VkResult<()> {
            assert_eq!(wait, semaphores().acquired);
            assert_eq!(signal, semaphores().completed);
            self.calls.push("submit");
            self.fail_submit.map_or(Ok(()), Err)
        }

        fn present(&mut self, _image_index: u32, wait: vk::Semaphore) -> VkResult<bool> {
            assert_eq!(wait, semaphores().completed);
            self.calls.push("present");
            self.fail_present.map_or(Ok(self.suboptimal), Err)
        }
    }

    fn semaphores() -> FrameSemaphores {
        FrameSemaphores {
            acquired: vk::Semaphore::from_raw(1),
            completed: vk::Semaphore::from_raw(2),
        }
    }

    #[test]
    fn test_full_cycle_presents() {
        let mut driver = FrameDriver::default();
        let mut engine = FakeEngine::default();

        driver.tick(&mut engine, semaphores());

        assert_eq!(engine.calls, ["acquire", "submit", "present"]);
        assert_eq!(driver.state(), FrameState::Presented { image_index: 0 });
        assert_eq!(driver.stats(), FrameStats { presented: 1, dropped: 0 });

        driver.tick(&mut engine, semaphores());
        assert_eq!(driver.state(), FrameState::Presented { image_index: 1 });
    }

    #[test]
    fn test_failed_acquire_stays_idle() {
        let mut driver = FrameDriver::default();
        let mut engine = FakeEngine {
            fail_acquire: Some(vk::Result::TIMEOUT),
            ..FakeEngine::default()
        };

        driver.tick(&mut engine, semaphores());

        assert_eq!(engine.calls, ["acquire"]);
        assert_eq!(driver.state(), FrameState::Idle);
        assert_eq!(driver.stats().dropped, 1);
    }

    #[test]
    fn test_failed_submit_recovers_next_tick() {
        let mut driver = FrameDriver::default();
        let mut engine = FakeEngine {
            fail_submit: Some(vk::Result::ERROR_DEVICE_LOST),
            ..FakeEngine::default()
        };

        driver.tick(&mut engine, semaphores());
        assert_eq!(driver.state(), FrameState::Idle);
        assert_eq!(engine.calls, ["acquire", "submit"]);

        engine.fail_submit = None;
        engine.calls.clear();
        driver.tick(&mut engine, semaphores());

        assert_eq!(engine.calls, ["acquire", "submit", "present"]);
        assert_eq!(driver.state(), FrameState::Presented { image_index: 1 });
        assert_eq!(driver.stats(), FrameStats { presented: 1, dropped: 1 });
    }

    #[test]
    fn test_failed_present_drops_frame() {
        let mut driver = FrameDriver::default();
        let mut engine = FakeEngine {
            fail_present: Some(vk::Result::ERROR_SURFACE_LOST_KHR),
            ..FakeEngine::default()
        };

        driver.tick(&mut engine, semaphores());

        assert_eq!(driver.state(), FrameState::Idle);
        assert_eq!(driver.stats(), FrameStats { presented: 0, dropped: 1 });
    }

    #[test]
    fn test_out_of_date_requests_rebuild_only_under_status_policy() {
        let mut polling = FrameDriver::new(RecreationPolicy::PollDrawableSize);
        let mut status = FrameDriver::new(RecreationPolicy::OutOfDateStatus);

        for driver in [&mut polling, &mut status] {
            let mut engine = FakeEngine {
                fail_acquire: Some(vk::Result::ERROR_OUT_OF_DATE_KHR),
                ..FakeEngine::default()
            };
            driver.tick(&mut engine, semaphores());
        }

        assert!(!polling.take_recreation_request());
        assert!(status.take_recreation_request());
        assert!(!status.take_recreation_request());
    }

    #[test]
    fn test_suboptimal_present_requests_rebuild() {
        let mut driver = FrameDriver::new(RecreationPolicy::OutOfDateStatus);
        let mut engine = FakeEngine {
            suboptimal: true,
            ..FakeEngine::default()
        };

        driver.tick(&mut engine, semaphores());

        assert_eq!(driver.state(), FrameState::Presented { image_index: 0 });
        assert!(driver.take_recreation_request());
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn built(lifecycle: &mut SwapchainLifecycle, size: vk::Extent2D) {
        lifecycle.begin_rebuild();
        lifecycle.finish_rebuild(Ok(size)).unwrap();
    }

    #[test]
    fn test_lifecycle_starts_invalid_and_skips_frames() {
        let mut lifecycle = SwapchainLifecycle::new(RecreationPolicy::PollDrawableSize);
        let mut engine = FakeEngine::default();

        lifecycle.render(&mut engine, semaphores());

        assert_eq!(lifecycle.state(), SwapchainState::Invalid);
        assert!(engine.calls.is_empty());
        assert!(lifecycle.needs_recreation(extent(800, 600)));
    }

    #[test]
    fn test_failed_rebuild_issues_no_acquire() {
        let mut lifecycle = SwapchainLifecycle::new(RecreationPolicy::PollDrawableSize);
        let mut engine = FakeEngine::default();
        built(&mut lifecycle, extent(800, 600));
        lifecycle.render(&mut engine, semaphores());
        assert_eq!(engine.calls, ["acquire", "submit", "present"]);

        lifecycle.begin_rebuild();
        let error = lifecycle
            .finish_rebuild(Err(VulkanError::native(vk::Result::ERROR_DEVICE_LOST)))
            .unwrap_err();
        assert_eq!(error.code(), Some(vk::Result::ERROR_DEVICE_LOST));

        engine.calls.clear();
        lifecycle.render(&mut engine, semaphores());
        assert!(engine.calls.is_empty());
        assert_eq!(lifecycle.state(), SwapchainState::Invalid);
        assert_eq!(lifecycle.driver().stats(), FrameStats { presented: 1, dropped: 0 });
        assert!(lifecycle.needs_recreation(extent(800, 600)));

        built(&mut lifecycle, extent(800, 600));
        lifecycle.render(&mut engine, semaphores());
        assert_eq!(engine.calls, ["acquire", "submit", "present"]);
    }

    #[test]
    fn test_zero_drawable_never_needs_recreation() {
        let mut lifecycle = SwapchainLifecycle::new(RecreationPolicy::PollDrawableSize);

        assert!(!lifecycle.needs_recreation(extent(0, 600)));
        assert!(!lifecycle.needs_recreation(extent(800, 0)));
        assert!(lifecycle.needs_recreation(extent(800, 600)));
    }

    #[test]
    fn test_polling_compares_requested_extent() {
        let mut lifecycle = SwapchainLifecycle::new(RecreationPolicy::PollDrawableSize);
        built(&mut lifecycle, extent(800, 600));

        assert!(!lifecycle.needs_recreation(extent(800, 600)));
        assert!(lifecycle.needs_recreation(extent(1024, 600)));
        assert_eq!(lifecycle.requested_extent(), extent(800, 600));
    }

    #[test]
    fn test_status_policy_rebuilds_only_when_flagged() {
        let mut lifecycle = SwapchainLifecycle::new(RecreationPolicy::OutOfDateStatus);
        built(&mut lifecycle, extent(800, 600));

        assert!(!lifecycle.needs_recreation(extent(1024, 768)));

        let mut engine = FakeEngine {
            fail_acquire: Some(vk::Result::ERROR_OUT_OF_DATE_KHR),
            ..FakeEngine::default()
        };
        lifecycle.render(&mut engine, semaphores());

        assert!(lifecycle.needs_recreation(extent(1024, 768)));
        assert!(!lifecycle.needs_recreation(extent(1024, 768)));
    }
}
