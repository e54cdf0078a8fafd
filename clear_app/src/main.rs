//! Clear demo application
//!
//! Opens a window and presents a cleared render target every frame, rebuilding
//! the swapchain whenever the window is resized. Reads `clear_app.toml` from
//! the working directory if present. Press Q or Escape to quit.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use glfw::{Action, Key, WindowEvent};
use gpu_context::foundation::logging;
use gpu_context::prelude::*;
use thiserror::Error;

const CONFIG_PATH: &str = "clear_app.toml";

/// Consecutive failed swapchain rebuilds before giving up
const MAX_REBUILD_FAILURES: u32 = 120;

/// Startup failures reported to the user
#[derive(Error, Debug)]
enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("window: {0}")]
    Window(#[from] WindowError),

    #[error("vulkan: {0}")]
    Vulkan(#[from] VulkanError),
}

/// Counts consecutive swapchain rebuild failures
#[derive(Debug, Default)]
struct RebuildRetry {
    failures: u32,
}

impl RebuildRetry {
    /// Absorb a failed rebuild until `MAX_REBUILD_FAILURES` in a row
    fn record(&mut self, outcome: Result<(), VulkanError>) -> Result<(), VulkanError> {
        match outcome {
            Ok(()) => {
                self.failures = 0;
                Ok(())
            }
            Err(error) => {
                self.failures += 1;
                if self.failures >= MAX_REBUILD_FAILURES {
                    log::error!("Swapchain rebuild failed {} times in a row", self.failures);
                    Err(error)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Field order matters: the context's surface must go before the window
struct ClearApp {
    context: RenderContext,
    window: Window,
    pacer: FramePacer,
}

impl ClearApp {
    fn new(config: &ContextConfig) -> Result<Self, AppError> {
        log::info!("Creating window...");
        let window = Window::new(&config.window.title, config.window.width, config.window.height)?;

        log::info!("Creating render context...");
        let mut context = RenderContext::new(config, &window)?;
        context.recreate_swapchain(&window)?;

        let pacer = FramePacer::new(
            Duration::from_millis(config.frame_interval_ms),
            Duration::from_millis(config.min_sleep_ms),
        );

        Ok(Self { context, window, pacer })
    }

    fn run(&mut self) -> Result<(), AppError> {
        log::info!("Starting clear demo...");
        let mut retry = RebuildRetry::default();

        while !self.window.should_close() {
            self.pacer.begin_frame();
            self.window.poll_events();

            // Collect events so the window can be mutated while handling them
            let events: Vec<_> = self.window.flush_events().collect();
            for (_, event) in events {
                match event {
                    WindowEvent::Key(Key::Q | Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                        self.window.set_should_close(true);
                    }
                    WindowEvent::FramebufferSize(width, height) => {
                        log::debug!("Framebuffer resized to {width}x{height}");
                    }
                    _ => {}
                }
            }

            if self.context.needs_recreation(&self.window) {
                // Failure leaves the swapchain invalid; the next frame retries
                retry.record(self.context.recreate_swapchain(&self.window))?;
            }

            self.context.render();
            self.pacer.end_frame();
        }

        let stats = self.context.frame_stats();
        log::info!(
            "Clear demo finished: {} frames presented, {} dropped",
            stats.presented,
            stats.dropped
        );
        Ok(())
    }
}

fn load_config() -> Result<ContextConfig, ConfigError> {
    let config = if Path::new(CONFIG_PATH).exists() {
        log::info!("Loading {CONFIG_PATH}");
        ContextConfig::load_from_file(CONFIG_PATH)?
    } else {
        ContextConfig::default()
    };

    config.validate()?;
    Ok(config)
}

fn run() -> Result<(), AppError> {
    let config = load_config()?;
    let mut app = ClearApp::new(&config)?;
    app.run()
}

fn main() -> ExitCode {
    logging::init_with_level(log::LevelFilter::Info);

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("PANIC occurred: {panic_info}");
    }));

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> VulkanError {
        VulkanError::validation("drawable size 0x0 must be non-zero")
    }

    #[test]
    fn test_retry_gives_up_after_consecutive_failures() {
        let mut retry = RebuildRetry::default();

        for _ in 1..MAX_REBUILD_FAILURES {
            assert!(retry.record(Err(failure())).is_ok());
        }
        assert!(retry.record(Err(failure())).is_err());
    }

    #[test]
    fn test_success_resets_the_count() {
        let mut retry = RebuildRetry::default();

        for _ in 1..MAX_REBUILD_FAILURES {
            retry.record(Err(failure())).unwrap();
        }
        retry.record(Ok(())).unwrap();

        assert!(retry.record(Err(failure())).is_ok());
        assert_eq!(retry.failures, 1);
    }
}
