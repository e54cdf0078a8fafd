//! Foundation module - utilities shared by the library and its hosts
//!
//! - Logging setup
//! - Frame pacing

pub mod logging;
pub mod time;
