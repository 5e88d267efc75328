//! Reelcap Common Utilities
//!
//! Shared infrastructure for all Reelcap crates:
//! - Error types and result aliases
//! - Recording clock, frame pacing, and duration parsing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
