//! Frame sources: interchangeable screen capture backends.
//!
//! The rest of the pipeline only sees [`FrameSource`]. Backends are picked
//! at startup by [`probe_backend`] or forced by the user.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reelcap_common::error::{ReelcapError, ReelcapResult};
use reelcap_platform_core::{CaptureRegion, Frame};

pub mod gst;
pub mod screenshot;

pub use self::gst::{GstFrameSource, GstSourceFactory};
pub use self::screenshot::{ScreenshotFrameSource, ScreenshotSourceFactory, XcapMonitors};

/// A capture handle bound to one region.
///
/// Owned by the worker that opened it; never shared between the preview
/// and recording loops.
pub trait FrameSource {
    /// Grab the current contents of the region.
    ///
    /// Empty or zero-sized results fail with [`ReelcapError::Capture`],
    /// which callers treat as a skipped tick.
    fn capture(&mut self) -> ReelcapResult<Frame>;

    fn region(&self) -> CaptureRegion;

    fn name(&self) -> &str;
}

/// Opens frame sources for a region.
pub trait FrameSourceFactory: Send + Sync {
    fn open(&self, region: CaptureRegion) -> ReelcapResult<Box<dyn FrameSource>>;

    /// Whether this backend can run on the current system.
    fn is_available(&self) -> bool;

    fn name(&self) -> &str;
}

/// Available capture backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBackend {
    /// Continuous GStreamer capture from the display server.
    Compositor,
    /// One screenshot per frame through xcap.
    Screenshot,
}

impl SourceBackend {
    pub fn factory(self) -> Arc<dyn FrameSourceFactory> {
        match self {
            Self::Compositor => Arc::new(GstSourceFactory),
            Self::Screenshot => Arc::new(ScreenshotSourceFactory),
        }
    }
}

impl fmt::Display for SourceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compositor => "compositor",
            Self::Screenshot => "screenshot",
        })
    }
}

impl FromStr for SourceBackend {
    type Err = ReelcapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compositor" | "gst" | "gstreamer" => Ok(Self::Compositor),
            "screenshot" | "xcap" => Ok(Self::Screenshot),
            other => Err(ReelcapError::config(format!(
                "unknown capture backend {other:?} (expected compositor or screenshot)"
            ))),
        }
    }
}

/// Pick the best available capture backend.
///
/// Prefers continuous compositor capture, then screenshots.
pub fn probe_backend() -> ReelcapResult<SourceBackend> {
    select_backend(&[
        (SourceBackend::Compositor, &GstSourceFactory as &dyn FrameSourceFactory),
        (SourceBackend::Screenshot, &ScreenshotSourceFactory),
    ])
}

/// Resolve a forced backend name, or probe when none is given.
pub fn backend_from_name(name: Option<&str>) -> ReelcapResult<SourceBackend> {
    match name {
        Some(name) => name.parse(),
        None => probe_backend(),
    }
}

fn select_backend(candidates: &[(SourceBackend, &dyn FrameSourceFactory)]) -> ReelcapResult<SourceBackend> {
    for (backend, factory) in candidates {
        if factory.is_available() {
            tracing::info!(backend = %backend, "Selected capture backend");
            return Ok(*backend);
        }
        tracing::debug!(backend = %backend, "Capture backend unavailable");
    }
    Err(ReelcapError::unsupported(
        "no screen capture backend is available (need an X11 display with GStreamer ximagesrc, or xcap support)",
    ))
}
