//! Reelcap platform core contracts.
//!
//! This crate contains the capture data structures shared by the capture,
//! render, and CLI crates without coupling them to a concrete OS backend:
//! capture regions, monitor descriptors, captured frames, and the traits
//! used to enumerate monitors and sample the pointer.

use std::fmt;
use std::time::Instant;

use image::RgbaImage;
use reelcap_common::config::AppConfig;
use reelcap_common::error::{ReelcapError, ReelcapResult};
use serde::{Deserialize, Serialize};

/// Size used when no monitor information is available, and the upper bound
/// for the default (primary display) capture target.
pub const DEFAULT_CAPTURE_WIDTH: u32 = 1920;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 1080;

/// Both sides of a dragged selection must exceed this many pixels.
pub const MIN_SELECTION_SIZE: u32 = 10;

/// A rectangle in display coordinates. Width and height are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRegion {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl CaptureRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> ReelcapResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelcapError::config(format!(
                "Capture region must have a non-zero size, got {width}x{height} at ({x},{y})"
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Build a region from the two corners of a selection drag.
    ///
    /// Returns `None` unless both sides are larger than [`MIN_SELECTION_SIZE`].
    pub fn from_drag(start: (i32, i32), end: (i32, i32)) -> Option<Self> {
        let left = start.0.min(end.0);
        let top = start.1.min(end.1);
        let width = start.0.abs_diff(end.0);
        let height = start.1.abs_diff(end.1);
        if width > MIN_SELECTION_SIZE && height > MIN_SELECTION_SIZE {
            Some(Self {
                x: left,
                y: top,
                width,
                height,
            })
        } else {
            None
        }
    }

    /// 1920×1080 at the origin.
    pub const fn default_capture() -> Self {
        Self {
            x: 0,
            y: 0,
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
        }
    }

    /// Same size clamped to the default capture size, moved to the origin.
    pub fn clamped_at_origin(&self) -> Self {
        Self {
            x: 0,
            y: 0,
            width: self.width.min(DEFAULT_CAPTURE_WIDTH),
            height: self.height.min(DEFAULT_CAPTURE_HEIGHT),
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(x, y, width, height)`, the layout used by the config record.
    pub fn as_tuple(&self) -> (i32, i32, u32, u32) {
        (self.x, self.y, self.width, self.height)
    }

    /// Translate a global point into region-relative coordinates.
    ///
    /// Returns `None` when the point falls outside `[0, width) × [0, height)`.
    pub fn to_relative(&self, global_x: i32, global_y: i32) -> Option<(u32, u32)> {
        let rel_x = i64::from(global_x) - i64::from(self.x);
        let rel_y = i64::from(global_y) - i64::from(self.y);
        if (0..i64::from(self.width)).contains(&rel_x) && (0..i64::from(self.height)).contains(&rel_y)
        {
            Some((rel_x as u32, rel_y as u32))
        } else {
            None
        }
    }
}

impl fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} at ({},{})", self.width, self.height, self.x, self.y)
    }
}

/// A connected monitor as reported by one enumeration call.
///
/// `index` is only meaningful within the enumeration that produced it.
/// Sizes are signed because backends occasionally report bogus geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorDescriptor {
    /// Zero-based position in the enumeration.
    pub index: usize,
    /// Monitor name/identifier.
    pub name: String,
    /// Position in the virtual desktop (pixels).
    pub left: i32,
    pub top: i32,
    /// Resolution in physical pixels.
    pub width: i32,
    pub height: i32,
    /// Whether this monitor is primary.
    pub primary: bool,
}

impl MonitorDescriptor {
    /// The monitor's rectangle, or `None` if its reported size is non-positive.
    pub fn region(&self) -> Option<CaptureRegion> {
        if self.width <= 0 || self.height <= 0 {
            return None;
        }
        CaptureRegion::new(self.left, self.top, self.width as u32, self.height as u32).ok()
    }
}

/// Source of the current monitor topology.
pub trait MonitorEnumerator: Send + Sync {
    /// Enumerate monitors, freshly, in a stable order for this call.
    fn monitors(&self) -> ReelcapResult<Vec<MonitorDescriptor>>;
}

impl MonitorEnumerator for Vec<MonitorDescriptor> {
    fn monitors(&self) -> ReelcapResult<Vec<MonitorDescriptor>> {
        Ok(self.clone())
    }
}

/// What the user asked to capture, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSelection {
    /// An explicit rectangle from a selection drag.
    Explicit(CaptureRegion),
    /// A monitor index from the last enumeration the user saw.
    Monitor(usize),
    /// The primary display, clamped to 1920×1080.
    Default,
}

impl RegionSelection {
    /// Snapshot the selection from the config record.
    ///
    /// An explicit region wins over a monitor index if both are present.
    pub fn from_config(config: &AppConfig) -> ReelcapResult<Self> {
        if let Some((x, y, width, height)) = config.record_region {
            Ok(Self::Explicit(CaptureRegion::new(x, y, width, height)?))
        } else if let Some(index) = config.selected_monitor {
            Ok(Self::Monitor(index))
        } else {
            Ok(Self::Default)
        }
    }

    /// Short human-readable label for status messages.
    pub fn label(&self) -> String {
        match self {
            Self::Explicit(_) => "Region".to_string(),
            Self::Monitor(index) => format!("Screen {}", index + 1),
            Self::Default => "Primary Screen".to_string(),
        }
    }
}

/// One captured RGBA frame.
///
/// Owned by the loop iteration that captured it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    /// Wrap a tightly packed RGBA buffer, rejecting empty or mis-sized data.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> ReelcapResult<Self> {
        if width == 0 || height == 0 || data.is_empty() {
            return Err(ReelcapError::capture(format!(
                "Empty frame ({width}x{height}, {} bytes)",
                data.len()
            )));
        }
        let len = data.len();
        let image = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
            ReelcapError::capture(format!(
                "Frame buffer of {len} bytes does not match {width}x{height} RGBA"
            ))
        })?;
        Ok(Self::new(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Source of the global pointer position.
pub trait PointerSource: Send + Sync {
    /// Current pointer position in display coordinates.
    fn position(&self) -> ReelcapResult<(i32, i32)>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Scale `(width, height)` down to fit inside `(max_width, max_height)`,
/// preserving aspect ratio. Sizes that already fit are returned unchanged.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale_x = max_width as f64 / width as f64;
    let scale_y = max_height as f64 / height as f64;
    if scale_x <= scale_y {
        let scaled = (height as f64 * scale_x) as u32;
        (max_width, scaled.max(1))
    } else {
        let scaled = (width as f64 * scale_y) as u32;
        (scaled.max(1), max_height)
    }
}
