//! Reelcap Render Engine
//!
//! Everything that happens to a frame after it leaves the capture source,
//! and to the file after the last frame is written.
//!
//! # Pipeline Architecture
//!
//! ```text
//! captured frame ──┐
//!                  ├── Cursor Overlay (optional)
//! pointer ─────────┘         │
//!                            ▼
//!                     Encode (H.264/MP4)
//!                            │
//!                            ▼
//!              screen_record_<timestamp>.mp4
//!                            │
//!                            ▼
//!        Transcode (baseline H.264 + silent AAC)
//!                            │
//!                            ▼
//!          screen_record_<timestamp>_twitter.mp4
//! ```

pub mod artifacts;
pub mod compositor;
pub mod encoder;
pub mod finalize;
pub mod gst_support;

pub use artifacts::*;
pub use compositor::{draw_cursor_glyph, CursorCompositor};
pub use encoder::*;
pub use finalize::*;
