//! Reelcap Capture Engine
//!
//! Turns a capture selection into frames and frames into a recording.
//! The recording controller runs one session at a time on a dedicated
//! worker; the preview loop is a display-only sibling that yields to it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 RecordingController                  │
//! │  resolve_region → FrameSource → CursorCompositor     │
//! │                         │              │             │
//! │                         ▼              ▼             │
//! │                  FramePacer ──► VideoEncoder         │
//! │                                        │             │
//! │                                        ▼             │
//! │                                  PostProcessor       │
//! └──────────────────────────────────────────────────────┘
//!            ▲ RecordingActivity
//! ┌──────────┴──────────┐
//! │     PreviewLoop     │  FrameSource → fit 400×300 → display
//! └─────────────────────┘
//! ```

pub mod backend;
pub mod pointer;
pub mod preview;
pub mod region;
pub mod session;

pub use backend::{probe_backend, FrameSource, FrameSourceFactory, SourceBackend, XcapMonitors};
pub use pointer::XdotoolPointer;
pub use preview::{PreviewEvent, PreviewLoop, PreviewStart};
pub use region::resolve_region;
pub use session::*;
