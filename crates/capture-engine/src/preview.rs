//! Live preview: a display-only capture loop.
//!
//! Runs on its own worker at a fixed 30 Hz, scales each frame to fit the
//! preview box, and hands it to the display surface over a channel. It
//! never runs while a recording session exists.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::imageops::{self, FilterType};
use image::RgbaImage;
use parking_lot::Mutex;
use reelcap_common::error::{ReelcapError, ReelcapResult};
use reelcap_platform_core::{fit_within, CaptureRegion, Frame};
use tokio::sync::mpsc::UnboundedSender;

use crate::backend::{FrameSource, FrameSourceFactory};
use crate::session::{CancelToken, RecordingActivity};

pub const PREVIEW_MAX_WIDTH: u32 = 400;
pub const PREVIEW_MAX_HEIGHT: u32 = 300;
pub const PREVIEW_FPS: u32 = 30;

/// Pause after a failed tick before trying again.
pub const PREVIEW_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Messages for the preview display surface.
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    Started {
        region: CaptureRegion,
        display_size: (u32, u32),
    },
    /// A frame already scaled to fit the preview box.
    Frame(RgbaImage),
    /// Transient status text, e.g. a capture error.
    Status(String),
    Stopped,
}

/// What a `start` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStart {
    Started,
    /// The preview was already running and has been stopped.
    Stopped,
    /// A recording session is active; nothing changed.
    RecordingConflict,
}

struct PreviewWorker {
    stop: CancelToken,
    handle: JoinHandle<()>,
}

impl PreviewWorker {
    fn is_running(&self) -> bool {
        !self.stop.is_cancelled() && !self.handle.is_finished()
    }
}

#[derive(Default)]
struct Workers {
    current: Option<PreviewWorker>,
    /// Stopped workers that may still be inside a capture call.
    retired: Vec<JoinHandle<()>>,
}

impl Workers {
    /// Signal the current worker to stop without waiting for it.
    fn retire_current(&mut self) -> bool {
        match self.current.take() {
            Some(worker) => {
                let was_running = worker.is_running();
                worker.stop.cancel();
                self.retired.push(worker.handle);
                was_running
            }
            None => false,
        }
    }

    /// Join the retired workers that have already exited.
    fn reap(&mut self) {
        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retired)
            .into_iter()
            .partition(|handle| handle.is_finished());
        self.retired = pending;
        for handle in done {
            if handle.join().is_err() {
                tracing::error!("Preview thread panicked");
            }
        }
    }
}

/// Scaled live view of a region.
///
/// `start` and `stop` only signal the worker; they never wait for an
/// in-flight capture to return.
pub struct PreviewLoop {
    sources: Arc<dyn FrameSourceFactory>,
    activity: RecordingActivity,
    events: UnboundedSender<PreviewEvent>,
    workers: Mutex<Workers>,
}

impl PreviewLoop {
    pub fn new(
        sources: Arc<dyn FrameSourceFactory>,
        activity: RecordingActivity,
        events: UnboundedSender<PreviewEvent>,
    ) -> Self {
        Self {
            sources,
            activity,
            events,
            workers: Mutex::new(Workers::default()),
        }
    }

    /// Start previewing `region`, or stop the preview if it is running.
    pub fn start(&self, region: CaptureRegion) -> ReelcapResult<PreviewStart> {
        if self.activity.is_active() {
            tracing::info!("Preview refused while recording");
            if self
                .events
                .send(PreviewEvent::Status("Cannot preview while recording".to_string()))
                .is_err()
            {
                tracing::trace!("Preview event receiver dropped");
            }
            return Ok(PreviewStart::RecordingConflict);
        }

        let mut workers = self.workers.lock();
        workers.reap();
        if workers.retire_current() {
            tracing::info!("Preview stopped");
            return Ok(PreviewStart::Stopped);
        }

        let stop = CancelToken::default();
        let context = PreviewContext {
            sources: Arc::clone(&self.sources),
            activity: self.activity.clone(),
            events: self.events.clone(),
            stop: stop.clone(),
            region,
        };
        let handle = std::thread::Builder::new()
            .name("reelcap-preview".to_string())
            .spawn(move || context.run())
            .map_err(|e| ReelcapError::platform(format!("Failed to spawn preview thread: {e}")))?;

        tracing::info!(%region, "Preview started");
        workers.current = Some(PreviewWorker { stop, handle });
        Ok(PreviewStart::Started)
    }

    /// Stop the preview. Returns `true` if it was running.
    pub fn stop(&self) -> bool {
        let mut workers = self.workers.lock();
        workers.reap();
        workers.retire_current()
    }

    pub fn is_running(&self) -> bool {
        self.workers
            .lock()
            .current
            .as_ref()
            .map_or(false, PreviewWorker::is_running)
    }
}

impl Drop for PreviewLoop {
    fn drop(&mut self) {
        // Workers still inside a capture call are detached; they exit on
        // their next stop check.
        let workers = self.workers.get_mut();
        workers.retire_current();
        workers.reap();
    }
}

struct PreviewContext {
    sources: Arc<dyn FrameSourceFactory>,
    activity: RecordingActivity,
    events: UnboundedSender<PreviewEvent>,
    stop: CancelToken,
    region: CaptureRegion,
}

impl PreviewContext {
    fn emit(&self, event: PreviewEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Preview event receiver dropped");
        }
    }

    fn run(self) {
        let display_size = fit_within(
            self.region.width(),
            self.region.height(),
            PREVIEW_MAX_WIDTH,
            PREVIEW_MAX_HEIGHT,
        );
        self.emit(PreviewEvent::Started {
            region: self.region,
            display_size,
        });

        let interval = Duration::from_nanos(1_000_000_000 / u64::from(PREVIEW_FPS));
        let mut source: Option<Box<dyn FrameSource>> = None;

        loop {
            if self.stop.is_cancelled() {
                break;
            }
            if self.activity.is_active() {
                self.emit(PreviewEvent::Status(
                    "Preview stopped: recording started".to_string(),
                ));
                break;
            }

            let tick_start = Instant::now();
            let result = self.tick(&mut source);
            if self.stop.is_cancelled() {
                break;
            }
            match result {
                Ok(image) => self.emit(PreviewEvent::Frame(image)),
                Err(e) => {
                    tracing::debug!(error = %e, "Preview tick failed");
                    self.emit(PreviewEvent::Status(format!("Preview error: {e}")));
                    std::thread::sleep(PREVIEW_ERROR_BACKOFF);
                    continue;
                }
            }

            let spent = tick_start.elapsed();
            if spent < interval {
                std::thread::sleep(interval - spent);
            }
        }

        self.emit(PreviewEvent::Stopped);
    }

    fn tick(&self, source: &mut Option<Box<dyn FrameSource>>) -> ReelcapResult<RgbaImage> {
        let mut active = match source.take() {
            Some(active) => active,
            None => self.sources.open(self.region)?,
        };
        let captured = active.capture();
        *source = Some(active);
        Ok(scale_for_preview(captured?))
    }
}

fn scale_for_preview(frame: Frame) -> RgbaImage {
    let (width, height) = fit_within(
        frame.width(),
        frame.height(),
        PREVIEW_MAX_WIDTH,
        PREVIEW_MAX_HEIGHT,
    );
    if (width, height) == (frame.width(), frame.height()) {
        frame.image
    } else {
        imageops::resize(&frame.image, width, height, FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_frames_are_scaled_into_the_box() {
        let frame = Frame::new(RgbaImage::new(1920, 1080));
        let scaled = scale_for_preview(frame);
        assert_eq!(scaled.dimensions(), (400, 225));
    }

    #[test]
    fn small_frames_are_passed_through() {
        let frame = Frame::new(RgbaImage::new(320, 200));
        assert_eq!(scale_for_preview(frame).dimensions(), (320, 200));
    }
}
