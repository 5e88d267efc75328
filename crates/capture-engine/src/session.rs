//! Recording session management.
//!
//! [`RecordingController`] owns the `Idle → Capturing → Finalizing → Idle`
//! state machine. Each session runs on its own worker thread; the caller
//! gets progress through [`RecordingEvent`]s and never blocks on capture or
//! encode.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use reelcap_common::clock::{parse_recording_duration, FramePacer, RecordingClock};
use reelcap_common::config::AppConfig;
use reelcap_common::error::{ReelcapError, ReelcapResult};
use reelcap_platform_core::{CaptureRegion, MonitorEnumerator, PointerSource, RegionSelection};
use reelcap_render_engine::{
    delete_previous_artifacts, raw_output_path, CursorCompositor, EncoderFactory, EncoderGuard,
    GstEncoderFactory, OutputArtifact, Passthrough, PostProcessor, Transcoder,
};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::backend::{backend_from_name, FrameSource, FrameSourceFactory, XcapMonitors};
use crate::pointer::XdotoolPointer;
use crate::region::resolve_region;

/// Lifecycle state of the recording controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum SessionStatus {
    /// No session; `start` is accepted.
    Idle = 0,
    /// Frames are being captured and encoded.
    Capturing = 1,
    /// The output file is being closed and post-processed.
    Finalizing = 2,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Capturing,
            2 => Self::Finalizing,
            _ => Self::Idle,
        }
    }
}

/// Cooperative cancellation flag, checked once per capture tick.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read-only view of whether a recording session exists.
#[derive(Debug, Clone)]
pub struct RecordingActivity(Arc<AtomicU8>);

impl RecordingActivity {
    /// A view that never reports activity.
    pub fn idle() -> Self {
        Self(Arc::new(AtomicU8::new(SessionStatus::Idle as u8)))
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.status() != SessionStatus::Idle
    }
}

/// Configuration snapshot taken when a session starts.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub selection: RegionSelection,
    pub show_cursor: bool,
    pub replace_mode: bool,
    pub save_dir: PathBuf,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> ReelcapResult<Self> {
        Ok(Self {
            selection: RegionSelection::from_config(config)?,
            show_cursor: config.show_cursor,
            replace_mode: config.replace_mode,
            save_dir: config.save_path.clone(),
        })
    }
}

/// Parameters of one `start` call.
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// Requested duration as entered, e.g. `"90"` or `"1.5"`.
    pub duration_value: String,
    /// `seconds`, `minutes` or `hours`.
    pub duration_unit: String,
    pub fps: u32,
    pub settings: SessionSettings,
}

/// Result of a `start` call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { region: CaptureRegion },
    /// Another session is running; nothing changed.
    AlreadyActive(SessionStatus),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Cancelled,
    Failed { message: String },
}

/// Final report for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub region: CaptureRegion,
    /// Wall-clock start of capture; `None` when the session failed earlier.
    pub started_at: Option<DateTime<Local>>,
    /// `None` when the session failed before an output file was opened.
    pub artifact: Option<OutputArtifact>,
    pub frames_written: u64,
    pub capture_failures: u64,
    pub schedule_resets: u64,
    pub elapsed_secs: f64,
}

impl SessionReport {
    fn failed(region: CaptureRegion, message: String) -> Self {
        Self {
            outcome: SessionOutcome::Failed { message },
            region,
            started_at: None,
            artifact: None,
            frames_written: 0,
            capture_failures: 0,
            schedule_resets: 0,
            elapsed_secs: 0.0,
        }
    }
}

/// Progress notifications delivered to the control surface.
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    PreviousArtifactsRemoved {
        count: usize,
    },
    Capturing {
        target: String,
        region: CaptureRegion,
        raw_path: PathBuf,
        backend: String,
    },
    Finalizing {
        frames_written: u64,
    },
    Finished(SessionReport),
}

/// The collaborators a session is built from.
#[derive(Clone)]
pub struct PipelineParts {
    pub sources: Arc<dyn FrameSourceFactory>,
    pub pointer: Arc<dyn PointerSource>,
    pub encoders: Arc<dyn EncoderFactory>,
    pub post: Arc<dyn PostProcessor>,
    pub monitors: Arc<dyn MonitorEnumerator>,
}

impl PipelineParts {
    /// Production parts. `backend` forces a capture backend by name.
    pub fn detect(backend: Option<&str>) -> ReelcapResult<Self> {
        let backend = backend_from_name(backend)?;
        let transcoder = Transcoder::default();
        let post: Arc<dyn PostProcessor> = if transcoder.is_available() {
            Arc::new(transcoder)
        } else {
            tracing::warn!("ffmpeg/ffprobe not found; recordings will not be converted");
            Arc::new(Passthrough)
        };
        Ok(Self {
            sources: backend.factory(),
            pointer: Arc::new(XdotoolPointer::default()),
            encoders: Arc::new(GstEncoderFactory),
            post,
            monitors: Arc::new(XcapMonitors),
        })
    }
}

struct Inner {
    status: Arc<AtomicU8>,
    cancel: Mutex<Option<CancelToken>>,
    last_artifact: Mutex<Option<OutputArtifact>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    parts: PipelineParts,
    events: UnboundedSender<RecordingEvent>,
}

impl Inner {
    fn emit(&self, event: RecordingEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Recording event receiver dropped");
        }
    }
}

/// Handle to the single recording state machine.
#[derive(Clone)]
pub struct RecordingController {
    inner: Arc<Inner>,
}

impl RecordingController {
    pub fn new(parts: PipelineParts, events: UnboundedSender<RecordingEvent>) -> Self {
        Self {
            inner: Arc::new(Inner {
                status: Arc::new(AtomicU8::new(SessionStatus::Idle as u8)),
                cancel: Mutex::new(None),
                last_artifact: Mutex::new(None),
                worker: Mutex::new(None),
                parts,
                events,
            }),
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.inner.status.load(Ordering::SeqCst))
    }

    /// Shared view used by the preview loop to stay out of the way.
    pub fn activity(&self) -> RecordingActivity {
        RecordingActivity(Arc::clone(&self.inner.status))
    }

    /// Artifact of the most recently finished session.
    pub fn last_artifact(&self) -> Option<OutputArtifact> {
        self.inner.last_artifact.lock().clone()
    }

    /// Start a session.
    ///
    /// A no-op while another session is capturing or finalizing. Invalid
    /// durations and unresolvable regions are returned as errors and leave
    /// the controller idle.
    pub fn start(&self, request: StartRequest) -> ReelcapResult<StartOutcome> {
        let current = self.status();
        if current != SessionStatus::Idle {
            tracing::info!(status = ?current, "Recording already in progress; start ignored");
            return Ok(StartOutcome::AlreadyActive(current));
        }

        let duration = parse_recording_duration(&request.duration_value, &request.duration_unit)?;
        let region = resolve_region(&request.settings.selection, self.inner.parts.monitors.as_ref())?;

        if self
            .inner
            .status
            .compare_exchange(
                SessionStatus::Idle as u8,
                SessionStatus::Capturing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Ok(StartOutcome::AlreadyActive(self.status()));
        }

        // The previous worker has already released the controller.
        if let Some(previous) = self.inner.worker.lock().take() {
            if previous.join().is_err() {
                tracing::error!("Previous recorder thread panicked");
            }
        }

        let cancel = CancelToken::default();
        *self.inner.cancel.lock() = Some(cancel.clone());

        let job = SessionJob {
            target: request.settings.selection.label(),
            region,
            duration,
            fps: request.fps.max(1),
            settings: request.settings,
            cancel,
        };

        tracing::info!(
            capture_target = %job.target,
            %region,
            fps = job.fps,
            duration_secs = duration.as_secs_f64(),
            replace_mode = job.settings.replace_mode,
            show_cursor = job.settings.show_cursor,
            "Starting recording session"
        );

        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("reelcap-recorder".to_string())
            .spawn(move || run_session(inner, job));

        match spawned {
            Ok(handle) => {
                *self.inner.worker.lock() = Some(handle);
                Ok(StartOutcome::Started { region })
            }
            Err(e) => {
                *self.inner.cancel.lock() = None;
                self.inner
                    .status
                    .store(SessionStatus::Idle as u8, Ordering::SeqCst);
                Err(ReelcapError::platform(format!(
                    "Failed to spawn recorder thread: {e}"
                )))
            }
        }
    }

    /// Request cancellation of the capturing session.
    ///
    /// Returns `false` when nothing is capturing; finalizing sessions
    /// cannot be cancelled.
    pub fn cancel(&self) -> bool {
        if self.status() != SessionStatus::Capturing {
            return false;
        }
        match self.inner.cancel.lock().as_ref() {
            Some(token) => {
                tracing::info!("Recording cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Block until the current worker (if any) exits.
    pub fn wait(&self) {
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Recorder thread panicked");
            }
        }
    }
}

struct SessionJob {
    target: String,
    region: CaptureRegion,
    duration: Duration,
    fps: u32,
    settings: SessionSettings,
    cancel: CancelToken,
}

/// Returns the controller to `Idle` on every exit path, including unwinding.
struct IdleGuard {
    inner: Arc<Inner>,
    released: bool,
}

impl IdleGuard {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            *self.inner.cancel.lock() = None;
            self.inner
                .status
                .store(SessionStatus::Idle as u8, Ordering::SeqCst);
        }
    }
}

impl Drop for IdleGuard {
    fn drop(&mut self) {
        self.release();
    }
}

fn run_session(inner: Arc<Inner>, job: SessionJob) {
    let mut idle = IdleGuard {
        inner: Arc::clone(&inner),
        released: false,
    };

    let report = panic::catch_unwind(AssertUnwindSafe(|| record(&inner, &job)))
        .unwrap_or_else(|payload| {
            let message = match payload.downcast_ref::<&str>() {
                Some(msg) => (*msg).to_string(),
                None => payload
                    .downcast_ref::<String>()
                    .cloned()
                    .unwrap_or_else(|| "unknown panic".to_string()),
            };
            SessionReport::failed(job.region, format!("Recorder panicked: {message}"))
        });
    match &report.outcome {
        SessionOutcome::Failed { message } => {
            tracing::error!(error = %message, frames = report.frames_written, "Recording failed");
        }
        outcome => {
            tracing::info!(
                ?outcome,
                frames = report.frames_written,
                capture_failures = report.capture_failures,
                schedule_resets = report.schedule_resets,
                elapsed_secs = report.elapsed_secs,
                "Recording finished"
            );
        }
    }

    idle.release();
    inner.emit(RecordingEvent::Finished(report));
}

enum LoopExit {
    Completed,
    Cancelled,
    EncodeFailed(ReelcapError),
}

struct LoopStats {
    capture_failures: u64,
    schedule_resets: u64,
    elapsed: Duration,
}

fn record(inner: &Inner, job: &SessionJob) -> SessionReport {
    let parts = &inner.parts;
    let failed = |message: String| SessionReport::failed(job.region, message);

    if job.settings.replace_mode {
        let count = delete_previous_artifacts(&job.settings.save_dir);
        inner.emit(RecordingEvent::PreviousArtifactsRemoved { count });
    }

    if let Err(e) = std::fs::create_dir_all(&job.settings.save_dir) {
        return failed(format!(
            "Cannot create output folder {}: {e}",
            job.settings.save_dir.display()
        ));
    }

    let mut source = match parts.sources.open(job.region) {
        Ok(source) => source,
        Err(e) => return failed(format!("Failed to open {} capture: {e}", parts.sources.name())),
    };

    let clock = RecordingClock::start();
    let raw_path = raw_output_path(&job.settings.save_dir, clock.started_at());
    let mut encoder = match parts.encoders.open(
        &raw_path,
        job.fps,
        job.region.width(),
        job.region.height(),
    ) {
        Ok(encoder) => EncoderGuard::new(encoder),
        Err(e) => return failed(format!("Failed to open {}: {e}", raw_path.display())),
    };

    inner.emit(RecordingEvent::Capturing {
        target: job.target.clone(),
        region: job.region,
        raw_path: raw_path.clone(),
        backend: source.name().to_string(),
    });

    let mut compositor = CursorCompositor::new(Arc::clone(&parts.pointer), job.settings.show_cursor);
    let (exit, stats) = capture_loop(job, &clock, source.as_mut(), &mut compositor, &mut encoder);
    drop(source);

    inner
        .status
        .store(SessionStatus::Finalizing as u8, Ordering::SeqCst);
    let frames_written = encoder.frames_written();
    inner.emit(RecordingEvent::Finalizing { frames_written });

    let mut outcome = match exit {
        LoopExit::Completed => SessionOutcome::Completed,
        LoopExit::Cancelled => SessionOutcome::Cancelled,
        LoopExit::EncodeFailed(e) => SessionOutcome::Failed {
            message: e.to_string(),
        },
    };

    if let Some(Err(e)) = encoder.close() {
        tracing::warn!(error = %e, path = %raw_path.display(), "Encoder did not close cleanly");
        if !matches!(outcome, SessionOutcome::Failed { .. }) {
            outcome = SessionOutcome::Failed {
                message: e.to_string(),
            };
        }
    }

    let artifact = parts.post.finalize(&raw_path);
    *inner.last_artifact.lock() = Some(artifact.clone());

    SessionReport {
        outcome,
        region: job.region,
        started_at: Some(clock.started_at()),
        artifact: Some(artifact),
        frames_written,
        capture_failures: stats.capture_failures,
        schedule_resets: stats.schedule_resets,
        elapsed_secs: stats.elapsed.as_secs_f64(),
    }
}

fn capture_loop(
    job: &SessionJob,
    clock: &RecordingClock,
    source: &mut dyn FrameSource,
    compositor: &mut CursorCompositor,
    encoder: &mut EncoderGuard,
) -> (LoopExit, LoopStats) {
    let mut pacer = FramePacer::new(job.fps);
    let mut capture_failures = 0u64;

    let exit = loop {
        if job.cancel.is_cancelled() {
            break LoopExit::Cancelled;
        }
        let now = clock.elapsed();
        if now >= job.duration {
            break LoopExit::Completed;
        }

        if pacer.is_due(now) {
            match source.capture() {
                Ok(mut frame) => {
                    compositor.overlay(&mut frame, &job.region);
                    if let Err(e) = encoder.write(&frame) {
                        break LoopExit::EncodeFailed(e);
                    }
                }
                Err(e) => {
                    capture_failures += 1;
                    if e.is_transient() {
                        tracing::debug!(error = %e, "Frame skipped");
                    } else {
                        tracing::warn!(error = %e, "Frame skipped");
                    }
                }
            }
            if pacer.advance(clock.elapsed()) {
                tracing::trace!(next_frame = ?pacer.next_frame(), "Capture fell behind; ticks dropped");
            }
        }

        let now = clock.elapsed();
        let wait = pacer
            .wait_time(now)
            .min(job.duration.saturating_sub(now))
            .min(pacer.interval());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    };

    let stats = LoopStats {
        capture_failures,
        schedule_resets: pacer.skipped_resets(),
        elapsed: clock.elapsed(),
    };
    (exit, stats)
}
