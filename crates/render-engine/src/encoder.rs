//! Frame sink: H.264/MP4 encoding of captured frames.
//!
//! The capture loop owns exactly one encoder per session, wrapped in an
//! [`EncoderGuard`] so the output file is closed on every exit path.

use std::path::{Path, PathBuf};

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::imageops::{self, FilterType};
use reelcap_common::error::{ReelcapError, ReelcapResult};
use reelcap_platform_core::Frame;

use crate::gst_support::{
    elements_available, escape_path, launch_pipeline, pending_bus_error, start_pipeline,
    wait_for_eos, EOS_DRAIN_TIMEOUT,
};

/// Summary of a closed output file.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeStats {
    pub path: PathBuf,
    pub frames_written: u64,
    pub width: u32,
    pub height: u32,
}

/// A stream of frames being written to one video file.
pub trait VideoEncoder {
    /// Append one frame. Frames of a different size are rescaled.
    fn write(&mut self, frame: &Frame) -> ReelcapResult<()>;

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;

    /// Flush and close the file.
    fn finish(self: Box<Self>) -> ReelcapResult<EncodeStats>;
}

/// Opens encoders for new sessions.
pub trait EncoderFactory: Send + Sync {
    fn open(
        &self,
        path: &Path,
        fps: u32,
        width: u32,
        height: u32,
    ) -> ReelcapResult<Box<dyn VideoEncoder>>;

    fn name(&self) -> &str;
}

/// Closes the wrapped encoder exactly once: explicitly via [`close`](Self::close)
/// or on drop.
pub struct EncoderGuard {
    inner: Option<Box<dyn VideoEncoder>>,
}

impl EncoderGuard {
    pub fn new(encoder: Box<dyn VideoEncoder>) -> Self {
        Self {
            inner: Some(encoder),
        }
    }

    pub fn write(&mut self, frame: &Frame) -> ReelcapResult<()> {
        match self.inner.as_mut() {
            Some(encoder) => encoder.write(frame),
            None => Err(ReelcapError::encode("Encoder already closed")),
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.inner.as_ref().map_or(0, |e| e.frames_written())
    }

    /// Close the encoder. Returns `None` if it was already closed.
    pub fn close(&mut self) -> Option<ReelcapResult<EncodeStats>> {
        self.inner.take().map(|encoder| encoder.finish())
    }
}

impl Drop for EncoderGuard {
    fn drop(&mut self) {
        if let Some(Err(e)) = self.close() {
            tracing::warn!(error = %e, "Failed to close encoder during unwind");
        }
    }
}

/// GStreamer `appsrc ! x264enc ! mp4mux` encoder.
pub struct GstEncoder {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    path: PathBuf,
    fps: u32,
    width: u32,
    height: u32,
    frames: u64,
}

impl GstEncoder {
    pub fn open(path: &Path, fps: u32, width: u32, height: u32) -> ReelcapResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelcapError::encode(format!(
                "Cannot encode a {width}x{height} stream"
            )));
        }
        let fps = fps.max(1);
        let (out_width, out_height) = even_dimensions(width, height);

        let description = format!(
            "appsrc name=frames format=time \
             ! videoconvert ! videoscale \
             ! video/x-raw,format=I420,width={out_width},height={out_height} \
             ! x264enc speed-preset=veryfast tune=zerolatency key-int-max={gop} \
             ! h264parse ! mp4mux ! filesink location=\"{location}\"",
            gop = fps * 2,
            location = escape_path(path),
        );
        let pipeline = launch_pipeline(&description)?;

        let appsrc = pipeline
            .by_name("frames")
            .ok_or_else(|| ReelcapError::encode("appsrc element missing from encoder"))?
            .downcast::<gst_app::AppSrc>()
            .map_err(|_| ReelcapError::encode("frames element is not an appsrc"))?;

        let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgba, width, height)
            .fps(gst::Fraction::new(fps as i32, 1))
            .build()
            .map_err(|e| ReelcapError::encode(format!("Invalid video info: {e}")))?;
        let caps = info
            .to_caps()
            .map_err(|e| ReelcapError::encode(format!("Invalid video caps: {e}")))?;
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_block(true);

        start_pipeline(&pipeline, "encoder")?;

        tracing::info!(
            path = %path.display(),
            fps,
            width,
            height,
            "Encoder opened"
        );

        Ok(Self {
            pipeline,
            appsrc,
            path: path.to_path_buf(),
            fps,
            width,
            height,
            frames: 0,
        })
    }

    fn timestamp(&self, index: u64) -> gst::ClockTime {
        gst::ClockTime::from_nseconds(index * 1_000_000_000 / u64::from(self.fps))
    }
}

impl VideoEncoder for GstEncoder {
    fn write(&mut self, frame: &Frame) -> ReelcapResult<()> {
        if let Some(message) = pending_bus_error(&self.pipeline) {
            return Err(ReelcapError::encode(message));
        }

        let data = if frame.width() == self.width && frame.height() == self.height {
            frame.image.as_raw().clone()
        } else {
            imageops::resize(&frame.image, self.width, self.height, FilterType::Triangle)
                .into_raw()
        };

        let pts = self.timestamp(self.frames);
        let duration = self.timestamp(self.frames + 1) - pts;
        let mut buffer = gst::Buffer::from_mut_slice(data);
        {
            let buffer = buffer
                .get_mut()
                .ok_or_else(|| ReelcapError::encode("Frame buffer is not writable"))?;
            buffer.set_pts(pts);
            buffer.set_duration(duration);
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| ReelcapError::encode(format!("Encoder rejected frame: {e:?}")))?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(self: Box<Self>) -> ReelcapResult<EncodeStats> {
        match self.appsrc.end_of_stream() {
            Ok(_) => {
                if !wait_for_eos(&self.pipeline, "encoder", EOS_DRAIN_TIMEOUT) {
                    tracing::warn!(path = %self.path.display(), "Output may be truncated");
                }
            }
            Err(e) => {
                tracing::warn!(error = ?e, "Failed to send EOS; output may be truncated");
            }
        }

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| ReelcapError::encode(format!("Failed to stop encoder: {e:?}")))?;

        tracing::info!(
            path = %self.path.display(),
            frames = self.frames,
            "Encoder closed"
        );

        Ok(EncodeStats {
            path: self.path.clone(),
            frames_written: self.frames,
            width: self.width,
            height: self.height,
        })
    }
}

impl Drop for GstEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::debug!(error = %e, "Failed to reset encoder pipeline");
        }
    }
}

/// Opens [`GstEncoder`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct GstEncoderFactory;

impl GstEncoderFactory {
    pub fn is_available() -> bool {
        elements_available(&["appsrc", "videoconvert", "x264enc", "h264parse", "mp4mux"])
    }
}

impl EncoderFactory for GstEncoderFactory {
    fn open(
        &self,
        path: &Path,
        fps: u32,
        width: u32,
        height: u32,
    ) -> ReelcapResult<Box<dyn VideoEncoder>> {
        Ok(Box::new(GstEncoder::open(path, fps, width, height)?))
    }

    fn name(&self) -> &str {
        "gstreamer-x264"
    }
}

/// 4:2:0 chroma needs even sides; round down, never below 2.
fn even_dimensions(width: u32, height: u32) -> (u32, u32) {
    ((width & !1).max(2), (height & !1).max(2))
}
