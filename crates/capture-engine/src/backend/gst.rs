//! Continuous X11 capture through a GStreamer `ximagesrc` pipeline.
//!
//! The pipeline runs for the lifetime of the source and keeps only the
//! newest frame in its appsink; `capture` pulls whatever is there.

use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use reelcap_common::error::{ReelcapError, ReelcapResult};
use reelcap_platform_core::{CaptureRegion, Frame};
use reelcap_render_engine::gst_support::{
    elements_available, launch_pipeline, pending_bus_error, start_pipeline,
};

use super::{FrameSource, FrameSourceFactory};

/// Rate at which ximagesrc refreshes the buffered frame.
const SOURCE_FRAMERATE: u32 = 60;

/// Longest a single `capture` call waits for a sample.
const PULL_TIMEOUT: Duration = Duration::from_millis(500);

pub struct GstFrameSource {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    region: CaptureRegion,
}

impl GstFrameSource {
    pub fn open(region: CaptureRegion) -> ReelcapResult<Self> {
        let description = format!(
            "ximagesrc use-damage=false show-pointer=false{crop} \
             ! video/x-raw,framerate={SOURCE_FRAMERATE}/1 \
             ! videoconvert ! video/x-raw,format=RGBA \
             ! appsink name=frames max-buffers=1 drop=true sync=false",
            crop = x11_capture_region_fragment(Some(region.as_tuple()))?,
        );
        let pipeline = launch_pipeline(&description)?;

        let appsink = pipeline
            .by_name("frames")
            .ok_or_else(|| ReelcapError::capture("appsink element missing from capture pipeline"))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| ReelcapError::capture("frames element is not an appsink"))?;

        start_pipeline(&pipeline, "capture")?;
        tracing::info!(%region, "Compositor capture pipeline started");

        Ok(Self {
            pipeline,
            appsink,
            region,
        })
    }

    fn sample_to_frame(sample: &gst::Sample) -> ReelcapResult<Frame> {
        let caps = sample
            .caps()
            .ok_or_else(|| ReelcapError::capture("sample without caps"))?;
        let info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| ReelcapError::capture(format!("unreadable sample caps: {e}")))?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| ReelcapError::capture("sample without buffer"))?;
        let map = buffer
            .map_readable()
            .map_err(|e| ReelcapError::capture(format!("cannot map sample buffer: {e}")))?;

        let width = info.width();
        let height = info.height();
        let stride = info.stride()[0] as usize;
        let row_len = width as usize * 4;
        let data = map.as_slice();

        if width == 0 || height == 0 || data.is_empty() {
            return Err(ReelcapError::capture(format!(
                "empty sample ({width}x{height}, {} bytes)",
                data.len()
            )));
        }
        if stride < row_len || data.len() < stride * (height as usize - 1) + row_len {
            return Err(ReelcapError::capture(format!(
                "short sample: {} bytes for {width}x{height} stride {stride}",
                data.len()
            )));
        }

        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in data.chunks(stride).take(height as usize) {
            pixels.extend_from_slice(&row[..row_len]);
        }
        Frame::from_rgba(width, height, pixels)
    }
}

impl FrameSource for GstFrameSource {
    fn capture(&mut self) -> ReelcapResult<Frame> {
        if let Some(message) = pending_bus_error(&self.pipeline) {
            return Err(ReelcapError::capture(message));
        }

        let timeout = gst::ClockTime::from_nseconds(PULL_TIMEOUT.as_nanos() as u64);
        let sample = self.appsink.try_pull_sample(timeout).ok_or_else(|| {
            ReelcapError::capture(format!(
                "no frame within {}ms",
                PULL_TIMEOUT.as_millis()
            ))
        })?;
        Self::sample_to_frame(&sample)
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }

    fn name(&self) -> &str {
        "compositor"
    }
}

impl Drop for GstFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::debug!(error = ?e, "Failed to stop capture pipeline");
        }
    }
}

/// Opens [`GstFrameSource`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct GstSourceFactory;

impl FrameSourceFactory for GstSourceFactory {
    fn open(&self, region: CaptureRegion) -> ReelcapResult<Box<dyn FrameSource>> {
        Ok(Box::new(GstFrameSource::open(region)?))
    }

    fn is_available(&self) -> bool {
        std::env::var_os("DISPLAY").is_some()
            && elements_available(&["ximagesrc", "videoconvert", "appsink"])
    }

    fn name(&self) -> &str {
        "compositor"
    }
}

fn x11_capture_region_fragment(
    capture_region: Option<(i32, i32, u32, u32)>,
) -> ReelcapResult<String> {
    let Some((x, y, width, height)) = capture_region else {
        return Ok(String::new());
    };

    if width == 0 || height == 0 {
        return Err(ReelcapError::capture(format!(
            "Invalid X11 capture region {width}x{height} at ({x},{y})"
        )));
    }

    let width_i32 = i32::try_from(width)
        .map_err(|_| ReelcapError::capture(format!("X11 capture width too large: {width}")))?;
    let height_i32 = i32::try_from(height)
        .map_err(|_| ReelcapError::capture(format!("X11 capture height too large: {height}")))?;

    let endx = x
        .checked_add(width_i32 - 1)
        .ok_or_else(|| ReelcapError::capture("X11 capture region x-range overflow"))?;
    let endy = y
        .checked_add(height_i32 - 1)
        .ok_or_else(|| ReelcapError::capture("X11 capture region y-range overflow"))?;

    Ok(format!(" startx={x} starty={y} endx={endx} endy={endy}"))
}
