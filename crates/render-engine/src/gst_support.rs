//! Shared GStreamer plumbing for the capture and encode pipelines.

use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use gstreamer as gst;
use gstreamer::prelude::*;
use reelcap_common::error::{ReelcapError, ReelcapResult};

/// Upper bound on how long a pipeline may take to flush after EOS.
pub const EOS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialize GStreamer once per process.
pub fn init_gstreamer() -> ReelcapResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(ReelcapError::platform(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Whether every named element factory is installed.
pub fn elements_available(names: &[&str]) -> bool {
    if init_gstreamer().is_err() {
        return false;
    }
    names
        .iter()
        .all(|name| gst::ElementFactory::find(name).is_some())
}

/// Quote-safe path for a `gst::parse::launch` description.
pub fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('"', "\\\"")
}

/// Parse a launch description into a pipeline.
pub fn launch_pipeline(description: &str) -> ReelcapResult<gst::Pipeline> {
    init_gstreamer()?;
    tracing::debug!(description, "Launching GStreamer pipeline");
    gst::parse::launch(description)
        .map_err(|e| ReelcapError::platform(format!("Failed to build pipeline: {e}")))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| ReelcapError::platform("Launch description did not produce a pipeline"))
}

/// Return the first error posted on the bus since the last call, if any.
pub fn pending_bus_error(pipeline: &gst::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
        if let gst::MessageView::Error(e) = msg.view() {
            return Some(match e.debug() {
                Some(debug) => format!("{} ({debug})", e.error()),
                None => e.error().to_string(),
            });
        }
    }
    None
}

/// Wait for EOS to propagate through `pipeline`, bounded by `deadline`.
///
/// Returns `false` if the pipeline reported an error or the drain timed out.
pub fn wait_for_eos(pipeline: &gst::Pipeline, name: &str, deadline: Duration) -> bool {
    let Some(bus) = pipeline.bus() else {
        return false;
    };

    let start = Instant::now();
    loop {
        let elapsed = start.elapsed();
        if elapsed >= deadline {
            tracing::warn!(pipeline = name, "EOS drain timed out");
            return false;
        }
        let remaining = deadline - elapsed;
        let timeout = gst::ClockTime::from_nseconds(remaining.as_nanos() as u64);

        match bus.timed_pop(timeout) {
            Some(msg) => match msg.view() {
                gst::MessageView::Eos(_) => {
                    tracing::debug!(pipeline = name, "EOS received; pipeline drained");
                    return true;
                }
                gst::MessageView::Error(e) => {
                    tracing::warn!(
                        pipeline = name,
                        error = %e.error(),
                        "Pipeline error during EOS drain"
                    );
                    return false;
                }
                _ => {}
            },
            None => {
                tracing::warn!(pipeline = name, "EOS drain timed out");
                return false;
            }
        }
    }
}

/// Move `pipeline` to Playing and wait for the transition to settle.
pub fn start_pipeline(pipeline: &gst::Pipeline, name: &str) -> ReelcapResult<()> {
    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| ReelcapError::platform(format!("Failed to start {name} pipeline: {e:?}")))?;

    match pipeline.state(gst::ClockTime::from_seconds(10)) {
        (Ok(_), gst::State::Playing, _) => Ok(()),
        (Ok(_), state, _) => {
            tracing::warn!(
                pipeline = name,
                ?state,
                "Pipeline did not reach Playing state within timeout"
            );
            Ok(())
        }
        (Err(e), _, _) => Err(ReelcapError::platform(format!(
            "{name} pipeline failed to reach Playing state: {e:?}{}",
            pending_bus_error(pipeline)
                .map(|msg| format!(": {msg}"))
                .unwrap_or_default()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_path_quotes_double_quotes() {
        assert_eq!(
            escape_path(Path::new("/tmp/my \"clip\".mp4")),
            "/tmp/my \\\"clip\\\".mp4"
        );
    }
}
