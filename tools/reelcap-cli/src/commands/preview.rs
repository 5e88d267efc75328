//! Run the live preview for a while and report what it produced.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use image::RgbaImage;
use reelcap_capture_engine::{
    resolve_region, PreviewEvent, PreviewLoop, PreviewStart, RecordingActivity, XcapMonitors,
};
use reelcap_capture_engine::backend::backend_from_name;
use reelcap_common::config::AppConfig;
use reelcap_platform_core::RegionSelection;

pub async fn run(
    config: AppConfig,
    seconds: f64,
    snapshot: Option<PathBuf>,
    backend: Option<String>,
) -> anyhow::Result<()> {
    let run_for = Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|d| !d.is_zero())
        .context("--seconds must be a positive number")?;

    let selection = RegionSelection::from_config(&config)?;
    let region = resolve_region(&selection, &XcapMonitors)?;

    let backend = backend.or_else(|| config.recording.backend.clone());
    let sources = backend_from_name(backend.as_deref())?.factory();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let preview = PreviewLoop::new(sources, RecordingActivity::idle(), tx);

    if preview.start(region)? != PreviewStart::Started {
        anyhow::bail!("Preview could not be started");
    }
    println!("Previewing {} ({region}) for {seconds}s...", selection.label());

    let deadline = tokio::time::sleep(run_for);
    tokio::pin!(deadline);

    let mut frames = 0u64;
    let mut last_frame: Option<RgbaImage> = None;
    let mut last_status: Option<String> = None;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = rx.recv() => match event {
                Some(PreviewEvent::Started { display_size: (w, h), .. }) => {
                    println!("  Display size: {w}x{h}");
                }
                Some(PreviewEvent::Frame(image)) => {
                    frames += 1;
                    last_frame = Some(image);
                }
                Some(PreviewEvent::Status(text)) => {
                    if last_status.as_deref() != Some(text.as_str()) {
                        println!("  {text}");
                        last_status = Some(text);
                    }
                }
                Some(PreviewEvent::Stopped) | None => break,
            },
        }
    }

    preview.stop();

    println!("Preview stopped after {frames} frames");

    if let Some(path) = snapshot {
        let image = last_frame.context("No preview frame was captured")?;
        image
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Snapshot saved to: {}", path.display());
    }

    Ok(())
}
