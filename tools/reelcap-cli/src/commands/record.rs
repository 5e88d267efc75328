//! Record the configured capture target for a fixed duration.

use std::path::PathBuf;

use reelcap_capture_engine::{
    PipelineParts, RecordingController, RecordingEvent, SessionOutcome, SessionReport,
    SessionSettings, StartOutcome, StartRequest,
};
use reelcap_common::config::AppConfig;
use reelcap_common::error::ReelcapError;

pub struct RecordArgs {
    pub duration: String,
    pub unit: String,
    pub fps: Option<u32>,
    pub backend: Option<String>,
    pub json: bool,
}

pub async fn run(mut config: AppConfig, config_path: PathBuf, args: RecordArgs) -> anyhow::Result<()> {
    let backend = args.backend.or_else(|| config.recording.backend.clone());
    let parts = PipelineParts::detect(backend.as_deref())?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let controller = RecordingController::new(parts, tx);

    let request = StartRequest {
        duration_value: args.duration,
        duration_unit: args.unit,
        fps: args.fps.unwrap_or(config.recording.fps),
        settings: SessionSettings::from_config(&config)?,
    };

    match controller.start(request) {
        Ok(StartOutcome::Started { region }) => {
            tracing::debug!(%region, "Session started");
        }
        Ok(StartOutcome::AlreadyActive(status)) => {
            anyhow::bail!("A recording is already {status:?}");
        }
        Err(ReelcapError::InvalidMonitorSelection { message }) => {
            config.clear_selection();
            if let Err(e) = config.save_to(&config_path) {
                tracing::warn!(error = %e, "Failed to save config");
            }
            anyhow::bail!(
                "{message}. The saved screen selection was reset to the primary screen; \
                 run `reelcap monitors` to pick another"
            );
        }
        Err(e) => return Err(e.into()),
    }

    let mut cancel_requested = false;
    let report = loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(RecordingEvent::PreviousArtifactsRemoved { count }) => {
                    if count > 0 && !args.json {
                        println!("Removed {count} previous recording(s)");
                    }
                }
                Some(RecordingEvent::Capturing { target, region, raw_path, backend }) => {
                    if !args.json {
                        println!("Recording {target} ({region}) with {backend} capture");
                        println!("  Output: {}", raw_path.display());
                        println!("Press Ctrl+C to stop early...");
                    }
                }
                Some(RecordingEvent::Finalizing { frames_written }) => {
                    if !args.json {
                        println!("Finalizing {frames_written} frames...");
                    }
                }
                Some(RecordingEvent::Finished(report)) => break report,
                None => anyhow::bail!("Recorder exited without a report"),
            },
            signal = tokio::signal::ctrl_c(), if !cancel_requested => {
                signal?;
                cancel_requested = true;
                if controller.cancel() && !args.json {
                    println!();
                    println!("Stopping...");
                }
            }
        }
    };

    let waiter = controller.clone();
    tokio::task::spawn_blocking(move || waiter.wait()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let SessionOutcome::Failed { message } = &report.outcome {
        anyhow::bail!("Recording failed: {message}");
    }
    Ok(())
}

fn print_report(report: &SessionReport) {
    println!();
    match &report.outcome {
        SessionOutcome::Completed => println!("Recording complete"),
        SessionOutcome::Cancelled => println!("Recording stopped"),
        SessionOutcome::Failed { .. } => println!("Recording failed"),
    }
    if let Some(started_at) = report.started_at {
        println!("  Started: {}", started_at.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("  Frames: {}", report.frames_written);
    if report.capture_failures > 0 {
        println!("  Skipped frames: {}", report.capture_failures);
    }
    println!("  Elapsed: {:.1}s", report.elapsed_secs);

    if let Some(artifact) = &report.artifact {
        if artifact.transcoded {
            println!("  Saved: {}", artifact.final_path.display());
        } else {
            println!("  Saved (not converted): {}", artifact.final_path.display());
        }
        println!("  Raw: {}", artifact.raw_path.display());
    }
}
