//! Check system capabilities.

use std::path::Path;

use reelcap_capture_engine::{probe_backend, FrameSourceFactory, XcapMonitors};
use reelcap_capture_engine::backend::{GstSourceFactory, ScreenshotSourceFactory};
use reelcap_platform_core::MonitorEnumerator;
use reelcap_render_engine::{command_exists, GstEncoderFactory};

fn report(ok: bool, label: &str, hint: &str) -> bool {
    if ok {
        println!("[OK]      {label}");
    } else {
        println!("[MISSING] {label}  ({hint})");
    }
    ok
}

pub fn run() -> anyhow::Result<()> {
    println!("Reelcap System Check");
    println!("{}", "=".repeat(50));

    match XcapMonitors.monitors() {
        Ok(monitors) => {
            println!("[OK]      Monitors detected: {}", monitors.len());
            for m in &monitors {
                println!(
                    "          {} {}x{} at ({},{}) {}",
                    m.name,
                    m.width,
                    m.height,
                    m.left,
                    m.top,
                    if m.primary { "(primary)" } else { "" }
                );
            }
        }
        Err(e) => println!("[WARN]    Monitor enumeration failed: {e}"),
    }

    println!();
    let compositor = report(
        GstSourceFactory.is_available(),
        "Compositor capture (GStreamer ximagesrc)",
        "needs an X11 DISPLAY and gstreamer1.0-plugins-good",
    );
    let screenshot = report(
        ScreenshotSourceFactory.is_available(),
        "Screenshot capture (xcap)",
        "no monitors reachable",
    );
    let encoder = report(
        GstEncoderFactory::is_available(),
        "H.264 encoder (GStreamer x264enc, mp4mux)",
        "install gstreamer1.0-plugins-ugly and gstreamer1.0-plugins-good",
    );
    let ffmpeg = report(
        command_exists(Path::new("ffmpeg")) && command_exists(Path::new("ffprobe")),
        "ffmpeg / ffprobe",
        "sudo apt install ffmpeg; recordings stay unconverted without it",
    );
    report(
        command_exists(Path::new("xdotool")),
        "xdotool",
        "sudo apt install xdotool; recordings have no pointer without it",
    );

    println!();
    match probe_backend() {
        Ok(backend) => println!("Capture backend: {backend}"),
        Err(e) => println!("Capture backend: none ({e})"),
    }

    println!();
    if (compositor || screenshot) && encoder {
        if ffmpeg {
            println!("All required capabilities are available. Reelcap is ready.");
        } else {
            println!("Recording works; share-ready conversion is unavailable.");
        }
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
