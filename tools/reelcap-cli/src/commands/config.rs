//! Show or edit saved settings.

use std::path::Path;

use anyhow::Context;
use reelcap_common::config::AppConfig;
use reelcap_platform_core::{CaptureRegion, RegionSelection, MIN_SELECTION_SIZE};

use crate::{ConfigAction, Toggle};

pub fn run(mut config: AppConfig, config_path: &Path, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            show(&config, config_path)?;
            return Ok(());
        }
        ConfigAction::Region { x, y, width, height } => {
            let region = CaptureRegion::new(x, y, width, height)?;
            config.set_region(region.x(), region.y(), region.width(), region.height());
            println!("Capture target: region {region}");
        }
        ConfigAction::Select { x0, y0, x1, y1 } => {
            let region = CaptureRegion::from_drag((x0, y0), (x1, y1)).with_context(|| {
                format!("Selection too small: both sides must exceed {MIN_SELECTION_SIZE} px")
            })?;
            config.set_region(region.x(), region.y(), region.width(), region.height());
            println!("Capture target: region {region}");
        }
        ConfigAction::Monitor { index } => {
            config.select_monitor(index);
            println!("Capture target: Screen {}", index + 1);
        }
        ConfigAction::Clear => {
            config.clear_selection();
            println!("Capture target: primary screen");
        }
        ConfigAction::Cursor { state } => {
            config.show_cursor = state.enabled();
            println!("Show cursor: {}", on_off(state));
        }
        ConfigAction::Replace { state } => {
            config.replace_mode = state.enabled();
            println!("Replace previous recordings: {}", on_off(state));
        }
        ConfigAction::SavePath { path } => {
            println!("Save folder: {}", path.display());
            config.save_path = path;
        }
    }

    config
        .save_to(config_path)
        .with_context(|| format!("Failed to save {}", config_path.display()))?;
    Ok(())
}

fn on_off(state: Toggle) -> &'static str {
    if state.enabled() {
        "on"
    } else {
        "off"
    }
}

fn show(config: &AppConfig, config_path: &Path) -> anyhow::Result<()> {
    println!("Config file: {}", config_path.display());
    let target = match RegionSelection::from_config(config)? {
        RegionSelection::Explicit(region) => format!("region {region}"),
        selection => selection.label(),
    };
    println!("Capture target: {target}");
    println!("Save folder: {}", config.save_path.display());
    println!("Show cursor: {}", config.show_cursor);
    println!("Replace previous recordings: {}", config.replace_mode);
    println!("Default FPS: {}", config.recording.fps);
    println!(
        "Capture backend: {}",
        config.recording.backend.as_deref().unwrap_or("auto")
    );
    Ok(())
}
