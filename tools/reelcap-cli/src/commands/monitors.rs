//! List connected monitors.

use reelcap_capture_engine::XcapMonitors;
use reelcap_common::config::AppConfig;
use reelcap_platform_core::MonitorEnumerator;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let monitors = XcapMonitors.monitors()?;
    if monitors.is_empty() {
        println!("No monitors detected.");
        return Ok(());
    }

    for m in &monitors {
        let selected = config.selected_monitor == Some(m.index);
        println!(
            "{} {:>2}: {} {}x{} at ({},{}) {}",
            if selected { "*" } else { " " },
            m.index,
            m.name,
            m.width,
            m.height,
            m.left,
            m.top,
            if m.primary { "(primary)" } else { "" }
        );
    }
    Ok(())
}
