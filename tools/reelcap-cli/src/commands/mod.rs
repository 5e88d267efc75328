pub mod check;
pub mod config;
pub mod last;
pub mod monitors;
pub mod preview;
pub mod record;

use std::path::Path;

use reelcap_capture_engine::XcapMonitors;
use reelcap_common::config::AppConfig;
use reelcap_platform_core::MonitorEnumerator;

/// Drop a saved monitor index that no longer matches the connected screens.
pub fn validated_config(mut config: AppConfig, path: &Path) -> AppConfig {
    if config.selected_monitor.is_none() {
        return config;
    }
    match XcapMonitors.monitors() {
        Ok(list) => {
            if config.drop_stale_monitor(list.len()) {
                if let Err(e) = config.save_to(path) {
                    tracing::warn!(error = %e, "Failed to save config");
                }
            }
        }
        Err(e) => tracing::debug!(error = %e, "Cannot validate saved monitor selection"),
    }
    config
}
