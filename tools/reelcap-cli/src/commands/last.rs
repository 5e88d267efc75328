//! Locate the newest recording.

use reelcap_common::config::AppConfig;
use reelcap_render_engine::latest_artifact;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    match latest_artifact(&config.save_path) {
        Some(path) => println!("{}", path.display()),
        None => println!("No recordings in {}", config.save_path.display()),
    }
    Ok(())
}
