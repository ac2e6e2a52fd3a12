//! Show or initialize configuration.

use rallytrack_common::{config_file_path, AppConfig};
use rallytrack_vision::TrackingConfig;

pub fn run(config: &AppConfig, init: bool, tuning: bool) -> anyhow::Result<()> {
    if tuning {
        println!("{}", serde_json::to_string_pretty(&TrackingConfig::default())?);
        return Ok(());
    }

    let path = config_file_path();
    if init {
        if path.exists() {
            println!("Config already exists: {}", path.display());
        } else {
            AppConfig::default().save()?;
            println!("Wrote default config: {}", path.display());
        }
        return Ok(());
    }

    println!("Config file: {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
