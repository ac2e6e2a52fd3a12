//! Check external tool availability.

use rallytrack_session::video::command_exists;

pub fn run() -> anyhow::Result<()> {
    println!("RallyTrack System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        ("ffprobe", "reads stream metadata"),
        ("ffmpeg", "decodes input and encodes annotated output"),
    ];

    let mut all_ok = true;
    for (binary, purpose) in tools {
        if command_exists(binary) {
            println!("[OK] {binary}: found ({purpose})");
        } else {
            println!("[MISSING] {binary}: not in PATH ({purpose})");
            all_ok = false;
        }
    }

    let config_path = rallytrack_common::config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] Config: using defaults ({} not found)", config_path.display());
    }

    println!();
    if all_ok {
        println!("All required tools are available. RallyTrack is ready.");
    } else {
        println!("Install ffmpeg (which ships ffprobe) to track videos.");
    }

    Ok(())
}
