//! Show video stream information.

use std::path::PathBuf;

use rallytrack_session::inspect_video;

pub fn run(input: PathBuf) -> anyhow::Result<()> {
    let info = inspect_video(&input)
        .map_err(|e| anyhow::anyhow!("Failed to read video info: {e}"))?;

    println!("Video: {}", input.display());
    println!("  Resolution: {}x{}", info.width, info.height);
    if rallytrack_common::is_valid_fps(info.fps) {
        println!("  Frame rate: {:.3} fps", info.fps);
    } else {
        println!(
            "  Frame rate: unknown (tracking assumes {} fps)",
            rallytrack_common::FALLBACK_FPS
        );
    }
    match info.frame_count {
        Some(frames) => {
            println!("  Frames: {frames}");
            println!("  Duration: {:.2}s", info.duration);
        }
        None => println!("  Frames: unknown"),
    }

    Ok(())
}
