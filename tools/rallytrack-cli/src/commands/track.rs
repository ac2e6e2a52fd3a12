//! Track the ball through a video.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rallytrack_common::AppConfig;
use rallytrack_model::SessionSummary;
use rallytrack_session::{track_video_async, SessionOptions, TrackRequest};
use rallytrack_vision::TrackingConfig;

pub struct TrackArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub render: bool,
    pub report: Option<PathBuf>,
    pub json: bool,
    pub tuning: Option<PathBuf>,
    pub font: Option<PathBuf>,
    pub progress_every: u64,
}

pub async fn run(config: &AppConfig, args: TrackArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input video not found: {}", args.input.display());
    }

    let tracking = match &args.tuning {
        Some(path) => TrackingConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load tuning file: {e}"))?,
        None => TrackingConfig::default(),
    };

    let output = if args.render && (args.output.is_some() || config.output.annotate) {
        Some(
            args.output
                .clone()
                .unwrap_or_else(|| config.output.output_path_for(&args.input)),
        )
    } else {
        None
    };

    let stop = Arc::new(AtomicBool::new(false));
    let stop_on_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; finishing current frame");
            stop_on_signal.store(true, Ordering::Relaxed);
        }
    });

    let request = TrackRequest {
        input: args.input.clone(),
        output: output.clone(),
        options: SessionOptions {
            tracking,
            font_path: args.font.clone().or_else(|| config.output.font_path.clone()),
            stop: Some(stop),
            progress_interval: args.progress_every,
        },
    };

    if !args.json {
        println!("Tracking: {}", args.input.display());
        if let Some(path) = &output {
            println!("  Output: {}", path.display());
        }
    }

    let summary = track_video_async(request).await?;

    if let Some(report) = &args.report {
        std::fs::write(report, summary.to_json()?)
            .map_err(|e| anyhow::anyhow!("Failed to write report {}: {e}", report.display()))?;
    }

    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        print_summary(&summary);
    }

    if !summary.success {
        anyhow::bail!(
            "Tracking failed: {}",
            summary.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    let info = &summary.video_info;
    println!();
    println!("Tracking summary:");
    println!(
        "  Video: {}x{} @ {:.2}fps ({:.1}s)",
        info.width, info.height, info.fps, info.duration
    );
    println!("  Frames processed: {}", summary.total_frames);
    println!("  Detections: {}", summary.detection_count);
    println!("  Interpolated: {}", summary.interpolated_count);
    println!("  Detection rate: {:.1}%", summary.detection_rate);
    if let Some((x, y)) = summary.trajectory.last() {
        println!("  Last position: ({x:.0}, {y:.0})");
    }
    if let Some(error) = &summary.error {
        println!("  Error: {error}");
    }
}
