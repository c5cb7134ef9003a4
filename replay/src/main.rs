mod sink;
mod source;

use impact_common::config::Config;
use impact_detector::{ChangeDetector, SubmitOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read frame directory {0}: {1}")]
    ReadDir(PathBuf, std::io::Error),
    #[error("failed to open frame {0}: {1}")]
    Open(PathBuf, std::io::Error),
    #[error("failed to decode frame {0}: {1}")]
    Decode(PathBuf, image::ImageError),
    #[error("invalid frame rate {0}, expected a positive number")]
    FrameRate(f64),
}

/// Counters for one pass over the frame directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ReplayStats {
    frames: usize,
    skipped: usize,
    debounced: usize,
    compared: usize,
    detections: usize,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("replay.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        frames_dir = %config.replay.frames_dir.display(),
        fps = config.replay.fps,
        sample_interval_secs = config.detector.sample_interval_secs,
        min_region_size = config.detector.min_region_size,
        "starting impact replay"
    );

    if let Err(e) = run(&config).await {
        error!(error = %e, "replay failed");
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> Result<(), ReplayError> {
    let tick = frame_period(config.replay.fps)?;
    let paths = source::list_frames(&config.replay.frames_dir)?;
    info!(count = paths.len(), "frames found");

    let mut detector = ChangeDetector::from_config(&config.detector);
    let sink = tokio::spawn(sink::run_report_sink(
        detector.subscribe(),
        config.report.clone(),
        std::io::stdout(),
    ));

    if config.replay.start_active {
        detector.start();
    }

    let stats = replay_frames(&paths, &mut detector, tick).await;
    detector.stop();
    // Closes the event channel so the sink drains and exits.
    drop(detector);

    if let Err(e) = sink.await {
        warn!(error = %e, "report sink task failed");
    }

    info!(
        frames = stats.frames,
        skipped = stats.skipped,
        debounced = stats.debounced,
        compared = stats.compared,
        detections = stats.detections,
        "replay finished"
    );
    Ok(())
}

fn frame_period(fps: f64) -> Result<Duration, ReplayError> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(ReplayError::FrameRate(fps));
    }
    Ok(Duration::from_secs_f64(1.0 / fps))
}

/// Feed each frame to the detector on a fixed-rate ticker, like a camera would.
async fn replay_frames(paths: &[PathBuf], detector: &mut ChangeDetector, tick: Duration) -> ReplayStats {
    let mut ticker = tokio::time::interval(tick);
    let mut stats = ReplayStats::default();

    for path in paths {
        ticker.tick().await;
        stats.frames += 1;

        let frame = match source::load_frame(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "skipping unreadable frame");
                stats.skipped += 1;
                continue;
            }
        };

        match detector.submit_frame(&frame) {
            SubmitOutcome::Compared { regions_found, emitted } => {
                stats.compared += 1;
                stats.detections += emitted.len();
                debug!(frame = %display_name(path), regions_found, emitted = emitted.len(), "compared");
            }
            SubmitOutcome::Debounced => stats.debounced += 1,
            SubmitOutcome::BaselineAdopted => {
                debug!(frame = %display_name(path), "baseline frame");
            }
            SubmitOutcome::Inactive => {}
        }
    }

    stats
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn frame_period_rejects_nonsense() {
        assert_eq!(frame_period(10.0).unwrap(), Duration::from_millis(100));
        assert!(matches!(frame_period(0.0), Err(ReplayError::FrameRate(_))));
        assert!(matches!(frame_period(-5.0), Err(ReplayError::FrameRate(_))));
        assert!(matches!(frame_period(f64::NAN), Err(ReplayError::FrameRate(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn replays_a_directory_of_frames() {
        let dir = std::env::temp_dir().join(format!("impact-replay-{}-main", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let blank = RgbImage::from_pixel(60, 60, Rgb([250, 250, 250]));
        let mut holed = blank.clone();
        for y in 20..35 {
            for x in 20..35 {
                holed.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        // One frame per second against a 0.5s interval.
        blank.save(dir.join("0001.png")).unwrap();
        blank.save(dir.join("0002.png")).unwrap();
        holed.save(dir.join("0003.png")).unwrap();
        std::fs::write(dir.join("0004.png"), b"garbage").unwrap();
        holed.save(dir.join("0005.png")).unwrap();

        let config = Config::parse(
            r#"
            [detector]
            sample_interval_secs = 0.5
            min_region_size = 10
            "#,
        )
        .unwrap();
        let mut detector = ChangeDetector::from_config(&config.detector);
        detector.start();

        let paths = source::list_frames(&dir).unwrap();
        let stats = replay_frames(&paths, &mut detector, Duration::from_secs(1)).await;

        // The first tick fires immediately, inside the window opened by start().
        assert_eq!(
            stats,
            ReplayStats {
                frames: 5,
                skipped: 1,
                debounced: 1,
                compared: 2,
                detections: 1,
            }
        );
        assert_eq!(detector.detections().len(), 1);
        assert_eq!(detector.detections()[0].sequence_number(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
