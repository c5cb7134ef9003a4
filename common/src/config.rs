use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tunables pushed into the change detector. Out-of-range values are
/// accepted here and clamped by the detector's setters.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Minimum wall-clock gap between two comparisons ("check frequency").
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: f64,
    /// Minimum width and height of a change region in pixels ("caliber size").
    #[serde(default = "default_min_region_size")]
    pub min_region_size: i64,
    #[serde(default)]
    pub emission: EmissionPolicy,
}

/// How many detections a single comparison may emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionPolicy {
    /// Only the first qualifying region in row-major discovery order.
    #[default]
    FirstRegion,
    /// One detection per qualifying region, in discovery order.
    EveryRegion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_frames_dir")]
    pub frames_dir: PathBuf,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_start_active")]
    pub start_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_include_crop")]
    pub include_crop: bool,
    /// Side of the square crop around a detection, in source pixels.
    #[serde(default = "default_crop_size")]
    pub crop_size: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval_secs(),
            min_region_size: default_min_region_size(),
            emission: EmissionPolicy::default(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            frames_dir: default_frames_dir(),
            fps: default_fps(),
            start_active: default_start_active(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_crop: default_include_crop(),
            crop_size: default_crop_size(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_sample_interval_secs() -> f64 {
    2.0
}
fn default_min_region_size() -> i64 {
    44
}
fn default_frames_dir() -> PathBuf {
    PathBuf::from("frames")
}
fn default_fps() -> f64 {
    10.0
}
fn default_start_active() -> bool {
    true
}
fn default_include_crop() -> bool {
    true
}
fn default_crop_size() -> u32 {
    128
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.detector.sample_interval_secs, 2.0);
        assert_eq!(config.detector.min_region_size, 44);
        assert_eq!(config.detector.emission, EmissionPolicy::FirstRegion);
        assert_eq!(config.replay.frames_dir, PathBuf::from("frames"));
        assert!(config.replay.start_active);
        assert_eq!(config.report.crop_size, 128);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::parse(
            r#"
            [detector]
            min_region_size = 12
            emission = "every_region"

            [replay]
            fps = 30.0
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.min_region_size, 12);
        assert_eq!(config.detector.sample_interval_secs, 2.0);
        assert_eq!(config.detector.emission, EmissionPolicy::EveryRegion);
        assert_eq!(config.replay.fps, 30.0);
        assert!(config.report.include_crop);
    }

    #[test]
    fn out_of_range_values_are_not_rejected() {
        // Clamping is the detector's job; the config layer passes them through.
        let config = Config::parse(
            r#"
            [detector]
            sample_interval_secs = -3.0
            min_region_size = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.sample_interval_secs, -3.0);
        assert_eq!(config.detector.min_region_size, 0);
    }

    #[test]
    fn unknown_emission_policy_is_a_parse_error() {
        let err = Config::parse("[detector]\nemission = \"all_of_them\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(Path::new("/nonexistent/impact.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/impact.toml"));
    }
}
