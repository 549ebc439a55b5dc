use std::fs;
use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::annotate::BallMarker;
use crate::color::Palette;
use crate::detection::ClassMap;
use crate::error::Error;
use crate::kmeans::KMeansConfig;
use crate::minimap::MinimapConfig;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub video_source: PathBuf,
    pub video_target: PathBuf,
    /// Per-frame detector and tracker output, JSON lines.
    pub detections: PathBuf,
    /// Four-corner pixel calibration, TL, TR, BR, BL.
    pub court_config: PathBuf,

    /// Meters, sideline to sideline.
    pub court_width: f32,
    /// Meters, end line to end line.
    pub court_length: f32,
    pub calibration_frames: usize,

    pub classes: ClassMap,
    pub kmeans: KMeansConfig,
    pub minimap: MinimapConfig,
    pub palette: Palette,
    pub ball_marker: BallMarker,
    pub trace_length: usize,
    pub progress_interval: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video_source: PathBuf::from("input_video.mp4"),
            video_target: PathBuf::from("output_video.mp4"),
            detections: PathBuf::from("detections.jsonl"),
            court_config: PathBuf::from("court_config.json"),
            court_width: 9.0,
            court_length: 18.0,
            calibration_frames: 60,
            classes: ClassMap::default(),
            kmeans: KMeansConfig::default(),
            minimap: MinimapConfig::default(),
            palette: Palette::default(),
            ball_marker: BallMarker::default(),
            trace_length: 20,
            progress_interval: 100,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;

        Ok(config)
    }

    /// Rejects court and minimap geometry that cannot be laid out.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, meters) in [("court_width", self.court_width), ("court_length", self.court_length)] {
            if !meters.is_finite() || meters <= 0.0 {
                return Err(Error::InvalidConfig(format!("{} must be a positive number of meters, got {}", name, meters)));
            }
        }

        let m = &self.minimap;
        if m.padding < 0 || m.margin < 0 || m.point_radius < 0 {
            return Err(Error::InvalidConfig(format!(
                "minimap padding, margin and point_radius must not be negative, got {}, {}, {}",
                m.padding, m.margin, m.point_radius
            )));
        }
        if m.width <= m.padding.saturating_mul(2) {
            return Err(Error::InvalidConfig(format!(
                "minimap width {} leaves no room inside padding {}",
                m.width, m.padding
            )));
        }
        if !(0.0..=1.0).contains(&m.alpha) {
            return Err(Error::InvalidConfig(format!("minimap alpha must be within 0..=1, got {}", m.alpha)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = serde_json::from_str(
            r##"{
                "court_length": 16.0,
                "calibration_frames": 4,
                "kmeans": { "seed": 42 },
                "palette": { "team_1": "#FF0000" }
            }"##,
        )
        .unwrap();

        assert_eq!(cfg.court_length, 16.0);
        assert_eq!(cfg.court_width, 9.0);
        assert_eq!(cfg.calibration_frames, 4);
        assert_eq!(cfg.kmeans.seed, Some(42));
        assert_eq!(cfg.kmeans.restarts, 10);
        assert_eq!(cfg.palette.team_1, Color::rgb(255, 0, 0));
        assert_eq!(cfg.palette.team_2, Palette::default().team_2);
        assert_eq!(cfg.court_config, PathBuf::from("court_config.json"));
        assert_eq!(cfg.minimap, MinimapConfig::default());
    }

    #[test]
    fn load_reports_bad_json() {
        let path = std::env::temp_dir().join(format!("courtmap-config-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load(&path), Err(Error::Json(_))));
        let _ = fs::remove_file(&path);

        assert!(matches!(Config::load("/nonexistent/courtmap.json"), Err(Error::Io(_))));
    }

    #[test]
    fn default_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_degenerate_court() {
        for (width, length) in [(0.0, 18.0), (-9.0, 18.0), (9.0, f32::NAN), (f32::INFINITY, 18.0)] {
            let cfg = Config {
                court_width: width,
                court_length: length,
                ..Default::default()
            };

            assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))), "{} x {}", width, length);
        }
    }

    #[test]
    fn rejects_degenerate_minimap() {
        let mut cfg = Config::default();
        cfg.minimap.width = 0;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        let mut cfg = Config::default();
        cfg.minimap.width = 100;
        cfg.minimap.padding = 50;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        let mut cfg = Config::default();
        cfg.minimap.alpha = 1.5;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn load_validates() {
        let path = std::env::temp_dir().join(format!("courtmap-zero-width-{}.json", std::process::id()));
        fs::write(&path, r#"{ "court_width": 0.0 }"#).unwrap();

        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
        let _ = fs::remove_file(&path);
    }
}
