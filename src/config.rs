// src/config.rs
use crate::tracking::TrackerConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub tracker: TrackerConfig,
    /// Mirror keypoints before counting, as a selfie-view preview does.
    pub flip_horizontal: bool,
    /// Write the per-frame CSV and HTML report when the session ends.
    pub export_csv: bool,
    pub output_directory: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            flip_horizontal: true,
            export_csv: true,
            output_directory: default_output_directory(),
        }
    }
}

fn default_output_directory() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("RepTracker")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

impl AppSettings {
    /// Reads settings from a JSON file. Fields left out keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.tracker;
        let angles = [
            ("raise_threshold", t.raise_threshold),
            ("full_extension", t.full_extension),
            ("squat_threshold", t.squat_threshold),
            ("perspective_threshold", t.perspective_threshold),
            ("deep_enough", t.deep_enough),
        ];
        for (name, value) in angles {
            if !(0.0..=180.0).contains(&value) {
                anyhow::bail!("{} must be within 0..=180 degrees, got {}", name, value);
            }
        }
        if !(0.0..=1.0).contains(&t.min_keypoint_confidence) {
            anyhow::bail!(
                "min_keypoint_confidence must be within 0..=1, got {}",
                t.min_keypoint_confidence
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"flip_horizontal": false, "tracker": {{"deep_enough": 20.0}}}}"#
        )
        .unwrap();

        let settings = AppSettings::load(file.path()).unwrap();
        assert!(!settings.flip_horizontal);
        assert!(settings.export_csv);
        assert_eq!(settings.tracker.deep_enough, 20.0);
        assert_eq!(settings.tracker.raise_threshold, 120.0);
        assert_eq!(settings.tracker.min_episode_frames, 8);
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"tracker": {{"full_extension": 200.0}}}}"#).unwrap();
        assert!(AppSettings::load(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppSettings::load("/nonexistent/rep_tracker/settings.json").is_err());
    }
}
