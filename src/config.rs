use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::engine::Backend;
use crate::gate::GapPolicy;
use crate::vectorizer::UnknownHandedness;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub recording: RecordingConfig,
    pub classifier: ClassifierConfig,
    pub detector: DetectorConfig,
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordingConfig {
    pub duration_ms: u64,
    pub gap_policy: GapPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model_path: PathBuf,
    /// Class names in model output order
    pub labels: Vec<String>,
    pub threshold: f32,
    /// Class reported when the top score is below `threshold`
    pub fallback_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub hand_model_path: PathBuf,
    pub pose_model_path: PathBuf,
    pub backend: Backend,
    pub num_hands: usize,
    pub min_hand_confidence: f32,
    pub min_pose_confidence: f32,
    pub unknown_handedness: UnknownHandedness,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    /// Front-facing feed, shown and processed mirrored
    pub mirror: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            duration_ms: 3000,
            gap_policy: GapPolicy::Skip,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/sign_language.onnx"),
            labels: vec!["Obrigado".to_string(), "Nada".to_string()],
            threshold: 0.7,
            fallback_index: 1,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            hand_model_path: PathBuf::from("models/hand_landmark.onnx"),
            pose_model_path: PathBuf::from("models/pose_landmark_lite.onnx"),
            backend: Backend::Gpu,
            num_hands: 2,
            min_hand_confidence: 0.5,
            min_pose_confidence: 0.5,
            unknown_handedness: UnknownHandedness::Drop,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            mirror: true,
        }
    }
}

impl RecordingConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "config.json";

    /// Loads `path`. A missing file gives defaults, a malformed one is reported
    /// and replaced by defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    warn!("Error parsing config {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            }
        } else {
            info!("Configuration file {} not found, using defaults", path.display());
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.classifier.labels.is_empty() {
            bail!("classifier.labels must name at least one class");
        }
        if self.classifier.fallback_index >= self.classifier.labels.len() {
            bail!(
                "classifier.fallback_index {} is out of range for {} labels",
                self.classifier.fallback_index,
                self.classifier.labels.len()
            );
        }
        if !(0.0..=1.0).contains(&self.classifier.threshold) {
            bail!("classifier.threshold must be within [0, 1]");
        }
        if self.recording.duration_ms == 0 {
            bail!("recording.duration_ms must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gesture-capture-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.recording.duration(), Duration::from_millis(3000));
        assert_eq!(config.classifier.threshold, 0.7);
        assert_eq!(config.classifier.labels, vec!["Obrigado", "Nada"]);
        assert_eq!(config.detector.backend, Backend::Gpu);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial");
        fs::write(
            &path,
            r#"{ "classifier": { "threshold": 0.8 }, "recording": { "gap_policy": "zero_fill" } }"#,
        )
        .unwrap();
        let config = AppConfig::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.classifier.threshold, 0.8);
        assert_eq!(config.classifier.fallback_index, 1);
        assert_eq!(config.recording.gap_policy, GapPolicy::ZeroFill);
        assert_eq!(config.recording.duration_ms, 3000);
    }

    #[test]
    fn test_missing_and_malformed_files_use_defaults() {
        let missing = temp_path("missing");
        assert_eq!(AppConfig::load(&missing).unwrap(), AppConfig::default());

        let broken = temp_path("broken");
        fs::write(&broken, "{ not json").unwrap();
        let config = AppConfig::load(&broken).unwrap();
        fs::remove_file(&broken).ok();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_round_trip() {
        let path = temp_path("saved");
        let mut config = AppConfig::default();
        config.detector.backend = Backend::Cpu;
        config.detector.unknown_handedness = UnknownHandedness::Right;
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.classifier.fallback_index = 2;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.classifier.labels.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.recording.duration_ms = 0;
        assert!(config.validate().is_err());
    }
}
