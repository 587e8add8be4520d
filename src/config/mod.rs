//! Engine Configuration
//!
//! Tracking, recognition and confirmation settings stored in TOML format.
//! Every value can be changed at runtime; out-of-range values are clamped,
//! never rejected.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::vision::DetectionClass;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Association and track lifecycle settings
    pub tracking: TrackingSettings,
    /// Recognition gating settings
    pub recognition: RecognitionSettings,
    /// Confirmation workflow settings
    pub confirmation: ConfirmationSettings,
}

/// Which classes may reach the confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Panel labels and breakers
    #[default]
    All,
    /// Panel labels only; every other class is suppressed
    LabelOnly,
}

/// A value per detection class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassThresholds {
    pub panel_label: f32,
    pub breaker_face: f32,
    pub text_roi: f32,
    pub panel: f32,
}

impl ClassThresholds {
    /// Same value for every class
    pub const fn uniform(value: f32) -> Self {
        Self {
            panel_label: value,
            breaker_face: value,
            text_roi: value,
            panel: value,
        }
    }

    pub fn get(&self, class: DetectionClass) -> f32 {
        match class {
            DetectionClass::PanelLabel => self.panel_label,
            DetectionClass::BreakerFace => self.breaker_face,
            DetectionClass::TextRoi => self.text_roi,
            DetectionClass::Panel => self.panel,
        }
    }

    pub fn set(&mut self, class: DetectionClass, value: f32) {
        match class {
            DetectionClass::PanelLabel => self.panel_label = value,
            DetectionClass::BreakerFace => self.breaker_face = value,
            DetectionClass::TextRoi => self.text_roi = value,
            DetectionClass::Panel => self.panel = value,
        }
    }

    fn clamped(self, min: f32, max: f32, fallback: f32) -> Self {
        let mut out = self;
        for class in DetectionClass::ALL {
            out.set(class, clamp_f32(self.get(class), min, max, fallback));
        }
        out
    }
}

/// Association and track lifecycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Minimum detection confidence per class
    pub confidence: ClassThresholds,
    /// Minimum IOU to associate a detection with a track, per class.
    /// Panel labels match by center distance and ignore this.
    pub iou: ClassThresholds,
    /// Frames a track may go unseen before eviction
    pub stale_frames: u64,
    /// Frames a captured or rejected track waits before recognition again
    pub cooldown_frames: u32,
    /// Maximum edit distance for two texts to count as the same
    pub fuzzy_distance: usize,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            confidence: ClassThresholds::uniform(0.5),
            iou: ClassThresholds::uniform(0.5),
            stale_frames: 30,
            cooldown_frames: 30,
            fuzzy_distance: 2,
        }
    }
}

/// Recognition gating settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Frames a non-label track must dwell before recognition
    pub dwell_frames: u32,
    /// Minimum recognizer confidence for non-label classes
    pub ocr_confidence: f32,
    /// Recognition jobs allowed to run at once
    pub max_concurrent: usize,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            dwell_frames: 5,
            ocr_confidence: 0.5,
            max_concurrent: 2,
        }
    }
}

/// Confirmation workflow settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationSettings {
    /// Seconds before an unanswered prompt is dropped
    pub timeout_secs: f32,
    /// How often the timeout is checked, in milliseconds
    pub poll_interval_ms: u64,
    /// Which classes may be prompted
    pub mode: CaptureMode,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30.0,
            poll_interval_ms: 1000,
            mode: CaptureMode::All,
        }
    }
}

impl ConfirmationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f32(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

impl EngineConfig {
    /// Pull every value into its valid range
    pub fn clamped(mut self) -> Self {
        let t = &mut self.tracking;
        t.confidence = t.confidence.clamped(0.0, 1.0, 0.5);
        t.iou = t.iou.clamped(0.01, 1.0, 0.5);
        t.stale_frames = t.stale_frames.clamp(1, 10_000);
        t.cooldown_frames = t.cooldown_frames.min(10_000);
        t.fuzzy_distance = t.fuzzy_distance.min(8);

        let r = &mut self.recognition;
        r.dwell_frames = r.dwell_frames.clamp(1, 300);
        r.ocr_confidence = clamp_f32(r.ocr_confidence, 0.0, 1.0, 0.5);
        r.max_concurrent = r.max_concurrent.clamp(1, 16);

        let c = &mut self.confirmation;
        c.timeout_secs = clamp_f32(c.timeout_secs, 1.0, 3600.0, 30.0);
        // The poll must run at least every 5 seconds
        c.poll_interval_ms = c.poll_interval_ms.clamp(50, 5000);

        self
    }
}

/// Load configuration from file, clamped to valid ranges
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: EngineConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config.clamped())
}

/// Save configuration to file
pub fn save_config(config: &EngineConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_engine_config() {
        let config = EngineConfig::default();

        assert!((config.tracking.confidence.get(DetectionClass::BreakerFace) - 0.5).abs() < 1e-6);
        assert!((config.tracking.iou.get(DetectionClass::TextRoi) - 0.5).abs() < 1e-6);
        assert_eq!(config.tracking.stale_frames, 30);
        assert_eq!(config.tracking.cooldown_frames, 30);
        assert_eq!(config.tracking.fuzzy_distance, 2);

        assert_eq!(config.recognition.dwell_frames, 5);
        assert_eq!(config.recognition.max_concurrent, 2);

        assert_eq!(config.confirmation.timeout(), Duration::from_secs(30));
        assert!(config.confirmation.poll_interval() <= Duration::from_secs(5));
        assert_eq!(config.confirmation.mode, CaptureMode::All);
    }

    #[test]
    fn test_defaults_survive_clamping() {
        let config = EngineConfig::default();
        assert_eq!(config.clone().clamped(), config);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut config = EngineConfig::default();
        config.tracking.confidence.set(DetectionClass::PanelLabel, 1.7);
        config.tracking.iou.set(DetectionClass::BreakerFace, -0.2);
        config.tracking.stale_frames = 0;
        config.recognition.dwell_frames = 0;
        config.recognition.ocr_confidence = f32::NAN;
        config.recognition.max_concurrent = 0;
        config.confirmation.timeout_secs = -5.0;
        config.confirmation.poll_interval_ms = 60_000;

        let config = config.clamped();
        assert_eq!(config.tracking.confidence.panel_label, 1.0);
        assert!((config.tracking.iou.breaker_face - 0.01).abs() < 1e-6);
        assert_eq!(config.tracking.stale_frames, 1);
        assert_eq!(config.recognition.dwell_frames, 1);
        assert!((config.recognition.ocr_confidence - 0.5).abs() < 1e-6);
        assert_eq!(config.recognition.max_concurrent, 1);
        assert!((config.confirmation.timeout_secs - 1.0).abs() < 1e-6);
        assert_eq!(config.confirmation.poll_interval_ms, 5000);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = EngineConfig::default();
        config.confirmation.mode = CaptureMode::LabelOnly;
        config.recognition.dwell_frames = 8;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: EngineConfig = toml::from_str(
            r#"
            [recognition]
            dwell_frames = 3

            [confirmation]
            mode = "label_only"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.recognition.dwell_frames, 3);
        assert_eq!(parsed.recognition.max_concurrent, 2);
        assert_eq!(parsed.confirmation.mode, CaptureMode::LabelOnly);
        assert_eq!(parsed.tracking, TrackingSettings::default());
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = EngineConfig::default();
        config.tracking.cooldown_frames = 12;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.tracking.cooldown_frames, 12);
    }

    #[test]
    fn test_load_config_clamps() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[recognition]\nmax_concurrent = 500").unwrap();

        let loaded = load_config(temp_file.path()).unwrap();
        assert_eq!(loaded.recognition.max_concurrent, 16);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
