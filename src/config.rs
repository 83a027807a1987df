use serde::Deserialize;
use std::fs;

use crate::error::{ConfigError, ConfigResult};

/// Tunables for one processing session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OCR confidence must be strictly above this for a read to count
    pub min_ocr_confidence: f64,
    /// Fraction of equal character positions that makes two plates one vehicle
    pub similarity_threshold: f64,
    /// Accepted samples needed before a speed is reported as final
    pub min_speed_samples: usize,
    /// Most recent samples kept per vehicle
    pub speed_window: usize,
    /// Tukey fence width, in interquartile ranges
    pub iqr_multiplier: f64,
    pub min_plausible_kmh: f64,
    pub max_plausible_kmh: f64,
    /// Video frame rate, frames per second
    pub fps: f64,
    /// Real-world metres covered by one pixel of image displacement
    pub meters_per_pixel: f64,
    /// Fewer tracked feature points than this falls back to centroid motion
    pub min_flow_points: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_ocr_confidence: 0.5,
            similarity_threshold: 0.8,
            min_speed_samples: 3,
            speed_window: 5,
            iqr_multiplier: 1.5,
            min_plausible_kmh: 0.0,
            max_plausible_kmh: 200.0,
            fps: 30.0,
            meters_per_pixel: 30.0 / 200.0,
            min_flow_points: 6,
        }
    }
}

impl Config {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every tunable is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.min_ocr_confidence >= 0.0 && self.min_ocr_confidence < 1.0) {
            return Err(ConfigError::OcrConfidence(self.min_ocr_confidence));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::SimilarityThreshold(self.similarity_threshold));
        }
        for (name, value) in [
            ("min_speed_samples", self.min_speed_samples),
            ("speed_window", self.speed_window),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroCount { name, value });
            }
        }
        for (name, value) in [("fps", self.fps), ("meters_per_pixel", self.meters_per_pixel)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        if !(self.iqr_multiplier >= 0.0) {
            return Err(ConfigError::IqrMultiplier(self.iqr_multiplier));
        }
        if !(self.min_plausible_kmh < self.max_plausible_kmh) {
            return Err(ConfigError::EmptySpeedBand {
                min: self.min_plausible_kmh,
                max: self.max_plausible_kmh,
            });
        }
        Ok(())
    }

    /// Frame interval in seconds.
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps
    }

    /// Replace the calibration constant from a known distance and the
    /// number of pixels it spans in the image.
    pub fn calibrate_with_reference(&mut self, distance_m: f64, pixels: f64) -> ConfigResult<()> {
        if !(distance_m.is_finite() && distance_m > 0.0) {
            return Err(ConfigError::NotPositive { name: "reference distance", value: distance_m });
        }
        if !(pixels.is_finite() && pixels > 0.0) {
            return Err(ConfigError::NotPositive { name: "reference pixels", value: pixels });
        }
        self.meters_per_pixel = distance_m / pixels;
        tracing::info!("Calibrated: {:.4} meters per pixel", self.meters_per_pixel);
        Ok(())
    }
}
