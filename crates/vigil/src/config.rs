// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Relative contribution of each sub-score to the composite attention score.
/// Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub face_detection: f64,
    pub head_pose: f64,
    pub gaze: f64,
    pub emotion: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            face_detection: 0.30,
            head_pose: 0.25,
            gaze: 0.25,
            emotion: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.face_detection + self.head_pose + self.gaze + self.emotion
    }
}

/// Lower edges of the score-driven status bands. Lower edges are inclusive,
/// so a score exactly on a boundary lands in the higher band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusBands {
    pub attentive_min: f64,
    pub partially_attentive_min: f64,
    pub distracted_min: f64,
}

impl Default for StatusBands {
    fn default() -> Self {
        Self {
            attentive_min: 80.0,
            partially_attentive_min: 50.0,
            distracted_min: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Long window retained per subject, also the prolonged-neutral threshold.
    pub window_seconds: u64,
    /// Recent view used for head-pose and gaze scoring.
    pub recent_seconds: u64,
    pub face_absence_threshold_seconds: u64,
    pub head_turn_threshold_degrees: f64,
    /// Eye-aspect-ratio boundary below which an eye counts as closed, when
    /// the perceptual layer delivers raw ratios instead of open/closed flags.
    pub blink_ear_threshold: f64,
    pub low_attention_threshold: f64,
    pub weights: ScoreWeights,
    pub bands: StatusBands,
    /// Subjects with no samples for this long are dropped from tracking.
    pub idle_eviction_seconds: u64,
    /// Cap on the per-sample weight used by the time-weighted session
    /// average, so one sample after a long disconnect cannot dominate.
    pub max_gap_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_seconds: 300,
            recent_seconds: 10,
            face_absence_threshold_seconds: 30,
            head_turn_threshold_degrees: 30.0,
            blink_ear_threshold: 0.3,
            low_attention_threshold: 30.0,
            weights: ScoreWeights::default(),
            bands: StatusBands::default(),
            idle_eviction_seconds: 600,
            max_gap_seconds: 10,
        }
    }
}

impl EngineConfig {
    pub fn validated(self) -> EngineResult<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.window_seconds == 0 {
            return Err(invalid("window_seconds must be positive"));
        }
        if self.recent_seconds == 0 || self.recent_seconds > self.window_seconds {
            return Err(invalid(
                "recent_seconds must be positive and no longer than window_seconds",
            ));
        }
        if self.face_absence_threshold_seconds == 0 {
            return Err(invalid("face_absence_threshold_seconds must be positive"));
        }
        if self.head_turn_threshold_degrees <= 0.0 {
            return Err(invalid("head_turn_threshold_degrees must be positive"));
        }
        if !(0.0..=1.0).contains(&self.blink_ear_threshold) || self.blink_ear_threshold == 0.0 {
            return Err(invalid("blink_ear_threshold must be in (0, 1]"));
        }
        if self.low_attention_threshold <= 0.0 || self.low_attention_threshold >= 100.0 {
            return Err(invalid("low_attention_threshold must be in (0, 100)"));
        }
        if self.idle_eviction_seconds == 0 {
            return Err(invalid("idle_eviction_seconds must be positive"));
        }
        if self.max_gap_seconds == 0 {
            return Err(invalid("max_gap_seconds must be positive"));
        }

        let w = &self.weights;
        for (name, value) in [
            ("weights.face_detection", w.face_detection),
            ("weights.head_pose", w.head_pose),
            ("weights.gaze", w.gaze),
            ("weights.emotion", w.emotion),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(&format!("{name} must be in [0, 1]")));
            }
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(&format!(
                "score weights must sum to 1.0, got {:.6}",
                w.sum()
            )));
        }

        let b = &self.bands;
        let ordered = 0.0 < b.distracted_min
            && b.distracted_min < b.partially_attentive_min
            && b.partially_attentive_min < b.attentive_min
            && b.attentive_min <= 100.0;
        if !ordered {
            return Err(invalid(
                "status bands must satisfy 0 < distracted < partially_attentive < attentive <= 100",
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validated()
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

fn invalid(reason: &str) -> EngineError {
    EngineError::InvalidConfiguration {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let mut config = EngineConfig::default();
        config.weights.emotion = 0.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration { .. }));
    }

    #[test]
    fn rejects_zero_window() {
        let config = EngineConfig {
            window_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unordered_bands() {
        let mut config = EngineConfig::default();
        config.bands.distracted_min = 90.0;
        assert!(config.validate().is_err());
    }
}
