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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SubjectId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeDirection {
    Left,
    Center,
    Right,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    Surprise,
    Fear,
    Disgust,
    Neutral,
    None,
}

impl EmotionLabel {
    /// Neutral and unclassified frames both feed the prolonged-neutral run.
    pub fn is_neutral_or_none(self) -> bool {
        matches!(self, EmotionLabel::Neutral | EmotionLabel::None)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeadPose {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Eye openness, either as classifier flags or as raw eye-aspect ratios.
/// When only ratios are present, openness is resolved against the configured
/// EAR threshold.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EyeState {
    pub left_open: Option<bool>,
    pub right_open: Option<bool>,
    pub left_ear: Option<f64>,
    pub right_ear: Option<f64>,
}

impl EyeState {
    pub fn left_is_open(&self, ear_threshold: f64) -> Option<bool> {
        self.left_open
            .or_else(|| self.left_ear.map(|ear| ear > ear_threshold))
    }

    pub fn right_is_open(&self, ear_threshold: f64) -> Option<bool> {
        self.right_open
            .or_else(|| self.right_ear.map(|ear| ear > ear_threshold))
    }

    /// True only when at least one eye is known to be closed. Missing data is
    /// not treated as closure.
    pub fn any_closed(&self, ear_threshold: f64) -> bool {
        self.left_is_open(ear_threshold) == Some(false)
            || self.right_is_open(ear_threshold) == Some(false)
    }
}

/// Everything the perceptual layer derives from a detected face. The struct
/// only exists when a face was present in the frame, so downstream code can
/// never confuse "no signal" with "signal at zero".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSignals {
    pub detection_confidence: f64,
    pub head_pose: Option<HeadPose>,
    pub gaze: GazeDirection,
    pub eyes: Option<EyeState>,
    pub blink_detected: bool,
    pub emotion: EmotionLabel,
    pub emotion_confidence: f64,
    pub face_quality: f64,
}

/// One frame's worth of measurements for one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSample {
    pub subject_id: SubjectId,
    pub timestamp: DateTime<Utc>,
    pub face: Option<FaceSignals>,
}

impl SignalSample {
    pub fn absent(subject_id: impl Into<SubjectId>, timestamp: DateTime<Utc>) -> Self {
        Self {
            subject_id: subject_id.into(),
            timestamp,
            face: None,
        }
    }

    pub fn with_face(
        subject_id: impl Into<SubjectId>,
        timestamp: DateTime<Utc>,
        face: FaceSignals,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            timestamp,
            face: Some(face),
        }
    }

    pub fn face_present(&self) -> bool {
        self.face.is_some()
    }

    pub fn emotion(&self) -> Option<EmotionLabel> {
        self.face.as_ref().map(|f| f.emotion)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.subject_id.trim().is_empty() {
            return Err(malformed("subject id is empty"));
        }
        if let Some(face) = &self.face {
            for (name, value) in [
                ("detection_confidence", face.detection_confidence),
                ("emotion_confidence", face.emotion_confidence),
                ("face_quality", face.face_quality),
            ] {
                if !(0.0..=1.0).contains(&value) || value.is_nan() {
                    return Err(malformed(&format!("{name} out of range: {value}")));
                }
            }
            if let Some(pose) = &face.head_pose {
                if pose.pitch.is_nan() || pose.yaw.is_nan() || pose.roll.is_nan() {
                    return Err(malformed("head pose contains NaN"));
                }
            }
        }
        Ok(())
    }
}

fn malformed(reason: &str) -> EngineError {
    EngineError::MalformedSample {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_sample_has_no_face_signals() {
        let sample = SignalSample::absent("s1", Utc::now());
        assert!(!sample.face_present());
        assert!(sample.emotion().is_none());
        assert!(sample.validate().is_ok());
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let face = FaceSignals {
            detection_confidence: 1.5,
            head_pose: None,
            gaze: GazeDirection::Center,
            eyes: None,
            blink_detected: false,
            emotion: EmotionLabel::Neutral,
            emotion_confidence: 0.9,
            face_quality: 0.8,
        };
        let sample = SignalSample::with_face("s1", Utc::now(), face);
        assert!(matches!(
            sample.validate(),
            Err(EngineError::MalformedSample { .. })
        ));
    }

    #[test]
    fn eye_openness_falls_back_to_ear_ratio() {
        let eyes = EyeState {
            left_open: None,
            right_open: None,
            left_ear: Some(0.1),
            right_ear: Some(0.4),
        };
        assert_eq!(eyes.left_is_open(0.3), Some(false));
        assert_eq!(eyes.right_is_open(0.3), Some(true));
        assert!(eyes.any_closed(0.3));
    }
}
