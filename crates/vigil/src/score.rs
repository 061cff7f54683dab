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

use crate::config::{EngineConfig, ScoreWeights};
use crate::sample::EmotionLabel;
use crate::window::WindowSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub face_detection_rate: f64,
    pub head_pose_score: f64,
    pub gaze_score: f64,
    pub emotion_engagement: f64,
    pub attention_score: f64,
}

/// Pure mapping from a window snapshot to the composite attention score.
/// Identical window contents always yield identical output; the only clock
/// involved is the sample timestamps themselves.
pub struct ScoreCalculator {
    weights: ScoreWeights,
    head_turn_threshold: f64,
    blink_ear_threshold: f64,
    recent_seconds: u64,
}

impl ScoreCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            weights: config.weights,
            head_turn_threshold: config.head_turn_threshold_degrees,
            blink_ear_threshold: config.blink_ear_threshold,
            recent_seconds: config.recent_seconds,
        }
    }

    pub fn compute(&self, snapshot: &WindowSnapshot<'_>) -> ScoreBreakdown {
        let face_detection_rate = self.face_detection_rate(snapshot);
        let head_pose_score = self.head_pose_score(snapshot);
        let gaze_score = self.gaze_score(snapshot);
        let emotion_engagement = self.emotion_engagement(snapshot);

        let attention_score = clamp(
            self.weights.face_detection * face_detection_rate
                + self.weights.head_pose * head_pose_score
                + self.weights.gaze * gaze_score
                + self.weights.emotion * emotion_engagement,
        );

        ScoreBreakdown {
            face_detection_rate,
            head_pose_score,
            gaze_score,
            emotion_engagement,
            attention_score,
        }
    }

    fn face_detection_rate(&self, snapshot: &WindowSnapshot<'_>) -> f64 {
        let total = snapshot.len();
        if total == 0 {
            return 0.0;
        }
        let present = snapshot.samples().filter(|s| s.face_present()).count();
        clamp(present as f64 / total as f64 * 100.0)
    }

    /// Penalty grows with the fraction of recent frames turned past the
    /// threshold. Frames without pose data count toward the denominator but
    /// never the numerator, so absence is not penalized twice.
    fn head_pose_score(&self, snapshot: &WindowSnapshot<'_>) -> f64 {
        let mut total = 0usize;
        let mut turned = 0usize;
        for sample in snapshot.recent(self.recent_seconds) {
            total += 1;
            if let Some(pose) = sample.face.as_ref().and_then(|f| f.head_pose) {
                if pose.yaw.abs() > self.head_turn_threshold
                    || pose.pitch.abs() > self.head_turn_threshold
                {
                    turned += 1;
                }
            }
        }
        if total == 0 {
            return 100.0;
        }
        clamp(100.0 - 100.0 * turned as f64 / total as f64)
    }

    /// Off-center gaze and sustained eye closure are penalized; a frame
    /// flagged as a blink is not a closure.
    fn gaze_score(&self, snapshot: &WindowSnapshot<'_>) -> f64 {
        let mut total = 0usize;
        let mut off = 0usize;
        for sample in snapshot.recent(self.recent_seconds) {
            total += 1;
            let Some(face) = sample.face.as_ref() else {
                continue;
            };
            let off_center = face.gaze != crate::sample::GazeDirection::Center;
            let closed = !face.blink_detected
                && face
                    .eyes
                    .map(|eyes| eyes.any_closed(self.blink_ear_threshold))
                    .unwrap_or(false);
            if off_center || closed {
                off += 1;
            }
        }
        if total == 0 {
            return 100.0;
        }
        clamp(100.0 - 100.0 * off as f64 / total as f64)
    }

    /// Confidence-weighted engagement value of the emotions seen over the
    /// long window. A window with no emotion-bearing frames scores zero;
    /// absence is already the dominant signal in that state.
    fn emotion_engagement(&self, snapshot: &WindowSnapshot<'_>) -> f64 {
        let mut weighted = 0.0;
        let mut confidence_total = 0.0;
        for sample in snapshot.samples() {
            if let Some(face) = sample.face.as_ref() {
                weighted += engagement_value(face.emotion) * face.emotion_confidence;
                confidence_total += face.emotion_confidence;
            }
        }
        if confidence_total <= 0.0 {
            return 0.0;
        }
        clamp(weighted / confidence_total * 100.0)
    }
}

pub fn engagement_value(emotion: EmotionLabel) -> f64 {
    match emotion {
        EmotionLabel::Happy => 1.0,
        EmotionLabel::Surprise => 0.8,
        EmotionLabel::Neutral => 0.5,
        EmotionLabel::Sad => 0.2,
        EmotionLabel::Angry | EmotionLabel::Fear | EmotionLabel::Disgust => 0.1,
        EmotionLabel::None => 0.0,
    }
}

fn clamp(value: f64) -> f64 {
    value.max(0.0).min(100.0)
}
