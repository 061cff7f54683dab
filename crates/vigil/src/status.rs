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

use crate::config::{EngineConfig, StatusBands};
use crate::score::ScoreBreakdown;
use crate::sample::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttentionStatus {
    Attentive,
    PartiallyAttentive,
    Distracted,
    Inattentive,
    Absent,
    LowEngagement,
}

impl AttentionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionStatus::Attentive => "Attentive",
            AttentionStatus::PartiallyAttentive => "Partially Attentive",
            AttentionStatus::Distracted => "Distracted",
            AttentionStatus::Inattentive => "Inattentive",
            AttentionStatus::Absent => "Absent / Disengaged",
            AttentionStatus::LowEngagement => "Low Engagement",
        }
    }
}

impl std::fmt::Display for AttentionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered precedence: prolonged absence beats prolonged neutrality, and
/// both beat the score bands. Re-evaluated from the current snapshot on
/// every sample, so neither override is sticky.
pub struct StatusClassifier {
    bands: StatusBands,
    face_absence_threshold_secs: f64,
    neutral_threshold_secs: f64,
}

impl StatusClassifier {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            bands: config.bands,
            face_absence_threshold_secs: config.face_absence_threshold_seconds as f64,
            neutral_threshold_secs: config.window_seconds as f64,
        }
    }

    pub fn classify(
        &self,
        attention_score: f64,
        face_absence_secs: f64,
        neutral_run_secs: f64,
    ) -> AttentionStatus {
        if face_absence_secs > self.face_absence_threshold_secs {
            return AttentionStatus::Absent;
        }
        if neutral_run_secs > self.neutral_threshold_secs {
            return AttentionStatus::LowEngagement;
        }
        self.band(attention_score)
    }

    /// Lower edges inclusive; a score exactly on a boundary takes the
    /// higher band.
    pub fn band(&self, score: f64) -> AttentionStatus {
        if score >= self.bands.attentive_min {
            AttentionStatus::Attentive
        } else if score >= self.bands.partially_attentive_min {
            AttentionStatus::PartiallyAttentive
        } else if score >= self.bands.distracted_min {
            AttentionStatus::Distracted
        } else {
            AttentionStatus::Inattentive
        }
    }

    pub fn is_face_absent_long(&self, face_absence_secs: f64) -> bool {
        face_absence_secs > self.face_absence_threshold_secs
    }

    pub fn is_neutral_long(&self, neutral_run_secs: f64) -> bool {
        neutral_run_secs > self.neutral_threshold_secs
    }
}

/// Derived per-sample output: score, sub-scores, classified status and the
/// duration flags that drove any override. Superseded, never mutated, by the
/// next sample's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredState {
    pub subject_id: SubjectId,
    pub timestamp: DateTime<Utc>,
    pub attention_score: f64,
    pub breakdown: ScoreBreakdown,
    pub status: AttentionStatus,
    pub is_face_absent_long: bool,
    pub is_neutral_long: bool,
    pub blink_rate_per_minute: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> StatusClassifier {
        StatusClassifier::new(&EngineConfig::default())
    }

    #[test]
    fn boundary_scores_take_the_higher_band() {
        let c = classifier();
        assert_eq!(c.band(80.0), AttentionStatus::Attentive);
        assert_eq!(c.band(79.999), AttentionStatus::PartiallyAttentive);
        assert_eq!(c.band(50.0), AttentionStatus::PartiallyAttentive);
        assert_eq!(c.band(20.0), AttentionStatus::Distracted);
        assert_eq!(c.band(19.999), AttentionStatus::Inattentive);
        assert_eq!(c.band(0.0), AttentionStatus::Inattentive);
        assert_eq!(c.band(100.0), AttentionStatus::Attentive);
    }

    #[test]
    fn absence_overrides_everything() {
        let c = classifier();
        assert_eq!(c.classify(95.0, 31.0, 400.0), AttentionStatus::Absent);
    }

    #[test]
    fn prolonged_neutral_overrides_bands_but_not_absence() {
        let c = classifier();
        assert_eq!(c.classify(95.0, 0.0, 301.0), AttentionStatus::LowEngagement);
        assert_eq!(c.classify(95.0, 0.0, 300.0), AttentionStatus::Attentive);
    }

    #[test]
    fn absence_at_exact_threshold_is_not_absent() {
        let c = classifier();
        assert_eq!(c.classify(95.0, 30.0, 0.0), AttentionStatus::Attentive);
    }
}
