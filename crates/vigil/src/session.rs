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

use crate::alerts::{AlertDeltas, AlertKind};
use crate::sample::{EmotionLabel, SubjectId};
use crate::status::{AttentionStatus, ScoredState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub subject_id: SubjectId,
    pub started_at: DateTime<Utc>,
    pub last_sample_at: Option<DateTime<Utc>>,
    pub sample_count: u64,
    pub face_time_seconds: f64,
    pub average_attention: f64,
    pub status_seconds: HashMap<AttentionStatus, f64>,
    pub emotion_counts: HashMap<EmotionLabel, u64>,
    pub alert_counts: HashMap<AlertKind, u64>,
}

/// Folds scored states in arrival order into running session statistics.
/// The per-sample weight is the gap to the previous sample, capped so one
/// sample after a long disconnect cannot dominate the average.
pub struct SessionAggregator {
    session_id: Uuid,
    subject_id: SubjectId,
    started_at: DateTime<Utc>,
    max_gap_secs: f64,
    sample_count: u64,
    face_time_secs: f64,
    weighted_score_sum: f64,
    weight_total: f64,
    last_score: f64,
    last_timestamp: Option<DateTime<Utc>>,
    status_seconds: HashMap<AttentionStatus, f64>,
    emotion_counts: HashMap<EmotionLabel, u64>,
    alert_counts: HashMap<AlertKind, u64>,
}

impl SessionAggregator {
    pub fn new(
        session_id: Uuid,
        subject_id: impl Into<SubjectId>,
        started_at: DateTime<Utc>,
        max_gap_seconds: u64,
    ) -> Self {
        Self {
            session_id,
            subject_id: subject_id.into(),
            started_at,
            max_gap_secs: max_gap_seconds as f64,
            sample_count: 0,
            face_time_secs: 0.0,
            weighted_score_sum: 0.0,
            weight_total: 0.0,
            last_score: 0.0,
            last_timestamp: None,
            status_seconds: HashMap::new(),
            emotion_counts: HashMap::new(),
            alert_counts: HashMap::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn observe(&mut self, state: &ScoredState, emotion: Option<EmotionLabel>) {
        let gap = self
            .last_timestamp
            .map(|prev| (state.timestamp - prev).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0)
            .clamp(0.0, self.max_gap_secs);

        self.weighted_score_sum += state.attention_score * gap;
        self.weight_total += gap;
        *self.status_seconds.entry(state.status).or_insert(0.0) += gap;
        if let Some(emotion) = emotion {
            self.face_time_secs += gap;
            *self.emotion_counts.entry(emotion).or_insert(0) += 1;
        }

        self.sample_count += 1;
        self.last_score = state.attention_score;
        self.last_timestamp = Some(state.timestamp);
    }

    pub fn record_alerts(&mut self, deltas: &AlertDeltas) {
        for alert in &deltas.opened {
            *self.alert_counts.entry(alert.kind).or_insert(0) += 1;
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let average_attention = if self.weight_total > 0.0 {
            self.weighted_score_sum / self.weight_total
        } else {
            self.last_score
        };
        SessionSummary {
            session_id: self.session_id,
            subject_id: self.subject_id.clone(),
            started_at: self.started_at,
            last_sample_at: self.last_timestamp,
            sample_count: self.sample_count,
            face_time_seconds: self.face_time_secs,
            average_attention,
            status_seconds: self.status_seconds.clone(),
            emotion_counts: self.emotion_counts.clone(),
            alert_counts: self.alert_counts.clone(),
        }
    }
}
