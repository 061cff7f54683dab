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

use crate::config::EngineConfig;
use crate::status::{AttentionStatus, ScoredState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowAttention,
    FaceAbsent,
    Distracted,
}

impl AlertKind {
    pub const ALL: [AlertKind; 3] = [
        AlertKind::LowAttention,
        AlertKind::FaceAbsent,
        AlertKind::Distracted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowAttention => "low_attention",
            AlertKind::FaceAbsent => "face_absent",
            AlertKind::Distracted => "distracted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub subject_id: String,
    pub kind: AlertKind,
    pub opened_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Alerts opened and cleared by one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct AlertDeltas {
    pub opened: Vec<Alert>,
    pub cleared: Vec<Alert>,
}

impl AlertDeltas {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.cleared.is_empty()
    }
}

pub(crate) enum AckOutcome {
    Acknowledged,
    AlreadyResolved,
    Unknown,
}

/// Per-subject alert state machine. At most one open alert per kind; while
/// the condition holds the open alert is refreshed, never duplicated. A
/// cleared or acknowledged alert leaves the active set, and a later
/// re-trigger opens a fresh alert with a new id.
pub struct AlertEngine {
    subject_id: String,
    low_attention_threshold: f64,
    open: HashMap<AlertKind, Alert>,
    resolved: HashSet<Uuid>,
}

impl AlertEngine {
    pub fn new(subject_id: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            subject_id: subject_id.into(),
            low_attention_threshold: config.low_attention_threshold,
            open: HashMap::new(),
            resolved: HashSet::new(),
        }
    }

    pub fn evaluate(&mut self, state: &ScoredState) -> AlertDeltas {
        let mut deltas = AlertDeltas::default();
        for kind in AlertKind::ALL {
            if self.triggered(kind, state) {
                match self.open.get_mut(&kind) {
                    Some(alert) => alert.last_seen_at = state.timestamp,
                    None => {
                        let alert = Alert {
                            id: Uuid::new_v4(),
                            subject_id: self.subject_id.clone(),
                            kind,
                            opened_at: state.timestamp,
                            last_seen_at: state.timestamp,
                            acknowledged: false,
                            acknowledged_at: None,
                        };
                        debug!(
                            subject = %self.subject_id,
                            kind = kind.as_str(),
                            alert_id = %alert.id,
                            "alert opened"
                        );
                        self.open.insert(kind, alert.clone());
                        deltas.opened.push(alert);
                    }
                }
            } else if let Some(alert) = self.open.remove(&kind) {
                debug!(
                    subject = %self.subject_id,
                    kind = kind.as_str(),
                    alert_id = %alert.id,
                    "alert cleared"
                );
                self.resolved.insert(alert.id);
                deltas.cleared.push(alert);
            }
        }
        deltas
    }

    fn triggered(&self, kind: AlertKind, state: &ScoredState) -> bool {
        match kind {
            AlertKind::LowAttention => state.attention_score < self.low_attention_threshold,
            AlertKind::FaceAbsent => state.is_face_absent_long,
            AlertKind::Distracted => matches!(
                state.status,
                AttentionStatus::Distracted | AttentionStatus::Inattentive
            ),
        }
    }

    /// Acknowledging silences the alert immediately; it does not suppress
    /// recurrence. Repeat acknowledgments of a resolved id are no-ops.
    pub(crate) fn acknowledge(&mut self, alert_id: Uuid) -> AckOutcome {
        let kind = self
            .open
            .iter()
            .find(|(_, alert)| alert.id == alert_id)
            .map(|(kind, _)| *kind);
        if let Some(mut alert) = kind.and_then(|kind| self.open.remove(&kind)) {
            alert.acknowledged = true;
            alert.acknowledged_at = Some(Utc::now());
            self.resolved.insert(alert.id);
            return AckOutcome::Acknowledged;
        }
        if self.resolved.contains(&alert_id) {
            AckOutcome::AlreadyResolved
        } else {
            AckOutcome::Unknown
        }
    }

    pub fn open_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.open.values()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
