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

use crate::alerts::{AckOutcome, Alert, AlertDeltas, AlertEngine};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::sample::{SignalSample, SubjectId};
use crate::score::ScoreCalculator;
use crate::session::{SessionAggregator, SessionSummary};
use crate::status::{ScoredState, StatusClassifier};
use crate::window::SlidingWindowStore;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of one ingestion call: the freshly computed state plus the alerts
/// that opened or cleared because of it.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub scored: ScoredState,
    pub alerts: AlertDeltas,
}

/// Everything owned exclusively by one subject's processing lane. The lane
/// mutex serializes submissions per subject; different subjects never
/// contend on it.
struct SubjectLane {
    window: SlidingWindowStore,
    alerts: AlertEngine,
    session: SessionAggregator,
    last_scored: Option<ScoredState>,
    last_activity: DateTime<Utc>,
}

impl SubjectLane {
    fn new(subject_id: &str, first_sample_at: DateTime<Utc>, config: &EngineConfig) -> Self {
        let session_id = Uuid::new_v4();
        info!(
            subject = %subject_id,
            session = %session_id,
            "tracking new subject"
        );
        Self {
            window: SlidingWindowStore::new(config.window_seconds),
            alerts: AlertEngine::new(subject_id, config),
            session: SessionAggregator::new(
                session_id,
                subject_id,
                first_sample_at,
                config.max_gap_seconds,
            ),
            last_scored: None,
            last_activity: Utc::now(),
        }
    }
}

/// Routing layer over the per-subject lanes. Lanes are created lazily on
/// first submit, discarded on idle eviction or explicit removal, and a
/// submit that races a removal simply recreates fresh state.
pub struct EngineCoordinator {
    config: EngineConfig,
    scorer: ScoreCalculator,
    classifier: StatusClassifier,
    lanes: DashMap<SubjectId, Arc<Mutex<SubjectLane>>>,
    malformed_samples: AtomicU64,
    out_of_order_samples: AtomicU64,
}

impl EngineCoordinator {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let config = config.validated()?;
        Ok(Self {
            scorer: ScoreCalculator::new(&config),
            classifier: StatusClassifier::new(&config),
            config,
            lanes: DashMap::new(),
            malformed_samples: AtomicU64::new(0),
            out_of_order_samples: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Primary ingestion call. Per-sample errors are local: a rejected
    /// sample leaves the subject's window untouched and never affects other
    /// subjects.
    pub fn submit(&self, sample: SignalSample) -> EngineResult<SubmitOutcome> {
        if let Err(err) = sample.validate() {
            self.malformed_samples.fetch_add(1, Ordering::Relaxed);
            warn!(error = %err, "rejected malformed sample");
            return Err(err);
        }

        let subject_id = sample.subject_id.clone();
        let emotion = sample.emotion();

        // Clone the Arc out of the map entry so the shard lock is released
        // before the lane is locked; submissions for other subjects on the
        // same shard must not wait for this subject's scoring.
        let lane = self
            .lanes
            .entry(subject_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SubjectLane::new(
                    &subject_id,
                    sample.timestamp,
                    &self.config,
                )))
            })
            .clone();
        let mut lane = lane.lock();
        lane.last_activity = Utc::now();

        let scored = {
            let snapshot = match lane.window.insert(sample) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    self.out_of_order_samples.fetch_add(1, Ordering::Relaxed);
                    warn!(subject = %subject_id, error = %err, "rejected sample");
                    return Err(err);
                }
            };
            let breakdown = self.scorer.compute(&snapshot);
            let status = self.classifier.classify(
                breakdown.attention_score,
                snapshot.face_absence_secs,
                snapshot.neutral_run_secs,
            );
            ScoredState {
                subject_id: subject_id.clone(),
                timestamp: snapshot.as_of,
                attention_score: breakdown.attention_score,
                breakdown,
                status,
                is_face_absent_long: self.classifier.is_face_absent_long(snapshot.face_absence_secs),
                is_neutral_long: self.classifier.is_neutral_long(snapshot.neutral_run_secs),
                blink_rate_per_minute: snapshot.blink_rate_per_minute(),
            }
        };

        let alerts = lane.alerts.evaluate(&scored);
        lane.session.observe(&scored, emotion);
        lane.session.record_alerts(&alerts);
        lane.last_scored = Some(scored.clone());

        debug!(
            subject = %subject_id,
            score = scored.attention_score,
            status = %scored.status,
            opened = alerts.opened.len(),
            cleared = alerts.cleared.len(),
            "sample scored"
        );

        Ok(SubmitOutcome { scored, alerts })
    }

    /// Latest scored state per tracked subject, for dashboard polling.
    pub fn snapshot_all(&self) -> HashMap<SubjectId, ScoredState> {
        self.lanes
            .iter()
            .filter_map(|entry| {
                let lane = entry.value().lock();
                lane.last_scored
                    .clone()
                    .map(|scored| (entry.key().clone(), scored))
            })
            .collect()
    }

    /// Open alerts across all subjects, ordered by opened_at ascending.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .lanes
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .lock()
                    .alerts
                    .open_alerts()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        alerts.sort_by_key(|alert| alert.opened_at);
        alerts
    }

    /// Removes the alert from the active set immediately. Acknowledging an
    /// already-resolved alert is a no-op success; an id no lane has ever
    /// seen is NotFound.
    pub fn acknowledge(&self, alert_id: Uuid) -> EngineResult<()> {
        for entry in self.lanes.iter() {
            match entry.value().lock().alerts.acknowledge(alert_id) {
                AckOutcome::Acknowledged => {
                    info!(subject = %entry.key(), alert_id = %alert_id, "alert acknowledged");
                    return Ok(());
                }
                AckOutcome::AlreadyResolved => return Ok(()),
                AckOutcome::Unknown => {}
            }
        }
        Err(EngineError::UnknownAlert(alert_id))
    }

    pub fn session_id(&self, subject_id: &str) -> EngineResult<Uuid> {
        let lane = self
            .lanes
            .get(subject_id)
            .ok_or_else(|| EngineError::UnknownSubject(subject_id.to_string()))?;
        let lane = lane.value().lock();
        Ok(lane.session.session_id())
    }

    pub fn summary(&self, subject_id: &str, session_id: Uuid) -> EngineResult<SessionSummary> {
        let lane = self
            .lanes
            .get(subject_id)
            .ok_or_else(|| EngineError::UnknownSubject(subject_id.to_string()))?;
        let lane = lane.value().lock();
        if lane.session.session_id() != session_id {
            return Err(EngineError::UnknownSession {
                subject: subject_id.to_string(),
                session: session_id,
            });
        }
        Ok(lane.session.summary())
    }

    /// Explicit removal, e.g. a student logging out. Safe to call while a
    /// submit for the same subject is in flight: an in-flight submit
    /// finishes on the detached lane, and any later submit recreates fresh
    /// state rather than erroring.
    pub fn remove_subject(&self, subject_id: &str) -> bool {
        match self.lanes.remove(subject_id) {
            Some((_, lane)) => {
                let open = lane.lock().alerts.open_count();
                info!(subject = %subject_id, open_alerts = open, "subject removed from tracking");
                true
            }
            None => false,
        }
    }

    /// Periodic sweep dropping subjects with no samples for the configured
    /// idle period. Locking each lane keeps the sweep from evicting a
    /// subject mid-update.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> Vec<SubjectId> {
        let idle = Duration::seconds(self.config.idle_eviction_seconds as i64);
        let mut evicted = Vec::new();
        self.lanes.retain(|subject_id, lane| {
            let keep = now - lane.lock().last_activity <= idle;
            if !keep {
                info!(subject = %subject_id, "evicting idle subject");
                evicted.push(subject_id.clone());
            }
            keep
        });
        evicted
    }

    pub fn active_subject_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn malformed_sample_count(&self) -> u64 {
        self.malformed_samples.load(Ordering::Relaxed)
    }

    pub fn out_of_order_sample_count(&self) -> u64 {
        self.out_of_order_samples.load(Ordering::Relaxed)
    }
}
