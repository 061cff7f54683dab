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

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use vigil::{
    EmotionLabel, EngineConfig, EngineCoordinator, EngineError, FaceSignals, GazeDirection,
    SignalSample,
};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn face() -> FaceSignals {
    FaceSignals {
        detection_confidence: 0.9,
        head_pose: None,
        gaze: GazeDirection::Center,
        eyes: None,
        blink_detected: false,
        emotion: EmotionLabel::Happy,
        emotion_confidence: 0.8,
        face_quality: 0.7,
    }
}

#[test]
fn subjects_process_independently_across_threads() {
    let engine = Arc::new(EngineCoordinator::new(EngineConfig::default()).unwrap());

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                let subject = format!("student-{worker}");
                for secs in 0..100 {
                    engine
                        .submit(SignalSample::with_face(subject.as_str(), ts(secs), face()))
                        .unwrap();
                }
            });
        }
    });

    let snapshot = engine.snapshot_all();
    assert_eq!(snapshot.len(), 8);
    for worker in 0..8 {
        let scored = &snapshot[&format!("student-{worker}")];
        assert_eq!(scored.timestamp, ts(99));
        assert_eq!(scored.attention_score, 100.0);
    }
}

#[test]
fn removal_races_with_submission_without_errors() {
    let engine = Arc::new(EngineCoordinator::new(EngineConfig::default()).unwrap());

    std::thread::scope(|scope| {
        let submitter = Arc::clone(&engine);
        scope.spawn(move || {
            for secs in 0..500 {
                // Submit must never error on "session ended"; removal just
                // means the next sample starts a fresh lane.
                submitter
                    .submit(SignalSample::with_face("student-r", ts(secs), face()))
                    .unwrap();
            }
        });
        let remover = Arc::clone(&engine);
        scope.spawn(move || {
            for _ in 0..50 {
                remover.remove_subject("student-r");
                std::thread::yield_now();
            }
        });
    });

    // The subject is either tracked (recreated after the last removal) or
    // not; both are consistent end states.
    assert!(engine.active_subject_count() <= 1);
}

#[test]
fn removal_starts_a_new_session_on_resubmit() {
    let engine = EngineCoordinator::new(EngineConfig::default()).unwrap();
    engine
        .submit(SignalSample::with_face("student-a", ts(0), face()))
        .unwrap();
    let first_session = engine.session_id("student-a").unwrap();

    assert!(engine.remove_subject("student-a"));
    assert!(!engine.remove_subject("student-a"));

    engine
        .submit(SignalSample::with_face("student-a", ts(1), face()))
        .unwrap();
    let second_session = engine.session_id("student-a").unwrap();
    assert_ne!(first_session, second_session);

    // The old session is gone with its lane.
    assert!(matches!(
        engine.summary("student-a", first_session),
        Err(EngineError::UnknownSession { .. })
    ));
}

#[test]
fn idle_subjects_are_swept() {
    let engine = EngineCoordinator::new(EngineConfig::default()).unwrap();
    engine
        .submit(SignalSample::with_face("student-b", ts(0), face()))
        .unwrap();

    assert!(engine.evict_idle(Utc::now()).is_empty());
    assert_eq!(engine.active_subject_count(), 1);

    let idle = engine.config().idle_eviction_seconds as i64;
    let evicted = engine.evict_idle(Utc::now() + Duration::seconds(idle + 1));
    assert_eq!(evicted, vec!["student-b".to_string()]);
    assert_eq!(engine.active_subject_count(), 0);
}

#[test]
fn lookups_for_unknown_ids_report_not_found() {
    let engine = EngineCoordinator::new(EngineConfig::default()).unwrap();

    assert!(matches!(
        engine.session_id("nobody"),
        Err(EngineError::UnknownSubject(_))
    ));
    assert!(matches!(
        engine.summary("nobody", uuid::Uuid::new_v4()),
        Err(EngineError::UnknownSubject(_))
    ));
    assert!(matches!(
        engine.acknowledge(uuid::Uuid::new_v4()),
        Err(EngineError::UnknownAlert(_))
    ));
}

#[test]
fn active_alerts_are_ordered_by_opened_at() {
    let engine = EngineCoordinator::new(EngineConfig::default()).unwrap();

    for secs in 0..=31 {
        engine
            .submit(SignalSample::absent("student-early", ts(secs)))
            .unwrap();
    }
    for secs in 100..=131 {
        engine
            .submit(SignalSample::absent("student-late", ts(secs)))
            .unwrap();
    }

    let alerts = engine.active_alerts();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].subject_id, "student-early");
    assert_eq!(alerts[1].subject_id, "student-late");
    assert!(alerts[0].opened_at <= alerts[1].opened_at);
}

#[test]
fn malformed_samples_are_counted_and_do_not_create_lanes() {
    let engine = EngineCoordinator::new(EngineConfig::default()).unwrap();

    let err = engine
        .submit(SignalSample::absent("   ", ts(0)))
        .unwrap_err();
    assert!(matches!(err, EngineError::MalformedSample { .. }));

    let mut bad = face();
    bad.face_quality = 7.0;
    let err = engine
        .submit(SignalSample::with_face("student-c", ts(0), bad))
        .unwrap_err();
    assert!(matches!(err, EngineError::MalformedSample { .. }));

    assert_eq!(engine.malformed_sample_count(), 2);
    assert_eq!(engine.active_subject_count(), 0);
}
