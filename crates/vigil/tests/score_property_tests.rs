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
use proptest::prelude::*;
use vigil::{
    EmotionLabel, EngineConfig, EyeState, FaceSignals, GazeDirection, HeadPose, ScoreCalculator,
    SignalSample, SlidingWindowStore, StatusClassifier,
};

fn base_ts() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

#[derive(Debug, Clone)]
struct FrameSpec {
    gap_secs: i64,
    face: Option<FaceSpec>,
}

#[derive(Debug, Clone)]
struct FaceSpec {
    yaw: f64,
    pitch: f64,
    gaze: GazeDirection,
    eyes_closed: bool,
    blink: bool,
    emotion: EmotionLabel,
    confidence: f64,
}

fn gaze_strategy() -> impl Strategy<Value = GazeDirection> {
    prop_oneof![
        Just(GazeDirection::Left),
        Just(GazeDirection::Center),
        Just(GazeDirection::Right),
        Just(GazeDirection::Unknown),
    ]
}

fn emotion_strategy() -> impl Strategy<Value = EmotionLabel> {
    prop_oneof![
        Just(EmotionLabel::Happy),
        Just(EmotionLabel::Sad),
        Just(EmotionLabel::Angry),
        Just(EmotionLabel::Surprise),
        Just(EmotionLabel::Fear),
        Just(EmotionLabel::Disgust),
        Just(EmotionLabel::Neutral),
        Just(EmotionLabel::None),
    ]
}

fn face_strategy() -> impl Strategy<Value = FaceSpec> {
    (
        -90.0f64..90.0,
        -90.0f64..90.0,
        gaze_strategy(),
        any::<bool>(),
        any::<bool>(),
        emotion_strategy(),
        0.0f64..=1.0,
    )
        .prop_map(
            |(yaw, pitch, gaze, eyes_closed, blink, emotion, confidence)| FaceSpec {
                yaw,
                pitch,
                gaze,
                eyes_closed,
                blink,
                emotion,
                confidence,
            },
        )
}

fn frame_strategy() -> impl Strategy<Value = FrameSpec> {
    (0i64..20, proptest::option::of(face_strategy()))
        .prop_map(|(gap_secs, face)| FrameSpec { gap_secs, face })
}

fn to_sample(spec: &FrameSpec, at: DateTime<Utc>) -> SignalSample {
    match &spec.face {
        None => SignalSample::absent("subject", at),
        Some(face) => SignalSample::with_face(
            "subject",
            at,
            FaceSignals {
                detection_confidence: 0.9,
                head_pose: Some(HeadPose {
                    pitch: face.pitch,
                    yaw: face.yaw,
                    roll: 0.0,
                }),
                gaze: face.gaze,
                eyes: Some(EyeState {
                    left_open: Some(!face.eyes_closed),
                    right_open: Some(!face.eyes_closed),
                    left_ear: None,
                    right_ear: None,
                }),
                blink_detected: face.blink,
                emotion: face.emotion,
                emotion_confidence: face.confidence,
                face_quality: 0.5,
            },
        ),
    }
}

fn run_stream(frames: &[FrameSpec]) -> Vec<(f64, vigil::AttentionStatus)> {
    let config = EngineConfig::default();
    let scorer = ScoreCalculator::new(&config);
    let classifier = StatusClassifier::new(&config);
    let mut store = SlidingWindowStore::new(config.window_seconds);

    let mut at = base_ts();
    let mut out = Vec::new();
    for frame in frames {
        at += Duration::seconds(frame.gap_secs);
        let snapshot = store.insert(to_sample(frame, at)).unwrap();
        let breakdown = scorer.compute(&snapshot);
        let status = classifier.classify(
            breakdown.attention_score,
            snapshot.face_absence_secs,
            snapshot.neutral_run_secs,
        );
        for value in [
            breakdown.face_detection_rate,
            breakdown.head_pose_score,
            breakdown.gaze_score,
            breakdown.emotion_engagement,
            breakdown.attention_score,
        ] {
            assert!((0.0..=100.0).contains(&value), "score out of range: {value}");
        }
        out.push((breakdown.attention_score, status));
    }
    out
}

proptest! {
    #[test]
    fn scores_stay_in_range_for_any_valid_stream(frames in proptest::collection::vec(frame_strategy(), 1..120)) {
        run_stream(&frames);
    }

    #[test]
    fn replay_from_fresh_state_is_identical(frames in proptest::collection::vec(frame_strategy(), 1..60)) {
        let first = run_stream(&frames);
        let second = run_stream(&frames);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn window_never_retains_expired_samples(frames in proptest::collection::vec(frame_strategy(), 1..120)) {
        let config = EngineConfig::default();
        let mut store = SlidingWindowStore::new(config.window_seconds);
        let window = Duration::seconds(config.window_seconds as i64);

        let mut at = base_ts();
        for frame in &frames {
            at += Duration::seconds(frame.gap_secs);
            store.insert(to_sample(frame, at)).unwrap();
            if let Some(oldest) = store.oldest_timestamp() {
                prop_assert!(at - oldest <= window);
            }
        }
    }
}
