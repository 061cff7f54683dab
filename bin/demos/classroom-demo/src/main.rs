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

//! Feeds three synthetic student streams through the engagement engine:
//! one attentive, one repeatedly distracted, one who leaves the frame
//! mid-session. Alerts are printed as they open and clear, and session
//! summaries at the end.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use vigil::{
    EmotionLabel, EngineConfig, EngineCoordinator, FaceSignals, GazeDirection, HeadPose,
    SignalSample,
};

const SESSION_SECONDS: i64 = 360;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let engine = EngineCoordinator::new(EngineConfig::default())?;
    let started = Utc::now() - Duration::seconds(SESSION_SECONDS);
    let mut rng = rand::thread_rng();

    println!("=== Classroom Engagement Demo ===\n");

    for secs in 0..SESSION_SECONDS {
        let at = started + Duration::seconds(secs);

        submit_and_report(&engine, attentive_student(at, &mut rng))?;
        submit_and_report(&engine, distracted_student(at, secs, &mut rng))?;
        if let Some(sample) = intermittent_student(at, secs, &mut rng) {
            submit_and_report(&engine, sample)?;
        }

        if secs > 0 && secs % 60 == 0 {
            print_snapshot(&engine, secs);
        }
    }

    println!("\n--- open alerts at session end ---");
    for alert in engine.active_alerts() {
        println!(
            "  [{}] {} (opened {}, last seen {})",
            alert.kind.as_str(),
            alert.subject_id,
            alert.opened_at.format("%H:%M:%S"),
            alert.last_seen_at.format("%H:%M:%S"),
        );
        engine.acknowledge(alert.id)?;
    }

    println!("\n--- session summaries ---");
    for subject in ["alice", "bob", "carol"] {
        let session_id = engine.session_id(subject)?;
        let summary = engine.summary(subject, session_id)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

fn submit_and_report(
    engine: &EngineCoordinator,
    sample: SignalSample,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = engine.submit(sample)?;
    for alert in &outcome.alerts.opened {
        println!(
            "! {} -> {} alert opened ({:.1}%)",
            alert.subject_id,
            alert.kind.as_str(),
            outcome.scored.attention_score
        );
    }
    for alert in &outcome.alerts.cleared {
        println!(
            "  {} -> {} alert cleared",
            alert.subject_id,
            alert.kind.as_str()
        );
    }
    Ok(())
}

fn print_snapshot(engine: &EngineCoordinator, secs: i64) {
    println!("\n--- snapshot at {secs}s ---");
    let mut entries: Vec<_> = engine.snapshot_all().into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for (subject, scored) in entries {
        println!(
            "  {:8} {:6.1}%  {}",
            subject, scored.attention_score, scored.status
        );
    }
    println!();
}

fn attentive_student(at: DateTime<Utc>, rng: &mut impl Rng) -> SignalSample {
    let emotion = if rng.gen_bool(0.3) {
        EmotionLabel::Happy
    } else {
        EmotionLabel::Neutral
    };
    SignalSample::with_face(
        "alice",
        at,
        FaceSignals {
            detection_confidence: rng.gen_range(0.85..0.99),
            head_pose: Some(HeadPose {
                pitch: rng.gen_range(-5.0..5.0),
                yaw: rng.gen_range(-8.0..8.0),
                roll: 0.0,
            }),
            gaze: GazeDirection::Center,
            eyes: None,
            blink_detected: rng.gen_bool(0.05),
            emotion,
            emotion_confidence: rng.gen_range(0.6..0.95),
            face_quality: rng.gen_range(0.7..0.95),
        },
    )
}

fn distracted_student(at: DateTime<Utc>, secs: i64, rng: &mut impl Rng) -> SignalSample {
    // Bob drifts off for two long stretches per session.
    let looking_away = (60..140).contains(&secs) || (240..320).contains(&secs);
    let (yaw, gaze, emotion) = if looking_away {
        (
            rng.gen_range(40.0..70.0),
            GazeDirection::Left,
            EmotionLabel::Sad,
        )
    } else {
        (
            rng.gen_range(-10.0..10.0),
            GazeDirection::Center,
            EmotionLabel::Neutral,
        )
    };
    SignalSample::with_face(
        "bob",
        at,
        FaceSignals {
            detection_confidence: rng.gen_range(0.7..0.95),
            head_pose: Some(HeadPose {
                pitch: rng.gen_range(-5.0..5.0),
                yaw,
                roll: 0.0,
            }),
            gaze,
            eyes: None,
            blink_detected: false,
            emotion,
            emotion_confidence: rng.gen_range(0.5..0.9),
            face_quality: rng.gen_range(0.5..0.9),
        },
    )
}

fn intermittent_student(at: DateTime<Utc>, secs: i64, rng: &mut impl Rng) -> Option<SignalSample> {
    // Carol walks away at the two-minute mark and comes back a minute later;
    // her camera also drops the occasional frame entirely.
    if rng.gen_bool(0.02) {
        return None;
    }
    if (120..180).contains(&secs) {
        return Some(SignalSample::absent("carol", at));
    }
    Some(SignalSample::with_face(
        "carol",
        at,
        FaceSignals {
            detection_confidence: rng.gen_range(0.8..0.95),
            head_pose: Some(HeadPose {
                pitch: rng.gen_range(-5.0..5.0),
                yaw: rng.gen_range(-12.0..12.0),
                roll: 0.0,
            }),
            gaze: GazeDirection::Center,
            eyes: None,
            blink_detected: rng.gen_bool(0.05),
            emotion: EmotionLabel::Neutral,
            emotion_confidence: rng.gen_range(0.5..0.9),
            face_quality: rng.gen_range(0.6..0.9),
        },
    ))
}
