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

//! Attention/engagement scoring and alerting engine.
//!
//! Turns a stream of per-frame perceptual measurements (face presence, head
//! pose, gaze, emotion) into a stable 0-100 attention score, a discrete
//! status, and a deduplicated stream of acknowledgeable alerts, per tracked
//! subject. The engine holds only live in-memory state; persistence and
//! delivery are the caller's concern.

pub mod alerts;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod sample;
pub mod score;
pub mod session;
pub mod status;
pub mod window;

pub use alerts::{Alert, AlertDeltas, AlertEngine, AlertKind};
pub use config::{EngineConfig, ScoreWeights, StatusBands};
pub use coordinator::{EngineCoordinator, SubmitOutcome};
pub use error::{EngineError, EngineResult};
pub use sample::{
    EmotionLabel, EyeState, FaceSignals, GazeDirection, HeadPose, SignalSample, SubjectId,
};
pub use score::{ScoreBreakdown, ScoreCalculator};
pub use session::{SessionAggregator, SessionSummary};
pub use status::{AttentionStatus, ScoredState, StatusClassifier};
pub use window::{SlidingWindowStore, WindowSnapshot};
