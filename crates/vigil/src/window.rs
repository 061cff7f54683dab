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
use crate::sample::SignalSample;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Time-bounded ring buffer of one subject's recent samples, plus the two
/// running durations derived from the stream: how long the face has been
/// continuously absent, and how long the emotion run has been neutral or
/// signal-free.
pub struct SlidingWindowStore {
    window: Duration,
    buffer: VecDeque<SignalSample>,
    last_timestamp: Option<DateTime<Utc>>,
    absence_since: Option<DateTime<Utc>>,
    neutral_since: Option<DateTime<Utc>>,
}

impl SlidingWindowStore {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window: Duration::seconds(window_seconds as i64),
            buffer: VecDeque::new(),
            last_timestamp: None,
            absence_since: None,
            neutral_since: None,
        }
    }

    /// Accepts one sample, evicts everything older than the window relative
    /// to it, and returns a snapshot for scoring. Samples with a timestamp
    /// earlier than the last accepted one are rejected without touching any
    /// state; equal timestamps are allowed.
    pub fn insert(&mut self, sample: SignalSample) -> EngineResult<WindowSnapshot<'_>> {
        if let Some(last) = self.last_timestamp {
            if sample.timestamp < last {
                return Err(EngineError::OutOfOrderSample {
                    subject: sample.subject_id.clone(),
                    arrived: sample.timestamp,
                    last_accepted: last,
                });
            }
        }

        let as_of = sample.timestamp;

        if sample.face_present() {
            self.absence_since = None;
        } else {
            self.absence_since.get_or_insert(as_of);
        }

        let neutral = sample
            .emotion()
            .map(|e| e.is_neutral_or_none())
            .unwrap_or(true);
        if neutral {
            self.neutral_since.get_or_insert(as_of);
        } else {
            self.neutral_since = None;
        }

        self.last_timestamp = Some(as_of);
        self.buffer.push_back(sample);

        // Monotonic eviction from the front; timestamps are non-decreasing,
        // so the first retained element ends the scan.
        while let Some(front) = self.buffer.front() {
            if as_of - front.timestamp > self.window {
                self.buffer.pop_front();
            } else {
                break;
            }
        }

        Ok(WindowSnapshot {
            as_of,
            face_absence_secs: run_seconds(self.absence_since, as_of),
            neutral_run_secs: run_seconds(self.neutral_since, as_of),
            samples: &self.buffer,
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.buffer.front().map(|s| s.timestamp)
    }
}

fn run_seconds(since: Option<DateTime<Utc>>, as_of: DateTime<Utc>) -> f64 {
    since
        .map(|start| (as_of - start).num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0)
}

/// Read-only view over the buffered window as of one accepted sample.
#[derive(Debug)]
pub struct WindowSnapshot<'a> {
    pub as_of: DateTime<Utc>,
    pub face_absence_secs: f64,
    pub neutral_run_secs: f64,
    samples: &'a VecDeque<SignalSample>,
}

impl WindowSnapshot<'_> {
    pub fn samples(&self) -> impl Iterator<Item = &SignalSample> {
        self.samples.iter()
    }

    /// Samples within the trailing `seconds` of the window, for the
    /// short-horizon pose/gaze components.
    pub fn recent(&self, seconds: u64) -> impl Iterator<Item = &SignalSample> {
        let cutoff = self.as_of - Duration::seconds(seconds as i64);
        self.samples.iter().filter(move |s| s.timestamp >= cutoff)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Blink events per minute over the buffered span. Informational only;
    /// it feeds the scored state, not the composite score.
    pub fn blink_rate_per_minute(&self) -> f64 {
        let blinks = self
            .samples
            .iter()
            .filter(|s| s.face.as_ref().map(|f| f.blink_detected).unwrap_or(false))
            .count();
        let span_secs = self
            .samples
            .front()
            .map(|first| (self.as_of - first.timestamp).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0)
            .max(1.0);
        blinks as f64 * 60.0 / span_secs
    }
}
