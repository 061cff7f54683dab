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

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("sample for '{subject}' arrived out of order: {arrived} precedes {last_accepted}")]
    OutOfOrderSample {
        subject: String,
        arrived: DateTime<Utc>,
        last_accepted: DateTime<Utc>,
    },
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
    #[error("failed to read configuration file '{path}': {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("unknown subject '{0}'")]
    UnknownSubject(String),
    #[error("unknown session '{session}' for subject '{subject}'")]
    UnknownSession { subject: String, session: Uuid },
    #[error("unknown alert '{0}'")]
    UnknownAlert(Uuid),
    #[error("malformed sample: {reason}")]
    MalformedSample { reason: String },
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Per-sample failures never warrant tearing down a subject's tracking.
    pub fn is_sample_local(&self) -> bool {
        matches!(
            self,
            EngineError::OutOfOrderSample { .. } | EngineError::MalformedSample { .. }
        )
    }
}
