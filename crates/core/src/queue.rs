// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue entry and queue settings (spec §3 "QueueEntry", "QueueSettings").

use crate::id::{QueueEntryId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl QueueEntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEntryStatus::Queued => "queued",
            QueueEntryStatus::Processing => "processing",
            QueueEntryStatus::Completed => "completed",
            QueueEntryStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub task_id: TaskId,
    /// Lower sorts first. Positions need not be contiguous (spec §3).
    pub position: i64,
    pub status: QueueEntryStatus,
    pub queued_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    pub fn new(id: QueueEntryId, task_id: TaskId, position: i64, now: DateTime<Utc>) -> Self {
        Self { id, task_id, position, status: QueueEntryStatus::Queued, queued_at: now, completed_at: None }
    }
}

/// Recognized settings keys (spec §3 "QueueSettings").
pub const KEY_PAUSED: &str = "paused";
pub const KEY_STOP_ON_FAILURE: &str = "stop_on_failure";
pub const KEY_MAX_CONCURRENT: &str = "max_concurrent";

/// Key/value bag backing the queue's runtime gates. Unrecognized keys are
/// stored and returned as-is (spec §3 describes settings as a key/value
/// bag; the QP only reacts to the three keys it recognizes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSettings(HashMap<String, String>);

impl QueueSettings {
    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.0
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn paused(&self) -> bool {
        self.0.get(KEY_PAUSED).map(|v| v == "true").unwrap_or(false)
    }

    pub fn stop_on_failure(&self) -> bool {
        self.0.get(KEY_STOP_ON_FAILURE).map(|v| v == "true").unwrap_or(false)
    }

    /// Absent or unparseable defaults to unbounded concurrency (`usize::MAX`)
    /// so an empty settings table never silently stalls the queue.
    pub fn max_concurrent(&self) -> usize {
        self.0
            .get(KEY_MAX_CONCURRENT)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unpaused_and_unbounded() {
        let s = QueueSettings::default();
        assert!(!s.paused());
        assert!(!s.stop_on_failure());
        assert_eq!(s.max_concurrent(), usize::MAX);
    }

    #[test]
    fn recognizes_set_keys() {
        let mut s = QueueSettings::default();
        s.set(KEY_PAUSED, "true");
        s.set(KEY_STOP_ON_FAILURE, "true");
        s.set(KEY_MAX_CONCURRENT, "3");
        assert!(s.paused());
        assert!(s.stop_on_failure());
        assert_eq!(s.max_concurrent(), 3);
    }

    #[test]
    fn unrecognized_keys_round_trip() {
        let mut s = QueueSettings::default();
        s.set("custom", "value");
        assert_eq!(s.as_map().get("custom"), Some(&"value".to_string()));
    }
}
