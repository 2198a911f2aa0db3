// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent log ring buffer (spec §4.3.3).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use wfe_core::LogStream;

/// Flush once the ring reaches this many pending lines.
pub const FLUSH_AT: usize = 50;

/// Combined flush tick for every agent's ring (spec §4.3.3).
pub const FLUSH_TICK: std::time::Duration = std::time::Duration::from_secs(1);

pub type LogLine = (DateTime<Utc>, LogStream, String);

#[derive(Clone, Default)]
pub struct LogRing(Arc<Mutex<Vec<LogLine>>>);

impl LogRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line, dropping empty content (spec §4.3.3 "drop empty
    /// lines"). Returns `true` once the ring has reached the flush
    /// threshold, so the caller can trigger an immediate flush.
    pub fn push(&self, stream: LogStream, content: String, now: DateTime<Utc>) -> bool {
        if content.is_empty() {
            return false;
        }
        let mut lines = self.0.lock();
        lines.push((now, stream, content));
        lines.len() >= FLUSH_AT
    }

    /// Drains all pending lines for a flush. Empty when there is nothing
    /// to write.
    pub fn drain(&self) -> Vec<LogLine> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}
