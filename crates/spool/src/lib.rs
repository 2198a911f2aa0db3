// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The directory-backed append-only Event Spool (spec §4.2): a durable FIFO
//! event log that survives process restart. Implemented with `std::fs`
//! wrapped in `tokio::task::spawn_blocking`, since POSIX `rename(2)`
//! atomicity is the entire point and there's no async advantage to a
//! virtual filesystem op.

mod filename;

use chrono::Utc;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use wfe_core::{EngineError, EngineResult, Event, EventPayload};

pub use filename::ParsedFilename;

/// A handle onto `<base>/pending/` and `<base>/processed/`.
#[derive(Clone)]
pub struct Spool {
    base: PathBuf,
}

impl Spool {
    /// Creates `pending/` and `processed/` beneath `base` if absent.
    pub fn open(base: impl Into<PathBuf>) -> EngineResult<Self> {
        let base = base.into();
        fs::create_dir_all(base.join("pending")).map_err(spool_err)?;
        fs::create_dir_all(base.join("processed")).map_err(spool_err)?;
        Ok(Self { base })
    }

    fn pending_dir(&self) -> PathBuf {
        self.base.join("pending")
    }

    fn processed_dir(&self) -> PathBuf {
        self.base.join("processed")
    }

    /// Writes a new file to `pending/`, fsyncing before returning (spec
    /// §4.2 `append`).
    pub async fn append(&self, payload: EventPayload, source: impl Into<String>) -> EngineResult<Event> {
        let event = Event::new(payload, source, Utc::now());
        let name = filename::format(&event);
        let path = self.pending_dir().join(&name);
        let body = serde_json::to_vec_pretty(&event).map_err(|e| EngineError::Spool(e.to_string()))?;

        tokio::task::spawn_blocking(move || write_and_sync(&path, &body))
            .await
            .map_err(|e| EngineError::Spool(e.to_string()))??;

        Ok(event)
    }

    /// Pending events in lexicographic filename order (non-decreasing
    /// timestamp, per the filename scheme).
    pub async fn list_pending(&self) -> EngineResult<Vec<Event>> {
        let dir = self.pending_dir();
        tokio::task::spawn_blocking(move || list_dir(&dir))
            .await
            .map_err(|e| EngineError::Spool(e.to_string()))?
    }

    pub async fn list_processed(&self, limit: Option<usize>) -> EngineResult<Vec<Event>> {
        let dir = self.processed_dir();
        let mut events = tokio::task::spawn_blocking(move || list_dir(&dir))
            .await
            .map_err(|e| EngineError::Spool(e.to_string()))??;
        if let Some(limit) = limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    pub async fn list_all(&self, limit: usize) -> EngineResult<Vec<Event>> {
        let mut all = self.list_pending().await?;
        all.extend(self.list_processed(None).await?);
        all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        all.truncate(limit);
        Ok(all)
    }

    /// Atomically renames the file from `pending/` to `processed/`. If two
    /// observers race on the same id, one fails (`not-found`) — that is the
    /// deduplication mechanism for handler retries (spec §4.2, L1).
    pub async fn mark_processed(&self, id: &str) -> EngineResult<()> {
        let pending = self.pending_dir();
        let processed = self.processed_dir();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let name = find_unique(&pending, &id)?
                .ok_or_else(|| EngineError::not_found(format!("event {id}")))?;
            let from = pending.join(&name);
            let to = processed.join(&name);
            fs::rename(&from, &to).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => EngineError::not_found(format!("event {id}")),
                _ => EngineError::Spool(e.to_string()),
            })
        })
        .await
        .map_err(|e| EngineError::Spool(e.to_string()))?
    }
}

fn write_and_sync(path: &Path, body: &[u8]) -> EngineResult<()> {
    use std::io::Write;
    let mut file = File::create(path).map_err(spool_err)?;
    file.write_all(body).map_err(spool_err)?;
    file.sync_all().map_err(spool_err)?;
    Ok(())
}

fn list_dir(dir: &Path) -> EngineResult<Vec<Event>> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(spool_err)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".json"))
        .collect();
    names.sort();

    let mut events = Vec::with_capacity(names.len());
    for name in names {
        let contents = fs::read_to_string(dir.join(&name)).map_err(spool_err)?;
        let event: Event = serde_json::from_str(&contents).map_err(|e| EngineError::Spool(e.to_string()))?;
        events.push(event);
    }
    Ok(events)
}

/// Finds the single pending file whose embedded short-id matches or starts
/// with `id_or_prefix`. Ambiguous prefixes are rejected (spec §4.2).
fn find_unique(dir: &Path, id_or_prefix: &str) -> EngineResult<Option<String>> {
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir).map_err(spool_err)? {
        let entry = entry.map_err(spool_err)?;
        let Ok(name) = entry.file_name().into_string() else { continue };
        if let Some(parsed) = filename::parse(&name) {
            if parsed.short_id.starts_with(id_or_prefix) {
                matches.push(name);
            }
        }
    }
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(EngineError::validation(format!("ambiguous event id prefix: {id_or_prefix}"))),
    }
}

fn spool_err(e: io::Error) -> EngineError {
    EngineError::Spool(e.to_string())
}
