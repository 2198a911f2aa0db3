// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The embedded relational Store (spec §4.1): durable, single-writer
//! persistence for Agent, AgentLogLine, Task, QueueEntry, and QueueSettings
//! rows, backed by `rusqlite` in WAL journal mode.

mod agents;
mod analytics;
mod logs;
mod queue;
mod schema;
mod tasks;

pub use analytics::AgentAnalytics;

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use wfe_core::EngineResult;

/// Single-writer handle onto the SQLite-backed store. Cheap to clone: the
/// connection and its lock live behind an `Arc` internally via callers
/// holding `Arc<Store>`, matching the "single shared mutable resource"
/// policy from spec §5.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if absent) the database at `path`, sets WAL journaling
    /// and foreign-key enforcement, and runs idempotent schema migrations.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| wfe_core::EngineError::Store(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// In-memory store, for tests that don't need a file on disk.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| wfe_core::EngineError::Store(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> EngineResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| wfe_core::EngineError::Store(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| wfe_core::EngineError::Store(e.to_string()))?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}
