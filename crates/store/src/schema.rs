// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent schema migrations, run on every `Store::open`.

use rusqlite::Connection;
use wfe_core::{EngineError, EngineResult};

pub fn migrate(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id                  TEXT PRIMARY KEY,
            title               TEXT NOT NULL,
            description         TEXT NOT NULL,
            kind                TEXT NOT NULL,
            status              TEXT NOT NULL,
            repo                TEXT,
            repos               TEXT NOT NULL,
            investigation_only  INTEGER NOT NULL,
            plan                TEXT,
            assigned_agent_id   TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS agents (
            id              TEXT PRIMARY KEY,
            task_id         TEXT NOT NULL REFERENCES tasks(id),
            sandbox_handle  TEXT,
            kind            TEXT NOT NULL,
            status          TEXT NOT NULL,
            started_at      TEXT NOT NULL,
            completed_at    TEXT,
            exit_code       INTEGER,
            error           TEXT,
            metadata        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_agents_task_id ON agents(task_id);
        CREATE INDEX IF NOT EXISTS idx_agents_status ON agents(status);

        CREATE TABLE IF NOT EXISTS agent_logs (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id    TEXT NOT NULL REFERENCES agents(id),
            timestamp   TEXT NOT NULL,
            stream      TEXT NOT NULL,
            content     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_agent_logs_agent_id ON agent_logs(agent_id, id);

        CREATE TABLE IF NOT EXISTS queue_entries (
            id              TEXT PRIMARY KEY,
            task_id         TEXT NOT NULL UNIQUE REFERENCES tasks(id),
            position        INTEGER NOT NULL,
            status          TEXT NOT NULL,
            queued_at       TEXT NOT NULL,
            completed_at    TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_queue_entries_position ON queue_entries(position);

        CREATE TABLE IF NOT EXISTS queue_settings (
            key     TEXT PRIMARY KEY,
            value   TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| EngineError::Store(e.to_string()))
}
