// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agentAnalytics()` (spec §4.1): counts grouped by terminal/non-terminal
//! status.

use crate::Store;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use wfe_core::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentAnalytics {
    pub total: u64,
    pub starting: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub timeout: u64,
    pub killed: u64,
}

impl AgentAnalytics {
    pub fn non_terminal(&self) -> u64 {
        self.starting + self.running
    }

    pub fn terminal(&self) -> u64 {
        self.completed + self.failed + self.timeout + self.killed
    }
}

fn count_by_status(conn: &Connection, status: &str) -> EngineResult<u64> {
    conn.query_row("SELECT COUNT(*) FROM agents WHERE status = ?1", [status], |r| r.get(0))
        .map_err(|e| EngineError::Store(e.to_string()))
}

pub(crate) fn compute(conn: &Connection) -> EngineResult<AgentAnalytics> {
    Ok(AgentAnalytics {
        total: conn
            .query_row("SELECT COUNT(*) FROM agents", [], |r| r.get(0))
            .map_err(|e| EngineError::Store(e.to_string()))?,
        starting: count_by_status(conn, "starting")?,
        running: count_by_status(conn, "running")?,
        completed: count_by_status(conn, "completed")?,
        failed: count_by_status(conn, "failed")?,
        timeout: count_by_status(conn, "timeout")?,
        killed: count_by_status(conn, "killed")?,
    })
}

impl Store {
    pub fn agent_analytics(&self) -> EngineResult<AgentAnalytics> {
        compute(&self.conn.lock())
    }
}
