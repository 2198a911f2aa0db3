// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic batch append for agent log lines (spec §4.1, §4.3.3: "Flush is
//! one batch transaction into `agent_logs`").

use crate::Store;
use rusqlite::{params, Connection};
use wfe_core::{AgentId, AgentLogLine, EngineError, EngineResult, LogStream};

fn parse_stream(s: &str) -> LogStream {
    match s {
        "out" => LogStream::Out,
        "err" => LogStream::Err,
        "combined" => LogStream::Combined,
        other => unreachable!("unknown log stream persisted: {other}"),
    }
}

pub(crate) fn append_batch(conn: &mut Connection, agent_id: &AgentId, lines: &[(chrono::DateTime<chrono::Utc>, LogStream, String)]) -> EngineResult<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let tx = conn.transaction().map_err(|e| EngineError::Store(e.to_string()))?;
    {
        let mut stmt = tx
            .prepare("INSERT INTO agent_logs (agent_id, timestamp, stream, content) VALUES (?1, ?2, ?3, ?4)")
            .map_err(|e| EngineError::Store(e.to_string()))?;
        for (timestamp, stream, content) in lines {
            stmt.execute(params![agent_id.as_str(), timestamp, stream.as_str(), content])
                .map_err(|e| EngineError::Store(e.to_string()))?;
        }
    }
    tx.commit().map_err(|e| EngineError::Store(e.to_string()))
}

pub(crate) fn list_for_agent(conn: &Connection, agent_id: &str) -> EngineResult<Vec<AgentLogLine>> {
    let mut stmt = conn
        .prepare("SELECT id, agent_id, timestamp, stream, content FROM agent_logs WHERE agent_id = ?1 ORDER BY id ASC")
        .map_err(|e| EngineError::Store(e.to_string()))?;
    let rows = stmt
        .query_map(params![agent_id], |row| {
            let stream_str: String = row.get("stream")?;
            Ok(AgentLogLine {
                id: row.get("id")?,
                agent_id: AgentId::from(row.get::<_, String>("agent_id")?),
                timestamp: row.get("timestamp")?,
                stream: parse_stream(&stream_str),
                content: row.get("content")?,
            })
        })
        .map_err(|e| EngineError::Store(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(rows)
}

impl Store {
    /// One transaction per flush (spec §4.1, §4.3.3).
    pub fn append_log_lines(
        &self,
        agent_id: &AgentId,
        lines: &[(chrono::DateTime<chrono::Utc>, LogStream, String)],
    ) -> EngineResult<()> {
        append_batch(&mut self.conn.lock(), agent_id, lines)
    }

    pub fn get_agent_logs(&self, agent_id: &str) -> EngineResult<Vec<AgentLogLine>> {
        list_for_agent(&self.conn.lock(), agent_id)
    }
}
