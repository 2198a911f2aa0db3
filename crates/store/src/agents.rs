// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent CRUD and the `getAgent`/`listAgents`/`countRunningAgents` query
//! helpers from spec §4.1.

use crate::Store;
use rusqlite::{params, Connection, OptionalExtension, Row};
use wfe_core::{Agent, AgentId, AgentKind, AgentStatus, EngineError, EngineResult, TaskId};

fn row_to_agent(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let kind_str: String = row.get("kind")?;
    let status_str: String = row.get("status")?;
    let metadata_str: String = row.get("metadata")?;
    Ok(Agent {
        id: AgentId::from(row.get::<_, String>("id")?),
        task_id: TaskId::from(row.get::<_, String>("task_id")?),
        sandbox_handle: row.get("sandbox_handle")?,
        kind: parse_kind(&kind_str),
        status: parse_status(&status_str),
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        exit_code: row.get("exit_code")?,
        error: row.get("error")?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::Value::Null),
    })
}

fn parse_kind(s: &str) -> AgentKind {
    match s {
        "triage" => AgentKind::Triage,
        "coding" => AgentKind::Coding,
        "reviewer" => AgentKind::Reviewer,
        "deployer" => AgentKind::Deployer,
        "verifier" => AgentKind::Verifier,
        "auditor" => AgentKind::Auditor,
        "healthcheck" => AgentKind::Healthcheck,
        other => unreachable!("unknown agent kind persisted: {other}"),
    }
}

fn parse_status(s: &str) -> AgentStatus {
    match s {
        "starting" => AgentStatus::Starting,
        "running" => AgentStatus::Running,
        "completed" => AgentStatus::Completed,
        "failed" => AgentStatus::Failed,
        "timeout" => AgentStatus::Timeout,
        "killed" => AgentStatus::Killed,
        other => unreachable!("unknown agent status persisted: {other}"),
    }
}

pub(crate) fn insert(conn: &Connection, agent: &Agent) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO agents (id, task_id, sandbox_handle, kind, status, started_at, completed_at, exit_code, error, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            agent.id.as_str(),
            agent.task_id.as_str(),
            agent.sandbox_handle,
            agent.kind.as_str(),
            agent.status.as_str(),
            agent.started_at,
            agent.completed_at,
            agent.exit_code,
            agent.error,
            agent.metadata.to_string(),
        ],
    )
    .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(())
}

pub(crate) fn update(conn: &Connection, agent: &Agent) -> EngineResult<()> {
    let n = conn
        .execute(
            "UPDATE agents SET sandbox_handle = ?2, status = ?3, completed_at = ?4, exit_code = ?5, error = ?6, metadata = ?7
             WHERE id = ?1",
            params![
                agent.id.as_str(),
                agent.sandbox_handle,
                agent.status.as_str(),
                agent.completed_at,
                agent.exit_code,
                agent.error,
                agent.metadata.to_string(),
            ],
        )
        .map_err(|e| EngineError::Store(e.to_string()))?;
    if n == 0 {
        return Err(EngineError::not_found(format!("agent {}", agent.id)));
    }
    Ok(())
}

/// Exact match first; falls back to a unique id-prefix match so short agent
/// ids (as accepted by the public interface) resolve deterministically.
pub(crate) fn get(conn: &Connection, id: &str) -> EngineResult<Option<Agent>> {
    let exact = conn
        .query_row("SELECT * FROM agents WHERE id = ?1", params![id], row_to_agent)
        .optional()
        .map_err(|e| EngineError::Store(e.to_string()))?;
    if let Some(agent) = exact {
        return Ok(Some(agent));
    }

    let mut stmt = conn
        .prepare("SELECT * FROM agents WHERE id LIKE ?1 || '%'")
        .map_err(|e| EngineError::Store(e.to_string()))?;
    let mut matches = stmt
        .query_map(params![id], row_to_agent)
        .map_err(|e| EngineError::Store(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EngineError::Store(e.to_string()))?;

    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(EngineError::validation(format!("ambiguous agent id prefix: {id}"))),
    }
}

pub(crate) fn list(conn: &Connection, limit: u32) -> EngineResult<Vec<Agent>> {
    let mut stmt = conn
        .prepare("SELECT * FROM agents ORDER BY started_at DESC LIMIT ?1")
        .map_err(|e| EngineError::Store(e.to_string()))?;
    let rows = stmt
        .query_map(params![limit], row_to_agent)
        .map_err(|e| EngineError::Store(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(rows)
}

pub(crate) fn list_active(conn: &Connection) -> EngineResult<Vec<Agent>> {
    let mut stmt = conn
        .prepare("SELECT * FROM agents WHERE status IN ('starting', 'running') ORDER BY started_at ASC")
        .map_err(|e| EngineError::Store(e.to_string()))?;
    let rows = stmt
        .query_map([], row_to_agent)
        .map_err(|e| EngineError::Store(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(rows)
}

pub(crate) fn count_running(conn: &Connection) -> EngineResult<u64> {
    conn.query_row("SELECT COUNT(*) FROM agents WHERE status = 'running'", [], |r| r.get(0))
        .map_err(|e| EngineError::Store(e.to_string()))
}

impl Store {
    pub fn insert_agent(&self, agent: &Agent) -> EngineResult<()> {
        insert(&self.conn.lock(), agent)
    }

    pub fn update_agent(&self, agent: &Agent) -> EngineResult<()> {
        update(&self.conn.lock(), agent)
    }

    /// Exact id or unique prefix (spec §4.3 "getById"); ambiguous prefixes
    /// are a validation error rather than an arbitrary pick.
    pub fn get_agent(&self, id: &str) -> EngineResult<Option<Agent>> {
        get(&self.conn.lock(), id)
    }

    pub fn list_agents(&self, limit: u32) -> EngineResult<Vec<Agent>> {
        list(&self.conn.lock(), limit)
    }

    pub fn list_active_agents(&self) -> EngineResult<Vec<Agent>> {
        list_active(&self.conn.lock())
    }

    pub fn count_running_agents(&self) -> EngineResult<u64> {
        count_running(&self.conn.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wfe_core::TaskId;

    fn seed_task(store: &Store, id: &TaskId) {
        let task = wfe_core::Task::new(id.clone(), "t", "d", Utc::now());
        store.insert_task(&task).unwrap();
    }

    #[test]
    fn insert_get_update_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let task_id = TaskId::random();
        seed_task(&store, &task_id);

        let agent = Agent::new(AgentId::with_prefix("coding"), task_id, AgentKind::Coding, Utc::now());
        store.insert_agent(&agent).unwrap();

        let fetched = store.get_agent(agent.id.as_str()).unwrap().unwrap();
        assert_eq!(fetched.id, agent.id);
        assert_eq!(fetched.status, AgentStatus::Starting);

        let mut updated = fetched;
        updated.status = AgentStatus::Running;
        updated.sandbox_handle = Some("container-1".into());
        store.update_agent(&updated).unwrap();

        let refetched = store.get_agent(updated.id.as_str()).unwrap().unwrap();
        assert_eq!(refetched.status, AgentStatus::Running);
        assert_eq!(refetched.sandbox_handle.as_deref(), Some("container-1"));
    }

    #[test]
    fn prefix_lookup_resolves_unique_prefix() {
        let store = Store::open_in_memory().unwrap();
        let task_id = TaskId::random();
        seed_task(&store, &task_id);
        let agent = Agent::new(AgentId::with_prefix("coding"), task_id, AgentKind::Coding, Utc::now());
        store.insert_agent(&agent).unwrap();

        let short = &agent.id.as_str()[..agent.id.as_str().len() - 2];
        let found = store.get_agent(short).unwrap().unwrap();
        assert_eq!(found.id, agent.id);
    }

    #[test]
    fn count_running_only_counts_running_status() {
        let store = Store::open_in_memory().unwrap();
        let task_id = TaskId::random();
        seed_task(&store, &task_id);
        let mut agent = Agent::new(AgentId::with_prefix("coding"), task_id, AgentKind::Coding, Utc::now());
        store.insert_agent(&agent).unwrap();
        assert_eq!(store.count_running_agents().unwrap(), 0);

        agent.status = AgentStatus::Running;
        store.update_agent(&agent).unwrap();
        assert_eq!(store.count_running_agents().unwrap(), 1);
    }
}
