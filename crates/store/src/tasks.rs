// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task CRUD.

use crate::Store;
use rusqlite::{params, Connection, OptionalExtension, Row};
use wfe_core::{AgentId, EngineError, EngineResult, Task, TaskId, TaskStatus};

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status_str: String = row.get("status")?;
    let repos_str: String = row.get("repos")?;
    let plan_str: Option<String> = row.get("plan")?;
    let assigned: Option<String> = row.get("assigned_agent_id")?;
    Ok(Task {
        id: TaskId::from(row.get::<_, String>("id")?),
        title: row.get("title")?,
        description: row.get("description")?,
        kind: row.get("kind")?,
        status: parse_status(&status_str),
        repo: row.get("repo")?,
        repos: serde_json::from_str(&repos_str).unwrap_or_default(),
        investigation_only: row.get::<_, i64>("investigation_only")? != 0,
        plan: plan_str.and_then(|s| serde_json::from_str(&s).ok()),
        assigned_agent_id: assigned.map(AgentId::from),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "pending" => TaskStatus::Pending,
        "queued" => TaskStatus::Queued,
        "assigned" => TaskStatus::Assigned,
        "in_progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        other => unreachable!("unknown task status persisted: {other}"),
    }
}

pub(crate) fn insert(conn: &Connection, task: &Task) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO tasks (id, title, description, kind, status, repo, repos, investigation_only, plan, assigned_agent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            task.id.as_str(),
            task.title,
            task.description,
            task.kind,
            task.status.as_str(),
            task.repo,
            serde_json::to_string(&task.repos).unwrap_or_else(|_| "[]".to_string()),
            task.investigation_only as i64,
            task.plan.as_ref().map(|v| v.to_string()),
            task.assigned_agent_id.as_ref().map(|a| a.as_str().to_string()),
            task.created_at,
            task.updated_at,
        ],
    )
    .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(())
}

pub(crate) fn update(conn: &Connection, task: &Task) -> EngineResult<()> {
    let n = conn
        .execute(
            "UPDATE tasks SET title = ?2, description = ?3, kind = ?4, status = ?5, repo = ?6, repos = ?7,
                investigation_only = ?8, plan = ?9, assigned_agent_id = ?10, updated_at = ?11
             WHERE id = ?1",
            params![
                task.id.as_str(),
                task.title,
                task.description,
                task.kind,
                task.status.as_str(),
                task.repo,
                serde_json::to_string(&task.repos).unwrap_or_else(|_| "[]".to_string()),
                task.investigation_only as i64,
                task.plan.as_ref().map(|v| v.to_string()),
                task.assigned_agent_id.as_ref().map(|a| a.as_str().to_string()),
                task.updated_at,
            ],
        )
        .map_err(|e| EngineError::Store(e.to_string()))?;
    if n == 0 {
        return Err(EngineError::not_found(format!("task {}", task.id)));
    }
    Ok(())
}

pub(crate) fn get(conn: &Connection, id: &str) -> EngineResult<Option<Task>> {
    conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
        .optional()
        .map_err(|e| EngineError::Store(e.to_string()))
}

impl Store {
    pub fn insert_task(&self, task: &Task) -> EngineResult<()> {
        insert(&self.conn.lock(), task)
    }

    pub fn update_task(&self, task: &Task) -> EngineResult<()> {
        update(&self.conn.lock(), task)
    }

    pub fn get_task(&self, id: &str) -> EngineResult<Option<Task>> {
        get(&self.conn.lock(), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn insert_get_update_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let mut task = Task::new(TaskId::random(), "Add /ping", "desc", Utc::now());
        task.repo = Some("svc-a".into());
        store.insert_task(&task).unwrap();

        let fetched = store.get_task(task.id.as_str()).unwrap().unwrap();
        assert_eq!(fetched.title, "Add /ping");
        assert_eq!(fetched.primary_repo(), Some("svc-a"));

        let mut updated = fetched;
        updated.status = TaskStatus::Assigned;
        updated.assigned_agent_id = Some(AgentId::with_prefix("coding"));
        store.update_task(&updated).unwrap();

        let refetched = store.get_task(updated.id.as_str()).unwrap().unwrap();
        assert_eq!(refetched.status, TaskStatus::Assigned);
        assert!(refetched.invariants_hold());
    }

    #[test]
    fn update_missing_task_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let task = Task::new(TaskId::random(), "t", "d", Utc::now());
        let err = store.update_task(&task).unwrap_err();
        assert_eq!(err.kind(), "not-found");
    }
}
