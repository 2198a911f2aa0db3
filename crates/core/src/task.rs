// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task mirror (spec §3 "Task (mirror)"): the minimal subset of upstream
//! task metadata the engine needs to route workflow.

pub use crate::id::TaskId;
use crate::id::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    Assigned,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Queued => "queued",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    /// Task kind, e.g. "feature", "bug" — opaque to the engine except where
    /// the router inserts kind="bug" tasks from verify/audit findings.
    pub kind: String,
    pub status: TaskStatus,
    pub repo: Option<String>,
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub investigation_only: bool,
    /// Serialized execution plan (spec §6 `task.plan.created`), persisted
    /// verbatim once the router receives it.
    pub plan: Option<serde_json::Value>,
    pub assigned_agent_id: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>, description: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            kind: "task".to_string(),
            status: TaskStatus::Pending,
            repo: None,
            repos: Vec::new(),
            investigation_only: false,
            plan: None,
            assigned_agent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Primary repository resolution (spec §4.5 step 5): `repo`, else the
    /// first entry of `repos`.
    pub fn primary_repo(&self) -> Option<&str> {
        self.repo.as_deref().or_else(|| self.repos.first().map(String::as_str))
    }

    /// Invariant from spec §3: `assigned_agent_id` is non-null iff status
    /// is in {assigned, in_progress}.
    pub fn invariants_hold(&self) -> bool {
        let should_be_assigned = matches!(self.status, TaskStatus::Assigned | TaskStatus::InProgress);
        self.assigned_agent_id.is_some() == should_be_assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_repo_prefers_repo_field() {
        let mut t = Task::new(TaskId::random(), "t", "d", Utc::now());
        t.repos = vec!["fallback".into()];
        assert_eq!(t.primary_repo(), Some("fallback"));
        t.repo = Some("primary".into());
        assert_eq!(t.primary_repo(), Some("primary"));
    }

    #[test]
    fn no_repo_and_empty_repos_is_none() {
        let t = Task::new(TaskId::random(), "t", "d", Utc::now());
        assert_eq!(t.primary_repo(), None);
    }

    #[test]
    fn fresh_task_satisfies_assignment_invariant() {
        let t = Task::new(TaskId::random(), "t", "d", Utc::now());
        assert!(t.invariants_hold());
    }
}
