// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent data model (spec §3): one execution of a sandboxed assistant.

use crate::id::AgentId;
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which kind of agent a row represents. Fixed per-kind timeouts live here
/// (spec §4.3.2) since they're an intrinsic property of the kind, not
/// runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Triage,
    Coding,
    Reviewer,
    Deployer,
    Verifier,
    Auditor,
    Healthcheck,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Triage => "triage",
            AgentKind::Coding => "coding",
            AgentKind::Reviewer => "reviewer",
            AgentKind::Deployer => "deployer",
            AgentKind::Verifier => "verifier",
            AgentKind::Auditor => "auditor",
            AgentKind::Healthcheck => "healthcheck",
        }
    }

    /// Fixed per-kind watchdog duration (spec §4.3.2).
    pub fn timeout(&self) -> Duration {
        let minutes = match self {
            AgentKind::Triage => 10,
            AgentKind::Coding => 120,
            AgentKind::Reviewer => 30,
            AgentKind::Deployer => 30,
            AgentKind::Verifier => 30,
            AgentKind::Auditor => 45,
            AgentKind::Healthcheck => 60,
        };
        Duration::from_secs(minutes * 60)
    }

    /// Deployer and healthcheck agents run directly on the host rather than
    /// in an image-backed sandbox, so the spawn algorithm skips the
    /// sandbox-image check and repository clone for them (spec §4.3 step 3).
    pub fn is_host_mode(&self) -> bool {
        matches!(self, AgentKind::Deployer | AgentKind::Healthcheck)
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for AgentKind {
    /// Spec §4.3: "kind (default triage)".
    fn default() -> Self {
        AgentKind::Triage
    }
}

/// Lifecycle status of an Agent row (spec §3 invariants: exactly one status
/// at all times; `completed_at` present iff terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    Running,
    Completed,
    Failed,
    Timeout,
    Killed,
}

impl AgentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Completed | AgentStatus::Failed | AgentStatus::Timeout | AgentStatus::Killed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Starting => "starting",
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
            AgentStatus::Timeout => "timeout",
            AgentStatus::Killed => "killed",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One execution of a sandboxed assistant (spec §3 "Agent").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub task_id: TaskId,
    /// Container id or host process id; `None` before the sandbox starts.
    pub sandbox_handle: Option<String>,
    pub kind: AgentKind,
    pub status: AgentStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    /// Freeform metadata (spec §3): PR number/url, branch, deployment url, etc.
    pub metadata: serde_json::Value,
}

impl Agent {
    pub fn new(id: AgentId, task_id: TaskId, kind: AgentKind, now: DateTime<Utc>) -> Self {
        Self {
            id,
            task_id,
            sandbox_handle: None,
            kind,
            status: AgentStatus::Starting,
            started_at: now,
            completed_at: None,
            exit_code: None,
            error: None,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    /// Enforces the §3 invariant that `completed_at` is present iff the
    /// status is terminal, and that a terminal agent carries no dangling
    /// sandbox handle implying it's still tracked.
    pub fn invariants_hold(&self) -> bool {
        self.status.is_terminal() == self.completed_at.is_some()
    }
}

/// Which stream a log line came from (spec §3 "AgentLogLine").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Out,
    Err,
    Combined,
}

impl LogStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStream::Out => "out",
            LogStream::Err => "err",
            LogStream::Combined => "combined",
        }
    }
}

/// One line appended to an agent's log (spec §3 "AgentLogLine").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLogLine {
    /// Monotonically increasing local id, assigned by the Store on insert.
    pub id: i64,
    pub agent_id: AgentId,
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_match_spec_table() {
        assert_eq!(AgentKind::Triage.timeout(), Duration::from_secs(10 * 60));
        assert_eq!(AgentKind::Coding.timeout(), Duration::from_secs(120 * 60));
        assert_eq!(AgentKind::Reviewer.timeout(), Duration::from_secs(30 * 60));
        assert_eq!(AgentKind::Deployer.timeout(), Duration::from_secs(30 * 60));
        assert_eq!(AgentKind::Verifier.timeout(), Duration::from_secs(30 * 60));
        assert_eq!(AgentKind::Auditor.timeout(), Duration::from_secs(45 * 60));
        assert_eq!(AgentKind::Healthcheck.timeout(), Duration::from_secs(60 * 60));
    }

    #[test]
    fn host_mode_kinds() {
        assert!(AgentKind::Deployer.is_host_mode());
        assert!(AgentKind::Healthcheck.is_host_mode());
        assert!(!AgentKind::Coding.is_host_mode());
    }

    #[test]
    fn fresh_agent_satisfies_invariants() {
        let agent = Agent::new(
            AgentId::with_prefix("coding"),
            TaskId::random(),
            AgentKind::Coding,
            Utc::now(),
        );
        assert!(agent.invariants_hold());
        assert_eq!(agent.status, AgentStatus::Starting);
    }

    #[test]
    fn terminal_without_completed_at_violates_invariant() {
        let mut agent = Agent::new(
            AgentId::with_prefix("coding"),
            TaskId::random(),
            AgentKind::Coding,
            Utc::now(),
        );
        agent.status = AgentStatus::Completed;
        assert!(!agent.invariants_hold());
    }
}
