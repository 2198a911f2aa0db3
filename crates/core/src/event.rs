// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types (spec §3 "Event", §6 "Event payloads").
//!
//! Design Notes call for replacing a string-typed switch on event kind with
//! a tagged sum type the router matches exhaustively. `EventPayload` is
//! that sum type: each §6 payload shape is its own variant carrying a typed
//! struct, keyed on the wire by its `type` field. Anything outside the
//! closed set deserializes to `Other`, which the router logs a warning for
//! and otherwise ignores (spec §4.4 "anything else: log warning; leave
//! pending").

use crate::id::{AgentId, EventId, TaskId};
use chrono::{DateTime, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedFile {
    pub path: String,
    pub action: FileAction,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Create,
    Modify,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

/// The richer of the two execution-plan shapes (spec §9 Open Questions:
/// "the richer shape is used by the coding handler and is the one
/// specified"). The minimal `{steps, context?}` shape from the older type
/// file is dead and intentionally not modeled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub summary: String,
    pub affected_files: Vec<AffectedFile>,
    pub steps: Vec<String>,
    pub testing_strategy: String,
    #[serde(default)]
    pub risks: Option<String>,
    #[serde(default)]
    pub estimated_complexity: Option<Complexity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCloseReason {
    AlreadyResolved,
    Duplicate,
    Invalid,
    WontFix,
    NoActionNeeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugReport {
    pub description: String,
    pub steps: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    Bug,
    Ux,
    Performance,
    Security,
    Accessibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: FindingCategory,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub steps: Option<String>,
    #[serde(default)]
    pub screenshot: Option<String>,
}

macro_rules! payload {
    ($name:ident { $($(#[$meta:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            pub task_id: TaskId,
            $($(#[$meta])* pub $field: $ty,)*
        }
    };
}

payload!(TaskAssigned {
    title: String,
    description: String,
    repo: String,
    #[serde(default)] repos: Option<Vec<String>>,
    #[serde(default)] investigation_only: Option<bool>,
});

payload!(TaskPlanCreated {
    repo: String,
    plan: ExecutionPlan,
});

payload!(TaskClosed {
    reason: String,
    resolution: TaskCloseReason,
});

payload!(DeployRequested {
    repo: String,
    reason: String,
    #[serde(default)] commit: Option<String>,
});

payload!(PrCreated {
    repo: String,
    pr_number: u64,
    pr_url: String,
    branch: String,
});

payload!(PrUpdated {
    repo: String,
    pr_number: u64,
    pr_url: String,
    branch: String,
});

payload!(PrChangesRequested {
    repo: String,
    pr_number: u64,
    branch: String,
    review_comments: String,
});

payload!(PrMerged {
    repo: String,
    pr_number: u64,
    merge_commit: String,
    #[serde(default)] branch: Option<String>,
    #[serde(default)] commit_sha: Option<String>,
});

payload!(DeployCompleted {
    repo: String,
    url: String,
    status: String,
});

payload!(DeployFailed {
    repo: String,
    error: String,
    #[serde(default)] logs: Option<String>,
});

payload!(VerifyPassed {
    repo: String,
    summary: String,
});

payload!(VerifyFailed {
    repo: String,
    bug: BugReport,
});

payload!(AuditRequested {
    repo: String,
    url: String,
    #[serde(default)] focus_areas: Option<Vec<String>>,
});

payload!(AuditFinding {
    repo: String,
    #[serde(default)] parent_id: Option<TaskId>,
    finding: Finding,
});

payload!(AuditCompleted {
    repo: String,
    summary: String,
    findings_count: u64,
    duration: String,
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEscalation {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub reason: String,
    #[serde(default)]
    pub context: Option<Value>,
}

/// The closed set of event kinds (spec §6), as a tagged sum type.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    TaskAssigned(TaskAssigned),
    TaskPlanCreated(TaskPlanCreated),
    TaskClosed(TaskClosed),
    DeployRequested(DeployRequested),
    PrCreated(PrCreated),
    PrUpdated(PrUpdated),
    PrChangesRequested(PrChangesRequested),
    PrMerged(PrMerged),
    DeployCompleted(DeployCompleted),
    DeployFailed(DeployFailed),
    VerifyPassed(VerifyPassed),
    VerifyFailed(VerifyFailed),
    AuditRequested(AuditRequested),
    AuditFinding(AuditFinding),
    AuditCompleted(AuditCompleted),
    AgentEscalation(AgentEscalation),
    /// Anything outside the closed set. Carries the raw `type` tag and the
    /// full JSON object so a handler-level audit trail is preserved even
    /// though the router does nothing but warn-log it.
    Other(String, Value),
}

impl EventPayload {
    /// The dotted kind string used in spool filenames and the public API.
    pub fn kind_str(&self) -> &str {
        match self {
            EventPayload::TaskAssigned(_) => "task.assigned",
            EventPayload::TaskPlanCreated(_) => "task.plan.created",
            EventPayload::TaskClosed(_) => "task.closed",
            EventPayload::DeployRequested(_) => "deploy.requested",
            EventPayload::PrCreated(_) => "pr.created",
            EventPayload::PrUpdated(_) => "pr.updated",
            EventPayload::PrChangesRequested(_) => "pr.changes.requested",
            EventPayload::PrMerged(_) => "pr.merged",
            EventPayload::DeployCompleted(_) => "deploy.completed",
            EventPayload::DeployFailed(_) => "deploy.failed",
            EventPayload::VerifyPassed(_) => "verify.passed",
            EventPayload::VerifyFailed(_) => "verify.failed",
            EventPayload::AuditRequested(_) => "audit.requested",
            EventPayload::AuditFinding(_) => "audit.finding",
            EventPayload::AuditCompleted(_) => "audit.completed",
            EventPayload::AgentEscalation(_) => "agent.escalation",
            EventPayload::Other(kind, _) => kind,
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            EventPayload::TaskAssigned(p) => Some(&p.task_id),
            EventPayload::TaskPlanCreated(p) => Some(&p.task_id),
            EventPayload::TaskClosed(p) => Some(&p.task_id),
            EventPayload::DeployRequested(p) => Some(&p.task_id),
            EventPayload::PrCreated(p) => Some(&p.task_id),
            EventPayload::PrUpdated(p) => Some(&p.task_id),
            EventPayload::PrChangesRequested(p) => Some(&p.task_id),
            EventPayload::PrMerged(p) => Some(&p.task_id),
            EventPayload::DeployCompleted(p) => Some(&p.task_id),
            EventPayload::DeployFailed(p) => Some(&p.task_id),
            EventPayload::VerifyPassed(p) => Some(&p.task_id),
            EventPayload::VerifyFailed(p) => Some(&p.task_id),
            EventPayload::AuditRequested(p) => Some(&p.task_id),
            EventPayload::AuditFinding(p) => Some(&p.task_id),
            EventPayload::AuditCompleted(p) => Some(&p.task_id),
            EventPayload::AgentEscalation(p) => Some(&p.task_id),
            EventPayload::Other(_, _) => None,
        }
    }

    /// `kind_str` plus dots replaced by dashes, used in the spool filename
    /// (spec §6 "Spool file name").
    pub fn kind_dashed(&self) -> String {
        self.kind_str().replace('.', "-")
    }
}

impl Serialize for EventPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut value = match self {
            EventPayload::TaskAssigned(p) => serde_json::to_value(p),
            EventPayload::TaskPlanCreated(p) => serde_json::to_value(p),
            EventPayload::TaskClosed(p) => serde_json::to_value(p),
            EventPayload::DeployRequested(p) => serde_json::to_value(p),
            EventPayload::PrCreated(p) => serde_json::to_value(p),
            EventPayload::PrUpdated(p) => serde_json::to_value(p),
            EventPayload::PrChangesRequested(p) => serde_json::to_value(p),
            EventPayload::PrMerged(p) => serde_json::to_value(p),
            EventPayload::DeployCompleted(p) => serde_json::to_value(p),
            EventPayload::DeployFailed(p) => serde_json::to_value(p),
            EventPayload::VerifyPassed(p) => serde_json::to_value(p),
            EventPayload::VerifyFailed(p) => serde_json::to_value(p),
            EventPayload::AuditRequested(p) => serde_json::to_value(p),
            EventPayload::AuditFinding(p) => serde_json::to_value(p),
            EventPayload::AuditCompleted(p) => serde_json::to_value(p),
            EventPayload::AgentEscalation(p) => serde_json::to_value(p),
            EventPayload::Other(_, v) => Ok(v.clone()),
        }
        .map_err(serde::ser::Error::custom)?;
        if let Value::Object(ref mut map) = value {
            map.insert("type".to_string(), Value::String(self.kind_str().to_string()));
        }
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EventPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;
        let kind = value
            .as_object()
            .and_then(|m| m.get("type"))
            .and_then(Value::as_str)
            .ok_or_else(|| DeError::custom("event payload missing \"type\""))?
            .to_string();
        if let Value::Object(ref mut map) = value {
            map.remove("type");
        }
        macro_rules! parse {
            ($variant:ident, $ty:ty) => {
                serde_json::from_value::<$ty>(value.clone())
                    .map(EventPayload::$variant)
                    .map_err(DeError::custom)
            };
        }
        match kind.as_str() {
            "task.assigned" => parse!(TaskAssigned, TaskAssigned),
            "task.plan.created" => parse!(TaskPlanCreated, TaskPlanCreated),
            "task.closed" => parse!(TaskClosed, TaskClosed),
            "deploy.requested" => parse!(DeployRequested, DeployRequested),
            "pr.created" => parse!(PrCreated, PrCreated),
            "pr.updated" => parse!(PrUpdated, PrUpdated),
            "pr.changes.requested" => parse!(PrChangesRequested, PrChangesRequested),
            "pr.merged" => parse!(PrMerged, PrMerged),
            "deploy.completed" => parse!(DeployCompleted, DeployCompleted),
            "deploy.failed" => parse!(DeployFailed, DeployFailed),
            "verify.passed" => parse!(VerifyPassed, VerifyPassed),
            "verify.failed" => parse!(VerifyFailed, VerifyFailed),
            "audit.requested" => parse!(AuditRequested, AuditRequested),
            "audit.finding" => parse!(AuditFinding, AuditFinding),
            "audit.completed" => parse!(AuditCompleted, AuditCompleted),
            "agent.escalation" => parse!(AgentEscalation, AgentEscalation),
            other => Ok(EventPayload::Other(other.to_string(), value)),
        }
    }
}

/// A durable, append-only record on the spool (spec §3 "Event").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload, source: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { id: EventId::new_uuid(), timestamp: now, source: source.into(), payload }
    }

    pub fn kind_str(&self) -> &str {
        self.payload.kind_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventPayload {
        EventPayload::TaskAssigned(TaskAssigned {
            task_id: TaskId::from("t1"),
            title: "Add /ping".into(),
            description: "desc".into(),
            repo: "svc-a".into(),
            repos: None,
            investigation_only: None,
        })
    }

    #[test]
    fn round_trips_through_json() {
        let payload = sample();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "task.assigned");
        let back: EventPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn unknown_kind_falls_back_to_other() {
        let json = serde_json::json!({"type": "mystery.event", "foo": "bar"});
        let parsed: EventPayload = serde_json::from_value(json).unwrap();
        match parsed {
            EventPayload::Other(kind, value) => {
                assert_eq!(kind, "mystery.event");
                assert_eq!(value["foo"], "bar");
            }
            _ => panic!("expected Other"),
        }
    }

    #[test]
    fn kind_dashed_replaces_dots() {
        assert_eq!(sample().kind_dashed(), "task-assigned");
        let plan_created = EventPayload::TaskPlanCreated(TaskPlanCreated {
            task_id: TaskId::from("t1"),
            repo: "svc-a".into(),
            plan: ExecutionPlan {
                summary: "s".into(),
                affected_files: vec![],
                steps: vec![],
                testing_strategy: "t".into(),
                risks: None,
                estimated_complexity: None,
            },
        });
        assert_eq!(plan_created.kind_dashed(), "task-plan-created");
    }
}
