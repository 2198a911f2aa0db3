// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `AgentSpawnRequest` (spec §4.3): everything the spawn algorithm needs,
//! whether supplied directly by a caller of `POST /agents/spawn` or built
//! by the router from an event payload.

use wfe_core::{AgentKind, TaskId};

#[derive(Debug, Clone, Default)]
pub struct AgentSpawnRequest {
    pub task_id: TaskId,
    pub repo: String,
    pub title: String,
    pub description: String,
    pub kind: AgentKind,

    /// Reviewer flow: PR to attach to.
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    /// Reviewer flow / fix-up coding flow branch checkout target (spec
    /// §4.3.1).
    pub branch: Option<String>,
    /// Verifier flow.
    pub deployment_url: Option<String>,
    /// Auditor flow.
    pub focus_areas: Option<Vec<String>>,
    /// Fix-up coding flow: review comments carried into the prompt, and the
    /// branch to resume rather than create fresh.
    pub review_feedback: Option<String>,
    pub existing_branch: Option<String>,
    /// Fix-up coding flow: the prior execution plan, carried forward.
    pub prior_plan: Option<serde_json::Value>,

    /// Pre-built prompt text. The prompt builder itself is an external
    /// collaborator; the ALM only ever writes whatever text it is given.
    pub prompt: String,
    /// Notified with a completion payload once the agent reaches a
    /// terminal state (spec §4.3 "Exit handling").
    pub callback_url: Option<String>,
}

impl AgentSpawnRequest {
    pub fn new(task_id: TaskId, repo: impl Into<String>, title: impl Into<String>, description: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            task_id,
            repo: repo.into(),
            title: title.into(),
            description: description.into(),
            kind: AgentKind::default(),
            pr_number: None,
            pr_url: None,
            branch: None,
            deployment_url: None,
            focus_areas: None,
            review_feedback: None,
            existing_branch: None,
            prior_plan: None,
            prompt: prompt.into(),
            callback_url: None,
        }
    }

    pub fn with_kind(mut self, kind: AgentKind) -> Self {
        self.kind = kind;
        self
    }
}
