// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Agent Lifecycle Manager (spec §4.3): spawn, kill, exit handling, and
//! crash recovery, built on top of the Store and a pair of sandbox drivers
//! (host-process and container-backed).

use crate::logs::LogRing;
use crate::request::AgentSpawnRequest;
use crate::{exit, recovery, workspace};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use wfe_core::{
    scrub_secrets, Agent, AgentId, AgentKind, AgentLogLine, AgentStatus, EngineError, EngineResult,
    Task, TaskId, TaskStatus,
};
use wfe_sandbox::{SandboxDriver, SandboxHandle, SandboxSpec};
use wfe_store::{AgentAnalytics, Store};

/// Everything the spawn algorithm needs that would otherwise be an ambient
/// module-scoped constant (spec §9 Design Notes: "hoist into a single,
/// explicitly-passed configuration value constructed at startup").
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Parent directory under which each agent gets `<workspace_root>/<id>`.
    pub workspace_root: PathBuf,
    /// Image used for container-backed (non-host-mode) agents.
    pub sandbox_image: String,
    /// Binary invoked inside the sandbox; receives the prompt file path.
    pub agent_runner: String,
    /// Base URL the sandbox uses to call back into this engine's public
    /// interface.
    pub api_base_url: Option<String>,
    /// Credential token passed to the sandboxed process's environment.
    pub agent_credential: Option<String>,
    /// Base URL of the upstream task tracker that receives result comments.
    pub upstream_base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    Killed,
    Timeout,
}

impl KillReason {
    fn status(self) -> AgentStatus {
        match self {
            KillReason::Killed => AgentStatus::Killed,
            KillReason::Timeout => AgentStatus::Timeout,
        }
    }
}

struct ActiveAgent {
    driver: Arc<dyn SandboxDriver>,
    handle: SandboxHandle,
    cancel_timeout: Option<oneshot::Sender<()>>,
}

/// Owns the in-memory active-agent map and per-agent log rings exclusively
/// (spec §5 "Shared resource policy" — these must never be reached from
/// other components).
pub struct Manager {
    store: Arc<Store>,
    host_driver: Arc<dyn SandboxDriver>,
    container_driver: Arc<dyn SandboxDriver>,
    config: ManagerConfig,
    http: reqwest::Client,
    active: Mutex<HashMap<AgentId, ActiveAgent>>,
    rings: Mutex<HashMap<AgentId, LogRing>>,
}

impl Manager {
    pub fn new(
        store: Arc<Store>,
        host_driver: Arc<dyn SandboxDriver>,
        container_driver: Arc<dyn SandboxDriver>,
        config: ManagerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            host_driver,
            container_driver,
            config,
            http: reqwest::Client::new(),
            active: Mutex::new(HashMap::new()),
            rings: Mutex::new(HashMap::new()),
        })
    }

    /// Crash recovery sweep (spec §4.3.4), run once at process start.
    /// Best-effort: never blocks or propagates an error to the caller.
    pub async fn recover(&self) {
        recovery::sweep(&self.store, self.container_driver.as_ref()).await;
    }

    /// Runs the combined 1 s log-flush tick until `stop` trips (spec
    /// §4.3.3).
    pub async fn run_log_flush_ticker(&self, stop: wfe_core::StopSignal) {
        wfe_core::run_ticker(crate::logs::FLUSH_TICK, stop, || async {
            let rings: Vec<(AgentId, LogRing)> =
                self.rings.lock().iter().map(|(id, ring)| (id.clone(), ring.clone())).collect();
            for (id, ring) in rings {
                self.flush_ring(&id, &ring).await;
            }
        })
        .await;
    }

    pub fn list_agents(&self, limit: u32) -> EngineResult<Vec<Agent>> {
        self.store.list_agents(limit)
    }

    pub fn list_active_agents(&self) -> EngineResult<Vec<Agent>> {
        self.store.list_active_agents()
    }

    pub fn get_agent(&self, id: &str) -> EngineResult<Option<Agent>> {
        self.store.get_agent(id)
    }

    pub fn get_agent_logs(&self, id: &str) -> EngineResult<Vec<AgentLogLine>> {
        self.store.get_agent_logs(id)
    }

    pub fn analytics(&self) -> EngineResult<AgentAnalytics> {
        self.store.agent_analytics()
    }

    /// Spawn algorithm (spec §4.3 steps 1–9). On any failure before the
    /// monitor attaches, step 10 reverts the task and marks the agent
    /// failed with sanitized error text.
    pub async fn spawn(self: &Arc<Self>, req: AgentSpawnRequest) -> EngineResult<Agent> {
        let id = AgentId::with_prefix(req.kind.as_str());
        let now = Utc::now();

        let mut task = self
            .store
            .get_task(req.task_id.as_str())?
            .ok_or_else(|| EngineError::not_found(format!("task {}", req.task_id)))?;

        let mut agent = Agent::new(id.clone(), req.task_id.clone(), req.kind, now);
        agent.metadata = build_metadata(&req);
        self.store.insert_agent(&agent)?;

        task.status = TaskStatus::Assigned;
        task.assigned_agent_id = Some(id.clone());
        task.updated_at = now;
        self.store.update_task(&task)?;

        if let Err(e) = self.try_start(&mut agent, &req).await {
            let sanitized = scrub_secrets(&e.to_string());
            agent.status = AgentStatus::Failed;
            agent.error = Some(sanitized);
            agent.completed_at = Some(Utc::now());
            let _ = self.store.update_agent(&agent);

            task.status = TaskStatus::Queued;
            task.assigned_agent_id = None;
            task.updated_at = Utc::now();
            let _ = self.store.update_task(&task);

            let workspace = self.config.workspace_root.join(id.as_str());
            let _ = tokio::fs::remove_dir_all(&workspace).await;

            return Err(e);
        }

        Ok(agent)
    }

    /// Spec §4.3 steps 3–9: sandbox-image gate, workspace prep, prompt
    /// write, sandbox invocation, and attaching the watchdog/log/monitor
    /// tasks.
    async fn try_start(self: &Arc<Self>, agent: &mut Agent, req: &AgentSpawnRequest) -> EngineResult<()> {
        let host_mode = req.kind.is_host_mode();
        let driver: Arc<dyn SandboxDriver> =
            if host_mode { self.host_driver.clone() } else { self.container_driver.clone() };

        let workspace = if host_mode {
            let dir = self.config.workspace_root.join(agent.id.as_str());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| EngineError::Sandbox(format!("failed to create workspace dir: {e}")))?;
            dir
        } else {
            if !self.container_driver.image_available(&self.config.sandbox_image).await? {
                return Err(EngineError::Sandbox(format!(
                    "sandbox image not available: {}",
                    self.config.sandbox_image
                )));
            }
            workspace::prepare(&self.config.workspace_root, agent.id.as_str(), req).await?
        };

        let prompt_path = workspace.join("PROMPT.md");
        tokio::fs::write(&prompt_path, &req.prompt)
            .await
            .map_err(|e| EngineError::Sandbox(format!("failed to write prompt: {e}")))?;

        let mut env = HashMap::new();
        env.insert("WFE_TASK_ID".to_string(), agent.task_id.as_str().to_string());
        env.insert("WFE_AGENT_ID".to_string(), agent.id.as_str().to_string());
        if let Some(base) = &self.config.api_base_url {
            env.insert("WFE_API_BASE_URL".to_string(), base.clone());
        }
        if let Some(token) = &self.config.agent_credential {
            env.insert("WFE_AGENT_TOKEN".to_string(), token.clone());
        }

        let argv = vec![
            self.config.agent_runner.clone(),
            "--prompt-file".to_string(),
            "PROMPT.md".to_string(),
        ];
        let spec = if host_mode {
            SandboxSpec::host_mode(workspace.clone(), argv, env)
        } else {
            SandboxSpec::containerized(workspace.clone(), self.config.sandbox_image.clone(), argv, env)
        };

        let started = driver.start(spec).await?;

        agent.sandbox_handle = Some(started.handle.0.clone());
        agent.status = AgentStatus::Running;
        self.store.update_agent(agent)?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.active.lock().insert(
            agent.id.clone(),
            ActiveAgent { driver: driver.clone(), handle: started.handle.clone(), cancel_timeout: Some(cancel_tx) },
        );

        self.spawn_timeout_watchdog(agent.id.clone(), req.kind.timeout(), cancel_rx);
        self.spawn_monitor(agent.id.clone(), started);

        Ok(())
    }

    fn spawn_timeout_watchdog(self: &Arc<Self>, agent_id: AgentId, duration: std::time::Duration, mut cancel_rx: oneshot::Receiver<()>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    if let Err(e) = manager.kill(agent_id.as_str(), KillReason::Timeout).await {
                        tracing::warn!(agent_id = %agent_id, error = %e, "timeout watchdog failed to kill agent");
                    }
                }
                _ = &mut cancel_rx => {}
            }
        });
    }

    fn spawn_monitor(self: &Arc<Self>, agent_id: AgentId, mut started: wfe_sandbox::Started) {
        let manager = Arc::clone(self);
        let ring = LogRing::new();
        self.rings.lock().insert(agent_id.clone(), ring.clone());

        tokio::spawn(async move {
            while let Some(chunk) = started.logs.recv().await {
                if ring.push(chunk.stream, chunk.line, Utc::now()) {
                    manager.flush_ring(&agent_id, &ring).await;
                }
            }
            manager.flush_ring(&agent_id, &ring).await;
            manager.rings.lock().remove(&agent_id);

            let exit_code = started.exit.await.unwrap_or(None);
            manager.handle_exit(agent_id, exit_code).await;
        });
    }

    async fn flush_ring(&self, agent_id: &AgentId, ring: &LogRing) {
        let lines = ring.drain();
        if lines.is_empty() {
            return;
        }
        if let Err(e) = self.store.append_log_lines(agent_id, &lines) {
            tracing::warn!(agent_id = %agent_id, error = %e, "failed to flush agent log lines");
        }
    }

    /// Exit handling (spec §4.3 "Exit handling"). Runs whether the sandbox
    /// exited on its own or was killed; `agent.status` already being
    /// terminal (set by `kill`) means the computed completed/failed status
    /// below is skipped, but the rest of the pipeline (comment post,
    /// callback, workspace purge) still runs.
    async fn handle_exit(self: &Arc<Self>, agent_id: AgentId, observed_exit_code: Option<i32>) {
        if let Some(active) = self.active.lock().remove(&agent_id) {
            if let Some(cancel) = active.cancel_timeout {
                let _ = cancel.send(());
            }
        }

        let Ok(Some(mut agent)) = self.store.get_agent(agent_id.as_str()) else {
            return;
        };

        if !agent.status.is_terminal() {
            agent.status = if observed_exit_code == Some(0) { AgentStatus::Completed } else { AgentStatus::Failed };
            agent.exit_code = observed_exit_code;
            agent.completed_at = Some(Utc::now());
            if agent.status == AgentStatus::Failed && agent.error.is_none() {
                agent.error = Some(scrub_secrets(&format!("agent exited with code {observed_exit_code:?}")));
            }
            if let Err(e) = self.store.update_agent(&agent) {
                tracing::warn!(agent_id = %agent_id, error = %e, "failed to persist agent exit");
            }
        }

        if agent.status != AgentStatus::Completed {
            if let Ok(Some(mut task)) = self.store.get_task(agent.task_id.as_str()) {
                task.status = TaskStatus::Failed;
                task.updated_at = Utc::now();
                let _ = self.store.update_task(&task);
            }
        }

        let logs = self.store.get_agent_logs(agent.id.as_str()).unwrap_or_default();
        let combined = logs.iter().map(|l| l.content.as_str()).collect::<Vec<_>>().join("\n");
        if let Some(result) = exit::extract_result(&combined) {
            if let Some(body) = exit::comment_body(&result) {
                self.post_task_comment(&agent.task_id, &body).await;
            }
        }

        if let Some(url) = agent.metadata.get("callbackUrl").and_then(Value::as_str) {
            let body = serde_json::json!({
                "taskId": agent.task_id.as_str(),
                "agentId": agent.id.as_str(),
                "status": agent.status.as_str(),
                "exitCode": agent.exit_code,
            });
            exit::notify_callback(&self.http, url, &body).await;
        }

        if agent.status == AgentStatus::Completed {
            let workspace = self.config.workspace_root.join(agent.id.as_str());
            let _ = tokio::fs::remove_dir_all(&workspace).await;
        }
    }

    async fn post_task_comment(&self, task_id: &TaskId, body: &str) {
        let Some(base) = &self.config.upstream_base_url else { return };
        let url = format!("{}/tasks/{}/comments", base.trim_end_matches('/'), task_id);
        exit::notify_callback(&self.http, &url, &serde_json::json!({ "body": body })).await;
    }

    /// `kill(id, reason)`: no-op on an unknown or already-terminal agent
    /// (spec L2 "subsequent kill is a no-op"); otherwise moves the agent to
    /// a terminal state immediately, cancels its timer, flushes pending
    /// logs, and requests the sandbox driver terminate the process.
    pub async fn kill(self: &Arc<Self>, id: &str, reason: KillReason) -> EngineResult<()> {
        let Some(mut agent) = self.store.get_agent(id)? else {
            return Ok(());
        };
        if agent.status.is_terminal() {
            return Ok(());
        }

        let active = self.active.lock().remove(&agent.id);

        agent.status = reason.status();
        agent.completed_at = Some(Utc::now());
        self.store.update_agent(&agent)?;

        if let Some(ring) = self.rings.lock().get(&agent.id).cloned() {
            self.flush_ring(&agent.id, &ring).await;
        }

        if let Some(active) = active {
            if let Some(cancel) = active.cancel_timeout {
                let _ = cancel.send(());
            }
            let _ = active.driver.kill(&active.handle).await;
        } else if let Some(handle) = agent.sandbox_handle.clone() {
            // No in-memory entry (e.g. a row left `running` by a crash
            // recovery sweep that found the container still alive) — fall
            // back to the driver directly so the real process is still
            // reached.
            let driver = if agent.kind.is_host_mode() { &self.host_driver } else { &self.container_driver };
            let _ = driver.kill(&SandboxHandle(handle)).await;
        }

        Ok(())
    }

    /// `retry(id)`: a fresh spawn of the same task, reconstructing the
    /// original request from the terminal agent's persisted metadata.
    pub async fn retry(self: &Arc<Self>, id: &str) -> EngineResult<Agent> {
        let old = self.store.get_agent(id)?.ok_or_else(|| EngineError::not_found(format!("agent {id}")))?;
        let task = self
            .store
            .get_task(old.task_id.as_str())?
            .ok_or_else(|| EngineError::not_found(format!("task {}", old.task_id)))?;

        let req = request_from_metadata(&task, &old.metadata, old.kind);
        self.spawn(req).await
    }
}

fn build_metadata(req: &AgentSpawnRequest) -> Value {
    serde_json::json!({
        "prNumber": req.pr_number,
        "prUrl": req.pr_url,
        "branch": req.branch,
        "deploymentUrl": req.deployment_url,
        "focusAreas": req.focus_areas,
        "reviewFeedback": req.review_feedback,
        "existingBranch": req.existing_branch,
        "priorPlan": req.prior_plan,
        "callbackUrl": req.callback_url,
        "prompt": req.prompt,
    })
}

fn request_from_metadata(task: &Task, metadata: &Value, kind: AgentKind) -> AgentSpawnRequest {
    let prompt = metadata.get("prompt").and_then(Value::as_str).unwrap_or_default().to_string();
    AgentSpawnRequest {
        task_id: task.id.clone(),
        repo: task.primary_repo().unwrap_or_default().to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
        kind,
        pr_number: metadata.get("prNumber").and_then(Value::as_u64),
        pr_url: metadata.get("prUrl").and_then(Value::as_str).map(String::from),
        branch: metadata.get("branch").and_then(Value::as_str).map(String::from),
        deployment_url: metadata.get("deploymentUrl").and_then(Value::as_str).map(String::from),
        focus_areas: metadata
            .get("focusAreas")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_str().map(String::from)).collect()),
        review_feedback: metadata.get("reviewFeedback").and_then(Value::as_str).map(String::from),
        existing_branch: metadata.get("existingBranch").and_then(Value::as_str).map(String::from),
        prior_plan: metadata.get("priorPlan").cloned().filter(|v| !v.is_null()),
        prompt,
        callback_url: metadata.get("callbackUrl").and_then(Value::as_str).map(String::from),
    }
}
