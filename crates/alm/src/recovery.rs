// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery sweep (spec §4.3.4), run once at process start. Best
//! effort: a failure reconciling one row must never block the others or
//! the caller.

use chrono::Utc;
use wfe_core::{Agent, AgentStatus, EngineError};
use wfe_sandbox::{SandboxDriver, SandboxHandle};
use wfe_store::Store;

/// Host-process handles are stamped `host-<pid>` by `LocalDriver` (spec
/// §4.3: "host process id").
fn is_host_handle(handle: &str) -> bool {
    handle.starts_with("host-")
}

/// Reconciles every Agent row left `status=running` from a prior process
/// lifetime. Never propagates an error: any row that can't be reconciled
/// is marked failed with `error="recovery failed"` and the sweep moves on.
pub async fn sweep(store: &Store, container_driver: &dyn SandboxDriver) {
    let rows = match store.list_active_agents() {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "crash recovery: failed to list active agents");
            return;
        }
    };

    for agent in rows.into_iter().filter(|a| a.status == AgentStatus::Running) {
        if let Err(e) = reconcile_one(store, container_driver, agent).await {
            tracing::warn!(error = %e, "crash recovery: failed to reconcile agent");
        }
    }
}

async fn reconcile_one(store: &Store, container_driver: &dyn SandboxDriver, mut agent: Agent) -> Result<(), EngineError> {
    let Some(handle) = agent.sandbox_handle.clone() else {
        return mark_failed(store, &mut agent, EngineError::recovery("no sandbox handle on record"));
    };

    if is_host_handle(&handle) {
        return mark_failed(store, &mut agent, EngineError::recovery("server restarted while agent was running"));
    }

    let sandbox_handle = SandboxHandle(handle);
    let still_running = container_driver.is_running(&sandbox_handle).await.unwrap_or(false);
    if still_running {
        // Left tracked at status=running with no in-memory watchdog or log
        // monitor for this process lifetime; `Manager::kill` falls back to
        // the container driver directly for rows in this state so a kill
        // still reaches the real container.
        tracing::warn!(agent_id = %agent.id, "crash recovery: agent still running, no in-memory monitor reattached");
        return Ok(());
    }

    let exit_code = container_driver.exit_code(&sandbox_handle).await.unwrap_or(None);
    let _ = container_driver.kill(&sandbox_handle).await;

    agent.exit_code = exit_code;
    agent.completed_at = Some(Utc::now());
    agent.status = if exit_code == Some(0) { AgentStatus::Completed } else { AgentStatus::Failed };
    if agent.status == AgentStatus::Failed && agent.error.is_none() {
        agent.error = Some("agent exited while daemon was restarting".to_string());
    }
    store.update_agent(&agent)
}

fn mark_failed(store: &Store, agent: &mut Agent, err: EngineError) -> Result<(), EngineError> {
    tracing::warn!(agent_id = %agent.id, error = %err, "crash recovery: marking agent failed");
    agent.status = AgentStatus::Failed;
    agent.error = Some(err.to_string());
    agent.completed_at = Some(Utc::now());
    store.update_agent(agent)
}
