// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace preparation and branch checkout (spec §4.3 step 4, §4.3.1).
//! Shells out to the `git` CLI, same approach as the sandbox drivers take
//! with `docker`.

use crate::request::AgentSpawnRequest;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use wfe_core::{AgentKind, EngineError, EngineResult};

const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Creates `<base>/<agent_id>`, clones `repo` into it, and checks out a
/// branch per the §4.3.1 rules. Host-mode kinds never call this (spec §4.3
/// step 3).
pub async fn prepare(base: &Path, agent_id: &str, req: &AgentSpawnRequest) -> EngineResult<PathBuf> {
    let workspace = base.join(agent_id);
    tokio::fs::create_dir_all(&workspace)
        .await
        .map_err(|e| EngineError::Sandbox(format!("failed to create workspace dir: {e}")))?;

    run_git(&workspace, ["clone", &req.repo, "."]).await?;

    if let Some(branch) = req.branch.as_deref() {
        // Reviewer flow: fetch and check out the PR's branch.
        run_git(&workspace, ["fetch", "origin", branch]).await?;
        run_git(&workspace, ["checkout", branch]).await?;
    } else if let Some(branch) = req.existing_branch.as_deref() {
        // Fix-up coding flow: resume the prior coding branch.
        run_git(&workspace, ["fetch", "origin", branch]).await?;
        run_git(&workspace, ["checkout", branch]).await?;
    } else if req.kind == AgentKind::Coding {
        let branch = format!("agent/{agent_id}");
        run_git(&workspace, ["checkout", "-b", &branch]).await?;
    }
    // Else: remain on the default branch (the clone's checked-out HEAD).

    Ok(workspace)
}

async fn run_git<'a>(workspace: &Path, args: impl IntoIterator<Item = &'a str>) -> EngineResult<()> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(workspace);
    let output = tokio::time::timeout(GIT_TIMEOUT, cmd.output())
        .await
        .map_err(|_| EngineError::Sandbox("git command timed out".to_string()))?
        .map_err(|e| EngineError::Sandbox(format!("failed to exec git: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Sandbox(format!("git failed: {}", stderr.trim())));
    }
    Ok(())
}
