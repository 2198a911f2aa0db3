// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! S1 — happy path through the whole pipeline (spec §8): one task rides the
//! Queue Processor and Event Router all the way from `queued` to `completed`
//! through triage, coding, review, deploy, and verify, with every event
//! ending up in `processed/` and every spawned agent reaching `completed`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wfe_alm::{Manager, ManagerConfig};
use wfe_core::event::{AffectedFile, DeployCompleted, ExecutionPlan, FileAction, PrCreated, PrMerged, TaskPlanCreated, VerifyPassed};
use wfe_core::{AgentStatus, EventPayload, QueueEntry, QueueEntryId, QueueEntryStatus, Task, TaskId, TaskStatus, KEY_MAX_CONCURRENT};
use wfe_queue::QueueProcessor;
use wfe_router::Router;
use wfe_sandbox::FakeSandboxDriver;
use wfe_spool::Spool;
use wfe_store::Store;

/// A real git repo with one commit, so every non-host-mode spawn's
/// `git clone` has something to clone from (spec §4.3 step 4).
fn init_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let run = |args: &[&str]| {
        let out = std::process::Command::new("git").args(args).current_dir(dir.path()).output().expect("spawn git");
        assert!(out.status.success(), "git {args:?} failed: {}", String::from_utf8_lossy(&out.stderr));
    };
    run(&["init", "-q"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "test"]);
    run(&["commit", "-q", "--allow-empty", "-m", "init"]);
    dir
}

/// Creates a branch ref in `repo` without checking it out, standing in for
/// the coding agent having pushed its work branch upstream before a reviewer
/// later fetches it (spec §4.3.1 "Reviewer flow: fetch and check out the
/// PR's branch").
fn create_branch(repo: &std::path::Path, branch: &str) {
    let out = std::process::Command::new("git").args(["branch", branch]).current_dir(repo).output().expect("spawn git");
    assert!(out.status.success(), "git branch {branch} failed: {}", String::from_utf8_lossy(&out.stderr));
}

async fn wait_for_agent_completed(alm: &Arc<Manager>, agent_id: &str) -> wfe_core::Agent {
    for _ in 0..200 {
        if let Some(agent) = alm.get_agent(agent_id).unwrap() {
            if agent.status == AgentStatus::Completed {
                return agent;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("agent {agent_id} never reached completed");
}

#[tokio::test]
async fn happy_path_pipeline_completes_all_stages() {
    let repo_dir = init_repo();
    let repo = repo_dir.path().to_str().unwrap().to_string();

    let store = Arc::new(Store::open_in_memory().unwrap());
    let spool = Arc::new(Spool::open(tempfile::tempdir().unwrap().into_path()).unwrap());
    let driver = Arc::new(FakeSandboxDriver::new());
    let manager_config = ManagerConfig {
        workspace_root: tempfile::tempdir().unwrap().into_path(),
        sandbox_image: "wfe/agent:latest".to_string(),
        agent_runner: "agent-runner".to_string(),
        api_base_url: None,
        agent_credential: None,
        upstream_base_url: None,
    };
    let alm = Manager::new(store.clone(), driver.clone(), driver, manager_config);
    let router = Router::new(store.clone(), spool.clone(), alm.clone());
    let queue = QueueProcessor::new(store.clone(), spool.clone(), alm.clone(), true);

    store.set_queue_setting(KEY_MAX_CONCURRENT, "1").unwrap();

    let task_id = TaskId::random();
    let mut task = Task::new(task_id.clone(), "Add /ping", "wire up a health endpoint", Utc::now());
    task.status = TaskStatus::Queued;
    task.repo = Some(repo.clone());
    store.insert_task(&task).unwrap();
    let entry = QueueEntry::new(QueueEntryId::random(), task_id.clone(), 0, Utc::now());
    store.insert_queue_entry(&entry).unwrap();

    // QP tick: Task stays queued, QueueEntry -> processing, `task.assigned` appended.
    queue.tick_once().await;
    let entry_after_claim = store.get_queue_entry_by_task(task_id.as_str()).unwrap().unwrap();
    assert_eq!(entry_after_claim.status, QueueEntryStatus::Processing);
    assert_eq!(spool.list_pending().await.unwrap().len(), 1);

    // ER handles `task.assigned`: spawns the triage agent.
    router.poll_once().await;
    let task = store.get_task(task_id.as_str()).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Assigned);
    let triage_id = task.assigned_agent_id.clone().expect("triage agent assigned");
    assert!(triage_id.as_str().starts_with("triage-"));
    wait_for_agent_completed(&alm, triage_id.as_str()).await;

    // Triage emits `task.plan.created`.
    let plan = ExecutionPlan {
        summary: "Add a /ping handler".to_string(),
        affected_files: vec![AffectedFile { path: "main.go".to_string(), action: FileAction::Modify, description: "register the route".to_string() }],
        steps: vec!["add handler".to_string(), "add test".to_string()],
        testing_strategy: "go test ./...".to_string(),
        risks: None,
        estimated_complexity: None,
    };
    spool.append(EventPayload::TaskPlanCreated(TaskPlanCreated { task_id: task_id.clone(), repo: repo.clone(), plan: plan.clone() }), "triage-agent").await.unwrap();

    // ER handles `task.plan.created`: persists the plan, spawns the coding agent.
    router.poll_once().await;
    let task = store.get_task(task_id.as_str()).unwrap().unwrap();
    assert!(task.plan.is_some());
    let coding_id = task.assigned_agent_id.clone().expect("coding agent assigned");
    assert!(coding_id.as_str().starts_with("coding-"));
    wait_for_agent_completed(&alm, coding_id.as_str()).await;

    // Coding emits `pr.created`; its branch has to actually exist in `repo`
    // for the reviewer's workspace prep to fetch it later.
    create_branch(repo_dir.path(), "agent/coding-xxxxxxxx");
    spool
        .append(
            EventPayload::PrCreated(PrCreated { task_id: task_id.clone(), repo: repo.clone(), pr_number: 42, pr_url: "https://example.com/pr/42".to_string(), branch: "agent/coding-xxxxxxxx".to_string() }),
            "coding-agent",
        )
        .await
        .unwrap();

    // ER handles `pr.created`: spawns the reviewer agent.
    router.poll_once().await;
    let task = store.get_task(task_id.as_str()).unwrap().unwrap();
    let reviewer_id = task.assigned_agent_id.clone().expect("reviewer agent assigned");
    assert!(reviewer_id.as_str().starts_with("reviewer-"));
    wait_for_agent_completed(&alm, reviewer_id.as_str()).await;

    // Reviewer emits `pr.merged`.
    spool
        .append(EventPayload::PrMerged(PrMerged { task_id: task_id.clone(), repo: repo.clone(), pr_number: 42, merge_commit: "abc1234".to_string(), branch: None, commit_sha: None }), "reviewer-agent")
        .await
        .unwrap();

    // ER handles `pr.merged`: spawns the (host-mode) deployer agent.
    router.poll_once().await;
    let task = store.get_task(task_id.as_str()).unwrap().unwrap();
    let deployer_id = task.assigned_agent_id.clone().expect("deployer agent assigned");
    assert!(deployer_id.as_str().starts_with("deployer-"));
    wait_for_agent_completed(&alm, deployer_id.as_str()).await;

    // Deployer emits `deploy.completed`.
    spool
        .append(EventPayload::DeployCompleted(DeployCompleted { task_id: task_id.clone(), repo: repo.clone(), url: "https://svc-a.example".to_string(), status: "ok".to_string() }), "deployer-agent")
        .await
        .unwrap();

    // ER handles `deploy.completed`: spawns the verifier agent.
    router.poll_once().await;
    let task = store.get_task(task_id.as_str()).unwrap().unwrap();
    let verifier_id = task.assigned_agent_id.clone().expect("verifier agent assigned");
    assert!(verifier_id.as_str().starts_with("verifier-"));
    wait_for_agent_completed(&alm, verifier_id.as_str()).await;

    // Verifier emits `verify.passed`.
    spool.append(EventPayload::VerifyPassed(VerifyPassed { task_id: task_id.clone(), repo: repo.clone(), summary: "ok".to_string() }), "verifier-agent").await.unwrap();

    // ER handles `verify.passed`: Task and QueueEntry both reach `completed`.
    router.poll_once().await;

    let task = store.get_task(task_id.as_str()).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    let entry = store.get_queue_entry_by_task(task_id.as_str()).unwrap().unwrap();
    assert_eq!(entry.status, QueueEntryStatus::Completed);
    assert!(entry.completed_at.is_some());

    // Every agent the pipeline spawned reached `completed`.
    let agents = alm.list_agents(100).unwrap();
    assert_eq!(agents.len(), 5);
    assert!(agents.iter().all(|a| a.status == AgentStatus::Completed));

    // All six events (`task.assigned` plus the five the test appended) ended
    // up in `processed/`; none are left pending.
    assert!(spool.list_pending().await.unwrap().is_empty());
    assert_eq!(spool.list_processed(None).await.unwrap().len(), 6);
}
