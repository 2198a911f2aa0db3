// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-event-kind handler effects (spec §4.4's table), as an exhaustive
//! match over `EventPayload`. Every arm either spawns an agent, mutates
//! Task/QueueEntry rows, or (for `agent.escalation` and anything outside
//! the closed set) only logs. A handler that can't complete returns `Err`
//! so the caller leaves the event pending for the next tick.

use crate::prompt;
use chrono::Utc;
use std::sync::Arc;
use wfe_alm::{AgentSpawnRequest, Manager};
use wfe_core::{AgentKind, EngineError, EngineResult, Event, EventPayload, QueueEntryStatus, Task, TaskId, TaskStatus};
use wfe_store::Store;

pub async fn dispatch(event: &Event, store: &Store, alm: &Arc<Manager>) -> EngineResult<()> {
    match &event.payload {
        EventPayload::TaskAssigned(p) => {
            let task = upsert_task_from_assignment(store, p)?;
            let req = AgentSpawnRequest::new(task.id.clone(), p.repo.clone(), task.title.clone(), task.description.clone(), prompt::triage(&task))
                .with_kind(AgentKind::Triage);
            alm.spawn(req).await?;
            Ok(())
        }

        EventPayload::TaskPlanCreated(p) => {
            let mut task = fetch_task(store, &p.task_id)?;
            task.plan = Some(serde_json::to_value(&p.plan).map_err(|e| EngineError::Validation(e.to_string()))?);
            task.updated_at = Utc::now();
            store.update_task(&task)?;

            let req = AgentSpawnRequest::new(task.id.clone(), p.repo.clone(), task.title.clone(), task.description.clone(), prompt::coding_from_plan(&task, &p.plan))
                .with_kind(AgentKind::Coding);
            alm.spawn(req).await?;
            Ok(())
        }

        EventPayload::TaskClosed(p) => {
            let task = fetch_task(store, &p.task_id)?;
            complete_task_and_queue_entry(store, task)
        }

        EventPayload::DeployRequested(p) => {
            let task = fetch_task(store, &p.task_id)?;
            let req = AgentSpawnRequest::new(task.id.clone(), p.repo.clone(), task.title.clone(), task.description.clone(), prompt::deployer_requested(&task, p))
                .with_kind(AgentKind::Deployer);
            alm.spawn(req).await?;
            Ok(())
        }

        EventPayload::PrCreated(p) => {
            let task = fetch_task(store, &p.task_id)?;
            let mut req = AgentSpawnRequest::new(task.id.clone(), p.repo.clone(), task.title.clone(), task.description.clone(), prompt::reviewer(&task, &p.repo, p.pr_number, &p.pr_url))
                .with_kind(AgentKind::Reviewer);
            req.pr_number = Some(p.pr_number);
            req.pr_url = Some(p.pr_url.clone());
            req.branch = Some(p.branch.clone());
            alm.spawn(req).await?;
            Ok(())
        }

        EventPayload::PrUpdated(p) => {
            let task = fetch_task(store, &p.task_id)?;
            let mut req = AgentSpawnRequest::new(task.id.clone(), p.repo.clone(), task.title.clone(), task.description.clone(), prompt::reviewer(&task, &p.repo, p.pr_number, &p.pr_url))
                .with_kind(AgentKind::Reviewer);
            req.pr_number = Some(p.pr_number);
            req.pr_url = Some(p.pr_url.clone());
            req.branch = Some(p.branch.clone());
            alm.spawn(req).await?;
            Ok(())
        }

        EventPayload::PrChangesRequested(p) => {
            let mut task = fetch_task(store, &p.task_id)?;
            task.status = TaskStatus::InProgress;
            task.updated_at = Utc::now();
            store.update_task(&task)?;

            let mut req = AgentSpawnRequest::new(task.id.clone(), p.repo.clone(), task.title.clone(), task.description.clone(), prompt::coding_fixup(&task, p))
                .with_kind(AgentKind::Coding);
            req.existing_branch = Some(p.branch.clone());
            req.review_feedback = Some(p.review_comments.clone());
            req.prior_plan = task.plan.clone();
            alm.spawn(req).await?;
            Ok(())
        }

        EventPayload::PrMerged(p) => {
            let task = fetch_task(store, &p.task_id)?;
            let req = AgentSpawnRequest::new(task.id.clone(), p.repo.clone(), task.title.clone(), task.description.clone(), prompt::deployer_merged(&task, &p.repo, &p.merge_commit))
                .with_kind(AgentKind::Deployer);
            alm.spawn(req).await?;
            Ok(())
        }

        EventPayload::DeployCompleted(p) => {
            let task = fetch_task(store, &p.task_id)?;
            let mut req = AgentSpawnRequest::new(task.id.clone(), p.repo.clone(), task.title.clone(), task.description.clone(), prompt::verifier(&task, p))
                .with_kind(AgentKind::Verifier);
            req.deployment_url = Some(p.url.clone());
            alm.spawn(req).await?;
            Ok(())
        }

        EventPayload::DeployFailed(p) => {
            let task = fetch_task(store, &p.task_id)?;
            fail_task_and_queue_entry(store, task)
        }

        EventPayload::VerifyPassed(p) => {
            let task = fetch_task(store, &p.task_id)?;
            complete_task_and_queue_entry(store, task)
        }

        EventPayload::VerifyFailed(p) => {
            let originating = fetch_task(store, &p.task_id)?;
            let bug = Task {
                kind: "bug".to_string(),
                status: TaskStatus::Pending,
                repo: originating.repo.clone(),
                repos: originating.repos.clone(),
                ..Task::new(TaskId::random(), format!("Verification failed: {}", originating.title), prompt::bug_from_verify_failure(p.repo.as_str(), &p.bug), Utc::now())
            };
            store.insert_task(&bug)?;

            fail_task_and_queue_entry(store, originating)
        }

        EventPayload::AuditRequested(p) => {
            let task = fetch_task(store, &p.task_id)?;
            let mut req = AgentSpawnRequest::new(task.id.clone(), p.repo.clone(), task.title.clone(), task.description.clone(), prompt::auditor(&task, p))
                .with_kind(AgentKind::Auditor);
            req.deployment_url = Some(p.url.clone());
            req.focus_areas = p.focus_areas.clone();
            alm.spawn(req).await?;
            Ok(())
        }

        EventPayload::AuditFinding(p) => {
            let parent = fetch_task(store, &p.task_id)?;
            let bug = Task {
                kind: "bug".to_string(),
                status: TaskStatus::Pending,
                repo: parent.repo.clone(),
                repos: parent.repos.clone(),
                ..Task::new(TaskId::random(), format!("Audit finding: {}", p.finding.title), prompt::bug_from_audit_finding(&p.repo, &p.finding), Utc::now())
            };
            store.insert_task(&bug)?;
            Ok(())
        }

        EventPayload::AuditCompleted(p) => {
            let task = fetch_task(store, &p.task_id)?;
            complete_task_and_queue_entry(store, task)
        }

        EventPayload::AgentEscalation(p) => {
            tracing::warn!(task_id = %p.task_id, agent_id = %p.agent_id, reason = %p.reason, "agent escalation");
            Ok(())
        }

        EventPayload::Other(kind, _) => {
            tracing::warn!(kind = %kind, event_id = %event.id, "unrecognized event kind, leaving pending");
            Err(EngineError::validation(format!("unrecognized event kind: {kind}")))
        }
    }
}

fn fetch_task(store: &Store, task_id: &TaskId) -> EngineResult<Task> {
    store.get_task(task_id.as_str())?.ok_or_else(|| EngineError::not_found(format!("task {task_id}")))
}

/// `task.assigned` is the engine's first sight of a task mirrored from the
/// upstream system; create the row if absent, otherwise refresh the fields
/// the event carries (spec §3 "Task (mirror)").
fn upsert_task_from_assignment(store: &Store, p: &wfe_core::event::TaskAssigned) -> EngineResult<Task> {
    if let Some(mut task) = store.get_task(p.task_id.as_str())? {
        task.title = p.title.clone();
        task.description = p.description.clone();
        task.repo = Some(p.repo.clone());
        if let Some(repos) = &p.repos {
            task.repos = repos.clone();
        }
        if let Some(investigation_only) = p.investigation_only {
            task.investigation_only = investigation_only;
        }
        task.updated_at = Utc::now();
        store.update_task(&task)?;
        Ok(task)
    } else {
        let now = Utc::now();
        let mut task = Task::new(p.task_id.clone(), p.title.clone(), p.description.clone(), now);
        task.repo = Some(p.repo.clone());
        task.repos = p.repos.clone().unwrap_or_default();
        task.investigation_only = p.investigation_only.unwrap_or(false);
        task.status = TaskStatus::Queued;
        store.insert_task(&task)?;
        Ok(task)
    }
}

/// Shared completion path for `task.closed`, `verify.passed`,
/// `audit.completed` (spec §4.4, §4.5 "The Task → QueueEntry transitions").
fn complete_task_and_queue_entry(store: &Store, mut task: Task) -> EngineResult<()> {
    task.status = TaskStatus::Completed;
    task.updated_at = Utc::now();
    store.update_task(&task)?;

    if let Some(mut entry) = store.get_queue_entry_by_task(task.id.as_str())? {
        entry.status = QueueEntryStatus::Completed;
        entry.completed_at = Some(Utc::now());
        store.update_queue_entry(&entry)?;
    }
    Ok(())
}

/// Shared failure path for `deploy.failed`, `verify.failed` (spec §4.4
/// "The Task → QueueEntry transitions"). Mirrors `complete_task_and_queue_entry`
/// so a failed deploy or verify step releases the QueueEntry's slot instead of
/// leaving it stuck at `processing` (spec invariant I3).
fn fail_task_and_queue_entry(store: &Store, mut task: Task) -> EngineResult<()> {
    task.status = TaskStatus::Failed;
    task.updated_at = Utc::now();
    store.update_task(&task)?;

    if let Some(mut entry) = store.get_queue_entry_by_task(task.id.as_str())? {
        entry.status = QueueEntryStatus::Failed;
        entry.completed_at = Some(Utc::now());
        store.update_queue_entry(&entry)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfe_alm::ManagerConfig;
    use wfe_core::event::{AgentEscalation, TaskAssigned};
    use wfe_core::{AgentId, QueueEntry, QueueEntryId};
    use wfe_sandbox::FakeSandboxDriver;
    use wfe_store::Store;

    fn manager() -> (Arc<Store>, Arc<Manager>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let driver = Arc::new(FakeSandboxDriver::new());
        let workspace = tempfile::tempdir().unwrap().into_path();
        let config = ManagerConfig {
            workspace_root: workspace,
            sandbox_image: "wfe/agent:latest".to_string(),
            agent_runner: "agent-runner".to_string(),
            api_base_url: None,
            agent_credential: None,
            upstream_base_url: None,
        };
        let manager = Manager::new(store.clone(), driver.clone(), driver, config);
        (store, manager)
    }

    /// A real git repo with one commit, so `workspace::prepare`'s `git
    /// clone` has something to clone from (non-host-mode spawns always
    /// clone, per spec §4.3 step 4).
    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let run = |args: &[&str]| {
            let out = std::process::Command::new("git").args(args).current_dir(dir.path()).output().unwrap();
            assert!(out.status.success(), "git {args:?} failed: {}", String::from_utf8_lossy(&out.stderr));
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "test"]);
        run(&["commit", "-q", "--allow-empty", "-m", "init"]);
        dir
    }

    #[tokio::test]
    async fn task_assigned_creates_task_and_spawns_triage_agent() {
        let (store, alm) = manager();
        let repo = init_repo();
        let event = Event::new(
            EventPayload::TaskAssigned(TaskAssigned {
                task_id: TaskId::random(),
                title: "Add /ping".into(),
                description: "wire up a health endpoint".into(),
                repo: repo.path().to_str().unwrap().to_string(),
                repos: None,
                investigation_only: None,
            }),
            "test",
            Utc::now(),
        );

        dispatch(&event, &store, &alm).await.unwrap();

        let task = store.get_task(event.payload.task_id().unwrap().as_str()).unwrap().unwrap();
        assert_eq!(task.title, "Add /ping");
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assigned_agent_id.as_ref().map(|a| a.as_str().starts_with("triage-")), Some(true));
    }

    #[tokio::test]
    async fn task_closed_completes_task_and_queue_entry() {
        let (store, alm) = manager();
        let task_id = TaskId::random();
        let mut task = Task::new(task_id.clone(), "t", "d", Utc::now());
        task.status = TaskStatus::InProgress;
        store.insert_task(&task).unwrap();
        let mut entry = QueueEntry::new(QueueEntryId::random(), task_id.clone(), 0, Utc::now());
        entry.status = QueueEntryStatus::Processing;
        store.insert_queue_entry(&entry).unwrap();

        let event = Event::new(
            EventPayload::TaskClosed(wfe_core::event::TaskClosed {
                task_id: task_id.clone(),
                reason: "done".into(),
                resolution: wfe_core::event::TaskCloseReason::AlreadyResolved,
            }),
            "test",
            Utc::now(),
        );
        dispatch(&event, &store, &alm).await.unwrap();

        let task = store.get_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        let entry = store.get_queue_entry_by_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(entry.status, QueueEntryStatus::Completed);
    }

    #[tokio::test]
    async fn verify_failed_opens_bug_task_and_fails_originator() {
        let (store, alm) = manager();
        let task_id = TaskId::random();
        let mut task = Task::new(task_id.clone(), "t", "d", Utc::now());
        task.repo = Some("svc-a".into());
        store.insert_task(&task).unwrap();
        let mut entry = QueueEntry::new(QueueEntryId::random(), task_id.clone(), 0, Utc::now());
        entry.status = QueueEntryStatus::Processing;
        store.insert_queue_entry(&entry).unwrap();

        let event = Event::new(
            EventPayload::VerifyFailed(wfe_core::event::VerifyFailed {
                task_id: task_id.clone(),
                repo: "svc-a".into(),
                bug: wfe_core::event::BugReport {
                    description: "500 on /ping".into(),
                    steps: "curl /ping".into(),
                    expected: "200".into(),
                    actual: "500".into(),
                },
            }),
            "test",
            Utc::now(),
        );
        dispatch(&event, &store, &alm).await.unwrap();

        let originator = store.get_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(originator.status, TaskStatus::Failed);
        let all_tasks_title_match = store.get_task(task_id.as_str()).unwrap().unwrap().title == "t";
        assert!(all_tasks_title_match);

        let entry = store.get_queue_entry_by_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(entry.status, QueueEntryStatus::Failed);
        assert!(entry.completed_at.is_some());
    }

    #[tokio::test]
    async fn deploy_failed_fails_task_and_queue_entry() {
        let (store, alm) = manager();
        let task_id = TaskId::random();
        let mut task = Task::new(task_id.clone(), "t", "d", Utc::now());
        task.repo = Some("svc-a".into());
        store.insert_task(&task).unwrap();
        let mut entry = QueueEntry::new(QueueEntryId::random(), task_id.clone(), 0, Utc::now());
        entry.status = QueueEntryStatus::Processing;
        store.insert_queue_entry(&entry).unwrap();

        let event = Event::new(
            EventPayload::DeployFailed(wfe_core::event::DeployFailed { task_id: task_id.clone(), repo: "svc-a".into(), error: "image pull failed".into(), logs: None }),
            "test",
            Utc::now(),
        );
        dispatch(&event, &store, &alm).await.unwrap();

        let task = store.get_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        let entry = store.get_queue_entry_by_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(entry.status, QueueEntryStatus::Failed);
        assert!(entry.completed_at.is_some());
    }

    #[tokio::test]
    async fn agent_escalation_only_logs_and_succeeds() {
        let (store, alm) = manager();
        let event = Event::new(
            EventPayload::AgentEscalation(AgentEscalation {
                task_id: TaskId::random(),
                agent_id: AgentId::with_prefix("coding"),
                reason: "stuck".into(),
                context: None,
            }),
            "test",
            Utc::now(),
        );
        assert!(dispatch(&event, &store, &alm).await.is_ok());
    }

    #[tokio::test]
    async fn unrecognized_kind_is_left_pending() {
        let (store, alm) = manager();
        let event = Event::new(EventPayload::Other("mystery.event".into(), serde_json::json!({})), "test", Utc::now());
        assert!(dispatch(&event, &store, &alm).await.is_err());
    }
}
