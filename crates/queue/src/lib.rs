// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The Queue Processor (spec §4.5): on each tick, claims the next queued
//! Task and either hands it to the Event Router (by appending `task.assigned`
//! to the spool) or spawns the triage agent directly, depending on the
//! `USE_MULTI_AGENT_EVENTS` toggle.

use chrono::Utc;
use std::sync::Arc;
use wfe_alm::{AgentSpawnRequest, Manager};
use wfe_core::event::TaskAssigned;
use wfe_core::{AgentKind, EngineError, EngineResult, EventPayload, StopSignal, TaskStatus};
use wfe_spool::Spool;
use wfe_store::Store;

pub struct QueueProcessor {
    store: Arc<Store>,
    spool: Arc<Spool>,
    alm: Arc<Manager>,
    use_multi_agent_events: bool,
}

impl QueueProcessor {
    pub fn new(store: Arc<Store>, spool: Arc<Spool>, alm: Arc<Manager>, use_multi_agent_events: bool) -> Arc<Self> {
        Arc::new(Self { store, spool, alm, use_multi_agent_events })
    }

    /// Drives the poll loop until `stop` trips (spec §4.5 "periodic tick").
    pub async fn run(self: Arc<Self>, interval: std::time::Duration, stop: StopSignal) {
        let processor = self;
        wfe_core::run_ticker(interval, stop, move || {
            let processor = Arc::clone(&processor);
            async move { processor.tick_once().await }
        })
        .await;
    }

    /// One claim attempt. Never propagates an error: a failed tick is logged
    /// and retried on the next one.
    pub async fn tick_once(&self) {
        if let Err(e) = self.try_tick().await {
            tracing::warn!(error = %e, "queue processor: tick failed");
        }
    }

    async fn try_tick(&self) -> EngineResult<()> {
        let settings = self.store.get_queue_settings()?;
        if settings.paused() {
            return Ok(());
        }
        if settings.stop_on_failure() && self.store.any_joined_task_failed()? {
            return Ok(());
        }
        if self.store.count_processing_queue()? >= settings.max_concurrent() as u64 {
            return Ok(());
        }

        let mut head = self.store.get_pending_queue_head(1)?;
        let Some(mut entry) = head.pop() else {
            return Ok(());
        };

        let mut task = self
            .store
            .get_task(entry.task_id.as_str())?
            .ok_or_else(|| EngineError::not_found(format!("task {}", entry.task_id)))?;

        let Some(repo) = task.primary_repo().map(str::to_string) else {
            task.status = TaskStatus::Failed;
            task.updated_at = Utc::now();
            self.store.update_task(&task)?;
            self.store.delete_queue_entry(task.id.as_str())?;
            return Ok(());
        };

        entry.status = wfe_core::QueueEntryStatus::Processing;
        self.store.update_queue_entry(&entry)?;

        if self.use_multi_agent_events {
            self.spool
                .append(
                    EventPayload::TaskAssigned(TaskAssigned {
                        task_id: task.id.clone(),
                        title: task.title.clone(),
                        description: task.description.clone(),
                        repo,
                        repos: None,
                        investigation_only: Some(task.investigation_only),
                    }),
                    "queue-processor",
                )
                .await?;
        } else {
            let req = AgentSpawnRequest::new(task.id.clone(), repo, task.title.clone(), task.description.clone(), triage_prompt(&task))
                .with_kind(AgentKind::Triage);
            self.alm.spawn(req).await?;
        }

        Ok(())
    }
}

fn triage_prompt(task: &wfe_core::Task) -> String {
    format!(
        "You are triaging a new task.\n\n## {title}\n\n{description}\n\n\
         Investigate the repository, decide whether this needs code changes, and \
         produce an execution plan (summary, affected files, steps, testing strategy).",
        title = task.title,
        description = task.description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfe_alm::ManagerConfig;
    use wfe_core::{QueueEntry, QueueEntryId, Task, TaskId};
    use wfe_sandbox::FakeSandboxDriver;

    fn harness(use_multi_agent_events: bool) -> (Arc<QueueProcessor>, Arc<Store>, Arc<Spool>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let spool = Arc::new(Spool::open(tempfile::tempdir().unwrap().into_path()).unwrap());
        let driver = Arc::new(FakeSandboxDriver::new());
        let config = ManagerConfig {
            workspace_root: tempfile::tempdir().unwrap().into_path(),
            sandbox_image: "wfe/agent:latest".to_string(),
            agent_runner: "agent-runner".to_string(),
            api_base_url: None,
            agent_credential: None,
            upstream_base_url: None,
        };
        let alm = Manager::new(store.clone(), driver.clone(), driver, config);
        let processor = QueueProcessor::new(store.clone(), spool.clone(), alm, use_multi_agent_events);
        (processor, store, spool)
    }

    fn seed_queued_task(store: &Store, repo: Option<&str>) -> (TaskId, QueueEntryId) {
        let task_id = TaskId::random();
        let mut task = Task::new(task_id.clone(), "t", "d", Utc::now());
        task.status = TaskStatus::Queued;
        task.repo = repo.map(str::to_string);
        store.insert_task(&task).unwrap();
        let entry_id = QueueEntryId::random();
        let entry = QueueEntry::new(entry_id.clone(), task_id.clone(), 0, Utc::now());
        store.insert_queue_entry(&entry).unwrap();
        (task_id, entry_id)
    }

    #[tokio::test]
    async fn paused_settings_skip_the_tick() {
        let (processor, store, _spool) = harness(true);
        store.set_queue_setting(wfe_core::KEY_PAUSED, "true").unwrap();
        seed_queued_task(&store, Some("repo"));

        processor.try_tick().await.unwrap();

        let entries = store.list_queue_entries().unwrap();
        assert_eq!(entries[0].status, wfe_core::QueueEntryStatus::Queued);
    }

    #[tokio::test]
    async fn stop_on_failure_blocks_new_claims() {
        let (processor, store, _spool) = harness(true);
        store.set_queue_setting(wfe_core::KEY_STOP_ON_FAILURE, "true").unwrap();
        let (task_id, _entry_id) = seed_queued_task(&store, Some("repo"));

        let failed_task_id = TaskId::random();
        let mut failed_task = Task::new(failed_task_id.clone(), "f", "d", Utc::now());
        failed_task.status = TaskStatus::Failed;
        store.insert_task(&failed_task).unwrap();
        let mut failed_entry = QueueEntry::new(QueueEntryId::random(), failed_task_id, 1, Utc::now());
        failed_entry.status = wfe_core::QueueEntryStatus::Processing;
        store.insert_queue_entry(&failed_entry).unwrap();

        processor.try_tick().await.unwrap();

        let untouched = store.get_queue_entry_by_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(untouched.status, wfe_core::QueueEntryStatus::Queued);
    }

    #[tokio::test]
    async fn max_concurrent_gate_blocks_when_at_capacity() {
        let (processor, store, _spool) = harness(true);
        store.set_queue_setting(wfe_core::KEY_MAX_CONCURRENT, "1").unwrap();
        let processing_task_id = TaskId::random();
        store.insert_task(&Task::new(processing_task_id.clone(), "p", "d", Utc::now())).unwrap();
        let mut processing_entry = QueueEntry::new(QueueEntryId::random(), processing_task_id, 0, Utc::now());
        processing_entry.status = wfe_core::QueueEntryStatus::Processing;
        store.insert_queue_entry(&processing_entry).unwrap();

        seed_queued_task(&store, Some("repo"));

        processor.try_tick().await.unwrap();

        let queued_still = store.list_queue_entries().unwrap().into_iter().filter(|e| e.status == wfe_core::QueueEntryStatus::Queued).count();
        assert_eq!(queued_still, 1);
    }

    #[tokio::test]
    async fn missing_repo_fails_task_and_drops_queue_entry() {
        let (processor, store, _spool) = harness(true);
        let (task_id, _entry_id) = seed_queued_task(&store, None);

        processor.try_tick().await.unwrap();

        let task = store.get_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(store.get_queue_entry_by_task(task_id.as_str()).unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_appends_task_assigned_event_when_multi_agent_events_enabled() {
        let (processor, store, spool) = harness(true);
        let (task_id, _entry_id) = seed_queued_task(&store, Some("repo"));

        processor.try_tick().await.unwrap();

        let entry = store.get_queue_entry_by_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(entry.status, wfe_core::QueueEntryStatus::Processing);
        let pending = spool.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind_str(), "task.assigned");
    }

    /// A real git repo with one commit, so the triage spawn's `git clone`
    /// has something to clone from (Triage is not host-mode).
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
    async fn claim_spawns_triage_directly_when_multi_agent_events_disabled() {
        let (processor, store, spool) = harness(false);
        let repo = init_repo();
        let (task_id, _entry_id) = seed_queued_task(&store, Some(repo.path().to_str().unwrap()));

        processor.try_tick().await.unwrap();

        let entry = store.get_queue_entry_by_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(entry.status, wfe_core::QueueEntryStatus::Processing);
        let task = store.get_task(task_id.as_str()).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
        assert!(spool.list_pending().await.unwrap().is_empty());
    }
}
