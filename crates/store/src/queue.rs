// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! QueueEntry CRUD and the `getPendingQueueHead`/`countProcessingQueue`/
//! `getQueueSettings` query helpers from spec §4.1.

use crate::Store;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use wfe_core::{EngineError, EngineResult, QueueEntry, QueueEntryId, QueueEntryStatus, QueueSettings, TaskId};

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    let status_str: String = row.get("status")?;
    Ok(QueueEntry {
        id: QueueEntryId::from(row.get::<_, String>("id")?),
        task_id: TaskId::from(row.get::<_, String>("task_id")?),
        position: row.get("position")?,
        status: parse_status(&status_str),
        queued_at: row.get("queued_at")?,
        completed_at: row.get("completed_at")?,
    })
}

fn parse_status(s: &str) -> QueueEntryStatus {
    match s {
        "queued" => QueueEntryStatus::Queued,
        "processing" => QueueEntryStatus::Processing,
        "completed" => QueueEntryStatus::Completed,
        "failed" => QueueEntryStatus::Failed,
        other => unreachable!("unknown queue entry status persisted: {other}"),
    }
}

pub(crate) fn insert(conn: &Connection, entry: &QueueEntry) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO queue_entries (id, task_id, position, status, queued_at, completed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id.as_str(),
            entry.task_id.as_str(),
            entry.position,
            entry.status.as_str(),
            entry.queued_at,
            entry.completed_at,
        ],
    )
    .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(())
}

pub(crate) fn update(conn: &Connection, entry: &QueueEntry) -> EngineResult<()> {
    let n = conn
        .execute(
            "UPDATE queue_entries SET position = ?2, status = ?3, completed_at = ?4 WHERE id = ?1",
            params![entry.id.as_str(), entry.position, entry.status.as_str(), entry.completed_at],
        )
        .map_err(|e| EngineError::Store(e.to_string()))?;
    if n == 0 {
        return Err(EngineError::not_found(format!("queue entry {}", entry.id)));
    }
    Ok(())
}

pub(crate) fn delete(conn: &Connection, task_id: &str) -> EngineResult<()> {
    conn.execute("DELETE FROM queue_entries WHERE task_id = ?1", params![task_id])
        .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(())
}

pub(crate) fn get_by_task(conn: &Connection, task_id: &str) -> EngineResult<Option<QueueEntry>> {
    conn.query_row("SELECT * FROM queue_entries WHERE task_id = ?1", params![task_id], row_to_entry)
        .optional()
        .map_err(|e| EngineError::Store(e.to_string()))
}

pub(crate) fn list_all(conn: &Connection) -> EngineResult<Vec<QueueEntry>> {
    let mut stmt = conn
        .prepare("SELECT * FROM queue_entries ORDER BY position ASC")
        .map_err(|e| EngineError::Store(e.to_string()))?;
    let rows = stmt
        .query_map([], row_to_entry)
        .map_err(|e| EngineError::Store(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(rows)
}

pub(crate) fn clear(conn: &Connection) -> EngineResult<()> {
    conn.execute("DELETE FROM queue_entries", [])
        .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(())
}

/// Lowest-position queued entries whose joined Task is also `queued` (spec
/// §4.5 step 4).
pub(crate) fn pending_head(conn: &Connection, limit: u32) -> EngineResult<Vec<QueueEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT qe.* FROM queue_entries qe
             JOIN tasks t ON t.id = qe.task_id
             WHERE qe.status = 'queued' AND t.status = 'queued'
             ORDER BY qe.position ASC
             LIMIT ?1",
        )
        .map_err(|e| EngineError::Store(e.to_string()))?;
    let rows = stmt
        .query_map(params![limit], row_to_entry)
        .map_err(|e| EngineError::Store(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(rows)
}

pub(crate) fn count_processing(conn: &Connection) -> EngineResult<u64> {
    conn.query_row("SELECT COUNT(*) FROM queue_entries WHERE status = 'processing'", [], |r| r.get(0))
        .map_err(|e| EngineError::Store(e.to_string()))
}

/// Any queued-or-processing queue entry whose joined Task has failed (spec
/// §4.5 step 2, the `stop_on_failure` gate).
pub(crate) fn any_joined_task_failed(conn: &Connection) -> EngineResult<bool> {
    let count: u64 = conn
        .query_row(
            "SELECT COUNT(*) FROM queue_entries qe
             JOIN tasks t ON t.id = qe.task_id
             WHERE qe.status IN ('queued', 'processing') AND t.status = 'failed'",
            [],
            |r| r.get(0),
        )
        .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(count > 0)
}

pub(crate) fn get_settings(conn: &Connection) -> EngineResult<QueueSettings> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM queue_settings")
        .map_err(|e| EngineError::Store(e.to_string()))?;
    let map: HashMap<String, String> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| EngineError::Store(e.to_string()))?
        .collect::<Result<_, _>>()
        .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(QueueSettings::from_map(map))
}

pub(crate) fn set_setting(conn: &Connection, key: &str, value: &str) -> EngineResult<()> {
    conn.execute(
        "INSERT INTO queue_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(())
}

impl Store {
    pub fn insert_queue_entry(&self, entry: &QueueEntry) -> EngineResult<()> {
        insert(&self.conn.lock(), entry)
    }

    pub fn update_queue_entry(&self, entry: &QueueEntry) -> EngineResult<()> {
        update(&self.conn.lock(), entry)
    }

    pub fn delete_queue_entry(&self, task_id: &str) -> EngineResult<()> {
        delete(&self.conn.lock(), task_id)
    }

    pub fn get_queue_entry_by_task(&self, task_id: &str) -> EngineResult<Option<QueueEntry>> {
        get_by_task(&self.conn.lock(), task_id)
    }

    pub fn list_queue_entries(&self) -> EngineResult<Vec<QueueEntry>> {
        list_all(&self.conn.lock())
    }

    pub fn clear_queue(&self) -> EngineResult<()> {
        clear(&self.conn.lock())
    }

    pub fn get_pending_queue_head(&self, limit: u32) -> EngineResult<Vec<QueueEntry>> {
        pending_head(&self.conn.lock(), limit)
    }

    pub fn count_processing_queue(&self) -> EngineResult<u64> {
        count_processing(&self.conn.lock())
    }

    pub fn any_joined_task_failed(&self) -> EngineResult<bool> {
        any_joined_task_failed(&self.conn.lock())
    }

    pub fn get_queue_settings(&self) -> EngineResult<QueueSettings> {
        get_settings(&self.conn.lock())
    }

    pub fn set_queue_setting(&self, key: &str, value: &str) -> EngineResult<()> {
        set_setting(&self.conn.lock(), key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wfe_core::{Task, TaskStatus};

    fn seed_task(store: &Store, status: TaskStatus) -> TaskId {
        let id = TaskId::random();
        let mut task = Task::new(id.clone(), "t", "d", Utc::now());
        task.status = status;
        store.insert_task(&task).unwrap();
        id
    }

    #[test]
    fn pending_head_only_returns_queued_task_and_entry() {
        let store = Store::open_in_memory().unwrap();
        let queued_task = seed_task(&store, TaskStatus::Queued);
        let pending_task = seed_task(&store, TaskStatus::Pending);

        let e1 = QueueEntry::new(QueueEntryId::random(), queued_task.clone(), 1, Utc::now());
        let e2 = QueueEntry::new(QueueEntryId::random(), pending_task, 0, Utc::now());
        store.insert_queue_entry(&e1).unwrap();
        store.insert_queue_entry(&e2).unwrap();

        let head = store.get_pending_queue_head(10).unwrap();
        assert_eq!(head.len(), 1);
        assert_eq!(head[0].task_id, queued_task);
    }

    #[test]
    fn stop_on_failure_gate_detects_failed_joined_task() {
        let store = Store::open_in_memory().unwrap();
        let failed_task = seed_task(&store, TaskStatus::Failed);
        let entry = QueueEntry::new(QueueEntryId::random(), failed_task, 0, Utc::now());
        let mut processing = entry.clone();
        processing.status = QueueEntryStatus::Processing;
        store.insert_queue_entry(&processing).unwrap();

        assert!(store.any_joined_task_failed().unwrap());
    }

    #[test]
    fn settings_round_trip_through_key_value_table() {
        let store = Store::open_in_memory().unwrap();
        store.set_queue_setting(wfe_core::KEY_PAUSED, "true").unwrap();
        store.set_queue_setting(wfe_core::KEY_MAX_CONCURRENT, "3").unwrap();

        let settings = store.get_queue_settings().unwrap();
        assert!(settings.paused());
        assert_eq!(settings.max_concurrent(), 3);

        store.set_queue_setting(wfe_core::KEY_PAUSED, "false").unwrap();
        assert!(!store.get_queue_settings().unwrap().paused());
    }
}
