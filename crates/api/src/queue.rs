// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/queue/*` handlers (spec §4.6). Mutates `QueueEntry`/`QueueSettings`
//! rows directly — claiming an entry for processing remains the Queue
//! Processor's job (spec §5 "Ownership summary").

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use std::collections::HashMap;
use wfe_core::{EngineError, QueueEntry, QueueEntryId, QueueSettings, TaskStatus};

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/queue", get(list))
        .route("/queue/settings", get(get_settings).post(set_settings))
        .route("/queue/add/{task_id}", post(add))
        .route("/queue/{task_id}", delete(remove))
        .route("/queue/clear", post(clear))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<QueueEntry>>> {
    Ok(Json(state.store.list_queue_entries()?))
}

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<HashMap<String, String>>> {
    Ok(Json(state.store.get_queue_settings()?.as_map().clone()))
}

async fn set_settings(State(state): State<AppState>, Json(settings): Json<HashMap<String, String>>) -> ApiResult<Json<QueueSettings>> {
    for (key, value) in &settings {
        state.store.set_queue_setting(key, value)?;
    }
    Ok(Json(state.store.get_queue_settings()?))
}

/// Creates a `QueueEntry` for an existing, non-terminal task at the next
/// free position, and moves the task to `queued` so the Queue Processor's
/// join (spec §4.5 step 4) picks it up (spec §8 I3).
async fn add(State(state): State<AppState>, Path(task_id): Path<String>) -> ApiResult<Json<QueueEntry>> {
    let mut task = state.store.get_task(&task_id)?.ok_or_else(|| EngineError::not_found(format!("task {task_id}")))?;

    if task.status.is_terminal() {
        return Err(EngineError::invalid_state(format!("task {task_id} is already terminal")).into());
    }
    if state.store.get_queue_entry_by_task(&task_id)?.is_some() {
        return Err(EngineError::invalid_state(format!("task {task_id} already has a queue entry")).into());
    }

    let next_position = state.store.list_queue_entries()?.iter().map(|e| e.position).max().map(|p| p + 1).unwrap_or(0);

    task.status = TaskStatus::Queued;
    task.updated_at = Utc::now();
    state.store.update_task(&task)?;

    let entry = QueueEntry::new(QueueEntryId::random(), task.id.clone(), next_position, Utc::now());
    state.store.insert_queue_entry(&entry)?;
    Ok(Json(entry))
}

async fn remove(State(state): State<AppState>, Path(task_id): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    state.store.delete_queue_entry(&task_id)?;
    Ok(Json(serde_json::json!({ "removed": true })))
}

async fn clear(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.store.clear_queue()?;
    Ok(Json(serde_json::json!({ "cleared": true })))
}
