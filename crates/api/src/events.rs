// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/events/*` handlers (spec §4.6). `POST /events` is a manual escape
//! hatch into the spool — the Queue Processor and agents append through
//! `wfe_spool::Spool` directly, but operators and tests need a way to
//! inject or replay an event without going through either.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use wfe_core::{Event, EventPayload};

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_all).post(create))
        .route("/events/pending", get(list_pending))
        .route("/events/processed", get(list_processed))
        .route("/events/{id}", get(get_one))
        .route("/events/{id}/processed", post(mark_processed))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn list_all(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(state.spool.list_all(q.limit.unwrap_or(100)).await?))
}

async fn create(State(state): State<AppState>, Json(payload): Json<EventPayload>) -> ApiResult<Json<Event>> {
    Ok(Json(state.spool.append(payload, "api").await?))
}

async fn list_pending(State(state): State<AppState>) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(state.spool.list_pending().await?))
}

async fn list_processed(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(state.spool.list_processed(q.limit).await?))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Event>> {
    let all = state.spool.list_all(usize::MAX).await?;
    let found = all
        .into_iter()
        .find(|e| e.id.as_str() == id || e.id.short() == id)
        .ok_or_else(|| wfe_core::EngineError::not_found(format!("event {id}")))?;
    Ok(Json(found))
}

async fn mark_processed(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    state.spool.mark_processed(&id).await?;
    Ok(Json(serde_json::json!({ "processed": true })))
}
