// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/agents/*` handlers (spec §4.6).

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use wfe_alm::{AgentSpawnRequest, KillReason};
use wfe_core::{Agent, AgentKind, AgentLogLine, TaskId};
use wfe_store::AgentAnalytics;

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/agents/spawn", post(spawn))
        .route("/agents", get(list))
        .route("/agents/active", get(list_active))
        .route("/agents/analytics", get(analytics))
        .route("/agents/{id}", get(get_one))
        .route("/agents/{id}/logs", get(logs))
        .route("/agents/{id}/kill", post(kill))
        .route("/agents/{id}/retry", post(retry))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpawnBody {
    task_id: TaskId,
    repo: String,
    title: String,
    description: String,
    #[serde(default)]
    kind: Option<AgentKind>,
    #[serde(default)]
    pr_number: Option<u64>,
    #[serde(default)]
    pr_url: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    deployment_url: Option<String>,
    #[serde(default)]
    focus_areas: Option<Vec<String>>,
    #[serde(default)]
    review_feedback: Option<String>,
    #[serde(default)]
    existing_branch: Option<String>,
    #[serde(default)]
    prior_plan: Option<serde_json::Value>,
    prompt: String,
    #[serde(default)]
    callback_url: Option<String>,
}

impl From<SpawnBody> for AgentSpawnRequest {
    fn from(body: SpawnBody) -> Self {
        let mut req = AgentSpawnRequest::new(body.task_id, body.repo, body.title, body.description, body.prompt)
            .with_kind(body.kind.unwrap_or_default());
        req.pr_number = body.pr_number;
        req.pr_url = body.pr_url;
        req.branch = body.branch;
        req.deployment_url = body.deployment_url;
        req.focus_areas = body.focus_areas;
        req.review_feedback = body.review_feedback;
        req.existing_branch = body.existing_branch;
        req.prior_plan = body.prior_plan;
        req.callback_url = body.callback_url;
        req
    }
}

async fn spawn(State(state): State<AppState>, Json(body): Json<SpawnBody>) -> ApiResult<Json<Agent>> {
    let agent = state.alm.spawn(body.into()).await?;
    Ok(Json(agent))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<u32>,
}

async fn list(State(state): State<AppState>, Query(q): Query<ListQuery>) -> ApiResult<Json<Vec<Agent>>> {
    Ok(Json(state.alm.list_agents(q.limit.unwrap_or(100))?))
}

async fn list_active(State(state): State<AppState>) -> ApiResult<Json<Vec<Agent>>> {
    Ok(Json(state.alm.list_active_agents()?))
}

async fn analytics(State(state): State<AppState>) -> ApiResult<Json<AgentAnalytics>> {
    Ok(Json(state.alm.analytics()?))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Agent>> {
    let agent = state.alm.get_agent(&id)?.ok_or_else(|| wfe_core::EngineError::not_found(format!("agent {id}")))?;
    Ok(Json(agent))
}

async fn logs(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<AgentLogLine>>> {
    Ok(Json(state.alm.get_agent_logs(&id)?))
}

async fn kill(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    state.alm.kill(&id, KillReason::Killed).await?;
    Ok(Json(serde_json::json!({ "killed": true })))
}

async fn retry(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Agent>> {
    Ok(Json(state.alm.retry(&id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{harness, json_body};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use wfe_core::{AgentStatus, Task};

    #[tokio::test]
    async fn spawn_then_get_round_trips() {
        let (app, state) = harness();
        let task_id = TaskId::random();
        state.store.insert_task(&Task::new(task_id.clone(), "t", "d", chrono::Utc::now())).unwrap();

        let body = serde_json::json!({
            "taskId": task_id.as_str(),
            "repo": "svc-a",
            "title": "t",
            "description": "d",
            "kind": "deployer",
            "prompt": "do it",
        });
        let response = app
            .clone()
            .oneshot(Request::builder().method("POST").uri("/agents/spawn").header("content-type", "application/json").body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let agent: Agent = json_body(response).await;
        assert_eq!(agent.status, AgentStatus::Running);

        let response = app.oneshot(Request::builder().uri(format!("/agents/{}", agent.id.as_str())).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: Agent = json_body(response).await;
        assert_eq!(fetched.id, agent.id);
    }

    #[tokio::test]
    async fn get_unknown_agent_is_404() {
        let (app, _state) = harness();
        let response = app.oneshot(Request::builder().uri("/agents/nonexistent").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn kill_of_unknown_agent_is_ok_not_an_error() {
        let (app, _state) = harness();
        let response = app.oneshot(Request::builder().method("POST").uri("/agents/nonexistent/kill").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
