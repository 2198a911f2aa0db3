// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `EngineError` to HTTP response mapping. Every handler returns
//! `ApiResult<T>`; a failure becomes `{ kind, message }` JSON with the
//! status appropriate to the error kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use wfe_core::EngineError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

pub struct ApiError(pub EngineError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidState(_) => StatusCode::CONFLICT,
            EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Store(_) | EngineError::Spool(_) | EngineError::Sandbox(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Timeout(_) | EngineError::Recovery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody { kind: self.0.kind().to_string(), message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}
