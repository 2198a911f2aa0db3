// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine-wide error type.
//!
//! Every variant corresponds to one of the stable kind strings in spec §7;
//! `kind()` returns that string so the public API and callback payloads can
//! surface a machine-readable identifier independent of the human message.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(String),

    #[error("spool error: {0}")]
    Spool(String),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("recovery error: {0}")]
    Recovery(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl EngineError {
    /// The stable, machine-readable identifier from spec §7.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Store(_) => "store-error",
            EngineError::Spool(_) => "spool-error",
            EngineError::Sandbox(_) => "sandbox-error",
            EngineError::NotFound(_) => "not-found",
            EngineError::InvalidState(_) => "invalid-state",
            EngineError::Timeout(_) => "timeout",
            EngineError::Recovery(_) => "recovery-error",
            EngineError::Validation(_) => "validation-error",
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        EngineError::InvalidState(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn recovery(msg: impl Into<String>) -> Self {
        EngineError::Recovery(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_spec() {
        assert_eq!(EngineError::Store("x".into()).kind(), "store-error");
        assert_eq!(EngineError::Spool("x".into()).kind(), "spool-error");
        assert_eq!(EngineError::Sandbox("x".into()).kind(), "sandbox-error");
        assert_eq!(EngineError::NotFound("x".into()).kind(), "not-found");
        assert_eq!(EngineError::InvalidState("x".into()).kind(), "invalid-state");
        assert_eq!(EngineError::Timeout("x".into()).kind(), "timeout");
        assert_eq!(EngineError::Recovery("x".into()).kind(), "recovery-error");
        assert_eq!(EngineError::Validation("x".into()).kind(), "validation-error");
    }
}
