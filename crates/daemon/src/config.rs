// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon binary (spec §6
//! "Environment variables"). Loaded once at startup and passed by `Arc` to
//! every component — no component reads the environment directly (spec §9
//! Design Notes: "hoist ambient module-scoped constants into a single,
//! explicitly-passed configuration value").

use std::path::PathBuf;
use wfe_core::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub event_dir: PathBuf,
    pub workspaces_dir: PathBuf,
    pub projects_dir: PathBuf,
    pub github_token: Option<String>,
    pub github_owner: Option<String>,
    pub enable_queue_processor: bool,
    pub use_multi_agent_events: bool,
    pub vibe_suite_url: Option<String>,
    pub vibe_suite_port: Option<u16>,
    /// Image used for container-backed (non-host-mode) agents. Not part of
    /// spec §6's env var list, but an ambient module-scoped constant the
    /// ALM needs hoisted the same way (spec §9 Design Notes).
    pub sandbox_image: String,
    /// Binary invoked inside the sandbox; receives the prompt file path.
    pub agent_runner: String,
}

impl Config {
    /// Loads `.env` (if present) then the environment, applying the
    /// defaults from spec §6.
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: env_or("PORT", 3020)?,
            database_path: env_path_or("DATABASE_PATH", "wfe.db"),
            event_dir: env_path_or("EVENT_DIR", "events"),
            workspaces_dir: env_path_or("WORKSPACES_DIR", "workspaces"),
            projects_dir: env_path_or("PROJECTS_DIR", "projects"),
            github_token: env_opt("GITHUB_TOKEN"),
            github_owner: env_opt("GITHUB_OWNER"),
            enable_queue_processor: env_bool_or("ENABLE_QUEUE_PROCESSOR", true)?,
            use_multi_agent_events: env_bool_or("USE_MULTI_AGENT_EVENTS", false)?,
            vibe_suite_url: env_opt("VIBE_SUITE_URL"),
            vibe_suite_port: match env_opt("VIBE_SUITE_PORT") {
                Some(s) => Some(s.parse::<u16>().map_err(|e| EngineError::validation(format!("VIBE_SUITE_PORT: {e}")))?),
                None => None,
            },
            sandbox_image: std::env::var("SANDBOX_IMAGE").unwrap_or_else(|_| "wfe/agent:latest".to_string()),
            agent_runner: std::env::var("AGENT_RUNNER").unwrap_or_else(|_| "agent-runner".to_string()),
        })
    }

    /// Applies CLI flag overrides on top of the environment baseline (spec §9
    /// Design Notes: "env baseline + CLI override").
    pub fn apply_cli(mut self, cli: &crate::cli::Cli) -> Self {
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(path) = cli.database_path.clone() {
            self.database_path = path;
        }
        if let Some(path) = cli.event_dir.clone() {
            self.event_dir = path;
        }
        if let Some(path) = cli.workspaces_dir.clone() {
            self.workspaces_dir = path;
        }
        if let Some(path) = cli.projects_dir.clone() {
            self.projects_dir = path;
        }
        if cli.disable_queue_processor {
            self.enable_queue_processor = false;
        }
        self
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_path_or(key: &str, default: &str) -> PathBuf {
    env_opt(key).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default))
}

fn env_or(key: &str, default: u16) -> EngineResult<u16> {
    match env_opt(key) {
        Some(s) => s.parse::<u16>().map_err(|e| EngineError::validation(format!("{key}: {e}"))),
        None => Ok(default),
    }
}

fn env_bool_or(key: &str, default: bool) -> EngineResult<bool> {
    match env_opt(key) {
        Some(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(EngineError::validation(format!("{key}: expected \"true\" or \"false\", got {other:?}"))),
        },
        None => Ok(default),
    }
}
