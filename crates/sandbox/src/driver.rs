// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sandbox driver abstraction. `wfe-alm` talks to whichever driver is
//! configured only through this trait; it never shells out or touches the
//! container runtime directly.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use wfe_core::{EngineResult, LogStream};

/// Everything needed to start a sandboxed process (spec §4.3 step 6): the
/// workspace bind-mounted read-write, the prompt as argv/stdin, and an
/// environment carrying task id, agent id, endpoints, and a credential.
/// Memory/CPU caps are fixed at engine level (2 GiB / 1 vCPU for
/// containers); host-mode agents ignore them.
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    pub workspace: PathBuf,
    pub image: Option<String>,
    pub argv: Vec<String>,
    pub env: HashMap<String, String>,
    pub memory_mb: u64,
    pub cpus: f64,
}

impl SandboxSpec {
    pub fn host_mode(workspace: PathBuf, argv: Vec<String>, env: HashMap<String, String>) -> Self {
        Self { workspace, image: None, argv, env, memory_mb: 0, cpus: 0.0 }
    }

    pub fn containerized(
        workspace: PathBuf,
        image: String,
        argv: Vec<String>,
        env: HashMap<String, String>,
    ) -> Self {
        Self { workspace, image: Some(image), argv, env, memory_mb: 2048, cpus: 1.0 }
    }
}

/// Opaque container id or host process id (spec §3 "sandbox handle").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxHandle(pub String);

impl std::fmt::Display for SandboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct LogChunk {
    pub stream: LogStream,
    pub line: String,
}

/// A freshly started sandbox: its handle, a channel of log lines as they're
/// produced, and the eventual exit code (or `None` if the process was
/// killed rather than exiting on its own).
pub struct Started {
    pub handle: SandboxHandle,
    pub logs: mpsc::UnboundedReceiver<LogChunk>,
    pub exit: tokio::sync::oneshot::Receiver<Option<i32>>,
}

#[async_trait]
pub trait SandboxDriver: Send + Sync {
    async fn start(&self, spec: SandboxSpec) -> EngineResult<Started>;

    /// Best-effort: requests termination. Idempotent on an already-exited
    /// handle (spec §5 "kill is idempotent on terminal agents").
    async fn kill(&self, handle: &SandboxHandle) -> EngineResult<()>;

    /// Used by the crash-recovery sweep (spec §4.3.4) to tell whether a
    /// previously-running handle is still alive after a restart.
    async fn is_running(&self, handle: &SandboxHandle) -> EngineResult<bool>;

    /// The handle's terminal exit code, if the driver can still observe
    /// one (spec §4.3.4 "reconcile to the driver's observed exit code").
    /// Host-mode drivers lose this across a daemon restart and should
    /// return `Ok(None)`.
    async fn exit_code(&self, handle: &SandboxHandle) -> EngineResult<Option<i32>>;

    /// Container-backed drivers only; host-mode drivers should always
    /// return `Ok(true)` since there is no image to check.
    async fn image_available(&self, image: &str) -> EngineResult<bool>;
}
