// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-process sandbox driver, used for `deployer`/`healthcheck` agents
//! and for local development (spec §4.3 step 3: host-mode kinds skip the
//! sandbox-image check entirely).

use crate::driver::{LogChunk, SandboxDriver, SandboxHandle, SandboxSpec, Started};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use wfe_core::{EngineError, EngineResult, LogStream};

/// Runs agents as direct child processes of the daemon. Each handle is
/// `host-<pid>`; there is no image concept, so `image_available` always
/// reports `true`.
#[derive(Clone, Default)]
pub struct LocalDriver {
    kill_txs: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<()>>>>,
}

impl LocalDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SandboxDriver for LocalDriver {
    async fn start(&self, spec: SandboxSpec) -> EngineResult<Started> {
        let Some((program, args)) = spec.argv.split_first() else {
            return Err(EngineError::Sandbox("empty argv".to_string()));
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&spec.workspace)
            .envs(&spec.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| EngineError::Sandbox(format!("failed to start host process: {e}")))?;
        let pid = child.id().ok_or_else(|| EngineError::Sandbox("process exited immediately".to_string()))?;
        let handle = SandboxHandle(format!("host-{pid}"));

        let (logs_tx, logs_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, LogStream::Out, logs_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, LogStream::Err, logs_tx.clone());
        }

        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();
        self.kill_txs.lock().insert(handle.0.clone(), kill_tx);

        let (exit_tx, exit_rx) = oneshot::channel();
        let kill_txs = self.kill_txs.clone();
        let handle_key = handle.0.clone();
        tokio::spawn(async move {
            let exit_code = tokio::select! {
                status = child.wait() => status.ok().and_then(|s| s.code()),
                _ = kill_rx.recv() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    None
                }
            };
            kill_txs.lock().remove(&handle_key);
            let _ = exit_tx.send(exit_code);
        });

        Ok(Started { handle, logs: logs_rx, exit: exit_rx })
    }

    async fn kill(&self, handle: &SandboxHandle) -> EngineResult<()> {
        // Idempotent: a missing entry means the process already exited.
        if let Some(tx) = self.kill_txs.lock().get(&handle.0) {
            let _ = tx.send(());
        }
        Ok(())
    }

    async fn is_running(&self, handle: &SandboxHandle) -> EngineResult<bool> {
        Ok(self.kill_txs.lock().contains_key(&handle.0))
    }

    async fn exit_code(&self, _handle: &SandboxHandle) -> EngineResult<Option<i32>> {
        // Host processes are owned by the daemon's process tree; a restart
        // loses the child entirely, so there is nothing left to observe.
        Ok(None)
    }

    async fn image_available(&self, _image: &str) -> EngineResult<bool> {
        Ok(true)
    }
}

fn spawn_line_reader<R>(reader: R, stream: LogStream, tx: mpsc::UnboundedSender<LogChunk>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.is_empty() {
                continue;
            }
            if tx.send(LogChunk { stream, line }).is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_streams_logs_and_reports_exit_code() {
        let driver = LocalDriver::new();
        let workspace = tempfile::tempdir().unwrap();
        let spec = SandboxSpec::host_mode(
            workspace.path().to_path_buf(),
            vec!["sh".into(), "-c".into(), "echo hello; exit 3".into()],
            HashMap::new(),
        );

        let mut started = driver.start(spec).await.unwrap();
        assert!(driver.is_running(&started.handle).await.unwrap());

        let mut lines = Vec::new();
        while let Some(chunk) = started.logs.recv().await {
            lines.push(chunk.line);
        }
        assert_eq!(lines, vec!["hello".to_string()]);

        let code = started.exit.await.unwrap();
        assert_eq!(code, Some(3));
        assert!(!driver.is_running(&started.handle).await.unwrap());
    }

    #[tokio::test]
    async fn kill_is_idempotent_on_unknown_handle() {
        let driver = LocalDriver::new();
        driver.kill(&SandboxHandle("host-999999".into())).await.unwrap();
    }
}
