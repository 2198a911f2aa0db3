// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container-backed sandbox driver. Shells out to the `docker` CLI for
//! lifecycle management — no docker-control crate is pulled in, since the
//! CLI is the stable, documented contract.

use crate::driver::{LogChunk, SandboxDriver, SandboxHandle, SandboxSpec, Started};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use wfe_core::{EngineError, EngineResult, LogStream};

#[derive(Clone, Default)]
pub struct DockerDriver;

impl DockerDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SandboxDriver for DockerDriver {
    async fn start(&self, spec: SandboxSpec) -> EngineResult<Started> {
        let image = spec
            .image
            .as_deref()
            .ok_or_else(|| EngineError::Sandbox("containerized spec missing image".to_string()))?;

        let vol = format!("{}:/workspace", spec.workspace.display());
        let mem = format!("{}m", spec.memory_mb);
        let cpus = spec.cpus.to_string();
        let mut args: Vec<String> =
            vec!["run".into(), "-d".into(), "--memory".into(), mem, "--cpus".into(), cpus, "-v".into(), vol, "-w".into(), "/workspace".into()];
        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        args.push(image.to_string());
        args.extend(spec.argv.iter().cloned());

        let container_id = run_docker(&args).await?;
        let handle = SandboxHandle(container_id);

        let (logs_tx, logs_rx) = mpsc::unbounded_channel();
        let mut logs_child = Command::new("docker")
            .args(["logs", "-f", &handle.0])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Sandbox(format!("docker logs -f failed: {e}")))?;
        if let Some(stdout) = logs_child.stdout.take() {
            spawn_line_reader(stdout, LogStream::Out, logs_tx.clone());
        }
        if let Some(stderr) = logs_child.stderr.take() {
            spawn_line_reader(stderr, LogStream::Err, logs_tx.clone());
        }
        tokio::spawn(async move {
            let _ = logs_child.wait().await;
        });

        let (exit_tx, exit_rx) = oneshot::channel();
        let wait_id = handle.0.clone();
        tokio::spawn(async move {
            let exit_code = run_docker(&["wait".to_string(), wait_id]).await.ok().and_then(|out| out.trim().parse::<i32>().ok());
            let _ = exit_tx.send(exit_code);
        });

        Ok(Started { handle, logs: logs_rx, exit: exit_rx })
    }

    async fn kill(&self, handle: &SandboxHandle) -> EngineResult<()> {
        // A container that's already stopped answers with a non-zero exit
        // and an error on stderr; that is a no-op, not a failure (spec §5
        // "kill is idempotent on terminal agents").
        let _ = run_docker(&["kill".to_string(), handle.0.clone()]).await;
        Ok(())
    }

    async fn is_running(&self, handle: &SandboxHandle) -> EngineResult<bool> {
        match run_docker(&["inspect".to_string(), "-f".to_string(), "{{.State.Running}}".to_string(), handle.0.clone()]).await {
            Ok(out) => Ok(out.trim() == "true"),
            Err(_) => Ok(false),
        }
    }

    async fn exit_code(&self, handle: &SandboxHandle) -> EngineResult<Option<i32>> {
        let args = ["inspect".to_string(), "-f".to_string(), "{{.State.ExitCode}}".to_string(), handle.0.clone()];
        match run_docker(&args).await {
            Ok(out) => Ok(out.trim().parse::<i32>().ok()),
            Err(_) => Ok(None),
        }
    }

    async fn image_available(&self, image: &str) -> EngineResult<bool> {
        Ok(run_docker(&["image".to_string(), "inspect".to_string(), image.to_string()]).await.is_ok())
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

async fn run_docker(args: &[String]) -> EngineResult<String> {
    let output = Command::new("docker")
        .args(args)
        .output()
        .await
        .map_err(|e| EngineError::Sandbox(format!("failed to exec docker: {e}")))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(EngineError::Sandbox(format!("docker {} failed: {}", args.first().map(String::as_str).unwrap_or(""), stderr.trim())))
    }
}
