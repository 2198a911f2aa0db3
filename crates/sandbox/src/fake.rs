// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A scripted `SandboxDriver` so `wfe-alm` and `wfe-router` tests never
//! shell out to a real driver.

use crate::driver::{LogChunk, SandboxDriver, SandboxHandle, SandboxSpec, Started};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use wfe_core::{EngineError, EngineResult, LogStream};

/// One scripted outcome for the next `start()` call.
#[derive(Clone)]
pub struct Scripted {
    pub lines: Vec<(LogStream, String)>,
    pub exit_code: Option<i32>,
    pub fail_start: bool,
}

impl Default for Scripted {
    fn default() -> Self {
        Self { lines: Vec::new(), exit_code: Some(0), fail_start: false }
    }
}

impl Scripted {
    pub fn with_lines(mut self, lines: Vec<(LogStream, impl Into<String>)>) -> Self {
        self.lines = lines.into_iter().map(|(s, l)| (s, l.into())).collect();
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// The sandboxed process never exits on its own; it only stops once
    /// `kill()` is called, at which point `Started.exit` resolves to
    /// `None`. Used by tests that need a window in which a spawned agent is
    /// still running.
    pub fn never_exits(mut self) -> Self {
        self.exit_code = None;
        self
    }

    pub fn failing() -> Self {
        Self { fail_start: true, ..Default::default() }
    }
}

#[derive(Clone, Default)]
pub struct FakeSandboxDriver {
    next: Arc<Mutex<Vec<Scripted>>>,
    running: Arc<Mutex<HashMap<String, bool>>>,
    exit_codes: Arc<Mutex<HashMap<String, Option<i32>>>>,
    kill_calls: Arc<Mutex<Vec<SandboxHandle>>>,
    next_id: Arc<Mutex<u64>>,
    /// Exit senders for handles whose script is `never_exits()`; only
    /// triggered by an explicit `kill()`.
    pending_exits: Arc<Mutex<HashMap<String, oneshot::Sender<Option<i32>>>>>,
}

impl FakeSandboxDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an outcome for the next `start()` call (FIFO). If the queue is
    /// empty, `start()` defaults to an immediate clean exit.
    pub fn push_script(&self, script: Scripted) {
        self.next.lock().push(script);
    }

    pub fn kill_calls(&self) -> Vec<SandboxHandle> {
        self.kill_calls.lock().clone()
    }

    /// Registers a handle as already-exited with the given code, without
    /// going through `start()`. Used by crash-recovery tests that need a
    /// handle the driver reports as not-running at startup.
    pub fn mark_exited(&self, handle: &SandboxHandle, exit_code: Option<i32>) {
        self.running.lock().insert(handle.0.clone(), false);
        self.exit_codes.lock().insert(handle.0.clone(), exit_code);
    }

    /// Registers a handle as still running, without going through
    /// `start()`. Used by crash-recovery tests that need a handle the
    /// driver reports as alive at startup.
    pub fn mark_running(&self, handle: &SandboxHandle) {
        self.running.lock().insert(handle.0.clone(), true);
    }
}

#[async_trait]
impl SandboxDriver for FakeSandboxDriver {
    async fn start(&self, _spec: SandboxSpec) -> EngineResult<Started> {
        let script = {
            let mut queue = self.next.lock();
            if queue.is_empty() {
                Scripted::default()
            } else {
                queue.remove(0)
            }
        };

        if script.fail_start {
            return Err(EngineError::Sandbox("fake driver: scripted start failure".to_string()));
        }

        let id = {
            let mut n = self.next_id.lock();
            *n += 1;
            format!("fake-{n}")
        };
        let handle = SandboxHandle(id.clone());
        self.running.lock().insert(id.clone(), true);

        let (logs_tx, logs_rx) = mpsc::unbounded_channel();
        for (stream, line) in script.lines {
            let _ = logs_tx.send(LogChunk { stream, line });
        }
        drop(logs_tx);

        let (exit_tx, exit_rx) = oneshot::channel();
        match script.exit_code {
            Some(code) => {
                let running = self.running.clone();
                let exit_codes = self.exit_codes.clone();
                tokio::spawn(async move {
                    running.lock().insert(id.clone(), false);
                    exit_codes.lock().insert(id, Some(code));
                    let _ = exit_tx.send(Some(code));
                });
            }
            None => {
                // Stays running until an explicit kill() fires the exit.
                self.pending_exits.lock().insert(id, exit_tx);
            }
        }

        Ok(Started { handle, logs: logs_rx, exit: exit_rx })
    }

    async fn kill(&self, handle: &SandboxHandle) -> EngineResult<()> {
        self.kill_calls.lock().push(handle.clone());
        self.running.lock().insert(handle.0.clone(), false);
        if let Some(exit_tx) = self.pending_exits.lock().remove(&handle.0) {
            self.exit_codes.lock().insert(handle.0.clone(), None);
            let _ = exit_tx.send(None);
        }
        Ok(())
    }

    async fn is_running(&self, handle: &SandboxHandle) -> EngineResult<bool> {
        Ok(self.running.lock().get(&handle.0).copied().unwrap_or(false))
    }

    async fn exit_code(&self, handle: &SandboxHandle) -> EngineResult<Option<i32>> {
        Ok(self.exit_codes.lock().get(&handle.0).copied().flatten())
    }

    async fn image_available(&self, _image: &str) -> EngineResult<bool> {
        Ok(true)
    }
}
