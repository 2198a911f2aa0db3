// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The `SandboxDriver` collaborator (spec §4.3 step 6) and the reference
//! implementations the engine ships with: `local` (host-process) and
//! `docker` (container-backed, shelling out to the `docker` CLI).

pub mod docker;
pub mod driver;
pub mod local;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use driver::{LogChunk, SandboxDriver, SandboxHandle, SandboxSpec, Started};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSandboxDriver, Scripted};
