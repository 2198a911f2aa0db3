// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI flags layered on top of the environment baseline (spec §9 Design
//! Notes). Unset flags leave the corresponding environment-derived default
//! untouched.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "wfed", version, about = "Workflow engine daemon")]
pub struct Cli {
    /// Override PORT.
    #[arg(long)]
    pub port: Option<u16>,

    /// Override DATABASE_PATH.
    #[arg(long)]
    pub database_path: Option<PathBuf>,

    /// Override EVENT_DIR.
    #[arg(long)]
    pub event_dir: Option<PathBuf>,

    /// Override WORKSPACES_DIR.
    #[arg(long)]
    pub workspaces_dir: Option<PathBuf>,

    /// Override PROJECTS_DIR.
    #[arg(long)]
    pub projects_dir: Option<PathBuf>,

    /// Disable the Queue Processor regardless of ENABLE_QUEUE_PROCESSOR.
    #[arg(long)]
    pub disable_queue_processor: bool,
}
