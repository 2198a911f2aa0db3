// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary entrypoint: loads configuration, wires the Store, Spool, sandbox
//! drivers, ALM, Event Router, Queue Processor, and public API together, and
//! runs until a shutdown signal arrives.

mod cli;
mod config;
mod shutdown;

use clap::Parser;
use config::Config;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wfe_alm::{Manager, ManagerConfig};
use wfe_api::AppState;
use wfe_queue::QueueProcessor;
use wfe_router::Router;
use wfe_sandbox::{docker::DockerDriver, local::LocalDriver};
use wfe_spool::Spool;
use wfe_store::Store;

const ROUTER_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
const QUEUE_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = Config::from_env()?.apply_cli(&cli);

    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    tracing::info!(port = config.port, db = %config.database_path.display(), "starting daemon");

    // 1. Store and Spool.
    std::fs::create_dir_all(&config.workspaces_dir)?;
    std::fs::create_dir_all(&config.projects_dir)?;
    let store = Arc::new(Store::open(&config.database_path)?);
    let spool = Arc::new(Spool::open(config.event_dir.clone())?);

    // 2. Sandbox drivers and the Agent Lifecycle Manager.
    let host_driver = Arc::new(LocalDriver::new());
    let container_driver = Arc::new(DockerDriver::new());
    let manager_config = ManagerConfig {
        workspace_root: config.workspaces_dir.clone(),
        sandbox_image: config.sandbox_image.clone(),
        agent_runner: config.agent_runner.clone(),
        api_base_url: Some(format!("http://127.0.0.1:{}", config.port)),
        agent_credential: config.github_token.clone(),
        upstream_base_url: config.vibe_suite_url.clone(),
    };
    let alm = Manager::new(store.clone(), host_driver, container_driver, manager_config);

    // 3. Crash recovery sweep (spec §4.3.4), before anything else can touch
    // the active-agent map.
    alm.recover().await;

    // 4. Background tickers.
    let (log_flush_handle, log_flush_stop) = wfe_core::stop_signal();
    let alm_for_ticker = alm.clone();
    let log_flush_task = tokio::spawn(async move { alm_for_ticker.run_log_flush_ticker(log_flush_stop).await });

    let router = Router::new(store.clone(), spool.clone(), alm.clone());
    let (router_handle, router_stop) = wfe_core::stop_signal();
    let router_task = tokio::spawn(router.run(ROUTER_POLL_INTERVAL, router_stop));

    let queue_task = if config.enable_queue_processor {
        let queue = QueueProcessor::new(store.clone(), spool.clone(), alm.clone(), config.use_multi_agent_events);
        let (handle, stop) = wfe_core::stop_signal();
        let task = tokio::spawn(queue.run(QUEUE_POLL_INTERVAL, stop));
        Some((handle, task))
    } else {
        tracing::info!("queue processor disabled (ENABLE_QUEUE_PROCESSOR=false)");
        None
    };

    // 5. Public HTTP interface.
    let state = AppState { store, spool, alm };
    let app = wfe_api::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown::shutdown_signal()).await?;

    // 6. Drain background tickers before exit.
    tracing::info!("stopping background tickers");
    log_flush_handle.stop();
    router_handle.stop();
    let _ = log_flush_task.await;
    let _ = router_task.await;
    if let Some((handle, task)) = queue_task {
        handle.stop();
        let _ = task.await;
    }

    Ok(())
}
