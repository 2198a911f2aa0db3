// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The Event Router (spec §4.4): polls the spool's `pending/` directory and
//! translates each event into its side effect, then marks it processed.
//! Runs on a single-flight ticker — `wfe_core::run_ticker` never starts tick
//! N+1 before tick N's `on_tick` future resolves, which is what keeps two
//! polls from double-handling the same file.

mod dispatch;
mod processed;
mod prompt;

use std::sync::Arc;
use wfe_alm::Manager;
use wfe_core::StopSignal;
use wfe_spool::Spool;
use wfe_store::Store;

pub struct Router {
    store: Arc<Store>,
    spool: Arc<Spool>,
    alm: Arc<Manager>,
    processed: parking_lot::Mutex<processed::ProcessedIds>,
}

impl Router {
    pub fn new(store: Arc<Store>, spool: Arc<Spool>, alm: Arc<Manager>) -> Arc<Self> {
        Arc::new(Self { store, spool, alm, processed: parking_lot::Mutex::new(processed::ProcessedIds::new()) })
    }

    /// Drives the poll loop until `stop` trips (spec §4.4 "periodic poll").
    pub async fn run(self: Arc<Self>, interval: std::time::Duration, stop: StopSignal) {
        let router = self;
        wfe_core::run_ticker(interval, stop, move || {
            let router = Arc::clone(&router);
            async move { router.poll_once().await }
        })
        .await;
    }

    /// One pass over `pending/`, in filename order (spec §4.4). Never
    /// propagates an error: a single bad event is logged and left pending,
    /// the rest of the batch still gets a chance.
    pub async fn poll_once(&self) {
        let events = match self.spool.list_pending().await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "event router: failed to list pending events");
                return;
            }
        };

        for event in events {
            let id = event.id.as_str().to_string();
            if self.processed.lock().contains(&id) {
                continue;
            }

            match dispatch::dispatch(&event, &self.store, &self.alm).await {
                Ok(()) => match self.spool.mark_processed(event.id.short()).await {
                    Ok(()) => self.processed.lock().insert(&id),
                    Err(e) => tracing::warn!(event_id = %id, error = %e, "event router: failed to mark event processed"),
                },
                Err(e) => {
                    tracing::warn!(event_id = %id, kind = %event.kind_str(), error = %e, "event router: handler failed, leaving event pending");
                }
            }
        }
    }
}
