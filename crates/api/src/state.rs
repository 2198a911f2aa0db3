// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use wfe_alm::Manager;
use wfe_spool::Spool;
use wfe_store::Store;

/// Shared handles every handler needs. Cheap to clone — every field is
/// already an `Arc` (spec §5 "the Store is the only shared mutable resource
/// across components").
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub spool: Arc<Spool>,
    pub alm: Arc<Manager>,
}
