//! ==============================================================================
//! session.rs - dashboard session state
//! ==============================================================================
//!
//! purpose:
//!     explicit session object replacing ambient ui state: the cached
//!     snapshot, the rolling chart window, a one-time loading flag, and a
//!     stale-data indicator. all mutation goes through apply_patch.
//!
//! concurrency:
//!     the feed task is the only writer; http handlers only read. the whole
//!     session sits behind Arc<RwLock<_>>, and each push event is processed
//!     to completion under one write lock, so consumers observe
//!     merge + append + truncate as a single update.
//!
//! ==============================================================================

use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::RwLock;

use crate::severity::{self, SeverityLevel};
use crate::telemetry::{ChartPoint, RollingWindow, Snapshot, SnapshotPatch};

pub type SharedSession = Arc<RwLock<DashboardSession>>;

pub struct DashboardSession {
    snapshot: Snapshot,
    window: RollingWindow,
    /// true until the first push arrives or the startup timeout fires
    loading: bool,
    /// set on subscription errors; cleared by the next successful push
    stale: bool,
    /// unix epoch ms of the last applied push, 0 before the first one
    last_update_ms: i64,
}

/// zero-padded HH:MM label from the local wall clock. no timezone
/// conversion: chart labels reflect the observing process.
pub fn clock_label() -> String {
    Local::now().format("%H:%M").to_string()
}

impl DashboardSession {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            snapshot: Snapshot::default(),
            window: RollingWindow::new(window_capacity),
            loading: true,
            stale: false,
            last_update_ms: 0,
        }
    }

    /// apply one push event: merge the patch onto the cached snapshot,
    /// derive a chart point from the merged result at the given wall-clock
    /// label, and append it to the window.
    pub fn apply_patch(&mut self, patch: &SnapshotPatch, time_label: String) {
        self.snapshot = self.snapshot.merged(patch);
        self.window.push(ChartPoint::sample(&self.snapshot, time_label));
        self.loading = false;
        self.stale = false;
        self.last_update_ms = Utc::now().timestamp_millis();
    }

    /// severity of the current cached dust reading. independent of the
    /// remote led_status flag.
    pub fn severity(&self) -> SeverityLevel {
        severity::classify(self.snapshot.dust)
    }

    /// startup timeout hook: exits the loading state without touching the
    /// data. deliberately decoupled from actual data arrival.
    pub fn finish_loading(&mut self) {
        self.loading = false;
    }

    /// subscription error hook: keep the last known snapshot, flag it stale.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn stale(&self) -> bool {
        self.stale
    }

    pub fn last_update_ms(&self) -> i64 {
        self.last_update_ms
    }
}
