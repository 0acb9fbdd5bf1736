use std::time::Duration;

use serde::Serialize;

/// Point-in-time traversal counters. Every counter only ever grows during a run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RunStats {
    pub pages_attempted: u64,
    /// Pages recorded with `Ok` or `PartialContent`.
    pub pages_succeeded: u64,
    pub pages_partial: u64,
    pub pages_failed: u64,
    /// Deepest task depth among recorded pages.
    pub max_depth_reached: u32,
    pub links_discovered: u64,
    pub links_enqueued: u64,
    pub links_out_of_scope: u64,
    pub links_malformed: u64,
    pub links_dropped_by_robots: u64,
    pub links_dropped_by_filter: u64,
    pub fetch_retries: u64,
    pub peak_concurrent_fetches: u64,
    pub duplicates_overwritten: u64,
    pub elapsed: Duration,
}

impl RunStats {
    /// Pages that reached a terminal state, the figure the page cap is
    /// measured against.
    pub fn pages_completed(&self) -> u64 {
        self.pages_succeeded + self.pages_failed
    }
}
