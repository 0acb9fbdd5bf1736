use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crawl_core::{NormalizedUrl, PageResult, PageStatus, RunStats};
use crawl_logging::crawl_warn;
use serde::Serialize;
use tokio::time::Instant;

/// Frozen view of a run: results in discovery order plus counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSnapshot {
    pub results: Vec<PageResult>,
    pub stats: RunStats,
}

impl CrawlSnapshot {
    pub fn get(&self, url: &NormalizedUrl) -> Option<&PageResult> {
        self.results.iter().find(|result| &result.url == url)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PageResult> {
        self.results.iter().filter(|result| result.is_failed())
    }
}

/// Link bookkeeping for one page, folded into the run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LinkTally {
    pub discovered: u64,
    pub enqueued: u64,
    pub out_of_scope: u64,
    pub malformed: u64,
    pub dropped_by_robots: u64,
    pub dropped_by_filter: u64,
}

#[derive(Debug)]
struct AggregatorState {
    results: HashMap<NormalizedUrl, PageResult>,
    stats: RunStats,
}

/// Concurrent result sink. Keyed by URL; all counters change through here.
#[derive(Debug)]
pub struct Aggregator {
    started: Instant,
    state: Mutex<AggregatorState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            state: Mutex::new(AggregatorState {
                results: HashMap::new(),
                stats: RunStats::default(),
            }),
        }
    }

    /// Count a page a worker has started on.
    pub fn begin_page(&self) {
        self.lock().stats.pages_attempted += 1;
    }

    /// Store `result`, replacing any earlier result for the same URL.
    pub fn record(&self, result: PageResult) {
        let mut state = self.lock();
        let stats = &mut state.stats;
        match result.status {
            PageStatus::Ok => stats.pages_succeeded += 1,
            PageStatus::PartialContent => {
                stats.pages_succeeded += 1;
                stats.pages_partial += 1;
            }
            PageStatus::Failed => stats.pages_failed += 1,
        }
        stats.max_depth_reached = stats.max_depth_reached.max(result.depth);
        stats.elapsed = self.started.elapsed();

        let url = result.url.clone();
        if state.results.insert(url, result).is_some() {
            state.stats.duplicates_overwritten += 1;
            crawl_warn!("page recorded twice, keeping the latest result");
        }
    }

    pub(crate) fn record_links(&self, tally: LinkTally) {
        let mut state = self.lock();
        let stats = &mut state.stats;
        stats.links_discovered += tally.discovered;
        stats.links_enqueued += tally.enqueued;
        stats.links_out_of_scope += tally.out_of_scope;
        stats.links_malformed += tally.malformed;
        stats.links_dropped_by_robots += tally.dropped_by_robots;
        stats.links_dropped_by_filter += tally.dropped_by_filter;
    }

    pub(crate) fn record_fetch_retry(&self) {
        self.lock().stats.fetch_retries += 1;
    }

    pub(crate) fn observe_concurrent_fetches(&self, active: usize) {
        let mut state = self.lock();
        let stats = &mut state.stats;
        stats.peak_concurrent_fetches = stats.peak_concurrent_fetches.max(active as u64);
    }

    /// Succeeded plus failed pages recorded so far.
    pub fn completed(&self) -> u64 {
        self.lock().stats.pages_completed()
    }

    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy; later records never change it.
    pub fn snapshot(&self) -> CrawlSnapshot {
        let state = self.lock();
        let mut results: Vec<PageResult> = state.results.values().cloned().collect();
        results.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.url.cmp(&b.url)));
        CrawlSnapshot {
            results,
            stats: state.stats.clone(),
        }
    }

    /// Stamp the final wall-clock time and take the closing snapshot.
    pub fn finish(&self) -> CrawlSnapshot {
        self.lock().stats.elapsed = self.started.elapsed();
        self.snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
