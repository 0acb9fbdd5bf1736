use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crawl_core::{FrontierTask, NormalizedUrl, SiteScope};
use crawl_logging::{crawl_debug, crawl_info};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<FrontierTask>,
    /// Every URL ever accepted, queued or handed out.
    visited: HashSet<NormalizedUrl>,
    in_flight: usize,
    next_sequence: u64,
    closed: bool,
}

impl FrontierState {
    fn quiescent(&self) -> bool {
        self.in_flight == 0 && self.queue.is_empty()
    }
}

/// Pending traversal tasks plus the visited-set guard.
///
/// Acceptance (scope check, visited insert, push) happens under one lock, so
/// two workers discovering the same URL can never both enqueue it. When the
/// scope carries a page cap, no more than that many tasks are ever accepted.
#[derive(Debug)]
pub struct Frontier {
    scope: Arc<SiteScope>,
    state: Mutex<FrontierState>,
    available: Notify,
}

impl Frontier {
    pub fn new(scope: Arc<SiteScope>) -> Self {
        Self {
            scope,
            state: Mutex::new(FrontierState::default()),
            available: Notify::new(),
        }
    }

    pub fn scope(&self) -> &SiteScope {
        &self.scope
    }

    /// Accept `task` unless its URL was seen before, it falls outside the
    /// scope, the page cap is used up, or the frontier is closed.
    pub fn try_enqueue(&self, mut task: FrontierTask) -> bool {
        if self.scope.check_depth(task.depth).is_err() || !self.scope.is_in_scope(&task.url) {
            return false;
        }

        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            if let Some(limit) = self.scope.max_pages() {
                if state.visited.len() >= limit {
                    return false;
                }
            }
            if !state.visited.insert(task.url.clone()) {
                return false;
            }
            task.sequence = state.next_sequence;
            state.next_sequence += 1;
            crawl_debug!("enqueued {} at depth {} (#{})", task.url, task.depth, task.sequence);
            state.queue.push_back(task);
        }

        self.available.notify_one();
        true
    }

    /// Next task, waiting while the queue is empty. `None` once the frontier
    /// is closed. Every task handed out must be reported via
    /// [`Frontier::task_done`].
    pub async fn dequeue(&self) -> Option<FrontierTask> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(task) = state.queue.pop_front() {
                    state.in_flight += 1;
                    return Some(task);
                }
            }

            notified.await;
        }
    }

    /// Mark one dequeued task as finished. Returns true when this completion
    /// left the frontier quiescent: nothing queued and nothing in flight.
    pub fn task_done(&self) -> bool {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        !state.closed && state.quiescent()
    }

    /// Wake every waiting dequeuer with `None` and discard queued tasks.
    /// Returns true for the call that actually closed the frontier.
    pub fn close(&self) -> bool {
        let discarded = {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            let discarded = state.queue.len();
            state.queue.clear();
            discarded
        };
        crawl_info!("frontier closed ({discarded} queued tasks discarded)");
        self.available.notify_waiters();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_quiescent(&self) -> bool {
        self.lock().quiescent()
    }

    pub fn is_visited(&self, url: &NormalizedUrl) -> bool {
        self.lock().visited.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        // No code path panics while holding the guard.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
