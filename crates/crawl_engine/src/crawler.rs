use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crawl_core::{
    AiCleaning, FrontierTask, NormalizedUrl, PageError, PageErrorKind, PageResult, PageStatus,
    SiteScope,
};
use crawl_logging::{crawl_debug, crawl_error, crawl_info, crawl_warn};
use futures_util::stream::{self, StreamExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{Aggregator, CrawlSnapshot, LinkTally};
use crate::collaborators::{
    CleaningContext, CollaboratorError, ContentProcessor, LinkContext, LinkFilter, Relevance,
    RobotsPolicy,
};
use crate::config::{CrawlConfig, CrawlPlan};
use crate::extract::ExtractionPipeline;
use crate::fetch::{
    fetch_with_policy, FetchSettings, Fetcher, RawPage, ReqwestFetcher, WaitStrategy,
};
use crate::frontier::Frontier;
use crate::progress::{NullProgressSink, ProgressSink};
use crate::rate_limit::RateLimiter;
use crate::{CrawlError, CrawlEvent, FetchError};

pub struct CrawlerBuilder {
    config: CrawlConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    processor: Option<Arc<dyn ContentProcessor>>,
    link_filter: Option<Arc<dyn LinkFilter>>,
    robots: Option<Arc<dyn RobotsPolicy>>,
    sink: Arc<dyn ProgressSink>,
}

impl CrawlerBuilder {
    pub fn new(config: CrawlConfig) -> Self {
        Self {
            config,
            fetcher: None,
            processor: None,
            link_filter: None,
            robots: None,
            sink: Arc::new(NullProgressSink),
        }
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn content_processor(mut self, processor: Arc<dyn ContentProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn link_filter(mut self, filter: Arc<dyn LinkFilter>) -> Self {
        self.link_filter = Some(filter);
        self
    }

    pub fn robots_policy(mut self, robots: Arc<dyn RobotsPolicy>) -> Self {
        self.robots = Some(robots);
        self
    }

    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Without an explicit fetcher, pages are fetched with a plain
    /// [`ReqwestFetcher`].
    pub fn build(self) -> Result<Crawler, CrawlError> {
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(
                ReqwestFetcher::new(FetchSettings::default())
                    .map_err(|err| CrawlError::Runtime(err.to_string()))?,
            ),
        };
        Ok(Crawler {
            config: self.config,
            fetcher,
            processor: self.processor,
            link_filter: self.link_filter,
            robots: self.robots,
            sink: self.sink,
        })
    }
}

/// Worker pool that drives one traversal from a seed to quiescence,
/// cancellation, or the page cap.
pub struct Crawler {
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    processor: Option<Arc<dyn ContentProcessor>>,
    link_filter: Option<Arc<dyn LinkFilter>>,
    robots: Option<Arc<dyn RobotsPolicy>>,
    sink: Arc<dyn ProgressSink>,
}

impl Crawler {
    pub fn builder(config: CrawlConfig) -> CrawlerBuilder {
        CrawlerBuilder::new(config)
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl from `seed` until the frontier drains, `cancel` fires, or the
    /// page cap is reached. Only configuration problems are returned as
    /// errors; page failures land in the snapshot.
    pub async fn run(
        &self,
        seed: &str,
        cancel: CancellationToken,
    ) -> Result<CrawlSnapshot, CrawlError> {
        let plan = self.config.validate(seed)?;
        let pipeline = ExtractionPipeline::new(&plan.strategy, plan.extraction)?;
        let limiter = RateLimiter::new(plan.request_interval, plan.jitter)?;
        let frontier = Frontier::new(Arc::new(plan.scope.clone()));

        crawl_info!(
            "crawl of {} starting: {} workers, max depth {}, max pages {:?}, strategy {}",
            plan.seed,
            plan.workers,
            plan.scope.max_depth(),
            plan.scope.max_pages(),
            plan.strategy
        );
        crawl_info!("fetcher: {}", self.fetcher.describe());

        let robots = if plan.ignore_robots {
            if self.robots.is_some() {
                crawl_warn!("robots policy bypassed by explicit override");
            }
            None
        } else {
            self.robots.clone()
        };

        let ctx = Arc::new(RunContext {
            pipeline,
            limiter,
            frontier,
            aggregator: Aggregator::new(),
            fetcher: self.fetcher.clone(),
            processor: self.processor.clone(),
            link_filter: self.link_filter.clone(),
            robots,
            sink: self.sink.clone(),
            cancel,
            active_fetches: AtomicUsize::new(0),
            plan,
        });

        if !ctx.frontier.try_enqueue(FrontierTask::seed(ctx.plan.seed.clone())) {
            ctx.frontier.close();
        }

        let mut workers = JoinSet::new();
        for worker in 0..ctx.plan.workers {
            workers.spawn(worker_loop(ctx.clone(), worker));
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                crawl_error!("worker task ended abnormally: {err}");
            }
        }
        ctx.frontier.close();

        let snapshot = ctx.aggregator.finish();
        let stats = &snapshot.stats;
        crawl_info!(
            "crawl finished in {:?}: {} pages ({} ok, {} partial, {} failed), depth {}, {} links enqueued",
            stats.elapsed,
            snapshot.results.len(),
            stats.pages_succeeded - stats.pages_partial,
            stats.pages_partial,
            stats.pages_failed,
            stats.max_depth_reached,
            stats.links_enqueued
        );
        ctx.sink.emit(CrawlEvent::RunFinished {
            stats: snapshot.stats.clone(),
        });
        Ok(snapshot)
    }
}

struct RunContext {
    plan: CrawlPlan,
    pipeline: ExtractionPipeline,
    limiter: RateLimiter,
    frontier: Frontier,
    aggregator: Aggregator,
    fetcher: Arc<dyn Fetcher>,
    processor: Option<Arc<dyn ContentProcessor>>,
    link_filter: Option<Arc<dyn LinkFilter>>,
    robots: Option<Arc<dyn RobotsPolicy>>,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    active_fetches: AtomicUsize,
}

impl RunContext {
    fn cap_reached(&self) -> bool {
        self.plan
            .scope
            .max_pages()
            .is_some_and(|limit| self.aggregator.completed() >= limit as u64)
    }

    fn collaborator_timeout(&self) -> Duration {
        self.plan.collaborator_timeout
    }
}

async fn worker_loop(ctx: Arc<RunContext>, worker: usize) {
    loop {
        if ctx.cancel.is_cancelled() {
            ctx.frontier.close();
            break;
        }
        if ctx.cap_reached() {
            crawl_debug!("worker {worker}: page cap reached");
            break;
        }

        let task = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                ctx.frontier.close();
                break;
            }
            task = ctx.frontier.dequeue() => task,
        };
        let Some(task) = task else {
            break;
        };

        ctx.aggregator.begin_page();
        let result = match tokio::spawn(process_page(ctx.clone(), task.clone())).await {
            Ok(result) => result,
            Err(err) => {
                crawl_error!("worker {worker}: page task for {} failed: {err}", task.url);
                PageResult::failed(&task, PageError::new(PageErrorKind::WorkerFailure, err.to_string()))
            }
        };

        crawl_debug!(
            "worker {worker}: {} at depth {} -> {:?}",
            result.url,
            result.depth,
            result.status
        );
        let event = CrawlEvent::PageRecorded {
            url: result.url.clone(),
            depth: result.depth,
            status: result.status,
        };
        ctx.aggregator.record(result);
        ctx.sink.emit(event);

        if ctx.frontier.task_done() && ctx.frontier.close() {
            crawl_info!("frontier drained, no work in flight");
        }
    }
    crawl_debug!("worker {worker} stopped");
}

async fn process_page(ctx: Arc<RunContext>, task: FrontierTask) -> PageResult {
    let outcome = fetch_with_policy(
        &GaugedFetcher { ctx: ctx.as_ref() },
        &task.url,
        ctx.plan.fetch_policy,
        &ctx.limiter,
    )
    .await;
    if outcome.attempts > 1 {
        ctx.aggregator.record_fetch_retry();
    }

    let raw = match outcome.result {
        Ok(raw) => raw,
        Err(err) => {
            crawl_warn!("fetch of {} failed: {err}", task.url);
            let mut result = PageResult::failed(&task, err.into());
            result.metadata.fetch_attempts = outcome.attempts;
            return result;
        }
    };

    let pipeline_ctx = ctx.clone();
    let extract_task = task.clone();
    let extracted = tokio::task::spawn_blocking(move || {
        pipeline_ctx.pipeline.extract(&extract_task, &raw)
    })
    .await;
    let mut result = match extracted {
        Ok(result) => result,
        Err(err) => {
            return PageResult::failed(
                &task,
                PageError::new(PageErrorKind::WorkerFailure, format!("extraction aborted: {err}")),
            )
        }
    };
    result.metadata.fetch_attempts = outcome.attempts;

    result.links = admit_links(&ctx, &task, &result).await;
    clean_content(&ctx, &mut result).await;
    result
}

/// Scope, robots and relevance filtering of the page's links; survivors at
/// an allowed depth go to the frontier. Returns the surviving links.
async fn admit_links(ctx: &RunContext, task: &FrontierTask, result: &PageResult) -> Vec<NormalizedUrl> {
    let mut tally = LinkTally {
        discovered: result.links.len() as u64,
        malformed: u64::from(result.metadata.malformed_links),
        ..LinkTally::default()
    };

    let mut candidates = Vec::with_capacity(result.links.len());
    for link in &result.links {
        if let Err(violation) = ctx.plan.scope.check(link) {
            crawl_debug!("skipping {link}: {violation}");
            tally.out_of_scope += 1;
            continue;
        }
        if let Some(robots) = &ctx.robots {
            if !robots.is_allowed(link) {
                crawl_debug!("skipping {link}: disallowed by robots policy");
                tally.dropped_by_robots += 1;
                continue;
            }
        }
        candidates.push(link.clone());
    }

    let child_depth = next_depth(&ctx.plan.scope, task.depth);
    let admitted = match &ctx.link_filter {
        Some(filter) => {
            let context = LinkContext {
                source: &task.url,
                source_title: result.title.as_deref(),
                depth: task.depth,
            };
            let context = &context;
            // Links that can never be enqueued are kept without asking the filter.
            let verdicts: Vec<Option<Result<Relevance, CollaboratorError>>> =
                stream::iter(candidates.iter().cloned())
                    .map(|link| async move {
                        if child_depth.is_none() || ctx.frontier.is_visited(&link) {
                            return None;
                        }
                        let verdict = filter.is_relevant(&link, context);
                        Some(bounded(ctx.collaborator_timeout(), verdict).await)
                    })
                    .buffered(ctx.plan.link_filter_concurrency)
                    .collect()
                    .await;
            let threshold = ctx.plan.link_relevance_threshold;
            candidates
                .into_iter()
                .zip(verdicts)
                .filter(|(link, verdict)| match verdict {
                    None => true,
                    Some(Ok(relevance)) if relevance.passes(threshold) => true,
                    Some(Ok(_)) => {
                        crawl_debug!("skipping {link}: judged irrelevant");
                        tally.dropped_by_filter += 1;
                        false
                    }
                    Some(Err(err)) => {
                        crawl_warn!("link filter unavailable for {link} ({err}), keeping it");
                        true
                    }
                })
                .map(|(link, _)| link)
                .collect()
        }
        None => candidates,
    };

    if child_depth.is_some() {
        for link in &admitted {
            if ctx.frontier.try_enqueue(task.child(link.clone())) {
                tally.enqueued += 1;
            }
        }
    }
    ctx.aggregator.record_links(tally);
    admitted
}

/// Depth of links found at `depth`, or `None` when they would be too deep.
fn next_depth(scope: &SiteScope, depth: u32) -> Option<u32> {
    depth
        .checked_add(1)
        .filter(|child| scope.check_depth(*child).is_ok())
}

async fn clean_content(ctx: &RunContext, result: &mut PageResult) {
    let Some(processor) = &ctx.processor else {
        return;
    };
    if result.status == PageStatus::Failed {
        return;
    }

    let context = CleaningContext {
        url: &result.url,
        title: result.title.as_deref(),
        depth: result.depth,
        strategy: ctx.pipeline.kind(),
    };
    let cleaned = bounded(ctx.collaborator_timeout(), processor.clean(&result.content, &context)).await;
    let cleaned = match cleaned {
        Ok(cleaned) if cleaned.is_empty() => Err(CollaboratorError::Failed(
            "processor returned empty content".to_string(),
        )),
        other => other,
    };
    match cleaned {
        Ok(cleaned) => {
            result.content = cleaned;
            result.metadata.ai_cleaning = AiCleaning::Applied;
        }
        Err(err) => {
            crawl_warn!("content processor degraded for {}: {err}", result.url);
            result.metadata.ai_cleaning = AiCleaning::Failed(err.to_string());
        }
    }
}

async fn bounded<T>(
    budget: Duration,
    call: impl std::future::Future<Output = Result<T, CollaboratorError>>,
) -> Result<T, CollaboratorError> {
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::TimedOut(budget)),
    }
}

// Counts fetches currently in progress across the pool. Only the fetcher
// call itself is counted, not the wait for a rate-limit slot.
struct GaugedFetcher<'a> {
    ctx: &'a RunContext,
}

#[async_trait::async_trait]
impl Fetcher for GaugedFetcher<'_> {
    async fn fetch(
        &self,
        url: &NormalizedUrl,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<RawPage, FetchError> {
        let _gauge = FetchGauge::enter(self.ctx);
        self.ctx.fetcher.fetch(url, wait, timeout).await
    }

    fn describe(&self) -> String {
        self.ctx.fetcher.describe()
    }
}

struct FetchGauge<'a> {
    active: &'a AtomicUsize,
}

impl<'a> FetchGauge<'a> {
    fn enter(ctx: &'a RunContext) -> Self {
        let active = ctx.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.aggregator.observe_concurrent_fetches(active);
        Self {
            active: &ctx.active_fetches,
        }
    }
}

impl Drop for FetchGauge<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use crawl_core::{NormalizedUrl, SiteScope};

    use super::next_depth;

    fn scope(max_depth: u32) -> SiteScope {
        let seed = NormalizedUrl::parse("https://docs.example.com/").unwrap();
        SiteScope::same_domain(&seed, max_depth, None).unwrap()
    }

    #[test]
    fn children_stop_at_max_depth() {
        assert_eq!(next_depth(&scope(2), 0), Some(1));
        assert_eq!(next_depth(&scope(2), 1), Some(2));
        assert_eq!(next_depth(&scope(2), 2), None);
        assert_eq!(next_depth(&scope(0), 0), None);
    }

    #[test]
    fn unbounded_depth_does_not_overflow() {
        let scope = scope(u32::MAX);
        assert_eq!(next_depth(&scope, u32::MAX - 1), Some(u32::MAX));
        assert_eq!(next_depth(&scope, u32::MAX), None);
    }
}
