//! Crawl engine: fetch, extraction and the concurrent traversal loop.
mod aggregate;
mod collaborators;
mod config;
mod crawler;
mod decode;
mod engine;
mod extract;
mod fetch;
mod frontier;
mod progress;
mod rate_limit;
mod types;

pub use aggregate::{Aggregator, CrawlSnapshot};
pub use collaborators::{
    CleaningContext, CollaboratorError, ContentProcessor, LinkContext, LinkFilter, Relevance,
    RobotsPolicy,
};
pub use config::{CrawlConfig, CrawlPlan};
pub use crawler::{Crawler, CrawlerBuilder};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use engine::CrawlHandle;
pub use extract::{ExtractionPipeline, ExtractionSettings, StrategyProfile};
pub use fetch::{
    fetch_with_policy, FetchOutcome, FetchPolicy, FetchSettings, Fetcher, RawPage, ReqwestFetcher,
    WaitStrategy,
};
pub use frontier::Frontier;
pub use progress::{ChannelProgressSink, NullProgressSink, ProgressSink};
pub use rate_limit::RateLimiter;
pub use types::{CrawlError, CrawlEvent, FailureKind, FetchError};
