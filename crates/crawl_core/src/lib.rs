//! Crawl core: IO-free data model shared by the traversal engine.
mod error;
mod normalize;
mod page;
mod scope;
mod stats;
mod strategy;
mod task;

pub use error::{ConfigError, PageError, PageErrorKind, UrlError};
pub use normalize::NormalizedUrl;
pub use page::{
    AiCleaning, ContentBlock, ExtractionMethod, PageContent, PageMetadata, PageResult, PageStatus,
};
pub use scope::{ScopeViolation, SiteScope, DEFAULT_ALLOWED_EXTENSIONS};
pub use stats::RunStats;
pub use strategy::ExtractionStrategyKind;
pub use task::FrontierTask;
