use std::time::Duration;

use crawl_core::{
    ConfigError, ExtractionStrategyKind, NormalizedUrl, SiteScope, DEFAULT_ALLOWED_EXTENSIONS,
};
use serde::{Deserialize, Serialize};

use crate::extract::{ExtractionSettings, StrategyProfile};
use crate::FetchPolicy;

/// Run configuration as a caller supplies it. Every field has a default, so
/// `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    pub workers: usize,
    pub max_depth: u32,
    pub max_pages: Option<usize>,
    /// Only paths under this prefix are followed. `/` when unset.
    pub path_prefix: Option<String>,
    pub allowed_extensions: Vec<String>,
    pub request_interval_ms: u64,
    pub jitter: f64,
    pub full_load_timeout_ms: u64,
    pub content_loaded_timeout_ms: u64,
    /// `auto`, `generic`, or a site strategy name.
    pub strategy: String,
    pub min_content_chars: usize,
    pub max_links_per_page: usize,
    /// Skip the robots policy even when one is configured.
    pub ignore_robots: bool,
    pub link_relevance_threshold: f32,
    /// Relevance calls in flight at once for one page.
    pub link_filter_concurrency: usize,
    pub collaborator_timeout_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_depth: 5,
            max_pages: None,
            path_prefix: None,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            request_interval_ms: 500,
            jitter: 0.2,
            full_load_timeout_ms: 30_000,
            content_loaded_timeout_ms: 15_000,
            strategy: "auto".to_string(),
            min_content_chars: 40,
            max_links_per_page: 5_000,
            ignore_robots: false,
            link_relevance_threshold: 0.7,
            link_filter_concurrency: 20,
            collaborator_timeout_ms: 20_000,
        }
    }
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlPlan {
    pub seed: NormalizedUrl,
    pub scope: SiteScope,
    pub strategy: ExtractionStrategyKind,
    pub workers: usize,
    pub fetch_policy: FetchPolicy,
    pub request_interval: Duration,
    pub jitter: f64,
    pub extraction: ExtractionSettings,
    pub ignore_robots: bool,
    pub link_relevance_threshold: f32,
    pub link_filter_concurrency: usize,
    pub collaborator_timeout: Duration,
}

impl CrawlConfig {
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(document).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Check every setting against `seed`. Nothing runs until this passes.
    pub fn validate(&self, seed: &str) -> Result<CrawlPlan, ConfigError> {
        let seed = NormalizedUrl::parse(seed)?;

        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if !self.jitter.is_finite() || !(0.0..1.0).contains(&self.jitter) {
            return Err(ConfigError::RateLimiterMisconfiguration(format!(
                "jitter {} must be within 0.0..1.0",
                self.jitter
            )));
        }
        let fetch_policy = FetchPolicy {
            full_load_timeout: non_zero_ms("full_load_timeout_ms", self.full_load_timeout_ms)?,
            content_loaded_timeout: non_zero_ms(
                "content_loaded_timeout_ms",
                self.content_loaded_timeout_ms,
            )?,
        };
        let collaborator_timeout =
            non_zero_ms("collaborator_timeout_ms", self.collaborator_timeout_ms)?;
        if !(0.0..=1.0).contains(&self.link_relevance_threshold) {
            return Err(ConfigError::InvalidRelevanceThreshold(
                self.link_relevance_threshold,
            ));
        }

        if self.link_filter_concurrency == 0 {
            return Err(ConfigError::ZeroLinkFilterConcurrency);
        }

        let strategy = ExtractionStrategyKind::from_setting(&self.strategy, &seed);
        StrategyProfile::for_kind(&strategy)?;

        let allowed_extensions = self
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        let scope = SiteScope::new(
            seed.domain(),
            self.path_prefix.as_deref().unwrap_or("/"),
            self.max_depth,
            self.max_pages,
            allowed_extensions,
        )?;
        if !scope.is_in_scope(&seed) {
            return Err(ConfigError::SeedOutOfScope {
                seed: seed.to_string(),
            });
        }

        Ok(CrawlPlan {
            seed,
            scope,
            strategy,
            workers: self.workers,
            fetch_policy,
            request_interval: Duration::from_millis(self.request_interval_ms),
            jitter: self.jitter,
            extraction: ExtractionSettings {
                min_content_chars: self.min_content_chars,
                max_links_per_page: self.max_links_per_page,
            },
            ignore_robots: self.ignore_robots,
            link_relevance_threshold: self.link_relevance_threshold,
            link_filter_concurrency: self.link_filter_concurrency,
            collaborator_timeout,
        })
    }
}

fn non_zero_ms(name: &'static str, millis: u64) -> Result<Duration, ConfigError> {
    if millis == 0 {
        Err(ConfigError::ZeroTimeout { name })
    } else {
        Ok(Duration::from_millis(millis))
    }
}
