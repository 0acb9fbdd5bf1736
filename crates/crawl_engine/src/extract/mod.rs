//! Raw markup to structured page content through an ordered fallback chain.
mod links;
mod meta;
mod profile;
mod render;
mod stages;

use crawl_core::{
    ConfigError, ExtractionMethod, ExtractionStrategyKind, FrontierTask, PageError,
    PageErrorKind, PageResult, PageStatus,
};
use crawl_logging::crawl_debug;
use scraper::Html;

pub use profile::StrategyProfile;

use crate::RawPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionSettings {
    /// Non-whitespace characters a structured stage must produce to count.
    pub min_content_chars: usize,
    pub max_links_per_page: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            min_content_chars: 40,
            max_links_per_page: 5_000,
        }
    }
}

/// Stateless per-page transformation, dispatched on the run's strategy.
///
/// Links on the returned result are normalized but not scope filtered.
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    profile: StrategyProfile,
    settings: ExtractionSettings,
}

impl ExtractionPipeline {
    pub fn new(
        kind: &ExtractionStrategyKind,
        settings: ExtractionSettings,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            profile: StrategyProfile::for_kind(kind)?,
            settings,
        })
    }

    pub fn kind(&self) -> &ExtractionStrategyKind {
        self.profile.kind()
    }

    pub fn extract(&self, task: &FrontierTask, raw: &RawPage) -> PageResult {
        let document = Html::parse_document(&raw.html);
        let mut result = PageResult::for_task(task);
        result.metadata.final_url = Some(raw.final_url.to_string());

        let base = links::base_url(&document, &raw.final_url);
        let discovered = links::discover(
            &document,
            &raw.final_url,
            &self.profile,
            self.settings.max_links_per_page,
        );
        result.links = discovered.links;
        result.metadata.malformed_links = discovered.malformed;

        let (meta, canonical) = meta::page_meta(&document, &base);
        result.metadata.meta = meta;
        result.metadata.canonical_url = canonical;

        let min_chars = self.settings.min_content_chars;
        let mut produced = None;
        for method in ExtractionMethod::CHAIN {
            result.metadata.stages_attempted.push(method);
            let output = match method {
                ExtractionMethod::Primary => stages::primary(&document, &self.profile, min_chars),
                ExtractionMethod::Fallback1 => {
                    stages::scored_block(&document, &self.profile, min_chars)
                }
                ExtractionMethod::Fallback2 => stages::stripped_document(&document, min_chars),
                ExtractionMethod::LastResort => stages::raw_body(&document),
            };
            if let Some(output) = output {
                produced = Some((method, output));
                break;
            }
            crawl_debug!("{method:?} stage produced nothing for {}", task.url);
        }

        let container = produced.as_ref().and_then(|(_, output)| output.container);
        result.title = meta::title(&document, container);

        match produced {
            Some((method, output)) => {
                result.status = if method == ExtractionMethod::LastResort {
                    PageStatus::PartialContent
                } else {
                    PageStatus::Ok
                };
                result.extraction_method = Some(method);
                result.content = output.content;
            }
            None => {
                result.status = PageStatus::Failed;
                result.error = Some(PageError::new(
                    PageErrorKind::ExtractionEmpty,
                    "no extraction stage produced content",
                ));
            }
        }

        result
    }
}
