//! Optional collaborators. A crawl is correct without any of them; they only
//! change quality (content cleaning, link relevance) or politeness (robots).
use std::time::Duration;

use crawl_core::{ExtractionStrategyKind, NormalizedUrl, PageContent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator failed: {0}")]
    Failed(String),
    #[error("collaborator timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
}

/// What the content processor knows about the page it cleans.
#[derive(Debug, Clone, Copy)]
pub struct CleaningContext<'a> {
    pub url: &'a NormalizedUrl,
    pub title: Option<&'a str>,
    pub depth: u32,
    pub strategy: &'a ExtractionStrategyKind,
}

#[async_trait::async_trait]
pub trait ContentProcessor: Send + Sync {
    async fn clean(
        &self,
        content: &PageContent,
        context: &CleaningContext<'_>,
    ) -> Result<PageContent, CollaboratorError>;
}

/// The page a candidate link was found on.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    pub source: &'a NormalizedUrl,
    pub source_title: Option<&'a str>,
    pub depth: u32,
}

/// A link filter answers either with a verdict or with a score in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relevance {
    Relevant(bool),
    Score(f32),
}

impl Relevance {
    pub fn passes(self, threshold: f32) -> bool {
        match self {
            Relevance::Relevant(relevant) => relevant,
            Relevance::Score(score) => score >= threshold,
        }
    }
}

#[async_trait::async_trait]
pub trait LinkFilter: Send + Sync {
    async fn is_relevant(
        &self,
        link: &NormalizedUrl,
        context: &LinkContext<'_>,
    ) -> Result<Relevance, CollaboratorError>;
}

pub trait RobotsPolicy: Send + Sync {
    fn is_allowed(&self, url: &NormalizedUrl) -> bool;
}
