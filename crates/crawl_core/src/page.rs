use std::collections::BTreeMap;

use serde::Serialize;

use crate::{FrontierTask, NormalizedUrl, PageError, PageErrorKind};

/// Which stage of the fallback chain produced the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Primary,
    Fallback1,
    Fallback2,
    LastResort,
}

impl ExtractionMethod {
    /// The fallback chain, in the order stages are attempted.
    pub const CHAIN: [ExtractionMethod; 4] = [
        ExtractionMethod::Primary,
        ExtractionMethod::Fallback1,
        ExtractionMethod::Fallback2,
        ExtractionMethod::LastResort,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Ok,
    PartialContent,
    Failed,
}

/// Structured sub-element preserved by the primary stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Heading {
        level: u8,
        text: String,
        id: Option<String>,
    },
    Paragraph {
        text: String,
    },
    List {
        ordered: bool,
        items: Vec<String>,
    },
    Code {
        language: Option<String>,
        code: String,
    },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

/// Extracted content: rendered text plus, for the primary stage, the
/// structured blocks it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PageContent {
    pub text: String,
    pub blocks: Vec<ContentBlock>,
}

impl PageContent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            blocks: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Number of non-whitespace characters in the rendered text.
    pub fn significant_chars(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// Outcome of handing the page to the optional content processor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum AiCleaning {
    #[default]
    NotConfigured,
    Applied,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PageMetadata {
    /// OpenGraph properties and named meta tags.
    pub meta: BTreeMap<String, String>,
    pub canonical_url: Option<String>,
    pub final_url: Option<String>,
    /// Every stage that ran, in order.
    pub stages_attempted: Vec<ExtractionMethod>,
    pub fetch_attempts: u8,
    /// Hrefs skipped during link discovery because they did not resolve.
    pub malformed_links: u32,
    pub ai_cleaning: AiCleaning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult {
    pub url: NormalizedUrl,
    pub depth: u32,
    pub parent: Option<NormalizedUrl>,
    pub sequence: u64,
    pub title: Option<String>,
    pub content: PageContent,
    pub extraction_method: Option<ExtractionMethod>,
    pub links: Vec<NormalizedUrl>,
    pub status: PageStatus,
    pub error: Option<PageError>,
    pub metadata: PageMetadata,
}

impl PageResult {
    /// Empty result for `task`; the pipeline fills in content and status.
    pub fn for_task(task: &FrontierTask) -> Self {
        Self {
            url: task.url.clone(),
            depth: task.depth,
            parent: task.parent.clone(),
            sequence: task.sequence,
            title: None,
            content: PageContent::default(),
            extraction_method: None,
            links: Vec::new(),
            status: PageStatus::Failed,
            error: None,
            metadata: PageMetadata::default(),
        }
    }

    pub fn failed(task: &FrontierTask, error: PageError) -> Self {
        Self {
            error: Some(error),
            ..Self::for_task(task)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == PageStatus::Failed
    }

    pub fn error_kind(&self) -> Option<PageErrorKind> {
        self.error.as_ref().map(|err| err.kind)
    }
}
