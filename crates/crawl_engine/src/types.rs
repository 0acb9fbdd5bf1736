use std::fmt;

use crawl_core::{
    ConfigError, NormalizedUrl, PageError, PageErrorKind, PageStatus, RunStats,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "undecodable body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

impl From<FetchError> for PageError {
    fn from(err: FetchError) -> Self {
        let kind = match err.kind {
            FailureKind::Timeout => PageErrorKind::FetchTimeout,
            FailureKind::HttpStatus(code) => PageErrorKind::HttpStatus(code),
            FailureKind::UnsupportedContentType { .. }
            | FailureKind::TooLarge { .. }
            | FailureKind::Decode => PageErrorKind::UnsupportedContent,
            FailureKind::RedirectLimitExceeded
            | FailureKind::Network => PageErrorKind::FetchNetworkError,
        };
        PageError::new(kind, err.to_string())
    }
}

/// Progress notifications emitted while a crawl runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    PageRecorded {
        url: NormalizedUrl,
        depth: u32,
        status: PageStatus,
    },
    RunFinished {
        stats: RunStats,
    },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("crawl runtime failure: {0}")]
    Runtime(String),
}
