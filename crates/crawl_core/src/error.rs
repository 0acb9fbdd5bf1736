use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// An href that could not be turned into a crawlable absolute URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("malformed url {input:?}: {message}")]
    Malformed { input: String, message: String },
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("url {0:?} has no host")]
    MissingHost(String),
}

/// Startup errors. None of these can occur once workers are running.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid seed url: {0}")]
    InvalidSeed(#[from] UrlError),
    #[error("seed {seed} is outside the site scope")]
    SeedOutOfScope { seed: String },
    #[error("site scope needs a non-empty domain")]
    EmptyDomain,
    #[error("path prefix {0:?} must start with '/'")]
    InvalidPathPrefix(String),
    #[error("worker count must be greater than 0")]
    ZeroWorkers,
    #[error("max pages must be greater than 0 when set")]
    ZeroMaxPages,
    #[error("rate limiter misconfigured: {0}")]
    RateLimiterMisconfiguration(String),
    #[error("timeout {name} must be greater than 0")]
    ZeroTimeout { name: &'static str },
    #[error("unknown extraction strategy {0:?}")]
    UnknownStrategy(String),
    #[error("link relevance threshold {0} must be within 0.0..=1.0")]
    InvalidRelevanceThreshold(f32),
    #[error("link filter concurrency must be greater than 0")]
    ZeroLinkFilterConcurrency,
    #[error("invalid configuration document: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageErrorKind {
    FetchTimeout,
    FetchNetworkError,
    HttpStatus(u16),
    UnsupportedContent,
    ExtractionEmpty,
    WorkerFailure,
}

impl fmt::Display for PageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageErrorKind::FetchTimeout => write!(f, "fetch timeout"),
            PageErrorKind::FetchNetworkError => write!(f, "fetch network error"),
            PageErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            PageErrorKind::UnsupportedContent => write!(f, "unsupported content"),
            PageErrorKind::ExtractionEmpty => write!(f, "extraction empty"),
            PageErrorKind::WorkerFailure => write!(f, "worker failure"),
        }
    }
}

/// Per-page failure captured on a [`crate::PageResult`]; never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageError {
    pub kind: PageErrorKind,
    pub message: String,
}

impl PageError {
    pub fn new(kind: PageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
