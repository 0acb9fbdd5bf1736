use std::fmt;

use crate::{ConfigError, NormalizedUrl};

/// Page-like extensions accepted when no explicit list is configured.
/// Extensionless paths are always accepted.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] =
    &["html", "htm", "xhtml", "php", "asp", "aspx", "jsp", "md", "txt"];

/// Why a URL was filtered out. Scope filtering is silent; this exists for
/// debug logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeViolation {
    ForeignDomain { domain: String },
    OutsidePrefix { path: String },
    DisallowedExtension { extension: String },
    TooDeep { depth: u32 },
}

impl fmt::Display for ScopeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeViolation::ForeignDomain { domain } => write!(f, "foreign domain {domain}"),
            ScopeViolation::OutsidePrefix { path } => write!(f, "path {path} outside prefix"),
            ScopeViolation::DisallowedExtension { extension } => {
                write!(f, "extension .{extension} not allowed")
            }
            ScopeViolation::TooDeep { depth } => write!(f, "depth {depth} exceeds max depth"),
        }
    }
}

/// Link-eligibility rules, fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    domain: String,
    path_prefix: String,
    max_depth: u32,
    max_pages: Option<usize>,
    allowed_extensions: Vec<String>,
}

impl SiteScope {
    pub fn new(
        domain: impl Into<String>,
        path_prefix: impl Into<String>,
        max_depth: u32,
        max_pages: Option<usize>,
        allowed_extensions: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let domain = domain.into().trim().to_ascii_lowercase();
        if domain.is_empty() {
            return Err(ConfigError::EmptyDomain);
        }
        let path_prefix = path_prefix.into();
        if !path_prefix.starts_with('/') {
            return Err(ConfigError::InvalidPathPrefix(path_prefix));
        }
        if max_pages == Some(0) {
            return Err(ConfigError::ZeroMaxPages);
        }
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self {
            domain,
            path_prefix,
            max_depth,
            max_pages,
            allowed_extensions,
        })
    }

    /// Same-domain scope rooted at `/` with the default extension list.
    pub fn same_domain(
        seed: &NormalizedUrl,
        max_depth: u32,
        max_pages: Option<usize>,
    ) -> Result<Self, ConfigError> {
        Self::new(
            seed.domain(),
            "/",
            max_depth,
            max_pages,
            DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        )
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    /// Domain, prefix and extension rules; depth is checked separately.
    pub fn check(&self, url: &NormalizedUrl) -> Result<(), ScopeViolation> {
        if !url.domain().eq_ignore_ascii_case(&self.domain) {
            return Err(ScopeViolation::ForeignDomain {
                domain: url.domain().to_string(),
            });
        }
        if !self.prefix_matches(url.path()) {
            return Err(ScopeViolation::OutsidePrefix {
                path: url.path().to_string(),
            });
        }
        if let Some(extension) = url.extension() {
            if !self.allowed_extensions.iter().any(|ext| *ext == extension) {
                return Err(ScopeViolation::DisallowedExtension { extension });
            }
        }
        Ok(())
    }

    pub fn check_depth(&self, depth: u32) -> Result<(), ScopeViolation> {
        if depth > self.max_depth {
            Err(ScopeViolation::TooDeep { depth })
        } else {
            Ok(())
        }
    }

    pub fn is_in_scope(&self, url: &NormalizedUrl) -> bool {
        self.check(url).is_ok()
    }

    // Segment aware: "/docs" matches "/docs" and "/docs/x", not "/docsearch".
    fn prefix_matches(&self, path: &str) -> bool {
        let prefix = self.path_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
