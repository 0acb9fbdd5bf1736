use std::fmt;

use serde::Serialize;

use crate::NormalizedUrl;

/// Selects the selector-priority lists and link rules for a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ExtractionStrategyKind {
    Generic,
    SiteSpecific(String),
}

impl ExtractionStrategyKind {
    pub fn site_specific(name: impl Into<String>) -> Self {
        ExtractionStrategyKind::SiteSpecific(name.into().trim().to_ascii_lowercase())
    }

    /// Picks a site strategy from the seed host, falling back to generic.
    pub fn detect(seed: &NormalizedUrl) -> Self {
        let host = seed.domain();
        if host == "deepwiki.com" || host.ends_with(".deepwiki.com") {
            Self::site_specific("deepwiki")
        } else {
            ExtractionStrategyKind::Generic
        }
    }

    /// Parses a configuration setting: `auto`, `generic` or a site name.
    pub fn from_setting(setting: &str, seed: &NormalizedUrl) -> Self {
        match setting.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Self::detect(seed),
            "generic" => ExtractionStrategyKind::Generic,
            name => Self::site_specific(name),
        }
    }
}

impl fmt::Display for ExtractionStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStrategyKind::Generic => write!(f, "generic"),
            ExtractionStrategyKind::SiteSpecific(name) => write!(f, "site:{name}"),
        }
    }
}
