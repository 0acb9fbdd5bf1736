use crawl_core::{ConfigError, ExtractionStrategyKind, NormalizedUrl};
use scraper::{ElementRef, Selector};

const GENERIC_CONTENT: &[&str] = &[
    "article.documentation",
    "main.content",
    "article",
    "main",
    "div[role='main']",
    "div.content",
    "div.documentation",
    "div.main-content",
    "div.doc-content",
    ".markdown-body",
    "#content",
    "#main-content",
    ".content-container",
];

const GENERIC_NAVIGATION: &[&str] = &[
    "nav",
    ".sidebar",
    ".navigation",
    ".toc",
    "aside",
    "#sidebar",
    "#menu",
    "#toc",
    ".doc-menu",
    ".doc-nav",
    ".menu",
    "[role='navigation']",
];

const GENERIC_NOISE: &[&str] = &[
    "header",
    "footer",
    "nav",
    ".sidebar",
    ".navigation",
    ".menu",
    ".toc",
    ".breadcrumbs",
    ".search",
    ".cookie-banner",
    "[aria-hidden='true']",
    ".ads",
    ".announcement",
    ".modal",
    ".popup",
];

const DEEPWIKI_CONTENT: &[&str] = &[
    "div.documentation-content",
    "div.wiki-content",
    "div.deepwiki-content",
    "div.deepwiki-article",
    "main.content-wrapper",
    "div.content-wrapper",
    "div.deepwiki-container main",
    "div.deepwiki-container div.main",
    "div.deepwiki-body",
    "article.content",
    "article.wiki-article",
    "div.article-content",
    "div.doc-content",
    "main",
    "article",
    "div[role='main']",
    "div.main",
];

const DEEPWIKI_NAVIGATION: &[&str] = &[
    "nav.deepwiki-nav",
    "div.deepwiki-navigation",
    "div.deepwiki-sidebar",
    "div.wiki-sidebar",
    "div.documentation-sidebar",
    "aside.sidebar",
    "nav.sidebar",
    "div.toc-sidebar",
    "div.left-sidebar",
    "div.right-sidebar",
    "div.sidebar-wrapper",
    "div.table-of-contents",
    "div.toc",
    "nav.toc",
    "div.deepwiki-toc",
    "ul.deepwiki-menu",
    "ul.wiki-menu",
    "ul.doc-menu",
    "div.menu-container",
    "nav",
    "div[role='navigation']",
    "ul.navigation",
];

const DEEPWIKI_NOISE: &[&str] = &[
    "div.deepwiki-sidebar",
    "div.sidebar",
    "nav",
    "header",
    "footer",
    "div.deepwiki-nav",
    "div.navigation",
    "div.table-of-contents",
    "div.toc",
    "div.deepwiki-header",
    "div.deepwiki-footer",
    "div.api-info",
    "div.version-info",
    "div.edit-options",
    "div.comments",
    "div.deepwiki-comments",
    "[aria-hidden='true']",
];

// Matched against the path and query of a discovered link.
const DEEPWIKI_EXCLUDED: &[&str] = &[
    "/edit/",
    "/raw/",
    "/history/",
    "/blame/",
    "/commits/",
    "/issues/",
    "/pull/",
    "/compare/",
    "/settings/",
    "/export/",
    "/search?",
    "/login",
    "/logout",
    "/register",
];

/// Selector lists and link rules for one extraction strategy, compiled once
/// per run.
#[derive(Debug, Clone)]
pub struct StrategyProfile {
    kind: ExtractionStrategyKind,
    content: Vec<Selector>,
    navigation: Vec<Selector>,
    noise: Vec<Selector>,
    excluded_paths: &'static [&'static str],
}

impl StrategyProfile {
    pub fn for_kind(kind: &ExtractionStrategyKind) -> Result<Self, ConfigError> {
        let (content, navigation, noise, excluded_paths): (_, _, _, &'static [&'static str]) =
            match kind {
                ExtractionStrategyKind::Generic => {
                    (GENERIC_CONTENT, GENERIC_NAVIGATION, GENERIC_NOISE, &[])
                }
                ExtractionStrategyKind::SiteSpecific(name) if name == "deepwiki" => (
                    DEEPWIKI_CONTENT,
                    DEEPWIKI_NAVIGATION,
                    DEEPWIKI_NOISE,
                    DEEPWIKI_EXCLUDED,
                ),
                ExtractionStrategyKind::SiteSpecific(name) => {
                    return Err(ConfigError::UnknownStrategy(name.clone()))
                }
            };

        Ok(Self {
            kind: kind.clone(),
            content: compile(content),
            navigation: compile(navigation),
            noise: compile(noise),
            excluded_paths,
        })
    }

    pub fn kind(&self) -> &ExtractionStrategyKind {
        &self.kind
    }

    /// Content containers, most specific first.
    pub fn content_selectors(&self) -> &[Selector] {
        &self.content
    }

    pub fn navigation_selectors(&self) -> &[Selector] {
        &self.navigation
    }

    pub fn is_noise(&self, element: &ElementRef<'_>) -> bool {
        self.noise.iter().any(|selector| selector.matches(element))
    }

    /// Site rules that reject links even when they are in scope, such as
    /// edit, history or login pages.
    pub fn is_excluded_link(&self, url: &NormalizedUrl) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }
        let target = match url.as_url().query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        self.excluded_paths
            .iter()
            .any(|pattern| target.contains(pattern))
    }
}

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{StrategyProfile, DEEPWIKI_CONTENT, GENERIC_CONTENT, GENERIC_NAVIGATION};
    use crawl_core::{ConfigError, ExtractionStrategyKind, NormalizedUrl};

    #[test]
    fn every_selector_compiles() {
        let generic = StrategyProfile::for_kind(&ExtractionStrategyKind::Generic).unwrap();
        assert_eq!(generic.content_selectors().len(), GENERIC_CONTENT.len());
        assert_eq!(generic.navigation_selectors().len(), GENERIC_NAVIGATION.len());

        let wiki =
            StrategyProfile::for_kind(&ExtractionStrategyKind::site_specific("deepwiki")).unwrap();
        assert_eq!(wiki.content_selectors().len(), DEEPWIKI_CONTENT.len());
    }

    #[test]
    fn unknown_site_strategy_is_a_config_error() {
        let err = StrategyProfile::for_kind(&ExtractionStrategyKind::site_specific("confluence"))
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownStrategy("confluence".to_string()));
    }

    #[test]
    fn deepwiki_excludes_edit_and_login_pages() {
        let wiki =
            StrategyProfile::for_kind(&ExtractionStrategyKind::site_specific("deepwiki")).unwrap();
        let url = |raw: &str| NormalizedUrl::parse(raw).unwrap();

        assert!(wiki.is_excluded_link(&url("https://deepwiki.com/org/repo/edit/main")));
        assert!(wiki.is_excluded_link(&url("https://deepwiki.com/login")));
        assert!(wiki.is_excluded_link(&url("https://deepwiki.com/search?q=x")));
        assert!(!wiki.is_excluded_link(&url("https://deepwiki.com/org/repo/2-architecture")));
    }
}
