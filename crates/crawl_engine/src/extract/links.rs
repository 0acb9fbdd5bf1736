use std::collections::HashSet;

use crawl_core::{NormalizedUrl, UrlError};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::profile::StrategyProfile;

const IGNORED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Targets that are never pages.
const BINARY_EXTENSIONS: &[&str] = &[
    "pdf", "zip", "gz", "tgz", "tar", "bz2", "xz", "7z", "rar", "png", "jpg", "jpeg", "gif",
    "svg", "webp", "ico", "bmp", "mp3", "mp4", "webm", "ogg", "wav", "avi", "mov", "css", "js",
    "json", "xml", "woff", "woff2", "ttf", "otf", "eot", "exe", "dmg", "msi", "deb", "rpm",
    "apk", "bin", "iso",
];

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct DiscoveredLinks {
    pub links: Vec<NormalizedUrl>,
    pub malformed: u32,
}

/// Link discovery: navigation regions first, the whole document when those
/// yield nothing. Hrefs resolve against `<base href>` when present, else
/// `page_url`.
pub(crate) fn discover(
    document: &Html,
    page_url: &Url,
    profile: &StrategyProfile,
    max_links: usize,
) -> DiscoveredLinks {
    let Ok(anchors) = Selector::parse("a[href]") else {
        return DiscoveredLinks::default();
    };
    let base = base_url(document, page_url);

    let mut collector = LinkCollector::new(&base, profile, max_links);
    for selector in profile.navigation_selectors() {
        for region in document.select(selector) {
            for anchor in region.select(&anchors) {
                collector.offer(anchor);
            }
        }
    }

    if collector.links.is_empty() {
        collector.malformed = 0;
        for anchor in document.select(&anchors) {
            collector.offer(anchor);
        }
    }

    DiscoveredLinks {
        links: collector.links,
        malformed: collector.malformed,
    }
}

pub(crate) fn base_url(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

struct LinkCollector<'p> {
    base: &'p Url,
    profile: &'p StrategyProfile,
    max_links: usize,
    seen: HashSet<NormalizedUrl>,
    links: Vec<NormalizedUrl>,
    malformed: u32,
}

impl<'p> LinkCollector<'p> {
    fn new(base: &'p Url, profile: &'p StrategyProfile, max_links: usize) -> Self {
        Self {
            base,
            profile,
            max_links,
            seen: HashSet::new(),
            links: Vec::new(),
            malformed: 0,
        }
    }

    fn offer(&mut self, anchor: ElementRef<'_>) {
        if self.links.len() >= self.max_links {
            return;
        }
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            return;
        };
        if href.is_empty() || href.starts_with('#') {
            return;
        }
        let lower = href.to_ascii_lowercase();
        if IGNORED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
            return;
        }

        let url = match NormalizedUrl::resolve(self.base, href) {
            Ok(url) => url,
            Err(UrlError::UnsupportedScheme(_)) => return,
            Err(_) => {
                self.malformed += 1;
                return;
            }
        };
        if is_binary(&url) || self.profile.is_excluded_link(&url) {
            return;
        }
        if self.seen.insert(url.clone()) {
            self.links.push(url);
        }
    }
}

fn is_binary(url: &NormalizedUrl) -> bool {
    url.extension()
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
