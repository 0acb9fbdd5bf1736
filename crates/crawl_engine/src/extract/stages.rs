use crawl_core::PageContent;
use scraper::{ElementRef, Html, Selector};

use super::profile::StrategyProfile;
use super::render::{render, visible_text};

// Candidate classes the scoring stage never considers.
const SKIP_CLASSES: &[&str] = &["nav", "menu", "header", "footer", "sidebar"];

const BOILERPLATE_TERMS: &[&str] = &[
    "cookie",
    "cookies",
    "privacy",
    "copyright",
    "subscribe",
    "newsletter",
    "login",
    "logout",
    "signup",
    "register",
    "advertisement",
    "sponsored",
    "terms",
    "rights",
    "reserved",
    "share",
    "follow",
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "to", "in", "is", "are", "for", "with", "on", "that",
    "this", "it", "as", "be", "by", "can", "from", "you", "your", "when",
];

const MAX_LINK_DENSITY: f64 = 0.5;
const MAX_BOILERPLATE_DENSITY: f64 = 0.2;
const STOP_WORD_BOOST: f64 = 10.0;

const STRUCTURAL_TAGS: &[&str] = &["nav", "header", "footer", "aside", "form", "menu"];
const STRUCTURAL_ROLES: &[&str] = &[
    "navigation",
    "banner",
    "contentinfo",
    "complementary",
    "search",
    "menu",
    "menubar",
];

/// Content a stage produced, plus the container it came from when the stage
/// picked one.
pub(crate) struct StageOutput<'a> {
    pub content: PageContent,
    pub container: Option<ElementRef<'a>>,
}

/// Success predicate for the structured stages.
pub(crate) fn is_substantial(content: &PageContent, min_chars: usize) -> bool {
    !content.is_empty() && content.significant_chars() >= min_chars
}

/// First selector of the strategy whose container renders to substantial
/// content, with noise stripped.
pub(crate) fn primary<'a>(
    document: &'a Html,
    profile: &StrategyProfile,
    min_chars: usize,
) -> Option<StageOutput<'a>> {
    let skip = |el: &ElementRef<'_>| profile.is_noise(el);
    profile.content_selectors().iter().find_map(|selector| {
        let container = document.select(selector).next()?;
        let content = render(container, &skip);
        is_substantial(&content, min_chars).then_some(StageOutput {
            content,
            container: Some(container),
        })
    })
}

/// Best-scoring block container by paragraph, heading and code density.
pub(crate) fn scored_block<'a>(
    document: &'a Html,
    profile: &StrategyProfile,
    min_chars: usize,
) -> Option<StageOutput<'a>> {
    let candidates = Selector::parse("div, section, article, main").ok()?;
    let paragraphs = Selector::parse("p").ok()?;
    let headings = Selector::parse("h1, h2, h3, h4, h5, h6").ok()?;
    let code = Selector::parse("pre, code").ok()?;
    let anchors = Selector::parse("a").ok()?;

    let mut scored: Vec<(f64, ElementRef<'a>)> = document
        .select(&candidates)
        .filter(|el| !has_skip_class(el) && !profile.is_noise(el))
        .filter_map(|el| {
            let structure = (
                el.select(&paragraphs).count(),
                el.select(&headings).count(),
                el.select(&code).count(),
            );
            if structure.0 + structure.1 + structure.2 == 0 {
                return None;
            }
            let text = visible_text(el);
            if text.is_empty() {
                return None;
            }
            let link_chars: usize = el.select(&anchors).map(|a| visible_text(a).len()).sum();
            if link_chars as f64 / text.len() as f64 > MAX_LINK_DENSITY {
                return None;
            }
            let words = word_stats(&text);
            if words.boilerplate_density() > MAX_BOILERPLATE_DENSITY {
                return None;
            }
            let score = content_score(structure, text.len())
                + words.stop_word_density() * STOP_WORD_BOOST;
            Some((score, el))
        })
        .collect();

    // Stable sort keeps document order among equal scores.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let skip = |el: &ElementRef<'_>| profile.is_noise(el);
    scored.into_iter().find_map(|(_, container)| {
        let content = render(container, &skip);
        is_substantial(&content, min_chars).then_some(StageOutput {
            content,
            container: Some(container),
        })
    })
}

/// Paragraphs count double, headings triple, code blocks double, plus up to
/// ten points of text length.
pub(crate) fn content_score(
    (paragraphs, headings, code_blocks): (usize, usize, usize),
    text_len: usize,
) -> f64 {
    let structure = paragraphs * 2 + headings * 3 + code_blocks * 2;
    structure as f64 + (text_len as f64 / 100.0).min(10.0)
}

/// Whole document with navigation, header, footer, forms and their ARIA
/// equivalents removed.
pub(crate) fn stripped_document<'a>(document: &'a Html, min_chars: usize) -> Option<StageOutput<'a>> {
    let content = render(document_body(document), &is_structural_chrome);
    is_substantial(&content, min_chars).then_some(StageOutput {
        content,
        container: None,
    })
}

/// Raw body text without structure. Accepts anything non-empty.
pub(crate) fn raw_body<'a>(document: &'a Html) -> Option<StageOutput<'a>> {
    let text = visible_text(document_body(document));
    (!text.is_empty()).then(|| StageOutput {
        content: PageContent::plain(text),
        container: None,
    })
}

fn document_body(document: &Html) -> ElementRef<'_> {
    let root = document.root_element();
    root.children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name().eq_ignore_ascii_case("body"))
        .unwrap_or(root)
}

fn is_structural_chrome(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if STRUCTURAL_TAGS
        .iter()
        .any(|tag| value.name().eq_ignore_ascii_case(tag))
    {
        return true;
    }
    value
        .attr("role")
        .map(|role| {
            STRUCTURAL_ROLES
                .iter()
                .any(|structural| role.trim().eq_ignore_ascii_case(structural))
        })
        .unwrap_or(false)
}

fn has_skip_class(element: &ElementRef<'_>) -> bool {
    element
        .value()
        .classes()
        .any(|class| SKIP_CLASSES.iter().any(|skip| class.eq_ignore_ascii_case(skip)))
}

struct WordStats {
    total: usize,
    boilerplate: usize,
    stop_words: usize,
}

impl WordStats {
    fn boilerplate_density(&self) -> f64 {
        ratio(self.boilerplate, self.total)
    }

    fn stop_word_density(&self) -> f64 {
        ratio(self.stop_words, self.total)
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn word_stats(text: &str) -> WordStats {
    let mut stats = WordStats {
        total: 0,
        boilerplate: 0,
        stop_words: 0,
    };
    for word in text.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.is_empty() {
            continue;
        }
        stats.total += 1;
        if BOILERPLATE_TERMS.contains(&word.as_str()) {
            stats.boilerplate += 1;
        }
        if STOP_WORDS.contains(&word.as_str()) {
            stats.stop_words += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::{content_score, word_stats};

    #[test]
    fn text_length_contribution_is_capped() {
        assert_eq!(content_score((1, 1, 0), 250), 7.5);
        assert_eq!(content_score((0, 0, 1), 50_000), 12.0);
    }

    #[test]
    fn boilerplate_heavy_text_is_detected() {
        let footer = word_stats("Copyright 2024. All rights reserved. Privacy | Terms | Cookies");
        assert!(footer.boilerplate_density() > 0.5);

        let prose = word_stats("The parser reads the input and builds a tree of nodes.");
        assert_eq!(prose.boilerplate_density(), 0.0);
        assert!(prose.stop_word_density() > 0.2);
    }
}
