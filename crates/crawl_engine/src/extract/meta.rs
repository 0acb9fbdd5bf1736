use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::render::visible_text;

const TITLE_SUFFIX_SEPARATORS: &[&str] = &[" | ", " - "];

/// Page title: the first `h1` of the content container, then the first `h1`
/// of the document, then `<title>` without its site-name suffix.
pub(crate) fn title(document: &Html, container: Option<ElementRef<'_>>) -> Option<String> {
    let h1 = Selector::parse("h1").ok()?;

    let from_heading = container
        .and_then(|el| el.select(&h1).next())
        .or_else(|| document.select(&h1).next())
        .map(visible_text)
        .filter(|text| !text.is_empty());
    if from_heading.is_some() {
        return from_heading;
    }

    let title = Selector::parse("title").ok()?;
    let text = document.select(&title).next().map(visible_text)?;
    let text = TITLE_SUFFIX_SEPARATORS
        .iter()
        .find_map(|sep| text.split_once(sep).map(|(head, _)| head.trim().to_string()))
        .unwrap_or(text);
    (!text.is_empty()).then_some(text)
}

/// OpenGraph properties (keyed `og:*`) and named meta tags, plus the
/// canonical link resolved against `base`.
pub(crate) fn page_meta(document: &Html, base: &Url) -> (BTreeMap<String, String>, Option<String>) {
    let mut meta = BTreeMap::new();

    if let Ok(selector) = Selector::parse("meta[property][content]") {
        for element in document.select(&selector) {
            let value = element.value();
            if let (Some(property), Some(content)) = (value.attr("property"), value.attr("content")) {
                let property = property.trim().to_ascii_lowercase();
                if property.starts_with("og:") && !content.trim().is_empty() {
                    meta.insert(property, content.trim().to_string());
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("meta[name][content]") {
        for element in document.select(&selector) {
            let value = element.value();
            if let (Some(name), Some(content)) = (value.attr("name"), value.attr("content")) {
                let name = name.trim().to_ascii_lowercase();
                if !name.is_empty() && !content.trim().is_empty() {
                    meta.entry(name).or_insert_with(|| content.trim().to_string());
                }
            }
        }
    }

    let canonical = Selector::parse("link[rel='canonical'][href]")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| base.join(href.trim()).ok())
        .map(String::from);

    (meta, canonical)
}

#[cfg(test)]
mod tests {
    use super::{page_meta, title};
    use scraper::Html;
    use url::Url;

    #[test]
    fn title_prefers_h1_then_strips_site_suffix() {
        let with_h1 = Html::parse_document(
            "<html><head><title>Ignored | Site</title></head><body><h1> Intro </h1></body></html>",
        );
        assert_eq!(title(&with_h1, None).as_deref(), Some("Intro"));

        let without_h1 = Html::parse_document(
            "<html><head><title>Getting Started - Example Docs</title></head><body></body></html>",
        );
        assert_eq!(title(&without_h1, None).as_deref(), Some("Getting Started"));

        let empty = Html::parse_document("<html><body><p>x</p></body></html>");
        assert_eq!(title(&empty, None), None);
    }

    #[test]
    fn collects_open_graph_named_meta_and_canonical() {
        let doc = Html::parse_document(
            "<html><head><meta property=\"og:title\" content=\"Guide\">\
             <meta name=\"Description\" content=\"All about it\">\
             <link rel=\"canonical\" href=\"/guide\"></head><body></body></html>",
        );
        let base = Url::parse("https://docs.example.com/guide/index.html").unwrap();
        let (meta, canonical) = page_meta(&doc, &base);

        assert_eq!(meta.get("og:title").map(String::as_str), Some("Guide"));
        assert_eq!(meta.get("description").map(String::as_str), Some("All about it"));
        assert_eq!(canonical.as_deref(), Some("https://docs.example.com/guide"));
    }
}
