use crawl_core::{ContentBlock, PageContent};
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::ElementRef;

/// Elements whose text is never page content.
pub(crate) const SCRIPTING_TAGS: &[&str] = &["script", "style", "noscript", "template", "iframe"];

/// Render `root` to markdown-flavoured text plus structured blocks. Elements
/// for which `skip` returns true are left out with their whole subtree.
pub(crate) fn render(root: ElementRef<'_>, skip: &dyn Fn(&ElementRef<'_>) -> bool) -> PageContent {
    let mut ctx = RenderContext::default();
    visit_children(root, skip, &mut ctx);
    ctx.into_content()
}

/// Visible text of `root` with whitespace collapsed, ignoring scripting
/// elements.
pub(crate) fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(*root, &mut out);
    collapse_whitespace(&out)
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn is_scripting(element: &ElementRef<'_>) -> bool {
    let name = element.value().name();
    SCRIPTING_TAGS.iter().any(|tag| name.eq_ignore_ascii_case(tag))
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            out.push_str(text);
            out.push(' ');
        }
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                if is_scripting(&element) {
                    return;
                }
            }
            for child in node.children() {
                collect_text(child, out);
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

fn visit_node(node: NodeRef<'_, Node>, skip: &dyn Fn(&ElementRef<'_>) -> bool, ctx: &mut RenderContext) {
    match node.value() {
        Node::Text(text) => ctx.append_text(text),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, skip, ctx);
            }
        }
        _ => {
            for child in node.children() {
                visit_node(child, skip, ctx);
            }
        }
    }
}

fn visit_children(element: ElementRef<'_>, skip: &dyn Fn(&ElementRef<'_>) -> bool, ctx: &mut RenderContext) {
    for child in element.children() {
        visit_node(child, skip, ctx);
    }
}

fn visit_element(element: ElementRef<'_>, skip: &dyn Fn(&ElementRef<'_>) -> bool, ctx: &mut RenderContext) {
    if is_scripting(&element) || skip(&element) {
        return;
    }
    let tag = element.value().name().to_ascii_lowercase();
    match tag.as_str() {
        "br" => ctx.ensure_newline(),
        "hr" => {
            ctx.ensure_newline();
            ctx.append_raw("---");
            ctx.ensure_newline();
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag.as_bytes()[1] - b'0';
            ctx.ensure_newline();
            let marker_start = ctx.builder.len();
            ctx.append_raw(&"#".repeat(usize::from(level)));
            ctx.append_raw(" ");
            let start = ctx.builder.len();
            visit_children(element, skip, ctx);
            let text = ctx.substring(start);
            if text.is_empty() {
                ctx.truncate(marker_start);
            } else {
                let id = element.value().attr("id").map(str::to_string);
                ctx.push_block(ContentBlock::Heading { level, text, id });
            }
            ctx.ensure_newline();
        }
        "p" => {
            ctx.ensure_newline();
            let start = ctx.builder.len();
            visit_children(element, skip, ctx);
            let text = ctx.substring(start);
            if !text.is_empty() && ctx.list_depth == 0 {
                ctx.push_block(ContentBlock::Paragraph { text });
            }
            ctx.ensure_newline();
        }
        "ul" | "ol" => render_list(element, tag == "ol", skip, ctx),
        "li" => {
            ctx.ensure_newline();
            ctx.append_raw("- ");
            visit_children(element, skip, ctx);
            ctx.ensure_newline();
        }
        "pre" => render_code(element, ctx),
        "table" => render_table(element, skip, ctx),
        "div" | "section" | "article" | "main" | "header" | "footer" | "nav" | "aside"
        | "figure" | "figcaption" | "blockquote" | "address" | "dl" | "dt" | "dd"
        | "details" | "summary" | "form" => {
            ctx.ensure_newline();
            visit_children(element, skip, ctx);
            ctx.ensure_newline();
        }
        _ => visit_children(element, skip, ctx),
    }
}

fn render_list(
    element: ElementRef<'_>,
    ordered: bool,
    skip: &dyn Fn(&ElementRef<'_>) -> bool,
    ctx: &mut RenderContext,
) {
    ctx.ensure_newline();
    ctx.list_depth += 1;
    let mut items = Vec::new();
    for child in element.children() {
        let item = ElementRef::wrap(child)
            .filter(|el| el.value().name().eq_ignore_ascii_case("li"))
            .filter(|el| !skip(el));
        match item {
            Some(li) => {
                ctx.ensure_newline();
                if ordered {
                    ctx.append_raw(&format!("{}. ", items.len() + 1));
                } else {
                    ctx.append_raw("- ");
                }
                let start = ctx.builder.len();
                visit_children(li, skip, ctx);
                let text = ctx.substring(start);
                if !text.is_empty() {
                    items.push(text);
                }
                ctx.ensure_newline();
            }
            None => visit_node(child, skip, ctx),
        }
    }
    ctx.list_depth -= 1;
    if ctx.list_depth == 0 && !items.is_empty() {
        ctx.push_block(ContentBlock::List { ordered, items });
    }
    ctx.ensure_newline();
}

fn render_code(element: ElementRef<'_>, ctx: &mut RenderContext) {
    let code: String = element.text().collect();
    let code = code.trim_matches('\n').to_string();
    if code.trim().is_empty() {
        return;
    }
    let language = code_language(element);
    ctx.ensure_newline();
    ctx.append_raw("```");
    ctx.append_raw(language.as_deref().unwrap_or(""));
    ctx.append_raw("\n");
    ctx.append_raw(&code);
    ctx.append_raw("\n```");
    ctx.ensure_newline();
    ctx.push_block(ContentBlock::Code { language, code });
}

fn code_language(pre: ElementRef<'_>) -> Option<String> {
    let inner_code = pre
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name().eq_ignore_ascii_case("code"));
    std::iter::once(pre)
        .chain(inner_code)
        .find_map(|el| language_of(&el))
}

fn language_of(element: &ElementRef<'_>) -> Option<String> {
    let value = element.value();
    if let Some(lang) = value.attr("data-lang").or_else(|| value.attr("data-language")) {
        return Some(lang.trim().to_ascii_lowercase()).filter(|lang| !lang.is_empty());
    }
    value.classes().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_ascii_lowercase)
    })
}

fn render_table(element: ElementRef<'_>, skip: &dyn Fn(&ElementRef<'_>) -> bool, ctx: &mut RenderContext) {
    let mut headers = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let table_rows = element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name().eq_ignore_ascii_case("tr"))
        .filter(|el| !skip(el));
    for row in table_rows {
        let cells: Vec<(bool, String)> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter_map(|cell| {
                let name = cell.value().name().to_ascii_lowercase();
                (name == "th" || name == "td").then(|| (name == "th", visible_text(cell)))
            })
            .collect();
        if cells.is_empty() {
            continue;
        }
        let all_headers = cells.iter().all(|(is_header, _)| *is_header);
        let texts = cells.into_iter().map(|(_, text)| text).collect();
        if all_headers && headers.is_empty() && rows.is_empty() {
            headers = texts;
        } else {
            rows.push(texts);
        }
    }
    if headers.is_empty() && rows.is_empty() {
        return;
    }

    ctx.ensure_newline();
    if !headers.is_empty() {
        ctx.append_raw(&table_line(&headers));
        ctx.append_raw("\n");
        ctx.append_raw(&table_line(&vec!["---".to_string(); headers.len()]));
        ctx.ensure_newline();
    }
    for row in &rows {
        ctx.append_raw(&table_line(row));
        ctx.ensure_newline();
    }
    ctx.push_block(ContentBlock::Table { headers, rows });
}

fn table_line(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

#[derive(Default)]
struct RenderContext {
    builder: String,
    blocks: Vec<ContentBlock>,
    list_depth: usize,
    last_char: Option<char>,
}

impl RenderContext {
    fn into_content(self) -> PageContent {
        PageContent {
            text: self.builder.trim().to_string(),
            blocks: self.blocks,
        }
    }

    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if self.last_char.is_none()
                    || self.last_char == Some(' ')
                    || self.last_char == Some('\n')
                {
                    continue;
                }
                self.push_char(' ');
            } else {
                self.push_char(ch);
            }
        }
    }

    // Appended verbatim; whitespace is not collapsed.
    fn append_raw(&mut self, text: &str) {
        if let Some(last) = text.chars().last() {
            self.builder.push_str(text);
            self.last_char = Some(last);
        }
    }

    fn ensure_newline(&mut self) {
        if self.last_char == Some('\n') || self.builder.is_empty() {
            return;
        }
        if self.last_char == Some(' ') {
            self.builder.pop();
        }
        self.push_char('\n');
    }

    fn push_char(&mut self, ch: char) {
        self.builder.push(ch);
        self.last_char = Some(ch);
    }

    fn substring(&self, start: usize) -> String {
        self.builder[start..].trim().to_string()
    }

    fn truncate(&mut self, len: usize) {
        self.builder.truncate(len);
        self.last_char = self.builder.chars().last();
    }

    fn push_block(&mut self, block: ContentBlock) {
        self.blocks.push(block);
    }
}

#[cfg(test)]
mod tests {
    use super::{render, visible_text};
    use crawl_core::ContentBlock;
    use scraper::Html;

    fn render_body(html: &str) -> crawl_core::PageContent {
        let doc = Html::parse_document(html);
        let body = doc
            .root_element()
            .children()
            .filter_map(scraper::ElementRef::wrap)
            .find(|el| el.value().name() == "body")
            .unwrap();
        render(body, &|_| false)
    }

    #[test]
    fn keeps_headings_lists_and_code_as_blocks() {
        let content = render_body(
            "<html><body><h2 id=\"setup\">Setup</h2><p>Install   the tool.</p>\
             <ol><li>Download</li><li>Run</li></ol>\
             <pre><code class=\"language-rust\">fn main() {}\n</code></pre></body></html>",
        );

        assert_eq!(
            content.blocks,
            vec![
                ContentBlock::Heading {
                    level: 2,
                    text: "Setup".into(),
                    id: Some("setup".into()),
                },
                ContentBlock::Paragraph {
                    text: "Install the tool.".into(),
                },
                ContentBlock::List {
                    ordered: true,
                    items: vec!["Download".into(), "Run".into()],
                },
                ContentBlock::Code {
                    language: Some("rust".into()),
                    code: "fn main() {}".into(),
                },
            ]
        );
        assert_eq!(
            content.text,
            "## Setup\nInstall the tool.\n1. Download\n2. Run\n```rust\nfn main() {}\n```"
        );
    }

    #[test]
    fn tables_keep_header_row_separate() {
        let content = render_body(
            "<html><body><table><tr><th>Flag</th><th>Meaning</th></tr>\
             <tr><td>-v</td><td>verbose</td></tr></table></body></html>",
        );
        assert_eq!(
            content.blocks,
            vec![ContentBlock::Table {
                headers: vec!["Flag".into(), "Meaning".into()],
                rows: vec![vec!["-v".into(), "verbose".into()]],
            }]
        );
    }

    #[test]
    fn scripts_never_contribute_text() {
        let doc = Html::parse_document(
            "<html><body><script>var x = 1;</script><style>p{}</style></body></html>",
        );
        assert_eq!(visible_text(doc.root_element()), "");
        assert!(render_body("<html><body><script>var x = 1;</script></body></html>").is_empty());
    }
}
