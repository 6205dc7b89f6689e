//! Shared helpers for reading rendered HTML snapshots.
//!
//! Pages are read from a `content()` snapshot rather than element by element,
//! so every lookup here is synchronous and cannot time out.

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::ExtractError;

pub(crate) fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Elements that start and end a line of rendered text
const BLOCK_ELEMENTS: [&str; 34] = [
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "html", "li", "main", "nav",
    "ol", "p", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Elements whose text is never rendered
const HIDDEN_ELEMENTS: [&str; 5] = ["head", "noscript", "script", "style", "template"];

/// Lines of rendered text, built like `innerText`
#[derive(Default)]
struct TextLines {
    lines: Vec<String>,
    current: String,
}

impl TextLines {
    fn break_line(&mut self) {
        let line = self.current.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            self.lines.push(line);
        }
        self.current.clear();
    }

    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.current.push_str(text),
                Node::Element(el) => {
                    let name = el.name();
                    if name == "br" {
                        self.break_line();
                        continue;
                    }
                    if HIDDEN_ELEMENTS.contains(&name) {
                        continue;
                    }
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let block = BLOCK_ELEMENTS.contains(&name);
                    if block {
                        self.break_line();
                    }
                    self.walk(child);
                    if block {
                        self.break_line();
                    }
                }
                _ => {}
            }
        }
    }
}

/// Rendered text of an element, one line per block.
///
/// Approximates `innerText`: block elements and `<br>` start a new line,
/// inline markup stays on its line and whitespace runs collapse to one space.
/// The free-text patterns rely on these line boundaries.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let mut text = TextLines::default();
    text.walk(element);
    text.break_line();
    text.lines.join("\n")
}

/// Rendered text on a single line, for labels and table cells
pub(crate) fn inline_text(element: ElementRef<'_>) -> String {
    element_text(element).replace('\n', " ")
}

/// Text of the first match, `None` when absent or blank
pub(crate) fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(inline_text)
        .filter(|t| !t.is_empty())
}

/// Text of `<body>`, or of the whole document for fragments without one
pub(crate) fn body_text(document: &Html) -> String {
    let body = Selector::parse("body").ok();
    body.as_ref()
        .and_then(|sel| document.select(sel).next())
        .map_or_else(|| element_text(document.root_element()), element_text)
}
