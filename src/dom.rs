//! Queries over a rendered page: locate elements by CSS or by a label's
//! sibling, then read their text or attributes.

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{Result, ScrapeError};

/// Elements that start a new line in rendered text.
const LINE_BREAKING: &[&str] = &[
    "br", "div", "p", "li", "tr", "ul", "ol", "table", "h1", "h2", "h3", "h4", "h5", "h6",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Exact(String),
    Contains(String),
}

impl TextMatch {
    fn matches(&self, text: &str) -> bool {
        match self {
            TextMatch::Exact(s) => text.trim() == s,
            TextMatch::Contains(s) => text.contains(s.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// First element matching a CSS selector.
    Css(String),
    /// First following sibling `<tag>` of the first `<tag>` whose text
    /// matches `label`, e.g. `<span>Speed</span><span>1770 rpm</span>`.
    LabeledSibling { tag: String, label: TextMatch },
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }

    pub fn span_after_exact(label: &str) -> Self {
        Locator::LabeledSibling {
            tag: "span".into(),
            label: TextMatch::Exact(label.into()),
        }
    }

    pub fn span_after_containing(label: &str) -> Self {
        Locator::LabeledSibling {
            tag: "span".into(),
            label: TextMatch::Contains(label.into()),
        }
    }
}

/// Parsed snapshot of the document a session currently shows.
pub struct RenderedPage {
    url: Url,
    document: Html,
}

impl RenderedPage {
    pub fn parse(url: Url, html: &str) -> Self {
        Self {
            url,
            document: Html::parse_document(html),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn locate(&self, locator: &Locator) -> Result<Option<ElementRef<'_>>> {
        match locator {
            Locator::Css(css) => {
                let sel = selector(css)?;
                Ok(self.document.select(&sel).next())
            }
            Locator::LabeledSibling { tag, label } => {
                let sel = selector(tag)?;
                let found = self
                    .document
                    .select(&sel)
                    .filter(|el| label.matches(&inner_text(*el)))
                    .find_map(|el| {
                        el.next_siblings()
                            .filter_map(ElementRef::wrap)
                            .find(|sib| sib.value().name() == tag.as_str())
                    });
                Ok(found)
            }
        }
    }

    pub fn locate_all(&self, css: &str) -> Result<Vec<ElementRef<'_>>> {
        let sel = selector(css)?;
        Ok(self.document.select(&sel).collect())
    }
}

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Text as a browser would render it: line-breaking elements start new
/// lines, runs of whitespace collapse, blank lines vanish.
pub fn inner_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(t) => raw.push_str(t),
            Node::Element(e) if LINE_BREAKING.contains(&e.name()) => raw.push('\n'),
            _ => {}
        }
    }

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn attribute<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name)
}
