//! Selector queries over serialized HTML.
//!
//! Both page adapters answer element queries by parsing markup with
//! `scraper`: the static adapter its own document, the Chromium adapter the
//! live DOM serialized by the browser. Scoped queries find the scope again
//! in the current markup by its node path.

use crate::error::{BrowserError, Result};
use crate::page::Element;
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose text never renders.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new line of rendered text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| BrowserError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Check that `selector` is a valid CSS selector.
pub fn check_selector(selector: &str) -> Result<()> {
    parse_selector(selector).map(|_| ())
}

/// All elements of a full document matching `selector`, in document order.
pub fn select_in_document(html: &str, selector: &str) -> Result<Vec<Element>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document.select(&selector).map(snapshot).collect())
}

/// All descendants of `scope` matching `selector`; the scope itself never matches.
///
/// `html` is the current markup of the document the scope came from. The
/// scope is located there by its node path, so selectors see its ancestors.
/// When the document changed since the scope was read, the scope's own
/// markup is parsed on its own instead.
pub fn select_in_element(html: &str, scope: &Element, selector: &str) -> Result<Vec<Element>> {
    let selector = parse_selector(selector)?;

    let document = Html::parse_document(html);
    if let Some(container) = scope
        .path
        .as_deref()
        .and_then(|path| locate(&document, path))
        .filter(|el| el.html() == scope.outer_html())
    {
        return Ok(container.select(&selector).map(snapshot).collect());
    }

    tracing::debug!(tag = %scope.tag(), "scope not found in document, querying its markup");
    let (open, close) = fragment_context(scope.tag());
    let fragment = Html::parse_fragment(&format!("{open}{}{close}", scope.outer_html()));
    let Some(container) = fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == scope.tag())
    else {
        return Ok(Vec::new());
    };
    Ok(container
        .select(&selector)
        .map(|el| Element {
            path: None,
            ..snapshot(el)
        })
        .collect())
}

/// Drop every element matching `selector`; returns the new markup and the
/// number of removed elements.
pub fn remove_from_document(html: &str, selector: &str) -> Result<(String, usize)> {
    let selector = parse_selector(selector)?;
    let mut document = Html::parse_document(html);
    let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();

    for id in &ids {
        if let Some(mut node) = document.tree.get_mut(*id) {
            node.detach();
        }
    }

    Ok((document.html(), ids.len()))
}

fn snapshot(el: ElementRef<'_>) -> Element {
    let value = el.value();
    let mut text = String::new();
    push_text(el, &mut text);

    Element {
        path: Some(node_path(el)),
        tag: value.name().to_string(),
        attributes: value
            .attrs()
            .map(|(name, val)| (name.to_string(), val.to_string()))
            .collect(),
        text: tidy_lines(&text),
        outer_html: el.html(),
    }
}

/// Child positions from the document root down to `el`.
fn node_path(el: ElementRef<'_>) -> Vec<usize> {
    let mut path = Vec::new();
    let mut node = *el;
    while let Some(parent) = node.parent() {
        path.push(parent.children().take_while(|c| c.id() != node.id()).count());
        node = parent;
    }
    path.reverse();
    path
}

fn locate<'a>(document: &'a Html, path: &[usize]) -> Option<ElementRef<'a>> {
    let mut node = document.tree.root();
    for &index in path {
        node = node.children().nth(index)?;
    }
    ElementRef::wrap(node)
}

/// Markup a detached element needs around it to survive fragment parsing.
fn fragment_context(tag: &str) -> (&'static str, &'static str) {
    match tag {
        "tr" => ("<table><tbody>", "</tbody></table>"),
        "td" | "th" => ("<table><tbody><tr>", "</tr></tbody></table>"),
        "tbody" | "thead" | "tfoot" | "caption" | "colgroup" => ("<table>", "</table>"),
        "col" => ("<table><colgroup>", "</colgroup></table>"),
        "option" | "optgroup" => ("<select>", "</select>"),
        _ => ("", ""),
    }
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(child_el) => {
                let name = child_el.name();
                if HIDDEN_TAGS.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    push_text(child_ref, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

// Trim every line and drop the empty ones, keeping inline whitespace.
fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
