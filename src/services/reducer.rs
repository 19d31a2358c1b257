// src/services/reducer.rs

//! Content reduction for classification payloads.
//!
//! Pages are never sent to the classifier raw: media elements are removed
//! and the result is bounded to a fixed number of characters.

use scraper::{ElementRef, Html, Selector};

use crate::models::LinkEdge;

/// Element kinds removed before a page is sent downstream.
pub const MEDIA_TAGS: [&str; 8] = [
    "img", "video", "iframe", "embed", "object", "audio", "canvas", "svg",
];

/// Default payload bound in characters.
pub const MAX_PAYLOAD_CHARS: usize = 16_000;

/// Appended when a payload is cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Placeholder for pages without a usable `<title>`.
pub const UNTITLED: &str = "Untitled";

/// Elements whose content never contributes readable text.
const SKIPPED_TAGS: [&str; 6] = ["script", "style", "noscript", "template", "head", "select"];

const BLOCK_TAGS: [&str; 22] = [
    "p", "div", "section", "article", "main", "header", "footer", "nav", "aside", "ul", "ol",
    "table", "tr", "dl", "dt", "dd", "blockquote", "pre", "form", "figure", "address", "hr",
];

/// Strip media elements and bound the markup to `max_chars`.
pub fn reduce(html: &str, max_chars: usize) -> String {
    let mut document = Html::parse_document(html);
    strip_media(&mut document);
    truncate(&document.html(), max_chars)
}

/// Detach every media element from the tree.
pub fn strip_media(document: &mut Html) {
    let Ok(selector) = Selector::parse(&MEDIA_TAGS.join(", ")) else {
        return;
    };
    let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Cut `text` to `max_chars` characters, appending a marker when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &text[..idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Page title, or a placeholder.
pub fn page_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return UNTITLED.to_string();
    };
    document
        .select(&selector)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Render a document as markdown-like text.
///
/// Images and other media are dropped, anchors keep their text but lose
/// their targets, and blank lines collapse.
pub fn render_text(document: &Html, max_chars: usize) -> String {
    let mut out = String::new();
    render_element(document.root_element(), &mut out);

    let text = out
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    truncate(&text, max_chars)
}

fn render_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) || MEDIA_TAGS.contains(&name) {
        return;
    }

    let heading = heading_level(name);
    let block = heading.is_some() || BLOCK_TAGS.contains(&name);

    match (name, heading) {
        (_, Some(level)) => {
            out.push('\n');
            out.push_str(&"#".repeat(level));
            out.push(' ');
        }
        ("li", _) => out.push_str("\n- "),
        ("br", _) => out.push('\n'),
        ("td" | "th", _) => out.push(' '),
        _ if block => out.push('\n'),
        _ => {}
    }

    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_text(out, text);
        } else if let Some(child) = ElementRef::wrap(child) {
            render_element(child, out);
        }
    }

    if block {
        out.push('\n');
    }
}

fn heading_level(name: &str) -> Option<usize> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn push_text(out: &mut String, text: &str) {
    let collapsed = normalize_whitespace(text);
    if collapsed.is_empty() {
        return;
    }
    let needs_space = text.starts_with(char::is_whitespace)
        && !out.is_empty()
        && !out.ends_with(char::is_whitespace);
    if needs_space {
        out.push(' ');
    }
    out.push_str(&collapsed);
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a selector against the document.
///
/// Returns `None` when the selector does not parse or matches nothing.
pub fn locate_region<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

/// Collect the anchors below `root`.
pub fn collect_links(root: ElementRef<'_>, source: &str) -> Vec<LinkEdge> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    root.select(&selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            Some(LinkEdge {
                source: source.to_string(),
                anchor_text: normalize_whitespace(&anchor.text().collect::<String>()),
                href: href.to_string(),
            })
        })
        .collect()
}
