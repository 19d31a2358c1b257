//! Fetched page data structures.

use encoding_rs::Encoding;

/// Raw result of one HTTP fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL after HTTP redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Response body bytes
    pub body: Vec<u8>,

    /// Content-Type header, if any
    pub content_type: Option<String>,

    /// Resolved character encoding of `body`
    pub encoding: &'static Encoding,
}

impl FetchResult {
    /// Whether the response is a plain 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Whether the Content-Type declares HTML.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }

    /// Decode the body with the resolved encoding.
    pub fn text(&self) -> String {
        let (text, _, had_errors) = self.encoding.decode(&self.body);
        if had_errors {
            log::debug!(
                "Malformed {} sequences in {}",
                self.encoding.name(),
                self.final_url
            );
        }
        text.into_owned()
    }
}

/// One fetched and reduced page, handed to the classifier then dropped.
#[derive(Debug, Clone)]
pub struct PageRecord {
    /// URL as dequeued from the frontier
    pub url: String,

    /// URL after HTTP redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Page title
    pub title: String,

    /// Bounded markup with media removed
    pub reduced_html: String,

    /// Markdown-like rendering for profile extraction
    pub text: String,
}

/// A link found in a page's main content region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEdge {
    pub source: String,
    pub anchor_text: String,
    pub href: String,
}
