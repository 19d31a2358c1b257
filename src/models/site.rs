// src/models/site.rs

//! Site targets and the per-traversal site context.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, ScopeConfig};

/// A department website registered for crawling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteTarget {
    /// Unique identifier, used to tag saved profiles
    pub id: String,

    /// University display name
    #[serde(default)]
    pub university: String,

    /// Department display name
    pub name: String,

    /// Department homepage, the traversal seed
    #[serde(default)]
    pub url: Option<String>,

    /// Whether a traversal of this site has completed
    #[serde(default)]
    pub crawled: bool,

    /// Per-site page budget override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,

    /// Known author names passed to the profile extractor
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author_hints: Vec<String>,
}

impl SiteTarget {
    /// Create a target for an ad-hoc seed URL.
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            university: String::new(),
            name: name.into(),
            url: Some(url.into()),
            crawled: false,
            max_pages: None,
            author_hints: Vec::new(),
        }
    }

    /// Human-readable label for logs.
    pub fn label(&self) -> String {
        if self.university.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.university, self.name)
        }
    }
}

/// Immutable configuration for one site traversal.
#[derive(Debug, Clone)]
pub struct SiteContext {
    /// Identifier of the site being crawled
    pub site_id: String,

    /// Label used in log lines
    pub label: String,

    /// Traversal seed
    pub seed_url: String,

    /// Host every in-scope URL must match exactly
    pub root_host: String,

    /// Maximum fetch attempts
    pub max_pages: usize,

    /// Pause after every fetch attempt
    pub delay: Duration,

    /// Per-request timeout
    pub timeout: Duration,

    /// Extra request headers
    pub headers: BTreeMap<String, String>,

    /// Largest response body read per page, in bytes
    pub max_body_bytes: usize,

    /// Character limit of the reduced page sent to the classifier
    pub max_payload_chars: usize,

    /// URL and anchor filtering rules
    pub scope: ScopeConfig,

    /// Known author names for the profile extractor
    pub author_hints: Vec<String>,
}

impl SiteContext {
    /// Build the context for a target, resolving defaults from the config.
    pub fn from_target(target: &SiteTarget, config: &Config) -> Result<Self> {
        let seed_url = target
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::config(format!("Site {} has no URL", target.id)))?;

        let parsed = Url::parse(seed_url)?;
        let root_host = parsed
            .host_str()
            .ok_or_else(|| AppError::config(format!("Seed URL {seed_url} has no host")))?
            .to_string();

        Ok(Self {
            site_id: target.id.clone(),
            label: target.label(),
            seed_url: seed_url.to_string(),
            root_host,
            max_pages: target.max_pages.unwrap_or(config.crawler.max_pages),
            delay: Duration::from_millis(config.crawler.request_delay_ms),
            timeout: Duration::from_secs(config.crawler.timeout_secs),
            headers: config.crawler.headers.clone(),
            max_body_bytes: config.crawler.max_body_bytes,
            max_payload_chars: config.classifier.max_payload_chars,
            scope: config.scope.clone(),
            author_hints: target.author_hints.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_target() {
        let mut target = SiteTarget::new("pku-cs", "计算机学院", "https://cs.pku.edu.cn/index.htm");
        target.max_pages = Some(25);

        let ctx = SiteContext::from_target(&target, &Config::default()).unwrap();
        assert_eq!(ctx.root_host, "cs.pku.edu.cn");
        assert_eq!(ctx.max_pages, 25);
        assert_eq!(ctx.delay, Duration::from_millis(1000));
        assert_eq!(ctx.max_payload_chars, 16_000);
    }

    #[test]
    fn test_context_requires_url() {
        let mut target = SiteTarget::new("x", "X", "");
        assert!(SiteContext::from_target(&target, &Config::default()).is_err());

        target.url = None;
        assert!(SiteContext::from_target(&target, &Config::default()).is_err());
    }

    #[test]
    fn test_label() {
        let mut target = SiteTarget::new("x", "信息学院", "https://a.edu.cn/");
        assert_eq!(target.label(), "信息学院");
        target.university = "北京大学".to_string();
        assert_eq!(target.label(), "北京大学:信息学院");
    }
}
