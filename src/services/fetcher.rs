// src/services/fetcher.rs

//! Page fetching, charset resolution and script-redirect detection.

use std::sync::LazyLock;

use async_trait::async_trait;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, FetchResult, SiteContext};
use crate::utils::{http, resolve};

/// Bytes handed to the charset detector.
const DETECT_LIMIT: usize = 64 * 1024;

static CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*["']?([^\s;"']+)"#).expect("valid charset pattern")
});

static SCRIPT_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:\b(?:window|document|self|top)\.)?\blocation(?:\.href)?\s*=\s*["']([^"']+)["']"#,
    )
    .expect("valid redirect pattern")
});

/// Performs one GET for the traversal engine.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, site: &SiteContext) -> Result<FetchResult>;
}

/// HTTP fetcher backed by reqwest.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher from crawler settings.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_client(config)?,
        })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, site: &SiteContext) -> Result<FetchResult> {
        let mut response = self
            .client
            .get(url)
            .timeout(site.timeout)
            .headers(http::header_map(&site.headers)?)
            .send()
            .await
            .map_err(|e| AppError::crawl(url, e))?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = if !is_textual(content_type.as_deref()) {
            log::debug!("Skipping body of {url} ({content_type:?})");
            Vec::new()
        } else if let Some(len) = response
            .content_length()
            .filter(|&len| len > site.max_body_bytes as u64)
        {
            log::warn!(
                "Skipping body of {url}: {len} bytes exceeds limit of {}",
                site.max_body_bytes
            );
            Vec::new()
        } else {
            let mut body = Vec::new();
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| AppError::crawl(url, e))?
            {
                let room = site.max_body_bytes - body.len();
                if chunk.len() >= room {
                    body.extend_from_slice(&chunk[..room]);
                    log::warn!("Truncated body of {url} at {} bytes", site.max_body_bytes);
                    break;
                }
                body.extend_from_slice(&chunk);
            }
            body
        };
        let encoding = resolve_encoding(content_type.as_deref(), &body);

        log::debug!(
            "Fetched {} -> {} ({}, {:?}, {})",
            url,
            final_url,
            status,
            content_type,
            encoding.name()
        );

        Ok(FetchResult {
            final_url,
            status,
            body,
            content_type,
            encoding,
        })
    }
}

/// Whether a response of this content type may carry a page worth reading.
///
/// A missing content type is read, since script redirects are often served
/// without one.
pub fn is_textual(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return true;
    };
    let ct = ct.to_ascii_lowercase();
    ct.starts_with("text/") || ct.contains("html") || ct.contains("xml")
}

/// Pick the body encoding.
///
/// The Content-Type charset wins when it names a known encoding, otherwise
/// the encoding is guessed statistically from the leading bytes.
pub fn resolve_encoding(content_type: Option<&str>, body: &[u8]) -> &'static Encoding {
    if let Some(encoding) = content_type
        .and_then(|ct| CHARSET.captures(ct))
        .and_then(|caps| caps.get(1))
        .and_then(|label| Encoding::for_label(label.as_str().as_bytes()))
    {
        return encoding;
    }

    let sample = &body[..body.len().min(DETECT_LIMIT)];
    let mut detector = EncodingDetector::new();
    detector.feed(sample, sample.len() == body.len());
    detector.guess(None, true)
}

/// Find an inline-script navigation and resolve it against `base_url`.
pub fn detect_script_redirect(html: &str, base_url: &str) -> Option<String> {
    if !html.contains("location") {
        return None;
    }

    let document = Html::parse_document(html);
    let selector = Selector::parse("script").ok()?;

    document.select(&selector).find_map(|script| {
        // External scripts are not inspected.
        if script.value().attr("src").is_some() {
            return None;
        }
        let code: String = script.text().collect();
        let target = SCRIPT_REDIRECT.captures(&code)?.get(1)?.as_str().trim();
        if target.is_empty() || target.starts_with('#') {
            return None;
        }
        resolve(base_url, target)
    })
}
