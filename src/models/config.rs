//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and traversal behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// URL and anchor filtering rules
    #[serde(default)]
    pub scope: ScopeConfig,

    /// Classification service settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Multi-site run settings
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }
        if self.crawler.max_body_bytes == 0 {
            return Err(AppError::validation("crawler.max_body_bytes must be > 0"));
        }
        if self.classifier.base_url.trim().is_empty() {
            return Err(AppError::validation("classifier.base_url is empty"));
        }
        if self.classifier.model.trim().is_empty() {
            return Err(AppError::validation("classifier.model is empty"));
        }
        if self.classifier.timeout_secs == 0 {
            return Err(AppError::validation("classifier.timeout_secs must be > 0"));
        }
        if self.classifier.max_payload_chars == 0 {
            return Err(AppError::validation(
                "classifier.max_payload_chars must be > 0",
            ));
        }
        for name in self.crawler.headers.keys() {
            if reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(AppError::validation(format!(
                    "crawler.headers contains invalid header name '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// HTTP client and traversal behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Politeness delay between fetches in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Page budget per site traversal
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Maximum HTTP redirects followed for one fetch
    #[serde(default = "defaults::max_redirects")]
    pub max_redirects: usize,

    /// Largest response body read per page, in bytes
    #[serde(default = "defaults::max_body_bytes")]
    pub max_body_bytes: usize,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_pages: defaults::max_pages(),
            max_redirects: defaults::max_redirects(),
            max_body_bytes: defaults::max_body_bytes(),
            headers: BTreeMap::new(),
        }
    }
}

/// Rules deciding which URLs and anchors are worth following.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Path extensions that never lead to an HTML page
    #[serde(default = "defaults::blocked_extensions")]
    pub blocked_extensions: Vec<String>,

    /// Substrings (case-insensitive) that exclude a URL
    #[serde(default = "defaults::excluded_keywords")]
    pub excluded_keywords: Vec<String>,

    /// Anchor phrases marking navigation/utility links
    #[serde(default = "defaults::banned_anchor_phrases")]
    pub banned_anchor_phrases: Vec<String>,

    /// Minimum anchor text length in characters
    #[serde(default = "defaults::min_anchor_chars")]
    pub min_anchor_chars: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            blocked_extensions: defaults::blocked_extensions(),
            excluded_keywords: defaults::excluded_keywords(),
            banned_anchor_phrases: defaults::banned_anchor_phrases(),
            min_anchor_chars: defaults::min_anchor_chars(),
        }
    }
}

/// OpenAI-compatible classification endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL; `/chat/completions` is appended
    #[serde(default = "defaults::classifier_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request
    #[serde(default = "defaults::classifier_model")]
    pub model: String,

    /// Credential sent as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset
    #[serde(default = "defaults::classifier_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::classifier_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first failed call
    #[serde(default = "defaults::classifier_max_retries")]
    pub max_retries: u32,

    /// First retry delay in milliseconds, doubled per attempt
    #[serde(default = "defaults::classifier_retry_base")]
    pub retry_base_ms: u64,

    /// Upper bound on any payload sent to the service
    #[serde(default = "defaults::max_payload_chars")]
    pub max_payload_chars: usize,
}

impl ClassifierConfig {
    /// Configured credential, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::classifier_base_url(),
            model: defaults::classifier_model(),
            api_key: None,
            api_key_env: defaults::classifier_api_key_env(),
            timeout_secs: defaults::classifier_timeout(),
            max_retries: defaults::classifier_max_retries(),
            retry_base_ms: defaults::classifier_retry_base(),
            max_payload_chars: defaults::max_payload_chars(),
        }
    }
}

/// Settings for sequencing traversals across sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Pause between two site traversals in seconds
    #[serde(default = "defaults::site_cooldown")]
    pub site_cooldown_secs: u64,

    /// Period of the scheduled trigger in seconds
    #[serde(default = "defaults::schedule_interval")]
    pub schedule_interval_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            site_cooldown_secs: defaults::site_cooldown(),
            schedule_interval_secs: defaults::schedule_interval(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn max_pages() -> usize {
        1000
    }
    pub fn max_redirects() -> usize {
        10
    }
    pub fn max_body_bytes() -> usize {
        5 * 1024 * 1024
    }

    // Scope defaults
    pub fn blocked_extensions() -> Vec<String> {
        [
            "jpg", "jpeg", "png", "gif", "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx",
            "zip", "rar", "tar", "gz", "mp3", "mp4", "avi", "mov",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn excluded_keywords() -> Vec<String> {
        vec!["english".into()]
    }
    pub fn banned_anchor_phrases() -> Vec<String> {
        ["分享", "收藏", "首页", "share", "favorite", "home", "top"]
            .into_iter()
            .map(String::from)
            .collect()
    }
    pub fn min_anchor_chars() -> usize {
        2
    }

    // Classifier defaults
    pub fn classifier_base_url() -> String {
        "http://localhost:8000/v1".into()
    }
    pub fn classifier_model() -> String {
        "Qwen/Qwen2.5-7B-Instruct".into()
    }
    pub fn classifier_api_key_env() -> String {
        "CLASSIFIER_API_KEY".into()
    }
    pub fn classifier_timeout() -> u64 {
        120
    }
    pub fn classifier_max_retries() -> u32 {
        2
    }
    pub fn classifier_retry_base() -> u64 {
        1000
    }
    pub fn max_payload_chars() -> usize {
        16_000
    }

    // Coordinator defaults
    pub fn site_cooldown() -> u64 {
        5
    }
    pub fn schedule_interval() -> u64 {
        3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let mut config = Config::default();
        config.crawler.max_pages = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.crawler.max_body_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_header_name() {
        let mut config = Config::default();
        config
            .crawler
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            max_pages = 50

            [classifier]
            model = "local-model"
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.max_pages, 50);
        assert_eq!(config.crawler.timeout_secs, 30);
        assert_eq!(config.classifier.model, "local-model");
        assert_eq!(config.classifier.max_payload_chars, 16_000);
        assert!(config.scope.excluded_keywords.contains(&"english".to_string()));
    }

    #[test]
    fn explicit_api_key_wins() {
        let config = ClassifierConfig {
            api_key: Some("secret".to_string()),
            api_key_env: "FACULTY_CRAWLER_TEST_UNSET_KEY".to_string(),
            ..ClassifierConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("secret"));
    }
}
