// src/utils/http.rs

//! HTTP client utilities.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;

use crate::error::{AppError, Result};
use crate::models::{ClassifierConfig, CrawlerConfig};

/// Create the HTTP client used for page fetches.
///
/// Redirects are followed up to `max_redirects`.
pub fn create_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(Policy::limited(config.max_redirects))
        .default_headers(header_map(&config.headers)?)
        .build()?;
    Ok(client)
}

/// Create the HTTP client used for classification calls.
pub fn create_classifier_client(config: &ClassifierConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Convert configured headers into a reqwest header map.
pub fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::config(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::config(format!("Invalid value for header '{name}': {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map() {
        let mut headers = BTreeMap::new();
        headers.insert("Accept-Language".to_string(), "zh-CN,zh;q=0.9".to_string());

        let map = header_map(&headers).unwrap();
        assert_eq!(map.get("accept-language").unwrap(), "zh-CN,zh;q=0.9");
    }

    #[test]
    fn test_header_map_rejects_invalid_name() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        assert!(header_map(&headers).is_err());
    }

    #[test]
    fn test_create_client() {
        assert!(create_client(&CrawlerConfig::default()).is_ok());
    }
}
