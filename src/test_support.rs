//! In-memory fakes for driving the traversal engine and run coordinator.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{
    Config, FetchResult, ProfileCandidate, ProfileFields, ProfileJudgement, SiteContext,
    SiteTarget,
};
use crate::services::classifier::{Classifier, ProfileRequest, parse_judgement};
use crate::services::fetcher::PageFetcher;
use crate::storage::ProfileStore;

pub const SEED: &str = "https://cs.example.edu.cn/faculty/list.htm";

const NOT_A_PROFILE: &str = r#"{"is_teacher_page": false, "name": ""}"#;

/// Site context with no politeness delay.
pub fn site(seed: &str, max_pages: usize) -> SiteContext {
    let mut target = SiteTarget::new("cs", "计算机学院", seed);
    target.max_pages = Some(max_pages);
    let mut ctx = SiteContext::from_target(&target, &Config::default()).expect("valid test site");
    ctx.delay = Duration::ZERO;
    ctx
}

/// Wrap anchors in a minimal page.
pub fn page_with_links(links: &[(&str, &str)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(href, text)| format!("<li><a href=\"{href}\">{text}</a></li>"))
        .collect();
    format!("<html><head><title>Page</title></head><body><ul>{anchors}</ul></body></html>")
}

#[derive(Clone)]
pub struct FakeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub final_url: Option<String>,
}

impl FakeResponse {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into(),
            final_url: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::html("")
        }
    }
}

/// Serves canned responses and records every fetch. Unknown URLs are 404s.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, FakeResponse>,
    unreachable: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: impl Into<String>) -> Self {
        self.response(url, FakeResponse::html(body))
    }

    pub fn response(mut self, url: &str, response: FakeResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _site: &SiteContext) -> Result<FetchResult> {
        self.fetched.lock().unwrap().push(url.to_string());

        if self.unreachable.contains(url) {
            return Err(AppError::crawl(url, "connection refused"));
        }

        let response = self
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| FakeResponse::status(404));

        Ok(FetchResult {
            final_url: response.final_url.unwrap_or_else(|| url.to_string()),
            status: response.status,
            body: response.body.into_bytes(),
            content_type: response.content_type,
            encoding: encoding_rs::UTF_8,
        })
    }
}

/// Answers with a fixed selector and per-URL profile answers.
#[derive(Default)]
pub struct FakeClassifier {
    selector: String,
    answers: HashMap<String, String>,
    region_fails: bool,
    region_calls: Mutex<Vec<String>>,
    region_payloads: Mutex<Vec<String>>,
    profile_calls: Mutex<Vec<String>>,
}

impl FakeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selector(mut self, selector: &str) -> Self {
        self.selector = selector.to_string();
        self
    }

    pub fn failing_region(mut self) -> Self {
        self.region_fails = true;
        self
    }

    /// Raw classifier answer for one URL.
    pub fn answer(mut self, url: &str, answer: &str) -> Self {
        self.answers.insert(url.to_string(), answer.to_string());
        self
    }

    pub fn profile(self, url: &str, name: &str) -> Self {
        let answer = format!(r#"{{"is_teacher_page": true, "name": "{name}"}}"#);
        self.answer(url, &answer)
    }

    pub fn region_calls(&self) -> Vec<String> {
        self.region_calls.lock().unwrap().clone()
    }

    /// Reduced markup received by the region locator, in call order.
    pub fn region_payloads(&self) -> Vec<String> {
        self.region_payloads.lock().unwrap().clone()
    }

    pub fn profile_calls(&self) -> Vec<String> {
        self.profile_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn locate_region(&self, reduced_html: &str, url: &str) -> Result<String> {
        self.region_calls.lock().unwrap().push(url.to_string());
        self.region_payloads
            .lock()
            .unwrap()
            .push(reduced_html.to_string());
        if self.region_fails {
            return Err(AppError::classifier("region service unavailable"));
        }
        Ok(self.selector.clone())
    }

    async fn extract_profile(&self, request: &ProfileRequest<'_>) -> Result<Option<ProfileJudgement>> {
        self.profile_calls.lock().unwrap().push(request.url.to_string());
        let answer = self
            .answers
            .get(request.url)
            .map(String::as_str)
            .unwrap_or(NOT_A_PROFILE);
        Ok(parse_judgement(answer))
    }
}

/// Vec-backed profile store.
#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<Vec<ProfileCandidate>>,
    sites: Mutex<Vec<SiteTarget>>,
    fail_saves: bool,
    fail_lookups: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sites(sites: Vec<SiteTarget>) -> Self {
        Self {
            sites: Mutex::new(sites),
            ..Self::default()
        }
    }

    /// Pretend a profile was recorded for `homepage` in an earlier run.
    pub fn known(self, homepage: &str) -> Self {
        self.profiles.lock().unwrap().push(ProfileCandidate {
            id: ProfileCandidate::make_id(homepage),
            site_id: "cs".to_string(),
            homepage: homepage.to_string(),
            page_title: String::new(),
            fields: ProfileFields {
                name: "Known".to_string(),
                ..ProfileFields::default()
            },
            discovered_at: Utc::now(),
        });
        self
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    pub fn profiles(&self) -> Vec<ProfileCandidate> {
        self.profiles.lock().unwrap().clone()
    }

    pub fn sites(&self) -> Vec<SiteTarget> {
        self.sites.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn save_profile(&self, candidate: &ProfileCandidate) -> Result<bool> {
        if self.fail_saves {
            return Err(AppError::storage("database offline"));
        }
        self.profiles.lock().unwrap().push(candidate.clone());
        Ok(true)
    }

    async fn find_profile_by_homepage(&self, url: &str) -> Result<Option<ProfileCandidate>> {
        if self.fail_lookups {
            return Err(AppError::storage("database offline"));
        }
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.homepage == url)
            .cloned())
    }

    async fn list_site_targets(&self) -> Result<Vec<SiteTarget>> {
        Ok(self.sites())
    }

    async fn mark_site_crawled(&self, site_id: &str) -> Result<()> {
        let mut sites = self.sites.lock().unwrap();
        let site = sites
            .iter_mut()
            .find(|s| s.id == site_id)
            .ok_or_else(|| AppError::storage(format!("unknown site {site_id}")))?;
        site.crawled = true;
        Ok(())
    }
}
