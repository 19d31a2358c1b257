// src/services/traversal.rs

//! Breadth-first frontier traversal of one site.
//!
//! One URL is processed at a time:
//! 1. dequeue, skipping visited URLs and stopping once the budget is spent
//! 2. skip URLs already recorded as profiles in an earlier run
//! 3. fetch, following script redirects ahead of everything else
//! 4. locate the main content region and queue its in-scope links
//! 5. classify the page and save it when it describes one person
//!
//! Every page-level failure is logged and counted, never propagated. Only a
//! seed that cannot be fetched fails the traversal.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use scraper::Html;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    FetchResult, LinkEdge, PageRecord, ProfileCandidate, SiteContext, StopReason,
    TraversalSummary,
};
use crate::services::classifier::{Classifier, ProfileRequest};
use crate::services::fetcher::{PageFetcher, detect_script_redirect};
use crate::services::reducer;
use crate::services::scope::{is_followable_anchor, is_in_scope};
use crate::storage::ProfileStore;
use crate::utils::resolve_link;

/// FIFO queue of URLs awaiting a visit. A URL may be queued more than once.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a discovered URL behind everything already waiting.
    pub fn push_back(&mut self, url: impl Into<String>) {
        self.queue.push_back(url.into());
    }

    /// Queue a URL ahead of everything already waiting.
    pub fn push_front(&mut self, url: impl Into<String>) {
        self.queue.push_front(url.into());
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// URLs handled during one traversal. Only ever grows.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the URL was not yet present.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        self.urls.insert(url.into())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

struct TraversalState {
    frontier: Frontier,
    visited: VisitedSet,
    summary: TraversalSummary,
}

/// Traversal engine wired to its collaborators.
pub struct FrontierTraversal<'a> {
    fetcher: &'a dyn PageFetcher,
    classifier: &'a dyn Classifier,
    store: &'a dyn ProfileStore,
    stop: Option<Arc<AtomicBool>>,
}

impl<'a> FrontierTraversal<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        classifier: &'a dyn Classifier,
        store: &'a dyn ProfileStore,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            store,
            stop: None,
        }
    }

    /// Check `stop` before every dequeue.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|stop| stop.load(Ordering::SeqCst))
    }

    /// Traverse one site until the frontier empties, the budget is spent or
    /// a stop is requested.
    pub async fn run(&self, site: &SiteContext) -> Result<TraversalSummary> {
        let mut state = TraversalState {
            frontier: Frontier::new(),
            visited: VisitedSet::new(),
            summary: TraversalSummary::new(&site.site_id),
        };
        state.frontier.push_back(&site.seed_url);

        log::info!(
            "Crawling {} from {} (budget {})",
            site.label,
            site.seed_url,
            site.max_pages
        );

        loop {
            if self.stop_requested() {
                log::warn!("Stop requested, ending traversal of {}", site.label);
                state.summary.stop_reason = StopReason::Cancelled;
                break;
            }

            let Some(url) = state.frontier.pop_front() else {
                state.summary.stop_reason = StopReason::FrontierExhausted;
                break;
            };

            if state.visited.contains(&url) {
                continue;
            }

            if state.summary.pages_fetched >= site.max_pages {
                log::info!("Page budget of {} reached for {}", site.max_pages, site.label);
                state.summary.stop_reason = StopReason::BudgetExhausted;
                break;
            }

            if self.is_known_profile(&url).await {
                log::debug!("Already recorded, skipping {url}");
                state.visited.insert(url);
                state.summary.known_skipped += 1;
                continue;
            }

            state.visited.insert(url.as_str());
            state.summary.pages_fetched += 1;
            let is_seed = state.summary.pages_fetched == 1;
            log::info!(
                "({}/{}) {}",
                state.summary.pages_fetched,
                site.max_pages,
                url
            );

            match self.fetcher.fetch(&url, site).await {
                Ok(result) if result.is_ok() => {
                    self.handle_page(site, &url, result, &mut state).await;
                }
                Ok(result) if is_seed => {
                    return Err(AppError::seed_unreachable(
                        url,
                        format!("HTTP {}", result.status),
                    ));
                }
                Ok(result) => {
                    log::warn!("HTTP {} for {}", result.status, url);
                    state.summary.soft_failures += 1;
                }
                Err(e) if is_seed => return Err(AppError::seed_unreachable(url, e)),
                Err(e) => {
                    log::warn!("Fetch failed for {}: {}", url, e);
                    state.summary.soft_failures += 1;
                }
            }

            if site.delay.as_millis() > 0 {
                tokio::time::sleep(site.delay).await;
            }
        }

        let summary = state.summary;
        log::info!(
            "Finished {}: {} pages, {} profiles, {} known, {} soft failures ({:?})",
            site.label,
            summary.pages_fetched,
            summary.profiles_saved,
            summary.known_skipped,
            summary.soft_failures,
            summary.stop_reason
        );
        Ok(summary)
    }

    async fn is_known_profile(&self, url: &str) -> bool {
        match self.store.find_profile_by_homepage(url).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                log::warn!("Dedup lookup failed for {url}, fetching anyway: {e}");
                false
            }
        }
    }

    async fn handle_page(
        &self,
        site: &SiteContext,
        url: &str,
        result: FetchResult,
        state: &mut TraversalState,
    ) {
        let body = result.text();
        if result.final_url != url {
            state.visited.insert(result.final_url.as_str());
        }

        if let Some(target) = detect_script_redirect(&body, &result.final_url) {
            if is_in_scope(&target, site) && !state.visited.contains(&target) {
                log::info!("Script redirect {url} -> {target}");
                state.frontier.push_front(target);
                state.summary.redirects_followed += 1;
                return;
            }
            log::debug!("Ignoring script redirect {url} -> {target}");
        }

        if !result.is_html() {
            log::warn!(
                "Skipping {} with content type {:?}",
                url,
                result.content_type
            );
            state.summary.soft_failures += 1;
            return;
        }

        let page = build_record(url, &result, &body, site.max_payload_chars);

        let selector = match self
            .classifier
            .locate_region(&page.reduced_html, &page.final_url)
            .await
        {
            Ok(selector) => Some(selector),
            Err(e) => {
                log::warn!("Region locator failed for {url}, using whole page: {e}");
                state.summary.soft_failures += 1;
                None
            }
        };

        let links = extract_links(&body, selector.as_deref(), &page.final_url);
        enqueue_links(site, &page.final_url, links, state);

        self.extract_profile(site, &page, state).await;
    }

    async fn extract_profile(
        &self,
        site: &SiteContext,
        page: &PageRecord,
        state: &mut TraversalState,
    ) {
        let request = ProfileRequest {
            url: &page.url,
            title: &page.title,
            text: &page.text,
            author_hints: &site.author_hints,
        };

        let judgement = match self.classifier.extract_profile(&request).await {
            Ok(Some(judgement)) => judgement,
            Ok(None) => {
                state.summary.soft_failures += 1;
                return;
            }
            Err(e) => {
                log::warn!("Profile extraction failed for {}: {}", page.url, e);
                state.summary.soft_failures += 1;
                return;
            }
        };

        if !judgement.is_profile {
            log::debug!("Not a profile: {}", page.url);
            return;
        }

        let candidate = ProfileCandidate::new(judgement.fields, site, &page.url, &page.title);
        match self.store.save_profile(&candidate).await {
            Ok(true) => {
                log::info!("Saved profile {} ({})", candidate.fields.name, page.url);
                state.summary.profiles_saved += 1;
            }
            Ok(false) => log::warn!("Profile from {} was not stored", page.url),
            Err(e) => {
                log::warn!("Failed to save profile from {}: {}", page.url, e);
                state.summary.soft_failures += 1;
            }
        }
    }
}

/// Reduce a fetched page into the record handed to the classifier.
fn build_record(url: &str, result: &FetchResult, body: &str, max_chars: usize) -> PageRecord {
    let document = Html::parse_document(body);

    PageRecord {
        url: url.to_string(),
        final_url: result.final_url.clone(),
        status: result.status,
        title: reducer::page_title(&document),
        reduced_html: reducer::reduce(body, max_chars),
        text: reducer::render_text(&document, max_chars),
    }
}

/// Links inside the located region, or the whole page when it does not resolve.
fn extract_links(body: &str, selector: Option<&str>, source: &str) -> Vec<LinkEdge> {
    let document = Html::parse_document(body);
    let selector = selector.map(str::trim).filter(|s| !s.is_empty());

    match selector.and_then(|s| reducer::locate_region(&document, s)) {
        Some(region) => reducer::collect_links(region, source),
        None => {
            if let Some(selector) = selector {
                log::debug!("Selector {selector:?} did not resolve on {source}, using whole page");
            }
            reducer::collect_links(document.root_element(), source)
        }
    }
}

fn enqueue_links(site: &SiteContext, base: &str, links: Vec<LinkEdge>, state: &mut TraversalState) {
    let Ok(base) = Url::parse(base) else {
        return;
    };

    let mut queued = 0;
    for link in links {
        if !is_followable_anchor(&link.anchor_text, &site.scope) {
            continue;
        }
        let Some(target) = resolve_link(&base, &link.href) else {
            continue;
        };
        if !is_in_scope(&target, site) || state.visited.contains(&target) {
            continue;
        }
        log::debug!("Queued {} ({})", target, link.anchor_text);
        state.frontier.push_back(target);
        queued += 1;
    }
    log::debug!("{} links queued from {}, frontier size {}", queued, base, state.frontier.len());
}
