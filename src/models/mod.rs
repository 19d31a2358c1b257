// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod page;
mod profile;
mod site;

// Re-export all public types
pub use config::{ClassifierConfig, Config, CoordinatorConfig, CrawlerConfig, ScopeConfig};
pub use page::{FetchResult, LinkEdge, PageRecord};
pub use profile::{ProfileCandidate, ProfileFields, ProfileJudgement, Sex};
pub use site::{SiteContext, SiteTarget};

/// Why a traversal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No URLs left to visit
    FrontierExhausted,
    /// The page budget was spent
    BudgetExhausted,
    /// A stop was requested from outside
    Cancelled,
}

/// Counters for one site traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalSummary {
    pub site_id: String,
    /// Fetch attempts, including soft failures
    pub pages_fetched: usize,
    pub profiles_saved: usize,
    /// URLs skipped because a profile was already recorded for them
    pub known_skipped: usize,
    pub soft_failures: usize,
    pub redirects_followed: usize,
    pub stop_reason: StopReason,
}

impl TraversalSummary {
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            pages_fetched: 0,
            profiles_saved: 0,
            known_skipped: 0,
            soft_failures: 0,
            redirects_followed: 0,
            stop_reason: StopReason::FrontierExhausted,
        }
    }
}
