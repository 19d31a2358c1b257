//! Storage abstractions for sites and discovered profiles.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml     # Crawler configuration
//! ├── sites.json      # Registered site targets
//! └── profiles.json   # Saved profile candidates
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ProfileCandidate, SiteTarget};

// Re-export for convenience
pub use local::LocalStorage;

/// Persistence collaborator for the traversal engine and run coordinator.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert or update a profile. Returns whether it was stored.
    async fn save_profile(&self, candidate: &ProfileCandidate) -> Result<bool>;

    /// Look up a profile previously recorded for this exact homepage.
    async fn find_profile_by_homepage(&self, url: &str) -> Result<Option<ProfileCandidate>>;

    /// All registered site targets, in registration order.
    async fn list_site_targets(&self) -> Result<Vec<SiteTarget>>;

    /// Record that a site has been fully traversed.
    async fn mark_site_crawled(&self, site_id: &str) -> Result<()>;
}
