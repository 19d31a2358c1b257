//! Local filesystem storage implementation.
//!
//! Sites and profiles are kept as two JSON documents under the storage
//! root. Every write replaces the whole document atomically.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{ProfileCandidate, SiteTarget};
use crate::storage::ProfileStore;

const SITES_KEY: &str = "sites.json";
const PROFILES_KEY: &str = "profiles.json";

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::storage(format!("{key} is corrupt: {e}"))),
            None => Ok(None),
        }
    }

    async fn load_sites(&self) -> Result<Vec<SiteTarget>> {
        Ok(self.read_json(SITES_KEY).await?.unwrap_or_default())
    }

    /// All saved profiles.
    pub async fn load_profiles(&self) -> Result<Vec<ProfileCandidate>> {
        Ok(self.read_json(PROFILES_KEY).await?.unwrap_or_default())
    }

    /// Insert a site target, replacing any existing target with the same id.
    ///
    /// Returns `true` when an existing target was replaced.
    pub async fn add_site_target(&self, target: SiteTarget) -> Result<bool> {
        if target.id.trim().is_empty() {
            return Err(AppError::validation("site id must not be empty"));
        }

        let _guard = self.write_lock.lock().await;
        let mut sites = self.load_sites().await?;
        let replaced = match sites.iter_mut().find(|s| s.id == target.id) {
            Some(existing) => {
                *existing = target;
                true
            }
            None => {
                sites.push(target);
                false
            }
        };
        self.write_json(SITES_KEY, &sites).await?;
        Ok(replaced)
    }
}

/// Index of the record a candidate should overwrite.
///
/// A record for the same person (site, name and email) wins over one for the
/// same homepage.
fn upsert_position(profiles: &[ProfileCandidate], candidate: &ProfileCandidate) -> Option<usize> {
    let fields = &candidate.fields;
    let same_person = |p: &ProfileCandidate| {
        !fields.email.is_empty()
            && p.site_id == candidate.site_id
            && p.fields.name == fields.name
            && p.fields.email == fields.email
    };

    profiles
        .iter()
        .position(same_person)
        .or_else(|| profiles.iter().position(|p| p.homepage == candidate.homepage))
}

#[async_trait]
impl ProfileStore for LocalStorage {
    async fn save_profile(&self, candidate: &ProfileCandidate) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut profiles = self.load_profiles().await?;

        match upsert_position(&profiles, candidate) {
            Some(idx) => {
                let id = profiles[idx].id.clone();
                profiles[idx] = ProfileCandidate {
                    id,
                    ..candidate.clone()
                };
                log::debug!("Updated profile {} ({})", candidate.fields.name, candidate.homepage);
            }
            None => {
                profiles.push(candidate.clone());
                log::debug!("Added profile {} ({})", candidate.fields.name, candidate.homepage);
            }
        }

        self.write_json(PROFILES_KEY, &profiles).await?;
        Ok(true)
    }

    async fn find_profile_by_homepage(&self, url: &str) -> Result<Option<ProfileCandidate>> {
        Ok(self
            .load_profiles()
            .await?
            .into_iter()
            .find(|p| p.homepage == url))
    }

    async fn list_site_targets(&self) -> Result<Vec<SiteTarget>> {
        self.load_sites().await
    }

    async fn mark_site_crawled(&self, site_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut sites = self.load_sites().await?;

        let site = sites
            .iter_mut()
            .find(|s| s.id == site_id)
            .ok_or_else(|| AppError::storage(format!("unknown site {site_id}")))?;
        site.crawled = true;

        self.write_json(SITES_KEY, &sites).await
    }
}
