// src/pipeline/coordinator.rs

//! Sequential multi-site runs with a process-wide single-run guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::Result;
use crate::models::{Config, SiteContext, StopReason, TraversalSummary};
use crate::services::{Classifier, FrontierTraversal, PageFetcher};
use crate::storage::ProfileStore;

/// Result of a `run_once` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run held the guard; nothing was done
    AlreadyRunning,
    Completed(RunReport),
}

/// Per-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub sites_crawled: usize,
    pub sites_failed: usize,
    /// Already crawled or without a usable URL
    pub sites_skipped: usize,
    pub profiles_saved: usize,
    /// The run ended early on a stop request
    pub cancelled: bool,
}

/// Holds the running flag for the lifetime of one run.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs traversals over every registered site, one at a time.
pub struct RunCoordinator {
    config: Config,
    fetcher: Arc<dyn PageFetcher>,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn ProfileStore>,
    running: AtomicBool,
    stop: Arc<AtomicBool>,
}

impl RunCoordinator {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            config,
            fetcher,
            classifier,
            store,
            running: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a run currently holds the guard.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the current and any future traversal to stop at the next dequeue.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Traverse one site without touching its crawled flag.
    pub async fn crawl_site(&self, site: &SiteContext) -> Result<TraversalSummary> {
        FrontierTraversal::new(
            self.fetcher.as_ref(),
            self.classifier.as_ref(),
            self.store.as_ref(),
        )
        .with_stop_flag(Arc::clone(&self.stop))
        .run(site)
        .await
    }

    /// Crawl every pending site once.
    ///
    /// Rejected with `RunOutcome::AlreadyRunning` while another run is in
    /// progress. A site is marked crawled only when its traversal ends
    /// normally.
    pub async fn run_once(&self) -> Result<RunOutcome> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            log::warn!("A run is already in progress, ignoring this request");
            return Ok(RunOutcome::AlreadyRunning);
        };

        let sites = self.store.list_site_targets().await?;
        let cooldown = Duration::from_secs(self.config.coordinator.site_cooldown_secs);
        let mut report = RunReport::default();

        log::info!("Starting run over {} registered sites", sites.len());

        for target in sites {
            if self.stop_requested() {
                report.cancelled = true;
                break;
            }

            if target.crawled {
                log::debug!("Skipping {}: already crawled", target.label());
                report.sites_skipped += 1;
                continue;
            }

            let site = match SiteContext::from_target(&target, &self.config) {
                Ok(site) => site,
                Err(e) => {
                    log::error!("Skipping {}: {}", target.label(), e);
                    report.sites_skipped += 1;
                    continue;
                }
            };

            match self.crawl_site(&site).await {
                Ok(summary) if summary.stop_reason == StopReason::Cancelled => {
                    report.profiles_saved += summary.profiles_saved;
                    report.cancelled = true;
                    log::warn!("Traversal of {} cancelled, not marking crawled", site.label);
                    break;
                }
                Ok(summary) => {
                    report.profiles_saved += summary.profiles_saved;
                    report.sites_crawled += 1;
                    if let Err(e) = self.store.mark_site_crawled(&site.site_id).await {
                        log::error!("Failed to mark {} crawled: {}", site.label, e);
                    }
                }
                Err(e) => {
                    log::error!("Site {} failed, will retry next run: {}", site.label, e);
                    report.sites_failed += 1;
                }
            }

            if cooldown.as_millis() > 0 {
                tokio::time::sleep(cooldown).await;
            }
        }

        log::info!(
            "Run finished: {} crawled, {} failed, {} skipped, {} profiles saved",
            report.sites_crawled,
            report.sites_failed,
            report.sites_skipped,
            report.profiles_saved
        );
        Ok(RunOutcome::Completed(report))
    }
}
