//! Faculty Crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use faculty_crawler::{
    error::{AppError, Result},
    models::{Config, SiteContext, SiteTarget},
    pipeline::{self, RunCoordinator, RunOutcome},
    services::{HttpFetcher, LlmClassifier, OpenAiChatClient},
    storage::{LocalStorage, ProfileStore},
    utils::get_domain,
};

/// Faculty Crawler - University Faculty Profile Discovery
#[derive(Parser, Debug)]
#[command(
    name = "faculty-crawler",
    version,
    about = "Discovers faculty profile pages on university department sites"
)]
struct Cli {
    /// Path to storage directory containing config and data files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every registered site that has not been crawled yet
    Run,

    /// Run now, then again on the configured schedule until Ctrl-C
    Watch {
        /// Override the schedule interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Crawl a single seed URL without registering it
    Crawl {
        /// Seed URL
        #[arg(long)]
        url: String,

        /// Site id used to tag saved profiles (default: the URL's host)
        #[arg(long)]
        site_id: Option<String>,

        /// Page budget for this traversal
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Register or replace a site target
    AddSite {
        /// Unique site id
        #[arg(long)]
        id: String,

        /// Department name
        #[arg(long)]
        name: String,

        /// Department homepage
        #[arg(long)]
        url: String,

        /// University name
        #[arg(long, default_value = "")]
        university: String,

        /// Page budget for this site
        #[arg(long)]
        max_pages: Option<usize>,

        /// Known faculty name, may be repeated
        #[arg(long = "author-hint")]
        author_hints: Vec<String>,
    },

    /// Validate configuration and registered sites
    Validate,

    /// Show storage contents
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Wire the HTTP fetcher, classifier and storage into a coordinator.
fn build_coordinator(config: &Config, storage: &LocalStorage) -> Result<RunCoordinator> {
    let fetcher = HttpFetcher::new(&config.crawler)?;
    let model = OpenAiChatClient::new(&config.classifier)?;
    let classifier = LlmClassifier::new(model, config.classifier.max_payload_chars);

    Ok(RunCoordinator::new(
        config.clone(),
        Arc::new(fetcher),
        Arc::new(classifier),
        Arc::new(storage.clone()),
    ))
}

fn log_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::AlreadyRunning => log::warn!("Another run is in progress"),
        RunOutcome::Completed(report) => log::info!(
            "Sites crawled: {}, failed: {}, skipped: {}, profiles saved: {}{}",
            report.sites_crawled,
            report.sites_failed,
            report.sites_skipped,
            report.profiles_saved,
            if report.cancelled { " (cancelled)" } else { "" }
        ),
    }
}

/// Request a stop on Ctrl-C.
fn stop_on_ctrl_c(coordinator: &Arc<RunCoordinator>) {
    let coordinator = Arc::clone(coordinator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, stopping after the current page...");
            coordinator.request_stop();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Faculty Crawler starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::Run => {
            config.validate()?;
            let coordinator = Arc::new(build_coordinator(&config, &storage)?);
            stop_on_ctrl_c(&coordinator);

            let outcome = coordinator.run_once().await?;
            log_outcome(&outcome);
        }

        Command::Watch { interval } => {
            config.validate()?;
            let period = Duration::from_secs(
                interval.unwrap_or(config.coordinator.schedule_interval_secs),
            );
            if period.is_zero() {
                return Err(AppError::config("Schedule interval must be positive"));
            }

            let coordinator = Arc::new(build_coordinator(&config, &storage)?);

            tokio::select! {
                _ = pipeline::run_every(Arc::clone(&coordinator), period) => {}
                result = tokio::signal::ctrl_c() => {
                    result?;
                    log::warn!("Ctrl-C received, waiting for the current run to stop...");
                    coordinator.request_stop();
                    while coordinator.is_running() {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                }
            }
        }

        Command::Crawl {
            url,
            site_id,
            max_pages,
        } => {
            config.validate()?;
            let host = get_domain(&url)
                .ok_or_else(|| AppError::validation(format!("Invalid seed URL: {url}")))?;

            let mut target = SiteTarget::new(site_id.unwrap_or_else(|| host.clone()), host, url);
            target.max_pages = max_pages;
            let site = SiteContext::from_target(&target, &config)?;

            let coordinator = Arc::new(build_coordinator(&config, &storage)?);
            stop_on_ctrl_c(&coordinator);

            let summary = coordinator.crawl_site(&site).await?;
            log::info!(
                "Fetched {} pages, saved {} profiles, skipped {} known ({:?})",
                summary.pages_fetched,
                summary.profiles_saved,
                summary.known_skipped,
                summary.stop_reason
            );
        }

        Command::AddSite {
            id,
            name,
            url,
            university,
            max_pages,
            author_hints,
        } => {
            let mut target = SiteTarget::new(id, name, url);
            target.university = university;
            target.max_pages = max_pages;
            target.author_hints = author_hints;

            // Reject unusable seeds before they reach the site list.
            SiteContext::from_target(&target, &config)?;

            let label = target.label();
            if storage.add_site_target(target).await? {
                log::info!("Replaced site {label}");
            } else {
                log::info!("Added site {label}");
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            let sites = storage.list_site_targets().await?;
            let mut invalid = 0;
            for target in &sites {
                if let Err(e) = SiteContext::from_target(target, &config) {
                    log::error!("✗ Site {}: {}", target.label(), e);
                    invalid += 1;
                }
            }
            if invalid > 0 {
                return Err(AppError::validation(format!(
                    "{invalid} of {} sites are invalid",
                    sites.len()
                )));
            }
            log::info!("✓ {} sites OK", sites.len());

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", storage.root_dir().display());

            let sites = storage.list_site_targets().await?;
            let crawled = sites.iter().filter(|s| s.crawled).count();
            log::info!(
                "Sites: {} registered, {} crawled, {} pending",
                sites.len(),
                crawled,
                sites.len() - crawled
            );

            let profiles = storage.load_profiles().await?;
            log::info!("Profiles: {}", profiles.len());
            if let Some(latest) = profiles.iter().max_by_key(|p| p.discovered_at) {
                log::info!(
                    "Latest: {} ({}) at {}",
                    latest.fields.name,
                    latest.homepage,
                    latest.discovered_at
                );
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
