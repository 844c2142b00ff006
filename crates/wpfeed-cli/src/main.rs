use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tracing::{debug, error, info};

use wpfeed::summary::print_summary;
use wpfeed::{logging, site_jobs, Config};
use wpfeed_client::PageFetcher;
use wpfeed_core::{load_sites_config, HttpConfig, MultiSiteDriver, SitesFile, Telemetry};
use wpfeed_store::FeedStore;

/// Exit code for a malformed command line.
const EXIT_USAGE: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse command line arguments
    let config = Config::parse();

    // Setup logging (file or stderr, stdout stays clean for the summary)
    let guard = logging::init(config.log_level, &config.log_target())?;

    let cli_overrides = match config.cli_overrides() {
        Ok(layer) => layer,
        Err(e) => {
            error!(error = %e, "Invalid command line");
            eprintln!("{}", e.user_message());
            drop(guard);
            std::process::exit(EXIT_USAGE);
        }
    };

    let sites = match config.config_path() {
        Some(path) => {
            debug!(path = %path.display(), "Loading sites config");
            load_sites_config(&path).context("Failed to load sites config")?
        }
        None => SitesFile::default(),
    };
    let jobs = site_jobs(&sites, &cli_overrides, config.only.as_deref())
        .context("Failed to select sites")?;

    let telemetry = Telemetry::new();
    let settings = config.sync_config();
    let store = FeedStore::new();
    let http = HttpConfig::default();
    info!(run = %telemetry.run_id(), dry_run = settings.dry_run, "wpfeed starting");

    let driver = MultiSiteDriver::new(&store, &settings, &telemetry);
    let summary = driver
        .run(jobs, |site| PageFetcher::for_site(site, http.clone()))
        .await;

    print_summary(&summary);

    let code = summary.exit_code();
    // process::exit skips destructors
    drop(guard);
    std::process::exit(code);
}
