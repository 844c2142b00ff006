use crate::logging::{LogLevel, LogTarget};
use crate::options::parse_option_pairs;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, warn};
use wpfeed_core::config::{default_config_path, ConfigKey, SiteConfig, SiteOverrides, SitesFile, SyncConfig};
use wpfeed_core::driver::SiteJob;
use wpfeed_core::error::AppError;

pub use wpfeed_core::config::DEFAULT_SITE;

/// Log file used unless `--log-file` says otherwise.
pub const DEFAULT_LOG_FILE: &str = "wordpress-api-feed.log";

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "wpfeed")]
#[command(
    author,
    version,
    about = "Mirror a paginated WordPress REST API into a local RSS or Atom feed"
)]
#[command(after_help = "Examples:
  wpfeed --site https://example.org -o ~/feeds/example.xml
  wpfeed --site https://example.org -O search=patreon max_pages 5
  wpfeed --config ~/feeds.toml --only novel --log-level info
  wpfeed --dry-run --log-file -")]
pub struct Config {
    /// Sites config file [~/.wordpress-api-feed.toml]
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output feed file, or a directory for the default file name
    #[arg(short = 'o', long = "feed-output", value_name = "PATH")]
    pub feed_output: Option<String>,

    /// WordPress username
    #[arg(short, long)]
    pub username: Option<String>,

    /// WordPress password
    #[arg(short, long, env = "WPFEED_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// WordPress site (e.g. https://wordpress.org)
    #[arg(short, long, value_name = "URL")]
    pub site: Option<String>,

    /// Logging level
    #[arg(short, long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Log file, or '-' for stderr [~/wordpress-api-feed.log]
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<String>,

    /// Additional site options [max_item_age_days=15 max_pages 100]
    #[arg(short = 'O', long = "options", num_args = 1.., value_name = "KEY[=VALUE]")]
    pub options: Vec<String>,

    /// Sync only this site from the config file
    #[arg(long, value_name = "NAME")]
    pub only: Option<String>,

    /// Sites synced at the same time
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Walk and merge, but do not write feed files
    #[arg(long)]
    pub dry_run: bool,
}

impl Config {
    /// The command-line override layer: named flags first, then `--options`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the `--options` list is malformed.
    pub fn cli_overrides(&self) -> Result<SiteOverrides, AppError> {
        let mut layer = SiteOverrides::new();
        let named = [
            (ConfigKey::SiteUrl, &self.site),
            (ConfigKey::Username, &self.username),
            (ConfigKey::Password, &self.password),
            (ConfigKey::FeedOutput, &self.feed_output),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                layer.set(key, value);
            }
        }

        for (key, value) in parse_option_pairs(&self.options)? {
            match key.parse::<ConfigKey>() {
                Ok(config_key) => {
                    layer.set(config_key, &value);
                }
                Err(reason) => warn!(%reason, "Ignoring option"),
            }
        }
        Ok(layer)
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(default_config_path)
    }

    pub fn log_target(&self) -> LogTarget {
        match self.log_file.as_deref() {
            Some("-") => LogTarget::Stderr,
            Some(path) => LogTarget::File(wpfeed_core::config::expand_home(path)),
            None => dirs::home_dir()
                .map(|home| LogTarget::File(home.join(DEFAULT_LOG_FILE)))
                .unwrap_or(LogTarget::Stderr),
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            concurrency: self.concurrency.max(1),
            dry_run: self.dry_run,
            ..SyncConfig::default()
        }
    }
}

/// Resolves every enabled site into a job.
///
/// With no sites in the file, a single site named [`DEFAULT_SITE`] is built
/// from the command line alone. The command-line layer applies to every
/// site.
///
/// # Errors
///
/// Returns `AppError::ConfigError` if `only` names no enabled site.
pub fn site_jobs(
    sites: &SitesFile,
    cli: &SiteOverrides,
    only: Option<&str>,
) -> Result<Vec<SiteJob>, AppError> {
    if sites.sites.is_empty() {
        if let Some(name) = only.filter(|name| *name != DEFAULT_SITE) {
            return Err(AppError::ConfigError(format!(
                "no site named '{}': the config file defines no sites",
                name
            )));
        }
        debug!("No sites in config file, using the command line only");
        let config = SiteConfig::resolve(DEFAULT_SITE, &SiteOverrides::new(), cli);
        return Ok(vec![SiteJob::new(DEFAULT_SITE, config)]);
    }

    let jobs: Vec<SiteJob> = sites
        .enabled_sites()
        .filter(|(name, _)| only.is_none_or(|only| only == *name))
        .map(|(name, section)| {
            let config = SiteConfig::resolve(name, &section.overrides(name), cli);
            SiteJob::new(name, config)
        })
        .collect();

    if let Some(name) = only {
        if jobs.is_empty() {
            return Err(AppError::ConfigError(format!(
                "no enabled site named '{}' in the config file",
                name
            )));
        }
    }

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("wpfeed").chain(args.iter().copied())).unwrap()
    }

    fn sites(toml: &str) -> SitesFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, toml.as_bytes()).unwrap();
        wpfeed_core::config::load_sites_config(file.path()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.concurrency, 4);
        assert!(!config.dry_run);
        assert!(config.options.is_empty());
    }

    #[test]
    fn test_log_level_aliases() {
        assert_eq!(parse(&["-l", "warning"]).log_level, LogLevel::Warn);
        assert_eq!(parse(&["-l", "critical"]).log_level, LogLevel::Error);
        assert_eq!(parse(&["--log-level", "debug"]).log_level, LogLevel::Debug);
    }

    #[test]
    fn test_log_target() {
        assert_eq!(parse(&["--log-file", "-"]).log_target(), LogTarget::Stderr);
        assert_eq!(
            parse(&["--log-file", "/tmp/wpfeed.log"]).log_target(),
            LogTarget::File(PathBuf::from("/tmp/wpfeed.log"))
        );
    }

    #[test]
    fn test_options_follow_named_flags() {
        let config = parse(&[
            "--site",
            "https://a.example.com",
            "-O",
            "site=https://b.example.com",
            "max_pages",
            "5",
        ]);
        let layer = config.cli_overrides().unwrap();
        assert_eq!(layer.site_url.as_deref(), Some("https://b.example.com"));
        assert_eq!(layer.max_pages, Some(5));
    }

    #[test]
    fn test_malformed_options_are_rejected() {
        let config = parse(&["-O", "a=1", "b", "2", "c"]);
        let err = config.cli_overrides().unwrap_err();
        assert!(err.to_string().contains("'c'"));
    }

    #[test]
    fn test_no_sites_means_default_site() {
        let config = parse(&["--site", "https://example.com", "-u", "alice"]);
        let jobs = site_jobs(&SitesFile::default(), &config.cli_overrides().unwrap(), None).unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, DEFAULT_SITE);
        let site = jobs[0].config.as_ref().unwrap();
        assert_eq!(site.site_url, "https://example.com");
        assert_eq!(site.username, "alice");
    }

    #[test]
    fn test_default_site_without_url_is_config_error() {
        let jobs = site_jobs(&SitesFile::default(), &SiteOverrides::new(), None).unwrap();
        assert!(matches!(jobs[0].config, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_precedence_cli_over_file_over_default() {
        let file = sites(
            r#"
            [sites.novel]
            site_url = "https://novel.example.com"
            max_pages = "50"
            per_page = "abc"
            search = "patreon"
            "#,
        );
        let config = parse(&["-O", "search=chapter"]);

        let jobs = site_jobs(&file, &config.cli_overrides().unwrap(), None).unwrap();
        let site = jobs[0].config.as_ref().unwrap();

        assert_eq!(site.max_pages, 50);
        assert_eq!(site.page_size, 20);
        assert_eq!(site.search_term, "chapter");
    }

    #[test]
    fn test_disabled_sites_and_only_filter() {
        let file = sites(
            r#"
            [sites.alpha]
            site_url = "https://alpha.example.com"
            feed_output = "/tmp/alpha.xml"

            [sites.beta]
            enabled = false
            site_url = "https://beta.example.com"

            [sites.gamma]
            site_url = "https://gamma.example.com"
            feed_output = "/tmp/gamma.xml"
            "#,
        );

        let names: Vec<_> = site_jobs(&file, &SiteOverrides::new(), None)
            .unwrap()
            .into_iter()
            .map(|job| job.name)
            .collect();
        assert_eq!(names, vec!["alpha", "gamma"]);

        let only = site_jobs(&file, &SiteOverrides::new(), Some("gamma")).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "gamma");

        let err = site_jobs(&file, &SiteOverrides::new(), Some("beta")).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_sites_without_feed_output_get_their_own_files() {
        let file = sites(
            r#"
            [sites.alpha]
            site_url = "https://alpha.example.com"

            [sites.beta]
            site_url = "https://beta.example.com"
            "#,
        );
        let jobs = site_jobs(&file, &SiteOverrides::new(), None).unwrap();

        let alpha = jobs[0].config.as_ref().unwrap();
        let beta = jobs[1].config.as_ref().unwrap();
        assert_ne!(alpha.output_path, beta.output_path);
        assert!(alpha.output_path.ends_with("wordpress-api-feed-alpha.xml"));
    }

    #[test]
    fn test_empty_search_option_clears_file_term() {
        let file = sites(
            r#"
            [sites.novel]
            site_url = "https://novel.example.com"
            search = "patreon"
            "#,
        );
        let config = parse(&["-O", "search="]);

        let jobs = site_jobs(&file, &config.cli_overrides().unwrap(), None).unwrap();
        assert_eq!(jobs[0].config.as_ref().unwrap().search_term, "");
    }

    #[test]
    fn test_broken_site_does_not_hide_others() {
        let file = sites(
            r#"
            [sites.good]
            site_url = "https://good.example.com"

            [sites.bad]
            site_url = "ftp://bad.example.com"
            "#,
        );
        let jobs = site_jobs(&file, &SiteOverrides::new(), None).unwrap();

        let by_name: HashMap<_, _> = jobs.iter().map(|j| (j.name.as_str(), j.config.is_ok())).collect();
        assert_eq!(by_name.get("good"), Some(&true));
        assert_eq!(by_name.get("bad"), Some(&false));
    }

    #[test]
    fn test_sync_config_from_flags() {
        let settings = parse(&["--concurrency", "0", "--dry-run"]).sync_config();
        assert_eq!(settings.concurrency, 1);
        assert!(settings.dry_run);
        assert_eq!(settings.per_host_limit, 1);
    }
}
