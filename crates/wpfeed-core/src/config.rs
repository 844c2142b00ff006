//! Configuration types for wpfeed components.
//!
//! Site settings come from three layers, resolved field by field:
//! built-in defaults, then the site's section of the config file, then the
//! command line. Each layer is a [`SiteOverrides`] whose values pass through
//! the same typed coercion, so a string `"50"` from TOML and `-O max_pages=50`
//! on the command line end up identical. A value that fails coercion is
//! dropped with a warning and the lower layer's value stays in effect.

use crate::error::AppError;
use crate::models::FeedType;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// File name of the default config file in the user's home directory.
pub const DEFAULT_CONFIG_FILE: &str = ".wordpress-api-feed.toml";

/// File name of the default feed output in the user's home directory.
pub const DEFAULT_OUTPUT_FILE: &str = "wordpress-api-feed-output.xml";

/// Site name used when the config file defines no sites.
pub const DEFAULT_SITE: &str = "default";

/// HTTP client configuration for remote API calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Multi-site synchronization configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Sites synced at the same time.
    pub concurrency: usize,
    /// Sites sharing one host that may sync at the same time.
    pub per_host_limit: usize,
    /// Wall-clock budget for one site's pagination walk.
    pub site_deadline: Duration,
    /// Walk and merge, but never write the feed file.
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            per_host_limit: 1,
            site_deadline: Duration::from_secs(600),
            dry_run: false,
        }
    }
}

/// Recognized option names.
///
/// `site` and `wordpress_site` are accepted as aliases of `site_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    SiteUrl,
    ApiPath,
    LoginPath,
    Username,
    Password,
    ApplicationPassword,
    Search,
    MaxPages,
    PerPage,
    MaxFeedItems,
    MaxItemAgeDays,
    FeedType,
    FeedOutput,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 13] = [
        ConfigKey::SiteUrl,
        ConfigKey::ApiPath,
        ConfigKey::LoginPath,
        ConfigKey::Username,
        ConfigKey::Password,
        ConfigKey::ApplicationPassword,
        ConfigKey::Search,
        ConfigKey::MaxPages,
        ConfigKey::PerPage,
        ConfigKey::MaxFeedItems,
        ConfigKey::MaxItemAgeDays,
        ConfigKey::FeedType,
        ConfigKey::FeedOutput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::SiteUrl => "site_url",
            ConfigKey::ApiPath => "api_path",
            ConfigKey::LoginPath => "login_path",
            ConfigKey::Username => "username",
            ConfigKey::Password => "password",
            ConfigKey::ApplicationPassword => "application_password",
            ConfigKey::Search => "search",
            ConfigKey::MaxPages => "max_pages",
            ConfigKey::PerPage => "per_page",
            ConfigKey::MaxFeedItems => "max_feed_items",
            ConfigKey::MaxItemAgeDays => "max_item_age_days",
            ConfigKey::FeedType => "feed_type",
            ConfigKey::FeedOutput => "feed_output",
        }
    }
}

impl FromStr for ConfigKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "site" | "wordpress_site" => return Ok(ConfigKey::SiteUrl),
            "search_term" => return Ok(ConfigKey::Search),
            "page_size" => return Ok(ConfigKey::PerPage),
            "output_path" => return Ok(ConfigKey::FeedOutput),
            _ => {}
        }
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| format!("unknown option '{}'", s))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One layer of optional site settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteOverrides {
    pub site_url: Option<String>,
    pub api_path: Option<String>,
    pub login_path: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub application_password: Option<bool>,
    pub search_term: Option<String>,
    pub max_pages: Option<u32>,
    pub page_size: Option<u32>,
    pub max_feed_items: Option<u32>,
    pub max_item_age_days: Option<u32>,
    pub feed_type: Option<FeedType>,
    pub output_path: Option<PathBuf>,
}

impl SiteOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` from its raw text form.
    ///
    /// Empty values are ignored, except for `search`, where an empty value
    /// clears a term set by a lower layer. Integer keys must parse as a
    /// non-negative integer and `feed_type` must be `rss` or `atom`; anything
    /// else is skipped with a warning so the lower layer's value stays in
    /// effect. Returns whether the value was applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use wpfeed_core::{ConfigKey, SiteOverrides};
    ///
    /// let mut layer = SiteOverrides::new();
    /// assert!(layer.set(ConfigKey::MaxPages, " 50 "));
    /// assert!(!layer.set(ConfigKey::MaxPages, "lots"));
    /// assert_eq!(layer.max_pages, Some(50));
    /// ```
    pub fn set(&mut self, key: ConfigKey, raw: &str) -> bool {
        let value = raw.trim();
        if value.is_empty() {
            if key == ConfigKey::Search {
                self.search_term = Some(String::new());
                return true;
            }
            return false;
        }
        self.apply_value(key, raw, value).is_some()
    }

    fn apply_value(&mut self, key: ConfigKey, raw: &str, value: &str) -> Option<()> {
        match key {
            ConfigKey::SiteUrl => self.site_url = Some(value.to_string()),
            ConfigKey::ApiPath => self.api_path = Some(value.to_string()),
            ConfigKey::LoginPath => self.login_path = Some(value.to_string()),
            ConfigKey::Username => self.username = Some(value.to_string()),
            ConfigKey::Password => self.password = Some(raw.to_string()),
            ConfigKey::ApplicationPassword => {
                self.application_password = Some(parse_flag(key, value)?)
            }
            ConfigKey::Search => self.search_term = Some(value.to_string()),
            ConfigKey::MaxPages => self.max_pages = Some(parse_count(key, value)?),
            ConfigKey::PerPage => self.page_size = Some(parse_count(key, value)?),
            ConfigKey::MaxFeedItems => self.max_feed_items = Some(parse_count(key, value)?),
            ConfigKey::MaxItemAgeDays => self.max_item_age_days = Some(parse_count(key, value)?),
            ConfigKey::FeedType => match value.parse::<FeedType>() {
                Ok(feed_type) => self.feed_type = Some(feed_type),
                Err(reason) => {
                    warn!(key = %key, value, %reason, "Skipping invalid option");
                    return None;
                }
            },
            ConfigKey::FeedOutput => self.output_path = Some(expand_home(value)),
        }
        Some(())
    }

    /// Builds a layer from `(key, value)` pairs, warning about unknown keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut layer = Self::new();
        for (key, value) in pairs {
            match key.as_ref().parse::<ConfigKey>() {
                Ok(config_key) => {
                    layer.set(config_key, value.as_ref());
                }
                Err(reason) => warn!(%reason, "Ignoring option"),
            }
        }
        layer
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn parse_flag(key: ConfigKey, value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => {
            warn!(key = %key, value, "Skipping invalid option, expected true or false");
            None
        }
    }
}

fn parse_count(key: ConfigKey, value: &str) -> Option<u32> {
    match value.parse::<u32>() {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(key = %key, value, error = %e, "Skipping invalid option, keeping previous value");
            None
        }
    }
}

/// Expands a leading `~/` to the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Fully resolved settings for one site.
#[derive(Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Config-file section name, or `"default"` for a command-line run.
    pub name: String,
    pub site_url: String,
    pub api_path: String,
    pub login_path: String,
    pub username: String,
    pub password: String,
    /// `password` is a WordPress application password, sent as HTTP Basic
    /// credentials instead of logging in through the login form.
    pub application_password: bool,
    /// Empty matches every item.
    pub search_term: String,
    pub max_pages: u32,
    pub page_size: u32,
    /// 0 means unbounded.
    pub max_feed_items: u32,
    /// 0 disables the age filter.
    pub max_item_age_days: u32,
    pub feed_type: FeedType,
    pub output_path: PathBuf,
}

impl SiteConfig {
    /// Built-in defaults for a site called `name`.
    pub fn defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            site_url: String::new(),
            api_path: "wp-json/wp/v2/pages".to_string(),
            login_path: "wp-login.php".to_string(),
            username: String::new(),
            password: String::new(),
            application_password: false,
            search_term: String::new(),
            max_pages: 100,
            page_size: 20,
            max_feed_items: 0,
            max_item_age_days: 15,
            feed_type: FeedType::Rss,
            output_path: default_output_path(name),
        }
    }

    /// Resolves a site from its config-file layer and the command-line layer.
    ///
    /// Command line beats config file beats built-in default, per field. An
    /// output path naming an existing directory gets the site's default file
    /// name appended.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` or `AppError::InvalidSiteUrl` if the
    /// resolved settings fail [`SiteConfig::validate`].
    pub fn resolve(
        name: &str,
        file: &SiteOverrides,
        cli: &SiteOverrides,
    ) -> Result<Self, AppError> {
        let mut config = Self::defaults(name);
        config.apply(file);
        config.apply(cli);
        if config.output_path.is_dir() {
            config.output_path = config.output_path.join(default_output_file(name));
        }
        config.validate()?;
        Ok(config)
    }

    /// Overwrites every field the layer sets.
    pub fn apply(&mut self, layer: &SiteOverrides) {
        fn take<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }

        take(&mut self.site_url, &layer.site_url);
        take(&mut self.api_path, &layer.api_path);
        take(&mut self.login_path, &layer.login_path);
        take(&mut self.username, &layer.username);
        take(&mut self.password, &layer.password);
        take(&mut self.application_password, &layer.application_password);
        take(&mut self.search_term, &layer.search_term);
        take(&mut self.max_pages, &layer.max_pages);
        take(&mut self.page_size, &layer.page_size);
        take(&mut self.max_feed_items, &layer.max_feed_items);
        take(&mut self.max_item_age_days, &layer.max_item_age_days);
        take(&mut self.feed_type, &layer.feed_type);
        take(&mut self.output_path, &layer.output_path);
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.site_url.trim().is_empty() {
            return Err(AppError::ConfigError(format!(
                "no site_url for site '{}', try --site https://wordpress.org",
                self.name
            )));
        }
        let url = Url::parse(self.site_url.trim())
            .map_err(|_| AppError::InvalidSiteUrl(self.site_url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(AppError::InvalidSiteUrl(self.site_url.clone()));
        }
        if self.page_size == 0 {
            return Err(AppError::ConfigError(format!(
                "per_page must be greater than 0 for site '{}'",
                self.name
            )));
        }
        if self.max_pages == 0 {
            return Err(AppError::ConfigError(format!(
                "max_pages must be greater than 0 for site '{}'",
                self.name
            )));
        }
        Ok(())
    }

    /// `{site_url}/{api_path}` without query parameters.
    pub fn api_url(&self) -> Result<Url, AppError> {
        join_site_path(&self.site_url, &self.api_path)
    }

    /// `{site_url}/{login_path}`.
    pub fn login_url(&self) -> Result<Url, AppError> {
        join_site_path(&self.site_url, &self.login_path)
    }

    /// `admin-ajax.php` endpoint that hands a logged-in user a REST nonce.
    pub fn nonce_url(&self) -> Result<Url, AppError> {
        join_site_path(&self.site_url, "wp-admin/admin-ajax.php?action=rest-nonce")
    }

    /// Host name used to group sites that share a remote server.
    pub fn host(&self) -> String {
        Url::parse(self.site_url.trim())
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.site_url.clone())
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

impl fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteConfig")
            .field("name", &self.name)
            .field("site_url", &self.site_url)
            .field("api_path", &self.api_path)
            .field("login_path", &self.login_path)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("application_password", &self.application_password)
            .field("search_term", &self.search_term)
            .field("max_pages", &self.max_pages)
            .field("page_size", &self.page_size)
            .field("max_feed_items", &self.max_feed_items)
            .field("max_item_age_days", &self.max_item_age_days)
            .field("feed_type", &self.feed_type)
            .field("output_path", &self.output_path)
            .finish()
    }
}

fn join_site_path(site_url: &str, path: &str) -> Result<Url, AppError> {
    let joined = format!(
        "{}/{}",
        site_url.trim().trim_end_matches('/'),
        path.trim().trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|_| AppError::InvalidSiteUrl(joined))
}

/// Feed file name for `site`: [`DEFAULT_OUTPUT_FILE`] for [`DEFAULT_SITE`],
/// `wordpress-api-feed-{site}.xml` for a named site.
///
/// # Examples
///
/// ```
/// use wpfeed_core::config::default_output_file;
///
/// assert_eq!(default_output_file("default"), "wordpress-api-feed-output.xml");
/// assert_eq!(default_output_file("novel"), "wordpress-api-feed-novel.xml");
/// assert_eq!(default_output_file("a/b c"), "wordpress-api-feed-a_b_c.xml");
/// ```
pub fn default_output_file(site: &str) -> String {
    if site == DEFAULT_SITE {
        return DEFAULT_OUTPUT_FILE.to_string();
    }
    let safe: String = site
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("wordpress-api-feed-{}.xml", safe)
}

/// [`default_output_file`] in the home directory, or the bare file name
/// without a home.
pub fn default_output_path(site: &str) -> PathBuf {
    let file = default_output_file(site);
    dirs::home_dir()
        .map(|home| home.join(&file))
        .unwrap_or_else(|| PathBuf::from(file))
}

/// `~/.wordpress-api-feed.toml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE))
}

/// Parsed config file: one section per site.
///
/// ```toml
/// [sites.example]
/// enabled = true
/// site_url = "https://example.org"
/// max_pages = "50"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SitesFile {
    #[serde(default)]
    pub sites: BTreeMap<String, SiteSection>,
}

impl SitesFile {
    /// Names of the sites not switched off with `enabled = false`.
    pub fn enabled_sites(&self) -> impl Iterator<Item = (&str, &SiteSection)> {
        self.sites
            .iter()
            .filter(|(name, section)| section.is_enabled(name))
            .map(|(name, section)| (name.as_str(), section))
    }
}

/// Raw key/value table of one site's section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SiteSection {
    values: toml::Table,
}

impl SiteSection {
    /// A missing `enabled` key means enabled. Values that are not a
    /// recognizable boolean disable the site with a warning.
    pub fn is_enabled(&self, site: &str) -> bool {
        match self.values.get("enabled") {
            None => true,
            Some(toml::Value::Boolean(b)) => *b,
            Some(toml::Value::Integer(i)) => *i != 0,
            Some(toml::Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" => false,
                _ => {
                    warn!(site, value = %s, "Unrecognized 'enabled' value, skipping site");
                    false
                }
            },
            Some(other) => {
                warn!(site, value = %other, "Unrecognized 'enabled' value, skipping site");
                false
            }
        }
    }

    /// Converts the section into an override layer.
    pub fn overrides(&self, site: &str) -> SiteOverrides {
        let pairs = self
            .values
            .iter()
            .filter(|(key, _)| key.as_str() != "enabled")
            .filter_map(|(key, value)| {
                let raw = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    other => {
                        warn!(site, key = %key, value = %other, "Skipping non-scalar option");
                        return None;
                    }
                };
                Some((key.clone(), raw))
            });
        SiteOverrides::from_pairs(pairs)
    }
}

/// Loads the sites config file.
///
/// A missing file is not an error and yields an empty [`SitesFile`].
///
/// # Errors
///
/// Returns `AppError::ConfigError` if the file exists but cannot be read or
/// is not valid TOML.
pub fn load_sites_config(path: &Path) -> Result<SitesFile, AppError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file found");
            return Ok(SitesFile::default());
        }
        Err(e) => {
            return Err(AppError::ConfigError(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    toml::from_str(&content)
        .map_err(|e| AppError::ConfigError(format!("invalid TOML in {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.per_host_limit, 1);
        assert_eq!(config.site_deadline, Duration::from_secs(600));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_config_key_parse() {
        assert_eq!("max_pages".parse::<ConfigKey>(), Ok(ConfigKey::MaxPages));
        assert_eq!("per-page".parse::<ConfigKey>(), Ok(ConfigKey::PerPage));
        assert_eq!("wordpress_site".parse::<ConfigKey>(), Ok(ConfigKey::SiteUrl));
        assert_eq!("site".parse::<ConfigKey>(), Ok(ConfigKey::SiteUrl));
        assert!("colour".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_config_key_roundtrip_names() {
        for key in ConfigKey::ALL {
            assert_eq!(key.as_str().parse::<ConfigKey>(), Ok(key));
        }
    }

    #[test]
    fn test_set_rejects_non_numeric_and_keeps_previous() {
        let mut layer = SiteOverrides::new();
        assert!(layer.set(ConfigKey::MaxFeedItems, "25"));
        assert!(!layer.set(ConfigKey::MaxFeedItems, "twenty"));
        assert!(!layer.set(ConfigKey::MaxFeedItems, "-3"));
        assert_eq!(layer.max_feed_items, Some(25));
    }

    #[test]
    fn test_set_ignores_empty_values() {
        let mut layer = SiteOverrides::new();
        assert!(!layer.set(ConfigKey::Username, ""));
        assert!(!layer.set(ConfigKey::MaxPages, "   "));
        assert!(layer.is_empty());
    }

    #[test]
    fn test_empty_search_clears_lower_layer() {
        let file = SiteOverrides::from_pairs([
            ("site_url", "https://example.com"),
            ("search", "patreon"),
        ]);
        let cli = SiteOverrides::from_pairs([("search", "")]);

        let config = SiteConfig::resolve("blog", &file, &cli).unwrap();
        assert_eq!(config.search_term, "");
    }

    #[test]
    fn test_default_output_differs_per_site() {
        let alpha = SiteConfig::defaults("alpha");
        let beta = SiteConfig::defaults("beta");
        assert_ne!(alpha.output_path, beta.output_path);
        assert_eq!(
            SiteConfig::defaults(DEFAULT_SITE).output_path.file_name(),
            Some(std::ffi::OsStr::new(DEFAULT_OUTPUT_FILE))
        );
    }

    #[test]
    fn test_output_directory_gets_site_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let cli = SiteOverrides::from_pairs([
            ("site_url", "https://example.com"),
            ("feed_output", dir.path().to_str().unwrap()),
        ]);

        let novel = SiteConfig::resolve("novel", &SiteOverrides::new(), &cli).unwrap();
        assert_eq!(novel.output_path, dir.path().join("wordpress-api-feed-novel.xml"));

        let default = SiteConfig::resolve(DEFAULT_SITE, &SiteOverrides::new(), &cli).unwrap();
        assert_eq!(default.output_path, dir.path().join(DEFAULT_OUTPUT_FILE));
    }

    #[test]
    fn test_set_application_password_flag() {
        let mut layer = SiteOverrides::new();
        assert!(layer.set(ConfigKey::ApplicationPassword, "yes"));
        assert!(!layer.set(ConfigKey::ApplicationPassword, "sometimes"));
        assert_eq!(layer.application_password, Some(true));

        let file = SiteOverrides::from_pairs([
            ("site_url", "https://example.com"),
            ("application_password", "true"),
        ]);
        let config = SiteConfig::resolve("blog", &file, &SiteOverrides::new()).unwrap();
        assert!(config.application_password);
        assert!(!SiteConfig::defaults("blog").application_password);
    }

    #[test]
    fn test_set_feed_type() {
        let mut layer = SiteOverrides::new();
        assert!(layer.set(ConfigKey::FeedType, "Atom"));
        assert!(!layer.set(ConfigKey::FeedType, "json"));
        assert_eq!(layer.feed_type, Some(FeedType::Atom));
    }

    #[test]
    fn test_resolve_precedence() {
        let file = SiteOverrides::from_pairs([
            ("site_url", "https://file.example.com"),
            ("max_pages", "50"),
            ("search", "patreon"),
        ]);
        let cli = SiteOverrides::from_pairs([("max_pages", "5"), ("per_page", "10")]);

        let config = SiteConfig::resolve("blog", &file, &cli).unwrap();
        assert_eq!(config.site_url, "https://file.example.com");
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.search_term, "patreon");
        assert_eq!(config.max_item_age_days, 15);
        assert_eq!(config.api_path, "wp-json/wp/v2/pages");
    }

    #[test]
    fn test_resolve_invalid_cli_value_keeps_file_value() {
        let file = SiteOverrides::from_pairs([
            ("site_url", "https://example.com"),
            ("max_pages", "50"),
        ]);
        let cli = SiteOverrides::from_pairs([("max_pages", "abc")]);

        let config = SiteConfig::resolve("blog", &file, &cli).unwrap();
        assert_eq!(config.max_pages, 50);
    }

    #[test]
    fn test_resolve_requires_site_url() {
        let result = SiteConfig::resolve("blog", &SiteOverrides::new(), &SiteOverrides::new());
        assert!(matches!(result, Err(AppError::ConfigError(msg)) if msg.contains("blog")));
    }

    #[test]
    fn test_resolve_rejects_bad_url() {
        let cli = SiteOverrides::from_pairs([("site_url", "ftp://example.com")]);
        let result = SiteConfig::resolve("default", &SiteOverrides::new(), &cli);
        assert!(matches!(result, Err(AppError::InvalidSiteUrl(_))));
    }

    #[test]
    fn test_resolve_rejects_zero_page_size() {
        let cli = SiteOverrides::from_pairs([("site_url", "https://example.com"), ("per_page", "0")]);
        let result = SiteConfig::resolve("default", &SiteOverrides::new(), &cli);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_api_and_login_urls() {
        let mut config = SiteConfig::defaults("blog");
        config.site_url = "https://example.com/".to_string();
        assert_eq!(
            config.api_url().unwrap().as_str(),
            "https://example.com/wp-json/wp/v2/pages"
        );
        config.login_path = "/wp-login.php".to_string();
        assert_eq!(
            config.login_url().unwrap().as_str(),
            "https://example.com/wp-login.php"
        );
        assert_eq!(config.host(), "example.com");
        assert_eq!(
            config.nonce_url().unwrap().as_str(),
            "https://example.com/wp-admin/admin-ajax.php?action=rest-nonce"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = SiteConfig::defaults("blog");
        config.password = "hunter2".to_string();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_load_sites_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[sites.novel]
site_url = "https://novel.example.com"
max_pages = "40"
per_page = 50
search = "patreon"

[sites.archive]
enabled = false
site_url = "https://archive.example.com"

[sites.broken]
enabled = "maybe"
site_url = "https://broken.example.com"
"#
        )
        .unwrap();

        let sites = load_sites_config(file.path()).unwrap();
        assert_eq!(sites.sites.len(), 3);

        let enabled: Vec<_> = sites.enabled_sites().map(|(name, _)| name).collect();
        assert_eq!(enabled, vec!["novel"]);

        let layer = sites.sites["novel"].overrides("novel");
        assert_eq!(layer.site_url.as_deref(), Some("https://novel.example.com"));
        assert_eq!(layer.max_pages, Some(40));
        assert_eq!(layer.page_size, Some(50));
        assert_eq!(layer.search_term.as_deref(), Some("patreon"));
    }

    #[test]
    fn test_load_sites_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let sites = load_sites_config(&dir.path().join("absent.toml")).unwrap();
        assert!(sites.sites.is_empty());
    }

    #[test]
    fn test_load_sites_config_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[sites.bad\nsite_url = ").unwrap();
        let result = load_sites_config(file.path());
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/feed.xml"), PathBuf::from("/tmp/feed.xml"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/feed.xml"), home.join("feed.xml"));
        }
    }
}
