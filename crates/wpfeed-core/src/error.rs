use thiserror::Error;

/// Application-wide error types.
///
/// Every fallible operation in the wpfeed crates returns this enum. The
/// variants fall in three groups:
///
/// - **Fatal for one site**: `ConfigError`, `InvalidSiteUrl`, `AuthFailed`
///   and `PersistenceFailed` end that site's run early. Other sites in a
///   multi-site run still execute.
/// - **Recovered locally**: `PageFetchFailed` and `ItemDecodeFailed` are
///   recorded in the sync report while the walk continues. `ParseError` on the
///   existing feed degrades to an empty snapshot.
/// - **Transport**: `ClientError`, `NetworkError`, `Timeout` and
///   `RateLimitExceeded` are produced by the HTTP layer and drive its retry
///   loop before being folded into `PageFetchFailed`.
///
/// # Examples
///
/// ```
/// use wpfeed_core::error::AppError;
///
/// let err = AppError::PageFetchFailed { page: 2, cause: "HTTP 502".to_string() };
/// assert!(!err.is_fatal());
/// assert_eq!(err.to_string(), "Failed to fetch page 2: HTTP 502");
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration is missing a required value or holds an invalid one.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The configured site URL cannot be used to build API endpoints.
    #[error("Invalid site URL: {0}")]
    InvalidSiteUrl(String),

    /// The login/session capability could not establish a session.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// One page of the remote API could not be retrieved.
    #[error("Failed to fetch page {page}: {cause}")]
    PageFetchFailed { page: u32, cause: String },

    /// One raw record could not be turned into a feed item.
    #[error("Failed to decode item {id}: {cause}")]
    ItemDecodeFailed { id: String, cause: String },

    /// The previously written feed file could not be parsed.
    #[error("Feed parse error: {0}")]
    ParseError(String),

    /// Writing the feed file failed. The previous file is left untouched.
    #[error("Failed to persist feed: {0}")]
    PersistenceFailed(String),

    /// HTTP client request failed.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check the site section of your config file or the --options list.",
                    msg
                )
            }
            AppError::InvalidSiteUrl(url) => {
                format!(
                    "Invalid site URL: {}\n   Example: --site https://wordpress.org",
                    url
                )
            }
            AppError::AuthFailed(msg) => {
                format!(
                    "Login failed: {}\n   Check the username and password for this site.",
                    msg
                )
            }
            AppError::PersistenceFailed(msg) => {
                format!(
                    "Could not write the feed file: {}\n   The previous feed file was left untouched.",
                    msg
                )
            }
            AppError::ClientError(msg) => {
                if msg.contains("timeout") || msg.contains("timed out") {
                    "Request timed out. The site may be slow or unreachable.".to_string()
                } else if msg.contains("connect") {
                    format!(
                        "Cannot connect to site: {}\n   Check your internet connection and the site URL.",
                        msg
                    )
                } else {
                    format!("API error: {}", msg)
                }
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The server may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use wpfeed_core::error::AppError;
    ///
    /// assert!(AppError::NetworkError("connection reset".to_string()).is_retryable());
    /// assert!(AppError::RateLimitExceeded.is_retryable());
    /// assert!(!AppError::ConfigError("missing site_url".to_string()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded
        )
    }

    /// Returns true if this error ends a site's run instead of being recorded
    /// and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::ConfigError(_)
                | AppError::InvalidSiteUrl(_)
                | AppError::AuthFailed(_)
                | AppError::PersistenceFailed(_)
        )
    }
}
