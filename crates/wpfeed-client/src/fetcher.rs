use crate::session::{SessionProvider, WordPressSession};
use crate::wordpress::decode_records;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::time::sleep;
use tracing::{debug, warn};
use wpfeed_core::config::{HttpConfig, SiteConfig};
use wpfeed_core::error::AppError;
use wpfeed_core::models::{Cursor, Page};
use wpfeed_core::traits::PageSource;

/// Header WordPress uses to report the number of pages in a listing.
const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// Error code WordPress returns for a page past the end of a listing.
const INVALID_PAGE_CODE: &str = "rest_post_invalid_page_number";

/// HTTP page fetcher for one site's WordPress REST listing.
///
/// The login session is established lazily, once, before the first page
/// request. Cookies set by the login stay in the client for later requests.
///
/// # Examples
///
/// ```no_run
/// use wpfeed_client::PageFetcher;
/// use wpfeed_core::{Cursor, HttpConfig, PageSource, SiteConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut site = SiteConfig::defaults("blog");
/// site.site_url = "https://wordpress.org".to_string();
///
/// let fetcher = PageFetcher::for_site(&site, HttpConfig::default())?;
/// let page = fetcher.fetch(&Cursor::new(site.page_size, site.max_pages)).await?;
/// println!("{} items, more: {}", page.items.len(), page.has_more);
/// # Ok(())
/// # }
/// ```
pub struct PageFetcher {
    client: Client,
    endpoint: Url,
    session: Arc<dyn SessionProvider>,
    http: HttpConfig,
    established: OnceCell<()>,
}

impl PageFetcher {
    /// Creates a fetcher for the listing at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(
        endpoint: Url,
        session: Arc<dyn SessionProvider>,
        http: HttpConfig,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("wpfeed/", env!("CARGO_PKG_VERSION")))
            .timeout(http.timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            session,
            http,
            established: OnceCell::new(),
        })
    }

    /// Creates a fetcher for `{site_url}/{api_path}`, logging in when the site
    /// has a username.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidSiteUrl` if the API or login URL cannot be
    /// built, or `AppError::ClientError` if the HTTP client cannot be built.
    pub fn for_site(site: &SiteConfig, http: HttpConfig) -> Result<Self, AppError> {
        Self::new(site.api_url()?, WordPressSession::for_site(site)?, http)
    }

    /// `{endpoint}?per_page={page_size}&page={page}`.
    pub fn page_url(&self, cursor: &Cursor) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("per_page", &cursor.page_size.to_string())
            .append_pair("page", &cursor.page.to_string());
        url
    }

    async fn ensure_session(&self) -> Result<(), AppError> {
        self.established
            .get_or_try_init(|| self.session.establish(&self.client))
            .await
            .map(|_| ())
    }

    /// Makes an HTTP GET request with automatic retry on transient failures.
    ///
    /// Implements backoff for retries on:
    /// - Network errors
    /// - Timeouts
    /// - Server errors (5xx)
    /// - Rate limiting (429)
    ///
    /// 404 and 400 responses are returned as-is: WordPress uses both to mark
    /// the end of a listing.
    async fn request_with_retry(&self, url: &Url) -> Result<reqwest::Response, AppError> {
        let max_retries = self.http.max_retries.max(1);
        let base_delay = self.http.retry_base_delay;
        let mut last_error = None;

        for attempt in 1..=max_retries {
            let request = self.session.authorize(self.client.get(url.clone()));
            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success()
                        || status == StatusCode::NOT_FOUND
                        || status == StatusCode::BAD_REQUEST
                    {
                        return Ok(resp);
                    }

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(AppError::AuthFailed(format!(
                            "HTTP {} from {}",
                            status.as_u16(),
                            url
                        )));
                    }

                    // Rate limited - retry with backoff
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(AppError::RateLimitExceeded);
                        if attempt < max_retries {
                            sleep(base_delay * 2_u32.pow(attempt)).await;
                            continue;
                        }
                        break;
                    }

                    // Server error - retry
                    if status.is_server_error() {
                        last_error = Some(AppError::ClientError(format!(
                            "Server error: HTTP {}",
                            status.as_u16()
                        )));
                        if attempt < max_retries {
                            sleep(base_delay * attempt).await;
                            continue;
                        }
                        break;
                    }

                    // Other client errors - don't retry
                    return Err(AppError::ClientError(format!(
                        "HTTP {} from {}",
                        status.as_u16(),
                        url
                    )));
                }
                Err(e) => {
                    // Network/timeout errors - retry
                    if e.is_timeout() {
                        last_error = Some(AppError::Timeout(self.http.timeout.as_secs()));
                    } else if e.is_connect() {
                        last_error =
                            Some(AppError::NetworkError(format!("Connection failed: {}", e)));
                    } else {
                        last_error = Some(AppError::ClientError(e.to_string()));
                    }

                    if attempt < max_retries && (e.is_timeout() || e.is_connect()) {
                        debug!(attempt, error = %e, "Retrying request");
                        sleep(base_delay * attempt).await;
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::ClientError(format!("no request sent to {}", url))))
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn prepare(&self) -> Result<(), AppError> {
        self.ensure_session().await
    }

    async fn fetch(&self, cursor: &Cursor) -> Result<Page, AppError> {
        self.ensure_session().await?;

        let page = cursor.page;
        let url = self.page_url(cursor);
        debug!(page, url = %url, "Fetching page");

        let page_failed = |cause: String| AppError::PageFetchFailed { page, cause };

        let resp = self.request_with_retry(&url).await.map_err(|e| {
            if e.is_fatal() {
                e
            } else {
                page_failed(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!(page, "Listing ended with HTTP 404");
            return Ok(Page::exhausted());
        }
        if status == StatusCode::BAD_REQUEST {
            let body = resp.text().await.unwrap_or_default();
            if body.contains(INVALID_PAGE_CODE) {
                debug!(page, "Listing ended with {}", INVALID_PAGE_CODE);
                return Ok(Page::exhausted());
            }
            return Err(page_failed(format!("HTTP 400: {}", body.trim())));
        }

        let total_pages = resp
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());

        let records: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| page_failed(format!("response is not a JSON list: {}", e)))?;

        if records.is_empty() {
            debug!(page, "Listing ended with an empty page");
            return Ok(Page::exhausted());
        }

        let (items, rejected) = decode_records(records);
        if !rejected.is_empty() {
            warn!(page, rejected = rejected.len(), "Page had records that could not be decoded");
        }

        Ok(Page {
            items,
            rejected,
            has_more: total_pages.is_none_or(|total| page < total),
        })
    }
}
