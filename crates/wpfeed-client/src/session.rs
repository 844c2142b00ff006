//! Login capabilities injected into the page fetcher.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use wpfeed_core::config::SiteConfig;
use wpfeed_core::error::AppError;

/// Establishes and applies a session for API requests.
///
/// The fetcher calls [`establish`](SessionProvider::establish) once before the
/// first page and passes every API request through
/// [`authorize`](SessionProvider::authorize).
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Logs in using the fetcher's client, so that cookies set here are sent
    /// with later requests.
    async fn establish(&self, client: &Client) -> Result<(), AppError>;

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder;
}

/// No credentials: public content only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

#[async_trait]
impl SessionProvider for Anonymous {
    async fn establish(&self, _client: &Client) -> Result<(), AppError> {
        Ok(())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
    }
}

/// HTTP Basic credentials for sites configured with a WordPress application
/// password. No login request is made.
pub struct ApplicationPassword {
    username: String,
    password: String,
}

impl ApplicationPassword {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for ApplicationPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationPassword")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionProvider for ApplicationPassword {
    async fn establish(&self, _client: &Client) -> Result<(), AppError> {
        Ok(())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

/// Cookie login through `wp-login.php`.
///
/// The REST API ignores login cookies unless the request also carries an
/// `X-WP-Nonce`, so a nonce is fetched from `admin-ajax.php` right after the
/// login and sent with every API request.
pub struct WordPressSession {
    login_url: Url,
    nonce_url: Url,
    username: String,
    password: String,
    nonce: OnceLock<String>,
}

impl WordPressSession {
    pub fn new(
        login_url: Url,
        nonce_url: Url,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            login_url,
            nonce_url,
            username: username.into(),
            password: password.into(),
            nonce: OnceLock::new(),
        }
    }

    /// Picks the session a site needs: [`Anonymous`] without a username,
    /// [`ApplicationPassword`] when the site says so, a cookie login otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidSiteUrl` if the login or nonce URL cannot be
    /// built.
    pub fn for_site(site: &SiteConfig) -> Result<Arc<dyn SessionProvider>, AppError> {
        if !site.has_credentials() {
            return Ok(Arc::new(Anonymous));
        }
        if site.application_password {
            return Ok(Arc::new(ApplicationPassword::new(
                site.username.clone(),
                site.password.clone(),
            )));
        }
        Ok(Arc::new(Self::new(
            site.login_url()?,
            site.nonce_url()?,
            site.username.clone(),
            site.password.clone(),
        )))
    }

    async fn fetch_nonce(&self, client: &Client) -> Option<String> {
        let resp = match client.get(self.nonce_url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = %self.nonce_url, error = %e, "REST nonce request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!(url = %self.nonce_url, status = resp.status().as_u16(), "No REST nonce");
            return None;
        }
        let nonce = resp.text().await.ok()?.trim().to_string();
        // admin-ajax answers "0" when the action is unknown or the user is not logged in.
        if nonce.is_empty() || nonce == "0" {
            warn!(url = %self.nonce_url, "No REST nonce, private content will be missing");
            return None;
        }
        Some(nonce)
    }
}

impl std::fmt::Debug for WordPressSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPressSession")
            .field("login_url", &self.login_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionProvider for WordPressSession {
    async fn establish(&self, client: &Client) -> Result<(), AppError> {
        let failed = |e: reqwest::Error| AppError::AuthFailed(format!("login request failed: {}", e));

        // WordPress refuses logins that arrive without its test cookie.
        client
            .get(self.login_url.clone())
            .send()
            .await
            .map_err(failed)?;
        debug!(url = %self.login_url, "Fetched login form");

        let resp = client
            .post(self.login_url.clone())
            .form(&[
                ("log", self.username.as_str()),
                ("pwd", self.password.as_str()),
                ("rememberme", "forever"),
                ("wp-submit", "Log In"),
                ("testcookie", "1"),
            ])
            .send()
            .await
            .map_err(failed)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::AuthFailed(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.login_url
            )));
        }

        let body = resp.text().await.map_err(failed)?;
        if body.contains("login_error") {
            return Err(AppError::AuthFailed(format!(
                "{} rejected the credentials for user '{}'",
                self.login_url, self.username
            )));
        }
        info!(user = %self.username, "Logged in");

        if let Some(nonce) = self.fetch_nonce(client).await {
            debug!("Fetched REST nonce");
            let _ = self.nonce.set(nonce);
        }
        Ok(())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.nonce.get() {
            Some(nonce) => request.header("X-WP-Nonce", nonce),
            None => request,
        }
    }
}
