use crate::errors::ScrapeError;
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{header, Client, Response};
use scraper::Html;
use std::fmt::Formatter;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_COOKIE_NAME: &str = "user_session";
pub const DEFAULT_COOKIE_DOMAIN: &str = ".nicovideo.jp";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

/// Authentication state for a run. Created once and never mutated.
#[derive(Clone, PartialEq)]
pub struct SessionContext {
    pub cookie_name: String,
    pub auth_token: String,
    /// Domain the cookie is scoped to, e.g. `.nicovideo.jp`. Empty means a
    /// host-only cookie for the gallery host.
    pub cookie_domain: String,
}

impl SessionContext {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            auth_token: auth_token.into(),
            cookie_domain: DEFAULT_COOKIE_DOMAIN.to_string(),
        }
    }

    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = domain.into();
        self
    }

    /// Seeds a cookie jar with the session cookie, set as if `origin` had sent it.
    ///
    /// Cookies the server sends back later land in the same jar, so a rotated
    /// session replaces this one for the rest of the run.
    pub fn cookie_jar(&self, origin: &Url) -> Result<Arc<Jar>, ScrapeError> {
        let mut cookie = format!("{}={}; Path=/", self.cookie_name, self.auth_token);
        if !self.cookie_domain.is_empty() {
            cookie.push_str(&format!("; Domain={}", self.cookie_domain));
        }
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str(&cookie, origin);
        if jar.cookies(origin).is_none() {
            return Err(ScrapeError::Config(format!(
                "session cookie for domain \"{}\" would never be sent to {}",
                self.cookie_domain, origin
            )));
        }
        Ok(jar)
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("cookie_name", &self.cookie_name)
            .field("auth_token", &"[REDACTED]")
            .field("cookie_domain", &self.cookie_domain)
            .finish()
    }
}

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct Document {
    url: Url,
    body: String,
}

impl Document {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Parses the body. Every call produces a fresh tree.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// A fetched binary body.
#[derive(Debug, Clone)]
pub struct Resource {
    pub url: Url,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// The only way the pipeline talks to the network.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn authenticated_get(&self, url: &Url) -> Result<Document, ScrapeError>;

    async fn fetch_resource(&self, url: &Url) -> Result<Resource, ScrapeError>;
}

#[derive(Debug)]
pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    /// `origin` is the gallery url the session cookie is attached to.
    pub fn new(
        context: &SessionContext,
        origin: &Url,
        timeout: Duration,
    ) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .cookie_provider(context.cookie_jar(origin)?)
            .build()
            .map_err(|e| ScrapeError::Config(format!("error building http client. {e}")))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &Url) -> Result<Response, ScrapeError> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Error requesting {}\nError : {}", url, e);
                return Err(fetch_error(url, e.to_string()));
            }
        };
        if !response.status().is_success() {
            tracing::error!("Error status code received : {} |{}|", response.status(), url);
            return Err(fetch_error(url, format!("status {}", response.status())));
        }
        Ok(response)
    }
}

#[async_trait]
impl SessionClient for HttpSession {
    #[tracing::instrument(skip(self))]
    async fn authenticated_get(&self, url: &Url) -> Result<Document, ScrapeError> {
        let response = self.get(url).await?;
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?;
        tracing::debug!("Fetched {} bytes of html from {}", body.len(), final_url);
        Ok(Document::new(final_url, body))
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_resource(&self, url: &Url) -> Result<Resource, ScrapeError> {
        let response = self.get(url).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?;
        tracing::debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(Resource {
            url: url.clone(),
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

fn fetch_error(url: &Url, cause: String) -> ScrapeError {
    ScrapeError::Fetch {
        url: url.to_string(),
        cause,
    }
}
