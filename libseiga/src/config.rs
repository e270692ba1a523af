use crate::errors::ScrapeError;
use crate::session::SessionContext;
use std::fmt::Formatter;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://seiga.nicovideo.jp";
pub const DEFAULT_IMAGE_HOST: &str = "https://lohas.nicoseiga.jp";
pub const DEFAULT_STORAGE_ROOT: &str = "storage/images";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Listing order requested from the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    ByViews,
    ByCreatedDate,
}

impl SortKey {
    /// Value of the `sort` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            SortKey::ByViews => "image_view",
            SortKey::ByCreatedDate => "image_created",
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_query())
    }
}

impl FromStr for SortKey {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image_view" => Ok(SortKey::ByViews),
            "image_created" => Ok(SortKey::ByCreatedDate),
            other => Err(ScrapeError::Config(format!(
                "unknown sort \"{other}\", accepted values are \"image_view\" and \"image_created\""
            ))),
        }
    }
}

/// `1 <= start_page <= end_page`, enforced by [`PageRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start_page: u32,
    end_page: u32,
    sort: SortKey,
}

impl PageRange {
    /// A start page of 0 is raised to 1. An end page before the start page is rejected.
    pub fn new(start_page: u32, end_page: u32, sort: SortKey) -> Result<Self, ScrapeError> {
        let start_page = start_page.max(1);
        if end_page < start_page {
            return Err(ScrapeError::Config(format!(
                "end page {end_page} is before start page {start_page}"
            )));
        }
        Ok(Self {
            start_page,
            end_page,
            sort,
        })
    }

    pub fn start_page(&self) -> u32 {
        self.start_page
    }

    pub fn end_page(&self) -> u32 {
        self.end_page
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    /// Pages left in the range after `page`.
    pub fn remaining_after(&self, page: u32) -> u32 {
        self.end_page.saturating_sub(page)
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self {
            start_page: 1,
            end_page: 1,
            sort: SortKey::default(),
        }
    }
}

/// Raw run options, as handed over by a front end.
#[derive(Clone)]
pub struct ScrapeOptions {
    pub user_id: Option<String>,
    pub start_page: u32,
    pub end_page: u32,
    pub sort: SortKey,
    pub session_token: Option<String>,
    pub cookie_domain: String,
    pub storage_root: PathBuf,
    pub base_url: String,
    pub image_host: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            user_id: None,
            start_page: 1,
            end_page: 1,
            sort: SortKey::default(),
            session_token: None,
            cookie_domain: crate::session::DEFAULT_COOKIE_DOMAIN.to_string(),
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_host: DEFAULT_IMAGE_HOST.to_string(),
            timeout: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl std::fmt::Debug for ScrapeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeOptions")
            .field("user_id", &self.user_id)
            .field("start_page", &self.start_page)
            .field("end_page", &self.end_page)
            .field("sort", &self.sort)
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("cookie_domain", &self.cookie_domain)
            .field("storage_root", &self.storage_root)
            .field("base_url", &self.base_url)
            .field("image_host", &self.image_host)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub user_id: String,
    pub range: PageRange,
    pub session: SessionContext,
    pub storage_root: PathBuf,
    pub base_url: Url,
    pub image_host: Url,
    pub timeout: Duration,
}

impl ScrapeOptions {
    pub fn validate(self) -> Result<ScrapeConfig, ScrapeError> {
        let user_id = match self.user_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(ScrapeError::Config("option \"id\" is required".into())),
        };
        if !user_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ScrapeError::Config(format!(
                "user id must be numeric, got \"{user_id}\""
            )));
        }

        let token = match self.session_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                return Err(ScrapeError::Config(
                    "a session token is required, pass --session or set SEIGA_SESSION".into(),
                ))
            }
        };

        let range = PageRange::new(self.start_page, self.end_page, self.sort)?;
        let base_url = parse_http_url("base url", &self.base_url)?;
        let image_host = parse_http_url("image host", &self.image_host)?;
        if self.timeout == 0 {
            return Err(ScrapeError::Config("timeout must be at least 1 second".into()));
        }

        let session = SessionContext::new(token).with_cookie_domain(self.cookie_domain);
        session.cookie_jar(&base_url)?;

        Ok(ScrapeConfig {
            user_id,
            range,
            session,
            storage_root: self.storage_root,
            base_url,
            image_host,
            timeout: Duration::from_secs(self.timeout),
        })
    }
}

fn parse_http_url(what: &str, raw: &str) -> Result<Url, ScrapeError> {
    let url = Url::parse(raw)
        .map_err(|e| ScrapeError::Config(format!("invalid {what} \"{raw}\". {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ScrapeError::Config(format!(
            "{what} must be an http(s) url, got \"{raw}\""
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ScrapeOptions {
        ScrapeOptions {
            user_id: Some("42610806".into()),
            session_token: Some("user_session_abc".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_validate() {
        let config = options().validate().unwrap();
        assert_eq!(config.user_id, "42610806");
        assert_eq!(config.range, PageRange::default());
        assert_eq!(config.range.sort().as_query(), "image_view");
        assert_eq!(config.base_url.as_str(), "http://seiga.nicovideo.jp/");
        assert_eq!(config.session.cookie_domain, ".nicovideo.jp");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_id_is_config_error() {
        let mut opts = options();
        opts.user_id = None;
        assert_eq!(opts.validate().unwrap_err().kind(), "ConfigError");

        let mut opts = options();
        opts.user_id = Some("   ".into());
        assert_eq!(opts.validate().unwrap_err().kind(), "ConfigError");
    }

    #[test]
    fn non_numeric_id_is_config_error() {
        let mut opts = options();
        opts.user_id = Some("42/../1".into());
        assert!(matches!(opts.validate(), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn missing_session_is_config_error() {
        let mut opts = options();
        opts.session_token = None;
        assert!(matches!(opts.validate(), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn page_range_is_clamped_and_checked() {
        let range = PageRange::new(0, 3, SortKey::ByCreatedDate).unwrap();
        assert_eq!(range.start_page(), 1);
        assert_eq!(range.end_page(), 3);
        assert_eq!(range.remaining_after(1), 2);
        assert_eq!(range.remaining_after(3), 0);
        assert!(PageRange::new(4, 2, SortKey::ByViews).is_err());
    }

    #[test]
    fn remaining_never_underflows() {
        let range = PageRange::new(2, 3, SortKey::ByViews).unwrap();
        assert_eq!(range.remaining_after(7), 0);
    }

    #[test]
    fn cookie_domain_must_cover_base_url() {
        let mut opts = options();
        opts.cookie_domain = ".example.com".into();
        assert!(matches!(opts.validate(), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn sort_key_parses_query_values() {
        assert_eq!("image_view".parse::<SortKey>().unwrap(), SortKey::ByViews);
        assert_eq!(
            "image_created".parse::<SortKey>().unwrap(),
            SortKey::ByCreatedDate
        );
        assert!("newest".parse::<SortKey>().is_err());
    }

    #[test]
    fn non_http_hosts_are_rejected() {
        let mut opts = options();
        opts.image_host = "ftp://lohas.nicoseiga.jp".into();
        assert!(matches!(opts.validate(), Err(ScrapeError::Config(_))));
    }
}
