use std::fmt::Formatter;

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeError {
    /// Invalid or missing run configuration. Fatal before any network activity.
    Config(String),
    /// Transport failure or non-success status code.
    Fetch { url: String, cause: String },
    /// Listing anchor whose href is not an item detail link. Parameter is the href.
    MalformedLink(String),
    /// Detail page without the big illustration resource. Parameter is the page url.
    MissingResource(String),
    /// parameters are file or directory path, additional error message
    Storage { path: String, message: String },
}

impl ScrapeError {
    /// Stable name of the error kind, used when reporting a failed item.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Config(_) => "ConfigError",
            ScrapeError::Fetch { .. } => "FetchError",
            ScrapeError::MalformedLink(_) => "MalformedLinkError",
            ScrapeError::MissingResource(_) => "MissingResourceError",
            ScrapeError::Storage { .. } => "StorageError",
        }
    }
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            ScrapeError::Config(reason) => format!("invalid configuration. {reason}"),
            ScrapeError::Fetch { url, cause } => format!("error fetching {url} => {cause}"),
            ScrapeError::MalformedLink(href) => {
                format!("listing link does not point to an item page : {href}")
            }
            ScrapeError::MissingResource(url) => {
                format!("no image resource found on detail page {url}")
            }
            ScrapeError::Storage { path, message } => format!("{message} : {path}"),
        };
        write!(f, "{str}")
    }
}

impl std::error::Error for ScrapeError {}

#[cfg(test)]
mod tests {
    use super::ScrapeError;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ScrapeError::Config("x".into()).kind(), "ConfigError");
        assert_eq!(
            ScrapeError::Fetch {
                url: "u".into(),
                cause: "c".into()
            }
            .kind(),
            "FetchError"
        );
        assert_eq!(ScrapeError::MalformedLink("h".into()).kind(), "MalformedLinkError");
        assert_eq!(
            ScrapeError::MissingResource("u".into()).kind(),
            "MissingResourceError"
        );
        assert_eq!(
            ScrapeError::Storage {
                path: "p".into(),
                message: "m".into()
            }
            .kind(),
            "StorageError"
        );
    }

    #[test]
    fn display_includes_url_and_cause() {
        let err = ScrapeError::Fetch {
            url: "http://seiga.nicovideo.jp/image/source/1".into(),
            cause: "status 503 Service Unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "error fetching http://seiga.nicovideo.jp/image/source/1 => status 503 Service Unavailable"
        );
    }
}
