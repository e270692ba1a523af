use crate::errors::ScrapeError;
use crate::session::Document;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::Selector;
use tracing::{event, instrument, Level};
use url::{ParseError, Url};

lazy_static! {
    static ref LISTING_ANCHOR: Selector = Selector::parse(".list_item.no_trim a").unwrap();
    static ref BIG_ILLUST_VIEW: Selector = Selector::parse(".illust_view_big").unwrap();
    static ref ITEM_PATH: Regex = Regex::new(r"^/seiga/im(?P<id>[0-9]+)$").unwrap();
}

#[instrument]
/// Get the full link to a page or file, given the url it was found relative to.
fn get_full_link(link: &str, base_url: &Url) -> Option<Url> {
    if link.is_empty() {
        return None;
    }
    match Url::parse(link) {
        Ok(url) => Some(url),
        Err(e)
            if e == ParseError::EmptyHost
                || e == ParseError::RelativeUrlWithoutBase
                || e == ParseError::RelativeUrlWithCannotBeABaseBase =>
        {
            base_url.join(link).ok()
        }
        Err(e) => {
            event!(Level::ERROR, "Failed to get full link for {}", link);
            event!(Level::ERROR, "{}", e);
            None
        }
    }
}

/// Gets the item ids linked from a listing page, in document order.
///
/// Every anchor inside a `.list_item.no_trim` entry produces one element.
/// Anchors whose href, resolved against the page url, is not
/// `http(s)://<listing host>/seiga/im<digits>` come back as
/// [`ScrapeError::MalformedLink`] in their position, so callers can count them
/// without losing the valid ones around them.
pub fn extract_listing_links(doc: &Document) -> Vec<Result<String, ScrapeError>> {
    let html = doc.html();
    html.select(&LISTING_ANCHOR)
        .map(|element| {
            let href = element.value().attr("href").unwrap_or("");
            item_id_from_href(href, doc.url())
        })
        .collect()
}

fn item_id_from_href(href: &str, page_url: &Url) -> Result<String, ScrapeError> {
    let malformed = || ScrapeError::MalformedLink(href.to_string());
    let link = get_full_link(href.trim(), page_url).ok_or_else(malformed)?;
    if !matches!(link.scheme(), "http" | "https")
        || link.host_str() != page_url.host_str()
        || link.query().is_some()
        || link.fragment().is_some()
    {
        return Err(malformed());
    }
    ITEM_PATH
        .captures(link.path())
        .map(|captures| captures["id"].to_string())
        .ok_or_else(malformed)
}

/// Reads the `data-src` of the first big illustration view on a detail page.
pub fn extract_resource_uri(doc: &Document) -> Result<String, ScrapeError> {
    let uri = doc
        .html()
        .select(&BIG_ILLUST_VIEW)
        .next()
        .and_then(|element| element.value().attr("data-src"))
        .map(|src| src.trim().to_string())
        .unwrap_or_default();
    if uri.is_empty() {
        return Err(ScrapeError::MissingResource(doc.url().to_string()));
    }
    tracing::debug!("Resource uri for {} => {}", doc.url(), uri);
    Ok(uri)
}

/// Resolves an extracted resource uri against the image host.
pub fn resolve_resource_url(image_host: &Url, uri: &str) -> Result<Url, ScrapeError> {
    get_full_link(uri, image_host).ok_or_else(|| ScrapeError::MissingResource(uri.to_string()))
}
