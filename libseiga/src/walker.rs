use crate::config::PageRange;
use crate::errors::ScrapeError;
use crate::extract::extract_listing_links;
use crate::session::SessionClient;
use crate::tally::ItemRef;
use url::Url;

/// What one listing page produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PageListing {
    pub page: u32,
    /// Pages left in the range after this one
    pub remaining: u32,
    pub items: Vec<ItemRef>,
    /// Anchors that did not point to an item page
    pub malformed: usize,
    /// Set when the listing itself could not be fetched
    pub error: Option<ScrapeError>,
}

/// Walks `[start_page, end_page]` forward, one listing fetch per page.
pub struct PaginationWalker<'a> {
    session: &'a dyn SessionClient,
    base_url: &'a Url,
    user_id: &'a str,
    range: PageRange,
    next_page: Option<u32>,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(
        session: &'a dyn SessionClient,
        base_url: &'a Url,
        user_id: &'a str,
        range: PageRange,
    ) -> Self {
        Self {
            session,
            base_url,
            user_id,
            range,
            next_page: Some(range.start_page()),
        }
    }

    /// `baseURL/user/illust/{id}?sort={sort}&page={page}`
    pub fn listing_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/user/illust/{}", self.user_id));
        url.set_query(None);
        url.set_fragment(None);
        url.query_pairs_mut()
            .append_pair("sort", self.range.sort().as_query())
            .append_pair("page", &page.to_string());
        url
    }

    /// Page the next call to [`Self::next_page`] will fetch.
    pub fn upcoming_page(&self) -> Option<u32> {
        self.next_page
    }

    /// Fetches the next page of the range. `None` once the range is exhausted.
    pub async fn next_page(&mut self) -> Option<PageListing> {
        let page = self.next_page?;
        self.next_page = if page < self.range.end_page() {
            Some(page + 1)
        } else {
            None
        };
        Some(self.walk_page(page).await)
    }

    /// Drains the walker into the ordered item sequence, page by page.
    pub async fn collect_items(mut self) -> Vec<ItemRef> {
        let mut items = Vec::new();
        while let Some(mut listing) = self.next_page().await {
            items.append(&mut listing.items);
        }
        items
    }

    #[tracing::instrument(skip(self), fields(user_id = self.user_id))]
    async fn walk_page(&self, page: u32) -> PageListing {
        let remaining = self.range.remaining_after(page);
        let url = self.listing_url(page);
        let mut listing = PageListing {
            page,
            remaining,
            items: Vec::new(),
            malformed: 0,
            error: None,
        };

        let doc = match self.session.authenticated_get(&url).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("Listing page {} could not be fetched, skipping it\nError : {}", page, e);
                listing.error = Some(e);
                return listing;
            }
        };

        for link in extract_listing_links(&doc) {
            match link {
                Ok(id) => {
                    let rank_on_page = listing.items.len() + 1;
                    listing.items.push(ItemRef {
                        id,
                        source_page: page,
                        rank_on_page,
                    });
                }
                Err(e) => {
                    tracing::warn!("{} on page {}", e, page);
                    listing.malformed += 1;
                }
            }
        }

        if listing.items.is_empty() {
            tracing::warn!("No items found on listing page {}", url);
        } else {
            tracing::debug!("Found {} items on page {}", listing.items.len(), page);
        }
        listing
    }
}
