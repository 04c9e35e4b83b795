use tracing::{info, warn};
use url::Url;

use crate::dom::{self, RenderedPage};
use crate::error::{Result, ScrapeError};
use crate::session::{self, PageSession};
use crate::settings::Selectors;

/// Load the catalog listing and return product page URLs in listing order.
/// An empty listing is `Ok(vec![])`; anything that stops the listing from
/// being read is `DiscoveryFailed`.
pub async fn discover<S: PageSession + ?Sized>(
    session: &mut S,
    catalog_url: &Url,
    base: &Url,
    selectors: &Selectors,
) -> Result<Vec<Url>> {
    info!("Loading catalog: {}", catalog_url);
    session
        .goto(catalog_url)
        .await
        .map_err(|e| ScrapeError::DiscoveryFailed(e.to_string()))?;

    // The container must render; a rendered listing without anchors is empty.
    session
        .wait_for_selector(&selectors.listing)
        .await
        .map_err(|e| ScrapeError::DiscoveryFailed(e.to_string()))?;

    let page = session
        .snapshot()
        .map_err(|e| ScrapeError::DiscoveryFailed(e.to_string()))?;
    let urls = product_links(&page, base, selectors)
        .map_err(|e| ScrapeError::DiscoveryFailed(e.to_string()))?;

    info!("Products found in catalog: {}", urls.len());
    Ok(urls)
}

/// Resolve the anchor of every listing entry. Entries without a usable
/// anchor are skipped.
pub fn product_links(page: &RenderedPage, base: &Url, selectors: &Selectors) -> Result<Vec<Url>> {
    let link = dom::selector(&selectors.product_link)?;

    let urls = page
        .locate_all(&selectors.listing)?
        .into_iter()
        .filter_map(|entry| {
            let href = entry
                .select(&link)
                .next()
                .and_then(|a| dom::attribute(a, "href"))
                .filter(|h| !h.trim().is_empty())?;
            match session::resolve(base, href) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Skipping product link {:?}: {}", href, e);
                    None
                }
            }
        })
        .collect();
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::FakeSession;

    const CATALOG: &str = "https://www.baldor.com/catalog/#category=69";

    fn base() -> Url {
        Url::parse("https://www.baldor.com").unwrap()
    }

    fn catalog_html() -> String {
        std::fs::read_to_string("tests/fixtures/catalog.html").unwrap()
    }

    #[tokio::test]
    async fn resolves_links_in_listing_order() {
        let mut session = FakeSession::default().with_page(CATALOG, &catalog_html());
        let urls = discover(&mut session, &Url::parse(CATALOG).unwrap(), &base(), &Selectors::default())
            .await
            .unwrap();

        let urls: Vec<_> = urls.iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            [
                "https://www.baldor.com/catalog/EM3546T",
                "https://www.baldor.com/catalog/M3546",
                "https://www.baldor.com/catalog/CEM3546T?ref=list",
            ]
        );
    }

    #[tokio::test]
    async fn listing_without_anchors_is_empty() {
        let html = r#"<div class="overview"><h3>Discontinued</h3></div>
            <div class="overview"><h3><a>No link</a></h3></div>"#;
        let mut session = FakeSession::default().with_page(CATALOG, html);
        let urls = discover(&mut session, &Url::parse(CATALOG).unwrap(), &base(), &Selectors::default())
            .await
            .unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn unrendered_listing_is_discovery_failed() {
        let shell = r#"<html><body><div id="app"></div><script src="app.js"></script></body></html>"#;
        let mut session = FakeSession::default().with_page(CATALOG, shell);
        let err = discover(&mut session, &Url::parse(CATALOG).unwrap(), &base(), &Selectors::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::DiscoveryFailed(_)));
    }

    #[tokio::test]
    async fn unreachable_catalog_is_discovery_failed() {
        let mut session = FakeSession::default();
        let err = discover(&mut session, &Url::parse(CATALOG).unwrap(), &base(), &Selectors::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::DiscoveryFailed(_)));
    }

    #[tokio::test]
    async fn bad_selector_is_discovery_failed() {
        let mut session = FakeSession::default().with_page(CATALOG, &catalog_html());
        let selectors = Selectors {
            product_link: "h3 a[".into(),
            ..Selectors::default()
        };
        let err = discover(&mut session, &Url::parse(CATALOG).unwrap(), &base(), &selectors)
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::DiscoveryFailed(_)));
    }
}
