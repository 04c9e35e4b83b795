//! Page session boundary. The pipeline owns exactly one session and
//! borrows it mutably for every navigation.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::dom::RenderedPage;
use crate::error::{Result, ScrapeError};
use crate::settings::Settings;

#[async_trait]
pub trait PageSession: Send {
    /// Navigate and wait until the page is idle.
    async fn goto(&mut self, url: &Url) -> Result<()>;

    /// Wait until `css` matches something in the current document.
    async fn wait_for_selector(&mut self, css: &str) -> Result<()>;

    fn current_url(&self) -> Option<&Url>;

    /// Rendered HTML of the current document.
    fn content(&self) -> Option<&str>;

    /// Parse the current document for locate/read queries.
    fn snapshot(&self) -> Result<RenderedPage> {
        match (self.current_url(), self.content()) {
            (Some(url), Some(html)) => Ok(RenderedPage::parse(url.clone(), html)),
            _ => Err(ScrapeError::Navigation {
                url: String::new(),
                reason: "no page loaded".into(),
            }),
        }
    }
}

/// Session that loads documents over plain HTTP. It does not run
/// client-side scripts, so it sees what the server sends.
pub struct HttpSession {
    client: reqwest::Client,
    current: Option<(Url, String)>,
}

impl HttpSession {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.navigation_timeout_secs))
            .build()
            .map_err(|e| ScrapeError::Navigation {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            current: None,
        })
    }

    async fn load(&self, url: &Url) -> std::result::Result<String, reqwest::Error> {
        self.client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn goto(&mut self, url: &Url) -> Result<()> {
        if let Some((current, _)) = self.current.as_mut() {
            if same_document(current, url) {
                debug!("In-page navigation to {}", url);
                *current = url.clone();
                return Ok(());
            }
        }

        let body = self.load(url).await.map_err(|e| ScrapeError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        debug!("Loaded {} ({} bytes)", url, body.len());
        self.current = Some((url.clone(), body));
        Ok(())
    }

    async fn wait_for_selector(&mut self, css: &str) -> Result<()> {
        let page = self.snapshot()?;
        if page.locate_all(css)?.is_empty() {
            return Err(ScrapeError::Navigation {
                url: page.url().to_string(),
                reason: format!("selector {css:?} never appeared"),
            });
        }
        Ok(())
    }

    fn current_url(&self) -> Option<&Url> {
        self.current.as_ref().map(|(url, _)| url)
    }

    fn content(&self) -> Option<&str> {
        self.current.as_ref().map(|(_, body)| body.as_str())
    }
}

/// True when `a` and `b` differ only in their fragment.
pub fn same_document(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

/// `url` with its fragment replaced, as a tab activation would do.
pub fn with_fragment(url: &Url, fragment: &str) -> Url {
    let mut out = url.clone();
    out.set_fragment(Some(fragment));
    out
}

/// Resolve a possibly relative reference against `base`.
pub fn resolve(base: &Url, href: &str) -> std::result::Result<Url, url::ParseError> {
    base.join(href.trim())
}
