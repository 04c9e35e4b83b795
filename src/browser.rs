//! Headless Chromium session over the DevTools protocol. Client-side
//! scripts run, so script-rendered listings and tab routers behave the
//! way they do in a desktop browser.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::dom::{self, RenderedPage};
use crate::error::{Result, ScrapeError};
use crate::session::{same_document, PageSession};
use crate::settings::Settings;

const POLL: Duration = Duration::from_millis(250);

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    timeout: Duration,
    idle: Duration,
    current: Option<(Url, String)>,
}

impl BrowserSession {
    /// Start the browser and open the single tab every navigation reuses.
    pub async fn launch(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.navigation_timeout_secs);

        let mut builder = BrowserConfig::builder()
            .request_timeout(timeout)
            .arg(format!("--user-agent={}", settings.user_agent));
        if let Some(path) = &settings.browser.executable {
            builder = builder.chrome_executable(path);
        }
        if settings.browser.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(launch_error)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| launch_error(e.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser connection closed: {}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| launch_error(e.to_string()))?;
        info!("Browser session started");

        Ok(Self {
            browser,
            handler,
            page,
            timeout,
            idle: Duration::from_millis(settings.browser.idle_millis),
            current: None,
        })
    }

    /// Shut the browser down and wait for its connection to drain.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Browser did not exit cleanly: {}", e);
        }
        let _ = self.handler.await;
    }

    async fn render(&self, url: &Url) -> Result<String> {
        self.page.content().await.map_err(|e| navigation_error(url, e))
    }

    /// Poll the rendered document until it stops changing for `idle`.
    /// A page still changing at the navigation timeout is used as is.
    async fn settle(&self, url: &Url) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        let mut html = self.render(url).await?;
        let mut unchanged_since = Instant::now();
        loop {
            sleep(POLL).await;
            let next = self.render(url).await?;
            if next != html {
                html = next;
                unchanged_since = Instant::now();
            } else if unchanged_since.elapsed() >= self.idle {
                return Ok(html);
            }
            if Instant::now() >= deadline {
                warn!("{} still changing after {:?}", url, self.timeout);
                return Ok(html);
            }
        }
    }
}

#[async_trait]
impl PageSession for BrowserSession {
    async fn goto(&mut self, url: &Url) -> Result<()> {
        let in_page = matches!(&self.current, Some((current, _)) if same_document(current, url));

        if in_page {
            debug!("In-page navigation to {}", url);
            self.page
                .evaluate(hash_script(url))
                .await
                .map_err(|e| navigation_error(url, e))?;
        } else {
            match timeout(self.timeout, self.page.goto(url.as_str())).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(navigation_error(url, e)),
                Err(_) => {
                    return Err(ScrapeError::Navigation {
                        url: url.to_string(),
                        reason: format!("timed out after {:?}", self.timeout),
                    })
                }
            }
        }

        let html = self.settle(url).await?;
        debug!("Rendered {} ({} bytes)", url, html.len());
        self.current = Some((url.clone(), html));
        Ok(())
    }

    async fn wait_for_selector(&mut self, css: &str) -> Result<()> {
        dom::selector(css)?;
        let url = self
            .current_url()
            .cloned()
            .ok_or_else(|| ScrapeError::Navigation {
                url: String::new(),
                reason: "no page loaded".into(),
            })?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let html = self.render(&url).await?;
            let found = has_match(&url, &html, css)?;
            self.current = Some((url.clone(), html));
            if found {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::Navigation {
                    url: url.to_string(),
                    reason: format!("selector {css:?} never appeared"),
                });
            }
            sleep(POLL).await;
        }
    }

    fn current_url(&self) -> Option<&Url> {
        self.current.as_ref().map(|(url, _)| url)
    }

    fn content(&self) -> Option<&str> {
        self.current.as_ref().map(|(_, html)| html.as_str())
    }
}

/// Script that activates `url`'s fragment in the loaded document. The
/// fragment is decoded first so the page router sees the literal text,
/// e.g. `tab="parts"` rather than `tab=%22parts%22`.
fn hash_script(url: &Url) -> String {
    let fragment = serde_json::Value::from(url.fragment().unwrap_or_default());
    format!("window.location.hash = decodeURIComponent({fragment})")
}

fn has_match(url: &Url, html: &str, css: &str) -> Result<bool> {
    let page = RenderedPage::parse(url.clone(), html);
    Ok(!page.locate_all(css)?.is_empty())
}

fn launch_error(reason: String) -> ScrapeError {
    ScrapeError::Navigation {
        url: String::new(),
        reason: format!("failed to launch browser: {reason}"),
    }
}

fn navigation_error(url: &Url, e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Navigation {
        url: url.to_string(),
        reason: e.to_string(),
    }
}
