use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::{error, info};
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::settings::Settings;

/// Downloads manuals and images. One GET per asset, no retry.
pub struct AssetFetcher {
    client: reqwest::Client,
}

impl AssetFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_builder(settings, reqwest::Client::builder())
    }

    fn with_builder(settings: &Settings, builder: reqwest::ClientBuilder) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&settings.user_agent)?);
        headers.insert(ACCEPT, header_value(&settings.accept)?);

        let client = builder
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.asset_timeout_secs))
            .build()
            .map_err(|e| network_error("<client>", e))?;
        Ok(Self { client })
    }

    /// Fetch `url` and atomically replace `dest` with the body.
    pub async fn fetch(&self, url: &Url, dest: &Path) -> Result<()> {
        let body = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| network_error(url.as_str(), e))?
            .bytes()
            .await
            .map_err(|e| network_error(url.as_str(), e))?;

        write_atomic(dest, &body).await
    }

    /// `fetch`, with failures logged instead of returned.
    pub async fn fetch_best_effort(&self, url: &Url, dest: &Path) -> bool {
        match self.fetch(url, dest).await {
            Ok(()) => {
                info!("Downloaded file from {} to {}", url, dest.display());
                true
            }
            Err(e) => {
                error!("Failed to download {}: {}", url, e);
                false
            }
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ScrapeError::NetworkFailed {
        url: String::new(),
        reason: format!("invalid header value {value:?}: {e}"),
    })
}

fn network_error(url: &str, e: reqwest::Error) -> ScrapeError {
    let reason = if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    };
    ScrapeError::NetworkFailed {
        url: url.to_string(),
        reason,
    }
}

async fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ScrapeError::persist(parent, e))?;
    }
    let tmp = partial_path(dest);
    let written = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| ScrapeError::persist(dest, e)),
        Err(e) => Err(ScrapeError::persist(&tmp, e)),
    };
    if written.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    written
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
pub mod test_server {
    //! One-shot HTTP responder for exercising real requests.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one request with `status` and `body`. The handle yields the
    /// raw request head.
    pub async fn serve_once(status: &str, body: &'static [u8]) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();

        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.write_all(body).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&head).to_string()
        });

        (format!("http://{}", addr), handle)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::test_server::serve_once;
    use super::*;

    // Local test servers must not be routed through a system proxy.
    pub(crate) fn fetcher() -> AssetFetcher {
        AssetFetcher::with_builder(&Settings::default(), reqwest::Client::builder().no_proxy())
            .unwrap()
    }

    #[tokio::test]
    async fn writes_body_and_sends_headers() {
        let (base, server) = serve_once("200 OK", b"%PDF-1.4").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("assets/M3546/manual.pdf");
        let url = Url::parse(&format!("{base}/api/products/M3546/infopacket")).unwrap();

        fetcher().fetch(&url, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4");
        assert!(!partial_path(&dest).exists());
        let head = server.await.unwrap().to_lowercase();
        assert!(head.contains("user-agent: mozilla/5.0"));
        assert!(head.contains("accept: application/pdf,image/*"));
    }

    #[tokio::test]
    async fn error_status_is_network_failed() {
        let (base, _server) = serve_once("404 Not Found", b"missing").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("img.png");
        let url = Url::parse(&format!("{base}/img.png")).unwrap();

        let err = fetcher().fetch(&url, &dest).await.unwrap_err();
        assert!(matches!(err, ScrapeError::NetworkFailed { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn unreachable_host_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("manual.pdf");
        let url = Url::parse("http://127.0.0.1:1/manual.pdf").unwrap();

        assert!(!fetcher().fetch_best_effort(&url, &dest).await);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn failed_replace_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("manual.pdf");
        std::fs::create_dir_all(dest.join("keep")).unwrap();

        let err = write_atomic(&dest, b"%PDF-1.4").await.unwrap_err();
        assert!(matches!(err, ScrapeError::PersistFailed { .. }));
        assert!(!partial_path(&dest).exists());
        assert!(dest.join("keep").is_dir());
    }

    #[tokio::test]
    async fn existing_file_is_replaced() {
        let (base, _server) = serve_once("200 OK", b"new").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("img.png");
        std::fs::write(&dest, b"old image bytes").unwrap();

        let url = Url::parse(&format!("{base}/img.png")).unwrap();
        assert!(fetcher().fetch_best_effort(&url, &dest).await);
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }
}
