pub mod injector;
pub mod snapshot;
pub mod tabs;

use crate::config::BrowserConfig;
use crate::dom::StructuralPath;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub use injector::ChromeInjector;
pub use snapshot::{FixedTab, SnapshotInjector};
pub use tabs::CdpTabService;

/// One browser tab as the tab service reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabReference {
    /// DevTools target id. `None` when the host gave us no usable handle.
    pub id: Option<String>,
    pub url: String,
}

impl TabReference {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            url: url.into(),
        }
    }

    /// Handle to inject into, if the reference carries a usable one.
    pub fn context_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// Ordinary web content. Browser-internal pages (`chrome://`, `devtools://`,
    /// extension pages, `about:`) refuse injected scripts.
    pub fn is_content_page(&self) -> bool {
        match url::Url::parse(&self.url) {
            Ok(u) => matches!(u.scheme(), "http" | "https" | "file"),
            Err(_) => false,
        }
    }
}

/// What the injected function reads off the node the path lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    /// Trimmed `textContent`.
    Text,
    /// Absolute `src` of an image element.
    Source,
}

/// The read-only function shipped into a page: resolve `path`, read one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLookup {
    pub path: StructuralPath,
    pub reading: Reading,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("page context refused the lookup: {0}")]
pub struct InjectionFailure(pub String);

/// Finds the tab the user is looking at.
#[allow(async_fn_in_trait)]
pub trait TabService {
    async fn locate_active_tab(&self) -> Option<TabReference>;
}

/// Runs a `NodeLookup` inside a tab and hands back what it read.
///
/// `Ok(None)` means the lookup ran and found nothing; `Err` means it never ran.
#[allow(async_fn_in_trait)]
pub trait ScriptInjector {
    async fn inject_and_evaluate(
        &self,
        tab: &TabReference,
        lookup: &NodeLookup,
    ) -> Result<Option<String>, InjectionFailure>;
}

/// The browser's remote debugging HTTP endpoint.
#[derive(Debug, Clone)]
pub struct DebugEndpoint {
    base: String,
    client: Client,
}

impl DebugEndpoint {
    pub fn new(config: &BrowserConfig) -> Self {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = match Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                log::warn!(
                    "Failed to build HTTP client with {:?} timeout, requests will not time out: {}",
                    timeout,
                    e
                );
                Client::new()
            }
        };
        Self {
            base: format!("http://{}:{}", config.host, config.port),
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn get_json(&self, path: &str) -> anyhow::Result<Value> {
        let res = self.client.get(self.url(path)).send().await?;
        if !res.status().is_success() {
            anyhow::bail!("{} answered {}", self.url(path), res.status());
        }
        Ok(res.json::<Value>().await?)
    }

    /// Browser-level websocket from `/json/version`, if a debuggable browser is listening.
    pub async fn websocket_url(&self) -> Option<String> {
        match self.get_json("/json/version").await {
            Ok(json) => json
                .get("webSocketDebuggerUrl")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            Err(e) => {
                log::warn!("No debuggable browser at {}: {}", self.base, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id() {
        assert_eq!(TabReference::new("ABC", "https://a.b").context_id(), Some("ABC"));
        assert_eq!(TabReference::new("  ", "https://a.b").context_id(), None);
        let no_id = TabReference {
            id: None,
            url: "https://a.b".into(),
        };
        assert_eq!(no_id.context_id(), None);
    }

    #[test]
    fn test_content_pages() {
        assert!(TabReference::new("1", "https://example.com/x").is_content_page());
        assert!(TabReference::new("1", "file:///tmp/page.html").is_content_page());
        assert!(!TabReference::new("1", "chrome://settings").is_content_page());
        assert!(!TabReference::new("1", "chrome-extension://abc/popup.html").is_content_page());
        assert!(!TabReference::new("1", "about:blank").is_content_page());
        assert!(!TabReference::new("1", "not a url").is_content_page());
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoint = DebugEndpoint::new(&BrowserConfig::default());
        assert_eq!(endpoint.url("/json/list"), "http://127.0.0.1:9222/json/list");
    }

    #[tokio::test]
    async fn test_request_timeout_is_honored() -> anyhow::Result<()> {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let stall = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let endpoint = DebugEndpoint::new(&BrowserConfig {
            port,
            request_timeout_ms: 200,
            ..BrowserConfig::default()
        });
        let res = tokio::time::timeout(Duration::from_secs(5), endpoint.get_json("/json/list")).await;
        stall.abort();

        let inner = res.expect("request outlived its configured timeout");
        assert!(inner.is_err());
        assert_eq!(endpoint.websocket_url().await, None);
        Ok(())
    }
}
