use super::{DebugEndpoint, InjectionFailure, NodeLookup, Reading, ScriptInjector, TabReference};
use crate::config::BrowserConfig;
use headless_chrome::{Browser, Tab};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::time::{sleep, Duration};

/// Compiles a lookup into a self-contained, read-only script.
///
/// The script never touches the DOM beyond reading it and swallows its own
/// exceptions, so a broken page yields `null` rather than an evaluation error.
pub fn build_lookup_script(lookup: &NodeLookup) -> String {
    let path = Value::String(lookup.path.to_string());
    let read = match lookup.reading {
        Reading::Text => {
            "let text = node.textContent ? node.textContent.trim() : ''; return text || null;"
        }
        Reading::Source => "return node.src || null;",
    };

    format!(
        r#"
        (function() {{
            try {{
                let result = document.evaluate({path}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null);
                let node = result.singleNodeValue;
                if (!node) {{
                    return null;
                }}
                {read}
            }} catch(e) {{
                return null;
            }}
        }})();
        "#,
        path = path,
        read = read
    )
}

fn remote_value(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Evaluates lookups inside live tabs of a browser attached over CDP.
pub struct ChromeInjector {
    endpoint: DebugEndpoint,
    browser: OnceCell<Browser>,
    sync_attempts: u32,
    sync_interval: Duration,
}

impl ChromeInjector {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            endpoint: DebugEndpoint::new(config),
            browser: OnceCell::new(),
            sync_attempts: config.tab_sync_attempts.max(1),
            sync_interval: Duration::from_millis(config.tab_sync_interval_ms),
        }
    }

    async fn browser(&self) -> Result<&Browser, InjectionFailure> {
        self.browser
            .get_or_try_init(|| async {
                let ws_url = self
                    .endpoint
                    .websocket_url()
                    .await
                    .ok_or_else(|| InjectionFailure("no debuggable browser".to_string()))?;

                log::debug!("Connecting to browser websocket {}", ws_url);
                tokio::task::spawn_blocking(move || Browser::connect(ws_url))
                    .await
                    .map_err(|e| InjectionFailure(format!("connect task failed: {}", e)))?
                    .map_err(|e| {
                        InjectionFailure(format!("Failed to connect to Debugger WebSocket: {}", e))
                    })
            })
            .await
    }

    /// The websocket learns about existing targets asynchronously, so the tab
    /// may take a few polls to show up.
    async fn find_tab(&self, browser: &Browser, target_id: &str) -> Result<Arc<Tab>, InjectionFailure> {
        for _ in 0..self.sync_attempts {
            {
                let tabs = browser
                    .get_tabs()
                    .lock()
                    .map_err(|_| InjectionFailure("tab list lock poisoned".to_string()))?;
                if let Some(tab) = tabs.iter().find(|t| t.get_target_id() == target_id) {
                    return Ok(tab.clone());
                }
            }
            sleep(self.sync_interval).await;
        }
        Err(InjectionFailure(format!("tab {} never appeared", target_id)))
    }
}

impl ScriptInjector for ChromeInjector {
    async fn inject_and_evaluate(
        &self,
        tab: &TabReference,
        lookup: &NodeLookup,
    ) -> Result<Option<String>, InjectionFailure> {
        let target_id = tab
            .context_id()
            .ok_or_else(|| InjectionFailure("tab has no target id".to_string()))?;

        let browser = self.browser().await?;
        let live_tab = self.find_tab(browser, target_id).await?;
        let script = build_lookup_script(lookup);

        let remote = tokio::task::spawn_blocking(move || live_tab.evaluate(&script, false))
            .await
            .map_err(|e| InjectionFailure(format!("evaluation task failed: {}", e)))?
            .map_err(|e| InjectionFailure(format!("Lookup Script Error: {}", e)))?;

        Ok(remote_value(remote.value))
    }
}
