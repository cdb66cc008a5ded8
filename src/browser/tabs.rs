use super::{DebugEndpoint, TabReference, TabService};
use crate::config::BrowserConfig;
use serde::Deserialize;
use serde_json::Value;

/// One entry of `/json/list`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub target_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

/// Tab lookup over the browser's remote debugging port.
pub struct CdpTabService {
    endpoint: DebugEndpoint,
}

impl CdpTabService {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            endpoint: DebugEndpoint::new(config),
        }
    }

    /// Page targets, most recently focused first.
    pub async fn list_pages(&self) -> anyhow::Result<Vec<TargetInfo>> {
        let json = self.endpoint.get_json("/json/list").await?;
        Ok(page_targets(json)?)
    }
}

fn page_targets(json: Value) -> serde_json::Result<Vec<TargetInfo>> {
    let targets: Vec<TargetInfo> = serde_json::from_value(json)?;
    Ok(targets.into_iter().filter(TargetInfo::is_page).collect())
}

/// The DevTools list is ordered by last activation, so the head page target
/// is the active tab of the focused window.
fn active_tab(pages: Vec<TargetInfo>) -> Option<TabReference> {
    pages.into_iter().next().map(|t| TabReference {
        id: Some(t.id).filter(|id| !id.is_empty()),
        url: t.url,
    })
}

impl TabService for CdpTabService {
    async fn locate_active_tab(&self) -> Option<TabReference> {
        match self.list_pages().await {
            Ok(pages) => {
                let tab = active_tab(pages);
                match &tab {
                    Some(t) => log::info!("Active tab: {}", t.url),
                    None => log::info!("Browser reports no open page"),
                }
                tab
            }
            Err(e) => {
                log::warn!("Could not list tabs: {}", e);
                None
            }
        }
    }
}
