use super::{InjectionFailure, NodeLookup, Reading, ScriptInjector, TabReference, TabService};
use anyhow::{Context, Result};
use scraper::Html;
use std::fs;
use std::path::Path;
use url::Url;

/// Answers lookups from a saved copy of a page instead of a live tab.
#[derive(Debug, Clone)]
pub struct SnapshotInjector {
    source: String,
}

impl SnapshotInjector {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .context(format!("Failed to read HTML snapshot at {:?}", path))?;
        Ok(Self::new(source))
    }

    /// Same semantics as the script `ChromeInjector` ships into a live page.
    pub fn evaluate(&self, tab: &TabReference, lookup: &NodeLookup) -> Option<String> {
        let document = Html::parse_document(&self.source);
        let node = lookup.path.resolve(&document)?;

        match lookup.reading {
            Reading::Text => {
                let text = node.text().collect::<String>();
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Reading::Source => {
                let src = node.value().attr("src")?.trim();
                if src.is_empty() {
                    return None;
                }
                Some(absolute(&tab.url, src))
            }
        }
    }
}

/// `img.src` in a live page is always absolute; resolve against the page URL.
fn absolute(page_url: &str, src: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join(src))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| src.to_string())
}

impl ScriptInjector for SnapshotInjector {
    async fn inject_and_evaluate(
        &self,
        tab: &TabReference,
        lookup: &NodeLookup,
    ) -> Result<Option<String>, InjectionFailure> {
        Ok(self.evaluate(tab, lookup))
    }
}

/// A tab service that always answers with the same tab (or none).
#[derive(Debug, Clone)]
pub struct FixedTab(pub Option<TabReference>);

impl TabService for FixedTab {
    async fn locate_active_tab(&self) -> Option<TabReference> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <main>
          <h1>
             Lemon Tart
          </h1>
          <picture><img src="/media/tart.jpg"></picture>
          <picture><img src=""></picture>
          <button><span>   </span></button>
        </main>
    </body></html>"#;

    fn lookup(path: &str, reading: Reading) -> NodeLookup {
        NodeLookup {
            path: path.parse().unwrap(),
            reading,
        }
    }

    fn tab() -> TabReference {
        TabReference::new("P1", "https://cook.example/recipes/42")
    }

    #[test]
    fn test_trimmed_text() {
        let snap = SnapshotInjector::new(PAGE);
        assert_eq!(
            snap.evaluate(&tab(), &lookup("/html/body/main/h1", Reading::Text)),
            Some("Lemon Tart".to_string())
        );
    }

    #[test]
    fn test_blank_text_is_missing() {
        let snap = SnapshotInjector::new(PAGE);
        assert_eq!(
            snap.evaluate(&tab(), &lookup("/html/body/main/button/span", Reading::Text)),
            None
        );
    }

    #[test]
    fn test_source_is_absolute() {
        let snap = SnapshotInjector::new(PAGE);
        assert_eq!(
            snap.evaluate(&tab(), &lookup("/html/body/main/picture/img", Reading::Source)),
            Some("https://cook.example/media/tart.jpg".to_string())
        );
        assert_eq!(
            snap.evaluate(&tab(), &lookup("/html/body/main/picture[2]/img", Reading::Source)),
            None
        );
        // Text nodes have no src.
        assert_eq!(
            snap.evaluate(&tab(), &lookup("/html/body/main/h1", Reading::Source)),
            None
        );
    }

    #[test]
    fn test_from_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("pagepeek_snapshot_{}.html", uuid::Uuid::new_v4()));
        fs::write(&path, PAGE)?;
        let snap = SnapshotInjector::from_file(&path)?;
        fs::remove_file(&path)?;
        assert_eq!(
            snap.evaluate(&tab(), &lookup("/html/body/main/h1", Reading::Text)).as_deref(),
            Some("Lemon Tart")
        );
        assert!(SnapshotInjector::from_file(&path).is_err());
        Ok(())
    }
}
