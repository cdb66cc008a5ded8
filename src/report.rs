use crate::config::ExtractionConfig;
use crate::orchestrator::Snapshot;
use serde::Serialize;
use std::fmt::Write;

pub const AVATAR_BASE: &str = "https://api.dicebear.com/7.x/miniavs/svg";

pub fn avatar_url(index: usize) -> String {
    format!("{}?seed={}", AVATAR_BASE, index)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Row {
    pub name: String,
    pub avatar: String,
}

/// What the popup shows, with fallbacks already applied.
#[derive(Debug, Serialize, PartialEq)]
pub struct Report {
    pub website: Option<String>,
    pub title: String,
    pub image: Option<String>,
    pub likes: String,
    pub identifiers: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl Report {
    pub fn build(snapshot: &Snapshot, labels: &ExtractionConfig) -> Self {
        let likes = snapshot
            .like_count()
            .map(|n| n.to_string())
            .unwrap_or_else(|| labels.like_count_fallback.clone());

        let identifiers = snapshot
            .pool
            .iter()
            .flat_map(|pool| pool.members.iter())
            .enumerate()
            .map(|(i, name)| Row {
                name: name.clone(),
                avatar: avatar_url(i),
            })
            .collect();

        let notice = match (&snapshot.generation_error, &snapshot.pool) {
            (Some(e), _) => Some(e.to_string()),
            (None, Some(pool)) if pool.is_capped() => Some(format!(
                "showing {} of {} requested identifiers",
                pool.target_size, pool.requested
            )),
            _ => None,
        };

        let title = match (snapshot.title_text(), &snapshot.tab) {
            (Some(text), _) => text.to_string(),
            (None, Some(_)) => labels.title_not_found.clone(),
            (None, None) => labels.title_fallback.clone(),
        };

        Self {
            website: snapshot.tab.as_ref().map(|t| t.url.clone()),
            title,
            image: snapshot.image_url().map(str::to_string),
            likes,
            identifiers,
            notice,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if let Some(site) = &self.website {
            let _ = writeln!(out, "WebSite: {}", site);
        }
        let _ = writeln!(out, "Title: {}", self.title);
        if let Some(image) = &self.image {
            let _ = writeln!(out, "Image: {}", image);
        }
        let _ = writeln!(out, "Likes: {}", self.likes);
        if let Some(notice) = &self.notice {
            let _ = writeln!(out, "Note: {}", notice);
        }
        if !self.identifiers.is_empty() {
            let _ = writeln!(out, "----");
            for (i, row) in self.identifiers.iter().enumerate() {
                let _ = writeln!(out, "{:>4}. {}  {}", i + 1, row.name, row.avatar);
            }
        }
        out
    }
}
