use crate::browser::{NodeLookup, Reading, ScriptInjector, TabReference};
use crate::config::ExtractionConfig;
use crate::dom::{PathError, StructuralPath};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Image,
    LikeCount,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Image => "image",
            Field::LikeCount => "like_count",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    TextTrim,
    ResourceLocator,
    IntegerParse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionQuery {
    pub field: Field,
    pub path: StructuralPath,
    pub transform: Transform,
}

impl ExtractionQuery {
    pub fn new(field: Field, path: &str, transform: Transform) -> Result<Self, PathError> {
        Ok(Self {
            field,
            path: path.parse()?,
            transform,
        })
    }

    fn lookup(&self) -> NodeLookup {
        let reading = match self.transform {
            Transform::ResourceLocator => Reading::Source,
            Transform::TextTrim | Transform::IntegerParse => Reading::Text,
        };
        NodeLookup {
            path: self.path.clone(),
            reading,
        }
    }
}

/// The three fixed queries, one per field.
#[derive(Debug, Clone)]
pub struct QuerySet {
    pub title: ExtractionQuery,
    pub image: ExtractionQuery,
    pub like_count: ExtractionQuery,
}

impl QuerySet {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, PathError> {
        Ok(Self {
            title: ExtractionQuery::new(Field::Title, &config.title_path, Transform::TextTrim)?,
            image: ExtractionQuery::new(Field::Image, &config.image_path, Transform::ResourceLocator)?,
            like_count: ExtractionQuery::new(
                Field::LikeCount,
                &config.like_count_path,
                Transform::IntegerParse,
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Count(u32),
}

/// Why a field came back empty. Recorded for diagnostics, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Miss {
    NotFound,
    InjectionFailure(String),
    ParseFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub field: Field,
    pub value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miss: Option<Miss>,
    pub source_tab: Option<TabReference>,
    pub queried_at: DateTime<Utc>,
}

impl ExtractionResult {
    /// Result for a field that could not even be attempted because no tab was found.
    pub fn without_tab(field: Field) -> Self {
        Self {
            field,
            value: None,
            miss: Some(Miss::NotFound),
            source_tab: None,
            queried_at: Utc::now(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u32> {
        match self.value {
            Some(FieldValue::Count(n)) => Some(n),
            _ => None,
        }
    }
}

/// `parseInt` over a label: leading whitespace, optional sign, leading digits.
/// Counts are never negative, so a negative reading is a parse failure.
pub fn parse_count(text: &str) -> Option<u32> {
    static LEADING_INT: OnceLock<Regex> = OnceLock::new();
    let re = LEADING_INT.get_or_init(|| Regex::new(r"^\s*([+-]?)(\d+)").expect("static regex"));

    let caps = re.captures(text)?;
    let n: u32 = caps[2].parse().ok()?;
    if &caps[1] == "-" && n != 0 {
        return None;
    }
    Some(n)
}

/// Reads fields out of a page through a `ScriptInjector`.
pub struct Extractor<I> {
    injector: I,
}

impl<I: ScriptInjector> Extractor<I> {
    pub fn new(injector: I) -> Self {
        Self { injector }
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }

    /// Runs one query. Every failure mode folds into a `None` value.
    pub async fn extract(&self, tab: &TabReference, query: &ExtractionQuery) -> ExtractionResult {
        let (value, miss) = match self.read(tab, query).await {
            Ok(value) => (Some(value), None),
            Err(miss) => {
                log::debug!("{} unavailable on {}: {:?}", query.field, tab.url, miss);
                (None, Some(miss))
            }
        };

        ExtractionResult {
            field: query.field,
            value,
            miss,
            source_tab: Some(tab.clone()),
            queried_at: Utc::now(),
        }
    }

    async fn read(&self, tab: &TabReference, query: &ExtractionQuery) -> Result<FieldValue, Miss> {
        if tab.context_id().is_none() {
            return Err(Miss::InjectionFailure("tab has no context id".to_string()));
        }
        if !tab.is_content_page() {
            return Err(Miss::InjectionFailure(format!("{} is not scriptable", tab.url)));
        }

        let raw = self
            .injector
            .inject_and_evaluate(tab, &query.lookup())
            .await
            .map_err(|e| Miss::InjectionFailure(e.0))?
            .ok_or(Miss::NotFound)?;

        match query.transform {
            Transform::TextTrim | Transform::ResourceLocator => {
                let text = raw.trim();
                if text.is_empty() {
                    Err(Miss::NotFound)
                } else {
                    Ok(FieldValue::Text(text.to_string()))
                }
            }
            Transform::IntegerParse => parse_count(&raw)
                .map(FieldValue::Count)
                .ok_or(Miss::ParseFailure(raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{InjectionFailure, SnapshotInjector};
    use std::cell::Cell;

    /// Injector that records whether it was ever called.
    struct Recording {
        calls: Cell<usize>,
        answer: Result<Option<String>, InjectionFailure>,
    }

    impl Recording {
        fn answering(answer: Result<Option<String>, InjectionFailure>) -> Self {
            Self {
                calls: Cell::new(0),
                answer,
            }
        }
    }

    impl ScriptInjector for Recording {
        async fn inject_and_evaluate(
            &self,
            _tab: &TabReference,
            _lookup: &NodeLookup,
        ) -> Result<Option<String>, InjectionFailure> {
            self.calls.set(self.calls.get() + 1);
            self.answer.clone()
        }
    }

    fn like_query() -> ExtractionQuery {
        ExtractionQuery::new(Field::LikeCount, "/html/body/button/span", Transform::IntegerParse).unwrap()
    }

    fn title_query() -> ExtractionQuery {
        ExtractionQuery::new(Field::Title, "/html/body/h1", Transform::TextTrim).unwrap()
    }

    fn tab() -> TabReference {
        TabReference::new("P1", "https://a.example/post")
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("37"), Some(37));
        assert_eq!(parse_count("  37 likes"), Some(37));
        assert_eq!(parse_count("+5"), Some(5));
        assert_eq!(parse_count("1,204"), Some(1));
        assert_eq!(parse_count("-0"), Some(0));
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count("Like"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("99999999999"), None);
    }

    #[tokio::test]
    async fn test_missing_id_skips_injection() {
        let extractor = Extractor::new(Recording::answering(Ok(Some("37".into()))));
        let tab = TabReference {
            id: None,
            url: "https://a.example/post".into(),
        };
        let res = extractor.extract(&tab, &like_query()).await;
        assert_eq!(res.value, None);
        assert!(matches!(res.miss, Some(Miss::InjectionFailure(_))));
        assert_eq!(extractor.injector().calls.get(), 0);
    }

    #[tokio::test]
    async fn test_privileged_page_skips_injection() {
        let extractor = Extractor::new(Recording::answering(Ok(Some("Title".into()))));
        let tab = TabReference::new("P1", "chrome://newtab/");
        let res = extractor.extract(&tab, &title_query()).await;
        assert_eq!(res.value, None);
        assert_eq!(extractor.injector().calls.get(), 0);
    }

    #[tokio::test]
    async fn test_injection_failure_is_absorbed() {
        let extractor = Extractor::new(Recording::answering(Err(InjectionFailure("gone".into()))));
        let res = extractor.extract(&tab(), &title_query()).await;
        assert_eq!(res.value, None);
        assert_eq!(res.miss, Some(Miss::InjectionFailure("gone".into())));
        assert_eq!(res.source_tab, Some(tab()));
    }

    #[tokio::test]
    async fn test_unparseable_count_is_null() {
        let extractor = Extractor::new(Recording::answering(Ok(Some("Like".into()))));
        let res = extractor.extract(&tab(), &like_query()).await;
        assert_eq!(res.as_count(), None);
        assert_eq!(res.miss, Some(Miss::ParseFailure("Like".into())));
    }

    #[tokio::test]
    async fn test_snapshot_reads() {
        let page = "<html><body><h1> Hello </h1><button><span>37</span></button></body></html>";
        let extractor = Extractor::new(SnapshotInjector::new(page));

        let title = extractor.extract(&tab(), &title_query()).await;
        assert_eq!(title.as_text(), Some("Hello"));
        assert_eq!(title.miss, None);

        let likes = extractor.extract(&tab(), &like_query()).await;
        assert_eq!(likes.as_count(), Some(37));

        // Same query, unchanged document, same answer.
        let again = extractor.extract(&tab(), &like_query()).await;
        assert_eq!(again.value, likes.value);
    }

    #[tokio::test]
    async fn test_no_title_node() {
        let extractor = Extractor::new(SnapshotInjector::new("<html><body><h2>x</h2></body></html>"));
        let res = extractor.extract(&tab(), &title_query()).await;
        assert_eq!(res.value, None);
        assert_eq!(res.miss, Some(Miss::NotFound));
    }

    #[test]
    fn test_bad_configured_path() {
        let config = ExtractionConfig {
            title_path: "body/h1".into(),
            ..ExtractionConfig::default()
        };
        assert!(matches!(QuerySet::from_config(&config), Err(PathError::Relative(_))));
        assert!(QuerySet::from_config(&ExtractionConfig::default()).is_ok());
    }
}
