//! Positional paths into an HTML document tree.
//!
//! Only the absolute, positional XPath subset is understood:
//! `/html/body/div[2]/h1`. Each step names an element and an optional
//! 1-based position among its same-named siblings. A step without a position
//! matches every same-named child, as in XPath, and resolution returns the
//! first match in document order.

use scraper::{ElementRef, Html};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("structural path is empty")]
    Empty,
    #[error("structural path {0:?} must start at the document root with '/'")]
    Relative(String),
    #[error("malformed step {0:?}")]
    BadStep(String),
    #[error("position in step {0:?} must be a number of at least 1")]
    BadPosition(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    /// `None` selects every same-named sibling.
    pub position: Option<usize>,
}

impl Step {
    fn names(&self, element: &ElementRef<'_>) -> bool {
        element.value().name().eq_ignore_ascii_case(&self.name)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "{}[{}]", self.name, position),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralPath {
    steps: Vec<Step>,
}

impl StructuralPath {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// First element the path addresses, in document order, if any.
    pub fn resolve<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let (first, rest) = self.steps.split_first()?;

        let root = document.root_element();
        if !first.names(&root) || first.position.map_or(false, |p| p != 1) {
            return None;
        }

        descend(root, rest)
    }
}

fn descend<'a>(node: ElementRef<'a>, steps: &[Step]) -> Option<ElementRef<'a>> {
    let Some((step, rest)) = steps.split_first() else {
        return Some(node);
    };

    let mut candidates = node
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| step.names(child));

    match step.position {
        Some(position) => descend(candidates.nth(position - 1)?, rest),
        None => candidates.find_map(|child| descend(child, rest)),
    }
}

impl FromStr for StructuralPath {
    type Err = PathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        let body = raw
            .strip_prefix('/')
            .ok_or_else(|| PathError::Relative(raw.to_string()))?;

        let steps = body
            .split('/')
            .map(parse_step)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { steps })
    }
}

fn parse_step(raw: &str) -> Result<Step, PathError> {
    let (name, position) = match raw.split_once('[') {
        Some((name, rest)) => {
            let digits = rest
                .strip_suffix(']')
                .ok_or_else(|| PathError::BadStep(raw.to_string()))?;
            let position = digits
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| PathError::BadPosition(raw.to_string()))?;
            (name, Some(position))
        }
        None => (raw, None),
    };

    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_name {
        return Err(PathError::BadStep(raw.to_string()));
    }

    Ok(Step {
        name: name.to_ascii_lowercase(),
        position,
    })
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>t</title></head>
<body>
  <div><p>first</p><p>second</p><span>skip</span><p>third</p></div>
  <div><h1>  Heading  </h1></div>
</body></html>"#;

    fn path(raw: &str) -> StructuralPath {
        raw.parse().unwrap()
    }

    fn text(node: ElementRef<'_>) -> String {
        node.text().collect::<String>().trim().to_string()
    }

    #[test]
    fn test_parse_and_display() {
        let p = path("/html/body/div[2]/h1");
        assert_eq!(p.steps().len(), 4);
        assert_eq!(
            p.steps()[2],
            Step {
                name: "div".into(),
                position: Some(2)
            }
        );
        assert_eq!(p.steps()[3].position, None);
        assert_eq!(p.to_string(), "/html/body/div[2]/h1");

        // An explicit [1] narrows the step and must survive rendering.
        assert_eq!(path("/HTML/body[1]/div").to_string(), "/html/body[1]/div");
        assert_eq!(path("/html/body/div[1]/span").to_string(), "/html/body/div[1]/span");
        assert_ne!(path("/html/body/div[1]/span"), path("/html/body/div/span"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<StructuralPath>(), Err(PathError::Empty));
        assert!(matches!("html/body".parse::<StructuralPath>(), Err(PathError::Relative(_))));
        assert!(matches!("/html//body".parse::<StructuralPath>(), Err(PathError::BadStep(_))));
        assert!(matches!("/html/div[0]".parse::<StructuralPath>(), Err(PathError::BadPosition(_))));
        assert!(matches!("/html/div[x]".parse::<StructuralPath>(), Err(PathError::BadPosition(_))));
        assert!(matches!("/html/div[2".parse::<StructuralPath>(), Err(PathError::BadStep(_))));
        assert!(matches!("/html/*".parse::<StructuralPath>(), Err(PathError::BadStep(_))));
    }

    #[test]
    fn test_position_counts_same_named_siblings() {
        let doc = Html::parse_document(PAGE);
        let third = path("/html/body/div/p[3]").resolve(&doc).unwrap();
        assert_eq!(text(third), "third");

        let heading = path("/html/body/div[2]/h1").resolve(&doc).unwrap();
        assert_eq!(text(heading), "Heading");
    }

    #[test]
    fn test_unindexed_step_searches_later_siblings() {
        let doc = Html::parse_document(
            "<html><body><div><p>a</p></div><div><span>liked</span></div></body></html>",
        );
        let span = path("/html/body/div/span").resolve(&doc).unwrap();
        assert_eq!(text(span), "liked");

        // Pinning the first div rules the second one out.
        assert!(path("/html/body/div[1]/span").resolve(&doc).is_none());
    }

    #[test]
    fn test_first_match_in_document_order() {
        let doc = Html::parse_document(
            "<html><body><div><i>one</i></div><div><i>two</i><i>three</i></div></body></html>",
        );
        assert_eq!(text(path("/html/body/div/i").resolve(&doc).unwrap()), "one");
        assert_eq!(text(path("/html/body/div/i[2]").resolve(&doc).unwrap()), "three");
    }

    #[test]
    fn test_missing_nodes() {
        let doc = Html::parse_document(PAGE);
        assert!(path("/html/body/div[3]").resolve(&doc).is_none());
        assert!(path("/html/body/div/p[4]").resolve(&doc).is_none());
        assert!(path("/body/div").resolve(&doc).is_none());
        assert!(path("/html[2]/body").resolve(&doc).is_none());
        assert!(path("/html[1]/body/div[2]/h1").resolve(&doc).is_some());
    }
}
