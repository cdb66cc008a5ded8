use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// What to do when more identifiers are requested than the vocabulary can produce.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Return every distinct identifier the vocabulary allows.
    #[default]
    Cap,
    /// Refuse with `CapacityExceeded`.
    Fail,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("identifier vocabulary needs at least one {0}")]
    EmptyVocabulary(&'static str),
    #[error("vocabulary word {0:?} is blank")]
    BlankWord(String),
    #[error("noun {0:?} ends with a digit and would run into the numeral")]
    NumericSuffix(String),
    #[error("max_number must be at least 1")]
    NoNumerals,
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("requested {requested} identifiers but the vocabulary only yields {capacity} distinct ones")]
pub struct CapacityExceeded {
    pub requested: usize,
    pub capacity: usize,
}

/// Vocabulary an identifier is drawn from: `adjective ++ noun ++ n` with `n` in `1..=max_number`.
#[derive(Debug, Clone)]
pub struct IdentifierSpec {
    adjectives: Vec<String>,
    nouns: Vec<String>,
    max_number: u32,
    stems: Vec<String>,
}

impl IdentifierSpec {
    pub fn new<A, N>(adjectives: A, nouns: N, max_number: u32) -> Result<Self, SpecError>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        let adjectives = distinct_words(adjectives)?;
        let nouns = distinct_words(nouns)?;

        if adjectives.is_empty() {
            return Err(SpecError::EmptyVocabulary("adjective"));
        }
        if nouns.is_empty() {
            return Err(SpecError::EmptyVocabulary("noun"));
        }
        if max_number == 0 {
            return Err(SpecError::NoNumerals);
        }
        // The numeral is recovered as the trailing digit run, so a noun ending in
        // a digit would make two different draws render to the same string.
        if let Some(noun) = nouns.iter().find(|n| n.ends_with(|c: char| c.is_ascii_digit())) {
            return Err(SpecError::NumericSuffix(noun.clone()));
        }

        // "Sly" + "Fox" and "Sl" + "yFox" are the same stem; count each once.
        let stems: BTreeSet<String> = adjectives
            .iter()
            .flat_map(|a| nouns.iter().map(move |n| format!("{a}{n}")))
            .collect();

        Ok(Self {
            adjectives,
            nouns,
            max_number,
            stems: stems.into_iter().collect(),
        })
    }

    pub fn adjectives(&self) -> &[String] {
        &self.adjectives
    }

    pub fn nouns(&self) -> &[String] {
        &self.nouns
    }

    pub fn max_number(&self) -> u32 {
        self.max_number
    }

    /// Number of distinct identifiers this vocabulary can render.
    pub fn capacity(&self) -> usize {
        self.stems.len().saturating_mul(self.max_number as usize)
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let adjective = &self.adjectives[rng.gen_range(0..self.adjectives.len())];
        let noun = &self.nouns[rng.gen_range(0..self.nouns.len())];
        let number = rng.gen_range(1..=self.max_number);
        format!("{adjective}{noun}{number}")
    }

    fn nth(&self, index: usize) -> String {
        let per_stem = self.max_number as usize;
        let stem = &self.stems[index / per_stem];
        format!("{}{}", stem, index % per_stem + 1)
    }
}

fn distinct_words<I>(words: I) -> Result<Vec<String>, SpecError>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for word in words {
        let word: String = word.into();
        if word.trim().is_empty() {
            return Err(SpecError::BlankWord(word));
        }
        if seen.insert(word.clone()) {
            out.push(word);
        }
    }
    Ok(out)
}

/// A fully built set of identifiers. Always rebuilt whole, never patched.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IdentifierPool {
    pub members: Vec<String>,
    pub target_size: usize,
    pub requested: usize,
}

impl IdentifierPool {
    pub fn empty() -> Self {
        Self {
            members: Vec::new(),
            target_size: 0,
            requested: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_capped(&self) -> bool {
        self.target_size < self.requested
    }
}

pub struct IdentifierGenerator<R> {
    spec: IdentifierSpec,
    policy: OverflowPolicy,
    rng: R,
}

impl<R: Rng> IdentifierGenerator<R> {
    pub fn new(spec: IdentifierSpec, policy: OverflowPolicy, rng: R) -> Self {
        Self { spec, policy, rng }
    }

    pub fn spec(&self) -> &IdentifierSpec {
        &self.spec
    }

    /// Builds `count` distinct identifiers.
    ///
    /// Sparse requests use rejection sampling: draw, insert, repeat until the set
    /// is full. Once the request covers more than half of the capacity, collisions
    /// dominate, so the pool is instead sampled without replacement from the
    /// enumerated identifier space. Either way the loop is bounded.
    pub fn generate(&mut self, count: usize) -> Result<IdentifierPool, CapacityExceeded> {
        if count == 0 {
            return Ok(IdentifierPool::empty());
        }

        let capacity = self.spec.capacity();
        let target_size = if count > capacity {
            match self.policy {
                OverflowPolicy::Fail => {
                    log::error!(
                        "Identifier request of {} exceeds vocabulary capacity {}",
                        count,
                        capacity
                    );
                    return Err(CapacityExceeded {
                        requested: count,
                        capacity,
                    });
                }
                OverflowPolicy::Cap => {
                    log::warn!(
                        "Identifier request of {} capped to vocabulary capacity {}",
                        count,
                        capacity
                    );
                    capacity
                }
            }
        } else {
            count
        };

        let members = if target_size.saturating_mul(2) > capacity {
            self.sample_dense(target_size, capacity)
        } else {
            self.sample_sparse(target_size)
        };

        log::debug!("Generated {} identifiers", members.len());

        Ok(IdentifierPool {
            members,
            target_size,
            requested: count,
        })
    }

    fn sample_sparse(&mut self, target_size: usize) -> Vec<String> {
        let mut seen = HashSet::with_capacity(target_size);
        let mut members = Vec::with_capacity(target_size);
        while members.len() < target_size {
            let candidate = self.spec.draw(&mut self.rng);
            if seen.insert(candidate.clone()) {
                members.push(candidate);
            }
        }
        members
    }

    fn sample_dense(&mut self, target_size: usize, capacity: usize) -> Vec<String> {
        index::sample(&mut self.rng, capacity, target_size)
            .into_iter()
            .map(|i| self.spec.nth(i))
            .collect()
    }
}
