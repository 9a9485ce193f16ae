//! Turn matched pivots into (target, context) observations
use std::cmp::min;
use crate::errors::*;
use crate::format::Template;
use crate::matchers::{CompositionMatcher, Match, Pivot};
use crate::sentence::{Sentence, Token};
use crate::vocab::Vocabulary;

/// Windowed bag of words around a pivot
#[derive(Debug, Clone)]
pub struct BowFeatureExtractor {
    /// Tokens on each side of the pivot, `None` for the whole sentence
    window: Option<usize>,
    contexts: Option<Vocabulary>,
    format: Template,
    only_content: bool,
}

impl BowFeatureExtractor {
    pub fn new(window: Option<usize>, contexts: Option<Vocabulary>, format: Template) -> Self {
        BowFeatureExtractor { window, contexts, format, only_content: false }
    }

    /// Only keep contexts whose part of speech starts with N, J, V or R
    pub fn only_content(mut self, only_content: bool) -> Self {
        self.only_content = only_content;
        self
    }

    /// Positions that can be contexts of `pivot`. The pivot extent itself never is.
    pub fn window_positions(&self, sentence: &Sentence, pivot: &Pivot) -> Vec<usize> {
        let (lo, hi) = pivot.bounds();
        let len = sentence.len();
        if lo >= len {
            return vec![];
        }
        let (left, right) = match self.window {
            None => (0, len),
            Some(w) => (lo.saturating_sub(w), min(len, hi.saturating_add(w).saturating_add(1))),
        };
        (left..lo).chain(hi + 1..right).collect()
    }

    /// Context features of a pivot, in sentence order. Repeated words are repeated.
    pub fn extract(&self, sentence: &Sentence, pivot: &Pivot) -> Vec<String> {
        self.window_positions(sentence, pivot)
            .into_iter()
            .map(|i| &sentence[i])
            .filter(|t| !self.only_content || t.is_content_word())
            .map(|t| self.format.format(t))
            .filter(|c| self.contexts.as_ref().map_or(true, |v| v.contains(c)))
            .collect()
    }

    pub fn signature(&self) -> String {
        format!("bow(window={:?};format={};only_content={};contexts={})",
            self.window, self.format.source(), self.only_content,
            self.contexts.as_ref().map_or(String::new(), |v| format!("{:016x}", v.fingerprint())))
    }
}

/// Read a window size given on the command line
pub fn parse_window(text: &str) -> Result<usize> {
    text.trim().parse().map_err(|e| Error::configuration(format!(
        "bad window size {:?}, expected a non-negative number of tokens: {}", text, e)))
}

/// Target vocabularies: `unigrams` gates single-token targets, `first` and `second` gate the
/// two lexical items of bigram targets. Each configured filter must accept.
#[derive(Debug, Clone, Default)]
pub struct TargetFilters {
    pub unigrams: Option<Vocabulary>,
    pub first: Option<Vocabulary>,
    pub second: Option<Vocabulary>,
}

fn passes(filter: &Option<Vocabulary>, item: &str) -> bool {
    filter.as_ref().map_or(true, |v| v.contains(item))
}

/// One accepted pivot occurrence. An empty `contexts` still counts as an occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub target: String,
    pub contexts: Vec<String>,
}

/// Runs every matcher over a sentence and yields observations for the accepted targets
#[derive(Debug, Clone)]
pub struct TargetsFeaturesExtractor {
    matchers: Vec<CompositionMatcher>,
    features: BowFeatureExtractor,
    target_format: Template,
    token_sep: String,
    filters: TargetFilters,
    only_content: bool,
}

pub const DEFAULT_TOKEN_SEP: &str = "<-->";

impl TargetsFeaturesExtractor {
    pub fn new(matchers: Vec<CompositionMatcher>, features: BowFeatureExtractor,
               target_format: Template, token_sep: &str, filters: TargetFilters) -> Result<Self> {
        if matchers.is_empty() {
            return Err(Error::configuration(
                "no pivots to look for: unigrams are disabled and no composition was requested"));
        }
        Ok(TargetsFeaturesExtractor {
            matchers,
            features,
            target_format,
            token_sep: token_sep.to_string(),
            filters,
            only_content: false,
        })
    }

    /// Only accept targets made of content words
    pub fn only_content(mut self, only_content: bool) -> Self {
        self.only_content = only_content;
        self
    }

    fn item(&self, token: &Token) -> Option<String> {
        if self.only_content && !token.is_content_word() {
            return None;
        }
        Some(self.target_format.format(token))
    }

    /// The formatted target of a match, if every filter accepts it
    pub fn target(&self, sentence: &Sentence, m: &Match) -> Option<String> {
        match m.pivot {
            Pivot::Single(i) => {
                let target = self.item(&sentence[i])?;
                if passes(&self.filters.unigrams, &target) { Some(target) } else { None }
            }
            Pivot::Pair(a, b) => {
                let first = self.item(&sentence[a])?;
                let second = self.item(&sentence[b])?;
                if passes(&self.filters.first, &first) && passes(&self.filters.second, &second) {
                    Some(format!("{}{}{}", first, self.token_sep, second))
                } else {
                    None
                }
            }
        }
    }

    /// Observations of one sentence, lazily, matcher by matcher in token order
    pub fn observations<'a>(&'a self, sentence: &'a Sentence) -> impl Iterator<Item = Observation> + 'a {
        self.matchers.iter()
            .flat_map(move |matcher| matcher.find(sentence))
            .filter_map(move |m| {
                let target = self.target(sentence, &m)?;
                let contexts = self.features.extract(sentence, &m.pivot);
                Some(Observation { target, contexts })
            })
    }

    /// (target, context, increment) triples of one sentence
    pub fn triples<'a>(&'a self, sentence: &'a Sentence) -> impl Iterator<Item = (String, String, u64)> + 'a {
        self.observations(sentence).flat_map(|obs| {
            let target = obs.target;
            obs.contexts.into_iter().map(move |c| (target.clone(), c, 1))
        })
    }

    /// Describes everything that influences the counts, for resuming runs safely
    pub fn signature(&self) -> String {
        let show = |v: &Option<Vocabulary>| v.as_ref().map_or(String::new(), |v| format!("{:016x}", v.fingerprint()));
        let matchers: Vec<String> = self.matchers.iter().map(|m| m.signature()).collect();
        format!("matchers=[{}];{};target={};sep={};t0={};t1={};t2={};only_content={}",
            matchers.join(","), self.features.signature(), self.target_format.source(),
            self.token_sep, show(&self.filters.unigrams), show(&self.filters.first),
            show(&self.filters.second), self.only_content)
    }
}
