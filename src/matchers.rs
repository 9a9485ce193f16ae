//! Composition matchers: strategies that find pivots in a sentence
//!
//! Every strategy yields its matches in token order, so repeated runs count identically.
use std::ops::Range;
use std::path::PathBuf;
use regex::{Regex, RegexBuilder};
use crate::errors::*;
use crate::format::Template;
use crate::pattern::{Pattern, PatternOptions};
use crate::sentence::{Sentence, Token};
use crate::vocab::Vocabulary;

/// Token positions a match binds as its pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pivot {
    Single(usize),
    /// First and second lexical item: peripheral tokens, or dependent and head
    Pair(usize, usize),
}

impl Pivot {
    /// Leftmost and rightmost pivot positions
    pub fn bounds(&self) -> (usize, usize) {
        match *self {
            Pivot::Single(p) => (p, p),
            Pivot::Pair(a, b) if a <= b => (a, b),
            Pivot::Pair(a, b) => (b, a),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Tokens covered by the match
    pub span: Range<usize>,
    pub pivot: Pivot,
}

/// Regular expression filters on dependency arcs. Unset filters accept everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArcFilterOptions {
    pub deprel: Option<String>,
    pub depword: Option<String>,
    pub deplemma: Option<String>,
    pub deppos: Option<String>,
    /// Accepted dependents, formatted with the target format
    pub depfile: Option<PathBuf>,
    pub headword: Option<String>,
    pub headlemma: Option<String>,
    pub headpos: Option<String>,
    /// Accepted heads, formatted with the target format
    pub headfile: Option<PathBuf>,
}

impl ArcFilterOptions {
    pub fn is_configured(&self) -> bool {
        self.deprel.is_some()
            || self.depword.is_some() || self.deplemma.is_some()
            || self.deppos.is_some() || self.depfile.is_some()
            || self.headword.is_some() || self.headlemma.is_some()
            || self.headpos.is_some() || self.headfile.is_some()
    }
}

fn filter_regex(name: &str, source: &Option<String>, ignore_case: bool) -> Result<Option<Regex>> {
    match *source {
        None => Ok(None),
        Some(ref text) => RegexBuilder::new(&format!("^(?:{})$", text))
            .case_insensitive(ignore_case)
            .build()
            .map(Some)
            .map_err(|e| Error::configuration(format!("bad --{} expression {:?}: {}", name, text, e))),
    }
}

/// Tests for one end of an arc
#[derive(Debug, Clone)]
struct EndFilter {
    word: Option<Regex>,
    lemma: Option<Regex>,
    pos: Option<Regex>,
    /// Holds lower-cased entries when matching ignores case
    file: Option<Vocabulary>,
    ignore_case: bool,
}

impl EndFilter {
    fn accepts(&self, token: &Token, format: &Template) -> bool {
        let test = |re: &Option<Regex>, value: &str| re.as_ref().map_or(true, |re| re.is_match(value));
        test(&self.word, &token.word)
            && test(&self.lemma, &token.lemma)
            && test(&self.pos, &token.pos)
            && self.file.as_ref().map_or(true, |vocab| {
                let formatted = format.format(token);
                if self.ignore_case {
                    vocab.contains(&formatted.to_lowercase())
                } else {
                    vocab.contains(&formatted)
                }
            })
    }

    fn signature(&self) -> String {
        let show = |re: &Option<Regex>| re.as_ref().map_or(String::new(), |re| re.as_str().to_string());
        format!("word={};lemma={};pos={};file={};icase={}",
            show(&self.word), show(&self.lemma), show(&self.pos),
            self.file.as_ref().map_or(String::new(), |v| format!("{:016x}", v.fingerprint())),
            self.ignore_case)
    }
}

/// Matches dependency arcs whose dependent, head and relation pass the configured filters
#[derive(Debug, Clone)]
pub struct DependencyArcMatcher {
    deprel: Option<Regex>,
    dependent: EndFilter,
    head: EndFilter,
    format: Template,
}

impl DependencyArcMatcher {
    /// Fails if no filter is configured at all, which would turn every arc into a pivot.
    pub fn new(options: &ArcFilterOptions, format: &Template, ignore_case: bool) -> Result<Self> {
        if !options.is_configured() {
            return Err(Error::configuration(
                "dependency arc matching needs at least one of the deprel, dep* or head* filters"));
        }
        let load = |path: &Option<PathBuf>| -> Result<Option<Vocabulary>> {
            match *path {
                Some(ref p) if ignore_case => Ok(Some(Vocabulary::load_lowercase(p)?)),
                Some(ref p) => Ok(Some(Vocabulary::load(p)?)),
                None => Ok(None),
            }
        };
        Ok(DependencyArcMatcher {
            deprel: filter_regex("deprel", &options.deprel, ignore_case)?,
            dependent: EndFilter {
                word: filter_regex("depword", &options.depword, ignore_case)?,
                lemma: filter_regex("deplemma", &options.deplemma, ignore_case)?,
                pos: filter_regex("deppos", &options.deppos, ignore_case)?,
                file: load(&options.depfile)?,
                ignore_case,
            },
            head: EndFilter {
                word: filter_regex("headword", &options.headword, ignore_case)?,
                lemma: filter_regex("headlemma", &options.headlemma, ignore_case)?,
                pos: filter_regex("headpos", &options.headpos, ignore_case)?,
                file: load(&options.headfile)?,
                ignore_case,
            },
            format: format.clone(),
        })
    }

    pub fn accepts(&self, sentence: &Sentence, dependent: usize, head: usize) -> bool {
        let dep = &sentence[dependent];
        self.deprel.as_ref().map_or(true, |re| re.is_match(&dep.deprel))
            && self.dependent.accepts(dep, &self.format)
            && self.head.accepts(&sentence[head], &self.format)
    }

    fn signature(&self) -> String {
        format!("arc(deprel={};dep:{};head:{};format={})",
            self.deprel.as_ref().map_or("", |re| re.as_str()),
            self.dependent.signature(), self.head.signature(), self.format.source())
    }
}

/// The pivot finding strategies
#[derive(Debug, Clone)]
pub enum CompositionMatcher {
    /// Every token is a pivot
    Unigram,
    /// First and last token of every span matched by a linear pattern
    PeripheralLinearBigram(Pattern),
    DependencyArc(DependencyArcMatcher),
}

impl CompositionMatcher {
    pub fn linear(pattern: &str, options: PatternOptions) -> Result<CompositionMatcher> {
        Ok(CompositionMatcher::PeripheralLinearBigram(Pattern::compile(pattern, options)?))
    }

    /// Lazily find the matches in a sentence, in token order
    pub fn find<'a>(&'a self, sentence: &'a Sentence) -> Box<dyn Iterator<Item = Match> + 'a> {
        match *self {
            CompositionMatcher::Unigram => Box::new((0..sentence.len())
                .map(|i| Match { span: i..i + 1, pivot: Pivot::Single(i) })),
            CompositionMatcher::PeripheralLinearBigram(ref pattern) => Box::new((0..sentence.len())
                .filter_map(move |start| pattern.match_at(sentence, start))
                .filter(|span| span.len() >= 2)
                .map(|span| Match { pivot: Pivot::Pair(span.start, span.end - 1), span })),
            CompositionMatcher::DependencyArc(ref arcs) => Box::new(sentence.arcs()
                .filter(move |&(dep, head)| arcs.accepts(sentence, dep, head))
                .map(|(dep, head)| Match {
                    span: dep.min(head)..dep.max(head) + 1,
                    pivot: Pivot::Pair(dep, head),
                })),
        }
    }

    pub fn signature(&self) -> String {
        match *self {
            CompositionMatcher::Unigram => "unigram".to_string(),
            CompositionMatcher::PeripheralLinearBigram(ref p) => format!("linear({})", p.signature()),
            CompositionMatcher::DependencyArc(ref arcs) => arcs.signature(),
        }
    }
}

/// Everything needed to build the matchers of a run
#[derive(Debug, Clone, Default)]
pub struct CompositionOptions {
    pub unigrams: bool,
    /// `--linear-comp` pattern
    pub linear: Option<String>,
    pub arcs: ArcFilterOptions,
    pub pattern_options: PatternOptions,
}

/// Build the configured matchers: unigrams, then the linear pattern, then arcs.
pub fn composition_matchers(options: &CompositionOptions, target_format: &Template)
        -> Result<Vec<CompositionMatcher>> {
    let mut matchers = vec![];
    if options.unigrams {
        matchers.push(CompositionMatcher::Unigram);
    }
    if let Some(ref linear) = options.linear {
        matchers.push(CompositionMatcher::linear(linear, options.pattern_options)?);
    }
    if options.arcs.is_configured() {
        matchers.push(CompositionMatcher::DependencyArc(DependencyArcMatcher::new(
            &options.arcs, target_format, options.pattern_options.ignore_case)?));
    }
    Ok(matchers)
}
