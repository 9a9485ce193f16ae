//! Token sequence patterns
//!
//! A pattern is a pseudo-regular expression over tokens:
//!
//! ```text
//! T<word=big,pos=JJ>(T<pos=JJ>)*T<word=file(rows.txt),pos=NN|NNS>
//! ```
//!
//! `T<...>` matches one token whose attributes (`word`, `lemma`, `pos`, `cat`, `deprel`) all
//! pass their test. A value is either a regular expression that has to cover the whole
//! attribute, or `file(path)`, a list of accepted values one per line. `T<>` matches any token.
//! Tokens and parenthesised groups can be followed by `*`, `+`, `?`, `{n}`, `{n,}` or `{n,m}`,
//! and `|` separates alternatives.
//!
//! Matching is anchored at a start position and greedy: of all the ways the pattern can match, the
//! one a backtracking search would try first wins. The search itself runs all alternatives in
//! step, one token at a time, so it takes time linear in the sentence length and needs no
//! recursion.
use std::mem;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use nom::branch::alt;
use nom::bytes::complete::{is_not, tag};
use nom::character::complete::{alpha1, char, digit1, multispace0};
use nom::combinator::{map, map_res, opt};
use nom::multi::{many1, separated_list0, separated_list1};
use nom::sequence::{delimited, preceded};
use nom::{IResult, Offset};
use regex::{Regex, RegexBuilder};
use crate::errors::*;
use crate::farm::{new_farm, FarmMap};
use crate::sentence::{Attribute, Sentence, Token};
use crate::vocab::Vocabulary;

/// How attribute values are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
    pub ignore_case: bool,
    /// Compare values as plain strings instead of regular expressions
    pub literal: bool,
}

/// Largest count accepted in `{n}`, `{n,}` and `{n,m}`
pub const MAX_REPEAT: usize = 1000;

//
// Parsing: text to a raw tree that still points into the source
//

#[derive(Debug)]
enum Raw<'a> {
    Token(Vec<RawTest<'a>>),
    Group(Vec<Vec<Raw<'a>>>),
    Repeat(Box<Raw<'a>>, RawQuantifier<'a>),
}

#[derive(Debug)]
struct RawTest<'a> {
    name: &'a str,
    value: RawValue<'a>,
}

#[derive(Debug)]
enum RawValue<'a> {
    File(&'a str),
    Text(&'a str),
}

#[derive(Debug)]
struct RawQuantifier<'a> {
    text: &'a str,
    min: usize,
    max: Option<usize>,
}

fn alternation(input: &str) -> IResult<&str, Vec<Vec<Raw>>> {
    separated_list1(preceded(multispace0, char('|')), sequence)(input)
}

fn sequence(input: &str) -> IResult<&str, Vec<Raw>> {
    many1(preceded(multispace0, item))(input)
}

fn item(input: &str) -> IResult<&str, Raw> {
    let (rest, atom) = alt((token, group))(input)?;
    let (rest, quantifier) = opt(quantifier)(rest)?;
    Ok((rest, match quantifier {
        Some(q) => Raw::Repeat(Box::new(atom), q),
        None => atom,
    }))
}

fn group(input: &str) -> IResult<&str, Raw> {
    map(delimited(char('('), alternation, preceded(multispace0, char(')'))), Raw::Group)(input)
}

fn token(input: &str) -> IResult<&str, Raw> {
    map(delimited(tag("T<"), separated_list0(char(','), test), char('>')), Raw::Token)(input)
}

fn test(input: &str) -> IResult<&str, RawTest> {
    let (rest, name) = preceded(multispace0, alpha1)(input)?;
    let (rest, _) = preceded(multispace0, char('='))(rest)?;
    let (rest, value) = alt((
        map(delimited(tag("file("), is_not(")"), char(')')), RawValue::File),
        map(value_text, RawValue::Text),
    ))(rest)?;
    Ok((rest, RawTest { name, value }))
}

/// A value runs up to the next `,` or `>` that is not nested in brackets or escaped
fn value_text(input: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth > 0 => depth -= 1,
            ',' | '>' if depth == 0 => {
                return if i == 0 {
                    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::TakeWhile1)))
                } else {
                    Ok((&input[i..], &input[..i]))
                };
            }
            _ => {}
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)))
}

fn quantifier(input: &str) -> IResult<&str, RawQuantifier> {
    let (rest, (min, max)) = alt((
        map(char('*'), |_| (0usize, None::<usize>)),
        map(char('+'), |_| (1, None)),
        map(char('?'), |_| (0, Some(1))),
        delimited(char('{'), bounds, char('}')),
    ))(input)?;
    let text = &input[..input.offset(rest)];
    Ok((rest, RawQuantifier { text, min, max }))
}

fn bounds(input: &str) -> IResult<&str, (usize, Option<usize>)> {
    let (rest, min) = number(input)?;
    let (rest, comma) = opt(char(','))(rest)?;
    if comma.is_none() {
        return Ok((rest, (min, Some(min))));
    }
    let (rest, max) = opt(number)(rest)?;
    Ok((rest, (min, max)))
}

fn number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |digits: &str| digits.parse::<usize>())(input)
}

//
// Compiled form
//

#[derive(Debug, Clone)]
enum Value {
    /// Stored lower-cased when matching ignores case
    Exact(String),
    Regex(Regex),
    Set(Arc<Vocabulary>),
}

#[derive(Debug, Clone)]
struct Test {
    attr: Attribute,
    value: Value,
    ignore_case: bool,
}

impl Test {
    fn accepts(&self, token: &Token) -> bool {
        let v = token.get(self.attr);
        match self.value {
            Value::Exact(ref expected) if self.ignore_case => v.to_lowercase() == *expected,
            Value::Exact(ref expected) => v == expected,
            Value::Regex(ref re) => re.is_match(v),
            Value::Set(ref vocab) if self.ignore_case => vocab.contains(&v.to_lowercase()),
            Value::Set(ref vocab) => vocab.contains(v),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Token(Vec<Test>),
    Seq(Vec<Node>),
    Alt(Vec<Node>),
    Repeat { node: Box<Node>, min: usize, max: Option<usize> },
}

/// A compiled pattern. Compile once, match against any number of sentences.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    options: PatternOptions,
    program: Vec<Inst>,
    /// Word lists named by `file(...)`, sorted by path
    files: Vec<(String, Arc<Vocabulary>)>,
}

struct Compiler<'s> {
    source: &'s str,
    options: PatternOptions,
    files: FarmMap<String, Arc<Vocabulary>>,
}

impl<'s> Compiler<'s> {
    fn error(&self, at: &str, message: String) -> Error {
        Error::pattern(self.source, self.source.offset(at), message)
    }

    fn alternatives(&mut self, alternatives: Vec<Vec<Raw>>) -> Result<Node> {
        let mut nodes = alternatives.into_iter()
            .map(|seq| self.sequence(seq))
            .collect::<Result<Vec<Node>>>()?;
        Ok(if nodes.len() == 1 { nodes.remove(0) } else { Node::Alt(nodes) })
    }

    fn sequence(&mut self, items: Vec<Raw>) -> Result<Node> {
        let mut nodes = items.into_iter()
            .map(|raw| self.node(raw))
            .collect::<Result<Vec<Node>>>()?;
        Ok(if nodes.len() == 1 { nodes.remove(0) } else { Node::Seq(nodes) })
    }

    fn node(&mut self, raw: Raw) -> Result<Node> {
        match raw {
            Raw::Token(tests) => Ok(Node::Token(tests.into_iter()
                .map(|t| self.test(t))
                .collect::<Result<Vec<Test>>>()?)),
            Raw::Group(alternatives) => self.alternatives(alternatives),
            Raw::Repeat(inner, q) => {
                if let Some(max) = q.max {
                    if max < q.min || max == 0 {
                        return Err(self.error(q.text, format!("invalid quantifier `{}`", q.text)));
                    }
                }
                if q.max.unwrap_or(q.min) > MAX_REPEAT {
                    return Err(self.error(q.text, format!(
                        "invalid quantifier `{}`, counts above {} are not supported", q.text, MAX_REPEAT)));
                }
                Ok(Node::Repeat { node: Box::new(self.node(*inner)?), min: q.min, max: q.max })
            }
        }
    }

    fn test(&mut self, raw: RawTest) -> Result<Test> {
        let attr: Attribute = raw.name.parse()
            .map_err(|_| self.error(raw.name, format!("unknown attribute `{}`", raw.name)))?;
        let ignore_case = self.options.ignore_case;
        let value = match raw.value {
            RawValue::File(path) => Value::Set(self.file(path)?),
            RawValue::Text(text) if self.options.literal || regex::escape(text) == text => {
                Value::Exact(if ignore_case { text.to_lowercase() } else { text.to_string() })
            }
            RawValue::Text(text) => {
                let re = RegexBuilder::new(&format!("^(?:{})$", text))
                    .case_insensitive(ignore_case)
                    .build()
                    .map_err(|e| self.error(text, format!("invalid regular expression: {}", e)))?;
                Value::Regex(re)
            }
        };
        Ok(Test { attr, value, ignore_case })
    }

    fn file(&mut self, path: &str) -> Result<Arc<Vocabulary>> {
        if let Some(vocab) = self.files.get(path) {
            return Ok(vocab.clone());
        }
        let vocab = Arc::new(if self.options.ignore_case {
            Vocabulary::load_lowercase(Path::new(path))?
        } else {
            Vocabulary::load(Path::new(path))?
        });
        self.files.insert(path.to_string(), vocab.clone());
        Ok(vocab)
    }
}

/// Explain why the parser stopped at `rest`
fn leftover_message(rest: &str) -> String {
    let shown: String = rest.chars().take(20).collect();
    match rest.chars().next() {
        Some('(') => format!("unbalanced `(` at {:?}", shown),
        Some(')') => format!("unbalanced `)` at {:?}", shown),
        Some('*') | Some('+') | Some('?') | Some('{') => format!("invalid quantifier at {:?}", shown),
        Some('T') => format!("malformed token constraint {:?}, expected T<attr=value,...>", shown),
        Some(_) => format!("unexpected input {:?}", shown),
        None => "empty pattern".to_string(),
    }
}

impl Pattern {
    /// Compile a pattern string
    pub fn compile(source: &str, options: PatternOptions) -> Result<Pattern> {
        let (rest, tree) = match alternation(source) {
            Ok(parsed) => parsed,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let at = if e.input.trim().is_empty() { source.trim_start() } else { e.input };
                let start = source.offset(at).min(source.len());
                return Err(Error::pattern(source, start, leftover_message(&source[start..])));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(Error::pattern(source, source.len(), "incomplete pattern"));
            }
        };
        if !rest.trim().is_empty() {
            let rest = rest.trim_start();
            return Err(Error::pattern(source, source.offset(rest), leftover_message(rest)));
        }
        let mut compiler = Compiler { source, options, files: new_farm() };
        let root = compiler.alternatives(tree)?;
        let mut files: Vec<(String, Arc<Vocabulary>)> = compiler.files.into_iter().collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Pattern { source: source.to_string(), options, program: assemble(&root), files })
    }

    /// Identifies the pattern together with the contents of the files it reads
    pub fn signature(&self) -> String {
        let mut sig = format!("{}|icase={}|literal={}",
            self.source, self.options.ignore_case, self.options.literal);
        for &(ref path, ref vocab) in &self.files {
            sig.push_str(&format!("|{}={:016x}", path, vocab.fingerprint()));
        }
        sig
    }

    /// Match starting exactly at `start`. Returns the covered span.
    pub fn match_at(&self, sentence: &Sentence, start: usize) -> Option<Range<usize>> {
        if start > sentence.len() {
            return None;
        }
        run(&self.program, sentence, start).map(|end| start..end)
    }

    /// Leftmost match starting at `from` or later
    pub fn find_from(&self, sentence: &Sentence, from: usize) -> Option<Range<usize>> {
        (from..sentence.len() + 1).filter_map(|start| self.match_at(sentence, start)).next()
    }
}

//
// Matching: the node tree flattened into a program run by a thread list per position
//

#[derive(Debug, Clone)]
enum Inst {
    /// Consume one token passing every test
    Token(Vec<Test>),
    /// Try both, preferring the first
    Split(usize, usize),
    Jump(usize),
    Match,
}

fn emit(node: &Node, program: &mut Vec<Inst>) {
    match *node {
        Node::Token(ref tests) => program.push(Inst::Token(tests.clone())),
        Node::Seq(ref nodes) => {
            for n in nodes {
                emit(n, program);
            }
        }
        Node::Alt(ref nodes) => {
            let mut exits = vec![];
            for (i, n) in nodes.iter().enumerate() {
                if i + 1 == nodes.len() {
                    emit(n, program);
                    break;
                }
                let split = program.len();
                program.push(Inst::Split(split + 1, split + 1));
                emit(n, program);
                exits.push(program.len());
                program.push(Inst::Jump(0));
                program[split] = Inst::Split(split + 1, program.len());
            }
            let end = program.len();
            for exit in exits {
                program[exit] = Inst::Jump(end);
            }
        }
        Node::Repeat { ref node, min, max } => {
            for _ in 0..min {
                emit(node, program);
            }
            match max {
                None => {
                    let split = program.len();
                    program.push(Inst::Split(split + 1, split + 1));
                    emit(node, program);
                    program.push(Inst::Jump(split));
                    program[split] = Inst::Split(split + 1, program.len());
                }
                Some(max) => {
                    let mut splits = vec![];
                    for _ in min..max {
                        splits.push(program.len());
                        program.push(Inst::Split(0, 0));
                        emit(node, program);
                    }
                    let end = program.len();
                    for split in splits {
                        program[split] = Inst::Split(split + 1, end);
                    }
                }
            }
        }
    }
}

fn assemble(root: &Node) -> Vec<Inst> {
    let mut program = vec![];
    emit(root, &mut program);
    program.push(Inst::Match);
    program
}

/// Threads waiting at one position, highest priority first
struct Threads {
    seen: Vec<bool>,
    waiting: Vec<usize>,
    stack: Vec<usize>,
}

impl Threads {
    fn new(size: usize) -> Threads {
        Threads { seen: vec![false; size], waiting: vec![], stack: vec![] }
    }

    /// Follow jumps and splits from `pc` in preference order. A state already reached at this
    /// position was reached with a higher priority, so it is dropped.
    fn add(&mut self, program: &[Inst], pc: usize) {
        self.stack.push(pc);
        while let Some(pc) = self.stack.pop() {
            if self.seen[pc] {
                continue;
            }
            self.seen[pc] = true;
            match program[pc] {
                Inst::Jump(to) => self.stack.push(to),
                Inst::Split(first, second) => {
                    self.stack.push(second);
                    self.stack.push(first);
                }
                Inst::Token(_) | Inst::Match => self.waiting.push(pc),
            }
        }
    }

    fn clear(&mut self) {
        for seen in self.seen.iter_mut() {
            *seen = false;
        }
        self.waiting.clear();
    }
}

/// End of the match starting at `start` that a greedy backtracking search would find first
fn run(program: &[Inst], s: &Sentence, start: usize) -> Option<usize> {
    let mut current = Threads::new(program.len());
    let mut next = Threads::new(program.len());
    let mut matched = None;
    current.add(program, 0);
    let mut pos = start;
    while !current.waiting.is_empty() {
        let token = s.get(pos);
        for &pc in &current.waiting {
            match program[pc] {
                // Lower priority threads can only find less preferred matches
                Inst::Match => {
                    matched = Some(pos);
                    break;
                }
                Inst::Token(ref tests) => {
                    if let Some(token) = token {
                        if tests.iter().all(|t| t.accepts(token)) {
                            next.add(program, pc + 1);
                        }
                    }
                }
                Inst::Split(..) | Inst::Jump(_) => {}
            }
        }
        if token.is_none() {
            break;
        }
        mem::swap(&mut current, &mut next);
        next.clear();
        pos += 1;
    }
    matched
}
