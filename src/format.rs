//! Target and context format templates, e.g. `{lemma}-{cat}`
use std::fmt;
use crate::errors::*;
use crate::sentence::{Attribute, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field(Attribute),
}

/// A compiled template. Variables are `{word}`, `{lemma}`, `{pos}` and `{cat}`.
#[derive(Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    pieces: Vec<Piece>,
}

pub const DEFAULT_FORMAT: &str = "{lemma}-{cat}";

impl Template {
    pub fn parse(source: &str) -> Result<Template> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut rest = source;
        while let Some(open) = rest.find(|c: char| c == '{' || c == '}') {
            if rest[open..].starts_with('}') {
                return Err(Error::configuration(format!(
                    "unmatched `}}` in format {:?}", source)));
            }
            literal.push_str(&rest[..open]);
            let close = rest[open..].find('}')
                .ok_or_else(|| Error::configuration(format!("unclosed `{{` in format {:?}", source)))?;
            let name = &rest[open + 1..open + close];
            let attr = match name {
                "word" => Attribute::Word,
                "lemma" => Attribute::Lemma,
                "pos" => Attribute::Pos,
                "cat" => Attribute::Cat,
                _ => return Err(Error::configuration(format!(
                    "unknown variable {{{}}} in format {:?}; use word, lemma, pos or cat",
                    name, source))),
            };
            if !literal.is_empty() {
                pieces.push(Piece::Literal(literal.split_off(0)));
            }
            pieces.push(Piece::Field(attr));
            rest = &rest[open + close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }
        Ok(Template { source: source.to_string(), pieces })
    }

    pub fn format(&self, token: &Token) -> String {
        let mut out = String::with_capacity(self.source.len() + token.lemma.len());
        for piece in &self.pieces {
            match *piece {
                Piece::Literal(ref s) => out.push_str(s),
                Piece::Field(attr) => out.push_str(token.get(attr)),
            }
        }
        out
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for Template {
    fn default() -> Template {
        Template {
            source: DEFAULT_FORMAT.to_string(),
            pieces: vec![
                Piece::Field(Attribute::Lemma),
                Piece::Literal("-".to_string()),
                Piece::Field(Attribute::Cat),
            ],
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Template({:?})", self.source)
    }
}
