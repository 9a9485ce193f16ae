//! Parsed corpus data: tokens and sentences

use std::ops::Index;
use std::str::FromStr;
use crate::errors::*;

/// A token attribute that patterns, filters and templates can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Word,
    Lemma,
    Pos,
    /// First letter of the part of speech
    Cat,
    Deprel,
}

impl Attribute {
    pub fn name(self) -> &'static str {
        match self {
            Attribute::Word => "word",
            Attribute::Lemma => "lemma",
            Attribute::Pos => "pos",
            Attribute::Cat => "cat",
            Attribute::Deprel => "deprel",
        }
    }
}

impl FromStr for Attribute {
    type Err = Error;
    fn from_str(s: &str) -> Result<Attribute> {
        match s {
            "word" => Ok(Attribute::Word),
            "lemma" => Ok(Attribute::Lemma),
            "pos" => Ok(Attribute::Pos),
            "cat" => Ok(Attribute::Cat),
            "deprel" => Ok(Attribute::Deprel),
            other => Err(Error::configuration(format!("unknown token attribute `{}`", other))),
        }
    }
}

/// One parsed token. Its position in the sentence is fixed once the sentence is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub lemma: String,
    pub pos: String,
    pub deprel: String,
    /// 0-based position of the head, `None` for the root or when no parse is present
    pub head: Option<usize>,
}

impl Token {
    pub fn new<S: Into<String>>(word: S, lemma: S, pos: S) -> Token {
        Token {
            word: word.into(),
            lemma: lemma.into(),
            pos: pos.into(),
            deprel: String::new(),
            head: None,
        }
    }

    /// Attach a dependency arc pointing at `head`
    pub fn with_arc<S: Into<String>>(mut self, head: Option<usize>, deprel: S) -> Token {
        self.head = head;
        self.deprel = deprel.into();
        self
    }

    pub fn cat(&self) -> &str {
        match self.pos.chars().next() {
            Some(c) => &self.pos[..c.len_utf8()],
            None => "",
        }
    }

    pub fn get(&self, attr: Attribute) -> &str {
        match attr {
            Attribute::Word => &self.word,
            Attribute::Lemma => &self.lemma,
            Attribute::Pos => &self.pos,
            Attribute::Cat => self.cat(),
            Attribute::Deprel => &self.deprel,
        }
    }

    /// Content words are nouns, adjectives, verbs and adverbs
    pub fn is_content_word(&self) -> bool {
        match self.pos.chars().next() {
            Some('N') | Some('J') | Some('V') | Some('R') => true,
            _ => false,
        }
    }

    pub fn to_lowercase(&mut self) {
        self.word = self.word.to_lowercase();
        self.lemma = self.lemma.to_lowercase();
    }
}

/// An ordered run of tokens whose head indices all stay inside the sentence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    tokens: Vec<Token>,
}

impl Sentence {
    /// Build a sentence, rejecting head indices that point outside of it.
    pub fn new(tokens: Vec<Token>) -> Result<Sentence> {
        for (i, token) in tokens.iter().enumerate() {
            if let Some(head) = token.head {
                if head >= tokens.len() {
                    return Err(Error::corpus(0, format!(
                        "token {} ({:?}) has head {} but the sentence has {} tokens",
                        i + 1, token.word, head + 1, tokens.len())));
                }
            }
        }
        Ok(Sentence { tokens })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn get(&self, position: usize) -> Option<&Token> {
        self.tokens.get(position)
    }

    /// Dependency arcs as (dependent, head) positions, ordered by dependent position
    pub fn arcs<'a>(&'a self) -> impl Iterator<Item = (usize, usize)> + 'a {
        self.tokens.iter()
            .enumerate()
            .filter_map(|(i, t)| t.head.map(|h| (i, h)))
    }

    pub fn lowercase(&mut self) {
        for token in self.tokens.iter_mut() {
            token.to_lowercase();
        }
    }
}

impl Index<usize> for Sentence {
    type Output = Token;
    fn index(&self, position: usize) -> &Token {
        &self.tokens[position]
    }
}
