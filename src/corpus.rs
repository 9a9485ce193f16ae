//! Dependency parsed corpus reader
//!
//! A corpus is a line-oriented stream. Sentences are delimited by `<s>` ... `</s>` for separator
//! `s` (the opening tag may carry attributes). Every other `<...>` line is markup and ignored.
//! Token lines are tab separated: `word lemma pos [index head deprel]` where `head` is 1-based
//! and 0 is the root.
//!
//! Lines that are not valid UTF-8 are malformed records: the sentence containing one is skipped.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::mem;
use std::path::Path;
use std::str;
use flate2::read::MultiGzDecoder;
use crate::errors::*;
use crate::sentence::{Sentence, Token};

/// How to read corpus files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusOptions {
    /// Force gzip decoding. Files ending in `.gz` are always decoded.
    pub gzip: bool,
    /// Tag name of the sentence markup, `s` for `<s>` ... `</s>`
    pub separator: String,
    /// Lower-case words and lemmas as they are read
    pub to_lower: bool,
}

impl Default for CorpusOptions {
    fn default() -> CorpusOptions {
        CorpusOptions { gzip: false, separator: "s".to_string(), to_lower: false }
    }
}

/// Open a corpus file, transparently decompressing it if needed
pub fn open_corpus<P: AsRef<Path>>(path: P, gzip: bool) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::MissingFile(format!("corpus file {}", path.display()), Some(e)))?;
    let gzipped = gzip || path.extension().map_or(false, |ext| ext == "gz");
    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Stream sentences out of a corpus
///
/// Malformed sentences come out as `Error::CorpusFormat`, carrying the line the sentence started
/// on, and reading carries on with the next sentence. An IO error ends the stream.
pub struct SentenceStreamer<R> {
    reader: R,
    open_tag: String,
    close_tag: String,
    to_lower: bool,
    bytes: Vec<u8>,
    line: String,
    line_no: usize,
    /// Tokens of the sentence being read, with the line it started on
    current: Option<(usize, Vec<Token>)>,
    broken: Option<Error>,
    finished: bool,
}

impl<R: BufRead> SentenceStreamer<R> {
    pub fn new(reader: R, options: &CorpusOptions) -> Self {
        SentenceStreamer {
            reader,
            open_tag: format!("<{}", options.separator),
            close_tag: format!("</{}>", options.separator),
            to_lower: options.to_lower,
            bytes: Vec::new(),
            line: String::new(),
            line_no: 0,
            current: None,
            broken: None,
            finished: false,
        }
    }

    fn is_open_tag(&self, line: &str) -> bool {
        line.starts_with(&self.open_tag) && match line[self.open_tag.len()..].chars().next() {
            Some('>') => true,
            Some(c) => c.is_whitespace(),
            None => false,
        }
    }

    /// Finish the current sentence. Empty sentences give nothing.
    fn close(&mut self) -> Option<Result<Sentence>> {
        let broken = self.broken.take();
        let (start, tokens) = self.current.take()?;
        if let Some(err) = broken {
            return Some(Err(match err {
                Error::CorpusFormat { line, message } => Error::corpus(start, format!("line {}: {}", line, message)),
                other => other,
            }));
        }
        if tokens.is_empty() {
            return None;
        }
        Some(match Sentence::new(tokens) {
            Ok(mut sentence) => {
                if self.to_lower {
                    sentence.lowercase();
                }
                Ok(sentence)
            }
            Err(Error::CorpusFormat { message, .. }) => Err(Error::corpus(start, message)),
            Err(err) => Err(err),
        })
    }

    /// Read the next line into `self.line`. `None` at the end of the input, `Some(false)` if the
    /// line is not UTF-8.
    fn read_line(&mut self) -> io::Result<Option<bool>> {
        self.bytes.clear();
        self.line.clear();
        if self.reader.read_until(b'\n', &mut self.bytes)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        match str::from_utf8(&self.bytes) {
            Ok(text) => {
                self.line.push_str(text);
                Ok(Some(true))
            }
            Err(_) => Ok(Some(false)),
        }
    }
}

/// Parse one token line. Heads are converted to 0-based positions.
pub fn parse_token(line: &str, line_no: usize) -> Result<Token> {
    let fields: Vec<&str> = if line.contains('\t') {
        line.split('\t').collect()
    } else {
        line.split_whitespace().collect()
    };
    if fields.len() < 3 {
        return Err(Error::corpus(line_no, format!(
            "expected at least word, lemma and pos but found {} field(s)", fields.len())));
    }
    let token = Token::new(fields[0], fields[1], fields[2]);
    if fields.len() < 6 {
        return Ok(token);
    }
    let head: usize = fields[4].trim().parse()
        .map_err(|_| Error::corpus(line_no, format!("head index {:?} is not a number", fields[4])))?;
    let head = if head == 0 { None } else { Some(head - 1) };
    Ok(token.with_arc(head, fields[5].trim()))
}

impl<R: BufRead> Iterator for SentenceStreamer<R> {
    type Item = Result<Sentence>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            let valid = match self.read_line() {
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err.into()));
                }
                Ok(None) => {
                    self.finished = true;
                    return self.close();
                }
                Ok(Some(valid)) => valid,
            };
            if !valid {
                if self.current.is_none() {
                    debug!("Ignoring undecodable line {} outside of a sentence", self.line_no);
                } else if self.broken.is_none() {
                    self.broken = Some(Error::corpus(self.line_no, "line is not valid UTF-8"));
                }
                continue;
            }
            let line = mem::replace(&mut self.line, String::new());
            let trimmed = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
            let result = if trimmed.trim().is_empty() {
                None
            } else if trimmed.trim() == self.close_tag {
                self.close()
            } else if self.is_open_tag(trimmed) {
                let previous = self.close();
                self.current = Some((self.line_no, vec![]));
                previous
            } else if trimmed.starts_with('<') {
                None
            } else if self.current.is_none() {
                debug!("Ignoring token outside of a sentence on line {}", self.line_no);
                None
            } else if self.broken.is_none() {
                match parse_token(trimmed, self.line_no) {
                    Ok(token) => {
                        if let Some((_, ref mut tokens)) = self.current {
                            tokens.push(token);
                        }
                    }
                    Err(err) => self.broken = Some(err),
                }
                None
            } else {
                None
            };
            self.line = line;
            if result.is_some() {
                return result;
            }
        }
    }
}
