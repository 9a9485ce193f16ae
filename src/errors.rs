//
// Errors
//
use std::error;
use std::fmt;
use std::io;
use std::num;
use std::path::PathBuf;
use std::result;

/// Type alias for depcount errors
pub type Result<X> = result::Result<X, Error>;

/// Wrapper for many kinds of errors occuring while compiling matchers or counting
#[derive(Debug)]
pub enum Error {
    /// A pattern string could not be compiled. `offset` is a byte offset into `pattern`.
    PatternSyntax { pattern: String, offset: usize, message: String },
    Configuration(String),
    /// A token record broke the corpus schema. `line` is 1-based.
    CorpusFormat { line: usize, message: String },
    IOError(io::Error),
    MissingFile(String, Option<io::Error>),
    Config(serde_yaml::Error),
    ParseInt(num::ParseIntError),
    /// Some corpus files could not be processed, so nothing was aggregated.
    IncompleteRun(Vec<PathBuf>),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::PatternSyntax { ref pattern, offset, ref message } => {
                write!(f, "Pattern syntax error at offset {} in {:?}: {}", offset, pattern, message)
            }
            Error::Configuration(ref info) => write!(f, "Configuration error: {}", info),
            Error::CorpusFormat { line, ref message } => {
                write!(f, "Corpus format error on line {}: {}", line, message)
            }
            Error::IOError(ref err) => write!(f, "IO error: {}", err),
            Error::MissingFile(ref info, ref opt_err) => {
                write!(f,
                    "The {} could not be opened. Wrong directory? The OS error was: ",
                    info)?;
                if let Some(ref err) = *opt_err { write!(f, "{}", err) }
                else { write!(f, "Unknown") }
            },
            Error::Config(ref err) => write!(f, "Error reading configuration: {}", err),
            Error::ParseInt(ref err) => write!(f, "Error parsing count: {}", err),
            Error::IncompleteRun(ref failed) => {
                write!(f, "{} corpus file(s) failed, rerun with --resume: {:?}",
                    failed.len(), failed)
            }
            Error::Other(ref info) => write!(f, "{}", info),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IOError(ref err) => Some(err),
            Error::MissingFile(_, Some(ref err)) => Some(err),
            Error::Config(ref err) => Some(err),
            Error::ParseInt(ref err) => Some(err),
            _ => None,
        }
    }
}

impl Error {
    pub fn pattern<P: Into<String>, M: Into<String>>(pattern: P, offset: usize, message: M) -> Self {
        Error::PatternSyntax { pattern: pattern.into(), offset, message: message.into() }
    }

    pub fn configuration<M: Into<String>>(message: M) -> Self {
        Error::Configuration(message.into())
    }

    pub fn corpus<M: Into<String>>(line: usize, message: M) -> Self {
        Error::CorpusFormat { line, message: message.into() }
    }
}

//
// Convert everything else into Error
//
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IOError(err)
    }
}
impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err)
    }
}
impl From<num::ParseIntError> for Error {
    fn from(err: num::ParseIntError) -> Self {
        Error::ParseInt(err)
    }
}

//
// Convert Error into a general io Error
//
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(io::ErrorKind::Other, err)
    }
}
