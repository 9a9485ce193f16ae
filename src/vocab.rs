//! Line-delimited word lists used as vocabulary filters and `file(...)` constraints
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::iter::FromIterator;
use std::path::Path;
use crate::errors::*;
use crate::farm::{fingerprint, FarmSet};

/// A set of allowed strings, one per line in its source file.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: FarmSet<String>,
}

impl Vocabulary {
    /// Read a vocabulary. Surrounding whitespace is stripped and empty lines are skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vocabulary> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::MissingFile(format!("word list {}", path.display()), Some(e)))?;
        let mut entries = FarmSet::default();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let entry = line.trim();
            if !entry.is_empty() {
                entries.insert(entry.to_string());
            }
        }
        debug!("Loaded {} entries from {}", entries.len(), path.display());
        Ok(Vocabulary { entries })
    }

    /// Same as `load`, but every entry is lower-cased
    pub fn load_lowercase<P: AsRef<Path>>(path: P) -> Result<Vocabulary> {
        let mut vocab = Vocabulary::load(path)?;
        vocab.entries = vocab.entries.into_iter().map(|e| e.to_lowercase()).collect();
        Ok(vocab)
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted entries, used to fingerprint a configuration
    pub fn sorted(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = self.entries.iter().map(|e| e.as_str()).collect();
        entries.sort();
        entries
    }

    pub fn fingerprint(&self) -> u64 {
        fingerprint(&self.sorted())
    }
}

impl<S: Into<String>> FromIterator<S> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Vocabulary {
        Vocabulary {
            entries: iter.into_iter().map(|s| s.into()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_trimmed_non_empty_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "dog-N\n  cat-N \n\nbark-V\n").unwrap();
        let vocab = Vocabulary::load(file.path()).unwrap();
        assert_eq!(vocab.len(), 3);
        assert!(vocab.contains("cat-N"));
        assert!(!vocab.contains(""));
        assert_eq!(vocab.sorted(), vec!["bark-V", "cat-N", "dog-N"]);
    }

    #[test]
    fn missing_file_names_its_role() {
        match Vocabulary::load("/nonexistent/depcount/words.txt") {
            Err(Error::MissingFile(info, Some(_))) => assert!(info.contains("word list")),
            other => panic!("expected a missing file error, got {:?}", other),
        }
    }

    #[test]
    fn lowercase_variant() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Rows").unwrap();
        let vocab = Vocabulary::load_lowercase(file.path()).unwrap();
        assert!(vocab.contains("rows"));
    }
}
