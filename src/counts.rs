//! Count tables and their tab separated serialization
//!
//! Pair tables are rows of `target<TAB>context<TAB>count` and target tables rows of
//! `target<TAB>count`. Tables are always written sorted, so the same counts give the same bytes.
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use rayon::prelude::*;
use crate::errors::*;
use crate::farm::{new_farm, FarmMap};
use crate::features::Observation;

/// (target, context) counts plus the number of occurrences of every target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountTable {
    pairs: FarmMap<(String, String), u64>,
    targets: FarmMap<String, u64>,
}

impl CountTable {
    pub fn new() -> CountTable {
        CountTable { pairs: new_farm(), targets: new_farm() }
    }

    pub fn increment(&mut self, target: &str, context: &str, amount: u64) {
        *self.pairs.entry((target.to_string(), context.to_string())).or_insert(0) += amount;
    }

    pub fn increment_target(&mut self, target: &str, amount: u64) {
        *self.targets.entry(target.to_string()).or_insert(0) += amount;
    }

    /// One target occurrence and one count per context
    pub fn add(&mut self, observation: &Observation) {
        self.increment_target(&observation.target, 1);
        for context in &observation.contexts {
            self.increment(&observation.target, context, 1);
        }
    }

    pub fn get(&self, target: &str, context: &str) -> u64 {
        // Tuple keys can't be borrowed as (&str, &str), so this allocates.
        *self.pairs.get(&(target.to_string(), context.to_string())).unwrap_or(&0)
    }

    pub fn target(&self, target: &str) -> u64 {
        *self.targets.get(target).unwrap_or(&0)
    }

    /// Number of distinct pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.targets.is_empty()
    }

    pub fn distinct_targets(&self) -> usize {
        self.targets.len()
    }

    /// Add every count of `other` into this table
    pub fn merge(&mut self, other: CountTable) {
        for (key, n) in other.pairs {
            *self.pairs.entry(key).or_insert(0) += n;
        }
        for (key, n) in other.targets {
            *self.targets.entry(key).or_insert(0) += n;
        }
    }

    /// Sum two tables, folding the smaller into the larger
    pub fn merged(self, other: CountTable) -> CountTable {
        let (mut big, small) = if self.len() >= other.len() { (self, other) } else { (other, self) };
        big.merge(small);
        big
    }

    pub fn sorted_pairs(&self) -> Vec<(&str, &str, u64)> {
        let mut rows: Vec<(&str, &str, u64)> = self.pairs.iter()
            .map(|(&(ref t, ref c), &n)| (t.as_str(), c.as_str(), n))
            .collect();
        rows.sort_unstable();
        rows
    }

    pub fn sorted_targets(&self) -> Vec<(&str, u64)> {
        let mut rows: Vec<(&str, u64)> = self.targets.iter()
            .map(|(t, &n)| (t.as_str(), n))
            .collect();
        rows.sort_unstable();
        rows
    }

    pub fn write_pairs<W: Write>(&self, mut writer: W) -> Result<()> {
        for (target, context, n) in self.sorted_pairs() {
            writeln!(writer, "{}\t{}\t{}", target, context, n)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_targets<W: Write>(&self, mut writer: W) -> Result<()> {
        for (target, n) in self.sorted_targets() {
            writeln!(writer, "{}\t{}", target, n)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Add the rows of a pair table
    pub fn read_pairs<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut fields = line.rsplitn(2, '\t');
            let count = fields.next().unwrap_or("");
            let mut key = fields.next().unwrap_or("").splitn(2, '\t');
            match (key.next(), key.next()) {
                (Some(target), Some(context)) => self.increment(target, context, count.parse()?),
                _ => return Err(Error::Other(format!(
                    "row {} of a pair table should be target, context and count: {:?}", i + 1, line))),
            }
        }
        Ok(())
    }

    /// Add the rows of a target table
    pub fn read_targets<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut fields = line.rsplitn(2, '\t');
            match (fields.next(), fields.next()) {
                (Some(count), Some(target)) => self.increment_target(target, count.parse()?),
                _ => return Err(Error::Other(format!(
                    "row {} of a target table should be target and count: {:?}", i + 1, line))),
            }
        }
        Ok(())
    }

    /// Write `pairs` and `targets` files, each atomically
    pub fn save(&self, pairs: &Path, targets: &Path) -> Result<()> {
        write_atomic(pairs, |w| self.write_pairs(w))?;
        write_atomic(targets, |w| self.write_targets(w))
    }

    pub fn load(pairs: &Path, targets: &Path) -> Result<CountTable> {
        let mut table = CountTable::new();
        table.read_pairs(open_table(pairs)?)?;
        table.read_targets(open_table(targets)?)?;
        Ok(table)
    }
}

fn open_table(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::MissingFile(format!("count table {}", path.display()), Some(e)))
}

/// Write through a temporary sibling file and rename it into place, so readers never see a
/// partial file
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
    where F: FnOnce(&mut BufWriter<File>) -> Result<()> {
    let mut tmp = PathBuf::from(path);
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    tmp.set_file_name(name);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Sum any number of tables. The order of the inputs does not matter.
pub fn merge_all(tables: Vec<CountTable>) -> CountTable {
    tables.into_par_iter().reduce(CountTable::new, CountTable::merged)
}
