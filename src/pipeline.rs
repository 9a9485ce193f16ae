//! Count extraction over many corpus files
//!
//! Every corpus file is an independent unit of work. A unit moves from `Pending` through
//! `Processing` to `Completed` (or `Failed`). Its partial counts are written under
//! `<output>/partial/` and only then marked done, so an interrupted run never leaves a half
//! written unit marked as complete. With `resume`, completed units are loaded instead of
//! recomputed. The partial tables are finally summed into `<output>/counts.tsv` and
//! `<output>/targets.tsv`.
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::config::Config;
use crate::corpus::{open_corpus, CorpusOptions, SentenceStreamer};
use crate::counts::{merge_all, write_atomic, CountTable};
use crate::errors::*;
use crate::farm::{fingerprint, FarmSet};
use crate::features::TargetsFeaturesExtractor;

pub const PARTIAL_DIR: &str = "partial";
pub const COUNTS_FILE: &str = "counts.tsv";
pub const TARGETS_FILE: &str = "targets.tsv";
const DEFAULT_PROGRESS_EVERY: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One unit after another in this process
    Debug,
    /// Units in parallel on a thread pool
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Called when a unit starts processing. An error fails the unit.
pub type ProcessHook = Arc<dyn Fn(&Path) -> Result<()> + Send + Sync>;

/// What a completed unit saw. Stored as its done marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub source: String,
    pub signature: String,
    pub sentences: u64,
    pub skipped_sentences: u64,
    pub observations: u64,
}

/// The files belonging to one corpus file's unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub corpus: PathBuf,
    pub name: String,
    dir: PathBuf,
}

impl WorkUnit {
    fn path(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, suffix))
    }

    pub fn pairs_path(&self) -> PathBuf {
        self.path("pairs.tsv")
    }

    pub fn targets_path(&self) -> PathBuf {
        self.path("targets.tsv")
    }

    pub fn done_path(&self) -> PathBuf {
        self.path("done")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path("lock")
    }

    /// Completed for this configuration, with both tables in place
    pub fn is_completed(&self, signature: &str) -> bool {
        let marker = match fs::read_to_string(self.done_path()) {
            Ok(text) => text,
            Err(_) => return false,
        };
        match serde_yaml::from_str::<UnitStats>(&marker) {
            Ok(ref stats) if stats.signature == signature => {
                self.pairs_path().exists() && self.targets_path().exists()
            }
            Ok(_) => {
                warn!("{}: done marker belongs to another configuration", self.name);
                false
            }
            Err(e) => {
                warn!("{}: unreadable done marker ({}), recomputing", self.name, e);
                false
            }
        }
    }

    /// Take exclusive ownership of the unit. `None` if another worker holds it.
    fn claim(&self) -> Result<Option<Claim>> {
        let path = self.lock_path();
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Some(Claim { path }))
            }
            Err(ref e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Removes the lock file when the unit is finished, whatever the outcome
struct Claim {
    path: PathBuf,
}

impl Drop for Claim {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not release {}: {}", self.path.display(), e);
        }
    }
}

/// How a unit got its counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Computed,
    Reused,
}

/// Summary of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub computed: Vec<PathBuf>,
    pub reused: Vec<PathBuf>,
    pub pairs: usize,
    pub targets: usize,
}

struct RunSettings {
    resume: bool,
    progress_every: usize,
}

/// Sums pivot/context counts over a list of corpus files
pub struct CountSumPipeline {
    output_dir: PathBuf,
    extractor: TargetsFeaturesExtractor,
    corpora: Vec<PathBuf>,
    corpus_options: CorpusOptions,
    hook: Option<ProcessHook>,
}

impl CountSumPipeline {
    /// Corpus files listed twice are only counted once.
    pub fn new<P: Into<PathBuf>>(output_dir: P, extractor: TargetsFeaturesExtractor,
                                 corpora: Vec<PathBuf>, corpus_options: CorpusOptions) -> Self {
        let mut seen = FarmSet::default();
        let corpora = corpora.into_iter()
            .filter(|c| {
                let fresh = seen.insert(c.clone());
                if !fresh {
                    warn!("{} is listed more than once, counting it once", c.display());
                }
                fresh
            })
            .collect();
        CountSumPipeline {
            output_dir: output_dir.into(),
            extractor,
            corpora,
            corpus_options,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: ProcessHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn partial_dir(&self) -> PathBuf {
        self.output_dir.join(PARTIAL_DIR)
    }

    /// Everything that changes the counts of a file
    pub fn signature(&self) -> String {
        format!("{};separator={};to_lower={}",
            self.extractor.signature(), self.corpus_options.separator, self.corpus_options.to_lower)
    }

    pub fn units(&self) -> Vec<WorkUnit> {
        let signature = self.signature();
        let dir = self.partial_dir();
        self.corpora.iter().map(|corpus| {
            let absolute = fs::canonicalize(corpus).unwrap_or_else(|_| corpus.clone());
            let stem: String = corpus.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
                .collect();
            let id = fingerprint(&[absolute.to_string_lossy().as_bytes(), signature.as_bytes()]);
            WorkUnit { corpus: corpus.clone(), name: format!("{}-{:016x}", stem, id), dir: dir.clone() }
        }).collect()
    }

    /// Count one corpus file in memory. Malformed sentences are skipped and logged.
    pub fn process_file(&self, corpus: &Path, progress_every: usize) -> Result<(CountTable, UnitStats)> {
        let reader = open_corpus(corpus, self.corpus_options.gzip)?;
        let mut table = CountTable::new();
        let mut stats = UnitStats {
            source: corpus.display().to_string(),
            signature: self.signature(),
            ..Default::default()
        };
        for sentence in SentenceStreamer::new(reader, &self.corpus_options) {
            match sentence {
                Ok(sentence) => {
                    stats.sentences += 1;
                    for observation in self.extractor.observations(&sentence) {
                        stats.observations += 1;
                        table.add(&observation);
                    }
                    if progress_every > 0 && stats.sentences % progress_every as u64 == 0 {
                        info!("{}: {} sentences, {} distinct pairs so far",
                            corpus.display(), stats.sentences, table.len());
                    }
                }
                Err(Error::CorpusFormat { line, message }) => {
                    warn!("{}: skipping sentence starting on line {}: {}", corpus.display(), line, message);
                    stats.skipped_sentences += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok((table, stats))
    }

    fn run_unit(&self, unit: &WorkUnit, settings: &RunSettings) -> Result<(Outcome, CountTable)> {
        let signature = self.signature();
        if settings.resume && unit.is_completed(&signature) {
            info!("{}: already completed, skipping {}", unit.name, unit.corpus.display());
            return Ok((Outcome::Reused, CountTable::load(&unit.pairs_path(), &unit.targets_path())?));
        }
        let _claim = unit.claim()?.ok_or_else(|| Error::Other(format!(
            "{} is claimed by another worker ({} exists)", unit.corpus.display(), unit.lock_path().display())))?;
        info!("{}: {:?} -> {:?} ({})", unit.name, UnitState::Pending, UnitState::Processing, unit.corpus.display());

        // An old marker must not vouch for the tables being rewritten
        if unit.done_path().exists() {
            fs::remove_file(unit.done_path())?;
        }
        if let Some(ref hook) = self.hook {
            hook(&unit.corpus)?;
        }
        let (table, stats) = self.process_file(&unit.corpus, settings.progress_every)?;
        table.save(&unit.pairs_path(), &unit.targets_path())?;
        let marker = serde_yaml::to_string(&stats)?;
        write_atomic(&unit.done_path(), |w| Ok(w.write_all(marker.as_bytes())?))?;
        info!("{}: {:?} -> {:?}: {} sentences ({} skipped), {} observations, {} distinct pairs",
            unit.name, UnitState::Processing, UnitState::Completed,
            stats.sentences, stats.skipped_sentences, stats.observations, table.len());
        Ok((Outcome::Computed, table))
    }

    /// Lock files left behind by a process that died
    fn break_stale_claims(&self) -> Result<()> {
        for entry in fs::read_dir(self.partial_dir())? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "lock") {
                warn!("Removing stale claim {}", path.display());
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Process every corpus file and write the summed tables.
    ///
    /// Recognized settings: `threads`, `break_stale_claims` and `progress_every`.
    pub fn run(&self, mode: RunMode, resume: bool, config: &Config) -> Result<RunReport> {
        let settings = RunSettings {
            resume,
            progress_every: config.get_usize("progress_every")?.unwrap_or(DEFAULT_PROGRESS_EVERY),
        };
        fs::create_dir_all(self.partial_dir())?;
        if config.get_bool("break_stale_claims")?.unwrap_or(mode == RunMode::Debug) {
            self.break_stale_claims()?;
        }

        let units = self.units();
        info!("{} corpus files, {:?} mode, resume={}, output in {}",
            units.len(), mode, resume, self.output_dir.display());
        let run_one = |unit: &WorkUnit| {
            let result = self.run_unit(unit, &settings);
            if let Err(ref e) = result {
                error!("{}: {:?} -> {:?}: {}", unit.name, UnitState::Processing, UnitState::Failed, e);
            }
            result
        };
        let results: Vec<Result<(Outcome, CountTable)>> = match mode {
            RunMode::Debug => units.iter().map(run_one).collect(),
            RunMode::Production => {
                let mut builder = rayon::ThreadPoolBuilder::new();
                if let Some(threads) = config.get_usize("threads")? {
                    builder = builder.num_threads(threads);
                }
                let pool = builder.build()
                    .map_err(|e| Error::Other(format!("Could not start worker threads: {}", e)))?;
                pool.install(|| units.par_iter().map(run_one).collect())
            }
        };

        let mut report = RunReport::default();
        let mut failed = vec![];
        let mut tables = Vec::with_capacity(results.len());
        for (unit, result) in units.iter().zip(results) {
            match result {
                Ok((Outcome::Computed, table)) => {
                    report.computed.push(unit.corpus.clone());
                    tables.push(table);
                }
                Ok((Outcome::Reused, table)) => {
                    report.reused.push(unit.corpus.clone());
                    tables.push(table);
                }
                Err(_) => failed.push(unit.corpus.clone()),
            }
        }
        if !failed.is_empty() {
            return Err(Error::IncompleteRun(failed));
        }

        let total = merge_all(tables);
        total.save(&self.output_dir.join(COUNTS_FILE), &self.output_dir.join(TARGETS_FILE))?;
        report.pairs = total.len();
        report.targets = total.distinct_targets();
        info!("Wrote {} pairs over {} targets ({} files computed, {} reused)",
            report.pairs, report.targets, report.computed.len(), report.reused.len());
        Ok(report)
    }
}
