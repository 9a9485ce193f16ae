extern crate depcount;
extern crate tempfile;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use depcount::config::Config;
use depcount::corpus::CorpusOptions;
use depcount::errors::*;
use depcount::features::{BowFeatureExtractor, TargetFilters, TargetsFeaturesExtractor, DEFAULT_TOKEN_SEP};
use depcount::format::Template;
use depcount::matchers::{composition_matchers, ArcFilterOptions, CompositionMatcher, CompositionOptions};
use depcount::pipeline::{CountSumPipeline, ProcessHook, RunMode, COUNTS_FILE, TARGETS_FILE};
use depcount::vocab::Vocabulary;
use tempfile::TempDir;

/// (word, lemma, pos, head, deprel) with 1-based heads
type Row<'a> = (&'a str, &'a str, &'a str, usize, &'a str);

const THE_DOG_BARKS: &[Row] = &[
    ("the", "the", "DT", 2, "det"),
    ("dog", "dog", "NN", 3, "nsubj"),
    ("barks", "barks", "VB", 0, "root"),
];

const A_BIG_DOG_SLEEPS: &[Row] = &[
    ("a", "a", "DT", 3, "det"),
    ("big", "big", "JJ", 3, "amod"),
    ("dog", "dog", "NN", 4, "nsubj"),
    ("sleeps", "sleep", "VBZ", 0, "root"),
];

const THE_CAT_SEES_THE_DOG: &[Row] = &[
    ("The", "the", "DT", 2, "det"),
    ("cat", "cat", "NN", 3, "nsubj"),
    ("sees", "see", "VBZ", 0, "root"),
    ("the", "the", "DT", 5, "det"),
    ("dog", "dog", "NN", 3, "dobj"),
];

fn sentence(rows: &[Row]) -> String {
    let mut text = String::from("<s>\n");
    for (i, &(word, lemma, pos, head, deprel)) in rows.iter().enumerate() {
        text.push_str(&format!("{}\t{}\t{}\t{}\t{}\t{}\n", word, lemma, pos, i + 1, head, deprel));
    }
    text.push_str("</s>\n");
    text
}

fn corpus(dir: &Path, name: &str, sentences: &[&[Row]]) -> PathBuf {
    let path = dir.join(name);
    let text: String = sentences.iter().map(|rows| sentence(rows)).collect();
    fs::write(&path, text).unwrap();
    path
}

fn extractor(window: Option<usize>, contexts: Option<Vocabulary>) -> TargetsFeaturesExtractor {
    TargetsFeaturesExtractor::new(
        vec![CompositionMatcher::Unigram],
        BowFeatureExtractor::new(window, contexts, Template::default()),
        Template::default(), DEFAULT_TOKEN_SEP, TargetFilters::default()).unwrap()
}

fn pipeline(output: &Path, corpora: Vec<PathBuf>, extractor: TargetsFeaturesExtractor) -> CountSumPipeline {
    CountSumPipeline::new(output, extractor, corpora, CorpusOptions::default())
}

fn outputs(dir: &Path) -> (String, String) {
    (fs::read_to_string(dir.join(COUNTS_FILE)).unwrap(),
     fs::read_to_string(dir.join(TARGETS_FILE)).unwrap())
}

fn counting_hook() -> (ProcessHook, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let hook: ProcessHook = Arc::new(move |_: &Path| -> Result<()> {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (hook, calls)
}

fn three_corpora(dir: &Path) -> Vec<PathBuf> {
    vec![
        corpus(dir, "one.txt", &[THE_DOG_BARKS]),
        corpus(dir, "two.txt", &[A_BIG_DOG_SLEEPS, THE_DOG_BARKS]),
        corpus(dir, "three.txt", &[THE_CAT_SEES_THE_DOG]),
    ]
}

#[test]
fn the_dog_barks_with_a_window_of_one() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("output");
    let file = corpus(dir.path(), "corpus.txt", &[THE_DOG_BARKS]);
    let report = pipeline(&out, vec![file.clone()], extractor(Some(1), None))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();
    assert_eq!(report.computed, vec![file]);
    assert_eq!(report.pairs, 4);
    let (counts, targets) = outputs(&out);
    assert_eq!(counts, "barks-V\tdog-N\t1\ndog-N\tbarks-V\t1\ndog-N\tthe-D\t1\nthe-D\tdog-N\t1\n");
    assert_eq!(targets, "barks-V\t1\ndog-N\t1\nthe-D\t1\n");
}

#[test]
fn dependency_arcs_count_dependent_and_head() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("output");
    let file = corpus(dir.path(), "corpus.txt", &[A_BIG_DOG_SLEEPS]);
    let options = CompositionOptions {
        unigrams: false,
        arcs: ArcFilterOptions { deprel: Some("amod".to_string()), ..Default::default() },
        ..Default::default()
    };
    let matchers = composition_matchers(&options, &Template::default()).unwrap();
    let extractor = TargetsFeaturesExtractor::new(matchers,
        BowFeatureExtractor::new(None, None, Template::default()),
        Template::default(), DEFAULT_TOKEN_SEP, TargetFilters::default()).unwrap();
    pipeline(&out, vec![file], extractor).run(RunMode::Debug, false, &Config::default()).unwrap();
    let (counts, targets) = outputs(&out);
    assert_eq!(counts, "big-J<-->dog-N\ta-D\t1\nbig-J<-->dog-N\tsleep-V\t1\n");
    assert_eq!(targets, "big-J<-->dog-N\t1\n");
}

#[test]
fn resuming_after_a_crash_counts_every_file_once() {
    let dir = TempDir::new().unwrap();
    let corpora = three_corpora(dir.path());

    let clean = dir.path().join("clean");
    pipeline(&clean, corpora.clone(), extractor(Some(2), None))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();

    let out = dir.path().join("output");
    let doomed = corpora[1].clone();
    let crash: ProcessHook = Arc::new(move |path: &Path| -> Result<()> {
        if path == doomed.as_path() {
            Err(Error::Other("simulated crash".to_string()))
        } else {
            Ok(())
        }
    });
    match pipeline(&out, corpora.clone(), extractor(Some(2), None))
        .with_hook(crash)
        .run(RunMode::Debug, true, &Config::default()) {
        Err(Error::IncompleteRun(failed)) => assert_eq!(failed, vec![corpora[1].clone()]),
        other => panic!("expected an incomplete run, got {:?}", other.map(|r| r.computed)),
    }
    assert!(!out.join(COUNTS_FILE).exists());
    assert!(!out.join(TARGETS_FILE).exists());

    let (hook, calls) = counting_hook();
    let report = pipeline(&out, corpora.clone(), extractor(Some(2), None))
        .with_hook(hook)
        .run(RunMode::Debug, true, &Config::default())
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.computed, vec![corpora[1].clone()]);
    assert_eq!(report.reused, vec![corpora[0].clone(), corpora[2].clone()]);
    assert_eq!(outputs(&out), outputs(&clean));
}

#[test]
fn a_second_resumed_run_reads_nothing_again() {
    let dir = TempDir::new().unwrap();
    let corpora = three_corpora(dir.path());
    let out = dir.path().join("output");
    pipeline(&out, corpora.clone(), extractor(Some(1), None))
        .run(RunMode::Production, false, &Config::default())
        .unwrap();
    let first = outputs(&out);

    let (hook, calls) = counting_hook();
    let report = pipeline(&out, corpora.clone(), extractor(Some(1), None))
        .with_hook(hook)
        .run(RunMode::Production, true, &Config::default())
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(report.computed.is_empty());
    assert_eq!(report.reused.len(), 3);
    assert_eq!(outputs(&out), first);
}

#[test]
fn without_resume_everything_is_recounted() {
    let dir = TempDir::new().unwrap();
    let corpora = three_corpora(dir.path());
    let out = dir.path().join("output");
    pipeline(&out, corpora.clone(), extractor(Some(1), None))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();
    let first = outputs(&out);

    let (hook, calls) = counting_hook();
    pipeline(&out, corpora, extractor(Some(1), None))
        .with_hook(hook)
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(outputs(&out), first);
}

#[test]
fn changing_the_options_does_not_reuse_old_counts() {
    let dir = TempDir::new().unwrap();
    let corpora = three_corpora(dir.path());
    let out = dir.path().join("output");
    pipeline(&out, corpora.clone(), extractor(Some(1), None))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();

    let (hook, calls) = counting_hook();
    let report = pipeline(&out, corpora, extractor(Some(2), None))
        .with_hook(hook)
        .run(RunMode::Debug, true, &Config::default())
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(report.reused.is_empty());
}

#[test]
fn file_order_and_partitioning_do_not_matter() {
    let dir = TempDir::new().unwrap();
    let corpora = three_corpora(dir.path());
    let settings = Config::parse("threads: 2\n").unwrap();

    let forward = dir.path().join("forward");
    pipeline(&forward, corpora.clone(), extractor(None, None))
        .run(RunMode::Production, false, &settings)
        .unwrap();

    let backward = dir.path().join("backward");
    let reversed: Vec<PathBuf> = corpora.iter().rev().cloned().collect();
    pipeline(&backward, reversed, extractor(None, None))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();

    let together = dir.path().join("together");
    let single = corpus(dir.path(), "all.txt",
        &[THE_CAT_SEES_THE_DOG, THE_DOG_BARKS, A_BIG_DOG_SLEEPS, THE_DOG_BARKS]);
    pipeline(&together, vec![single], extractor(None, None))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();

    assert_eq!(outputs(&forward), outputs(&backward));
    assert_eq!(outputs(&forward), outputs(&together));
    assert!(outputs(&forward).1.contains("dog-N\t4\n"));
}

fn rows(counts: &str) -> HashMap<(String, String), u64> {
    counts.lines()
        .map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            ((fields[0].to_string(), fields[1].to_string()), fields[2].parse().unwrap())
        })
        .collect()
}

#[test]
fn context_vocabularies_only_remove_rows() {
    let dir = TempDir::new().unwrap();
    let corpora = three_corpora(dir.path());
    let allowed: Vocabulary = vec!["dog-N", "the-D"].into_iter().collect();

    let all = dir.path().join("all");
    pipeline(&all, corpora.clone(), extractor(Some(2), None))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();
    let some = dir.path().join("some");
    pipeline(&some, corpora, extractor(Some(2), Some(allowed.clone())))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();

    let (all_counts, all_targets) = outputs(&all);
    let (some_counts, some_targets) = outputs(&some);
    let all_rows = rows(&all_counts);
    let some_rows = rows(&some_counts);
    assert!(!some_rows.is_empty());
    for (key, n) in &some_rows {
        assert!(allowed.contains(&key.1));
        assert_eq!(all_rows.get(key), Some(n));
    }
    for (key, n) in &all_rows {
        if allowed.contains(&key.1) {
            assert_eq!(some_rows.get(key), Some(n));
        }
    }
    assert_eq!(all_targets, some_targets);
}

#[test]
fn a_failing_file_leaves_the_others_intact() {
    let dir = TempDir::new().unwrap();
    let good = corpus(dir.path(), "good.txt", &[THE_DOG_BARKS]);
    let missing = dir.path().join("missing.txt");
    let out = dir.path().join("output");
    let p = pipeline(&out, vec![good.clone(), missing.clone()], extractor(Some(1), None));
    match p.run(RunMode::Production, true, &Config::default()) {
        Err(Error::IncompleteRun(failed)) => assert_eq!(failed, vec![missing]),
        other => panic!("expected an incomplete run, got {:?}", other.map(|r| r.computed)),
    }
    assert!(!out.join(COUNTS_FILE).exists());

    let units = p.units();
    assert!(units[0].is_completed(&p.signature()));
    assert!(!units[1].done_path().exists());
    assert!(!units[1].lock_path().exists());
    let saved = depcount::counts::CountTable::load(&units[0].pairs_path(), &units[0].targets_path()).unwrap();
    let (fresh, _) = p.process_file(&good, 0).unwrap();
    assert_eq!(saved, fresh);
}

#[test]
fn malformed_sentences_are_skipped() {
    let dir = TempDir::new().unwrap();
    let clean = corpus(dir.path(), "clean.txt", &[THE_DOG_BARKS, THE_CAT_SEES_THE_DOG]);
    let dirty = dir.path().join("dirty.txt");
    let text = format!("{}<s>\nbroken\tline\n</s>\n<s>\nx\tx\tNN\t1\t9\tdep\n</s>\n{}",
        sentence(THE_DOG_BARKS), sentence(THE_CAT_SEES_THE_DOG));
    fs::write(&dirty, text).unwrap();

    let p = pipeline(dir.path(), vec![], extractor(Some(1), None));
    let (clean_counts, clean_stats) = p.process_file(&clean, 0).unwrap();
    let (dirty_counts, dirty_stats) = p.process_file(&dirty, 0).unwrap();
    assert_eq!(clean_counts, dirty_counts);
    assert_eq!(clean_stats.sentences, 2);
    assert_eq!(dirty_stats.sentences, 2);
    assert_eq!(dirty_stats.skipped_sentences, 2);
}

#[test]
fn gzipped_corpora_count_like_plain_ones() {
    use std::io::Write;
    let dir = TempDir::new().unwrap();
    let plain = corpus(dir.path(), "plain.txt", &[THE_DOG_BARKS]);
    let zipped = dir.path().join("zipped.txt.gz");
    {
        let mut encoder = flate2::write::GzEncoder::new(
            fs::File::create(&zipped).unwrap(), flate2::Compression::default());
        encoder.write_all(sentence(THE_DOG_BARKS).as_bytes()).unwrap();
        encoder.finish().unwrap();
    }
    let p = pipeline(dir.path(), vec![], extractor(None, None));
    assert_eq!(p.process_file(&plain, 0).unwrap().0, p.process_file(&zipped, 0).unwrap().0);
}

#[test]
fn lower_cased_corpora_match_lower_case_word_lists() {
    let dir = TempDir::new().unwrap();
    let file = corpus(dir.path(), "shouting.txt", &[&[
        ("The", "The", "DT", 2, "det"),
        ("Dog", "Dog", "NN", 3, "nsubj"),
        ("Barks", "Bark", "VBZ", 0, "root"),
    ]]);
    let list = dir.path().join("contexts.txt");
    fs::write(&list, "dog-N\nthe-D\n").unwrap();
    let contexts = Vocabulary::load(&list).unwrap();

    let options = CorpusOptions { to_lower: true, ..Default::default() };
    let out = dir.path().join("output");
    CountSumPipeline::new(&out, extractor(None, Some(contexts)), vec![file], options)
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();
    let (counts, targets) = outputs(&out);
    assert_eq!(counts, "bark-V\tdog-N\t1\nbark-V\tthe-D\t1\ndog-N\tthe-D\t1\nthe-D\tdog-N\t1\n");
    assert_eq!(targets, "bark-V\t1\ndog-N\t1\nthe-D\t1\n");
}

fn linear(filters: TargetFilters) -> TargetsFeaturesExtractor {
    let options = CompositionOptions {
        unigrams: false,
        linear: Some("T<pos=JJ>T<pos=NN>".to_string()),
        ..Default::default()
    };
    TargetsFeaturesExtractor::new(composition_matchers(&options, &Template::default()).unwrap(),
        BowFeatureExtractor::new(Some(1), None, Template::default()),
        Template::default(), DEFAULT_TOKEN_SEP, filters).unwrap()
}

#[test]
fn linear_patterns_count_their_first_and_last_token() {
    let dir = TempDir::new().unwrap();
    let file = corpus(dir.path(), "corpus.txt", &[A_BIG_DOG_SLEEPS, THE_DOG_BARKS]);

    let out = dir.path().join("output");
    pipeline(&out, vec![file.clone()], linear(TargetFilters::default()))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();
    let (counts, targets) = outputs(&out);
    assert_eq!(counts, "big-J<-->dog-N\ta-D\t1\nbig-J<-->dog-N\tsleep-V\t1\n");
    assert_eq!(targets, "big-J<-->dog-N\t1\n");

    let cats_only = TargetFilters { second: Some(vec!["cat-N"].into_iter().collect()), ..Default::default() };
    let filtered = dir.path().join("filtered");
    pipeline(&filtered, vec![file], linear(cats_only))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();
    assert_eq!(outputs(&filtered), (String::new(), String::new()));
}

#[test]
fn target_vocabularies_only_remove_rows() {
    let dir = TempDir::new().unwrap();
    let corpora = three_corpora(dir.path());
    let allowed: Vocabulary = vec!["dog-N", "cat-N"].into_iter().collect();
    let filters = TargetFilters { unigrams: Some(allowed.clone()), ..Default::default() };
    let restricted = TargetsFeaturesExtractor::new(
        vec![CompositionMatcher::Unigram],
        BowFeatureExtractor::new(Some(2), None, Template::default()),
        Template::default(), DEFAULT_TOKEN_SEP, filters).unwrap();

    let all = dir.path().join("all");
    pipeline(&all, corpora.clone(), extractor(Some(2), None))
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();
    let some = dir.path().join("some");
    pipeline(&some, corpora, restricted)
        .run(RunMode::Debug, false, &Config::default())
        .unwrap();

    let all_rows = rows(&outputs(&all).0);
    let some_rows = rows(&outputs(&some).0);
    assert!(!some_rows.is_empty());
    for (key, n) in &some_rows {
        assert!(allowed.contains(&key.0));
        assert_eq!(all_rows.get(key), Some(n));
    }
    for (key, n) in &all_rows {
        if allowed.contains(&key.0) {
            assert_eq!(some_rows.get(key), Some(n));
        }
    }
    assert_eq!(outputs(&some).1, "cat-N\t1\ndog-N\t4\n");
}
