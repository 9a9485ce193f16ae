//! Count pivot/context co-occurrences in dependency parsed corpora
//!
//! Every corpus file is counted on its own under `<output>/partial/`, then the counts are summed
//! into `<output>/counts.tsv` (target, context, count) and `<output>/targets.tsv` (target, count).
//! With `--resume`, files already counted with the same options are not read again.

// Argument parsing
#[macro_use] extern crate clap;
// logging
#[macro_use] extern crate log;
extern crate env_logger;
// lastly, this library
extern crate depcount;

use std::path::{Path, PathBuf};
use depcount::config::{load_config, Config};
use depcount::corpus::CorpusOptions;
use depcount::errors::*;
use depcount::features::{parse_window, BowFeatureExtractor, TargetFilters, TargetsFeaturesExtractor};
use depcount::format::Template;
use depcount::matchers::{composition_matchers, ArcFilterOptions, CompositionOptions};
use depcount::pattern::PatternOptions;
use depcount::pipeline::{CountSumPipeline, RunMode};
use depcount::vocab::Vocabulary;

const DEFAULT_CONFIG: &str = "config.yml";

pub fn main() {
    // Main can't return a Result, and the ? operator needs the enclosing function to return Result
    inner_main().expect("Could not recover. Exiting.");
}

pub fn inner_main() -> Result<()> {
    env_logger::init();
    let args = app_from_crate!()
        .args_from_usage(
            "<corpora>...                'dependency parsed corpus files'
            -C, --config [FILE]          'YAML settings (default: config.yml if it exists)'
            -D, --debug                  'process the files one by one in this process'
            --resume                     'reuse the counts of files finished by an earlier run'
            -o, --output [DIR]           'output directory (default: output)'
            -z, --gzip                   'corpus files are gzipped, whatever their name'
            -w, --window [SIZE]          'context tokens on each side of a pivot (default: the whole sentence)'
            -s, --separator [TAG]        'tag name delimiting sentences (default: s)'
            -x, --token_sep [SEP]        'separator between the two items of a bigram target (default: <-->)'
            --only-content               'only nouns, adjectives, verbs and adverbs as targets and contexts'
            --targets0 [FILE]            'allowed single token targets, one per line'
            --targets1 [FILE]            'allowed first items of bigram targets'
            --targets2 [FILE]            'allowed second items of bigram targets'
            -c, --contexts [FILE]        'allowed contexts, one per line'
            -i, --ignore_case            'case insensitive pattern and arc tests'
            --to-lower                   'lower-case words and lemmas while reading (word lists are used as written)'
            --target-format [TEMPLATE]   'how targets are written (default: {lemma}-{cat})'
            --context-format [TEMPLATE]  'how contexts are written (default: {lemma}-{cat})'
            --no-unigrams                'do not count single token targets'
            -l, --linear-comp [PATTERN]  'count the first and last token of every match of this pattern'
            --deprel [REGEX]             'count dependency arcs with this relation'
            --depword [REGEX]            'arc dependents must have this word'
            --deplemma [REGEX]           'arc dependents must have this lemma'
            --deppos [REGEX]             'arc dependents must have this part of speech'
            --depfile [FILE]             'arc dependents must be listed in this file'
            --headword [REGEX]           'arc heads must have this word'
            --headlemma [REGEX]          'arc heads must have this lemma'
            --headpos [REGEX]            'arc heads must have this part of speech'
            --headfile [FILE]            'arc heads must be listed in this file'")
        .get_matches();

    let config = match args.value_of("config") {
        Some(path) => load_config(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => load_config(DEFAULT_CONFIG)?,
        None => {
            warn!("No configuration given and no {} found, using defaults", DEFAULT_CONFIG);
            Config::default()
        }
    };

    // Word lists hold formatted targets and contexts and are used as written
    let vocabulary = |name: &str| -> Result<Option<Vocabulary>> {
        args.value_of(name).map(Vocabulary::load).transpose()
    };
    let template = |name: &str| -> Result<Template> {
        args.value_of(name).map_or_else(|| Ok(Template::default()), Template::parse)
    };
    let window = args.value_of("window").map(parse_window).transpose()?;
    let only_content = args.is_present("only-content");
    let target_format = template("target-format")?;

    let composition = CompositionOptions {
        unigrams: !args.is_present("no-unigrams"),
        linear: args.value_of("linear-comp").map(String::from),
        arcs: ArcFilterOptions {
            deprel: args.value_of("deprel").map(String::from),
            depword: args.value_of("depword").map(String::from),
            deplemma: args.value_of("deplemma").map(String::from),
            deppos: args.value_of("deppos").map(String::from),
            depfile: args.value_of("depfile").map(PathBuf::from),
            headword: args.value_of("headword").map(String::from),
            headlemma: args.value_of("headlemma").map(String::from),
            headpos: args.value_of("headpos").map(String::from),
            headfile: args.value_of("headfile").map(PathBuf::from),
        },
        pattern_options: PatternOptions { ignore_case: args.is_present("ignore_case"), literal: false },
    };
    let features = BowFeatureExtractor::new(window, vocabulary("contexts")?, template("context-format")?)
        .only_content(only_content);
    let filters = TargetFilters {
        unigrams: vocabulary("targets0")?,
        first: vocabulary("targets1")?,
        second: vocabulary("targets2")?,
    };
    let extractor = TargetsFeaturesExtractor::new(
        composition_matchers(&composition, &target_format)?,
        features,
        target_format,
        args.value_of("token_sep").unwrap_or(depcount::features::DEFAULT_TOKEN_SEP),
        filters)?
        .only_content(only_content);

    let corpus_options = CorpusOptions {
        gzip: args.is_present("gzip"),
        separator: args.value_of("separator").unwrap_or("s").to_string(),
        to_lower: args.is_present("to-lower"),
    };
    let corpora: Vec<PathBuf> = args.values_of("corpora")
        .map(|files| files.map(PathBuf::from).collect())
        .unwrap_or_default();
    let mode = if args.is_present("debug") { RunMode::Debug } else { RunMode::Production };

    let report = CountSumPipeline::new(args.value_of("output").unwrap_or("output"),
                                       extractor, corpora, corpus_options)
        .run(mode, args.is_present("resume"), &config)?;
    info!("Done: {} pairs, {} targets, {} files counted, {} reused",
        report.pairs, report.targets, report.computed.len(), report.reused.len());
    Ok(())
}
