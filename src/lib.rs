//! Pivot/context co-occurrence counts from dependency parsed corpora
//!
//! Pivots are single tokens, linear bigrams found by a token pattern, or dependency arcs.
//! Each pivot occurrence is counted together with the bag of words around it, and the counts of
//! many corpus files are summed into one table. The binaries under `src/bin` mostly wire command
//! line options into [`pipeline::CountSumPipeline`].

#[macro_use] extern crate log;
pub mod errors;
pub mod farm;
pub mod sentence;
pub mod corpus;
pub mod vocab;
pub mod format;
pub mod pattern;
pub mod matchers;
pub mod features;
pub mod counts;
pub mod config;
pub mod pipeline;
