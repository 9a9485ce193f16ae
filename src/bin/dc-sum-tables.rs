//! Sum pair count tables
//!
//! Adds up any number of `target<TAB>context<TAB>count` tables, such as the partial tables of
//! several `dc-count` runs. The inputs can be split between several workers, each summing its
//! own share into its own output, and the outputs summed again.

// Argument parsing
#[macro_use] extern crate clap;
// logging
#[macro_use] extern crate log;
extern crate env_logger;
extern crate rayon;
use rayon::prelude::*;
// lastly, this library
extern crate depcount;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use depcount::counts::{merge_all, write_atomic, CountTable};
use depcount::errors::*;

pub fn main() {
    // Main can't return a Result, and the ? operator needs the enclosing function to return Result
    inner_main().expect("Could not recover. Exiting.");
}

pub fn inner_main() -> Result<()> {
    env_logger::init();
    let args = app_from_crate!()
        .args_from_usage(
            "-o, --output [FILE]   'file in which to store the summed table (default: counts.tsv)'
            --size [N]            'how many workers there are (default: 1)'
            --rank [N]            'which worker am I, starting from 0 (default: 0)'
            <addends>...          'pair tables to add'")
        .get_matches();
    let output = args.value_of("output").unwrap_or("counts.tsv");
    let mut tables: Vec<&str> = args.values_of("addends")
        .map(|files| files.collect())
        .unwrap_or_default();
    tables.sort();

    let size = match args.value_of("size") { Some(n) => n.parse::<usize>()?, None => 1 };
    let rank = match args.value_of("rank") { Some(n) => n.parse::<usize>()?, None => 0 };
    if size == 0 || rank >= size {
        return Err(Error::configuration(format!("worker {} of {} does not exist", rank, size)));
    }
    let chunksize = (tables.len() + size - 1) / size;
    let total = tables.len();
    tables = tables.into_iter().skip(rank * chunksize).take(chunksize).collect();
    info!("{} files, {} workers (I'm #{}), chunks of {} (I get {}), output goes to {}",
        total, size, rank, chunksize, tables.len(), output);

    if tables.is_empty() {
        info!("No tables to add so nothing saved.");
        return Ok(());
    }
    let parts = tables.par_iter()
        .map(|name| -> Result<CountTable> {
            let file = File::open(name)
                .map_err(|e| Error::MissingFile(format!("count table {}", name), Some(e)))?;
            let mut table = CountTable::new();
            table.read_pairs(BufReader::new(file))?;
            debug!("Read {} pairs from {}", table.len(), name);
            Ok(table)
        })
        .collect::<Result<Vec<CountTable>>>()?;
    let sum = merge_all(parts);
    write_atomic(Path::new(output), |w| sum.write_pairs(w))?;
    info!("Wrote {} pairs to {}", sum.len(), output);
    Ok(())
}
