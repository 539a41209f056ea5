//! CLI front-end: `--index`, `--regex`, `--query`, optional `--graph`.
//!
//! A thin collaborator, not core: translates arguments into one
//! [`ibf_regex_query::query::run`] call and reports the result. Index
//! construction proper is out of scope for this crate; `--index` here
//! names a directory of bin text files loaded by
//! [`ibf_regex_query::index::InMemoryIndex::load_from_dir`].
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ibf_regex_query::alphabet::AlphabetKind;
use ibf_regex_query::index::InMemoryIndex;
use ibf_regex_query::query::{self, QueryRequest};
use ibf_regex_query::thompson::infix_to_postfix;

/// Query a partitioned, IBF-indexed corpus for regex matches.
#[derive(Parser, Debug)]
#[command(name = "ibfq", version, about)]
struct Args {
    /// Directory of bin text files backing the index.
    #[arg(long)]
    index: PathBuf,

    /// Pattern in conventional infix syntax, used both for kNFA compilation
    /// and exact verification.
    #[arg(long)]
    regex: String,

    /// Pre-computed postfix form of `--regex`. If omitted, it is derived via
    /// shunting-yard from `--regex` itself.
    #[arg(long)]
    query: Option<String>,

    /// K-mer length the index was built with.
    #[arg(long, default_value_t = 20)]
    k: u8,

    /// Alphabet the index was built over.
    #[arg(long, value_enum, default_value_t = Alphabet::Nucleotide)]
    alphabet: Alphabet,

    /// Write the compiled kNFA to this path as a `dot` graph.
    #[arg(long)]
    graph: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum Alphabet {
    Nucleotide,
    AminoAcid,
}

impl From<Alphabet> for AlphabetKind {
    fn from(a: Alphabet) -> Self {
        match a {
            Alphabet::Nucleotide => AlphabetKind::Nucleotide,
            Alphabet::AminoAcid => AlphabetKind::AminoAcid,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let index = InMemoryIndex::load_from_dir(&args.index, args.alphabet.into(), args.k)
        .with_context(|| format!("failed to load index from {:?}", args.index))?;

    let postfix = match args.query {
        Some(q) => q,
        None => infix_to_postfix(&args.regex).context("failed to derive postfix form of --regex")?,
    };

    let request = QueryRequest {
        postfix,
        infix: args.regex,
        index: Arc::new(index),
        graph_dump: args.graph,
    };

    let report = query::run(request, &|| false).context("query failed")?;

    let hit_bins: Vec<u32> = report.hits.iter_set().collect();
    println!("hits: {hit_bins:?}");
    if !report.unverified_bins.is_empty() {
        println!("unverified (conservatively counted as hits): {:?}", report.unverified_bins);
    }
    for bin in &hit_bins {
        println!("bin {bin}: {} confirmed line(s)", report.confirmed_counts[*bin as usize]);
    }

    Ok(())
}
