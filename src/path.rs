//! Path enumeration (DFS) and path intersection.
//!
//! Grounded on `original_source/src/query.cpp`'s `dfs` / `uMatrix` /
//! `extract_matrix_paths` trio: walk every kNFA start state to every
//! terminal, dedup by k-mer sequence, probe the IBF once per digest along
//! the way.
use std::collections::HashSet;

use rayon::prelude::*;

use crate::alphabet::{digest_kmer, AlphabetKind, Symbol};
use crate::bitvec::BinBitVec;
use crate::cache::QueryCache;
use crate::error::{QueryError, Result};
use crate::index::LoadedIndex;
use crate::knfa::{KNode, Knfa};

/// Below this many paths, union them on the calling thread; above it,
/// dispatch to `rayon`'s `par_iter`/`reduce`. Chosen to keep
/// small queries — the overwhelming majority — free of thread-pool overhead.
const PARALLEL_PATH_THRESHOLD: usize = 64;

/// One accepting traversal of the kNFA, as its sequence of k-mer strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KmerPath {
    pub kmers: Vec<String>,
}

/// A closure the driver polls for cooperative cancellation. Returning
/// `true` aborts enumeration at the next path-loop boundary.
pub type CancelCheck<'a> = dyn Fn() -> bool + 'a;

fn window_to_string(window: &[Symbol]) -> String {
    window.iter().map(|s| s.0 as char).collect()
}

/// Enumerate the deduplicated path matrix, populating `cache` with
/// one IBF probe per distinct k-mer digest encountered. A k-mer whose own
/// bitvector is entirely zero prunes the rest of that branch — pruning is a
/// performance contract only, since an all-zero bitvector ANDed into any
/// path intersection stays zero regardless of when the AND happens.
pub fn enumerate(
    knfa: &Knfa,
    alphabet: AlphabetKind,
    index: &dyn LoadedIndex,
    cache: &QueryCache,
    cancel: &CancelCheck<'_>,
) -> Result<Vec<KmerPath>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for &start in knfa.start_nodes() {
        if cancel() {
            return Err(QueryError::Cancelled);
        }
        let mut path_nodes = Vec::new();
        let mut path_kmers = Vec::new();
        dfs(knfa, start, alphabet, index, cache, cancel, &mut path_nodes, &mut path_kmers, &mut seen, &mut out)?;
    }

    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    knfa: &Knfa,
    node: KNode,
    alphabet: AlphabetKind,
    index: &dyn LoadedIndex,
    cache: &QueryCache,
    cancel: &CancelCheck<'_>,
    path_nodes: &mut Vec<KNode>,
    path_kmers: &mut Vec<String>,
    seen: &mut HashSet<Vec<String>>,
    out: &mut Vec<KmerPath>,
) -> Result<()> {
    if cancel() {
        return Err(QueryError::Cancelled);
    }
    // Simple-path guard: the kNFA can be genuinely cyclic (Kleene closures
    // collapse to a shared emission state), so "acyclic path" means never
    // revisiting a node already on the current path, not that the graph
    // itself is a DAG.
    if path_nodes.contains(&node) {
        return Ok(());
    }

    path_nodes.push(node);
    path_kmers.push(window_to_string(knfa.window(node)));

    let digest = digest_kmer(knfa.window(node), alphabet);
    let bitvector = cache.get_or_probe(digest, index);

    if !bitvector.is_zero() {
        if knfa.is_terminal(node) && seen.insert(path_kmers.clone()) {
            out.push(KmerPath { kmers: path_kmers.clone() });
        }
        for &next in knfa.edges(node) {
            dfs(knfa, next, alphabet, index, cache, cancel, path_nodes, path_kmers, seen, out)?;
        }
    }

    path_kmers.pop();
    path_nodes.pop();
    Ok(())
}

/// Bitwise AND of a path's constituent k-mer bitvectors, seeded with
/// all-ones. Reads from `cache`, which [`enumerate`] has already
/// populated for every k-mer along this path — this is a cache hit, not a
/// second IBF probe.
pub fn intersect(path: &KmerPath, alphabet: AlphabetKind, index: &dyn LoadedIndex, cache: &QueryCache, bin_count: u32) -> BinBitVec {
    let mut acc = BinBitVec::ones(bin_count);
    for kmer in &path.kmers {
        let symbols: Vec<Symbol> = kmer
            .chars()
            .map(|c| alphabet.symbol_from_char(c).expect("path k-mers are always valid alphabet symbols"))
            .collect();
        let digest = digest_kmer(&symbols, alphabet);
        let bitvector = cache.get_or_probe(digest, index);
        acc.and_assign(&bitvector);
    }
    acc
}

/// Union, across every path, of its bin-intersection bitvector —
/// the candidate set handed to the verifier. Each path's intersection reads
/// only from `cache` (already populated by [`enumerate`]), so this is safe
/// to fan out across threads: no path's computation depends on another's.
pub fn union_candidates(paths: &[KmerPath], alphabet: AlphabetKind, index: &dyn LoadedIndex, cache: &QueryCache, bin_count: u32) -> BinBitVec {
    if paths.len() > PARALLEL_PATH_THRESHOLD {
        paths
            .par_iter()
            .map(|p| intersect(p, alphabet, index, cache, bin_count))
            .reduce(
                || BinBitVec::zeros(bin_count),
                |mut acc, bv| {
                    acc.or_assign(&bv);
                    acc
                },
            )
    } else {
        let mut acc = BinBitVec::zeros(bin_count);
        for p in paths {
            acc.or_assign(&intersect(p, alphabet, index, cache, bin_count));
        }
        acc
    }
}
