//! Exact-match verification of candidate bins.
//!
//! The IBF stage only ever produces candidates: approximate membership can
//! false-positive, so every candidate bin's actual sequence text is re-run
//! against the real regex before being reported as a hit. Bins are verified
//! independently and in parallel with `rayon` rather than manual thread
//! management.
use std::path::PathBuf;

use rayon::prelude::*;
use regex::Regex;

use crate::bitvec::BinBitVec;
use crate::error::QueryError;

/// Outcome of verifying one candidate bin.
#[derive(Clone, Debug)]
pub struct BinVerification {
    pub bin: u32,
    pub path: PathBuf,
    /// Number of non-overlapping matches of the exact regex found anywhere
    /// in the bin's full text.
    pub confirmed_hits: u64,
}

pub struct VerifyReport {
    pub confirmed: Vec<BinVerification>,
    /// Bins that could not be read during verification. Non-fatal: the rest
    /// of the candidate set is still verified and reported.
    pub failures: Vec<QueryError>,
}

/// Build the exact matcher from the original infix pattern (not the
/// k-mer postfix form — the regex crate takes conventional syntax).
pub fn compile_pattern(infix: &str) -> crate::error::Result<Regex> {
    Regex::new(infix).map_err(|e| QueryError::RegexParse { reason: e.to_string() })
}

/// Re-check every bin whose bit is set in `candidates` against `pattern`,
/// counting per-bin confirmed matches. Each bin's entire text is read into
/// one buffer and matched as a whole — a match spanning a line boundary in
/// the raw text must still be found, so this never scans line-by-line. Bins
/// are read from `bin_paths` by index; a read failure is recorded in
/// `failures` rather than aborting the whole verification pass.
pub fn verify(candidates: &BinBitVec, bin_paths: &[PathBuf], pattern: &Regex) -> VerifyReport {
    let results: Vec<std::result::Result<BinVerification, QueryError>> = candidates
        .iter_set()
        .collect::<Vec<u32>>()
        .into_par_iter()
        .map(|bin| {
            let path = bin_paths[bin as usize].clone();
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    let confirmed_hits = pattern.find_iter(&text).count() as u64;
                    Ok(BinVerification { bin, path, confirmed_hits })
                }
                Err(source) => Err(QueryError::BinIo { bin, path, source }),
            }
        })
        .collect();

    let mut confirmed = Vec::new();
    let mut failures = Vec::new();
    for r in results {
        match r {
            Ok(v) => confirmed.push(v),
            Err(e) => failures.push(e),
        }
    }
    confirmed.sort_by_key(|v| v.bin);
    failures.sort_by_key(|e| match e {
        QueryError::BinIo { bin, .. } => *bin,
        _ => u32::MAX,
    });

    VerifyReport { confirmed, failures }
}
