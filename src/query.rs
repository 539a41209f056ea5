//! The query driver: wires kNFA construction, path enumeration,
//! candidate union, and exact verification into one pipeline.
//!
//! Grounded on `original_source/src/query.cpp`'s `drive_query`: load index,
//! build the NFA, expand to the kNFA, enumerate paths, OR their per-path ANDs
//! into a candidate set, then verify. `tracing` spans stand in for the
//! original's `seqan3::debug_stream` progress prints.
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::bitvec::BinBitVec;
use crate::cache::QueryCache;
use crate::error::{QueryError, Result};
use crate::index::LoadedIndex;
use crate::knfa::Knfa;
use crate::path::{self, CancelCheck};
use crate::thompson::ThompsonNfa;
use crate::verify;

/// One query against a loaded index. `postfix` drives kNFA compilation;
/// `infix` is the conventional-syntax pattern used for exact verification —
/// the two are independently supplied rather than one derived from the
/// other, so a caller with only a hand-built postfix NFA never needs to
/// reconstruct infix syntax just to verify.
pub struct QueryRequest {
    pub postfix: String,
    pub infix: String,
    pub index: Arc<dyn LoadedIndex>,
    /// If set, the kNFA is dumped to this path in `dot` format before
    /// enumeration.
    pub graph_dump: Option<PathBuf>,
}

/// Final outcome of a query.
pub struct QueryReport {
    /// Bit *i* set means bin *i* is a confirmed hit, or is unverified and
    /// conservatively kept as a potential hit (the unverified-bin convention).
    pub hits: BinBitVec,
    /// Confirmed match-line count per bin, indexed by bin (0 for bins never
    /// a candidate, or candidates that failed verification I/O).
    pub confirmed_counts: Vec<u64>,
    /// Candidate bins whose verification read failed; their `hits` bit stays
    /// set under the conservative convention.
    pub unverified_bins: Vec<u32>,
}

/// Run one query end-to-end. `cancel` is polled between start states and
/// between paths during enumeration; passing `|| false` disables
/// cancellation entirely.
#[instrument(skip(request, cancel), fields(infix = %request.infix))]
pub fn run(request: QueryRequest, cancel: &CancelCheck<'_>) -> Result<QueryReport> {
    let thompson = ThompsonNfa::from_postfix(&request.postfix)?;
    let k = request.index.k() as usize;
    let knfa = Knfa::build(&thompson, k);
    // The Thompson NFA is never needed again; the kNFA is the only structure
    // path enumeration walks.
    drop(thompson);
    info!(k, "kNFA built");

    if let Some(dump_path) = &request.graph_dump {
        let mut file = std::fs::File::create(dump_path)
            .map_err(|e| QueryError::IndexLoad { reason: format!("could not write graph dump to {dump_path:?}: {e}") })?;
        knfa.write_to(&mut file)
            .map_err(|e| QueryError::IndexLoad { reason: format!("could not write graph dump to {dump_path:?}: {e}") })?;
    }

    let alphabet = request.index.alphabet_kind();
    let cache = QueryCache::new();
    let paths = path::enumerate(&knfa, alphabet, request.index.as_ref(), &cache, cancel)?;
    info!(path_count = paths.len(), cache_entries = cache.len(), "paths enumerated");

    if cancel() {
        return Err(QueryError::Cancelled);
    }
    let bin_count = request.index.bin_count();
    let candidates = path::union_candidates(&paths, alphabet, request.index.as_ref(), &cache, bin_count);

    let pattern = verify::compile_pattern(&request.infix)?;
    let verify_report = verify::verify(&candidates, request.index.bin_paths(), &pattern);

    let mut hits = BinBitVec::zeros(bin_count);
    let mut confirmed_counts = vec![0u64; bin_count as usize];
    for v in &verify_report.confirmed {
        confirmed_counts[v.bin as usize] = v.confirmed_hits;
        if v.confirmed_hits > 0 {
            hits.set(v.bin, true);
        }
    }
    let unverified_bins: Vec<u32> = verify_report
        .failures
        .iter()
        .map(|f| match f {
            QueryError::BinIo { bin, .. } => *bin,
            other => unreachable!("verify() only produces BinIo failures, got {other:?}"),
        })
        .collect();
    for &bin in &unverified_bins {
        hits.set(bin, true);
    }

    info!(
        confirmed = verify_report.confirmed.iter().filter(|v| v.confirmed_hits > 0).count(),
        unverified = unverified_bins.len(),
        "verification complete"
    );

    Ok(QueryReport { hits, confirmed_counts, unverified_bins })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::AlphabetKind;
    use crate::index::InMemoryIndex;
    use crate::thompson::infix_to_postfix;

    fn never_cancel() -> bool {
        false
    }

    fn request(infix: &str, index: InMemoryIndex) -> QueryRequest {
        QueryRequest {
            postfix: infix_to_postfix(infix).unwrap(),
            infix: infix.to_string(),
            index: Arc::new(index),
            graph_dump: None,
        }
    }

    #[test]
    fn literal_pattern_finds_its_bins() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(
            dir.path(),
            AlphabetKind::Nucleotide,
            3,
            &[("bin0", "ACGTACG"), ("bin1", "AAAA"), ("bin2", "GGGGG"), ("bin3", "CGTAC")],
        )
        .unwrap();

        let report = run(request("ACG", index), &never_cancel).unwrap();

        assert!(report.unverified_bins.is_empty());
        assert!(report.hits.get(0));
        assert!(!report.hits.get(1));
        assert!(!report.hits.get(2));
        assert!(report.hits.get(3));
    }

    #[test]
    fn alternation_with_no_membership_yields_zero_hits() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(
            dir.path(),
            AlphabetKind::Nucleotide,
            3,
            &[("bin0", "ACGTACG"), ("bin1", "AAAA"), ("bin2", "GGGGG"), ("bin3", "CGTAC")],
        )
        .unwrap();

        let report = run(request("A(C|G)T", index), &never_cancel).unwrap();

        assert!(report.hits.is_zero());
    }

    #[test]
    fn wildcard_over_alphabet_hits_every_bin() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(
            dir.path(),
            AlphabetKind::Nucleotide,
            3,
            &[("bin0", "ACGTACG"), ("bin1", "AAAA"), ("bin2", "GGGGG"), ("bin3", "CGTAC")],
        )
        .unwrap();
        let alternation = "(A|C|G|T|N)(A|C|G|T|N)(A|C|G|T|N)";

        let report = run(request(alternation, index), &never_cancel).unwrap();

        for bin in 0..4 {
            assert!(report.hits.get(bin), "bin {bin} expected set");
        }
    }

    #[test]
    fn two_literal_alternatives_each_confirm_their_own_bin() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(dir.path(), AlphabetKind::Nucleotide, 2, &[("bin0", "AC"), ("bin1", "CA")]).unwrap();

        let report = run(request("AC|CA", index), &never_cancel).unwrap();

        assert!(report.hits.get(0));
        assert!(report.hits.get(1));
        assert!(report.unverified_bins.is_empty());
    }

    #[test]
    fn kleene_star_pattern_matches_repeated_bin() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(dir.path(), AlphabetKind::Nucleotide, 2, &[("bin0", "ACCCA"), ("bin1", "TTTT")]).unwrap();

        let report = run(request("AC*A", index), &never_cancel).unwrap();

        assert!(report.hits.get(0));
        assert!(!report.hits.get(1));
    }

    #[test]
    fn cancellation_propagates_out_of_the_driver() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(dir.path(), AlphabetKind::Nucleotide, 3, &[("bin0", "ACGTACG")]).unwrap();
        let result = run(request("ACG", index), &|| true);
        assert!(matches!(result, Err(QueryError::Cancelled)));
    }

    #[test]
    fn cancellation_after_first_path_aborts_a_large_query() {
        let dir = tempfile::tempdir().unwrap();
        let bins: Vec<(String, String)> = (0..1200).map(|i| (format!("bin{i}"), "ACGTACGTACGT".to_string())).collect();
        let bin_refs: Vec<(&str, &str)> = bins.iter().map(|(n, t)| (n.as_str(), t.as_str())).collect();
        let index = InMemoryIndex::write_and_build(dir.path(), AlphabetKind::Nucleotide, 3, &bin_refs).unwrap();
        // (A|C|G|T)^12 produces far more than 1000 distinct 3-mer paths; cancel
        // on the second cooperative check point, well before enumeration
        // could otherwise finish walking all of them.
        let alternation: String = std::iter::repeat("(A|C|G|T)").take(12).collect();
        let checks_seen = std::cell::Cell::new(0u32);
        let cancel_soon = || {
            checks_seen.set(checks_seen.get() + 1);
            checks_seen.get() > 1
        };
        let result = run(request(&alternation, index), &cancel_soon);
        assert!(matches!(result, Err(QueryError::Cancelled)));
    }

    #[test]
    fn graph_dump_is_written_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(dir.path(), AlphabetKind::Nucleotide, 3, &[("bin0", "ACGTACG")]).unwrap();
        let dump_path = dir.path().join("knfa.dot");
        let mut req = request("ACG", index);
        req.graph_dump = Some(dump_path.clone());
        run(req, &never_cancel).unwrap();
        assert!(dump_path.exists());
    }
}
