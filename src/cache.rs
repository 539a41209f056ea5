//! Hash→bitvector cache for IBF probes.
//!
//! One entry per distinct k-mer digest encountered during a single query;
//! `DashMap` gives single-flight install per shard without a crate-wide lock.
use dashmap::DashMap;

use crate::bitvec::BinBitVec;
use crate::index::LoadedIndex;

/// The per-query hash→bitvector cache. Scoped to one query's lifetime —
/// dropped before the verifier runs.
pub struct QueryCache {
    entries: DashMap<u64, BinBitVec>,
}

impl QueryCache {
    pub fn new() -> Self {
        QueryCache { entries: DashMap::new() }
    }

    /// Return the cached bitvector for `digest`, probing `index` at most
    /// once per distinct digest for the cache's lifetime. Concurrent callers
    /// racing on the same digest converge on the same probed value (whichever
    /// wins the `DashMap` shard lock installs it; the loser's probe result is
    /// simply discarded), satisfying the "at most one semantically relevant
    /// probe" contract without a global lock.
    pub fn get_or_probe(&self, digest: u64, index: &dyn LoadedIndex) -> BinBitVec {
        if let Some(existing) = self.entries.get(&digest) {
            return existing.clone();
        }
        let probed = index.membership(digest);
        self.entries.entry(digest).or_insert_with(|| probed.clone());
        probed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::AlphabetKind;
    use crate::index::InMemoryIndex;

    #[test]
    fn repeated_digest_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(dir.path(), AlphabetKind::Nucleotide, 3, &[("bin0", "ACGTACG")]).unwrap();
        let cache = QueryCache::new();
        assert!(cache.is_empty());
        let a = cache.get_or_probe(7, &index);
        assert_eq!(cache.len(), 1);
        let b = cache.get_or_probe(7, &index);
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }
}
