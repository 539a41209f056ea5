//! The loaded-index contract — an external collaborator, never built by
//! this crate.
//!
//! Index construction and persistence are explicitly out of scope: this
//! module only defines the narrow trait a real on-disk IBF implementation
//! must satisfy, plus one in-memory reference implementation used by this
//! crate's own tests.
use std::path::{Path, PathBuf};

use crate::alphabet::{digest_kmer, AlphabetKind, Symbol};
use crate::bitvec::BinBitVec;

/// The opaque loaded index contract consumed by the query driver.
///
/// Implementations are expected to be cheap to share across threads (e.g.
/// behind an `Arc`) and to treat `membership` as a pure, deterministic
/// function — no query-time synchronization beyond publication is required.
pub trait LoadedIndex: Send + Sync {
    fn bin_count(&self) -> u32;
    fn k(&self) -> u8;
    fn alphabet_kind(&self) -> AlphabetKind;
    fn bin_paths(&self) -> &[PathBuf];
    /// Bloom-filter membership bitvector for a k-mer digest, width
    /// `bin_count()`.
    fn membership(&self, digest: u64) -> BinBitVec;
}

/// A reference `LoadedIndex` built directly from per-bin k-mer membership
/// sets, useful for tests and for end-to-end scenarios.
/// Not a substitute for a real on-disk IBF: it keeps every bin's full k-mer
/// set resident in memory rather than an approximate Bloom filter.
pub struct InMemoryIndex {
    bin_count: u32,
    k: u8,
    alphabet: AlphabetKind,
    bin_paths: Vec<PathBuf>,
    /// digest -> bitvector, populated exhaustively from each bin's text.
    membership: std::collections::HashMap<u64, BinBitVec>,
}

impl InMemoryIndex {
    /// Build an index from bin texts already written to `bin_paths` on disk.
    /// Every overlapping k-mer (sliding window, stride 1 — this is a
    /// build-time scan, unrelated to the *kNFA's* tumbling windows) of each
    /// bin's text is registered into that bin's membership bitvector.
    pub fn from_bin_texts(alphabet: AlphabetKind, k: u8, bins: &[(PathBuf, &str)]) -> Self {
        let bin_count = bins.len() as u32;
        let bin_paths: Vec<PathBuf> = bins.iter().map(|(p, _)| p.clone()).collect();
        let mut membership: std::collections::HashMap<u64, BinBitVec> = std::collections::HashMap::new();

        for (bin_idx, (_, text)) in bins.iter().enumerate() {
            let symbols: Vec<Symbol> = text
                .chars()
                .filter_map(|c| alphabet.symbol_from_char(c))
                .collect();
            if symbols.len() < k as usize {
                continue;
            }
            for window in symbols.windows(k as usize) {
                let digest = digest_kmer(window, alphabet);
                membership
                    .entry(digest)
                    .or_insert_with(|| BinBitVec::zeros(bin_count))
                    .set(bin_idx as u32, true);
            }
        }

        InMemoryIndex { bin_count, k, alphabet, bin_paths, membership }
    }

    /// Convenience for tests: write each bin's text to a file under `dir`
    /// and build the index from those paths.
    pub fn write_and_build(dir: &Path, alphabet: AlphabetKind, k: u8, bins: &[(&str, &str)]) -> std::io::Result<Self> {
        let mut owned: Vec<(PathBuf, &str)> = Vec::with_capacity(bins.len());
        for (name, text) in bins {
            let path = dir.join(name);
            std::fs::write(&path, text)?;
            owned.push((path, text));
        }
        Ok(Self::from_bin_texts(alphabet, k, &owned))
    }

    /// Build an index by treating every regular file directly under `dir` as
    /// one bin, sorted by file name for a stable bin numbering. This is the
    /// CLI's own stand-in collaborator for a real on-disk IBF loader — the
    /// on-disk index format itself is out of scope for this crate.
    pub fn load_from_dir(dir: &Path, alphabet: AlphabetKind, k: u8) -> std::io::Result<Self> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let mut bins: Vec<(PathBuf, String)> = Vec::with_capacity(entries.len());
        for path in entries {
            let text = std::fs::read_to_string(&path)?;
            bins.push((path, text));
        }
        let borrowed: Vec<(PathBuf, &str)> = bins.iter().map(|(p, t)| (p.clone(), t.as_str())).collect();
        Ok(Self::from_bin_texts(alphabet, k, &borrowed))
    }
}

impl LoadedIndex for InMemoryIndex {
    fn bin_count(&self) -> u32 {
        self.bin_count
    }

    fn k(&self) -> u8 {
        self.k
    }

    fn alphabet_kind(&self) -> AlphabetKind {
        self.alphabet
    }

    fn bin_paths(&self) -> &[PathBuf] {
        &self.bin_paths
    }

    fn membership(&self, digest: u64) -> BinBitVec {
        self.membership
            .get(&digest)
            .cloned()
            .unwrap_or_else(|| BinBitVec::zeros(self.bin_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_reflects_bin_content() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(
            dir.path(),
            AlphabetKind::Nucleotide,
            3,
            &[("bin0", "ACGTACG"), ("bin1", "AAAA"), ("bin2", "GGGGG"), ("bin3", "CGTAC")],
        )
        .unwrap();

        let a = AlphabetKind::Nucleotide;
        let acg: Vec<Symbol> = "ACG".chars().map(|c| a.symbol_from_char(c).unwrap()).collect();
        let digest = digest_kmer(&acg, a);
        let bv = index.membership(digest);
        assert!(bv.get(0));
        assert!(!bv.get(1));
        assert!(!bv.get(2));
        assert!(bv.get(3));
    }

    #[test]
    fn absent_kmer_is_all_zero() {
        let dir = tempfile::tempdir().unwrap();
        let index = InMemoryIndex::write_and_build(dir.path(), AlphabetKind::Nucleotide, 3, &[("bin0", "AAAA")]).unwrap();
        let bv = index.membership(0xDEAD_BEEF);
        assert!(bv.is_zero());
    }

    #[test]
    fn load_from_dir_numbers_bins_by_sorted_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin1"), "GGGGG").unwrap();
        std::fs::write(dir.path().join("bin0"), "ACGTACG").unwrap();

        let index = InMemoryIndex::load_from_dir(dir.path(), AlphabetKind::Nucleotide, 3).unwrap();
        assert_eq!(index.bin_count(), 2);
        assert_eq!(index.bin_paths()[0], dir.path().join("bin0"));
        assert_eq!(index.bin_paths()[1], dir.path().join("bin1"));

        let a = AlphabetKind::Nucleotide;
        let acg: Vec<Symbol> = "ACG".chars().map(|c| a.symbol_from_char(c).unwrap()).collect();
        let bv = index.membership(digest_kmer(&acg, a));
        assert!(bv.get(0));
        assert!(!bv.get(1));
    }
}
