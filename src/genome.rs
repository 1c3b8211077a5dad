//! Chromosome ordering.
//!
//! The merge engine needs to know when a source has fallen behind the query
//! on a chromosome it will never reach again. That decision depends on the
//! order chromosomes were sorted in, which is supplied here: either plain
//! lexicographic order (`sort -k1,1`) or the order of a genome file
//! (tab-delimited: chrom\tsize).

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{AnnoError, Result};

/// Genome information containing chromosome sizes.
/// Preserves chromosome order from input file.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    /// Map of chromosome name to rank in `order`
    ranks: FxHashMap<String, usize>,
    /// Chromosome order and sizes (preserves input file order)
    order: Vec<(String, u64)>,
}

impl Genome {
    /// Create an empty genome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load genome from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load genome from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut genome = Self::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let chrom = fields.next().unwrap_or_default();
            let size = fields.next().ok_or_else(|| AnnoError::Parse {
                line: line_num + 1,
                message: "Genome file requires two columns: chrom and size".to_string(),
            })?;
            let size: u64 = size.parse().map_err(|_| AnnoError::Parse {
                line: line_num + 1,
                message: format!("Invalid chromosome size: {}", size),
            })?;

            genome.insert(chrom.to_string(), size);
        }

        Ok(genome)
    }

    /// Insert a chromosome size (appends to order if new).
    pub fn insert(&mut self, chrom: String, size: u64) {
        match self.ranks.get(&chrom) {
            Some(&rank) => self.order[rank].1 = size,
            None => {
                self.ranks.insert(chrom.clone(), self.order.len());
                self.order.push((chrom, size));
            }
        }
    }

    /// Rank of a chromosome in file order.
    #[inline]
    pub fn rank(&self, chrom: &str) -> Option<usize> {
        self.ranks.get(chrom).copied()
    }

    /// Get the size of a chromosome.
    #[inline]
    pub fn chrom_size(&self, chrom: &str) -> Option<u64> {
        self.rank(chrom).map(|r| self.order[r].1)
    }

    /// Get all chromosome names in order.
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Total order over chromosome names used by every input stream.
#[derive(Debug, Clone, Default)]
pub enum ChromOrder {
    /// Byte-wise name order, as produced by `sort -k1,1`.
    #[default]
    Lexicographic,
    /// Order of a genome file. Names missing from the file sort after
    /// all listed names, lexicographically among themselves.
    Genome(Genome),
}

impl ChromOrder {
    /// Compare two chromosome names.
    #[inline]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        match self {
            ChromOrder::Lexicographic => a.cmp(b),
            ChromOrder::Genome(genome) => match (genome.rank(a), genome.rank(b)) {
                (Some(ra), Some(rb)) => ra.cmp(&rb),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.cmp(b),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_genome_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t1000000").unwrap();
        writeln!(file, "chr2\t500000").unwrap();
        writeln!(file, "# comment line").unwrap();
        writeln!(file, "chr10\t250000").unwrap();

        let genome = Genome::from_file(file.path()).unwrap();

        assert_eq!(genome.chrom_size("chr1"), Some(1000000));
        assert_eq!(genome.chrom_size("chr10"), Some(250000));
        assert_eq!(genome.chrom_size("chr4"), None);
        assert_eq!(genome.len(), 3);
        assert_eq!(
            genome.chromosomes().collect::<Vec<_>>(),
            vec!["chr1", "chr2", "chr10"]
        );
    }

    #[test]
    fn test_genome_missing_size() {
        let result = Genome::from_reader("chr1\n".as_bytes());
        assert!(matches!(result, Err(AnnoError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_lexicographic_order() {
        let order = ChromOrder::Lexicographic;
        assert_eq!(order.compare("chr10", "chr2"), Ordering::Less);
        assert_eq!(order.compare("chr2", "chr2"), Ordering::Equal);
    }

    #[test]
    fn test_genome_order() {
        let genome = Genome::from_reader("chr1\t10\nchr2\t10\nchr10\t10\n".as_bytes()).unwrap();
        let order = ChromOrder::Genome(genome);
        assert_eq!(order.compare("chr2", "chr10"), Ordering::Less);
        assert_eq!(order.compare("chr10", "chrUn"), Ordering::Less);
        assert_eq!(order.compare("chrUn_b", "chrUn_a"), Ordering::Greater);
    }
}
