//! Core interval types for genomic region representation.

use crate::value::Value;
use std::fmt;

/// A genomic interval with chromosome, start, end and a typed payload.
/// Uses 0-based, half-open coordinates (BED format).
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub payload: Payload,
}

/// What an interval carries beyond its coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A VCF record.
    Variant(Variant),
    /// Raw BED columns after chrom/start/end.
    Region(Vec<String>),
    /// An interval whose value is a read depth computed on demand.
    Depth,
}

/// Variant payload: alleles, INFO and the passthrough columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Variant {
    pub id: String,
    pub reference: String,
    pub alts: Vec<String>,
    pub qual: String,
    pub filter: String,
    pub info: Info,
    /// FORMAT and sample columns, kept verbatim.
    pub samples: Vec<String>,
}

/// Ordered INFO entries. Flags are stored as `Value::Bool(true)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Info {
    entries: Vec<(String, Value)>,
}

impl Info {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set an entry, replacing an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Interval {
    /// Create a plain region interval with no extra columns.
    #[inline]
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self::region(chrom, start, end, Vec::new())
    }

    /// Create a region interval carrying extra BED columns.
    pub fn region(chrom: impl Into<String>, start: u64, end: u64, columns: Vec<String>) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
            payload: Payload::Region(columns),
        }
    }

    /// Create a variant interval.
    pub fn variant(chrom: impl Into<String>, start: u64, end: u64, variant: Variant) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
            payload: Payload::Variant(variant),
        }
    }

    /// Returns the length of the interval.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the interval has zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check if this interval overlaps with another (position only).
    #[inline]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.chrom == other.chrom && self.start < other.end && other.start < self.end
    }

    /// Variant payload, if any.
    #[inline]
    pub fn as_variant(&self) -> Option<&Variant> {
        match &self.payload {
            Payload::Variant(v) => Some(v),
            _ => None,
        }
    }

    /// BED columns beyond the first three, if any.
    #[inline]
    pub fn columns(&self) -> Option<&[String]> {
        match &self.payload {
            Payload::Region(cols) => Some(cols),
            _ => None,
        }
    }

    /// Value of a 1-based BED column: 1-3 are chrom/start/end.
    pub fn column(&self, column: usize) -> Option<Value> {
        match column {
            0 => None,
            1 => Some(Value::Str(self.chrom.clone())),
            2 => Some(Value::Int(self.start as i64)),
            3 => Some(Value::Int(self.end as i64)),
            n => self
                .columns()
                .and_then(|cols| cols.get(n - 4))
                .map(|raw| Value::infer_list(raw)),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.chrom, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_overlap() {
        let a = Interval::new("chr1", 100, 200);
        let b = Interval::new("chr1", 150, 250);
        let c = Interval::new("chr1", 200, 300);
        let d = Interval::new("chr2", 100, 200);

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // Adjacent, not overlapping
        assert!(!a.overlaps(&d)); // Different chromosome
    }

    #[test]
    fn test_column_lookup() {
        let iv = Interval::region(
            "chr1",
            150,
            160,
            vec!["valX".to_string(), "7".to_string()],
        );
        assert_eq!(iv.column(1), Some(Value::from("chr1")));
        assert_eq!(iv.column(2), Some(Value::Int(150)));
        assert_eq!(iv.column(4), Some(Value::from("valX")));
        assert_eq!(iv.column(5), Some(Value::Int(7)));
        assert_eq!(iv.column(6), None);
        assert_eq!(iv.column(0), None);
    }

    #[test]
    fn test_info_insert_replaces() {
        let mut info = Info::new();
        info.insert("AF", Value::Float(0.1));
        info.insert("DB", Value::Bool(true));
        info.insert("AF", Value::Float(0.2));

        assert_eq!(info.len(), 2);
        assert_eq!(info.get("AF"), Some(&Value::Float(0.2)));
        let keys: Vec<&str> = info.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["AF", "DB"]);
    }

    #[test]
    fn test_empty_interval() {
        let iv = Interval::new("chr1", 100, 100);
        assert!(iv.is_empty());
        assert_eq!(iv.len(), 0);
        assert!(!iv.overlaps(&iv));
    }
}
