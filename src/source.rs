//! Annotation sources: one configured file and the fields requested from it.

use std::fmt;
use std::path::PathBuf;

use crate::interval::Interval;
use crate::reducers::Operation;
use crate::value::Value;

/// What kind of records a source yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// VCF records; values come from INFO fields.
    Variant,
    /// BED records; values come from columns.
    Region,
    /// Read alignments; the value is the depth over the query.
    Depth,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Variant => write!(f, "variant"),
            SourceKind::Region => write!(f, "region"),
            SourceKind::Depth => write!(f, "depth"),
        }
    }
}

/// Which part of a matched record to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extract {
    /// INFO key of a variant record; `ID` selects the variant ID.
    Field(String),
    /// 1-based BED column.
    Column(usize),
    /// Read depth over the query interval.
    Depth,
}

impl Extract {
    /// Extract the value from one matched record.
    ///
    /// Records that do not carry the field contribute nothing.
    pub fn extract(&self, candidate: &Interval) -> Option<Value> {
        match self {
            Extract::Field(name) => {
                let variant = candidate.as_variant()?;
                if name == "ID" {
                    return (variant.id != ".").then(|| Value::infer_list(&variant.id));
                }
                variant.info.get(name).cloned()
            }
            Extract::Column(column) => candidate.column(*column),
            Extract::Depth => None,
        }
    }
}

impl fmt::Display for Extract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extract::Field(name) => write!(f, "field {}", name),
            Extract::Column(column) => write!(f, "column {}", column),
            Extract::Depth => write!(f, "depth"),
        }
    }
}

/// One requested output: reduce `extract` over the matches with `op`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub op: Operation,
    pub extract: Extract,
    pub output_name: String,
}

/// A configured annotation source.
#[derive(Debug, Clone)]
pub struct Source {
    pub file: PathBuf,
    /// Position among the configured annotations.
    pub index: usize,
    pub kind: SourceKind,
    pub requests: Vec<Request>,
}

impl Source {
    /// Name used in diagnostics.
    pub fn label(&self) -> String {
        self.file.display().to_string()
    }

    /// Collect the values of `request` from the matched records, in match order.
    pub fn values<'a, I>(&self, request: &Request, matches: I) -> Vec<Value>
    where
        I: IntoIterator<Item = &'a Interval>,
    {
        matches
            .into_iter()
            .filter_map(|m| request.extract.extract(m))
            .collect()
    }
}
