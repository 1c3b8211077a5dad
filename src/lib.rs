//! vanno: streaming interval annotation
//!
//! Annotates a coordinate-sorted stream of variants (VCF) or regions (BED)
//! with values reduced from any number of sorted annotation sources, in a
//! single forward pass over every input.
//!
//! # Features
//!
//! - **Streaming merge**: one sweep over the query and all sources, memory
//!   bounded by the number of records overlapping a position
//! - **Reducers**: built-in aggregations plus user-defined reducers in an
//!   embedded script
//! - **Parallel reduction**: reader threads per input and batched reduction
//!   on a Rayon pool, output kept in query order
//! - **Read depth**: counts from indexed BAM files or BED read extents
//!
//! # Example
//!
//! ```rust
//! use vanno::bed::parse_intervals;
//! use vanno::commands::{Annotator, SourceInput};
//! use vanno::config::Config;
//! use vanno::reducers::ReducerRegistry;
//! use vanno::streaming::producer::stream_from_vec;
//!
//! let config = Config::parse(
//!     "[[annotation]]\nfile = \"genes.bed\"\ncolumns = [4]\nops = [\"concat\"]\nnames = [\"gene\"]\n",
//! )
//! .unwrap();
//! let registry = ReducerRegistry::new();
//! let annotator = Annotator::new(config.sources(&registry).unwrap(), registry);
//!
//! let query = parse_intervals("chr1\t100\t200\n").unwrap();
//! let genes = parse_intervals("chr1\t150\t160\tvalX\nchr1\t190\t210\tvalY\n").unwrap();
//!
//! let mut out = Vec::new();
//! annotator
//!     .run(
//!         stream_from_vec(query),
//!         vec![SourceInput::Stream(stream_from_vec(genes))],
//!         |record| {
//!             out.push(record);
//!             Ok(())
//!         },
//!     )
//!     .unwrap();
//! assert_eq!(out[0].get("gene").unwrap().to_string(), "valX,valY");
//! ```

pub mod bed;
pub mod commands;
pub mod config;
pub mod depth;
pub mod error;
pub mod genome;
pub mod input;
pub mod interval;
pub mod overlap;
pub mod reducers;
pub mod script;
pub mod source;
pub mod streaming;
pub mod value;
pub mod vcf;

// Re-export commonly used types
pub use bed::BedReader;
pub use error::{AnnoError, Result};
pub use interval::Interval;
pub use value::Value;
pub use vcf::VcfReader;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bed::{parse_intervals, BedReader};
    pub use crate::commands::{AnnotateOptions, AnnotatedInterval, Annotator, SourceInput};
    pub use crate::config::Config;
    pub use crate::depth::{BamDepth, DepthLookup, ReadDepthIndex};
    pub use crate::error::{AnnoError, Result};
    pub use crate::genome::{ChromOrder, Genome};
    pub use crate::interval::Interval;
    pub use crate::reducers::ReducerRegistry;
    pub use crate::script::ScriptEngine;
    pub use crate::value::Value;
    pub use crate::vcf::VcfReader;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_variant_workflow() {
        use crate::prelude::*;
        use crate::streaming::producer::stream_from_vec;
        use crate::vcf::parse_variants;

        let config = Config::parse(
            "[[annotation]]\nfile = \"db.vcf\"\nfields = [\"AF\", \"ID\"]\nops = [\"max\", \"uniq\"]\nnames = [\"db_af\", \"db_id\"]\n",
        )
        .unwrap();
        let registry = ReducerRegistry::new();
        let annotator = Annotator::new(config.sources(&registry).unwrap(), registry);

        let query = parse_variants("chr1\t100\t.\tA\tT\t.\t.\t.\n").unwrap();
        let db = parse_variants(
            "chr1\t100\trs1\tA\tT\t.\t.\tAF=0.1\nchr1\t100\trs2\tA\tC,T\t.\t.\tAF=0.2,0.3\n",
        )
        .unwrap();

        let mut out = Vec::new();
        annotator
            .run(
                stream_from_vec(query),
                vec![SourceInput::Stream(stream_from_vec(db))],
                |r| {
                    out.push(r);
                    Ok(())
                },
            )
            .unwrap();

        assert_eq!(out[0].get("db_af"), Some(&Value::Float(0.3)));
        assert_eq!(out[0].get("db_id").unwrap().to_string(), "rs1,rs2");
    }
}
