//! Command implementations for vanno.

pub mod annotate;

pub use annotate::{
    AnnotateOptions, AnnotateStats, AnnotatedInterval, Annotator, OutputField, SourceInput,
};
