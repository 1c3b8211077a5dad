//! Streaming machinery shared by the annotation pipeline.
//!
//! This module provides:
//! - Zero-allocation line parsing
//! - Reader threads feeding bounded channels
//! - The multi-source merge engine and its per-source windows
//! - Optional sort-order assertion
//! - Output formatting
//!
//! Memory stays O(k) per source where k = max overlapping records.

pub mod buffers;
pub mod merge;
pub mod output;
pub mod parsing;
pub mod producer;
pub mod validation;
pub mod window;

pub use merge::{Matched, MergeEngine, MergeStats, SourceHits};
pub use output::{AnnotatedWriter, OutputFormat};
pub use parsing::{parse_bed3_bytes_with_rest, parse_u64_fast, should_skip_line};
pub use producer::{spawn_producer, stream_from_vec, IntervalStream, Producer};
pub use validation::{SortChecked, SortValidator};
pub use window::Window;
