//! Buffer and batch size constants for streaming operations.
//!
//! These constants control memory usage vs throughput tradeoffs.

/// Default output buffer size (2 MB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Default input buffer size (256 KB).
/// Good balance for reading sorted BED and VCF files.
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Default line buffer capacity (1 KB).
/// Sufficient for most BED lines; VCF lines grow the buffer as needed.
pub const DEFAULT_LINE_BUFFER: usize = 1024;

/// Default capacity of each producer channel, in intervals.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Default number of query intervals reduced together on the thread pool.
pub const DEFAULT_BATCH_SIZE: usize = 4096;
