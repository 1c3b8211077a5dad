//! Streaming annotation of a query file against sorted sources.
//!
//! # Pipeline
//!
//! 1. Every streamed input (the query and each non-depth source) is parsed
//!    on its own reader thread into a bounded channel
//! 2. The merge engine sweeps the query stream once, yielding the matches of
//!    each query interval in every source
//! 3. Matches are gathered into batches and reduced on the rayon pool; the
//!    batch keeps query order
//! 4. Annotated intervals are handed to the caller in query order
//!
//! # Memory Complexity
//!
//! O(batch + k) where k = the largest number of source records overlapping
//! any query position, plus the channel buffers.
//!
//! # Requirements
//!
//! The query and every streamed source MUST be sorted by chromosome (in the
//! configured order) and then by start. Depth sources have no order
//! requirement.

use std::fmt;
use std::io;
use std::sync::Arc;

use crossbeam_channel::Sender;
use rayon::prelude::*;

use crate::bed::BedReader;
use crate::depth::{BamDepth, DepthLookup, ReadDepthIndex};
use crate::error::{AnnoError, Result};
use crate::genome::ChromOrder;
use crate::input::is_bam_path;
use crate::interval::Interval;
use crate::overlap::Probe;
use crate::reducers::ReducerRegistry;
use crate::source::{Extract, Source, SourceKind};
use crate::streaming::buffers::{DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY};
use crate::streaming::merge::{Matched, MergeEngine};
use crate::streaming::producer::{spawn_producer, IntervalStream, Producer};
use crate::streaming::validation::SortChecked;
use crate::value::Value;
use crate::vcf::VcfReader;

/// Runtime input bound to one configured source.
pub enum SourceInput {
    /// A sorted interval stream swept by the merge engine.
    Stream(IntervalStream),
    /// Random-access read depth.
    Depth(Arc<dyn DepthLookup>),
}

/// An output field, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    pub name: String,
    /// VCF `Type=` for the generated header line.
    pub vcf_type: &'static str,
    pub description: String,
}

/// A query interval with its annotations in output-field order.
///
/// `None` marks a field the reducer left out (no value).
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedInterval {
    pub interval: Interval,
    pub annotations: Vec<(String, Option<Value>)>,
}

impl AnnotatedInterval {
    /// Value of one output field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.annotations
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }
}

/// Run options.
#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    /// Variant-vs-variant matches also need the same REF and a shared ALT.
    pub strict: bool,
    /// Also annotate the first and last base of each query.
    pub ends: bool,
    /// Query intervals reduced together on the thread pool.
    pub batch_size: usize,
    /// Capacity of each reader channel.
    pub channel_capacity: usize,
    /// Fail on out-of-order input instead of producing incomplete matches.
    pub check_sorted: bool,
    pub chrom_order: Arc<ChromOrder>,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            strict: true,
            ends: false,
            batch_size: DEFAULT_BATCH_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            check_sorted: false,
            chrom_order: Arc::new(ChromOrder::default()),
        }
    }
}

/// Statistics from an annotation run.
#[derive(Debug, Clone, Default)]
pub struct AnnotateStats {
    /// Query intervals processed (and emitted)
    pub queries: usize,
    /// Queries with at least one match in a streamed source
    pub matched: usize,
    /// Source records read by the merge engine
    pub source_records: usize,
    /// Largest window of any source (memory high-water mark)
    pub max_window: usize,
    /// Times the query went back to a chromosome ordered earlier
    pub chrom_order_violations: usize,
}

impl fmt::Display for AnnotateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queries: {}, With matches: {}, Source records: {}, Max window: {}",
            self.queries, self.matched, self.source_records, self.max_window
        )?;
        if self.chrom_order_violations > 0 {
            write!(f, ", Chromosome order violations: {}", self.chrom_order_violations)?;
        }
        Ok(())
    }
}

/// Annotation command: sources, reducers and run options.
#[derive(Debug, Clone)]
pub struct Annotator {
    sources: Vec<Source>,
    registry: ReducerRegistry,
    pub options: AnnotateOptions,
}

impl Annotator {
    pub fn new(sources: Vec<Source>, registry: ReducerRegistry) -> Self {
        Self {
            sources,
            registry,
            options: AnnotateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnnotateOptions) -> Self {
        self.options = options;
        self
    }

    /// Set allele-exact matching for variant sources.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    /// Set boundary-base annotation.
    pub fn with_ends(mut self, ends: bool) -> Self {
        self.options.ends = ends;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.options.batch_size = batch_size.max(1);
        self
    }

    pub fn with_chrom_order(mut self, order: ChromOrder) -> Self {
        self.options.chrom_order = Arc::new(order);
        self
    }

    pub fn with_check_sorted(mut self, check: bool) -> Self {
        self.options.check_sorted = check;
        self
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    fn probes(&self) -> &'static [Probe] {
        if self.options.ends {
            &[Probe::Whole, Probe::Left, Probe::Right]
        } else {
            &[Probe::Whole]
        }
    }

    /// Output fields in output order: per source, per request, the whole
    /// query then (with `ends`) the left and right boundary bases.
    pub fn output_fields(&self) -> Vec<OutputField> {
        let mut fields = Vec::new();
        for source in &self.sources {
            for request in &source.requests {
                for probe in self.probes() {
                    let target = match probe {
                        Probe::Whole => "",
                        Probe::Left => " at the query start",
                        Probe::Right => " at the query end",
                    };
                    let what = match &request.extract {
                        Extract::Field(name) => format!("field {}", name),
                        Extract::Column(column) => format!("column {}", column),
                        Extract::Depth => "read depth".to_string(),
                    };
                    fields.push(OutputField {
                        name: format!("{}{}", probe.prefix(), request.output_name),
                        vcf_type: request.op.vcf_type(),
                        description: format!(
                            "calculated by {} of overlapping values in {} from {}{}",
                            request.op,
                            what,
                            source.file.display(),
                            target
                        ),
                    });
                }
            }
        }
        fields
    }

    /// Open the reader for every source, spawning a reader thread per
    /// streamed source, loading read-extent depth indexes and opening
    /// indexed BAM files.
    ///
    /// The returned producers must be joined after the run.
    pub fn open_sources(&self) -> Result<(Vec<SourceInput>, Vec<Producer>)> {
        let capacity = self.options.channel_capacity;
        let mut inputs = Vec::with_capacity(self.sources.len());
        let mut producers = Vec::new();
        for source in &self.sources {
            let (stream, producer) = match source.kind {
                SourceKind::Depth => {
                    let lookup: Arc<dyn DepthLookup> = if is_bam_path(&source.file) {
                        Arc::new(BamDepth::from_path(&source.file)?)
                    } else {
                        Arc::new(ReadDepthIndex::from_path(&source.file)?)
                    };
                    inputs.push(SourceInput::Depth(lookup));
                    continue;
                }
                SourceKind::Variant => {
                    let reader = VcfReader::from_path(&source.file)?;
                    spawn_producer(source.label(), reader.records(), capacity)?
                }
                SourceKind::Region => {
                    let reader = BedReader::from_path(&source.file)?;
                    spawn_producer(source.label(), reader.records(), capacity)?
                }
            };
            inputs.push(SourceInput::Stream(stream));
            producers.push(producer);
        }
        Ok((inputs, producers))
    }

    fn checked(&self, stream: IntervalStream, name: String) -> IntervalStream {
        if self.options.check_sorted {
            Box::new(SortChecked::new(
                stream,
                Arc::clone(&self.options.chrom_order),
                name,
            ))
        } else {
            stream
        }
    }

    /// Annotate every query interval, handing results to `emit` in query
    /// order.
    ///
    /// `inputs` holds one entry per source, in source order. The first error
    /// (from any input, a reducer or `emit`) stops the run; all streams are
    /// dropped before returning.
    pub fn run<F>(
        &self,
        query: IntervalStream,
        inputs: Vec<SourceInput>,
        mut emit: F,
    ) -> Result<AnnotateStats>
    where
        F: FnMut(AnnotatedInterval) -> Result<()>,
    {
        if inputs.len() != self.sources.len() {
            return Err(AnnoError::config(format!(
                "{} inputs given for {} sources",
                inputs.len(),
                self.sources.len()
            )));
        }

        let mut streams = Vec::with_capacity(inputs.len());
        let mut depths: Vec<Option<Arc<dyn DepthLookup>>> = Vec::with_capacity(inputs.len());
        for (source, input) in self.sources.iter().zip(inputs) {
            match (source.kind, input) {
                (SourceKind::Depth, SourceInput::Depth(lookup)) => {
                    streams.push(None);
                    depths.push(Some(lookup));
                }
                (SourceKind::Depth, SourceInput::Stream(_)) => {
                    return Err(AnnoError::config(format!(
                        "depth source {} needs a depth lookup, not a stream",
                        source.label()
                    )));
                }
                (_, SourceInput::Stream(stream)) => {
                    streams.push(Some(self.checked(stream, source.label())));
                    depths.push(None);
                }
                (kind, SourceInput::Depth(_)) => {
                    return Err(AnnoError::config(format!(
                        "{} source {} needs a stream, not a depth lookup",
                        kind,
                        source.label()
                    )));
                }
            }
        }

        let fields = self.output_fields();
        let mut engine = MergeEngine::new(
            self.checked(query, "query".to_string()),
            streams,
            Arc::clone(&self.options.chrom_order),
            self.options.strict,
            self.options.ends,
        );

        let batch_size = self.options.batch_size.max(1);
        let mut stats = AnnotateStats::default();
        loop {
            let batch = engine
                .by_ref()
                .take(batch_size)
                .collect::<Result<Vec<Matched>>>()?;
            if batch.is_empty() {
                break;
            }
            stats.matched += batch
                .iter()
                .filter(|m| m.hits.iter().any(|h| !h.whole.is_empty()))
                .count();

            let annotated = batch
                .into_par_iter()
                .map(|matched| self.annotate(matched, &depths, &fields))
                .collect::<Result<Vec<_>>>()?;
            for record in annotated {
                stats.queries += 1;
                emit(record)?;
            }
        }

        let merge = engine.stats();
        stats.source_records = merge.candidates_read;
        stats.max_window = merge.max_window;
        stats.chrom_order_violations = merge.chrom_order_violations;
        tracing::debug!("merge engine: {}", merge);
        Ok(stats)
    }

    /// Like [`run`](Self::run), sending results over a channel. Fails once the
    /// receiver is gone.
    pub fn run_to_channel(
        &self,
        query: IntervalStream,
        inputs: Vec<SourceInput>,
        tx: Sender<AnnotatedInterval>,
    ) -> Result<AnnotateStats> {
        self.run(query, inputs, |record| {
            tx.send(record).map_err(|_| {
                AnnoError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "annotation receiver was dropped",
                ))
            })
        })
    }

    /// Reduce every requested field of one query interval.
    fn annotate(
        &self,
        matched: Matched,
        depths: &[Option<Arc<dyn DepthLookup>>],
        fields: &[OutputField],
    ) -> Result<AnnotatedInterval> {
        let query = &matched.query;
        let mut names = fields.iter().map(|f| f.name.as_str());
        let mut annotations = Vec::with_capacity(fields.len());

        for ((source, hits), depth) in self.sources.iter().zip(&matched.hits).zip(depths) {
            for request in &source.requests {
                for &probe in self.probes() {
                    let name = names.next().unwrap_or(&request.output_name);
                    let value = match (&request.extract, depth) {
                        (Extract::Depth, Some(lookup)) => {
                            let (start, end) = probe.range(query);
                            lookup
                                .depth(&query.chrom, start, end)
                                .map(|d| Some(Value::Int(d as i64)))
                        }
                        (Extract::Depth, None) => Ok(None),
                        _ => {
                            let values = source
                                .values(request, hits.get(probe).iter().map(|c| c.as_ref()));
                            self.registry.reduce(&request.op, &values, query)
                        }
                    }
                    .map_err(|e| AnnoError::Reduce {
                        file: source.label(),
                        name: name.to_string(),
                        op: request.op.to_string(),
                        source: Box::new(e),
                    })?;
                    annotations.push((name.to_string(), value));
                }
            }
        }

        Ok(AnnotatedInterval {
            interval: matched.query,
            annotations,
        })
    }
}
