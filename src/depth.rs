//! Random-access read depth lookups.
//!
//! Depth sources are not streamed through the merge engine. Each query asks
//! the lookup directly for the number of reads overlapping its coordinates,
//! so depth sources have no sort-order requirement.
//!
//! Two lookups are provided: [`ReadDepthIndex`] over a BED of read extents
//! held in memory, and [`BamDepth`] over an indexed BAM file queried per
//! interval.

use std::fs::File;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Sender};
use noodles::bam;
use noodles::bgzf;
use noodles::sam;
use noodles::sam::alignment::Record as SamRecord;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::bed::BedReader;
use crate::error::{AnnoError, Result};
use crate::input::open_input;

/// Capability to count reads overlapping a half-open range.
///
/// Implementations are shared by all reduction workers.
pub trait DepthLookup: Send + Sync {
    fn depth(&self, chrom: &str, start: u64, end: u64) -> Result<u64>;
}

/// Read extents per chromosome, indexed for O(log n) overlap counts.
///
/// Built from a BED file with one line per aligned read (for example the
/// output of `bedtools bamtobed`).
#[derive(Debug, Default)]
pub struct ReadDepthIndex {
    by_chrom: FxHashMap<String, ChromReads>,
}

#[derive(Debug, Default)]
struct ChromReads {
    starts: Vec<u64>,
    ends: Vec<u64>,
}

impl ReadDepthIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load read extents from a BED file (plain or gzipped). Input order
    /// does not matter.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let label = path.as_ref().display().to_string();
        let index =
            Self::from_reader(open_input(path.as_ref())?).map_err(|e| e.in_file(label))?;
        tracing::debug!(
            "indexed {} reads on {} chromosomes from {}",
            index.len(),
            index.by_chrom.len(),
            path.as_ref().display()
        );
        Ok(index)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = Self::new();
        for record in BedReader::new(reader).records() {
            let record = record?;
            index.insert(&record.chrom, record.start, record.end);
        }
        index.finish();
        Ok(index)
    }

    /// Build from (chrom, start, end) triples.
    pub fn from_reads<'a, I>(reads: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u64, u64)>,
    {
        let mut index = Self::new();
        for (chrom, start, end) in reads {
            index.insert(chrom, start, end);
        }
        index.finish();
        index
    }

    fn insert(&mut self, chrom: &str, start: u64, end: u64) {
        if let Some(reads) = self.by_chrom.get_mut(chrom) {
            reads.starts.push(start);
            reads.ends.push(end);
            return;
        }
        self.by_chrom.insert(
            chrom.to_string(),
            ChromReads {
                starts: vec![start],
                ends: vec![end],
            },
        );
    }

    fn finish(&mut self) {
        for reads in self.by_chrom.values_mut() {
            reads.starts.sort_unstable();
            reads.ends.sort_unstable();
        }
    }

    /// Total number of reads.
    pub fn len(&self) -> usize {
        self.by_chrom.values().map(|r| r.starts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DepthLookup for ReadDepthIndex {
    /// Reads with `start < end_q` minus reads that already ended at or before
    /// `start_q`; every such read also started before `end_q`.
    fn depth(&self, chrom: &str, start: u64, end: u64) -> Result<u64> {
        if start >= end {
            return Ok(0);
        }
        let Some(reads) = self.by_chrom.get(chrom) else {
            return Ok(0);
        };
        let started = reads.starts.partition_point(|&s| s < end);
        let ended = reads.ends.partition_point(|&e| e <= start);
        Ok(started.saturating_sub(ended) as u64)
    }
}

/// Read depth from a coordinate-sorted, indexed BAM file.
///
/// The index is looked up next to the file as `<file>.bai` or `<file>.csi`.
/// The reader lives on its own thread and answers lookups sent over a
/// channel. Unmapped records are not counted. Queries on a chromosome
/// missing from the BAM header have depth 0.
pub struct BamDepth {
    path: PathBuf,
    requests: Sender<DepthRequest>,
    chromosomes: FxHashSet<String>,
}

struct DepthRequest {
    chrom: String,
    start: u64,
    end: u64,
    reply: Sender<io::Result<u64>>,
}

impl BamDepth {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if bam_index_path(&path).is_none() {
            return Err(AnnoError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no .bai or .csi index found for {}", path.display()),
            )));
        }

        let (tx, rx) = unbounded::<DepthRequest>();
        let (ready_tx, ready_rx) = bounded(1);
        let file = path.clone();
        thread::Builder::new()
            .name(format!("bam:{}", path.display()))
            .spawn(move || {
                let (mut reader, header) = match open_indexed_bam(&file) {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let names: FxHashSet<String> = header
                    .reference_sequences()
                    .keys()
                    .map(|name| name.to_string())
                    .collect();
                if ready_tx.send(Ok(names)).is_err() {
                    return;
                }
                for request in rx {
                    let result = count_alignments(&mut reader, &header, &request);
                    let _ = request.reply.send(result);
                }
            })?;

        let chromosomes = ready_rx
            .recv()
            .map_err(|_| io::Error::other("BAM reader thread exited"))
            .and_then(|opened| opened)
            .map_err(|e| AnnoError::Io(labelled(&path, e)))?;
        tracing::debug!(
            "opened {} with {} reference sequences",
            path.display(),
            chromosomes.len()
        );

        Ok(Self {
            path,
            requests: tx,
            chromosomes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DepthLookup for BamDepth {
    fn depth(&self, chrom: &str, start: u64, end: u64) -> Result<u64> {
        if start >= end || !self.chromosomes.contains(chrom) {
            return Ok(0);
        }
        let (reply, answer) = bounded(1);
        let request = DepthRequest {
            chrom: chrom.to_string(),
            start,
            end,
            reply,
        };
        let result = match self.requests.send(request) {
            Ok(()) => answer
                .recv()
                .unwrap_or_else(|_| Err(io::Error::other("BAM reader thread exited"))),
            Err(_) => Err(io::Error::other("BAM reader thread exited")),
        };
        result.map_err(|e| AnnoError::Io(labelled(&self.path, e)))
    }
}

type IndexedBam = bam::io::IndexedReader<bgzf::Reader<File>>;

fn open_indexed_bam(path: &Path) -> io::Result<(IndexedBam, sam::Header)> {
    let mut reader = bam::io::indexed_reader::Builder::default().build_from_path(path)?;
    let header = reader.read_header()?;
    Ok((reader, header))
}

/// Count mapped records overlapping the request's 0-based half-open range.
fn count_alignments(
    reader: &mut IndexedBam,
    header: &sam::Header,
    request: &DepthRequest,
) -> io::Result<u64> {
    let text = format!("{}:{}-{}", request.chrom, request.start + 1, request.end);
    let region: noodles::core::Region = text.parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid region '{}': {}", text, e),
        )
    })?;

    let mut count = 0;
    for record in reader.query(header, &region)? {
        let record = record?;
        if record.flags().is_unmapped() {
            continue;
        }
        let (Some(read_start), Some(read_end)) =
            (record.alignment_start(), SamRecord::alignment_end(&record))
        else {
            continue;
        };
        let read_start = read_start?.get() as u64;
        let read_end = read_end?.get() as u64;
        if aligned_overlaps(read_start, read_end, request.start, request.end) {
            count += 1;
        }
    }
    Ok(count)
}

fn labelled(path: &Path, e: io::Error) -> io::Error {
    io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
}

/// Index file for a BAM, `.bai` preferred over `.csi`.
pub fn bam_index_path(path: &Path) -> Option<PathBuf> {
    ["bai", "csi"].iter().find_map(|ext| {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(ext);
        let candidate = PathBuf::from(name);
        candidate.is_file().then_some(candidate)
    })
}

/// Overlap of a 1-based closed alignment span with a 0-based half-open range.
fn aligned_overlaps(read_start: u64, read_end: u64, start: u64, end: u64) -> bool {
    read_start <= end && read_end > start
}
