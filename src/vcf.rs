//! Streaming VCF reader producing variant intervals.
//!
//! Only the columns the annotation engine needs are interpreted: position,
//! alleles and INFO. QUAL, FILTER and the sample columns are carried through
//! verbatim for output.

use crate::error::{AnnoError, Result};
use crate::genome::Genome;
use crate::input::open_input;
use crate::interval::{Info, Interval, Variant};
use crate::streaming::buffers::DEFAULT_LINE_BUFFER;
use crate::streaming::parsing::{parse_u64_fast, split_tabs, trim_newline};
use crate::value::Value;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Meta-information lines plus the `#CHROM` column header.
#[derive(Debug, Clone, Default)]
pub struct VcfHeader {
    meta: Vec<String>,
    columns: Option<String>,
}

impl VcfHeader {
    /// Meta-information lines (`##...`), in file order.
    pub fn meta(&self) -> &[String] {
        &self.meta
    }

    /// Whether an `##INFO` line with this ID is already present.
    pub fn has_info(&self, id: &str) -> bool {
        let prefix = format!("##INFO=<ID={},", id);
        self.meta.iter().any(|l| l.starts_with(&prefix))
    }

    /// `##contig` declarations as (ID, length), in header order. A missing
    /// or malformed length is 0.
    pub fn contigs(&self) -> Vec<(String, u64)> {
        self.meta
            .iter()
            .filter_map(|line| line.strip_prefix("##contig=<"))
            .filter_map(|body| {
                let body = body.strip_suffix('>').unwrap_or(body);
                let mut id = None;
                let mut length = 0;
                for pair in body.split(',') {
                    match pair.split_once('=') {
                        Some(("ID", value)) => id = Some(value.to_string()),
                        Some(("length", value)) => length = value.parse().unwrap_or(0),
                        _ => {}
                    }
                }
                id.map(|id| (id, length))
            })
            .collect()
    }

    /// Chromosome order declared by the `##contig` lines, if any.
    pub fn genome(&self) -> Option<Genome> {
        let contigs = self.contigs();
        if contigs.is_empty() {
            return None;
        }
        let mut genome = Genome::new();
        for (id, length) in contigs {
            genome.insert(id, length);
        }
        Some(genome)
    }

    /// Append an `##INFO` declaration, replacing an existing one with the same ID.
    pub fn add_info(&mut self, id: &str, number: &str, ty: &str, description: &str) {
        let line = format!(
            "##INFO=<ID={},Number={},Type={},Description=\"{}\">",
            id,
            number,
            ty,
            description.replace('"', "'")
        );
        let prefix = format!("##INFO=<ID={},", id);
        match self.meta.iter_mut().find(|l| l.starts_with(&prefix)) {
            Some(existing) => *existing = line,
            None => self.meta.push(line),
        }
    }

    /// Write the full header.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if !self.meta.iter().any(|l| l.starts_with("##fileformat=")) {
            writeln!(out, "##fileformat=VCFv4.2")?;
        }
        for line in &self.meta {
            writeln!(out, "{}", line)?;
        }
        match &self.columns {
            Some(columns) => writeln!(out, "{}", columns),
            None => writeln!(out, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO"),
        }
    }
}

/// A streaming VCF reader. The header is consumed on construction.
pub struct VcfReader<R: BufRead> {
    reader: R,
    header: VcfHeader,
    line_number: usize,
    buffer: Vec<u8>,
    /// First data line, read while scanning the header.
    pending: bool,
}

impl VcfReader<Box<dyn BufRead + Send>> {
    /// Open a VCF file (plain, gzip or bgzip) from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(open_input(path)?)
    }
}

impl<R: BufRead> VcfReader<R> {
    /// Create a reader and parse the header.
    pub fn new(reader: R) -> Result<Self> {
        let mut vcf = Self {
            reader,
            header: VcfHeader::default(),
            line_number: 0,
            buffer: Vec::with_capacity(DEFAULT_LINE_BUFFER),
            pending: false,
        };
        vcf.read_header()?;
        Ok(vcf)
    }

    fn read_header(&mut self) -> Result<()> {
        loop {
            self.buffer.clear();
            if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
                return Ok(());
            }
            self.line_number += 1;
            let line = trim_newline(&self.buffer);
            if line.is_empty() {
                continue;
            }
            if line.starts_with(b"##") {
                self.header
                    .meta
                    .push(String::from_utf8_lossy(line).into_owned());
            } else if line.starts_with(b"#") {
                self.header.columns = Some(String::from_utf8_lossy(line).into_owned());
            } else {
                self.pending = true;
                return Ok(());
            }
        }
    }

    pub fn header(&self) -> &VcfHeader {
        &self.header
    }

    /// Read the next variant.
    pub fn read_record(&mut self) -> Result<Option<Interval>> {
        loop {
            if self.pending {
                self.pending = false;
            } else {
                self.buffer.clear();
                if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
                    return Ok(None);
                }
                self.line_number += 1;
            }

            let line = trim_newline(&self.buffer);
            if line.is_empty() || line[0] == b'#' {
                continue;
            }
            return parse_vcf_line(line, self.line_number).map(Some);
        }
    }

    /// Get an iterator over all records.
    pub fn records(self) -> VcfRecordIter<R> {
        VcfRecordIter { reader: self }
    }
}

/// Iterator over VCF records.
pub struct VcfRecordIter<R: BufRead> {
    reader: VcfReader<R>,
}

impl<R: BufRead> Iterator for VcfRecordIter<R> {
    type Item = Result<Interval>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parse one VCF data line into a variant interval.
pub fn parse_vcf_line(line: &[u8], line_number: usize) -> Result<Interval> {
    let parse_err = |message: String| AnnoError::Parse {
        line: line_number,
        message,
    };

    let mut fields = split_tabs(line);
    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| parse_err(format!("missing {} column", name)))
    };

    let chrom = text(next("CHROM")?);
    let pos_bytes = next("POS")?;
    let pos = parse_u64_fast(pos_bytes)
        .filter(|&p| p > 0)
        .ok_or_else(|| parse_err(format!("invalid POS '{}'", text(pos_bytes))))?;
    let id = text(next("ID")?);
    let reference = text(next("REF")?);
    let alt = next("ALT")?;
    let qual = text(next("QUAL")?);
    let filter = text(next("FILTER")?);
    let info = parse_info(next("INFO")?);
    let samples = fields.map(text).collect();

    let alts: Vec<String> = if alt == b"." {
        Vec::new()
    } else {
        alt.split(|&b| b == b',').map(text).collect()
    };

    let start = pos - 1;
    let mut end = start + reference.len().max(1) as u64;
    if alts.iter().any(|a| a.starts_with('<')) {
        if let Some(sv_end) = info.get("END").and_then(Value::as_i64) {
            if sv_end as u64 > start {
                end = sv_end as u64;
            }
        }
    }

    Ok(Interval::variant(
        chrom,
        start,
        end,
        Variant {
            id,
            reference,
            alts,
            qual,
            filter,
            info,
            samples,
        },
    ))
}

/// Parse an INFO column. Keys without `=` are flags.
pub fn parse_info(column: &[u8]) -> Info {
    let mut info = Info::new();
    if column == b"." || column.is_empty() {
        return info;
    }
    for entry in column.split(|&b| b == b';').filter(|e| !e.is_empty()) {
        match memchr::memchr(b'=', entry) {
            Some(eq) => {
                let key = text(&entry[..eq]);
                let value = String::from_utf8_lossy(&entry[eq + 1..]);
                info.insert(key, Value::infer_list(&value));
            }
            None => info.insert(text(entry), Value::Bool(true)),
        }
    }
    info
}

/// Parse VCF records from a string (useful for testing).
pub fn parse_variants(content: &str) -> Result<Vec<Interval>> {
    VcfReader::new(content.as_bytes())?.records().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VCF: &str = "##fileformat=VCFv4.2\n\
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
chr1\t101\trs1\tA\tG,T\t50\tPASS\tAF=0.1,0.2;DB;DP=14\n\
chr1\t200\t.\tACG\tA\t.\t.\t.\n";

    #[test]
    fn test_header_and_records() {
        let reader = VcfReader::new(VCF.as_bytes()).unwrap();
        assert_eq!(reader.header().meta().len(), 2);
        assert!(reader.header().has_info("AF"));

        let records: Vec<Interval> = reader.records().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!((first.start, first.end), (100, 101));
        let v = first.as_variant().unwrap();
        assert_eq!(v.id, "rs1");
        assert_eq!(v.reference, "A");
        assert_eq!(v.alts, vec!["G", "T"]);
        assert_eq!(
            v.info.get("AF"),
            Some(&Value::List(vec![Value::Float(0.1), Value::Float(0.2)]))
        );
        assert_eq!(v.info.get("DB"), Some(&Value::Bool(true)));
        assert_eq!(v.info.get("DP"), Some(&Value::Int(14)));

        let second = &records[1];
        assert_eq!((second.start, second.end), (199, 202));
        assert!(second.as_variant().unwrap().info.is_empty());
    }

    #[test]
    fn test_contig_order() {
        let text = "##fileformat=VCFv4.2\n\
##contig=<ID=chr1,length=248956422>\n\
##contig=<ID=chr2,length=242193529,assembly=GRCh38>\n\
##contig=<ID=chr10>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
        let reader = VcfReader::new(text.as_bytes()).unwrap();
        assert_eq!(
            reader.header().contigs(),
            vec![
                ("chr1".to_string(), 248_956_422),
                ("chr2".to_string(), 242_193_529),
                ("chr10".to_string(), 0),
            ]
        );

        let genome = reader.header().genome().unwrap();
        assert!(genome.rank("chr2") < genome.rank("chr10"));
        assert!(VcfReader::new(VCF.as_bytes()).unwrap().header().genome().is_none());
    }

    #[test]
    fn test_symbolic_end() {
        let line = b"chr2\t1000\tsv1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=5000";
        let iv = parse_vcf_line(line, 1).unwrap();
        assert_eq!((iv.start, iv.end), (999, 5000));
    }

    #[test]
    fn test_headerless_input() {
        let records = parse_variants("chr1\t5\t.\tC\tT\t.\t.\t.\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start, 4);
    }

    #[test]
    fn test_bad_pos() {
        let result = parse_variants("chr1\t0\t.\tC\tT\t.\t.\t.\n");
        assert!(matches!(result, Err(AnnoError::Parse { line: 1, .. })));
        let result = parse_variants("chr1\t5\t.\tC\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_add_info_header() {
        let mut header = VcfReader::new(VCF.as_bytes()).unwrap().header().clone();
        header.add_info("gnomad_af", "1", "Float", "max of \"AF\"");
        header.add_info("gnomad_af", "1", "Float", "replaced");

        let mut out = Vec::new();
        header.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("##fileformat=VCFv4.2\n"));
        assert!(text.contains(
            "##INFO=<ID=gnomad_af,Number=1,Type=Float,Description=\"replaced\">\n#CHROM"
        ));
        assert_eq!(text.matches("gnomad_af").count(), 1);
    }
}
