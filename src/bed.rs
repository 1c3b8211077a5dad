//! Streaming BED file parser producing region intervals.

use crate::error::{AnnoError, Result};
use crate::input::open_input;
use crate::interval::Interval;
use crate::streaming::buffers::DEFAULT_LINE_BUFFER;
use crate::streaming::parsing::{
    parse_bed3_bytes_with_rest, should_skip_line, split_tabs, trim_newline,
};
use std::io::BufRead;
use std::path::Path;

/// A streaming BED file reader.
pub struct BedReader<R: BufRead> {
    reader: R,
    line_number: usize,
    buffer: Vec<u8>,
}

impl BedReader<Box<dyn BufRead + Send>> {
    /// Open a BED file (plain or gzipped) from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(open_input(path)?))
    }
}

impl<R: BufRead> BedReader<R> {
    /// Create a new BED reader from any buffered source.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buffer: Vec::with_capacity(DEFAULT_LINE_BUFFER),
        }
    }

    /// Read the next BED record.
    pub fn read_record(&mut self) -> Result<Option<Interval>> {
        loop {
            self.buffer.clear();
            let bytes_read = self.reader.read_until(b'\n', &mut self.buffer)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = trim_newline(&self.buffer);
            if should_skip_line(line) {
                continue;
            }

            return self.parse_line(line).map(Some);
        }
    }

    /// Parse a single BED line.
    fn parse_line(&self, line: &[u8]) -> Result<Interval> {
        let (chrom, start, end, rest) =
            parse_bed3_bytes_with_rest(line).ok_or_else(|| AnnoError::Parse {
                line: self.line_number,
                message: format!(
                    "Expected chrom, start and end: '{}'",
                    String::from_utf8_lossy(line)
                ),
            })?;

        if start > end {
            return Err(AnnoError::Parse {
                line: self.line_number,
                message: format!("Start ({}) > end ({})", start, end),
            });
        }

        let columns = if rest < line.len() {
            split_tabs(&line[rest + 1..])
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect()
        } else {
            Vec::new()
        };

        Ok(Interval::region(
            String::from_utf8_lossy(chrom).into_owned(),
            start,
            end,
            columns,
        ))
    }

    /// Get an iterator over all records.
    pub fn records(self) -> BedRecordIter<R> {
        BedRecordIter { reader: self }
    }
}

/// Iterator over BED records.
pub struct BedRecordIter<R: BufRead> {
    reader: BedReader<R>,
}

impl<R: BufRead> Iterator for BedRecordIter<R> {
    type Item = Result<Interval>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

/// Parse intervals from a string (useful for testing).
pub fn parse_intervals(content: &str) -> Result<Vec<Interval>> {
    BedReader::new(content.as_bytes()).records().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bed3() {
        let content = "chr1\t100\t200\nchr1\t300\t400\n";
        let intervals = parse_intervals(content).unwrap();

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].chrom, "chr1");
        assert_eq!(intervals[0].start, 100);
        assert_eq!(intervals[0].end, 200);
        assert_eq!(intervals[0].columns(), Some(&[][..]));
    }

    #[test]
    fn test_parse_extra_columns() {
        let content = "chr1\t150\t160\tvalX\t3.5\n";
        let intervals = parse_intervals(content).unwrap();

        assert_eq!(
            intervals[0].columns().unwrap(),
            &["valX".to_string(), "3.5".to_string()]
        );
    }

    #[test]
    fn test_skip_comments_and_crlf() {
        let content = "# comment\ntrack name=test\nbrowser position chr1:1-1000\nchr1\t100\t200\r\n";
        let intervals = parse_intervals(content).unwrap();

        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].end, 200);
    }

    #[test]
    fn test_invalid_bed() {
        let result = parse_intervals("chr1\t100\n");
        assert!(matches!(result, Err(AnnoError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_start_after_end() {
        let result = parse_intervals("chr1\t1\t2\nchr1\t300\t200\n");
        assert!(matches!(result, Err(AnnoError::Parse { line: 2, .. })));
    }
}
