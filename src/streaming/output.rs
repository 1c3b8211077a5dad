//! Serialization of annotated intervals.
//!
//! BED queries get one appended column per output field, in field order,
//! with `.` for a missing value. VCF queries get `name=value` INFO entries
//! and one generated `##INFO` header line per output field. Only fields
//! declared with type `Flag` are written as bare keys; a boolean reduced into
//! any other field is written as `1` or `0`.
//!
//! Integers go through itoa and floats through ryu to avoid allocation in
//! the hot path.

use std::io::{BufWriter, Write};

use rustc_hash::FxHashSet;

use crate::commands::annotate::{AnnotatedInterval, OutputField};
use crate::error::Result;
use crate::interval::{Info, Payload, Variant};
use crate::streaming::buffers::DEFAULT_OUTPUT_BUFFER;
use crate::value::{format_float, Value};
use crate::vcf::VcfHeader;

/// Serialization format of the output (always that of the query).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Bed,
    Vcf,
}

/// Buffered writer for annotated intervals.
pub struct AnnotatedWriter<W: Write> {
    writer: BufWriter<W>,
    format: OutputFormat,
    itoa_buf: itoa::Buffer,
    written: usize,
    flags: FxHashSet<String>,
}

impl<W: Write> AnnotatedWriter<W> {
    pub fn new(output: W, format: OutputFormat) -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER, output, format)
    }

    pub fn with_capacity(capacity: usize, output: W, format: OutputFormat) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            format,
            itoa_buf: itoa::Buffer::new(),
            written: 0,
            flags: FxHashSet::default(),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Number of records written.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Record which output fields are VCF flags. Called by
    /// [`write_vcf_header`](Self::write_vcf_header).
    pub fn declare_fields(&mut self, fields: &[OutputField]) {
        self.flags = fields
            .iter()
            .filter(|field| field.vcf_type == "Flag")
            .map(|field| field.name.clone())
            .collect();
    }

    /// Write the VCF header with an `##INFO` line per output field.
    pub fn write_vcf_header(&mut self, header: &VcfHeader, fields: &[OutputField]) -> Result<()> {
        self.declare_fields(fields);
        let mut header = header.clone();
        for field in fields {
            let number = if field.vcf_type == "Flag" { "0" } else { "1" };
            header.add_info(&field.name, number, field.vcf_type, &field.description);
        }
        header.write_to(&mut self.writer)?;
        Ok(())
    }

    /// Write one annotated record.
    pub fn write(&mut self, record: &AnnotatedInterval) -> Result<()> {
        match (self.format, &record.interval.payload) {
            (OutputFormat::Vcf, Payload::Variant(variant)) => {
                self.write_vcf(record, variant)?;
            }
            _ => self.write_bed(record)?,
        }
        self.written += 1;
        Ok(())
    }

    fn write_bed(&mut self, record: &AnnotatedInterval) -> Result<()> {
        let iv = &record.interval;
        self.writer.write_all(iv.chrom.as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer
            .write_all(self.itoa_buf.format(iv.start).as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(self.itoa_buf.format(iv.end).as_bytes())?;
        if let Some(columns) = iv.columns() {
            for column in columns {
                self.writer.write_all(b"\t")?;
                self.writer.write_all(column.as_bytes())?;
            }
        }
        for (_, value) in &record.annotations {
            self.writer.write_all(b"\t")?;
            match value {
                Some(value) => self.write_value(value)?,
                None => self.writer.write_all(b".")?,
            }
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn write_vcf(&mut self, record: &AnnotatedInterval, variant: &Variant) -> Result<()> {
        let iv = &record.interval;
        self.writer.write_all(iv.chrom.as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer
            .write_all(self.itoa_buf.format(iv.start + 1).as_bytes())?;
        for column in [variant.id.as_str(), variant.reference.as_str()] {
            self.writer.write_all(b"\t")?;
            self.writer.write_all(column.as_bytes())?;
        }
        self.writer.write_all(b"\t")?;
        if variant.alts.is_empty() {
            self.writer.write_all(b".")?;
        } else {
            self.writer.write_all(variant.alts.join(",").as_bytes())?;
        }
        for column in [variant.qual.as_str(), variant.filter.as_str()] {
            self.writer.write_all(b"\t")?;
            self.writer.write_all(column.as_bytes())?;
        }
        self.writer.write_all(b"\t")?;

        let mut info = variant.info.clone();
        for (name, value) in &record.annotations {
            match value {
                Some(Value::Bool(b)) if !self.flags.contains(name) => {
                    info.insert(name.as_str(), Value::Int(i64::from(*b)));
                }
                Some(value) => info.insert(name.as_str(), value.clone()),
                None => {}
            }
        }
        self.write_info(&info)?;

        for sample in &variant.samples {
            self.writer.write_all(b"\t")?;
            self.writer.write_all(sample.as_bytes())?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn write_info(&mut self, info: &Info) -> Result<()> {
        let mut first = true;
        for (key, value) in info.iter() {
            // false flags are left out
            if *value == Value::Bool(false) {
                continue;
            }
            if !first {
                self.writer.write_all(b";")?;
            }
            first = false;
            self.writer.write_all(key.as_bytes())?;
            if *value != Value::Bool(true) {
                self.writer.write_all(b"=")?;
                self.write_value(value)?;
            }
        }
        if first {
            self.writer.write_all(b".")?;
        }
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Int(n) => self.writer.write_all(self.itoa_buf.format(*n).as_bytes())?,
            Value::Float(x) => self.writer.write_all(format_float(*x).as_bytes())?,
            Value::Str(s) => self.writer.write_all(s.as_bytes())?,
            Value::Bool(b) => self.writer.write_all(if *b { b"1" } else { b"0" })?,
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.writer.write_all(b",")?;
                    }
                    self.write_value(item)?;
                }
            }
        }
        Ok(())
    }

    /// Flush the output buffer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
