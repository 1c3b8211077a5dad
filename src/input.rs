//! Opening input files with transparent gzip/bgzip decompression.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::streaming::buffers::DEFAULT_INPUT_BUFFER;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A buffered reader that can be moved to a producer thread.
pub type InputReader = Box<dyn BufRead + Send>;

/// Open a path for reading, `-` meaning stdin.
///
/// Compressed input is detected from the gzip magic bytes rather than the
/// file extension; bgzip files are multi-member gzip and decode the same way.
pub fn open_input<P: AsRef<Path>>(path: P) -> io::Result<InputReader> {
    let path = path.as_ref();
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::with_capacity(
            DEFAULT_INPUT_BUFFER,
            io::stdin(),
        )));
    }

    let file = File::open(path).map_err(|e| {
        io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::with_capacity(DEFAULT_INPUT_BUFFER, file);
    if reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
        let decoder = MultiGzDecoder::new(reader);
        Ok(Box::new(BufReader::with_capacity(
            DEFAULT_INPUT_BUFFER,
            decoder,
        )))
    } else {
        Ok(Box::new(reader))
    }
}

/// True for paths that name a VCF file, compressed or not.
pub fn is_vcf_path<P: AsRef<Path>>(path: P) -> bool {
    let name = path.as_ref().to_string_lossy().to_ascii_lowercase();
    name.ends_with(".vcf") || name.ends_with(".vcf.gz") || name.ends_with(".vcf.bgz")
}

/// True for paths ending in `.bam`.
pub fn is_bam_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .to_string_lossy()
        .to_ascii_lowercase()
        .ends_with(".bam")
}
