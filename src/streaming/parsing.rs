//! Low-level line parsing shared by the BED, VCF and depth readers.
//!
//! These helpers work on raw bytes and avoid allocating until a field is
//! actually kept.

use memchr::{memchr, memchr_iter};

/// Fast u64 parsing - no allocation, no error formatting.
///
/// Returns None if the input is empty or contains non-digit characters.
#[inline(always)]
pub fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.checked_mul(10)?.checked_add(d as u64)?;
    }
    Some(n)
}

/// Parse BED3 fields and return the rest-of-line offset.
///
/// Returns (chrom_bytes, start, end, rest_start_idx) where rest_start_idx
/// is the byte offset where additional columns begin (the tab before them,
/// or the line length when there are none).
#[inline(always)]
pub fn parse_bed3_bytes_with_rest(line: &[u8]) -> Option<(&[u8], u64, u64, usize)> {
    let tab1 = memchr(b'\t', line)?;
    let chrom = &line[..tab1];

    let rest1 = &line[tab1 + 1..];
    let tab2 = memchr(b'\t', rest1)?;
    let start = parse_u64_fast(&rest1[..tab2])?;

    let rest2 = &rest1[tab2 + 1..];
    let end_len = memchr(b'\t', rest2).unwrap_or(rest2.len());
    let end = parse_u64_fast(&rest2[..end_len])?;

    let rest_start = tab1 + 1 + tab2 + 1 + end_len;

    Some((chrom, start, end, rest_start))
}

/// Split a line on tabs.
#[inline]
pub fn split_tabs(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut last = 0;
    let mut ends = memchr_iter(b'\t', line).chain(std::iter::once(line.len()));
    std::iter::from_fn(move || {
        let end = ends.next()?;
        let field = &line[last..end];
        last = end + 1;
        Some(field)
    })
}

/// Strip a trailing `\n` or `\r\n`.
#[inline]
pub fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Check if a BED line should be skipped (empty, comment, or header).
#[inline(always)]
pub fn should_skip_line(line: &[u8]) -> bool {
    line.is_empty() || line[0] == b'#' || line.starts_with(b"track") || line.starts_with(b"browser")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64_fast() {
        assert_eq!(parse_u64_fast(b"12345"), Some(12345));
        assert_eq!(parse_u64_fast(b"0"), Some(0));
        assert_eq!(parse_u64_fast(b""), None);
        assert_eq!(parse_u64_fast(b"abc"), None);
        assert_eq!(parse_u64_fast(b"123abc"), None);
        assert_eq!(parse_u64_fast(b"18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_u64_fast(b"18446744073709551616"), None);
    }

    #[test]
    fn test_parse_bed3_bytes_with_rest() {
        let (chrom, start, end, rest_start) =
            parse_bed3_bytes_with_rest(b"chr1\t100\t200\tname\t50\t+").unwrap();
        assert_eq!(chrom, b"chr1");
        assert_eq!(start, 100);
        assert_eq!(end, 200);
        assert_eq!(rest_start, 12); // Position after "200"

        let (_, _, _, rest_start) = parse_bed3_bytes_with_rest(b"chr1\t1\t2").unwrap();
        assert_eq!(rest_start, 8);
        assert!(parse_bed3_bytes_with_rest(b"chr1\t100").is_none());
    }

    #[test]
    fn test_split_tabs() {
        let fields: Vec<&[u8]> = split_tabs(b"a\tbb\t\tc").collect();
        assert_eq!(fields, vec![&b"a"[..], b"bb", b"", b"c"]);
        assert_eq!(split_tabs(b"").count(), 1);
    }

    #[test]
    fn test_trim_newline() {
        assert_eq!(trim_newline(b"chr1\t1\t2\r\n"), b"chr1\t1\t2");
        assert_eq!(trim_newline(b"x"), b"x");
    }

    #[test]
    fn test_should_skip_line() {
        assert!(should_skip_line(b""));
        assert!(should_skip_line(b"#comment"));
        assert!(should_skip_line(b"track name=foo"));
        assert!(should_skip_line(b"browser position chr1:1-100"));
        assert!(!should_skip_line(b"chr1\t100\t200"));
    }
}
