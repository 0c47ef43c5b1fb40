//! Minimal FASTQ reader feeding [`crate::mapper::read::Read`] buffers.
//!
//! Tolerant of `\n`, `\r\n`, `\r`, and a trailing record with no final
//! newline; fails rather than silently truncating a record whose
//! sequence/quality lines are of mismatched length.

use std::io::BufRead;

use crate::mapper::error::{MapperError, Result};
use crate::mapper::reference::IUPAC_N;

/// 4-bit IUPAC encoding table indexed by ASCII base byte.
fn encode_base(byte: u8) -> u8 {
    match byte.to_ascii_uppercase() {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'M' => 0b0011,
        b'G' => 0b0100,
        b'R' => 0b0101,
        b'S' => 0b0110,
        b'V' => 0b0111,
        b'T' => 0b1000,
        b'W' => 0b1001,
        b'Y' => 0b1010,
        b'H' => 0b1011,
        b'K' => 0b1100,
        b'D' => 0b1101,
        b'B' => 0b1110,
        _ => IUPAC_N,
    }
}

/// One parsed FASTQ record: name (without `@`), 4-bit bases, and raw
/// Phred+33-decoded qualities.
#[derive(Debug, Clone)]
pub struct FastqRecord {
    /// Record name, with any trailing `/1` or `/2` mate suffix stripped.
    pub name: Vec<u8>,
    /// 4-bit IUPAC-encoded bases.
    pub bases: Vec<u8>,
    /// Phred quality scores (not offset-adjusted from `!`=0).
    pub qualities: Vec<u8>,
}

fn strip_mate_suffix(name: &[u8]) -> Vec<u8> {
    if name.len() >= 2 && name[name.len() - 2] == b'/' && matches!(name[name.len() - 1], b'1' | b'2') {
        name[..name.len() - 2].to_vec()
    } else {
        name.to_vec()
    }
}

fn read_trimmed_line(reader: &mut impl BufRead, buf: &mut Vec<u8>) -> Result<usize> {
    buf.clear();
    let n = reader.read_until(b'\n', buf)?;
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    Ok(n)
}

/// Reads one FASTQ record from `reader`, or `None` at a clean EOF
/// (no bytes read for the `@name` line).
pub fn read_record(reader: &mut impl BufRead) -> Result<Option<FastqRecord>> {
    let mut line = Vec::new();
    if read_trimmed_line(reader, &mut line)? == 0 {
        return Ok(None);
    }
    if line.first() != Some(&b'@') {
        return Err(MapperError::InvalidBinary(
            "FASTQ record does not start with '@'".to_string(),
        ));
    }
    let name = strip_mate_suffix(&line[1..]);

    let mut seq_line = Vec::new();
    if read_trimmed_line(reader, &mut seq_line)? == 0 {
        return Err(MapperError::InvalidBinary(
            "FASTQ record truncated before sequence line".to_string(),
        ));
    }
    let bases: Vec<u8> = seq_line.iter().map(|&b| encode_base(b)).collect();

    let mut plus_line = Vec::new();
    if read_trimmed_line(reader, &mut plus_line)? == 0 || plus_line.first() != Some(&b'+') {
        return Err(MapperError::InvalidBinary(
            "FASTQ record missing '+' separator line".to_string(),
        ));
    }

    let mut qual_line = Vec::new();
    if read_trimmed_line(reader, &mut qual_line)? == 0 {
        return Err(MapperError::InvalidBinary(
            "FASTQ record truncated before quality line".to_string(),
        ));
    }
    if qual_line.len() != bases.len() {
        return Err(MapperError::InvalidBinary(format!(
            "FASTQ quality length {} does not match sequence length {}",
            qual_line.len(),
            bases.len()
        )));
    }
    let qualities: Vec<u8> = qual_line.iter().map(|&b| b.saturating_sub(b'!')).collect();

    Ok(Some(FastqRecord { name, bases, qualities }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_single_record_without_trailing_newline() {
        let mut cursor = Cursor::new(b"@read1/1\nACGT\n+\nIIII".to_vec());
        let record = read_record(&mut cursor).unwrap().expect("one record");
        assert_eq!(record.name, b"read1");
        assert_eq!(record.bases, vec![1, 2, 4, 8]);
        assert_eq!(record.qualities, vec![40, 40, 40, 40]);
        assert!(read_record(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn rejects_mismatched_quality_length() {
        let mut cursor = Cursor::new(b"@r\nACGT\n+\nII\n".to_vec());
        assert!(read_record(&mut cursor).is_err());
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut cursor = Cursor::new(b"@r\r\nACGT\r\n+\r\nIIII\r\n".to_vec());
        let record = read_record(&mut cursor).unwrap().expect("one record");
        assert_eq!(record.bases, vec![1, 2, 4, 8]);
    }

    #[test]
    fn ambiguous_base_maps_to_n() {
        let mut cursor = Cursor::new(b"@r\nACGN\n+\nIIII\n".to_vec());
        let record = read_record(&mut cursor).unwrap().expect("one record");
        assert_eq!(record.bases[3], IUPAC_N);
    }
}
