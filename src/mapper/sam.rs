//! Thin text SAM writer for the CLI's illustrative output path.
//!
//! Full BAM/CRAM emission and header management are out of scope for
//! the mapper core (that belongs to a downstream conversion step); this
//! writer exists so [`crate::mapper::pairing`]'s output is directly
//! inspectable.

use std::io::Write;

use crate::mapper::cigar::CigarBuilder;
use crate::mapper::error::Result;
use crate::mapper::reference::decode_base;

/// SAM FLAG bits this writer sets.
pub mod flags {
    /// Template has multiple segments (paired-end).
    pub const PAIRED: u16 = 0x1;
    /// Each segment properly aligned per the aligner.
    pub const PROPER_PAIR: u16 = 0x2;
    /// Segment unmapped.
    pub const UNMAPPED: u16 = 0x4;
    /// Next segment in the template unmapped.
    pub const MATE_UNMAPPED: u16 = 0x8;
    /// `SEQ` is reverse complemented.
    pub const REVERSE: u16 = 0x10;
    /// `SEQ` of the next segment is reverse complemented.
    pub const MATE_REVERSE: u16 = 0x20;
    /// The first segment in the template.
    pub const FIRST_IN_PAIR: u16 = 0x40;
    /// The last segment in the template.
    pub const LAST_IN_PAIR: u16 = 0x80;
    /// Secondary alignment.
    pub const SECONDARY: u16 = 0x100;
}

/// One SAM record's worth of fields, already resolved by the caller
/// (this module performs no coordinate or flag derivation).
pub struct SamRecord<'a> {
    /// `QNAME`.
    pub name: &'a [u8],
    /// `FLAG`.
    pub flag: u16,
    /// `RNAME`, or `"*"` if unmapped.
    pub ref_name: &'a str,
    /// `POS`, 1-based.
    pub pos: i64,
    /// `MAPQ`.
    pub mapq: u32,
    /// `CIGAR`, or `None` for `*`.
    pub cigar: Option<&'a CigarBuilder>,
    /// `RNEXT`.
    pub rnext: &'a str,
    /// `PNEXT`, 1-based.
    pub pnext: i64,
    /// `TLEN`.
    pub tlen: i64,
    /// 4-bit IUPAC bases, forward-strand orientation as stored on disk
    /// (the caller reverse-complements before calling if `FLAG & REVERSE`).
    pub bases: &'a [u8],
    /// Phred quality scores (written as `qual + 33`).
    pub qualities: &'a [u8],
}

/// Writes one tab-separated SAM line, including the trailing newline.
pub fn write_record(writer: &mut (impl Write + ?Sized), record: &SamRecord<'_>) -> Result<()> {
    let seq: String = record.bases.iter().map(|&b| decode_base(b)).collect();
    let qual: String = record
        .qualities
        .iter()
        .map(|&q| (q.saturating_add(33)) as char)
        .collect();
    let cigar_field = match record.cigar {
        Some(cigar) if !cigar.records().is_empty() => cigar.to_string(),
        _ => "*".to_string(),
    };

    writeln!(
        writer,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        String::from_utf8_lossy(record.name),
        record.flag,
        record.ref_name,
        record.pos,
        record.mapq,
        cigar_field,
        record.rnext,
        record.pnext,
        record.tlen,
        seq,
        qual,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_tab_separated_fields() {
        let mut cigar = CigarBuilder::new();
        cigar.add_match();
        cigar.add_match();
        cigar.consolidate();
        let record = SamRecord {
            name: b"read1",
            flag: flags::PAIRED | flags::PROPER_PAIR,
            ref_name: "chr1",
            pos: 101,
            mapq: 60,
            cigar: Some(&cigar),
            rnext: "=",
            pnext: 201,
            tlen: 150,
            bases: &[1, 2, 4, 8],
            qualities: &[39, 39, 39, 39],
        };
        let mut out = Vec::new();
        write_record(&mut out, &record).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert_eq!(
            line,
            "read1\t3\tchr1\t101\t60\t2M\t=\t201\t150\tACGT\tHHHH\n"
        );
    }

    #[test]
    fn unmapped_cigar_renders_as_star() {
        let record = SamRecord {
            name: b"read2",
            flag: flags::PAIRED | flags::UNMAPPED,
            ref_name: "*",
            pos: 0,
            mapq: 0,
            cigar: None,
            rnext: "*",
            pnext: 0,
            tlen: 0,
            bases: &[1],
            qualities: &[0],
        };
        let mut out = Vec::new();
        write_record(&mut out, &record).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("\t*\t"));
    }
}
