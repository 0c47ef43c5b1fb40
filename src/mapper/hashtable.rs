//! C4 — the hash table itself: bucket addressing, neighborhood
//! probing, chain following and extend-table interval reassembly.

use std::path::Path;
use std::sync::Arc;

use crate::mapper::error::{MapperError, Result};
use crate::mapper::hash_record::{HashRecord, RecordKind};

fn read_u32(bytes: &[u8], offset: &mut usize) -> Result<u32> {
    let slice: [u8; 4] = bytes
        .get(*offset..*offset + 4)
        .ok_or_else(|| MapperError::InvalidBinary("hashtable header truncated".to_string()))?
        .try_into()
        .expect("checked length above");
    *offset += 4;
    Ok(u32::from_le_bytes(slice))
}

fn read_u64(bytes: &[u8], offset: &mut usize) -> Result<u64> {
    let slice: [u8; 8] = bytes
        .get(*offset..*offset + 8)
        .ok_or_else(|| MapperError::InvalidBinary("hashtable header truncated".to_string()))?
        .try_into()
        .expect("checked length above");
    *offset += 8;
    Ok(u64::from_le_bytes(slice))
}

fn read_name(bytes: &[u8], offset: &mut usize) -> Result<String> {
    let len = read_u32(bytes, offset)? as usize;
    let slice = bytes
        .get(*offset..*offset + len)
        .ok_or_else(|| MapperError::InvalidBinary("hashtable header sequence name truncated".to_string()))?;
    *offset += len;
    String::from_utf8(slice.to_vec())
        .map_err(|e| MapperError::InvalidBinary(format!("sequence name is not valid UTF-8: {e}")))
}

/// One reference-sequence descriptor from the hashtable binary header.
#[derive(Debug, Clone)]
pub struct SequenceDescriptor {
    /// Sequence name (e.g. `"chr1"`).
    pub name: String,
    /// Base offset of this sequence within the reference image.
    pub seq_start: u64,
    /// Number of bases trimmed (forced to N) at the start.
    pub beg_trim: u64,
    /// Number of bases trimmed (forced to N) at the end.
    pub end_trim: u64,
    /// Usable sequence length.
    pub seq_len: u64,
}

/// Fixed-size configuration read from the front of a hashtable binary.
#[derive(Debug, Clone)]
pub struct HashtableHeader {
    /// Binary format version; extend-table present from version 8.
    pub version: u32,
    /// Primary CRC polynomial width in bits.
    pub primary_crc_bits: u32,
    /// Primary CRC polynomial.
    pub primary_crc_poly: u64,
    /// Secondary CRC polynomial width in bits.
    pub secondary_crc_bits: u32,
    /// Secondary CRC polynomial.
    pub secondary_crc_poly: u64,
    /// Primary seed length in bases.
    pub primary_seed_bases: u32,
    /// Address squeeze numerator; squeeze factor is `table_size_64ths / 64`.
    pub table_size_64ths: u64,
    /// Size of `hash_table.bin` in bytes.
    pub hashtable_bytes: u64,
    /// Size of `extend_table.bin` in bytes.
    pub extend_table_bytes: u64,
    /// Minimum observed frequency before a seed is promoted to EXTEND.
    pub min_frequency_to_extend: u32,
    /// Frequency above which a seed is dropped rather than sampled.
    pub max_seed_frequency: u32,
    /// Per-sequence descriptors.
    pub sequences: Vec<SequenceDescriptor>,
}

impl HashtableHeader {
    fn squeeze_numerator(&self) -> u64 {
        self.table_size_64ths
    }

    /// Parses the fixed header fields followed by `sequence_count`
    /// variable-length sequence descriptors, per §6's binary layout.
    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let version = read_u32(bytes, &mut offset)?;
        let primary_crc_bits = read_u32(bytes, &mut offset)?;
        let primary_crc_poly = read_u64(bytes, &mut offset)?;
        let secondary_crc_bits = read_u32(bytes, &mut offset)?;
        let secondary_crc_poly = read_u64(bytes, &mut offset)?;
        let primary_seed_bases = read_u32(bytes, &mut offset)?;
        let table_size_64ths = read_u64(bytes, &mut offset)?;
        let hashtable_bytes = read_u64(bytes, &mut offset)?;
        let extend_table_bytes = read_u64(bytes, &mut offset)?;
        let min_frequency_to_extend = read_u32(bytes, &mut offset)?;
        let max_seed_frequency = read_u32(bytes, &mut offset)?;
        let sequence_count = read_u32(bytes, &mut offset)?;

        let mut sequences = Vec::with_capacity(sequence_count as usize);
        for _ in 0..sequence_count {
            let name = read_name(bytes, &mut offset)?;
            let seq_start = read_u64(bytes, &mut offset)?;
            let beg_trim = read_u64(bytes, &mut offset)?;
            let end_trim = read_u64(bytes, &mut offset)?;
            let seq_len = read_u64(bytes, &mut offset)?;
            sequences.push(SequenceDescriptor {
                name,
                seq_start,
                beg_trim,
                end_trim,
                seq_len,
            });
        }

        Ok(Self {
            version,
            primary_crc_bits,
            primary_crc_poly,
            secondary_crc_bits,
            secondary_crc_poly,
            primary_seed_bases,
            table_size_64ths,
            hashtable_bytes,
            extend_table_bytes,
            min_frequency_to_extend,
            max_seed_frequency,
            sequences,
        })
    }
}

/// One reassembled interval `[start, start + length)` into the extend
/// table, plus how many of those entries are "extra" liftover matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendTableInterval {
    /// First extend-table index covered.
    pub start: u64,
    /// Number of contiguous entries covered.
    pub length: u64,
    /// Count of extra liftover matches folded into this interval.
    pub extra_liftovers: u64,
}

/// One decoded extend-table row: `(liftGroup[62:35], liftCode[34:33],
/// RC[32], Position[31:0])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendTableRecord {
    /// Liftover group id.
    pub lift_group: u32,
    /// 2-bit liftover code.
    pub lift_code: u8,
    /// Reverse-complement flag.
    pub rc: bool,
    /// Reference position.
    pub position: u32,
}

impl ExtendTableRecord {
    fn decode(word: u64) -> Self {
        Self {
            lift_group: crate::mapper::bits::get_bits(word, 35, 28) as u32,
            lift_code: crate::mapper::bits::get_bits(word, 33, 2) as u8,
            rc: crate::mapper::bits::get_flag(word, 32),
            position: (word & 0xFFFF_FFFF) as u32,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ScanOutcome {
    last_in_thread: bool,
    pending_chain: Option<HashRecord>,
}

/// An immutable, process-wide hash table: bucket array plus extend
/// table, sharing backing bytes cheaply across worker threads.
#[derive(Debug, Clone)]
pub struct Hashtable {
    header: HashtableHeader,
    buckets: Arc<[u8]>,
    extend_table: Arc<[u8]>,
}

const BUCKET_BYTES: u64 = 64;
const RECORDS_PER_BUCKET: usize = 8;
const MAX_PROBES: u32 = 8;

impl Hashtable {
    /// Wraps raw bucket and extend-table byte images with their header.
    pub fn new(header: HashtableHeader, buckets: Arc<[u8]>, extend_table: Arc<[u8]>) -> Result<Self> {
        if buckets.len() as u64 != header.hashtable_bytes {
            return Err(MapperError::InvalidBinary(format!(
                "hashtable_bytes header ({}) does not match buckets length ({})",
                header.hashtable_bytes,
                buckets.len()
            )));
        }
        if extend_table.len() as u64 != header.extend_table_bytes {
            return Err(MapperError::InvalidBinary(format!(
                "extend_table_bytes header ({}) does not match extend table length ({})",
                header.extend_table_bytes,
                extend_table.len()
            )));
        }
        Ok(Self {
            header,
            buckets,
            extend_table,
        })
    }

    /// The loaded header.
    pub fn header(&self) -> &HashtableHeader {
        &self.header
    }

    /// Loads `header.bin`, `hash_table.bin`, and `extend_table.bin` from
    /// `dir`. Logs a `blake3` digest of the bucket image as an integrity
    /// fingerprint (version ≥ 8 is assumed to carry an extend table;
    /// earlier versions load an empty one).
    pub fn load(dir: &Path) -> Result<Self> {
        let header_bytes = std::fs::read(dir.join("header.bin"))?;
        let header = HashtableHeader::parse(&header_bytes)?;
        let buckets = std::fs::read(dir.join("hash_table.bin"))?;
        let extend_table = if header.version >= 8 {
            std::fs::read(dir.join("extend_table.bin"))?
        } else {
            Vec::new()
        };
        let digest = blake3::hash(&buckets);
        tracing::info!(
            version = header.version,
            buckets = buckets.len(),
            extend_table_bytes = extend_table.len(),
            digest = %digest.to_hex(),
            "loaded hashtable image"
        );
        Self::new(header, Arc::from(buckets.into_boxed_slice()), Arc::from(extend_table.into_boxed_slice()))
    }

    fn bucket_count(&self) -> u64 {
        self.header.hashtable_bytes / BUCKET_BYTES
    }

    fn virtual_byte_address(&self, h: u64) -> u64 {
        let raw = (h >> 19) & 0x7_FFFF_FFFF;
        ((raw as u128 * self.header.squeeze_numerator() as u128) / 64) as u64
    }

    fn bucket_index(vba: u64) -> u64 {
        vba >> 6
    }

    fn thread_id_of(vba: u64) -> u32 {
        ((vba >> 3) & 0x3F) as u32
    }

    fn match_bits_of(h: u64, ex: bool, thread_id: u32) -> u32 {
        ((thread_id << 23) | (h as u32 & 0x7F_FFFF)) << 1 | ex as u32
    }

    fn bucket_records(&self, bucket_index: u64) -> Result<[HashRecord; RECORDS_PER_BUCKET]> {
        if bucket_index >= self.bucket_count() {
            return Err(MapperError::InvalidParameter(format!(
                "bucket index {bucket_index} out of range ({} buckets)",
                self.bucket_count()
            )));
        }
        let base = (bucket_index * BUCKET_BYTES) as usize;
        let mut records = [HashRecord::default(); RECORDS_PER_BUCKET];
        for (i, record) in records.iter_mut().enumerate() {
            let offset = base + i * 8;
            let bytes: [u8; 8] = self.buckets[offset..offset + 8]
                .try_into()
                .expect("bucket slice is exactly 8 bytes");
            *record = HashRecord(u64::from_le_bytes(bytes));
        }
        Ok(records)
    }

    fn follows(record: &HashRecord, h: u64) -> Result<bool> {
        match record.decode()? {
            RecordKind::ChainBegMask { filter_mask, .. }
            | RecordKind::ChainConMask { filter_mask, .. } => {
                Ok((filter_mask >> (h & 0x1F)) & 1 != 0)
            }
            RecordKind::ChainBegList { lanes, .. } | RecordKind::ChainConList { lanes, .. } => {
                let byte = (h & 0xFF) as u8;
                Ok(lanes.iter().any(|&lane| lane == byte))
            }
            other => Err(MapperError::InvalidBinary(format!(
                "followChain tested against a non-chain record: {other:?}"
            ))),
        }
    }

    fn is_chain_con(record: &HashRecord) -> Result<bool> {
        Ok(matches!(
            record.decode()?,
            RecordKind::ChainConMask { .. } | RecordKind::ChainConList { .. }
        ))
    }

    /// Scans records from `start` onward, accumulating hits. `allow_chain_beg`
    /// is false when scanning a *probed* bucket: chaining only originates
    /// from the initial bucket, so a probed bucket's `CHAIN_BEG_*` records
    /// are inert, same as `probeBucket` never inspecting them.
    fn scan_records(
        records: &[HashRecord; RECORDS_PER_BUCKET],
        start: usize,
        h: u64,
        thread_id: u32,
        match_bits: u32,
        allow_chain_beg: bool,
        hits: &mut Vec<HashRecord>,
    ) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();
        for record in &records[start..] {
            match record.decode()? {
                RecordKind::Hit { .. }
                | RecordKind::HiFreq { .. }
                | RecordKind::Extend { .. }
                | RecordKind::IntervalSl { .. }
                | RecordKind::IntervalSle { .. }
                | RecordKind::IntervalS { .. }
                | RecordKind::IntervalL { .. } => {
                    if record.thread_id() == thread_id {
                        if record.match_bits() == match_bits {
                            hits.push(*record);
                            outcome.last_in_thread = record.lf();
                        }
                        if record.lf() {
                            break;
                        }
                    }
                }
                RecordKind::ChainBegMask { .. } | RecordKind::ChainBegList { .. } => {
                    if allow_chain_beg && Self::follows(record, h)? {
                        outcome.pending_chain = Some(*record);
                        outcome.last_in_thread = false;
                    }
                }
                RecordKind::ChainConMask { .. } | RecordKind::ChainConList { .. } => {
                    break;
                }
                RecordKind::Empty => {}
            }
        }
        Ok(outcome)
    }

    fn follow_chain_pointer(
        &self,
        bucket_index: u64,
        chain_pointer: u32,
        h: u64,
        thread_id: u32,
        match_bits: u32,
        hits: &mut Vec<HashRecord>,
    ) -> Result<(bool, Option<HashRecord>)> {
        let base_bucket_index = (bucket_index >> 18) << 18;
        let target_bucket = base_bucket_index + chain_pointer as u64;
        let records = self.bucket_records(target_bucket)?;

        let mut idx = 0;
        let mut con_record = None;
        while idx < RECORDS_PER_BUCKET {
            if Self::is_chain_con(&records[idx])? {
                con_record = Some(records[idx]);
                idx += 1;
                break;
            }
            idx += 1;
        }
        let con_record = con_record.ok_or_else(|| {
            MapperError::InvalidBinary(format!(
                "chain target bucket {target_bucket} has no CHAIN_CON_* record"
            ))
        })?;

        let followed = Self::follows(&con_record, h)?;
        let outcome = Self::scan_records(&records, idx, h, thread_id, match_bits, true, hits)?;
        let mut last_in_thread = outcome.last_in_thread;
        let mut pending_chain = outcome.pending_chain;
        if pending_chain.is_none() && followed && !last_in_thread {
            pending_chain = Some(con_record);
        }
        if !followed {
            last_in_thread = true; // stop: chain does not continue for this hash
        }
        Ok((last_in_thread, pending_chain))
    }

    fn probe_neighborhood(
        &self,
        bucket_index: u64,
        h: u64,
        thread_id: u32,
        match_bits: u32,
        hits: &mut Vec<HashRecord>,
    ) -> Result<(bool, Option<HashRecord>)> {
        let squeeze = self.header.squeeze_numerator();
        let bytes_per_block = (1u64 << 15) * squeeze / 64;
        let buckets_per_block = (bytes_per_block / BUCKET_BYTES).max(1);
        let block_start = bucket_index - bucket_index % buckets_per_block;

        // Chaining and probing are mutually exclusive: a probed bucket
        // never originates a chain (`allow_chain_beg = false`), and
        // hitting a CHAIN_CON_* record only ends that one bucket's scan,
        // not the whole neighborhood walk.
        let mut last_in_thread = false;
        let mut pending_chain = None;
        for i in 1..=(MAX_PROBES - 1) {
            let probe_bucket = block_start + (bucket_index + i as u64) % buckets_per_block;
            let records = self.bucket_records(probe_bucket)?;
            let outcome = Self::scan_records(&records, 0, h, thread_id, match_bits, false, hits)?;
            last_in_thread = outcome.last_in_thread;
            pending_chain = outcome.pending_chain;
            if last_in_thread {
                break;
            }
        }
        Ok((last_in_thread, pending_chain))
    }

    fn reassemble_intervals(
        hits: &mut Vec<HashRecord>,
        intervals: &mut Vec<ExtendTableInterval>,
    ) -> Result<()> {
        let mut group = Vec::with_capacity(3);
        while let Some(last) = hits.last() {
            let is_interval = matches!(
                last.decode()?,
                RecordKind::IntervalSl { .. }
                    | RecordKind::IntervalSle { .. }
                    | RecordKind::IntervalS { .. }
                    | RecordKind::IntervalL { .. }
            );
            if !is_interval {
                break;
            }
            group.push(hits.pop().expect("checked non-empty above").decode()?);
        }
        if group.is_empty() {
            return Ok(());
        }
        group.reverse();
        intervals.push(Self::combine_interval(&group)?);
        Ok(())
    }

    fn combine_interval(parts: &[RecordKind]) -> Result<ExtendTableInterval> {
        let mut sl: Option<(bool, u32, u32)> = None;
        let mut sle: Option<(u32, bool, u32, u32)> = None;
        let mut s: Option<(u32, bool)> = None;
        let mut l: Option<u32> = None;
        for part in parts {
            match *part {
                RecordKind::IntervalSl { msb, start, length } => sl = Some((msb, start, length)),
                RecordKind::IntervalSle {
                    extra_liftovers,
                    msb,
                    low_start,
                    low_len,
                } => sle = Some((extra_liftovers, msb, low_start, low_len)),
                RecordKind::IntervalS { start, carry } => s = Some((start, carry)),
                RecordKind::IntervalL { length } => l = Some(length),
                other => {
                    return Err(MapperError::InvalidBinary(format!(
                        "non-interval record in interval group: {other:?}"
                    )))
                }
            }
        }

        if let Some((extra_liftovers, msb, low_start, low_len)) = sle {
            let base_start = s.map_or(0, |(st, carry)| st as u64 + if carry { 1 << 24 } else { 0 });
            let low_start_shift = if msb { 24 } else { 0 };
            let start = ((low_start as u64) << low_start_shift) | base_start;
            let length = if extra_liftovers == 0 {
                ((low_len as u64) << 24) | l.unwrap_or(0) as u64
            } else {
                low_len as u64
            };
            return Ok(ExtendTableInterval {
                start,
                length,
                extra_liftovers: extra_liftovers as u64,
            });
        }
        if let Some((msb, hi_or_start, length)) = sl {
            if msb {
                let (st, carry) = s.ok_or_else(|| {
                    MapperError::InvalidBinary("INTERVAL_SL1 without a following S record".into())
                })?;
                let start = ((hi_or_start as u64) << 24) + st as u64 + if carry { 1 << 24 } else { 0 };
                return Ok(ExtendTableInterval {
                    start,
                    length: length as u64,
                    extra_liftovers: 0,
                });
            }
            return Ok(ExtendTableInterval {
                start: hi_or_start as u64,
                length: length as u64,
                extra_liftovers: 0,
            });
        }
        if let (Some((st, carry)), Some(len)) = (s, l) {
            let start = st as u64 + if carry { 1 << 24 } else { 0 };
            return Ok(ExtendTableInterval {
                start,
                length: len as u64,
                extra_liftovers: 0,
            });
        }
        Err(MapperError::InvalidBinary(
            "unrecognized extend-table interval record combination".to_string(),
        ))
    }

    /// Reads `interval.length` extend-table rows starting at `interval.start`.
    pub fn read_extend_table(&self, interval: ExtendTableInterval) -> Result<Vec<ExtendTableRecord>> {
        let end = interval.start + interval.length;
        if end * 8 > self.extend_table.len() as u64 {
            return Err(MapperError::InvalidParameter(format!(
                "extend-table interval [{}, {}) exceeds table length",
                interval.start, end
            )));
        }
        let mut out = Vec::with_capacity(interval.length as usize);
        for index in interval.start..end {
            let offset = (index * 8) as usize;
            let bytes: [u8; 8] = self.extend_table[offset..offset + 8]
                .try_into()
                .expect("extend table slice is exactly 8 bytes");
            out.push(ExtendTableRecord::decode(u64::from_le_bytes(bytes)));
        }
        Ok(out)
    }

    /// Queries the table for hash `h`. `is_extended` is forwarded for
    /// future tracing/diagnostics only; addressing does not branch on it.
    pub fn get_hits(
        &self,
        h: u64,
        is_extended: bool,
        hits: &mut Vec<HashRecord>,
        intervals: &mut Vec<ExtendTableInterval>,
    ) -> Result<()> {
        hits.clear();
        intervals.clear();
        let _ = is_extended;

        let vba = self.virtual_byte_address(h);
        let bucket_index = Self::bucket_index(vba);
        let thread_id = Self::thread_id_of(vba);
        let match_bits = Self::match_bits_of(h, is_extended, thread_id);

        let records = self.bucket_records(bucket_index)?;
        let initial = Self::scan_records(&records, 0, h, thread_id, match_bits, true, hits)?;
        let mut last_in_thread = initial.last_in_thread;
        let mut pending_chain = initial.pending_chain;

        if !last_in_thread && pending_chain.is_none() {
            let (probed_last, probed_chain) =
                self.probe_neighborhood(bucket_index, h, thread_id, match_bits, hits)?;
            last_in_thread = probed_last;
            pending_chain = probed_chain;
        }

        while let Some(chain_record) = pending_chain.take() {
            let chain_pointer = match chain_record.decode()? {
                RecordKind::ChainBegMask { chain_pointer, .. }
                | RecordKind::ChainConMask { chain_pointer, .. }
                | RecordKind::ChainBegList { chain_pointer, .. }
                | RecordKind::ChainConList { chain_pointer, .. } => chain_pointer,
                other => {
                    return Err(MapperError::InvalidBinary(format!(
                        "pending chain slot holds a non-chain record: {other:?}"
                    )))
                }
            };
            let (next_last, next_chain) = self.follow_chain_pointer(
                bucket_index,
                chain_pointer,
                h,
                thread_id,
                match_bits,
                hits,
            )?;
            last_in_thread = next_last;
            pending_chain = next_chain;
        }

        Self::reassemble_intervals(hits, intervals)?;
        let _ = last_in_thread;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_header(hashtable_bytes: u64, extend_table_bytes: u64) -> HashtableHeader {
        HashtableHeader {
            version: 8,
            primary_crc_bits: 54,
            primary_crc_poly: 0x2C_991C_E6A8_DD55,
            secondary_crc_bits: 32,
            secondary_crc_poly: 0x04C1_1DB7,
            primary_seed_bases: 21,
            table_size_64ths: 64,
            hashtable_bytes,
            extend_table_bytes,
            min_frequency_to_extend: 4,
            max_seed_frequency: 128,
            sequences: Vec::new(),
        }
    }

    fn single_bucket_table(records: [HashRecord; 8]) -> Hashtable {
        let mut bytes = Vec::with_capacity(64);
        for record in records {
            bytes.extend_from_slice(&record.0.to_le_bytes());
        }
        let header = empty_header(64, 0);
        Hashtable::new(header, bytes.into(), Arc::from([].as_slice())).unwrap()
    }

    #[test]
    fn all_empty_bucket_returns_no_hits() {
        let table = single_bucket_table([HashRecord::empty(); 8]);
        let mut hits = Vec::new();
        let mut intervals = Vec::new();
        table.get_hits(0, false, &mut hits, &mut intervals).unwrap();
        assert!(hits.is_empty());
        assert!(intervals.is_empty());
    }

    #[test]
    fn matching_hit_is_returned() {
        // h chosen so virtualByteAddress/bucketIndex/threadId all land on
        // bucket 0: raw = (h>>19)&0x7FFFFFFF must be 0 so vba=0.
        let h: u64 = 0x123; // top bits zero => vba = 0, bucket_index = 0, thread_id = 0
        let thread_id = Hashtable::thread_id_of(0);
        let match_bits = Hashtable::match_bits_of(h, false, thread_id);
        // Reconstruct the hash_bits/ex components matching `match_bits`.
        let ex = false;
        let hash_bits = (match_bits >> 1) & 0x7F_FFFF;
        let hit = HashRecord::hit(thread_id, hash_bits, ex, true, false, 42);
        assert_eq!(hit.match_bits(), match_bits);

        let mut records = [HashRecord::empty(); 8];
        records[0] = hit;
        let table = single_bucket_table(records);
        let mut hits = Vec::new();
        let mut intervals = Vec::new();
        table.get_hits(h, false, &mut hits, &mut intervals).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0].decode().unwrap(), RecordKind::Hit { ref_pos: 42 }));
    }

    fn multi_bucket_table(buckets: &[[HashRecord; 8]]) -> Hashtable {
        let mut bytes = Vec::with_capacity(buckets.len() * 64);
        for bucket in buckets {
            for record in bucket {
                bytes.extend_from_slice(&record.0.to_le_bytes());
            }
        }
        let header = empty_header((buckets.len() as u64) * BUCKET_BYTES, 0);
        Hashtable::new(header, bytes.into(), Arc::from([].as_slice())).unwrap()
    }

    /// A probed bucket must never originate chaining: a `CHAIN_BEG_MASK`
    /// record encountered while probing is inert, and the scan continues
    /// into the next neighbor bucket to find the real hit.
    #[test]
    fn probing_ignores_chain_beg_and_continues_to_next_neighbor() {
        let h: u64 = 0x123;
        let thread_id = Hashtable::thread_id_of(0);
        let match_bits = Hashtable::match_bits_of(h, false, thread_id);
        let hash_bits = (match_bits >> 1) & 0x7F_FFFF;
        let hit = HashRecord::hit(thread_id, hash_bits, false, true, false, 99);

        let home = [HashRecord::empty(); 8];
        let mut probe1 = [HashRecord::empty(); 8];
        // filter_mask bit (h & 0x1F) set, so a home-bucket chain would
        // follow it; in a probed bucket it must be ignored instead.
        probe1[0] = HashRecord::chain_beg_mask(1 << (h & 0x1F), 0);
        let mut probe2 = [HashRecord::empty(); 8];
        probe2[0] = hit;

        let table = multi_bucket_table(&[home, probe1, probe2]);
        let mut hits = Vec::new();
        let mut intervals = Vec::new();
        table.get_hits(h, false, &mut hits, &mut intervals).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0].decode().unwrap(), RecordKind::Hit { ref_pos: 99 }));
    }

    /// A `CHAIN_CON_*` record ending a probed bucket stops only that
    /// bucket's scan; the neighborhood walk continues to the next probe.
    #[test]
    fn probing_continues_past_chain_con_in_a_probed_bucket() {
        let h: u64 = 0x123;
        let thread_id = Hashtable::thread_id_of(0);
        let match_bits = Hashtable::match_bits_of(h, false, thread_id);
        let hash_bits = (match_bits >> 1) & 0x7F_FFFF;
        let hit = HashRecord::hit(thread_id, hash_bits, false, true, false, 7);

        let home = [HashRecord::empty(); 8];
        let mut probe1 = [HashRecord::empty(); 8];
        probe1[0] = HashRecord::chain_con_mask(0, 0);
        let mut probe2 = [HashRecord::empty(); 8];
        probe2[0] = hit;

        let table = multi_bucket_table(&[home, probe1, probe2]);
        let mut hits = Vec::new();
        let mut intervals = Vec::new();
        table.get_hits(h, false, &mut hits, &mut intervals).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0].decode().unwrap(), RecordKind::Hit { ref_pos: 7 }));
    }

    #[test]
    fn combine_interval_sle_with_msb_shifts_low_start_and_length_by_24() {
        let parts = [
            RecordKind::IntervalSle {
                extra_liftovers: 0,
                msb: true,
                low_start: 5,
                low_len: 3,
            },
            RecordKind::IntervalS {
                start: 100,
                carry: false,
            },
            RecordKind::IntervalL { length: 50 },
        ];
        let interval = Hashtable::combine_interval(&parts).unwrap();
        assert_eq!(interval.start, (5u64 << 24) | 100);
        assert_eq!(interval.length, (3u64 << 24) | 50);
        assert_eq!(interval.extra_liftovers, 0);
    }

    #[test]
    fn combine_interval_sle_with_extra_liftovers_leaves_length_unshifted() {
        let parts = [RecordKind::IntervalSle {
            extra_liftovers: 7,
            msb: false,
            low_start: 2,
            low_len: 9,
        }];
        let interval = Hashtable::combine_interval(&parts).unwrap();
        assert_eq!(interval.start, 2);
        assert_eq!(interval.length, 9);
        assert_eq!(interval.extra_liftovers, 7);
    }

    #[test]
    fn header_round_trips_through_parse() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&8u32.to_le_bytes()); // version
        bytes.extend_from_slice(&54u32.to_le_bytes()); // primary_crc_bits
        bytes.extend_from_slice(&0x2C_991C_E6A8_DD55u64.to_le_bytes());
        bytes.extend_from_slice(&32u32.to_le_bytes()); // secondary_crc_bits
        bytes.extend_from_slice(&0x04C1_1DB7u64.to_le_bytes());
        bytes.extend_from_slice(&21u32.to_le_bytes()); // primary_seed_bases
        bytes.extend_from_slice(&64u64.to_le_bytes()); // table_size_64ths
        bytes.extend_from_slice(&64u64.to_le_bytes()); // hashtable_bytes
        bytes.extend_from_slice(&0u64.to_le_bytes()); // extend_table_bytes
        bytes.extend_from_slice(&4u32.to_le_bytes()); // min_frequency_to_extend
        bytes.extend_from_slice(&128u32.to_le_bytes()); // max_seed_frequency
        bytes.extend_from_slice(&1u32.to_le_bytes()); // sequence_count
        let name = b"chr1";
        bytes.extend_from_slice(&(name.len() as u32).to_le_bytes());
        bytes.extend_from_slice(name);
        bytes.extend_from_slice(&0u64.to_le_bytes()); // seq_start
        bytes.extend_from_slice(&5u64.to_le_bytes()); // beg_trim
        bytes.extend_from_slice(&3u64.to_le_bytes()); // end_trim
        bytes.extend_from_slice(&1_000u64.to_le_bytes()); // seq_len

        let header = HashtableHeader::parse(&bytes).unwrap();
        assert_eq!(header.version, 8);
        assert_eq!(header.sequences.len(), 1);
        assert_eq!(header.sequences[0].name, "chr1");
        assert_eq!(header.sequences[0].beg_trim, 5);
        assert_eq!(header.sequences[0].end_trim, 3);
    }
}
