//! C4 data model — the 64-bit tagged hash-record union and the
//! extend-table interval records it can encode.
//!
//! Layout (bit positions, MSB first):
//!
//! ```text
//! [63:58] ThreadId   (6 bits)   \
//! [57:35] HashBits   (23 bits)   } "common" fields, present on every
//! [34]    EX                     } record kind except CHAIN_BEG/CON,
//! [33]    LF                     } which reuse this span as filter bits
//! [32]    RC                    /
//! [31:28] tag nibble: 0xF marks a non-HIT record, anything else means
//!         this word *is* a HIT and [31:0] is its RefPos.
//! [27:24] sub-opcode, meaningful only when the tag nibble is 0xF.
//! [23:0]  24-bit payload for EMPTY/HIFREQ/EXTEND/INTERVAL_*; CHAIN_BEG/CON
//!         instead reinterpret the full 56 non-tag bits ([63:32] + [23:0])
//!         as a 32-bit filter plus an 18-bit chain pointer, since chain
//!         records are matched against the raw hash rather than a
//!         thread id.
//! ```

use crate::mapper::bits::{get_bits, get_flag};
use crate::mapper::error::{MapperError, Result};

const THREAD_ID_START: u32 = 58;
const THREAD_ID_BITS: u32 = 6;
const HASH_BITS_START: u32 = 35;
const HASH_BITS_BITS: u32 = 23;
const EX_BIT: u32 = 34;
const LF_BIT: u32 = 33;
const RC_BIT: u32 = 32;
const TAG_START: u32 = 28;
const TAG_BITS: u32 = 4;
const OPCODE_START: u32 = 24;
const OPCODE_BITS: u32 = 4;
const TAG_SENTINEL: u64 = 0xF;

const OP_EMPTY: u64 = 0x0;
const OP_HIFREQ: u64 = 0x1;
const OP_EXTEND: u64 = 0x2;
const OP_CHAIN_BEG_MASK: u64 = 0x3;
const OP_CHAIN_BEG_LIST: u64 = 0x4;
const OP_CHAIN_CON_MASK: u64 = 0x5;
const OP_CHAIN_CON_LIST: u64 = 0x6;
const OP_INTERVAL_SL: u64 = 0x7;
const OP_INTERVAL_SLE: u64 = 0x8;
const OP_INTERVAL_S: u64 = 0x9;
const OP_INTERVAL_L: u64 = 0xA;

/// The decoded, tagged contents of a [`HashRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A direct hit: `RefPos` is a reference position, not a sentinel.
    Hit { ref_pos: u32 },
    /// Bucket padding.
    Empty,
    /// Legacy high-frequency marker carrying a saturating frequency count.
    HiFreq { frequency: u32 },
    /// Triggers a secondary-hash extension lookup.
    Extend {
        extension_length: u32,
        extension_id: u32,
    },
    /// Chain-begin record, mask-filtered variant.
    ChainBegMask { filter_mask: u32, chain_pointer: u32 },
    /// Chain-begin record, 4-lane list-filtered variant.
    ChainBegList { lanes: [u8; 4], chain_pointer: u32 },
    /// Chain-continuation record, mask-filtered variant.
    ChainConMask { filter_mask: u32, chain_pointer: u32 },
    /// Chain-continuation record, 4-lane list-filtered variant.
    ChainConList { lanes: [u8; 4], chain_pointer: u32 },
    /// A self-contained `(start, length)` extend-table interval: SL0
    /// (`msb = false`, `Length[23:15] Start[14:0]`) or SL1 (`msb =
    /// true`, `Length[23:8] Start[7:0]`, paired with a following
    /// `IntervalS`).
    IntervalSl { msb: bool, start: u32, length: u32 },
    /// Extra-liftover and overflow bits for a 3-record interval combination:
    /// `Exlifts[23:16] Length[15:8] Start[7:0]`, `msb` shared with `RC`.
    IntervalSle {
        extra_liftovers: u32,
        msb: bool,
        low_start: u32,
        low_len: u32,
    },
    /// The low 24 bits of an interval's start (`Start[23:0]`), plus an
    /// overflow carry shared with the `RC` bit.
    IntervalS { start: u32, carry: bool },
    /// The full length of an interval.
    IntervalL { length: u32 },
}

/// One 64-bit hash-table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashRecord(pub u64);

impl HashRecord {
    fn common_thread_id(word: u64) -> u32 {
        get_bits(word, THREAD_ID_START, THREAD_ID_BITS) as u32
    }
    fn common_hash_bits(word: u64) -> u32 {
        get_bits(word, HASH_BITS_START, HASH_BITS_BITS) as u32
    }
    fn common_ex(word: u64) -> bool {
        get_flag(word, EX_BIT)
    }

    /// The record's thread id (meaningful on every kind except
    /// CHAIN_BEG/CON, which reuse this span).
    pub fn thread_id(&self) -> u32 {
        Self::common_thread_id(self.0)
    }

    /// The record's hash-bits field.
    pub fn hash_bits(&self) -> u32 {
        Self::common_hash_bits(self.0)
    }

    /// The `EX` flag.
    pub fn ex(&self) -> bool {
        Self::common_ex(self.0)
    }

    /// The `LF` (last-in-thread) flag.
    pub fn lf(&self) -> bool {
        get_flag(self.0, LF_BIT)
    }

    /// The `RC` (reverse-complement) flag, meaningful for [`RecordKind::Hit`].
    pub fn rc(&self) -> bool {
        get_flag(self.0, RC_BIT)
    }

    /// The 30-bit `ThreadId ∥ HashBits ∥ EX` key used to test whether two
    /// records in the same thread refer to the same seed.
    pub fn match_bits(&self) -> u32 {
        ((self.thread_id() << HASH_BITS_BITS) | self.hash_bits()) << 1 | self.ex() as u32
    }

    fn is_tagged(word: u64) -> bool {
        get_bits(word, TAG_START, TAG_BITS) == TAG_SENTINEL
    }

    fn opcode(word: u64) -> u64 {
        get_bits(word, OPCODE_START, OPCODE_BITS)
    }

    fn payload24(word: u64) -> u64 {
        get_bits(word, 0, 24)
    }

    /// Decodes the tagged union. Fails with [`MapperError::InvalidBinary`]
    /// on an opcode outside the known set.
    pub fn decode(&self) -> Result<RecordKind> {
        let word = self.0;
        if !Self::is_tagged(word) {
            return Ok(RecordKind::Hit {
                ref_pos: (word & 0xFFFF_FFFF) as u32,
            });
        }
        let payload = Self::payload24(word);
        match Self::opcode(word) {
            OP_EMPTY => Ok(RecordKind::Empty),
            OP_HIFREQ => Ok(RecordKind::HiFreq {
                frequency: payload as u32,
            }),
            OP_EXTEND => Ok(RecordKind::Extend {
                extension_id: (payload & 0x3_FFFF) as u32,
                extension_length: (payload >> 18) as u32,
            }),
            op @ (OP_CHAIN_BEG_MASK | OP_CHAIN_CON_MASK) => {
                let filter_hi = get_bits(word, 32, 32);
                let pointer = payload as u32;
                if op == OP_CHAIN_BEG_MASK {
                    Ok(RecordKind::ChainBegMask {
                        filter_mask: filter_hi as u32,
                        chain_pointer: pointer,
                    })
                } else {
                    Ok(RecordKind::ChainConMask {
                        filter_mask: filter_hi as u32,
                        chain_pointer: pointer,
                    })
                }
            }
            op @ (OP_CHAIN_BEG_LIST | OP_CHAIN_CON_LIST) => {
                let filter_hi = get_bits(word, 32, 32) as u32;
                let lanes = filter_hi.to_be_bytes();
                let pointer = payload as u32;
                if op == OP_CHAIN_BEG_LIST {
                    Ok(RecordKind::ChainBegList {
                        lanes,
                        chain_pointer: pointer,
                    })
                } else {
                    Ok(RecordKind::ChainConList {
                        lanes,
                        chain_pointer: pointer,
                    })
                }
            }
            OP_INTERVAL_SL => {
                // MSB/isMsb() reuses the common RC bit, same as every
                // other record kind's MSB-ish flag.
                let msb = get_flag(word, RC_BIT);
                let (start, length) = if msb {
                    // SL1: Length[23:8] Start[7:0]
                    (get_bits(word, 0, 8) as u32, get_bits(word, 8, 16) as u32)
                } else {
                    // SL0: Length[23:15] Start[14:0]
                    (get_bits(word, 0, 15) as u32, get_bits(word, 15, 9) as u32)
                };
                Ok(RecordKind::IntervalSl { msb, start, length })
            }
            OP_INTERVAL_SLE => Ok(RecordKind::IntervalSle {
                msb: get_flag(word, RC_BIT),
                extra_liftovers: get_bits(word, 16, 8) as u32,
                low_start: get_bits(word, 0, 8) as u32,
                low_len: get_bits(word, 8, 8) as u32,
            }),
            OP_INTERVAL_S => Ok(RecordKind::IntervalS {
                start: payload as u32,
                carry: get_flag(word, RC_BIT),
            }),
            OP_INTERVAL_L => Ok(RecordKind::IntervalL {
                length: payload as u32,
            }),
            other => Err(MapperError::InvalidBinary(format!(
                "unknown hash-record opcode {other:#x}"
            ))),
        }
    }

    fn build_common(thread_id: u32, hash_bits: u32, ex: bool, lf: bool, rc: bool) -> u64 {
        ((thread_id as u64) << THREAD_ID_START)
            | ((hash_bits as u64 & 0x7F_FFFF) << HASH_BITS_START)
            | ((ex as u64) << EX_BIT)
            | ((lf as u64) << LF_BIT)
            | ((rc as u64) << RC_BIT)
    }

    fn build_tagged(opcode: u64, payload: u64) -> u64 {
        (TAG_SENTINEL << TAG_START) | (opcode << OPCODE_START) | (payload & 0xFF_FFFF)
    }

    /// Builds a HIT record.
    pub fn hit(thread_id: u32, hash_bits: u32, ex: bool, lf: bool, rc: bool, ref_pos: u32) -> Self {
        Self(Self::build_common(thread_id, hash_bits, ex, lf, rc) | ref_pos as u64)
    }

    /// Builds an EMPTY record.
    pub fn empty() -> Self {
        Self(Self::build_tagged(OP_EMPTY, 0))
    }

    /// Builds an EXTEND record.
    pub fn extend(
        thread_id: u32,
        hash_bits: u32,
        ex: bool,
        lf: bool,
        extension_length: u32,
        extension_id: u32,
    ) -> Self {
        let payload = ((extension_length as u64) << 18) | (extension_id as u64 & 0x3_FFFF);
        Self(
            Self::build_common(thread_id, hash_bits, ex, lf, false)
                | Self::build_tagged(OP_EXTEND, payload),
        )
    }

    /// Builds a CHAIN_BEG_MASK record.
    pub fn chain_beg_mask(filter_mask: u32, chain_pointer: u32) -> Self {
        Self(((filter_mask as u64) << 32) | Self::build_tagged(OP_CHAIN_BEG_MASK, chain_pointer as u64))
    }

    /// Builds a CHAIN_CON_MASK record.
    pub fn chain_con_mask(filter_mask: u32, chain_pointer: u32) -> Self {
        Self(((filter_mask as u64) << 32) | Self::build_tagged(OP_CHAIN_CON_MASK, chain_pointer as u64))
    }

    /// Builds an INTERVAL_SL record (SL0 if `!msb`, SL1 if `msb`).
    pub fn interval_sl(msb: bool, start: u32, length: u32) -> Self {
        let payload = if msb {
            // SL1: Length[23:8] Start[7:0]
            ((length as u64 & 0xFFFF) << 8) | (start as u64 & 0xFF)
        } else {
            // SL0: Length[23:15] Start[14:0]
            ((length as u64 & 0x1FF) << 15) | (start as u64 & 0x7FFF)
        };
        Self(((msb as u64) << RC_BIT) | Self::build_tagged(OP_INTERVAL_SL, payload))
    }

    /// Builds an INTERVAL_S record (`start` truncated to 24 bits, `carry`
    /// shared with the `RC` bit).
    pub fn interval_s(start: u32, carry: bool) -> Self {
        let payload = start as u64 & 0xFF_FFFF;
        Self(((carry as u64) << RC_BIT) | Self::build_tagged(OP_INTERVAL_S, payload))
    }

    /// Builds an INTERVAL_L record.
    pub fn interval_l(length: u32) -> Self {
        Self(Self::build_tagged(OP_INTERVAL_L, length as u64))
    }

    /// Builds an INTERVAL_SLE record (`msb` shared with the `RC` bit).
    pub fn interval_sle(extra_liftovers: u32, msb: bool, low_start: u32, low_len: u32) -> Self {
        let payload = ((extra_liftovers as u64 & 0xFF) << 16)
            | ((low_len as u64 & 0xFF) << 8)
            | (low_start as u64 & 0xFF);
        Self(((msb as u64) << RC_BIT) | Self::build_tagged(OP_INTERVAL_SLE, payload))
    }
}
