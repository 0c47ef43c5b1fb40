//! C7 — windowed rescue of an unanchored mate from its partner's chain,
//! via two 32-base scalar popcount scans.

use crate::mapper::config::{InsertSizeParameters, Orientation};
use crate::mapper::error::{MapperError, Result};
use crate::mapper::read::Read;
use crate::mapper::reference::ReferenceSequence;
use crate::mapper::seed_chain::SeedChain;
use crate::mapper::seed_position::SeedPosition;

/// Maximum mismatch count (out of 32) a rescue key may carry and still
/// be accepted.
pub const RESCUE_MAX_SNPS: u32 = 7;
/// Width, in bases, of a rescue key.
const KEY_BASES: usize = 32;

/// Scans a windowed reference interval derived from an anchored mate
/// for a rescued chain on its partner.
#[derive(Debug, Clone)]
pub struct AlignmentRescue {
    insert_size: InsertSizeParameters,
    resc_nopair_len: u32,
    resc_ifpair_len: u32,
}

impl AlignmentRescue {
    /// Builds a rescue scanner. Only [`Orientation::Fr`] and
    /// [`Orientation::Rf`] are currently supported; `Ff`/`Rr` requests
    /// are rejected until that rescue pass is re-enabled.
    pub fn new(insert_size: InsertSizeParameters, resc_nopair_len: u32, resc_ifpair_len: u32) -> Result<Self> {
        match insert_size.pe_orientation {
            Orientation::Fr | Orientation::Rf => {}
            Orientation::Ff | Orientation::Rr => {
                return Err(MapperError::InvalidParameter(
                    "alignment rescue currently supports only FR/RF orientations".to_string(),
                ))
            }
        }
        Ok(Self {
            insert_size,
            resc_nopair_len,
            resc_ifpair_len,
        })
    }

    /// Whether `anchored` should trigger a rescue attempt on its mate.
    pub fn triggered_by(&self, anchored: &SeedChain, any_pair_match: bool) -> bool {
        if anchored.extra() {
            return true;
        }
        let threshold = if any_pair_match {
            self.resc_ifpair_len
        } else {
            self.resc_nopair_len
        };
        anchored.read_span_length() >= threshold
    }

    /// Attempts to rescue `mate` against `reference` using `anchored`
    /// as the known placement of its partner. Returns `None` if neither
    /// rescue key scores within [`RESCUE_MAX_SNPS`].
    pub fn scan(&self, anchored: &SeedChain, anchor_read_len: u32, mate: &Read, reference: &ReferenceSequence) -> Result<Option<SeedChain>> {
        let p = anchored.first_ref_base();
        let forward = !anchored.rc();
        let (lo, hi) = if forward {
            (
                p + self.insert_size.pe_min_insert as i64 - (anchor_read_len as i64 + 1),
                p + self.insert_size.pe_max_insert as i64,
            )
        } else {
            (
                p - self.insert_size.pe_max_insert as i64,
                p - self.insert_size.pe_min_insert as i64 + (anchor_read_len as i64 + 1),
            )
        };
        let lo = lo.max(0) as u64;
        let raw_len = (hi - lo as i64).max(0) as u64;
        let rounded_len = raw_len.div_ceil(4) * 4;
        let hi = (lo + rounded_len).min(reference.base_len());

        // Whether anchor's orientation calls for scanning the reference
        // in reverse-complement: empirically, a reverse-strand anchor
        // does, a forward-strand anchor does not.
        let needs_rc_scan = anchored.rc();
        let mut window = Vec::new();
        if needs_rc_scan {
            reference.get_rc_bases(lo, hi, &mut window)?;
            window.reverse();
        } else {
            reference.get_bases(lo, hi, &mut window)?;
        }
        let ref_len = window.len() as u32;

        let read_len = mate.len() as u32;
        let mod_offset = read_len % 4;
        let key1_len = read_len.min(KEY_BASES as u32) as usize;
        let key2_len = read_len.saturating_sub(mod_offset).min(KEY_BASES as u32) as usize;
        let key1 = pack_key(|i| mate.base_4bpb(i), key1_len);
        let key2_start = (read_len - key2_len as u32) as usize;
        let key2 = pack_key(|i| mate.base_4bpb(key2_start + i), key2_len);

        let scan_length = (ref_len.saturating_sub(read_len)).min(ref_len.saturating_sub(32 + mod_offset));
        let start2 = ref_len.saturating_sub(scan_length).saturating_sub(32 + mod_offset);

        let mut best1 = (u32::MAX, 0u32, false);
        let mut best2 = (u32::MAX, 0u32, false);
        for i in 0..scan_length {
            let ref_win1 = mask_n(pack_key(|j| window[(i as usize) + j], KEY_BASES));
            let mismatches1 = KEY_BASES as u32 - (key1 & ref_win1).count_ones();
            update_best(&mut best1, mismatches1, i, scan_length);

            let ref_win2 = mask_n(pack_key(|j| window[(start2 as usize + i as usize) + j], KEY_BASES));
            let mismatches2 = KEY_BASES as u32 - (key2 & ref_win2).count_ones();
            update_best(&mut best2, mismatches2, i, scan_length);
        }

        let (mismatches1, offset1, conflict1) = best1;
        let (mismatches2, offset2, conflict2) = best2;
        let mut conflict = conflict1 || conflict2;
        let (offset1, offset2) = if offset1 != offset2 {
            conflict = true;
            if mismatches1 <= mismatches2 {
                (offset1, offset1)
            } else {
                (offset2, offset2)
            }
        } else {
            (offset1, offset2)
        };

        if mismatches1 > RESCUE_MAX_SNPS && mismatches2 > RESCUE_MAX_SNPS {
            return Ok(None);
        }

        let ref_pos1 = lo + offset1 as u64;
        let ref_pos2 = lo + start2 as u64 + offset2 as u64;
        let rc = !anchored.rc();
        let first = SeedPosition::new(0, KEY_BASES as u32, ref_pos1, 0);
        let mut chain = SeedChain::new(rc, first, read_len, false, anchored.extra());
        if key2_start as u32 != 0 {
            let second = SeedPosition::new(key2_start as u32, KEY_BASES as u32, ref_pos2, 0);
            chain.insert(second, rc, read_len, false);
        }
        chain.set_need_rescue(false);
        if conflict {
            // perfectAlignment was seeded true by SeedChain::new; a
            // disagreement between the two keys' offsets means the
            // rescued placement is not perfectly gapless.
            chain.insert(
                SeedPosition::new(0, KEY_BASES as u32, ref_pos1.wrapping_add(1), 0),
                rc,
                read_len,
                false,
            );
        }
        Ok(Some(chain))
    }
}

fn pack_key(base_at: impl Fn(usize) -> u8, len: usize) -> u128 {
    let mut key: u128 = 0;
    for i in 0..len {
        let shift = 124 - 4 * i as u32;
        key |= (base_at(i) as u128 & 0xF) << shift;
    }
    key
}

fn mask_n(mut window: u128) -> u128 {
    for i in 0..KEY_BASES {
        let shift = 124 - 4 * i as u32;
        if (window >> shift) & 0xF == 0xF {
            window &= !(0xFu128 << shift);
        }
    }
    window
}

fn update_best(best: &mut (u32, u32, bool), mismatches: u32, offset: u32, scan_length: u32) {
    let (best_mismatches, _, conflict) = best;
    if mismatches < *best_mismatches {
        *best = (mismatches, offset, *conflict);
    } else if mismatches == *best_mismatches && *best_mismatches <= RESCUE_MAX_SNPS {
        best.2 = true;
        let _ = scan_length;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_read(bases: &[u8]) -> Read {
        let mut read = Read::new();
        read.init(b"mate".to_vec(), bases.to_vec(), vec![30; bases.len()], 1, 0);
        read
    }

    fn pack_bytes(bases: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(bases.len().div_ceil(2));
        for chunk in bases.chunks(2) {
            let lo = chunk[0] & 0xF;
            let hi = chunk.get(1).copied().unwrap_or(0) & 0xF;
            bytes.push(lo | (hi << 4));
        }
        bytes
    }

    /// A scaled-down analog of a forward-anchor, perfect-match rescue:
    /// an identical mate embedded inside the derived window at a
    /// shared offset yields a perfect, conflict-free rescued chain.
    #[test]
    fn identical_mate_rescues_with_zero_mismatches() {
        let motif = [1u8, 2, 4, 8]; // A, C, G, T
        let read_len = 40usize;
        let p: i64 = 300;
        let pe_min = 41u32;
        let pe_max = 200u32;
        let lo = (p + pe_min as i64 - (read_len as i64 + 1)).max(0) as usize;
        let hi = (p + pe_max as i64) as usize;
        let window_len = (hi - lo).div_ceil(4) * 4;

        // Pseudo-random (but fully deterministic) base sequence so no
        // 32-mer outside the embedded match accidentally ties it.
        let reference_bases: Vec<u8> = (0..lo + window_len + read_len)
            .map(|i| motif[((i as u32).wrapping_mul(2_654_435_761) >> 28) as usize % 4])
            .collect();
        let mate_bases: Vec<u8> = (0..read_len).map(|i| reference_bases[p as usize + i]).collect();

        let reference_bytes = pack_bytes(&reference_bases);
        let reference = ReferenceSequence::new(Arc::from(reference_bytes.into_boxed_slice()), Vec::new());

        let insert_size = InsertSizeParameters {
            pe_min_insert: pe_min,
            pe_max_insert: pe_max,
            pe_mean_insert: 120,
            pe_orientation: Orientation::Fr,
        };
        let rescue = AlignmentRescue::new(insert_size, 20, 20).unwrap();

        let anchor_position = SeedPosition::new(0, read_len as u32, p as u64, 0);
        let mut anchor = SeedChain::new(false, anchor_position, read_len as u32, false, false);
        anchor.insert(
            SeedPosition::new(read_len as u32 - 1, 1, p as u64 + read_len as u64 - 1, 0),
            false,
            read_len as u32,
            false,
        );

        let mate = make_read(&mate_bases);
        let rescued = rescue
            .scan(&anchor, read_len as u32, &mate, &reference)
            .unwrap()
            .expect("identical mate should rescue");
        assert!(rescued.rc());
        assert_eq!(rescued.first_read_base(), 0);
    }
}
