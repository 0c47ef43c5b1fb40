//! C6 data — an ordered collection of same-orientation seed placements,
//! with the diagonal bookkeeping used for chain acceptance tests.

use std::collections::BTreeMap;

use crate::mapper::seed_position::SeedPosition;

/// Quantizer for the diameter/radius acceptance tests.
pub const SMALL_QUANTIZER: i64 = 4;
/// Quantizer used by the age-based termination test.
pub const LARGE_QUANTIZER: u32 = 16;
/// Maximum allowed spread (in `SMALL` units) among non-OLD diagonals.
pub const MAX_DIAMETER: i64 = 8;
/// Maximum allowed distance (in `SMALL` units) from either extreme diagonal.
pub const MAX_RADIUS: i64 = 5;
/// Age (in `LARGE` units) past which a diagonal is excluded from the
/// diameter test.
pub const AGE_OLD: u32 = 9;
/// Age (in `LARGE` units) past which a diagonal is evicted outright.
pub const AGE_ANCIENT: u32 = 31;

/// One seed-position recorded in a chain, with the sampling flag it
/// arrived with.
#[derive(Debug, Clone, Copy)]
pub struct SeedChainEntry {
    /// The placement.
    pub position: SeedPosition,
    /// True if this placement came from a high-frequency interval
    /// sample rather than a direct hit.
    pub random_sample: bool,
}

/// An ordered collection of seed-positions sharing one orientation.
#[derive(Debug, Clone)]
pub struct SeedChain {
    rc: bool,
    entries: Vec<SeedChainEntry>,
    initial_diagonal: i64,
    perfect_alignment: bool,
    random_samples_only: bool,
    filtered: bool,
    need_rescue: bool,
    extra: bool,
    first_read_base: u32,
    last_read_base: u32,
    first_ref_base: i64,
    last_ref_base: i64,
    covered_ranges: Vec<(u32, u32)>,
    coverage: u32,
    diagonal_table: BTreeMap<i64, u32>,
}

impl SeedChain {
    /// Starts a new chain from its first seed-position.
    pub fn new(rc: bool, position: SeedPosition, read_len: u32, random_sample: bool, extra: bool) -> Self {
        let diagonal = position.diagonal(rc);
        let first_proj = position.first_projection(rc);
        let last_proj = position.last_projection(rc, read_len);
        let (first_ref_base, last_ref_base) = if first_proj <= last_proj {
            (first_proj, last_proj)
        } else {
            (last_proj, first_proj)
        };
        let read_start = position.read_position();
        let read_end = position.read_position() + position.primary_length();
        let mut diagonal_table = BTreeMap::new();
        diagonal_table.insert(diagonal, position.read_position());
        Self {
            rc,
            entries: vec![SeedChainEntry {
                position,
                random_sample,
            }],
            initial_diagonal: diagonal,
            perfect_alignment: true,
            random_samples_only: random_sample,
            filtered: false,
            need_rescue: false,
            extra,
            first_read_base: read_start,
            last_read_base: read_end,
            first_ref_base,
            last_ref_base,
            covered_ranges: vec![(read_start, read_end)],
            coverage: read_end - read_start,
            diagonal_table,
        }
    }

    /// Orientation shared by every seed-position in this chain.
    pub fn rc(&self) -> bool {
        self.rc
    }
    /// Recorded seed-positions, in insertion order.
    pub fn entries(&self) -> &[SeedChainEntry] {
        &self.entries
    }
    /// The diagonal of the first seed added to this chain.
    pub fn initial_diagonal(&self) -> i64 {
        self.initial_diagonal
    }
    /// True iff every seed added so far lies on the initial diagonal.
    pub fn perfect_alignment(&self) -> bool {
        self.perfect_alignment
    }
    /// True iff every seed added so far came from a random sample.
    pub fn random_samples_only(&self) -> bool {
        self.random_samples_only
    }
    /// True if [`Self::set_filtered`] marked this chain dominated.
    pub fn filtered(&self) -> bool {
        self.filtered
    }
    /// Marks this chain filtered (or not) without removing it.
    pub fn set_filtered(&mut self, filtered: bool) {
        self.filtered = filtered;
    }
    /// True if this chain has been flagged as needing rescue.
    pub fn need_rescue(&self) -> bool {
        self.need_rescue
    }
    /// Flags this chain as needing (or not needing) rescue.
    pub fn set_need_rescue(&mut self, need_rescue: bool) {
        self.need_rescue = need_rescue;
    }
    /// True if this chain is an "extra" sample chain, exempt from filtering.
    pub fn extra(&self) -> bool {
        self.extra
    }
    /// First (smallest) read base covered by any seed in the chain.
    pub fn first_read_base(&self) -> u32 {
        self.first_read_base
    }
    /// One-past-the-last read base covered by any seed in the chain.
    pub fn last_read_base(&self) -> u32 {
        self.last_read_base
    }
    /// Smallest reference position spanned by the chain.
    pub fn first_ref_base(&self) -> i64 {
        self.first_ref_base
    }
    /// Largest reference position spanned by the chain.
    pub fn last_ref_base(&self) -> i64 {
        self.last_ref_base
    }
    /// Number of distinct read bases covered by the union of seeds.
    pub fn coverage(&self) -> u32 {
        self.coverage
    }
    /// The read span `last_read_base - first_read_base`, used by the
    /// rescue trigger.
    pub fn read_span_length(&self) -> u32 {
        self.last_read_base - self.first_read_base
    }

    fn is_ancient(&self, last_seed_offset: u32, current_read_position: u32) -> bool {
        Self::is_ancient_static(last_seed_offset, current_read_position)
    }

    fn is_ancient_static(last_seed_offset: u32, current_read_position: u32) -> bool {
        last_seed_offset / LARGE_QUANTIZER + AGE_ANCIENT <= current_read_position / LARGE_QUANTIZER
    }

    fn is_old(&self, last_seed_offset: u32, current_read_position: u32) -> bool {
        last_seed_offset / LARGE_QUANTIZER + AGE_OLD <= current_read_position / LARGE_QUANTIZER
    }

    /// Tests whether this chain would accept `candidate` at orientation
    /// `rc`, per the five-step acceptance predicate.
    pub fn accepts(&self, candidate: SeedPosition, rc: bool, read_len: u32) -> bool {
        if self.rc != rc {
            return false;
        }
        if !self.diagonal_table.is_empty()
            && self
                .diagonal_table
                .values()
                .all(|&last_offset| self.is_ancient(last_offset, candidate.read_position()))
        {
            return false;
        }

        let candidate_first = candidate.first_projection(rc);
        let candidate_last = candidate.last_projection(rc, read_len);
        if !rc && candidate_first > candidate_last {
            return false;
        }
        if rc && candidate_first < candidate_last {
            return false;
        }

        let new_diagonal = candidate.diagonal(rc);
        for (&diagonal, &last_offset) in &self.diagonal_table {
            if !self.is_old(last_offset, candidate.read_position())
                && (new_diagonal / SMALL_QUANTIZER - diagonal / SMALL_QUANTIZER).abs() >= MAX_DIAMETER
            {
                return false;
            }
        }

        if let (Some((&min_diag, _)), Some((&max_diag, _))) =
            (self.diagonal_table.iter().next(), self.diagonal_table.iter().next_back())
        {
            let within_min = (new_diagonal / SMALL_QUANTIZER - min_diag / SMALL_QUANTIZER).abs() <= MAX_RADIUS;
            let within_max = (new_diagonal / SMALL_QUANTIZER - max_diag / SMALL_QUANTIZER).abs() <= MAX_RADIUS;
            if !within_min || !within_max {
                return false;
            }
        }

        true
    }

    /// Inserts `candidate` (already accepted by [`Self::accepts`]).
    pub fn insert(&mut self, candidate: SeedPosition, rc: bool, read_len: u32, random_sample: bool) {
        let new_diagonal = candidate.diagonal(rc);
        self.perfect_alignment = self.perfect_alignment && new_diagonal == self.initial_diagonal;
        self.random_samples_only = self.random_samples_only && random_sample;

        let candidate_first = candidate.first_projection(rc);
        let candidate_last = candidate.last_projection(rc, read_len);
        let (lo, hi) = if candidate_first <= candidate_last {
            (candidate_first, candidate_last)
        } else {
            (candidate_last, candidate_first)
        };
        self.first_ref_base = self.first_ref_base.min(lo);
        self.last_ref_base = self.last_ref_base.max(hi);

        let read_start = candidate.read_position();
        let read_end = candidate.read_position() + candidate.primary_length();
        self.first_read_base = self.first_read_base.min(read_start);
        self.last_read_base = self.last_read_base.max(read_end);
        self.add_covered_range(read_start, read_end);

        self.diagonal_table.insert(new_diagonal, candidate.read_position());
        let current_read_position = candidate.read_position();
        self.diagonal_table
            .retain(|_, &mut last_offset| !Self::is_ancient_static(last_offset, current_read_position));

        self.entries.push(SeedChainEntry {
            position: candidate,
            random_sample,
        });
    }

    fn add_covered_range(&mut self, start: u32, end: u32) {
        self.covered_ranges.push((start, end));
        self.covered_ranges.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(self.covered_ranges.len());
        for (start, end) in self.covered_ranges.drain(..) {
            if let Some(last) = merged.last_mut() {
                if start <= last.1 {
                    last.1 = last.1.max(end);
                    continue;
                }
            }
            merged.push((start, end));
        }
        self.coverage = merged.iter().map(|(s, e)| e - s).sum();
        self.covered_ranges = merged;
    }

    /// Clears this chain back to empty so the builder can reuse its
    /// allocation for the next read.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.covered_ranges.clear();
        self.diagonal_table.clear();
        self.rc = false;
        self.initial_diagonal = 0;
        self.perfect_alignment = true;
        self.random_samples_only = true;
        self.filtered = false;
        self.need_rescue = false;
        self.extra = false;
        self.first_read_base = 0;
        self.last_read_base = 0;
        self.first_ref_base = 0;
        self.last_ref_base = 0;
        self.coverage = 0;
    }

    /// Re-initializes a cleared chain with its first seed-position,
    /// reusing backing storage.
    pub fn reinit(&mut self, rc: bool, position: SeedPosition, read_len: u32, random_sample: bool, extra: bool) {
        *self = Self::new(rc, position, read_len, random_sample, extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_is_union_of_seed_spans() {
        let mut chain = SeedChain::new(false, SeedPosition::new(0, 10, 1_000, 0), 50, false, false);
        assert_eq!(chain.coverage(), 10);
        // overlapping second seed extends coverage by 5, not 10.
        let second = SeedPosition::new(5, 10, 1_005, 0);
        assert!(chain.accepts(second, false, 50));
        chain.insert(second, false, 50, false);
        assert_eq!(chain.coverage(), 15);
    }

    #[test]
    fn wrong_orientation_is_rejected() {
        let chain = SeedChain::new(false, SeedPosition::new(0, 10, 1_000, 0), 50, false, false);
        let candidate = SeedPosition::new(5, 10, 1_005, 0);
        assert!(!chain.accepts(candidate, true, 50));
    }

    #[test]
    fn far_diagonal_fails_diameter_test() {
        let chain = SeedChain::new(false, SeedPosition::new(0, 10, 1_000, 0), 50, false, false);
        // diagonal jumps by far more than MAX_DIAMETER * SMALL_QUANTIZER.
        let candidate = SeedPosition::new(20, 10, 5_000, 0);
        assert!(!chain.accepts(candidate, false, 50));
    }

    #[test]
    fn perfect_alignment_tracks_same_diagonal() {
        let mut chain = SeedChain::new(false, SeedPosition::new(0, 10, 1_000, 0), 50, false, false);
        let same_diagonal = SeedPosition::new(10, 10, 1_010, 0);
        assert!(chain.accepts(same_diagonal, false, 50));
        chain.insert(same_diagonal, false, 50, false);
        assert!(chain.perfect_alignment());
    }
}
