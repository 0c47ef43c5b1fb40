//! CIGAR run-length accumulation, consumed by the illustrative SAM
//! writer ([`crate::mapper::sam`]).

use std::fmt;

/// One CIGAR operation kind, in SAM's canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOpKind {
    /// `M`
    Match,
    /// `I`
    Insertion,
    /// `D`
    Deletion,
    /// `N`
    RefSkip,
    /// `S`
    SoftClip,
    /// `H`
    HardClip,
    /// `P`
    Pad,
    /// `=`
    SeqMatch,
    /// `X`
    Mismatch,
}

impl CigarOpKind {
    fn as_char(self) -> char {
        match self {
            CigarOpKind::Match => 'M',
            CigarOpKind::Insertion => 'I',
            CigarOpKind::Deletion => 'D',
            CigarOpKind::RefSkip => 'N',
            CigarOpKind::SoftClip => 'S',
            CigarOpKind::HardClip => 'H',
            CigarOpKind::Pad => 'P',
            CigarOpKind::SeqMatch => '=',
            CigarOpKind::Mismatch => 'X',
        }
    }
}

/// A single `(operation, length)` CIGAR run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    /// The operation kind.
    pub kind: CigarOpKind,
    /// Number of bases the run covers.
    pub len: u32,
}

/// The maximum run length a single [`CigarOp`] can hold before a new
/// run is started; kept far below `u32::MAX` so that callers wanting a
/// stricter cap (e.g. the 12-bit-count encoding used by some SAM
/// writers) can configure it with [`CigarBuilder::with_max_run_len`].
pub const DEFAULT_MAX_RUN_LEN: u32 = 0xFFF;

/// Accumulates CIGAR operations one base (or one run) at a time and
/// consolidates adjacent equal operations on request.
///
/// Mirrors the incremental `Add*` + `ConsolidateRecords` + `Reverse`
/// shape of the original `CigarBuilder`, but records are kept
/// unconsolidated (one unit per `add_*` call) until [`Self::consolidate`]
/// runs, so saturation semantics in the literal test scenarios are
/// exact: each call adds exactly one base to the *current* run, and a
/// run saturates (splits) only once it would exceed `max_run_len`.
#[derive(Debug, Clone)]
pub struct CigarBuilder {
    ops: Vec<CigarOp>,
    max_run_len: u32,
    read_start: i32,
    read_end: i32,
    ref_start: i64,
    ref_end: i64,
}

impl CigarBuilder {
    /// Creates an empty builder with the default saturation length.
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            max_run_len: DEFAULT_MAX_RUN_LEN,
            read_start: 0,
            read_end: 0,
            ref_start: 0,
            ref_end: 0,
        }
    }

    /// Creates an empty builder with an explicit per-run saturation cap.
    pub fn with_max_run_len(max_run_len: u32) -> Self {
        Self {
            max_run_len,
            ..Self::new()
        }
    }

    fn push_base(&mut self, kind: CigarOpKind) {
        if let Some(last) = self.ops.last_mut() {
            if last.kind == kind && last.len < self.max_run_len {
                last.len += 1;
                return;
            }
        }
        self.ops.push(CigarOp { kind, len: 1 });
    }

    /// Adds one matched base.
    pub fn add_match(&mut self) {
        self.push_base(CigarOpKind::Match);
    }
    /// Adds one inserted base.
    pub fn add_insertion(&mut self) {
        self.push_base(CigarOpKind::Insertion);
    }
    /// Adds one deleted (reference-only) base.
    pub fn add_deletion(&mut self) {
        self.push_base(CigarOpKind::Deletion);
    }
    /// Adds one soft-clipped base.
    pub fn add_soft_clip(&mut self) {
        self.push_base(CigarOpKind::SoftClip);
    }
    /// Adds one hard-clipped base.
    pub fn add_hard_clip(&mut self) {
        self.push_base(CigarOpKind::HardClip);
    }

    /// Reverses the order of the recorded runs in place.
    pub fn reverse(&mut self) {
        self.ops.reverse();
    }

    /// Merges adjacent runs of the same operation into one, saturating
    /// each merged run at `max_run_len` (splitting into multiple runs
    /// rather than overflowing).
    pub fn consolidate(&mut self) {
        let mut merged: Vec<CigarOp> = Vec::with_capacity(self.ops.len());
        for op in self.ops.drain(..) {
            let mut remaining = op.len;
            if let Some(last) = merged.last_mut() {
                if last.kind == op.kind {
                    let room = self.max_run_len - last.len;
                    let take = room.min(remaining);
                    last.len += take;
                    remaining -= take;
                }
            }
            while remaining > 0 {
                let take = remaining.min(self.max_run_len);
                merged.push(CigarOp {
                    kind: op.kind,
                    len: take,
                });
                remaining -= take;
            }
        }
        self.ops = merged;
    }

    /// The consolidated records. Call [`Self::consolidate`] first if a
    /// canonical (merged) form is required.
    pub fn records(&self) -> &[CigarOp] {
        &self.ops
    }

    /// Sets the 0-based read-coordinate start of the alignment.
    pub fn set_read_start(&mut self, read_start: i32) {
        self.read_start = read_start;
    }
    /// Returns the read-coordinate start.
    pub fn read_start(&self) -> i32 {
        self.read_start
    }
    /// Sets the 0-based read-coordinate end of the alignment.
    pub fn set_read_end(&mut self, read_end: i32) {
        self.read_end = read_end;
    }
    /// Returns the read-coordinate end.
    pub fn read_end(&self) -> i32 {
        self.read_end
    }
    /// Sets the 0-based reference-coordinate start of the alignment.
    pub fn set_ref_start(&mut self, ref_start: i64) {
        self.ref_start = ref_start;
    }
    /// Returns the reference-coordinate start.
    pub fn ref_start(&self) -> i64 {
        self.ref_start
    }
    /// Sets the 0-based reference-coordinate end of the alignment.
    pub fn set_ref_end(&mut self, ref_end: i64) {
        self.ref_end = ref_end;
    }
    /// Returns the reference-coordinate end.
    pub fn ref_end(&self) -> i64 {
        self.ref_end
    }
}

impl Default for CigarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CigarBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            write!(f, "{}{}", op.len, op.kind.as_char())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_n(builder: &mut CigarBuilder, add: impl Fn(&mut CigarBuilder), n: u32) {
        for _ in 0..n {
            add(builder);
        }
    }

    #[test]
    fn cigar_build_scenario() {
        let mut builder = CigarBuilder::new();
        build_n(&mut builder, CigarBuilder::add_match, 5);
        build_n(&mut builder, CigarBuilder::add_insertion, 15);
        build_n(&mut builder, CigarBuilder::add_deletion, 25);
        build_n(&mut builder, CigarBuilder::add_soft_clip, 35);
        builder.consolidate();
        assert_eq!(builder.to_string(), "5M15I25D35S");
    }

    #[test]
    fn cigar_reverse_scenario() {
        let mut builder = CigarBuilder::new();
        build_n(&mut builder, CigarBuilder::add_match, 5);
        build_n(&mut builder, CigarBuilder::add_insertion, 15);
        build_n(&mut builder, CigarBuilder::add_deletion, 25);
        build_n(&mut builder, CigarBuilder::add_soft_clip, 35);
        builder.reverse();
        builder.consolidate();
        assert_eq!(builder.to_string(), "35S25D15I5M");
    }

    #[test]
    fn cigar_saturation_scenario() {
        let mut builder = CigarBuilder::with_max_run_len(0xFFF);
        build_n(&mut builder, CigarBuilder::add_soft_clip, 130);
        build_n(&mut builder, CigarBuilder::add_insertion, 130);
        build_n(&mut builder, CigarBuilder::add_match, 130);
        build_n(&mut builder, CigarBuilder::add_deletion, 130);
        build_n(&mut builder, CigarBuilder::add_soft_clip, 130);
        builder.consolidate();
        assert_eq!(builder.to_string(), "130S130I130M130D130S");
    }

    #[test]
    fn saturation_splits_long_runs() {
        let mut builder = CigarBuilder::with_max_run_len(4);
        build_n(&mut builder, CigarBuilder::add_match, 10);
        builder.consolidate();
        assert_eq!(builder.to_string(), "4M4M2M");
    }
}
