//! C8 — pairs the best chain/alignment from each mate, scores
//! proper-pair orientation and insert size, and computes MAPQ from the
//! gap to the second-best candidate.

use crate::mapper::config::{MapperConfig, Orientation};

/// Size of the fixed pair-penalty lookup table.
const PETAB_SIZE: usize = 512;
/// Bases of 5' overhang past the chosen insert endpoint a mate may
/// carry before a pair is rejected as a nested-mate artifact.
const NESTED_MATE_GUARD: i64 = 6;

/// One mate's chosen placement, as produced by an external base-level
/// aligner from a [`crate::mapper::seed_chain::SeedChain`]. Only the
/// fields pairing/MAPQ need are carried here.
#[derive(Debug, Clone, Copy)]
pub struct Alignment {
    /// Leftmost reference base covered, including soft clips.
    pub ref_start: i64,
    /// One-past the rightmost reference base covered, including soft clips.
    pub ref_end: i64,
    /// Reverse-complement flag.
    pub rc: bool,
    /// Alignment score (higher is better).
    pub score: i32,
    /// True if this placement came from an "extra" sample chain.
    pub extra: bool,
    /// True if every seed backing this placement was a random sample.
    pub random_samples_only: bool,
}

/// `petab[i]`: saturating phred-scale pair-penalty lookup, indexed by
/// `(insertDiff * sigmaFactor) >> 12`. Monotone non-decreasing and
/// saturating at `0xFF`, matching the moment-generating shape of a
/// normal-tail probability table without claiming bit-exact parity
/// with the original's precomputed constants.
fn petab(index: usize) -> u8 {
    let index = index.min(PETAB_SIZE - 1) as f64;
    ((index.sqrt() * 18.0).min(255.0)) as u8
}

/// Monotone scale factor translating a mismatch cost into alignment
/// score units for a read of length `read_len`.
fn mapq2aln(snp_cost: u32, read_len: u32) -> u32 {
    snp_cost.max(1) * read_len.max(1)
}

/// Scores an insert-size deviation against `mean`/`sigma_factor` into
/// a pair penalty, or `unpaired_penalty` if `proper` is false.
fn pair_penalty(insert_len: i64, mean: u32, sigma_factor: u32, config: &MapperConfig, proper: bool) -> u32 {
    if !proper {
        return config.unpaired_penalty;
    }
    let insert_diff = (insert_len - mean as i64).unsigned_abs();
    let index = ((insert_diff * sigma_factor as u64) >> 12) as usize;
    petab(index) as u32
}

/// Orientation-and-insert proper-pair predicate, with the nested-mate
/// 5'-overhang guard.
pub fn is_proper_pair(a: &Alignment, b: &Alignment, config: &MapperConfig) -> bool {
    let same_strand_expected = matches!(config.insert_size.pe_orientation, Orientation::Ff | Orientation::Rr);
    if same_strand_expected != (a.rc == b.rc) {
        return false;
    }
    let insert_len = (a.ref_end.max(b.ref_end) - a.ref_start.min(b.ref_start)).unsigned_abs();
    if (insert_len as u32) < config.insert_size.pe_min_insert || (insert_len as u32) > config.insert_size.pe_max_insert {
        return false;
    }
    let endpoint = a.ref_start.min(b.ref_start);
    let far_endpoint = a.ref_end.max(b.ref_end);
    for mate in [a, b] {
        let five_prime = if mate.rc { mate.ref_end } else { mate.ref_start };
        let overhang = if mate.rc {
            five_prime - far_endpoint
        } else {
            endpoint - five_prime
        };
        if overhang > NESTED_MATE_GUARD {
            return false;
        }
    }
    true
}

/// Combined pair score: `a.score + b.score - pairPenalty`.
pub fn pair_score(a: &Alignment, b: &Alignment, config: &MapperConfig) -> i32 {
    let proper = is_proper_pair(a, b, config);
    let insert_len = (a.ref_end.max(b.ref_end) - a.ref_start.min(b.ref_start)) as i64;
    let sigma_factor = 4096u32; // one "sigma" maps to one table slot shift
    let m2a_penalty = pair_penalty(insert_len, config.insert_size.pe_mean_insert, sigma_factor, config, proper);
    let read_len = (a.ref_end - a.ref_start).max(b.ref_end - b.ref_start).max(1) as u32;
    let m2a_scale = mapq2aln(config.snp_cost, config.mapq_min_len.max(read_len));
    let penalty = ((m2a_scale as u64 * m2a_penalty as u64) >> 10) as i32;
    a.score + b.score - penalty
}

/// `computeMapq`: phred-scaled confidence from the gap between the
/// best and second-best score, for a read of effective length
/// `max(mapqMinLen, readLen)`.
fn compute_mapq(snp_cost: u32, best_score: i32, second_best_score: i32, read_len: u32) -> u32 {
    let scale = mapq2aln(snp_cost, read_len);
    let gap = (best_score - second_best_score).max(0) as i64;
    let raw = (gap * scale as i64) >> 10;
    raw.clamp(0, 60) as u32
}

/// Inputs to per-mate MAPQ, gathered by the caller from the candidate
/// pool of proper pairs and single-end placements.
#[derive(Debug, Clone, Copy)]
pub struct MapqInputs {
    /// The chosen pair/alignment's combined score.
    pub best_score: i32,
    /// Highest-scoring alternative that doesn't share an alignment
    /// identity with the chosen placement.
    pub second_best_score: i32,
    /// Count of alternatives within one SNP cost of `second_best_score`.
    pub sub_count: u32,
    /// Score gap to the best cross-strand suboptimal alignment, if any.
    pub xs_score_diff: Option<i32>,
    /// True if the chosen placement's seeds were all random samples.
    pub random_samples_only: bool,
    /// True if the chosen placement came from an "extra" sample chain.
    pub extra: bool,
}

/// Computes MAPQ for one mate of the chosen pair.
pub fn compute_mate_mapq(inputs: &MapqInputs, config: &MapperConfig, read_len: u32) -> u32 {
    let effective_len = config.mapq_min_len.max(read_len);
    let second = config.min_score.max(inputs.second_best_score);
    let mapq_prod_pen = compute_mapq(config.snp_cost, inputs.best_score, second, effective_len);
    let sub_penalty = if inputs.sub_count > 1 {
        ((3 * (31 - inputs.sub_count.leading_zeros())) >> 7) as i64
    } else {
        0
    };
    let mut mapq = (mapq_prod_pen as i64 - sub_penalty).max(0) as u32;

    if let Some(xs_diff) = inputs.xs_score_diff {
        let a2m_scale = mapq2aln(config.snp_cost, effective_len);
        let xs_heur_mapq = (((xs_diff as i64 * a2m_scale as i64) >> 13) + config.xs_pair_penalty as i64).max(0) as u32;
        mapq = mapq.min(xs_heur_mapq);
    }

    let force_zero = match config.sample_mapq0 {
        1 => inputs.random_samples_only,
        2 => inputs.random_samples_only || inputs.extra,
        _ => false,
    };
    if force_zero {
        0
    } else {
        mapq.min(60)
    }
}

/// Signed template length: distance between the leftmost and
/// rightmost bases across the pair, signed to the alignment whose
/// midpoint is smaller (ties favor the forward mate under FR).
pub fn tlen(a: &Alignment, b: &Alignment) -> i64 {
    let leftmost = a.ref_start.min(b.ref_start);
    let rightmost = a.ref_end.max(b.ref_end);
    let span = rightmost - leftmost;
    let a_mid = a.ref_start + a.ref_end;
    let b_mid = b.ref_start + b.ref_end;
    let a_is_left = a_mid < b_mid || (a_mid == b_mid && !a.rc);
    if a_is_left {
        span
    } else {
        -span
    }
}
