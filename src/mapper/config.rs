//! The tunable configuration table (§6 of the component spec).

use crate::mapper::error::{MapperError, Result};

/// Expected paired-end orientation, used both for pair scoring and to
/// steer alignment rescue.
///
/// Only [`Orientation::Fr`] and [`Orientation::Rf`] are currently
/// supported by [`crate::mapper::rescue::AlignmentRescue`]; `Ff`/`Rr`
/// are accepted here (they are legitimate sequencing layouts) but
/// rejected at rescue-construction time, per the open-question
/// resolution in SPEC_FULL.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Forward/reverse: mate 1 forward, mate 2 reverse (the common case).
    Fr,
    /// Reverse/forward.
    Rf,
    /// Forward/forward.
    Ff,
    /// Reverse/reverse.
    Rr,
}

/// Insert-size window and orientation shared by pairing and rescue.
#[derive(Debug, Clone, Copy)]
pub struct InsertSizeParameters {
    /// Minimum accepted insert size for a proper pair / rescue window.
    pub pe_min_insert: u32,
    /// Maximum accepted insert size for a proper pair / rescue window.
    pub pe_max_insert: u32,
    /// Mean insert size used for the pair-penalty lookup.
    pub pe_mean_insert: u32,
    /// Expected orientation of a proper pair.
    pub pe_orientation: Orientation,
}

/// The full tunable configuration table for the mapper core.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Insert-size window and orientation.
    pub insert_size: InsertSizeParameters,

    /// Minimum anchor span (read-covered bases) that triggers rescue
    /// when no other chain in the pair matched.
    pub resc_nopair_len: u32,
    /// Minimum anchor span that triggers rescue when at least one
    /// other chain already paired correctly.
    pub resc_ifpair_len: u32,

    /// Domination ratio threshold in [`crate::mapper::chain_builder::ChainBuilder::filter_chains`].
    pub chain_filter_ratio: f64,
    /// Additive domination constant (diagnostic knob; current
    /// algorithm body does not use it, kept for parity with the
    /// original's unused `chainFilterConstant_`).
    pub chain_filter_constant: u32,

    /// Score penalty applied to an improper pair.
    pub unpaired_penalty: u32,
    /// MAPQ penalty applied when a cross-strand suboptimal pair exists.
    pub xs_pair_penalty: i32,
    /// Phred cost of a single mismatch, used throughout MAPQ scaling.
    pub snp_cost: u32,
    /// Minimum read length used in MAPQ scaling (short reads are
    /// clamped up to this length).
    pub mapq_min_len: u32,
    /// Minimum score floor used when selecting the second-best.
    pub min_score: i32,

    /// `0`: never force MAPQ 0. `1`: force MAPQ 0 when the best pair
    /// has only random samples. `2`: also force it when the best pair
    /// is flagged `extra`.
    pub sample_mapq0: u8,

    /// Primary seed length in bases (`L` in §3, ≤ 32).
    pub primary_seed_bases: u32,
    /// Seed placement period.
    pub seed_period: u32,
    /// Seed placement bit pattern, tested modulo `seed_period`.
    pub seed_pattern: u32,
    /// Number of trailing bases for which a seed is forced regardless
    /// of `seed_pattern`.
    pub force_last_n: u8,

    /// Number of worker threads; `None` means
    /// `std::thread::available_parallelism()`.
    pub worker_threads: Option<usize>,
    /// Default `RUST_LOG`-style filter used when the environment does
    /// not set one.
    pub log_filter: String,
}

impl MapperConfig {
    /// Validates cross-field invariants not expressible in the type
    /// system (e.g. `pe_min_insert <= pe_max_insert`).
    pub fn validate(&self) -> Result<()> {
        if self.insert_size.pe_min_insert > self.insert_size.pe_max_insert {
            return Err(MapperError::InvalidParameter(format!(
                "pe_min_insert ({}) must not exceed pe_max_insert ({})",
                self.insert_size.pe_min_insert, self.insert_size.pe_max_insert
            )));
        }
        if self.primary_seed_bases == 0 || self.primary_seed_bases > 32 {
            return Err(MapperError::InvalidParameter(format!(
                "primary_seed_bases must be in 1..=32, got {}",
                self.primary_seed_bases
            )));
        }
        if self.seed_period == 0 {
            return Err(MapperError::InvalidParameter(
                "seed_period must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MapperConfig {
    /// The DRAGMAP-typical defaults referenced throughout §4 and §8.
    fn default() -> Self {
        Self {
            insert_size: InsertSizeParameters {
                pe_min_insert: 41,
                pe_max_insert: 596,
                pe_mean_insert: 318,
                pe_orientation: Orientation::Fr,
            },
            resc_nopair_len: 0,
            resc_ifpair_len: 48,
            chain_filter_ratio: 0.3,
            chain_filter_constant: 0,
            unpaired_penalty: 60,
            xs_pair_penalty: 0,
            snp_cost: 6,
            mapq_min_len: 50,
            min_score: 0,
            sample_mapq0: 1,
            primary_seed_bases: 21,
            seed_period: 2,
            seed_pattern: 0x01,
            force_last_n: 1,
            worker_threads: None,
            log_filter: "info".to_string(),
        }
    }
}
