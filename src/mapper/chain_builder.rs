//! C6 — accepts seed-positions into same-orientation chains and filters
//! dominated chains once a read has been fully seeded.

use crate::mapper::seed_chain::SeedChain;
use crate::mapper::seed_position::SeedPosition;

/// Default ratio used by [`ChainBuilder::filter_chains`].
pub const DEFAULT_CHAIN_FILTER_RATIO: f64 = 0.3;

/// Accumulates [`SeedChain`]s for one read, reusing its backing vector
/// across reads via a logical `len` kept separate from `Vec::len`, the
/// way `seedChains_`/`seedChainCount_` are split upstream: clearing a
/// builder does not shrink or drop the chains, it only resets how many
/// of them are considered live.
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    chains: Vec<SeedChain>,
    len: usize,
    chain_filter_ratio: f64,
}

impl ChainBuilder {
    /// Creates an empty builder.
    pub fn new(chain_filter_ratio: f64) -> Self {
        Self {
            chains: Vec::new(),
            len: 0,
            chain_filter_ratio,
        }
    }

    /// The live chains.
    pub fn chains(&self) -> &[SeedChain] {
        &self.chains[..self.len]
    }

    /// The live chains, mutably.
    pub fn chains_mut(&mut self) -> &mut [SeedChain] {
        &mut self.chains[..self.len]
    }

    /// Resets the logical length to zero without releasing storage.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Adds a seed-position, inserting it into every chain that accepts
    /// it or opening a new chain if none does.
    pub fn add_seed_position(
        &mut self,
        position: SeedPosition,
        rc: bool,
        read_len: u32,
        random_sample: bool,
        extra: bool,
    ) {
        let mut accepted_any = false;
        for chain in &mut self.chains[..self.len] {
            if chain.accepts(position, rc, read_len) {
                chain.insert(position, rc, read_len, random_sample);
                accepted_any = true;
            }
        }
        if !accepted_any {
            self.push_new_chain(rc, position, read_len, random_sample, extra);
        }
    }

    fn push_new_chain(
        &mut self,
        rc: bool,
        position: SeedPosition,
        read_len: u32,
        random_sample: bool,
        extra: bool,
    ) {
        if self.len < self.chains.len() {
            self.chains[self.len].reinit(rc, position, read_len, random_sample, extra);
        } else {
            self.chains
                .push(SeedChain::new(rc, position, read_len, random_sample, extra));
        }
        self.len += 1;
    }

    /// Marks dominated chains `filtered` without removing any from the
    /// collection.
    pub fn filter_chains(&mut self) {
        let max_coverage = self.chains[..self.len]
            .iter()
            .map(SeedChain::coverage)
            .max()
            .unwrap_or(0);
        let (max_cov_beg, max_cov_end) = self.chains[..self.len]
            .iter()
            .filter(|chain| chain.coverage() == max_coverage)
            .map(|chain| (chain.first_read_base(), chain.last_read_base()))
            .fold((u32::MAX, 0u32), |(beg, end), (b, e)| (beg.min(b), end.max(e)));

        for chain in &mut self.chains[..self.len] {
            if chain.extra() || chain.random_samples_only() {
                continue;
            }
            let quarter_coverage = chain.coverage() / 4;
            let threshold = ((self.chain_filter_ratio * chain.coverage() as f64).floor()) as u32;
            let dominated = max_cov_beg <= chain.first_read_base() + quarter_coverage
                && max_cov_end >= chain.last_read_base().saturating_sub(quarter_coverage)
                && max_coverage >= threshold;
            chain.set_filtered(dominated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_storage_across_clears() {
        let mut builder = ChainBuilder::new(DEFAULT_CHAIN_FILTER_RATIO);
        builder.add_seed_position(SeedPosition::new(0, 10, 1_000, 0), false, 50, false, false);
        assert_eq!(builder.chains().len(), 1);
        let backing_ptr = builder.chains.as_ptr();
        builder.clear();
        assert_eq!(builder.chains().len(), 0);
        builder.add_seed_position(SeedPosition::new(0, 10, 2_000, 0), false, 50, false, false);
        assert_eq!(builder.chains().len(), 1);
        assert_eq!(builder.chains.as_ptr(), backing_ptr, "storage should be reused, not reallocated");
    }

    #[test]
    fn disjoint_positions_open_separate_chains() {
        let mut builder = ChainBuilder::new(DEFAULT_CHAIN_FILTER_RATIO);
        builder.add_seed_position(SeedPosition::new(0, 10, 1_000, 0), false, 50, false, false);
        builder.add_seed_position(SeedPosition::new(0, 10, 50_000, 0), false, 50, false, false);
        assert_eq!(builder.chains().len(), 2);
    }

    #[test]
    fn dominant_chain_survives_filtering() {
        let mut builder = ChainBuilder::new(DEFAULT_CHAIN_FILTER_RATIO);
        builder.add_seed_position(SeedPosition::new(0, 40, 1_000, 0), false, 50, false, false);
        builder.add_seed_position(SeedPosition::new(0, 5, 90_000, 0), false, 50, false, false);
        builder.filter_chains();
        let filtered_flags: Vec<bool> = builder.chains().iter().map(SeedChain::filtered).collect();
        assert!(filtered_flags.contains(&false));
    }
}
