//! C5 — iterates a read's seeds, queries the hash table, follows
//! extensions, and feeds the chain builder.

use tracing::{instrument, trace};

use crate::mapper::chain_builder::ChainBuilder;
use crate::mapper::config::MapperConfig;
use crate::mapper::error::Result;
use crate::mapper::hash_record::RecordKind;
use crate::mapper::hasher::CrcHasher;
use crate::mapper::hashtable::{ExtendTableInterval, Hashtable};
use crate::mapper::read::Read;
use crate::mapper::reference::ReferenceSequence;
use crate::mapper::seed::{Seed, SeedOffsets};
use crate::mapper::seed_position::SeedPosition;

/// Bits of `H` left unused by [`Hashtable`]'s address derivation
/// (`virtualByteAddress` only consumes bits `[53:19]`); extension keys
/// reuse this high span to keep related records addressed nearby.
const ADDRESS_SEGMENT_START: u32 = 54;
/// How many low bits of `H` feed the extension-key's `extBin` field.
const EXT_BIN_BITS: u64 = 0x7F;
/// Cap on how many extend-table entries a high-frequency interval samples.
const INTERVAL_SAMPLE_CAP: u64 = 16;

/// Per-read counters accumulated while seeding, used by downstream
/// chain filtering heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedStats {
    /// Number of extensions abandoned because the seed ran off the read.
    pub extension_failures: u32,
    /// Longest primary seed length observed among non-sampled hits.
    pub longest_non_sample_seed: u32,
}

/// Ties the immutable reference/hashtable/hasher stack together for one
/// worker to query against. Cheaply cloneable; every field is itself
/// cheap to share (`Arc`-backed or `Copy`).
#[derive(Debug, Clone)]
pub struct Mapper {
    reference: ReferenceSequence,
    hashtable: Hashtable,
    primary_hasher: CrcHasher,
    secondary_hasher: CrcHasher,
    config: MapperConfig,
}

impl Mapper {
    /// Builds a mapper over an already-loaded reference and hash table.
    pub fn new(
        reference: ReferenceSequence,
        hashtable: Hashtable,
        primary_hasher: CrcHasher,
        secondary_hasher: CrcHasher,
        config: MapperConfig,
    ) -> Self {
        Self {
            reference,
            hashtable,
            primary_hasher,
            secondary_hasher,
            config,
        }
    }

    /// The backing reference view.
    pub fn reference(&self) -> &ReferenceSequence {
        &self.reference
    }

    /// Maps one read's seeds into `chain_builder`, which the caller is
    /// expected to have `clear()`-ed first.
    #[instrument(skip_all, fields(read_id = read.id(), read_len = read.len()))]
    pub fn map_read(&self, read: &Read, chain_builder: &mut ChainBuilder) -> Result<SeedStats> {
        let read_len = read.len() as u32;
        let primary_length = self.config.primary_seed_bases;
        let offsets = SeedOffsets::new(
            read.len(),
            primary_length as usize,
            self.config.seed_period,
            self.config.seed_pattern,
            self.config.force_last_n,
        );

        let mut stats = SeedStats::default();
        let mut hits = Vec::new();
        let mut intervals = Vec::new();
        let mut best_interval: Option<(u32, u64, ExtendTableInterval, bool)> = None;

        for offset in offsets {
            let offset = offset as u32;
            if !Seed::is_primary_valid(read, offset, primary_length) {
                continue;
            }
            let seed = Seed::new(read, offset, primary_length)?;
            let forward = seed.get_primary_data(false)?;
            let reverse = seed.get_primary_data(true)?;
            let (data, rc) = if forward <= reverse {
                (forward, false)
            } else {
                (reverse, true)
            };
            let h = self.primary_hasher.hash(data);
            self.hashtable.get_hits(h, false, &mut hits, &mut intervals)?;
            trace!(offset, rc, hits = hits.len(), intervals = intervals.len(), "primary seed queried");

            let mut saw_direct_hit = false;
            for hit in hits.clone() {
                match hit.decode()? {
                    RecordKind::Hit { ref_pos } => {
                        saw_direct_hit = true;
                        let position = SeedPosition::new(offset, primary_length, ref_pos as u64, 0);
                        chain_builder.add_seed_position(position, rc, read_len, false, false);
                    }
                    RecordKind::Extend {
                        extension_length,
                        extension_id,
                    } => {
                        self.extend_seed(
                            read,
                            &seed,
                            offset,
                            rc,
                            h,
                            extension_length,
                            extension_id,
                            0,
                            read_len,
                            chain_builder,
                            &mut stats,
                        )?;
                    }
                    _ => {}
                }
            }
            if saw_direct_hit {
                stats.longest_non_sample_seed = stats.longest_non_sample_seed.max(primary_length);
            }

            for &interval in &intervals {
                self.emit_interval(interval, offset, rc, read_len, 0, primary_length, false, chain_builder)?;
                let better = match &best_interval {
                    None => true,
                    Some((_, _, best, _)) => interval.length < best.length,
                };
                if better {
                    best_interval = Some((offset, h, interval, rc));
                }
            }
        }

        // "extra" sample chain for the single highest-frequency seed seen,
        // so a repetitive read still gets one representative chain beyond
        // its direct per-offset samples.
        if let Some((offset, _, interval, rc)) = best_interval {
            self.emit_interval(interval, offset, rc, read_len, 0, primary_length, true, chain_builder)?;
        }

        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn extend_seed(
        &self,
        _read: &Read,
        seed: &Seed<'_>,
        offset: u32,
        rc: bool,
        h: u64,
        extension_length: u32,
        extension_id: u32,
        half_extension: u32,
        read_len: u32,
        chain_builder: &mut ChainBuilder,
        stats: &mut SeedStats,
    ) -> Result<()> {
        let new_half_extension = half_extension + extension_length / 2;
        if !seed.is_valid(new_half_extension) {
            stats.extension_failures += 1;
            return Ok(());
        }
        let wing_data = seed.get_extended_data(half_extension, new_half_extension, rc)?;
        let wing_bits = wing_data & 0xFFF;
        let ext_bin = h & EXT_BIN_BITS;
        let extension_key = (ext_bin << 42) | ((extension_id as u64 & 0x3_FFFF) << 24) | wing_bits;
        let secondary_h = self.secondary_hasher.hash(extension_key);
        let address_mask = !((1u64 << ADDRESS_SEGMENT_START) - 1);
        let extended_h = secondary_h | (h & address_mask);

        let mut hits = Vec::new();
        let mut intervals = Vec::new();
        self.hashtable.get_hits(extended_h, true, &mut hits, &mut intervals)?;

        for hit in hits {
            match hit.decode()? {
                RecordKind::Hit { ref_pos } => {
                    let position = SeedPosition::new(offset, seed.primary_length(), ref_pos as u64, new_half_extension);
                    chain_builder.add_seed_position(position, rc, read_len, false, false);
                }
                RecordKind::Extend {
                    extension_length: next_len,
                    extension_id: next_id,
                } => {
                    self.extend_seed(
                        _read,
                        seed,
                        offset,
                        rc,
                        extended_h,
                        next_len,
                        next_id,
                        new_half_extension,
                        read_len,
                        chain_builder,
                        stats,
                    )?;
                }
                _ => {}
            }
        }
        for &interval in &intervals {
            self.emit_interval(
                interval,
                offset,
                rc,
                read_len,
                new_half_extension,
                seed.primary_length(),
                false,
                chain_builder,
            )?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_interval(
        &self,
        interval: ExtendTableInterval,
        offset: u32,
        rc: bool,
        read_len: u32,
        half_extension: u32,
        primary_length: u32,
        extra: bool,
        chain_builder: &mut ChainBuilder,
    ) -> Result<()> {
        let indices: Vec<u64> = if interval.length <= INTERVAL_SAMPLE_CAP {
            (interval.start..interval.start + interval.length).collect()
        } else {
            (0..INTERVAL_SAMPLE_CAP)
                .map(|i| interval.start + (i * interval.length) / INTERVAL_SAMPLE_CAP)
                .collect()
        };
        for index in indices {
            let singleton = ExtendTableInterval {
                start: index,
                length: 1,
                extra_liftovers: 0,
            };
            let records = self.hashtable.read_extend_table(singleton)?;
            let record = records[0];
            let position = SeedPosition::new(offset, primary_length, record.position as u64, half_extension);
            chain_builder.add_seed_position(position, rc ^ record.rc, read_len, true, extra);
        }
        Ok(())
    }
}
