//! C2 — a `(read, offset, length)` view producing 2-bits-per-base
//! packed integers for the primary window or extension wings.

use crate::mapper::error::{MapperError, Result};
use crate::mapper::read::Read;

/// `N` in the 4-bit IUPAC encoding.
const IUPAC_N: u8 = 0xF;
/// Padding ("no base") in the 4-bit IUPAC encoding.
const IUPAC_PAD: u8 = 0x0;

/// Default seed placement period (§6 tunable).
pub const DEFAULT_PERIOD: u32 = 2;
/// Default seed placement pattern (§6 tunable).
pub const DEFAULT_PATTERN: u32 = 0x01;
/// Default number of forced trailing seeds (§6 tunable).
pub const DEFAULT_FORCE_LAST_N: u8 = 1;

/// A fixed-length window into a [`Read`] used as a hash-table lookup
/// key. Holds only the view (offset + length); orientation and
/// extension are controlled by the caller per the type's doc comment
/// in the upstream design.
#[derive(Debug, Clone, Copy)]
pub struct Seed<'a> {
    read: &'a Read,
    read_position: u32,
    primary_length: u32,
}

impl<'a> Seed<'a> {
    /// Checks that the primary window `[read_position, read_position +
    /// primary_length)` contains no `N` and no padding.
    pub fn is_primary_valid(read: &Read, read_position: u32, primary_length: u32) -> bool {
        if read_position as usize + primary_length as usize > read.len() {
            return false;
        }
        (0..primary_length).all(|i| {
            let base = read.base_4bpb(read_position as usize + i as usize);
            base != IUPAC_PAD && base != IUPAC_N
        })
    }

    /// Creates a seed. `primary_length` must be `<= 32` (2 bits/base
    /// must fit in a `u64`).
    pub fn new(read: &'a Read, read_position: u32, primary_length: u32) -> Result<Self> {
        if primary_length == 0 || primary_length > 32 {
            return Err(MapperError::InvalidParameter(
                "seed primary length is limited to 1..=32 bases".to_string(),
            ));
        }
        Ok(Self {
            read,
            read_position,
            primary_length,
        })
    }

    /// The underlying read.
    pub fn read(&self) -> &Read {
        self.read
    }
    /// The read offset of the first base of the primary window.
    pub fn read_position(&self) -> u32 {
        self.read_position
    }
    /// The length in bases of the primary window.
    pub fn primary_length(&self) -> u32 {
        self.primary_length
    }

    /// True if every base required at half-extension `half_extension`
    /// lies within the read.
    pub fn is_valid(&self, half_extension: u32) -> bool {
        half_extension <= self.read_position
            && (self.read_position + self.primary_length + half_extension) as usize <= self.read.len()
    }

    /// First read position covered at the given half-extension.
    pub fn first_base_read_position(&self, half_extension: u32) -> u32 {
        self.read_position - half_extension
    }

    /// Last read position covered at the given half-extension.
    pub fn last_base_read_position(&self, half_extension: u32) -> u32 {
        self.read_position + self.primary_length + half_extension - 1
    }

    /// The 2-bits/base packed primary data, optionally reverse
    /// complemented. Fails with [`MapperError::PreCondition`] if the
    /// primary window is not within the read.
    pub fn get_primary_data(&self, reverse_complement: bool) -> Result<u64> {
        if self.read.len() < self.read_position as usize + self.primary_length as usize {
            return Err(MapperError::PreCondition(
                "requesting primary data for an invalid seed".to_string(),
            ));
        }
        let mut data: u64 = 0;
        for i in 0..self.primary_length {
            let base = self.read.base_2bpb(self.read_position as usize + i as usize) as u64 & 0x3;
            data |= base << (2 * i);
        }
        Ok(if reverse_complement {
            generate_reverse_complement(data, self.primary_length)
        } else {
            data
        })
    }

    /// The 2-bits/base packed extension-wing data for wings
    /// `[r-to, r-from)` and `[r+L+from, r+L+to)`, optionally reverse
    /// complemented.
    pub fn get_extended_data(
        &self,
        from_half_extension: u32,
        to_half_extension: u32,
        reverse_complement: bool,
    ) -> Result<u64> {
        if !self.is_valid(to_half_extension) {
            return Err(MapperError::PreCondition(
                "requesting extended data for an invalid seed extension".to_string(),
            ));
        }
        if from_half_extension > to_half_extension || to_half_extension - from_half_extension > 16 {
            return Err(MapperError::InvalidParameter(
                "requesting extended data with invalid range".to_string(),
            ));
        }
        let wing_length = to_half_extension - from_half_extension;
        let mut data: u64 = 0;
        for i in 0..wing_length {
            let pos = self.read_position - to_half_extension + i;
            let base = self.read.base_2bpb(pos as usize) as u64 & 0x3;
            data |= base << (2 * i);
        }
        for i in 0..wing_length {
            let pos = self.read_position + self.primary_length + from_half_extension + i;
            let base = self.read.base_2bpb(pos as usize) as u64 & 0x3;
            data |= base << (2 * (i + wing_length));
        }
        Ok(if reverse_complement {
            generate_reverse_complement(data, 2 * wing_length)
        } else {
            data
        })
    }
}

/// Bitwise-complements then reverses `base_count` 2-bit groups of
/// `data`, exploiting the fact that bitwise complement of a 2-bit ACGT
/// code already yields the base complement (`A<->T`, `C<->G`).
pub fn generate_reverse_complement(data: u64, base_count: u32) -> u64 {
    let mut complement = !data;
    let mut reversed: u64 = 0;
    for _ in 0..base_count {
        reversed <<= 2;
        reversed |= complement & 0x3;
        complement >>= 2;
    }
    reversed
}

/// A restartable, finite iterator over seed offsets for a read of
/// length `read_length`, per §4.2's selection rule.
#[derive(Debug, Clone)]
pub struct SeedOffsets {
    offset: usize,
    read_length: usize,
    seed_length: usize,
    period: u32,
    pattern: u32,
    force_last_n: u8,
}

impl SeedOffsets {
    /// Creates the offset sequence for a read of `read_length` bases
    /// and seeds of length `seed_length`.
    pub fn new(
        read_length: usize,
        seed_length: usize,
        period: u32,
        pattern: u32,
        force_last_n: u8,
    ) -> Self {
        Self {
            offset: 0,
            read_length,
            seed_length,
            period,
            pattern,
            force_last_n,
        }
    }
}

impl Iterator for SeedOffsets {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.offset + self.seed_length <= self.read_length {
            let offset = self.offset;
            let forced = offset + self.seed_length + self.force_last_n as usize > self.read_length;
            let matches_pattern = (self.pattern >> (offset as u32 % self.period)) & 1 != 0;
            self.offset += 1;
            if matches_pattern || forced {
                return Some(offset);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_read(bases: &[u8]) -> Read {
        let mut read = Read::new();
        read.init(b"r".to_vec(), bases.to_vec(), vec![30; bases.len()], 0, 0);
        read
    }

    #[test]
    fn seed_reversibility_invariant() {
        let data = 0b11_00_10_01u64; // arbitrary 4-base pattern
        let once = generate_reverse_complement(data, 4);
        let twice = generate_reverse_complement(once, 4);
        assert_eq!(twice, data);
    }

    #[test]
    fn primary_data_round_trips_with_rc_flag() {
        let read = make_read(&[1, 2, 4, 8]); // A C G T
        let seed = Seed::new(&read, 0, 4).unwrap();
        let forward = seed.get_primary_data(false).unwrap();
        let rc = seed.get_primary_data(true).unwrap();
        assert_eq!(rc, generate_reverse_complement(forward, 4));
    }

    #[test]
    fn seed_offsets_selection_law() {
        let read_length = 25;
        let seed_length = 10;
        let offsets: Vec<usize> =
            SeedOffsets::new(read_length, seed_length, 2, 0x01, 1).collect();
        let expected: Vec<usize> = (0..=(read_length - seed_length))
            .filter(|o| o % 2 == 0)
            .chain(std::iter::once(read_length - seed_length))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        assert_eq!(offsets, expected);
    }

    #[test]
    fn short_read_yields_no_offsets() {
        let offsets: Vec<usize> = SeedOffsets::new(5, 10, 2, 0x01, 1).collect();
        assert!(offsets.is_empty());
    }

    #[test]
    fn all_n_window_is_invalid() {
        let read = make_read(&[IUPAC_N, IUPAC_N, IUPAC_N, IUPAC_N]);
        assert!(!Seed::is_primary_valid(&read, 0, 4));
    }
}
