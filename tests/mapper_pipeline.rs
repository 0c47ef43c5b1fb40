//! End-to-end exercise of the seeding pipeline: a hand-built
//! single-bucket hash table holding one `HIT` record, queried by
//! [`Mapper::map_read`] for a read whose only seed is that hit.
//!
//! The hash table's addressing (`virtualByteAddress`/`bucketIndex`/
//! `threadId`) is private to its module, so this builds the hash
//! record in a way that sidesteps needing it: an 8-bit-wide CRC always
//! produces `h < 256`, which forces `h >> 19 == 0` and therefore
//! `virtual_byte_address(h) == 0` regardless of the table's squeeze
//! factor — bucket 0, thread 0 every time.

use std::sync::Arc;

use rosalind::mapper::chain_builder::ChainBuilder;
use rosalind::mapper::config::MapperConfig;
use rosalind::mapper::hash_record::HashRecord;
use rosalind::mapper::hasher::CrcHasher;
use rosalind::mapper::hashtable::{Hashtable, HashtableHeader, SequenceDescriptor};
use rosalind::mapper::mapper::Mapper;
use rosalind::mapper::read::Read;
use rosalind::mapper::reference::ReferenceSequence;

fn single_bucket_hashtable(record: HashRecord) -> Hashtable {
    let mut bucket = [0u8; 64];
    bucket[0..8].copy_from_slice(&record.0.to_le_bytes());

    let header = HashtableHeader {
        version: 8,
        primary_crc_bits: 8,
        primary_crc_poly: 0x07,
        secondary_crc_bits: 8,
        secondary_crc_poly: 0x1D,
        primary_seed_bases: 4,
        table_size_64ths: 64,
        hashtable_bytes: 64,
        extend_table_bytes: 0,
        min_frequency_to_extend: 100,
        max_seed_frequency: 1000,
        sequences: vec![SequenceDescriptor {
            name: "chr1".to_string(),
            seq_start: 0,
            beg_trim: 0,
            end_trim: 0,
            seq_len: 2000,
        }],
    };

    Hashtable::new(header, Arc::from(bucket.to_vec().into_boxed_slice()), Arc::from(Vec::new().into_boxed_slice()))
        .expect("header sizes match the buckets/extend-table byte lengths above")
}

fn mapper_config() -> MapperConfig {
    let mut config = MapperConfig::default();
    config.primary_seed_bases = 4;
    config.seed_period = 1;
    config.seed_pattern = 0x01;
    config.force_last_n = 0;
    config
}

#[test]
fn map_read_finds_a_hand_placed_hit() {
    let primary_hasher = CrcHasher::new(8, 0x07).unwrap();
    let secondary_hasher = CrcHasher::new(8, 0x1D).unwrap();

    // "ACGT" packed 2-bits/base is its own reverse complement, so the
    // primary seed's canonical orientation is always forward (`rc =
    // false`): forward data never exceeds itself.
    let forward_data: u64 = 0b11_10_01_00; // T G C A, low base first: A=00,C=01,G=10,T=11
    let h = primary_hasher.hash(forward_data);
    assert!(h < 256, "an 8-bit CRC must stay within a single byte");

    let record = HashRecord::hit(0, h as u32, false, true, false, 1_000);
    let hashtable = single_bucket_hashtable(record);
    let reference = ReferenceSequence::new(Arc::from(Vec::new().into_boxed_slice()), Vec::new());
    let config = mapper_config();

    let mapper = Mapper::new(reference, hashtable, primary_hasher, secondary_hasher, config.clone());

    let mut read = Read::new();
    read.init(b"r1".to_vec(), vec![1, 2, 4, 8], vec![30, 30, 30, 30], 0, 0);

    let mut chains = ChainBuilder::new(config.chain_filter_ratio);
    mapper.map_read(&read, &mut chains).unwrap();

    assert_eq!(chains.chains().len(), 1);
    let chain = &chains.chains()[0];
    assert!(!chain.rc());
    assert_eq!(chain.first_ref_base(), 1_000);
    assert_eq!(chain.last_ref_base(), 1_003);
}

#[test]
fn map_read_on_an_empty_table_yields_no_chains() {
    let primary_hasher = CrcHasher::new(8, 0x07).unwrap();
    let secondary_hasher = CrcHasher::new(8, 0x1D).unwrap();
    let hashtable = single_bucket_hashtable(HashRecord::default());
    let reference = ReferenceSequence::new(Arc::from(Vec::new().into_boxed_slice()), Vec::new());
    let config = mapper_config();
    let mapper = Mapper::new(reference, hashtable, primary_hasher, secondary_hasher, config.clone());

    let mut read = Read::new();
    read.init(b"r2".to_vec(), vec![1, 2, 4, 8], vec![30, 30, 30, 30], 1, 0);

    let mut chains = ChainBuilder::new(config.chain_filter_ratio);
    mapper.map_read(&read, &mut chains).unwrap();

    assert!(chains.chains().is_empty());
}
