//! The mapper core: a DRAGMAP-style seed-and-extend short-read mapper
//! over a prebuilt reference + hash-table image.
//!
//! Submodules follow the numbered components of the design: `reference`
//! (C1) and `seed` (C2) build the bit-packed inputs; `hasher` (C3) and
//! `hash_record`/`hashtable` (C4) implement the CRC-addressed hash
//! table; `mapper` (C5) drives seed lookup; `seed_position`/
//! `seed_chain`/`chain_builder` (C6) assemble chains; `rescue` (C7)
//! recovers an unanchored mate; `pairing` (C8) picks the best pair and
//! scores MAPQ. `fastq`/`sam` are the ambient I/O boundary.

mod bits;
pub mod chain_builder;
pub mod cigar;
pub mod config;
pub mod error;
pub mod fastq;
pub mod hash_record;
pub mod hasher;
pub mod hashtable;
pub mod mapper;
pub mod pairing;
pub mod read;
pub mod reference;
pub mod rescue;
pub mod sam;
pub mod seed;
pub mod seed_chain;
pub mod seed_position;

pub use chain_builder::ChainBuilder;
pub use cigar::{CigarBuilder, CigarOp, CigarOpKind};
pub use config::{InsertSizeParameters, MapperConfig, Orientation};
pub use error::{MapperError, Result};
pub use hash_record::{HashRecord, RecordKind};
pub use hasher::CrcHasher;
pub use hashtable::{ExtendTableInterval, ExtendTableRecord, Hashtable, HashtableHeader, SequenceDescriptor};
pub use mapper::{Mapper, SeedStats};
pub use pairing::{Alignment, MapqInputs};
pub use read::Read;
pub use reference::ReferenceSequence;
pub use rescue::AlignmentRescue;
pub use seed::{Seed, SeedOffsets};
pub use seed_chain::SeedChain;
pub use seed_position::SeedPosition;
