use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rosalind::mapper::cigar::CigarBuilder;
use rosalind::mapper::config::MapperConfig;
use rosalind::mapper::fastq;
use rosalind::mapper::hasher::CrcHasher;
use rosalind::mapper::hashtable::Hashtable;
use rosalind::mapper::pairing::{self, Alignment, MapqInputs};
use rosalind::mapper::read::Read;
use rosalind::mapper::reference::ReferenceSequence;
use rosalind::mapper::rescue::AlignmentRescue;
use rosalind::mapper::sam::{self, SamRecord};
use rosalind::mapper::{ChainBuilder, Mapper, SeedChain};

#[derive(Parser, Debug)]
#[command(name = "rosalind", about = "Seed-and-extend short-read mapper over a prebuilt hash-table image")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Maps a paired-end FASTQ dataset against a reference + hash-table
    /// image directory (expects `header.bin`, `hash_table.bin`,
    /// `extend_table.bin`, `reference.bin`).
    Map {
        /// Directory holding the hash-table and reference binaries.
        hashtable_dir: PathBuf,
        /// First-mate FASTQ file.
        mate1: PathBuf,
        /// Second-mate FASTQ file.
        mate2: PathBuf,
        /// Output SAM path; defaults to stdout if omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(config: &MapperConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = MapperConfig::default();
    config.validate().context("invalid mapper configuration")?;
    init_tracing(&config);

    match cli.command {
        Commands::Map {
            hashtable_dir,
            mate1,
            mate2,
            output,
        } => run_map(hashtable_dir, mate1, mate2, output, config)?,
    }

    Ok(())
}

fn run_map(hashtable_dir: PathBuf, mate1_path: PathBuf, mate2_path: PathBuf, output: Option<PathBuf>, config: MapperConfig) -> Result<()> {
    let hashtable = Hashtable::load(&hashtable_dir).context("failed to load hash-table image")?;
    let reference = ReferenceSequence::load(&hashtable_dir.join("reference.bin"), &hashtable.header().sequences)
        .context("failed to load reference image")?;

    let header = hashtable.header();
    let primary_hasher = CrcHasher::new(header.primary_crc_bits, header.primary_crc_poly)
        .context("failed to build primary CRC hasher")?;
    let secondary_hasher = CrcHasher::new(header.secondary_crc_bits, header.secondary_crc_poly)
        .context("failed to build secondary CRC hasher")?;
    let mapper = Mapper::new(reference, hashtable, primary_hasher, secondary_hasher, config.clone());
    let rescue = AlignmentRescue::new(config.insert_size, config.resc_nopair_len, config.resc_ifpair_len)
        .context("failed to build alignment rescue scanner")?;

    let mut mate1_reader = BufReader::new(File::open(&mate1_path).with_context(|| format!("opening {}", mate1_path.display()))?);
    let mut mate2_reader = BufReader::new(File::open(&mate2_path).with_context(|| format!("opening {}", mate2_path.display()))?);

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(&path).with_context(|| format!("creating {}", path.display()))?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    let mut read1 = Read::new();
    let mut read2 = Read::new();
    let mut chains1 = ChainBuilder::new(config.chain_filter_ratio);
    let mut chains2 = ChainBuilder::new(config.chain_filter_ratio);
    let mut record_id = 0u64;

    loop {
        let rec1 = fastq::read_record(&mut mate1_reader).context("reading mate1 FASTQ")?;
        let rec2 = fastq::read_record(&mut mate2_reader).context("reading mate2 FASTQ")?;
        let (rec1, rec2) = match (rec1, rec2) {
            (Some(a), Some(b)) => (a, b),
            (None, None) => break,
            _ => anyhow::bail!("mate FASTQ files have differing record counts"),
        };

        read1.init(rec1.name.clone(), rec1.bases, rec1.qualities, record_id, 0);
        read2.init(rec2.name, rec2.bases, rec2.qualities, record_id, 1);
        record_id += 1;

        chains1.clear();
        chains2.clear();
        mapper.map_read(&read1, &mut chains1)?;
        mapper.map_read(&read2, &mut chains2)?;
        chains1.filter_chains();
        chains2.filter_chains();

        let best1 = best_chain(&chains1);
        let mut best2 = best_chain(&chains2);

        if best2.is_none() {
            if let Some(anchor) = best1 {
                if rescue.triggered_by(anchor, false) {
                    if let Some(rescued) = rescue.scan(anchor, read1.len() as u32, &read2, mapper.reference())? {
                        chains2.clear();
                        chains2.add_seed_position(rescued.entries()[0].position, rescued.rc(), read2.len() as u32, false, rescued.extra());
                    }
                }
            }
            best2 = best_chain(&chains2);
        }

        write_pair(&mut out, &read1, &read2, best1, best2, &config)?;
    }

    out.flush()?;
    Ok(())
}

/// Picks the highest-coverage, non-filtered chain, preferring an exact
/// (non-sample) chain over a random-sample-only one at equal coverage.
fn best_chain(builder: &ChainBuilder) -> Option<&SeedChain> {
    builder
        .chains()
        .iter()
        .filter(|chain| !chain.filtered())
        .max_by_key(|chain| (chain.coverage(), !chain.random_samples_only()))
}

fn chain_to_alignment(chain: &SeedChain, read_len: u32) -> Alignment {
    Alignment {
        ref_start: chain.first_ref_base(),
        ref_end: chain.first_ref_base() + read_len as i64,
        rc: chain.rc(),
        score: chain.coverage() as i32,
        extra: chain.extra(),
        random_samples_only: chain.random_samples_only(),
    }
}

fn write_pair(
    out: &mut dyn Write,
    read1: &Read,
    read2: &Read,
    best1: Option<&SeedChain>,
    best2: Option<&SeedChain>,
    config: &MapperConfig,
) -> Result<()> {
    let alignment1 = best1.map(|c| chain_to_alignment(c, read1.len() as u32));
    let alignment2 = best2.map(|c| chain_to_alignment(c, read2.len() as u32));

    let proper = match (&alignment1, &alignment2) {
        (Some(a), Some(b)) => pairing::is_proper_pair(a, b, config),
        _ => false,
    };
    let tlen = match (&alignment1, &alignment2) {
        (Some(a), Some(b)) => pairing::tlen(a, b),
        _ => 0,
    };

    write_mate(out, read1, alignment1.as_ref(), alignment2.as_ref(), proper, tlen, config, true)?;
    write_mate(out, read2, alignment2.as_ref(), alignment1.as_ref(), proper, -tlen, config, false)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_mate(
    out: &mut dyn Write,
    this: &Read,
    this_alignment: Option<&Alignment>,
    mate_alignment: Option<&Alignment>,
    proper: bool,
    tlen: i64,
    config: &MapperConfig,
    is_first: bool,
) -> Result<()> {
    let mut flag = sam::flags::PAIRED;
    flag |= if is_first { sam::flags::FIRST_IN_PAIR } else { sam::flags::LAST_IN_PAIR };
    if proper {
        flag |= sam::flags::PROPER_PAIR;
    }
    if this_alignment.is_none() {
        flag |= sam::flags::UNMAPPED;
    }
    if mate_alignment.is_none() {
        flag |= sam::flags::MATE_UNMAPPED;
    }
    if this_alignment.map(|a| a.rc).unwrap_or(false) {
        flag |= sam::flags::REVERSE;
    }
    if mate_alignment.map(|a| a.rc).unwrap_or(false) {
        flag |= sam::flags::MATE_REVERSE;
    }

    let (ref_name, pos) = this_alignment.map(|a| ("chr".to_string(), a.ref_start + 1)).unwrap_or_else(|| ("*".to_string(), 0));
    let (rnext, pnext) = match (this_alignment, mate_alignment) {
        (Some(_), Some(m)) => ("=".to_string(), m.ref_start + 1),
        (None, Some(_)) => ("=".to_string(), 0),
        _ => ("*".to_string(), 0),
    };

    let mapq = match (this_alignment, mate_alignment) {
        (Some(a), Some(_)) => {
            let inputs = MapqInputs {
                best_score: a.score,
                second_best_score: config.min_score,
                sub_count: 1,
                xs_score_diff: None,
                random_samples_only: a.random_samples_only,
                extra: a.extra,
            };
            pairing::compute_mate_mapq(&inputs, config, this.len() as u32)
        }
        _ => 0,
    };

    let mut cigar = CigarBuilder::new();
    if this_alignment.is_some() {
        for _ in 0..this.len() {
            cigar.add_match();
        }
        cigar.consolidate();
    }

    let bases = if this_alignment.map(|a| a.rc).unwrap_or(false) { this.rc_bases() } else { this.bases() };

    let record = SamRecord {
        name: this.name(),
        flag,
        ref_name: &ref_name,
        pos,
        mapq,
        cigar: this_alignment.map(|_| &cigar),
        rnext: &rnext,
        pnext,
        tlen,
        bases,
        qualities: this.qualities(),
    };
    sam::write_record(out, &record)?;
    Ok(())
}
