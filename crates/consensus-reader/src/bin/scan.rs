use clap::Parser;
use tracing::{Level, info, warn};

use consensus_reader::{
    ArchiveItem, ConsensusArchive, MalformedPolicy, ParseOptions, decompress,
    error::{ReadError, Result},
};

use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(
    name = "consensus-scan",
    about = "Stream a consensus archive (.tar[.xz|.bz2|.gz|.zst]) and report throughput"
)]
struct Args {
    /// Input archive path
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Print stats every N seconds
    #[arg(long, default_value_t = 2)]
    stats_every: u64,

    /// Path marker identifying microdescriptor entries
    #[arg(long, default_value = consensus_reader::document::DEFAULT_AUX_MARKER)]
    aux_marker: String,

    /// Skip short r/m lines instead of failing
    #[arg(long)]
    lenient: bool,
}

#[derive(Default)]
struct Stats {
    snapshots: u64,
    relays: u64,
    aux: u64,
    ignored: u64,
    bytes: u64,
}

impl Stats {
    #[inline]
    fn reset(&mut self) {
        *self = Stats::default();
    }

    #[inline]
    fn add(&mut self, item: &ArchiveItem) {
        match item {
            ArchiveItem::Snapshot(s) => {
                self.snapshots += 1;
                self.relays += s.len() as u64;
                self.bytes += s.byte_size;
            }
            ArchiveItem::AuxDescriptor { bytes, .. } => {
                self.aux += 1;
                self.bytes += bytes;
            }
            ArchiveItem::Ignored { .. } => self.ignored += 1,
        }
    }

    fn print_interval(&self, dt: f64) {
        let mib_s = (self.bytes as f64 / (1024.0 * 1024.0)) / dt;
        info!(
            "read: {:.1} MiB/s | {:.0} consensuses/s | {:.0} relays/s | {:.0} microdescs/s",
            mib_s,
            self.snapshots as f64 / dt,
            self.relays as f64 / dt,
            self.aux as f64 / dt
        );
    }
}

fn run<R: Read>(archive: &mut ConsensusArchive<R>, args: &Args) -> Result<Stats> {
    let stats_every = Duration::from_secs(args.stats_every.max(1));
    let mut total = Stats::default();
    let mut interval = Stats::default();
    let mut last_print = Instant::now();

    while let Some(item) = archive.next_item()? {
        total.add(&item);
        interval.add(&item);

        let now = Instant::now();
        if now.duration_since(last_print) >= stats_every {
            let dt = now.duration_since(last_print).as_secs_f64().max(1e-9);
            interval.print_interval(dt);
            interval.reset();
            last_print = now;
        }
    }
    let dt = last_print.elapsed().as_secs_f64();
    if dt > 0.0 && (interval.snapshots > 0 || interval.aux > 0) {
        interval.print_interval(dt.max(1e-9));
    }
    Ok(total)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let Some(decompressor) = decompress::for_path(&args.input) else {
        warn!("unsupported archive suffix: {}", args.input.display());
        return Err(ReadError::Tar(format!(
            "unsupported archive {}",
            args.input.display()
        )));
    };
    info!(
        "Reading consensus archive: {} (via {})",
        args.input.display(),
        decompressor.name()
    );

    let options = ParseOptions {
        malformed: if args.lenient {
            MalformedPolicy::Skip
        } else {
            MalformedPolicy::Fail
        },
        aux_marker: args.aux_marker.clone(),
    };
    let mut archive = ConsensusArchive::open(&args.input, decompressor.as_ref(), options)?;
    let total = run(&mut archive, &args)?;

    println!(
        "consensuses={} relays={} microdescs={} ignored={} bytes={}",
        total.snapshots, total.relays, total.aux, total.ignored, total.bytes
    );
    Ok(())
}
