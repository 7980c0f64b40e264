use anyhow::{Context, Result};
use std::io::{self, BufWriter, Write};

use crate::{
    InputArgs,
    commands::ingest::{ingest_archives, resolve_inputs},
};

pub(crate) fn run_list(input: &InputArgs, progress_every: u64) -> Result<()> {
    let paths = resolve_inputs(input)?;
    let mut store = ingest_archives(&paths, &input.parse_options(), progress_every)?;

    let mut out = BufWriter::new(io::stdout().lock());
    if store.finalize().is_none() {
        writeln!(out, "No data to show.")?;
        return out.flush().context("flush output");
    }

    writeln!(out, "{:<19} {:>8} {:>12}", "time", "relays", "bytes")?;
    for s in store.snapshots() {
        writeln!(
            out,
            "{:<19} {:>8} {:>12}",
            s.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            s.len(),
            s.byte_size
        )?;
    }
    out.flush().context("flush output")
}
