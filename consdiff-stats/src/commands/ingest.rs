use anyhow::{Context, Result};
use globset::Glob;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{info, warn};

use consensus_reader::{ArchiveItem, ConsensusArchive, ParseOptions, decompress};
use diffstats_model::SnapshotStore;

use crate::InputArgs;

/// Archives named on the command line, or those matching `--pattern` in
/// `--dir`, sorted by file name.
pub(crate) fn resolve_inputs(args: &InputArgs) -> Result<Vec<PathBuf>> {
    if !args.archives.is_empty() {
        return Ok(args.archives.clone());
    }
    let found = discover(&args.dir, &args.pattern)?;
    if found.is_empty() {
        warn!(
            "no archives matching {} in {}",
            args.pattern,
            args.dir.display()
        );
    } else {
        info!("found {} archive(s) in {}", found.len(), args.dir.display());
    }
    Ok(found)
}

pub(crate) fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = Glob::new(pattern)
        .with_context(|| format!("invalid pattern {pattern:?}"))?
        .compile_matcher();

    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// Streams every archive into one store. Unsupported suffixes are skipped;
/// any read or format error aborts the run.
pub(crate) fn ingest_archives(
    paths: &[PathBuf],
    options: &ParseOptions,
    progress_every: u64,
) -> Result<SnapshotStore> {
    let start = Instant::now();
    let mut store = SnapshotStore::new();
    let mut next_progress = progress_every.max(1);

    for path in paths {
        let Some(decompressor) = decompress::for_path(path) else {
            warn!("Unsupported format in {}, skipping", path.display());
            continue;
        };
        info!(archive = %path.display(), via = decompressor.name(), "parsing");

        let mut archive = ConsensusArchive::open(path, decompressor.as_ref(), options.clone())
            .with_context(|| format!("open {}", path.display()))?;

        let mut archive_snapshots = 0u64;
        let mut archive_aux = 0u64;
        while let Some(item) = archive
            .next_item()
            .with_context(|| format!("read {}", path.display()))?
        {
            match &item {
                ArchiveItem::Snapshot(_) => archive_snapshots += 1,
                ArchiveItem::AuxDescriptor { .. } => archive_aux += 1,
                ArchiveItem::Ignored { .. } => {}
            }
            if store.ingest(item) && progress_every > 0 && store.len() as u64 >= next_progress {
                let elapsed = start.elapsed().as_secs_f64().max(1e-9);
                info!(
                    consensuses = store.len(),
                    per_s = store.len() as f64 / elapsed,
                    "ingest progress"
                );
                next_progress += progress_every;
            }
        }
        info!(
            archive = %path.display(),
            consensuses = archive_snapshots,
            microdescs = archive_aux,
            "archive done"
        );
    }

    info!(
        consensuses = store.len(),
        microdescs = store.aux().count,
        elapsed_s = start.elapsed().as_secs_f64(),
        "ingest done"
    );
    Ok(store)
}
