use std::io::prelude::*;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::duplicates::{collapse, statistics, CollapsedRecord, DuplicateStatistics};
use crate::filter::{filter, FilterStats, Severity, UncalledBases};
use crate::intervals::{load_alignments, AlignmentRecord};
use crate::io::{write_collapsed, OutputWriter};
use crate::join::{join, JoinErr, JoinStats};
use crate::library::{load_library, BarcodeLibrary, DuplicateIdPolicy};

/// Everything counted while merging PCR duplicates. Serialized as the `--stats` report.
#[derive(Serialize, Debug, Default)]
pub struct MergeDiagnostics {
    pub bctools_version: String,
    pub run_date: String,
    pub alignments_path: String,
    pub library_path: String,
    pub library_size: usize,
    pub duplicate_library_ids: usize,
    pub join: JoinStats,
    pub filter: FilterStats,
    pub duplicates: DuplicateStatistics,
    pub elapsed: f64,
}

/// Joins alignments with their barcodes, drops uncalled barcodes and collapses PCR
/// duplicates. Nothing is logged here; the counts of every stage are returned instead.
///
/// # Errors
///
/// Fails with [`JoinErr::NoOverlap`] if none of the alignments has a barcode.
pub fn merge_duplicates(
    alignments: Vec<AlignmentRecord>,
    library: &BarcodeLibrary,
    uncalled: &UncalledBases,
) -> Result<(Vec<CollapsedRecord>, MergeDiagnostics), JoinErr> {
    let (joined, join_stats) = join(alignments, library)?;
    let (passing, filter_stats) = filter(joined, uncalled);
    let collapsed = collapse(passing);

    let diagnostics = MergeDiagnostics {
        library_size: library.len(),
        join: join_stats,
        filter: filter_stats,
        duplicates: statistics(&collapsed),
        ..MergeDiagnostics::default()
    };

    Ok((collapsed, diagnostics))
}

/// Reports the data quality counts of a merge through the logger.
fn report(diagnostics: &MergeDiagnostics) {
    let join = &diagnostics.join;
    if join.unmatched > 0 {
        warn!(
            "{} of {} alignments could not be associated with a random barcode.",
            join.unmatched, join.alignments
        );
    }

    let f = &diagnostics.filter;
    if f.dropped > 0 {
        let msg = format!(
            "{} of {} alignments had random barcodes containing uncalled bases and were dropped.",
            f.dropped, f.before
        );
        match f.severity {
            Severity::Warning => warn!("{msg}"),
            Severity::Info => info!("{msg}"),
        }
    }

    let d = &diagnostics.duplicates;
    info!(
        "Stats: {} alignments, {} with barcode, {} kept, {} merged records, {} duplicate groups",
        join.alignments,
        join.joined,
        f.before - f.dropped,
        d.groups,
        d.duplicate_groups,
    );
}

/// Merges PCR duplicates of the alignments in `alignments_path` using the barcode library
/// in `library_path`, writing sorted records to `writer`.
///
/// # Arguments
///
/// * `alignments_path` - bed6 file with the read id in the name field
/// * `library_path` - fasta barcode library, one record per read id
/// * `writer` - destination of the merged bed6 records
/// * `stats` - optional path for a JSON report of [`MergeDiagnostics`]
/// * `uncalled` - symbols which disqualify a barcode
/// * `duplicate_ids` - how to treat repeated read ids in the library
///
/// # Errors
///
/// Any error loading either input, or an empty join, aborts the merge before anything is
/// written.
pub fn merge(
    alignments_path: &str,
    library_path: &str,
    writer: &mut impl Write,
    stats: &Option<String>,
    uncalled: &UncalledBases,
    duplicate_ids: DuplicateIdPolicy,
) -> Result<()> {
    let now = std::time::Instant::now();

    info!("Reading barcode library {library_path}");
    let library = load_library(library_path, duplicate_ids)
        .with_context(|| format!("Could not load barcode library {library_path}"))?;

    if library.duplicate_ids > 0 {
        warn!(
            "{} repeated read ids in the barcode library were resolved with policy {:?}",
            library.duplicate_ids, duplicate_ids
        );
    }

    info!("Reading alignments {alignments_path}");
    let alignments = load_alignments(alignments_path)
        .with_context(|| format!("Could not load alignments {alignments_path}"))?;

    let (collapsed, mut diagnostics) =
        merge_duplicates(alignments, &library.barcodes, uncalled)?;

    diagnostics.duplicate_library_ids = library.duplicate_ids;
    report(&diagnostics);

    write_collapsed(writer, &collapsed)?;

    diagnostics.bctools_version = crate::cli::VERSION.to_string();
    diagnostics.run_date = format!("{:?}", chrono::offset::Local::now());
    diagnostics.alignments_path = alignments_path.to_string();
    diagnostics.library_path = library_path.to_string();
    diagnostics.elapsed = now.elapsed().as_secs_f64();

    if let Some(path) = stats {
        let mut stats_writer = OutputWriter::new(stats)?;
        serde_json::to_writer_pretty(&mut stats_writer, &diagnostics)
            .context("Could not serialize merge statistics")?;
        writeln!(stats_writer)?;
        stats_writer.finish()?;
        info!("Wrote merge statistics to {path}");
    }

    Ok(())
}
