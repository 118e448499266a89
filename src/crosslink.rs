use std::io::Write;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::intervals::{load_alignments, write_alignments, AlignmentRecord, Strand};

#[derive(Error, Debug)]
pub enum CrosslinkErr {
    #[error(
        "read `{read_id}` starts at the beginning of {chrom} on the + strand, so it has no \
upstream crosslinked nucleotide"
    )]
    NoUpstreamNucleotide { read_id: String, chrom: String },

    #[error("read `{read_id}` ends at {stop} on {chrom}, so its crosslinked nucleotide is out of range")]
    CoordinateOverflow {
        read_id: String,
        chrom: String,
        stop: u64,
    },
}

/// Moves an alignment to its crosslinked nucleotide, which is the single nucleotide
/// immediately upstream of the read's 5'-end. All other fields are kept.
pub fn crosslink_site(rec: &AlignmentRecord) -> Result<AlignmentRecord, CrosslinkErr> {
    let (start, stop) = match rec.strand {
        Strand::Forward => {
            let Some(start) = rec.start.checked_sub(1) else {
                return Err(CrosslinkErr::NoUpstreamNucleotide {
                    read_id: rec.read_id.clone(),
                    chrom: rec.chrom.clone(),
                });
            };
            (start, rec.start)
        }
        Strand::Reverse => {
            let Some(stop) = rec.stop.checked_add(1) else {
                return Err(CrosslinkErr::CoordinateOverflow {
                    read_id: rec.read_id.clone(),
                    chrom: rec.chrom.clone(),
                    stop: rec.stop,
                });
            };
            (rec.stop, stop)
        }
    };

    Ok(AlignmentRecord {
        start,
        stop,
        ..rec.clone()
    })
}

/// Converts the aligned reads in the bed6 file `input` to their crosslinked nucleotides,
/// writing bed6 records in input order.
pub fn crosslink(input: &str, writer: &mut impl Write) -> Result<()> {
    info!("Reading alignments {input}");
    let alignments =
        load_alignments(input).with_context(|| format!("Could not load alignments {input}"))?;

    let sites = alignments
        .iter()
        .enumerate()
        .map(|(idx, rec)| {
            crosslink_site(rec).with_context(|| format!("Could not convert record {}", idx + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    write_alignments(writer, &sites)?;
    info!("Converted {} alignments", sites.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervals::read_alignments;
    use std::io::Cursor;

    fn record(line: &str) -> AlignmentRecord {
        read_alignments(Cursor::new(line)).unwrap().remove(0)
    }

    #[test]
    fn forward_strand_moves_upstream_of_start() {
        let site = crosslink_site(&record("chr1\t100\t110\tr1\t3\t+\n")).unwrap();
        assert_eq!(site, record("chr1\t99\t100\tr1\t3\t+\n"));
    }

    #[test]
    fn reverse_strand_moves_upstream_of_stop() {
        let site = crosslink_site(&record("chr1\t100\t110\tr1\t3\t-\n")).unwrap();
        assert_eq!(site, record("chr1\t110\t111\tr1\t3\t-\n"));
    }

    #[test]
    fn no_upstream_nucleotide_at_chromosome_start() {
        let res = crosslink_site(&record("chr1\t0\t10\tr1\t3\t+\n"));
        assert!(matches!(res, Err(CrosslinkErr::NoUpstreamNucleotide { .. })));

        // the reverse strand is unaffected
        assert!(crosslink_site(&record("chr1\t0\t10\tr1\t3\t-\n")).is_ok());
    }

    #[test]
    fn reverse_strand_at_largest_coordinate() {
        let line = format!("chr1\t100\t{}\tr1\t3\t-\n", u64::MAX);
        let res = crosslink_site(&record(&line));
        assert!(matches!(
            res,
            Err(CrosslinkErr::CoordinateOverflow { stop: u64::MAX, .. })
        ));
    }
}
