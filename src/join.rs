use serde::Serialize;
use thiserror::Error;

use crate::intervals::AlignmentRecord;
use crate::library::BarcodeLibrary;

/// An alignment paired with the random barcode of its read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinedRecord {
    pub alignment: AlignmentRecord,
    pub barcode: String,
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    pub alignments: usize,
    pub joined: usize,
    pub unmatched: usize,
}

#[derive(Error, Debug)]
pub enum JoinErr {
    #[error(
        "no common entries for alignments and barcode library found:
none of the {alignments} alignments has a read id present in the barcode library
suggestion: check that the barcode library belongs to the same reads as the alignments"
    )]
    NoOverlap { alignments: usize },
}

/// Inner-joins alignments with the barcode library on the read id. Alignments whose read is
/// not in the library are left out and counted as unmatched.
///
/// # Errors
///
/// Returns [`JoinErr::NoOverlap`] if there was at least one alignment but none of them could
/// be joined, which almost always means the two input files do not belong together.
pub fn join(
    alignments: Vec<AlignmentRecord>,
    library: &BarcodeLibrary,
) -> Result<(Vec<JoinedRecord>, JoinStats), JoinErr> {
    let n_alignments = alignments.len();

    let joined: Vec<JoinedRecord> = alignments
        .into_iter()
        .filter_map(|alignment| {
            let barcode = library.get(&alignment.read_id)?.clone();
            Some(JoinedRecord { alignment, barcode })
        })
        .collect();

    if joined.is_empty() && n_alignments > 0 {
        return Err(JoinErr::NoOverlap {
            alignments: n_alignments,
        });
    }

    let stats = JoinStats {
        alignments: n_alignments,
        joined: joined.len(),
        unmatched: n_alignments - joined.len(),
    };

    Ok((joined, stats))
}
