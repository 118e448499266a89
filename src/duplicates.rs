use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::intervals::Strand;
use crate::join::JoinedRecord;

/// Reads sharing all of these are treated as PCR duplicates of one molecule.
///
/// The field order defines the output order: chrom, start, stop, strand, then barcode.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DuplicateKey {
    pub chrom: String,
    pub start: u64,
    pub stop: u64,
    pub strand: Strand,
    pub barcode: String,
}

impl From<JoinedRecord> for DuplicateKey {
    fn from(rec: JoinedRecord) -> Self {
        DuplicateKey {
            chrom: rec.alignment.chrom,
            start: rec.alignment.start,
            stop: rec.alignment.stop,
            strand: rec.alignment.strand,
            barcode: rec.barcode,
        }
    }
}

/// One group of PCR duplicates, with the number of reads it absorbed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollapsedRecord {
    pub key: DuplicateKey,
    pub ndupes: usize,
}

/// Summary of the duplicate group sizes.
///
/// # Fields
///
/// * `groups` - The number of collapsed records
/// * `duplicate_groups` - Groups made of more than one read
/// * `duplicate_reads` - Reads which belong to a group of more than one read
/// * `distribution` - The number of groups of each size
#[derive(Serialize, Debug, Default, PartialEq, Eq)]
pub struct DuplicateStatistics {
    pub groups: usize,
    pub duplicate_groups: usize,
    pub duplicate_reads: usize,
    pub distribution: BTreeMap<usize, usize>,
}

/// Collapses PCR duplicates into one record per [`DuplicateKey`].
///
/// Records are counted into a map in a single pass, and the groups are then sorted once by
/// their key. The result is strictly ascending and does not depend on the input order.
pub fn collapse(filtered: Vec<JoinedRecord>) -> Vec<CollapsedRecord> {
    let mut groups: IndexMap<DuplicateKey, usize> = IndexMap::new();

    for rec in filtered {
        *groups.entry(DuplicateKey::from(rec)).or_insert(0) += 1;
    }

    groups.sort_unstable_keys();

    groups
        .into_iter()
        .map(|(key, ndupes)| CollapsedRecord { key, ndupes })
        .collect()
}

/// Computes group size statistics over collapsed records.
pub fn statistics(collapsed: &[CollapsedRecord]) -> DuplicateStatistics {
    let mut stats = DuplicateStatistics {
        groups: collapsed.len(),
        ..DuplicateStatistics::default()
    };

    for rec in collapsed {
        *stats.distribution.entry(rec.ndupes).or_insert(0) += 1;

        if rec.ndupes > 1 {
            stats.duplicate_groups += 1;
            stats.duplicate_reads += rec.ndupes;
        }
    }

    stats
}
