use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};

use bio::io::fasta;
use thiserror::Error;

/// Maps a read identifier to the random barcode extracted from that read.
pub type BarcodeLibrary = HashMap<String, String>;

/// What to do when a read identifier occurs more than once in a barcode library.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateIdPolicy {
    /// Abort with an error naming the repeated identifier
    Error,

    /// Keep the barcode of the first record with this identifier
    KeepFirst,

    /// Keep the barcode of the last record with this identifier
    KeepLast,
}

/// A barcode library together with the number of repeated read identifiers that the
/// [`DuplicateIdPolicy`] resolved while loading it.
#[derive(Debug, Default)]
pub struct LoadedLibrary {
    pub barcodes: BarcodeLibrary,
    pub duplicate_ids: usize,
}

#[derive(Error, Debug)]
pub enum LibraryErr {
    #[error("could not open barcode library {path}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed barcode library at record {record}: {reason}")]
    MalformedInput { record: usize, reason: String },

    #[error(
        "read id `{read_id}` appears more than once in the barcode library
suggestion: pass --duplicate-ids keep-first or --duplicate-ids keep-last to accept repeated ids"
    )]
    DuplicateReadId { read_id: String },
}

/// Loads a FASTA barcode library from `path`. See [`read_library`].
pub fn load_library(path: &str, policy: DuplicateIdPolicy) -> Result<LoadedLibrary, LibraryErr> {
    let file = File::open(path).map_err(|source| LibraryErr::Open {
        path: path.to_string(),
        source,
    })?;

    read_library(BufReader::new(file), policy)
}

/// Reads a FASTA barcode library. The identifier of each record is the read id and the
/// sequence is copied verbatim as its barcode. No validation of the barcode alphabet
/// happens here; uncalled bases are handled by [`crate::filter`].
///
/// # Errors
///
/// * [`LibraryErr::MalformedInput`] if the FASTA stream cannot be parsed
/// * [`LibraryErr::DuplicateReadId`] if a read id repeats under [`DuplicateIdPolicy::Error`]
pub fn read_library<R: Read>(
    reader: R,
    policy: DuplicateIdPolicy,
) -> Result<LoadedLibrary, LibraryErr> {
    let mut library = LoadedLibrary::default();

    for (idx, result) in fasta::Reader::new(reader).records().enumerate() {
        let record = result.map_err(|e| LibraryErr::MalformedInput {
            record: idx + 1,
            reason: e.to_string(),
        })?;

        let barcode =
            String::from_utf8(record.seq().to_vec()).map_err(|_| LibraryErr::MalformedInput {
                record: idx + 1,
                reason: format!("sequence of `{}` is not valid UTF-8", record.id()),
            })?;

        match library.barcodes.entry(record.id().to_string()) {
            Entry::Vacant(e) => {
                e.insert(barcode);
            }
            Entry::Occupied(mut e) => {
                library.duplicate_ids += 1;
                match policy {
                    DuplicateIdPolicy::Error => {
                        return Err(LibraryErr::DuplicateReadId {
                            read_id: e.key().clone(),
                        })
                    }
                    DuplicateIdPolicy::KeepFirst => {}
                    DuplicateIdPolicy::KeepLast => {
                        e.insert(barcode);
                    }
                }
            }
        }
    }

    debug!("Loaded {} barcodes", library.barcodes.len());

    Ok(library)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LIBRARY: &str = ">read1 some description\nAAGG\n>read2\nAANG\n>read3\nCCTT\n";

    #[test]
    fn reads_ids_and_barcodes() {
        let lib = read_library(Cursor::new(LIBRARY), DuplicateIdPolicy::Error).unwrap();

        assert_eq!(lib.barcodes.len(), 3);
        assert_eq!(lib.barcodes["read1"], "AAGG");
        // no alphabet validation at load time
        assert_eq!(lib.barcodes["read2"], "AANG");
        assert_eq!(lib.duplicate_ids, 0);
    }

    #[test]
    fn empty_library() {
        let lib = read_library(Cursor::new(""), DuplicateIdPolicy::Error).unwrap();
        assert!(lib.barcodes.is_empty());
    }

    #[test]
    fn malformed_library() {
        let res = read_library(Cursor::new("read1\nAAGG\n"), DuplicateIdPolicy::Error);
        assert!(matches!(res, Err(LibraryErr::MalformedInput { record: 1, .. })));
    }

    #[test]
    fn duplicate_ids_error_by_default() {
        let fa = ">read1\nAAGG\n>read1\nCCTT\n";
        let res = read_library(Cursor::new(fa), DuplicateIdPolicy::Error);
        match res {
            Err(LibraryErr::DuplicateReadId { read_id }) => assert_eq!(read_id, "read1"),
            other => panic!("expected a duplicate id error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_keep_first_or_last() {
        let fa = ">read1\nAAGG\n>read1\nCCTT\n>read2\nGGGG\n";

        let first = read_library(Cursor::new(fa), DuplicateIdPolicy::KeepFirst).unwrap();
        assert_eq!(first.barcodes["read1"], "AAGG");
        assert_eq!(first.duplicate_ids, 1);

        let last = read_library(Cursor::new(fa), DuplicateIdPolicy::KeepLast).unwrap();
        assert_eq!(last.barcodes["read1"], "CCTT");
        assert_eq!(last.barcodes.len(), 2);
        assert_eq!(last.duplicate_ids, 1);
    }
}
