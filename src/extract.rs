use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::ops::Range;

use anyhow::{Context, Result};
use needletail::parser::FastqReader;
use needletail::FastxReader;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternErr {
    #[error("supplied pattern '{pattern}' is not valid: only X and N are allowed, as in XXXNNXX")]
    InvalidSymbols { pattern: String },

    #[error("supplied pattern '{pattern}' does not contain a barcode position 'X'")]
    NoBarcodePositions { pattern: String },
}

/// Describes where the random barcode sits at the 5'-end of a read. `X` positions belong to
/// the barcode and are moved to the read header; `N` positions stay in the read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BarcodePattern {
    pattern: String,
    barcode_ranges: Vec<Range<usize>>,
}

impl<'a> TryFrom<&'a str> for BarcodePattern {
    type Error = PatternErr;

    fn try_from(pattern: &'a str) -> Result<BarcodePattern, Self::Error> {
        let valid = Regex::new(r"^[XN]+$").expect("Should be a valid regex");
        if !valid.is_match(pattern) {
            return Err(PatternErr::InvalidSymbols {
                pattern: pattern.to_string(),
            });
        }

        let runs = Regex::new(r"X+").expect("Should be a valid regex");
        let barcode_ranges: Vec<Range<usize>> =
            runs.find_iter(pattern).map(|m| m.range()).collect();

        if barcode_ranges.is_empty() {
            return Err(PatternErr::NoBarcodePositions {
                pattern: pattern.to_string(),
            });
        }

        Ok(BarcodePattern {
            pattern: pattern.to_string(),
            barcode_ranges,
        })
    }
}

/// Outcome of applying a [`BarcodePattern`] to one read.
#[derive(Debug, PartialEq, Eq)]
pub enum Extraction {
    Extracted {
        barcode: Vec<u8>,
        seq: Vec<u8>,
        qual: Vec<u8>,
    },
    /// the read ends before the last barcode position
    TooShort,
    /// no sequence is left once the barcode is removed
    NothingLeft,
}

impl BarcodePattern {
    /// Reads must be at least this long to contain the full barcode.
    pub fn min_read_len(&self) -> usize {
        self.barcode_ranges.last().map_or(0, |r| r.end)
    }

    /// Ranges of the read that remain after barcode removal, given the read length.
    fn kept_ranges(&self, len: usize) -> impl Iterator<Item = Range<usize>> + '_ {
        let starts = std::iter::once(0).chain(self.barcode_ranges.iter().map(|r| r.end));
        let ends = self
            .barcode_ranges
            .iter()
            .map(|r| r.start)
            .chain(std::iter::once(len));

        starts
            .zip(ends)
            .map(|(start, end)| start..end)
            .filter(|r| !r.is_empty())
    }

    /// Splits a read into its barcode and the remaining sequence and quality.
    pub fn extract(&self, seq: &[u8], qual: &[u8]) -> Extraction {
        if seq.len() < self.min_read_len() {
            return Extraction::TooShort;
        }

        let barcode: Vec<u8> = self
            .barcode_ranges
            .iter()
            .flat_map(|r| seq[r.clone()].iter().copied())
            .collect();

        let mut new_seq = Vec::with_capacity(seq.len() - barcode.len());
        let mut new_qual = Vec::with_capacity(qual.len().saturating_sub(barcode.len()));
        for r in self.kept_ranges(seq.len()) {
            new_seq.extend_from_slice(&seq[r.clone()]);
            new_qual.extend_from_slice(qual.get(r).unwrap_or_default());
        }

        if new_seq.is_empty() {
            return Extraction::NothingLeft;
        }

        Extraction::Extracted {
            barcode,
            seq: new_seq,
            qual: new_qual,
        }
    }
}

impl std::fmt::Display for BarcodePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub reads: usize,
    pub written: usize,
    pub too_short: usize,
    pub nothing_left: usize,
}

/// Extracts barcodes from every read of the FASTQ file at `input`. See
/// [`extract_from_reader`].
pub fn extract_barcodes(
    input: &str,
    pattern: &BarcodePattern,
    writer: &mut impl Write,
    bcs: Option<&mut dyn Write>,
) -> Result<ExtractStats> {
    let file = File::open(input).with_context(|| format!("Unable to open file {input}"))?;
    extract_from_reader(BufReader::new(file), pattern, writer, bcs)
}

/// Moves the barcode of each read into its header.
///
/// Every written read has the header `@<original header> <barcode>`, followed by the
/// sequence and quality with the barcode positions removed. If `bcs` is given, each barcode
/// is also written there as a FASTA record named after the original header; this is the
/// barcode library used to merge PCR duplicates.
///
/// Reads too short to hold the full barcode, and reads with nothing left after removing it,
/// are skipped with a warning.
pub fn extract_from_reader<R: Read + Send>(
    reader: R,
    pattern: &BarcodePattern,
    writer: &mut impl Write,
    mut bcs: Option<&mut dyn Write>,
) -> Result<ExtractStats> {
    let mut fastq_reader = FastqReader::new(reader);
    let mut stats = ExtractStats::default();

    while let Some(rec) = fastq_reader.next() {
        let rec = rec.context("Invalid fastq record")?;
        stats.reads += 1;

        if stats.reads % 50000 == 0 {
            info!("Processed: {}", stats.reads)
        }

        let header = rec.id();
        let seq = rec.seq();
        let qual = rec.qual().unwrap_or_default();

        let (barcode, new_seq, new_qual) = match pattern.extract(&seq, qual) {
            Extraction::Extracted { barcode, seq, qual } => (barcode, seq, qual),
            Extraction::TooShort => {
                warn!(
                    "skipping read '{}', is too short to extract the full requested barcode",
                    String::from_utf8_lossy(header)
                );
                debug!("len(seq): {}", seq.len());
                stats.too_short += 1;
                continue;
            }
            Extraction::NothingLeft => {
                warn!(
                    "skipping read '{}', no sequence remains after barcode extraction",
                    String::from_utf8_lossy(header)
                );
                debug!("len(seq): {}", seq.len());
                stats.nothing_left += 1;
                continue;
            }
        };

        debug!("extracted barcode: {}", String::from_utf8_lossy(&barcode));

        writer.write_all(b"@")?;
        writer.write_all(header)?;
        writer.write_all(b" ")?;
        writer.write_all(&barcode)?;
        writer.write_all(b"\n")?;
        writer.write_all(&new_seq)?;
        writer.write_all(b"\n+\n")?;
        writer.write_all(&new_qual)?;
        writer.write_all(b"\n")?;

        if let Some(bcs) = bcs.as_mut() {
            bcs.write_all(b">")?;
            bcs.write_all(header)?;
            bcs.write_all(b"\n")?;
            bcs.write_all(&barcode)?;
            bcs.write_all(b"\n")?;
        }

        stats.written += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pattern(p: &str) -> BarcodePattern {
        BarcodePattern::try_from(p).unwrap()
    }

    #[test]
    fn rejects_invalid_patterns() {
        assert!(matches!(
            BarcodePattern::try_from("ILLEGAL"),
            Err(PatternErr::InvalidSymbols { .. })
        ));
        assert!(matches!(
            BarcodePattern::try_from(""),
            Err(PatternErr::InvalidSymbols { .. })
        ));
        assert!(matches!(
            BarcodePattern::try_from("NNNNNNN"),
            Err(PatternErr::NoBarcodePositions { .. })
        ));
    }

    #[test]
    fn barcode_positions() {
        let p = pattern("XXXNNXXX");
        assert_eq!(p.barcode_ranges, vec![0..3, 5..8]);
        assert_eq!(p.min_read_len(), 8);

        let p = pattern("NNXXN");
        assert_eq!(p.barcode_ranges, vec![2..4]);
        assert_eq!(p.min_read_len(), 4);
    }

    #[test]
    fn extracts_barcode_and_keeps_the_rest() {
        let p = pattern("XXXNNXXX");
        let got = p.extract(b"AAAttCCCgggg", b"123456789012");

        assert_eq!(
            got,
            Extraction::Extracted {
                barcode: b"AAACCC".to_vec(),
                seq: b"ttgggg".to_vec(),
                qual: b"459012".to_vec(),
            }
        );
    }

    #[test]
    fn leading_kept_positions() {
        let p = pattern("NNXX");
        let got = p.extract(b"ttAAgg", b"IIJJKK");

        assert_eq!(
            got,
            Extraction::Extracted {
                barcode: b"AA".to_vec(),
                seq: b"ttgg".to_vec(),
                qual: b"IIKK".to_vec(),
            }
        );
    }

    #[test]
    fn short_and_empty_reads() {
        let p = pattern("XXXNNXXX");
        assert_eq!(p.extract(b"AAAttCC", b"1234567"), Extraction::TooShort);

        let p = pattern("XXXX");
        assert_eq!(p.extract(b"AAAA", b"1234"), Extraction::NothingLeft);
    }

    #[test]
    fn rewrites_fastq() {
        let fastq = "\
@read1 1:N:0
AAAttCCCgggg
+
123456789012
@read2
AAAt
+
1234
@read3
GGGaaTTTc
+
ABCDEFGHI
";

        let mut out = Vec::new();
        let mut bcs = Vec::new();
        let stats = extract_from_reader(
            Cursor::new(fastq),
            &pattern("XXXNNXXX"),
            &mut out,
            Some(&mut bcs),
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "@read1 1:N:0 AAACCC\nttgggg\n+\n459012\n@read3 GGGTTT\naac\n+\nDEI\n"
        );
        assert_eq!(
            String::from_utf8(bcs).unwrap(),
            ">read1 1:N:0\nAAACCC\n>read3\nGGGTTT\n"
        );
        assert_eq!(
            stats,
            ExtractStats {
                reads: 3,
                written: 2,
                too_short: 1,
                nothing_left: 0,
            }
        );
    }
}
