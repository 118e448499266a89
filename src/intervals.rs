use std::fs::File;
use std::io::{BufReader, Read, Write};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column names of a BED6 line, in file order.
const BED6_FIELDS: [&str; 6] = ["chrom", "start", "stop", "name", "score", "strand"];

/// Strand of an alignment. The ordering follows the byte order of the symbols, so `+`
/// sorts before `-`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strand {
    #[serde(rename = "+")]
    Forward,
    #[serde(rename = "-")]
    Reverse,
}

/// One line of a BED6 alignment file. The name field carries the read id; the score is
/// passed through untouched.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub chrom: String,
    pub start: u64,
    pub stop: u64,
    pub read_id: String,
    pub score: String,
    pub strand: Strand,
}

#[derive(Error, Debug)]
pub enum IntervalErr {
    #[error("could not open alignments {path}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "malformed bed6 record at line {line}: {reason}
    `{record}`"
    )]
    MalformedRecord {
        line: u64,
        reason: String,
        record: String,
    },
}

/// Creates a tab-delimited reader for headerless BED input. `#` lines are comments.
fn bed_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_reader(reader)
}

/// Loads all alignments from the BED6 file at `path`. See [`read_alignments`].
pub fn load_alignments(path: &str) -> Result<Vec<AlignmentRecord>, IntervalErr> {
    let file = File::open(path).map_err(|source| IntervalErr::Open {
        path: path.to_string(),
        source,
    })?;

    read_alignments(BufReader::new(file))
}

/// Reads BED6 alignments, keeping input order.
///
/// # Errors
///
/// Returns [`IntervalErr::MalformedRecord`] for the first line that does not have exactly six
/// fields, whose start or stop is not an unsigned integer, whose strand is not `+` or `-`,
/// or whose stop is not greater than its start.
pub fn read_alignments<R: Read>(reader: R) -> Result<Vec<AlignmentRecord>, IntervalErr> {
    let mut rdr = bed_reader(reader);
    let mut raw = StringRecord::new();
    let mut records = Vec::new();

    loop {
        match rdr.read_record(&mut raw) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                return Err(IntervalErr::MalformedRecord {
                    line: e.position().map_or(0, |p| p.line()),
                    reason: e.to_string(),
                    record: String::new(),
                })
            }
        }

        let line = raw.position().map_or(0, |p| p.line());
        let record = parse_alignment(&raw).map_err(|reason| IntervalErr::MalformedRecord {
            line,
            reason,
            record: raw.iter().join("\t"),
        })?;

        records.push(record);
    }

    debug!("Loaded {} alignments", records.len());

    Ok(records)
}

/// Converts one raw BED line into an [`AlignmentRecord`], describing what is wrong with
/// the line if it does not fit the BED6 schema.
fn parse_alignment(raw: &StringRecord) -> Result<AlignmentRecord, String> {
    if raw.len() != BED6_FIELDS.len() {
        return Err(format!(
            "expected {} tab-separated fields, found {}",
            BED6_FIELDS.len(),
            raw.len()
        ));
    }

    let record: AlignmentRecord = raw.deserialize(None).map_err(|e| match e.kind() {
        csv::ErrorKind::Deserialize { err, .. } => match err.field() {
            Some(i) => format!("invalid {} field: {}", BED6_FIELDS[i as usize], err.kind()),
            None => format!("invalid record: {}", err.kind()),
        },
        _ => e.to_string(),
    })?;

    if record.stop <= record.start {
        return Err(format!(
            "stop ({}) must be greater than start ({})",
            record.stop, record.start
        ));
    }

    Ok(record)
}

/// Writes alignments as headerless BED6.
pub fn write_alignments<'a>(
    writer: &mut impl Write,
    records: impl IntoIterator<Item = &'a AlignmentRecord>,
) -> csv::Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);

    for rec in records {
        wtr.serialize(rec)?;
    }

    wtr.flush()?;
    Ok(())
}
