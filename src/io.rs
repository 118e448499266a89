use std::fs::File;
use std::io::{stdout, BufWriter, Seek, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use csv::WriterBuilder;
use tempfile::tempfile_in;

use crate::duplicates::CollapsedRecord;

/// A buffered output which is either standard output or a file.
///
/// File output is first written to a temporary file in the same directory as the
/// destination, and only copied into a newly created destination by
/// [`OutputWriter::finish`]. If an error occurs before then, the temporary file is removed
/// and the destination is left untouched.
pub struct OutputWriter {
    writer: BufWriter<Box<dyn Write + Send>>,
    staged: Option<(File, PathBuf)>,
}

impl OutputWriter {
    /// Creates a writer for `output`, defaulting to standard output if it is `None`.
    pub fn new(output: &Option<String>) -> Result<Self> {
        let Some(path) = output else {
            return Ok(OutputWriter {
                writer: BufWriter::new(Box::new(stdout()) as Box<dyn Write + Send>),
                staged: None,
            });
        };

        // get the directory of the output file
        let destination = std::path::absolute(path)?;
        let mut dir = destination.clone();
        dir.pop();

        let temp_file = tempfile_in(&dir)
            .with_context(|| format!("Unable to create a temporary file in {}", dir.display()))?;

        Ok(OutputWriter {
            writer: BufWriter::new(Box::new(temp_file.try_clone()?) as Box<dyn Write + Send>),
            staged: Some((temp_file, destination)),
        })
    }

    /// Flushes all output and, for file output, copies it to its destination.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;

        if let Some((mut temp_file, destination)) = self.staged.take() {
            let mut out = File::create(&destination)
                .with_context(|| format!("Unable to write to {}", destination.display()))?;

            // seek to the start so we can read back what was written
            temp_file.seek(std::io::SeekFrom::Start(0))?;
            std::io::copy(&mut temp_file, &mut out)
                .with_context(|| format!("Unable to write to {}", destination.display()))?;
            debug!("Results written to {}", destination.display());
        }

        Ok(())
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Writes collapsed duplicates as tab-separated lines of
/// `chrom  start  stop  barcode  ndupes  strand`, with no header.
///
/// The column order differs from the key order on purpose: the barcode takes the place of
/// the bed name field and the duplicate count that of the score.
pub fn write_collapsed<'a>(
    writer: &mut impl Write,
    records: impl IntoIterator<Item = &'a CollapsedRecord>,
) -> csv::Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);

    for rec in records {
        let k = &rec.key;
        wtr.serialize((&k.chrom, k.start, k.stop, &k.barcode, rec.ndupes, k.strand))?;
    }

    wtr.flush()?;
    Ok(())
}
