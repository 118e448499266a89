extern crate env_logger;
#[macro_use]
extern crate log;

use anyhow::Result;
use clap::Parser;

mod cli;
mod crosslink;
mod duplicates;
mod extract;
mod filter;
mod intervals;
mod io;
mod join;
mod library;
mod merge;

use cli::{Cli, Commands};
use crate::io::OutputWriter;

/// Returns `true` if the error was caused by the reader of our output going away, as
/// happens when piping into `head`.
fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        // csv errors do not expose their io error as a source
        let io_err = match cause.downcast_ref::<csv::Error>() {
            Some(csv_err) => match csv_err.kind() {
                csv::ErrorKind::Io(io_err) => Some(io_err),
                _ => None,
            },
            None => cause.downcast_ref::<std::io::Error>(),
        };
        io_err.is_some_and(|e| e.kind() == std::io::ErrorKind::BrokenPipe)
    })
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level().as_str()),
    )
    .format_target(false)
    .init();

    debug!("bctools v{}", cli::VERSION);

    match &cli.command {
        Commands::Extract {
            infile,
            pattern,
            outfile,
            bcs,
        } => {
            info!("Extracting barcodes from {infile} with pattern {pattern}");

            let mut writer = OutputWriter::new(outfile)?;
            let mut bcs_writer = match bcs {
                Some(_) => Some(OutputWriter::new(bcs)?),
                None => None,
            };

            let stats = extract::extract_barcodes(
                infile,
                pattern,
                &mut writer,
                bcs_writer.as_mut().map(|w| w as &mut dyn std::io::Write),
            )?;

            writer.finish()?;
            if let Some(w) = bcs_writer {
                w.finish()?;
            }

            info!(
                "Stats: {} reads, {} written, {} too short, {} without sequence after extraction",
                stats.reads, stats.written, stats.too_short, stats.nothing_left
            );
        }
        Commands::Merge {
            alignments,
            bclib,
            outfile,
            stats,
            uncalled,
            duplicate_ids,
        } => {
            let mut writer = OutputWriter::new(outfile)?;

            merge::merge(
                alignments,
                bclib,
                &mut writer,
                stats,
                uncalled,
                *duplicate_ids,
            )?;

            writer.finish()?;
            info!("Completed successfully.")
        }
        Commands::Clnt { infile, outfile } => {
            let mut writer = OutputWriter::new(outfile)?;

            crosslink::crosslink(infile, &mut writer)?;

            writer.finish()?;
            info!("Completed successfully.")
        }
    };
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        if is_broken_pipe(&err) {
            std::process::exit(0);
        }

        error!("{}", err);

        // report any errors that are produced
        err.chain()
            .skip(1)
            .for_each(|cause| error!("  because: {}", cause));

        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn broken_pipe_through_csv() {
        let err = anyhow::Error::from(csv::Error::from(Error::from(ErrorKind::BrokenPipe)))
            .context("Could not write alignments");
        assert!(is_broken_pipe(&err));

        let err = anyhow::Error::from(Error::from(ErrorKind::BrokenPipe));
        assert!(is_broken_pipe(&err));

        let err = anyhow::Error::from(csv::Error::from(Error::from(ErrorKind::PermissionDenied)));
        assert!(!is_broken_pipe(&err));
    }
}
