use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::{Parser, Subcommand};

use crate::extract::BarcodePattern;
use crate::filter::UncalledBases;
use crate::library::DuplicateIdPolicy;

const fn extra_build_info() -> &'static str {
    match option_env!("CARGO_BUILD_DESC") {
        Some(e) => e,
        None => env!("CARGO_PKG_VERSION"),
    }
}
pub const VERSION: &str = extra_build_info();
const INFO_STRING: &str = "
bctools version ";
const AFTER_STRING: &str = "
   ──────────────────────────────────
   random barcode extraction and PCR duplicate merging
   for crosslinking experiments";

// colouring of the help
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().bold())
    .usage(AnsiColor::BrightMagenta.on_default().bold())
    .literal(AnsiColor::BrightMagenta.on_default())
    .placeholder(AnsiColor::White.on_default());

#[derive(Parser)]
#[command(
    version = VERSION,
    about = format!("{}{}{}", INFO_STRING, VERSION, AFTER_STRING),
    arg_required_else_help = true,
    flatten_help = true,
    styles = STYLES
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// be verbose
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// print lots of debugging information
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Move random barcode nucleotides from the 5'-end of each read into its header
    #[command(arg_required_else_help = true)]
    Extract {
        /// the input .fastq file
        infile: String,

        /// pattern of barcode nucleotides starting at the 5'-end.
        /// X positions are moved to the header, N positions are kept.
        /// for example, XXXNNXX moves positions 1-3 and 6-7.
        #[arg(
            value_parser = |x: &str| BarcodePattern::try_from(x),
            verbatim_doc_comment
        )]
        pattern: BarcodePattern,

        /// the output .fastq (defaults to standard output)
        #[arg(short, long)]
        outfile: Option<String>,

        /// also write the extracted barcodes to this .fasta file, for use as a
        /// barcode library with `merge`
        #[arg(short, long)]
        bcs: Option<String>,
    },

    /// Merge PCR duplicates according to a random barcode library
    #[command(arg_required_else_help = true)]
    Merge {
        /// bed6 file containing alignments with the read id in the name field
        alignments: String,

        /// fasta barcode library with read ids as sequence ids
        bclib: String,

        /// the output bed6 file (defaults to standard output)
        #[arg(short, long)]
        outfile: Option<String>,

        /// write merge statistics to this file as JSON
        #[arg(long)]
        stats: Option<String>,

        /// symbols marking uncalled bases; barcodes containing any of them are dropped
        #[arg(
            long,
            value_parser = |x: &str| UncalledBases::try_from(x),
            default_value = "N"
        )]
        uncalled: UncalledBases,

        /// how to treat a read id which appears more than once in the barcode library
        #[arg(long, value_enum, default_value = "error")]
        duplicate_ids: DuplicateIdPolicy,
    },

    /// Convert aligned read coordinates to the crosslinked nucleotide, one nt upstream
    /// of the 5'-end of each read
    #[command(arg_required_else_help = true)]
    Clnt {
        /// the input bed6 file
        infile: String,

        /// the output bed6 file (defaults to standard output)
        #[arg(short, long)]
        outfile: Option<String>,
    },
}

impl Cli {
    /// The log level selected by the verbosity flags. `--debug` wins over `--verbose`.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.debug {
            log::LevelFilter::Debug
        } else if self.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flags() {
        let cli = Cli::parse_from(["bctools", "clnt", "in.bed"]);
        assert_eq!(cli.log_level(), log::LevelFilter::Warn);

        let cli = Cli::parse_from(["bctools", "clnt", "in.bed", "-v"]);
        assert_eq!(cli.log_level(), log::LevelFilter::Info);

        let cli = Cli::parse_from(["bctools", "-v", "-d", "clnt", "in.bed"]);
        assert_eq!(cli.log_level(), log::LevelFilter::Debug);
    }

    #[test]
    fn merge_defaults() {
        let cli = Cli::parse_from(["bctools", "merge", "alns.bed", "lib.fa"]);
        let Commands::Merge {
            alignments,
            bclib,
            outfile,
            stats,
            uncalled,
            duplicate_ids,
        } = cli.command
        else {
            panic!("expected the merge subcommand");
        };
        assert_eq!(alignments, "alns.bed");
        assert_eq!(bclib, "lib.fa");
        assert!(outfile.is_none());
        assert!(stats.is_none());
        assert!(uncalled.is_uncalled('N'));
        assert!(!uncalled.is_uncalled('n'));
        assert_eq!(duplicate_ids, DuplicateIdPolicy::Error);
    }

    #[test]
    fn extract_rejects_bad_pattern() {
        let res = Cli::try_parse_from(["bctools", "extract", "reads.fastq", "XXAB"]);
        assert!(res.is_err());
    }
}
